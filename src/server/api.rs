//! Request routing for the message listing endpoint.

use super::log::MessageLog;
use crate::error::{Result, TailError};
use crate::requestor::{ApiRequest, Method};
use crate::types::{Batch, MessageId};
use serde_json::Value;

/// Page size when a listing omits `count`.
const DEFAULT_PAGE_SIZE: usize = 50;

fn status(status: u16, status_text: &str) -> TailError {
    TailError::Status {
        status,
        status_text: status_text.to_string(),
    }
}

fn bad_request() -> TailError {
    status(400, "Bad Request")
}

/// Parsed `/messages` query.
#[derive(Debug, PartialEq)]
struct Listing {
    reverse: bool,
    offset: Option<MessageId>,
    count: usize,
}

impl Listing {
    fn parse(request: &ApiRequest) -> Result<Self> {
        let mut listing = Listing {
            reverse: false,
            offset: None,
            count: DEFAULT_PAGE_SIZE,
        };

        for (key, value) in request.query() {
            match key.as_str() {
                "reverse" => listing.reverse = value == "1" || value == "true",
                "offset" => listing.offset = Some(MessageId::new(value)),
                "count" => listing.count = value.parse().map_err(|_| bad_request())?,
                _ => {}
            }
        }
        Ok(listing)
    }
}

/// Answer one request against the log.
///
/// Routes `GET /messages`. Failures carry an HTTP status and status text.
pub fn handle_request(log: &MessageLog, request: &ApiRequest) -> Result<Value> {
    if request.route() != "/messages" {
        return Err(status(404, "Not Found"));
    }
    if request.method != Method::Get {
        return Err(status(405, "Method Not Allowed"));
    }

    let listing = Listing::parse(request)?;
    let (messages, is_done) = if listing.reverse {
        log.before(listing.offset.as_ref(), listing.count)
    } else {
        log.after(listing.offset.as_ref(), false, listing.count)
    }
    .map_err(|e| match e {
        TailError::CursorNotFound(_) => bad_request(),
        other => other,
    })?;

    Ok(serde_json::to_value(Batch::new(messages, is_done))?)
}
