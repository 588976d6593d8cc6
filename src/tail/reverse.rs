//! Backward paging tail over a requestor.

use super::{Delivery, TailCallback};
use crate::error::{Result, TailError};
use crate::requestor::{ApiRequest, Requestor};
use crate::types::{Batch, MessageId};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Where a reverse tail is in its request cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReversePhase {
    /// No request in flight; more may be fetched.
    Idle,
    /// Exactly one page request in flight.
    Pending,
    /// The server reported no earlier messages. Terminal.
    Exhausted,
    /// Closed by the caller. Terminal.
    Closed,
}

impl ReversePhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, ReversePhase::Exhausted | ReversePhase::Closed)
    }
}

/// Point-in-time view of a reverse tail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReverseTailState {
    pub start: Option<MessageId>,
    pub messages_sent: usize,
    pub messages_wanted: usize,
    pub phase: ReversePhase,
}

struct Cursor {
    /// Page backward from here; `None` means from the newest message.
    start: Option<MessageId>,
    sent: usize,
    wanted: usize,
    phase: ReversePhase,
}

struct Inner {
    requestor: Arc<dyn Requestor>,
    cursor: Mutex<Cursor>,
    delivery: Delivery,
}

/// Scrollback: fetches history one page at a time, newest to oldest.
///
/// Each page is handed to the callback in ascending order. Pages chain
/// automatically until the window is satisfied or the server runs out of
/// history, at which point the tail closes itself. A failed page is reported
/// to the callback as an error and the tail goes back to idle; the next
/// `expand_to` tries again.
///
/// Dropping the handle closes the tail.
pub struct ReverseTail {
    inner: Arc<Inner>,
}

impl ReverseTail {
    pub fn new(requestor: Arc<dyn Requestor>, start: Option<MessageId>, callback: TailCallback) -> Self {
        Self {
            inner: Arc::new(Inner {
                requestor,
                cursor: Mutex::new(Cursor {
                    start,
                    sent: 0,
                    wanted: 0,
                    phase: ReversePhase::Idle,
                }),
                delivery: Delivery::new(callback),
            }),
        }
    }

    /// Grow the window so that `count` messages in total will be delivered,
    /// and start fetching if idle.
    pub fn expand_to(&self, count: usize) {
        {
            let mut cursor = self.inner.cursor.lock();
            if cursor.phase.is_terminal() {
                return;
            }
            cursor.wanted = cursor.wanted.max(count.saturating_sub(cursor.sent));
            debug!(wanted = cursor.wanted, sent = cursor.sent, "expand reverse tail");
        }
        Inner::fire_request(&self.inner);
    }

    /// Stop all further callbacks. A response already in flight is dropped.
    pub fn close(&self) {
        self.inner.close(ReversePhase::Closed);
    }

    pub fn is_closed(&self) -> bool {
        self.inner.delivery.is_closed()
    }

    pub fn phase(&self) -> ReversePhase {
        self.inner.cursor.lock().phase
    }

    pub fn state(&self) -> ReverseTailState {
        let cursor = self.inner.cursor.lock();
        ReverseTailState {
            start: cursor.start.clone(),
            messages_sent: cursor.sent,
            messages_wanted: cursor.wanted,
            phase: cursor.phase,
        }
    }
}

impl Drop for ReverseTail {
    fn drop(&mut self) {
        self.inner.close(ReversePhase::Closed);
    }
}

/// Listing path for one backward page.
pub(crate) fn page_path(start: Option<&MessageId>, count: usize) -> String {
    let mut path = String::from("/messages?reverse=1");
    if let Some(start) = start {
        path.push_str("&offset=");
        path.push_str(&urlencoding::encode(start.as_str()));
    }
    path.push_str(&format!("&count={}", count));
    path
}

impl Inner {
    /// Issue the next page request unless one is in flight, the tail is
    /// finished, or nothing is wanted.
    fn fire_request(this: &Arc<Self>) {
        let path = {
            let mut cursor = this.cursor.lock();
            if cursor.phase != ReversePhase::Idle || cursor.wanted == 0 {
                return;
            }
            cursor.phase = ReversePhase::Pending;
            page_path(cursor.start.as_ref(), cursor.wanted)
        };

        debug!(path = %path, "reverse page request");
        let inner = Arc::clone(this);
        this.requestor.request(
            ApiRequest::get(path),
            Box::new(move |outcome| Inner::on_response(&inner, outcome)),
        );
    }

    fn on_response(this: &Arc<Self>, outcome: Result<Value>) {
        let page = outcome.and_then(|value| Ok(serde_json::from_value::<Batch>(value)?));

        let mut page = match page {
            Ok(page) => page,
            Err(e) => {
                this.on_failure(e);
                return;
            }
        };

        if this.delivery.is_closed() {
            debug!("reverse page dropped after close");
            return;
        }

        // Server pages are newest first
        page.messages.reverse();
        let oldest = page.messages.first().map(|m| m.id.clone());
        let received = page.messages.len();
        let is_done = page.is_done;

        // Callback first: it may close the tail before another page is chained.
        this.delivery.deliver(Ok(page));

        let stalled = {
            let mut cursor = this.cursor.lock();
            if cursor.phase == ReversePhase::Pending {
                cursor.phase = ReversePhase::Idle;
            }
            if let Some(oldest) = oldest {
                cursor.start = Some(oldest);
            }
            cursor.sent += received;
            cursor.wanted = cursor.wanted.saturating_sub(received);
            received == 0 && !is_done && cursor.wanted > 0
        };

        if is_done {
            this.close(ReversePhase::Exhausted);
        } else if stalled {
            warn!("empty reverse page before exhaustion; not chaining");
        } else {
            Inner::fire_request(this);
        }
    }

    fn on_failure(&self, error: TailError) {
        {
            let mut cursor = self.cursor.lock();
            if cursor.phase == ReversePhase::Pending {
                cursor.phase = ReversePhase::Idle;
            }
        }
        warn!(error = %error, "reverse page failed");
        self.delivery.deliver(Err(error));
    }

    fn close(&self, phase: ReversePhase) {
        {
            let mut cursor = self.cursor.lock();
            if cursor.phase.is_terminal() {
                return;
            }
            cursor.phase = phase;
        }
        self.delivery.close();
        debug!(?phase, "reverse tail closed");
    }
}
