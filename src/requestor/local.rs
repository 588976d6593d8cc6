//! Requestor answered by an in-process server.

use super::{ApiRequest, Completion, Requestor};
use crate::server::Server;
use std::sync::Arc;
use tracing::trace;

/// Completes each request synchronously from a [`Server`].
pub struct LocalRequestor {
    server: Arc<Server>,
}

impl LocalRequestor {
    pub fn new(server: Arc<Server>) -> Self {
        Self { server }
    }
}

impl Requestor for LocalRequestor {
    fn request(&self, request: ApiRequest, on_complete: Completion) {
        trace!(method = %request.method, path = %request.path, "local request");
        on_complete(self.server.handle_request(&request));
    }
}
