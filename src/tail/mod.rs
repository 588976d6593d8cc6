//! Forward and reverse tails over the message stream.
//!
//! Both tail kinds deliver [`Batch`]es in ascending stream order through a
//! [`TailCallback`], grow their window with `expand_to(count)` where `count`
//! is the cumulative total wanted, and stop for good on `close()`.
//!
//! - [`ForwardTail`] registers on a [`Channel`](crate::channel::Channel) and
//!   receives pushed batches addressed to its tail id.
//! - [`ReverseTail`] pages backward through a
//!   [`Requestor`](crate::requestor::Requestor), one request at a time.

mod forward;
mod reverse;

pub use forward::{ForwardTail, ForwardTailState};
pub use reverse::{ReversePhase, ReverseTail, ReverseTailState};

use crate::error::Result;
use crate::types::Batch;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

/// Receives every delivery of a tail, or the failure that interrupted it.
pub type TailCallback = Box<dyn FnMut(Result<Batch>) + Send>;

/// Cancellation flag plus the callback it guards.
///
/// The callback is taken out while it runs, so it may call back into its own
/// tail (including `close`) without deadlocking. Outcomes that arrive while
/// it is out are queued and run, in order, by whoever holds it.
pub(crate) struct Delivery {
    closed: AtomicBool,
    slot: Mutex<Slot>,
}

struct Slot {
    callback: Option<TailCallback>,
    queued: VecDeque<Result<Batch>>,
}

impl Delivery {
    pub(crate) fn new(callback: TailCallback) -> Self {
        Self {
            closed: AtomicBool::new(false),
            slot: Mutex::new(Slot {
                callback: Some(callback),
                queued: VecDeque::new(),
            }),
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Mark closed and drop the callback along with anything queued.
    /// Returns true on the first call only.
    pub(crate) fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        let (callback, queued) = {
            let mut slot = self.slot.lock();
            (slot.callback.take(), std::mem::take(&mut slot.queued))
        };
        drop(callback);
        drop(queued);
        true
    }

    /// Hand `outcome` to the callback unless closed. Returns whether it was
    /// accepted.
    ///
    /// When the callback is already running, on this thread or another, the
    /// outcome is queued behind the one in progress.
    pub(crate) fn deliver(&self, outcome: Result<Batch>) -> bool {
        if self.is_closed() {
            return false;
        }

        let mut callback = {
            let mut slot = self.slot.lock();
            slot.queued.push_back(outcome);
            match slot.callback.take() {
                Some(callback) => callback,
                None => return true,
            }
        };

        loop {
            let next = {
                let mut slot = self.slot.lock();
                if self.is_closed() {
                    slot.queued.clear();
                    return true;
                }
                match slot.queued.pop_front() {
                    Some(next) => next,
                    None => {
                        slot.callback = Some(callback);
                        return true;
                    }
                }
            };
            callback(next);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_close_is_idempotent_and_stops_delivery() {
        let (callback, seen) = testing::recorder();
        let delivery = Delivery::new(callback);

        assert!(delivery.deliver(Ok(Batch::default())));
        assert!(delivery.close());
        assert!(!delivery.close());
        assert!(!delivery.deliver(Ok(Batch::default())));
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn test_callback_may_close_its_own_delivery() {
        let delivery: Arc<Mutex<Option<Arc<Delivery>>>> = Arc::default();
        let hits = Arc::new(Mutex::new(0));

        let handle = Arc::clone(&delivery);
        let counter = Arc::clone(&hits);
        let d = Arc::new(Delivery::new(Box::new(move |_| {
            *counter.lock() += 1;
            if let Some(d) = handle.lock().as_ref() {
                d.close();
            }
        })));
        *delivery.lock() = Some(Arc::clone(&d));

        assert!(d.deliver(Ok(Batch::default())));
        assert!(d.is_closed());
        assert!(!d.deliver(Ok(Batch::default())));
        assert_eq!(*hits.lock(), 1);

        // Break the cycle
        delivery.lock().take();
    }

    #[test]
    fn test_nested_delivery_is_queued_in_order() {
        let delivery: Arc<Mutex<Option<Arc<Delivery>>>> = Arc::default();
        let seen: Arc<Mutex<Vec<usize>>> = Arc::default();

        let handle = Arc::clone(&delivery);
        let sink = Arc::clone(&seen);
        let d = Arc::new(Delivery::new(Box::new(move |outcome: Result<Batch>| {
            let len = outcome.map(|b| b.len()).unwrap_or(0);
            sink.lock().push(len);
            // The first delivery triggers two more from inside the callback
            if len == 1 {
                if let Some(d) = handle.lock().clone() {
                    assert!(d.deliver(Ok(Batch::new(testing::msgs(&[2, 3]), false))));
                    assert!(d.deliver(Ok(Batch::new(testing::msgs(&[4, 5, 6]), true))));
                }
            }
        })));
        *delivery.lock() = Some(Arc::clone(&d));

        assert!(d.deliver(Ok(Batch::new(testing::msgs(&[1]), false))));
        assert_eq!(*seen.lock(), vec![1, 2, 3]);

        // The callback is back in its slot afterwards
        assert!(d.deliver(Ok(Batch::default())));
        assert_eq!(*seen.lock(), vec![1, 2, 3, 0]);

        delivery.lock().take();
    }

    #[test]
    fn test_close_from_callback_drops_queued() {
        let delivery: Arc<Mutex<Option<Arc<Delivery>>>> = Arc::default();
        let hits = Arc::new(Mutex::new(0));

        let handle = Arc::clone(&delivery);
        let counter = Arc::clone(&hits);
        let d = Arc::new(Delivery::new(Box::new(move |_| {
            *counter.lock() += 1;
            if let Some(d) = handle.lock().clone() {
                d.deliver(Ok(Batch::default()));
                d.close();
            }
        })));
        *delivery.lock() = Some(Arc::clone(&d));

        assert!(d.deliver(Ok(Batch::default())));
        assert_eq!(*hits.lock(), 1);
        assert!(d.is_closed());

        delivery.lock().take();
    }
}
