//! In-process channel over crossbeam queues.
//!
//! Both directions carry encoded frames. Inbound events are queued until the
//! client calls [`LocalChannel::pump`], which dispatches them one at a time
//! on the caller's thread. Nothing is dispatched from inside `emit`.

use super::codec::{decode_frame, encode_frame};
use super::registry::{ListenerRegistry, TailIdAllocator};
use super::{Channel, ClientEvent, EventKind, Listener, ListenerId, ServerEvent};
use crate::error::{Result, TailError};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;
use tracing::trace;

/// Client end of an in-process channel.
pub struct LocalChannel {
    outbound: Sender<Vec<u8>>,
    inbound: Receiver<Vec<u8>>,
    listeners: ListenerRegistry,
    tail_ids: TailIdAllocator,
}

/// Server end of an in-process channel.
pub struct ChannelPeer {
    inbound: Receiver<Vec<u8>>,
    outbound: Sender<Vec<u8>>,
}

impl LocalChannel {
    /// Create a connected client/server pair.
    pub fn pair() -> (LocalChannel, ChannelPeer) {
        let (client_tx, server_rx) = unbounded();
        let (server_tx, client_rx) = unbounded();

        let channel = LocalChannel {
            outbound: client_tx,
            inbound: client_rx,
            listeners: ListenerRegistry::new(),
            tail_ids: TailIdAllocator::new(),
        };
        let peer = ChannelPeer {
            inbound: server_rx,
            outbound: server_tx,
        };
        (channel, peer)
    }

    /// Dispatch every queued inbound event. Returns how many were dispatched.
    ///
    /// Queued events are still dispatched after the peer hangs up; the
    /// disconnect is only reported once the queue is empty.
    pub fn pump(&self) -> Result<usize> {
        let mut dispatched = 0;
        loop {
            match self.inbound.try_recv() {
                Ok(frame) => {
                    self.dispatch_frame(&frame)?;
                    dispatched += 1;
                }
                Err(TryRecvError::Empty) => return Ok(dispatched),
                Err(TryRecvError::Disconnected) if dispatched > 0 => return Ok(dispatched),
                Err(TryRecvError::Disconnected) => return Err(TailError::ChannelClosed),
            }
        }
    }

    /// Wait up to `timeout` for one inbound event, then dispatch everything
    /// queued behind it.
    pub fn pump_timeout(&self, timeout: Duration) -> Result<usize> {
        match self.inbound.recv_timeout(timeout) {
            Ok(frame) => {
                self.dispatch_frame(&frame)?;
                match self.pump() {
                    Ok(rest) => Ok(1 + rest),
                    Err(TailError::ChannelClosed) => Ok(1),
                    Err(e) => Err(e),
                }
            }
            Err(RecvTimeoutError::Timeout) => Ok(0),
            Err(RecvTimeoutError::Disconnected) => Err(TailError::ChannelClosed),
        }
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.count(kind)
    }

    fn dispatch_frame(&self, frame: &[u8]) -> Result<()> {
        let event: ServerEvent = decode_frame(frame)?;
        let ran = self.listeners.dispatch(&event);
        trace!(event = event.kind().name(), listeners = ran, "dispatched");
        Ok(())
    }
}

impl Channel for LocalChannel {
    fn emit(&self, event: ClientEvent) -> Result<()> {
        trace!(event = event.name(), tail_id = %event.tail_id(), "emit");
        let frame = encode_frame(&event)?;
        self.outbound
            .send(frame)
            .map_err(|_| TailError::ChannelClosed)
    }

    fn on(&self, kind: EventKind, listener: Listener) -> ListenerId {
        self.listeners.add(kind, listener)
    }

    fn remove_listener(&self, kind: EventKind, id: ListenerId) -> bool {
        self.listeners.remove(kind, id)
    }

    fn tail_ids(&self) -> &TailIdAllocator {
        &self.tail_ids
    }
}

impl ChannelPeer {
    /// Next queued client event, if any.
    pub fn try_recv(&self) -> Result<Option<ClientEvent>> {
        match self.inbound.try_recv() {
            Ok(frame) => Ok(Some(decode_frame(&frame)?)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(TailError::ChannelClosed),
        }
    }

    /// Wait up to `timeout` for the next client event.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<ClientEvent>> {
        match self.inbound.recv_timeout(timeout) {
            Ok(frame) => Ok(Some(decode_frame(&frame)?)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(TailError::ChannelClosed),
        }
    }

    /// Push an event to the client.
    pub fn send(&self, event: &ServerEvent) -> Result<()> {
        let frame = encode_frame(event)?;
        self.outbound
            .send(frame)
            .map_err(|_| TailError::ChannelClosed)
    }
}
