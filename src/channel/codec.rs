//! MessagePack framing for channel events.
//!
//! Frames are self-describing maps (named fields) so the internally tagged
//! event enums decode without a schema.

use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encode one event into a frame.
pub fn encode_frame<T: Serialize>(event: &T) -> Result<Vec<u8>> {
    Ok(rmp_serde::to_vec_named(event)?)
}

/// Decode one event from a frame.
pub fn decode_frame<T: DeserializeOwned>(frame: &[u8]) -> Result<T> {
    Ok(rmp_serde::from_slice(frame)?)
}
