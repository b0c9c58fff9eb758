//! Element encoders injected into a [`PacketBuffer`](super::PacketBuffer).

use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Error raised while encoding or decoding a packet payload.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization or deserialization failed.
    #[error("postcard error: {0}")]
    Postcard(#[from] postcard::Error),
    /// The payload does not describe a valid element.
    #[error("malformed packet: {0}")]
    Invalid(&'static str),
}

/// Encode/decode capability for one element type.
///
/// The buffer calls both methods with its lock held, so implementations get
/// `&mut self` and need no locking of their own. `encode` appends the payload
/// to `out`; `decode` receives exactly the bytes one `encode` produced.
pub trait PacketCodec: Send {
    type Item;

    /// # Errors
    ///
    /// Returns an error if `item` cannot be represented.
    fn encode(&mut self, item: &Self::Item, out: &mut Vec<u8>) -> Result<(), CodecError>;

    /// # Errors
    ///
    /// Returns an error if `payload` is not a valid encoding.
    fn decode(&mut self, payload: &[u8]) -> Result<Self::Item, CodecError>;
}

/// Codec for any serde type, using the postcard wire format.
pub struct PostcardCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> PostcardCodec<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for PostcardCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PacketCodec for PostcardCodec<T>
where
    T: Serialize + DeserializeOwned,
{
    type Item = T;

    fn encode(&mut self, item: &T, out: &mut Vec<u8>) -> Result<(), CodecError> {
        let bytes = postcard::to_allocvec(item)?;
        out.extend_from_slice(&bytes);
        Ok(())
    }

    fn decode(&mut self, payload: &[u8]) -> Result<T, CodecError> {
        postcard::from_bytes(payload).map_err(CodecError::from)
    }
}

/// Passes raw byte payloads through unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct BytesCodec;

impl PacketCodec for BytesCodec {
    type Item = Vec<u8>;

    fn encode(&mut self, item: &Vec<u8>, out: &mut Vec<u8>) -> Result<(), CodecError> {
        out.extend_from_slice(item);
        Ok(())
    }

    fn decode(&mut self, payload: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(payload.to_vec())
    }
}
