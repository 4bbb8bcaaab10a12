use std::ops::Deref;

use prost::{
    DecodeError, Message,
    bytes::{BufMut, Bytes},
};

/// A message together with the exact bytes it was decoded from.
///
/// The frontend only reads a few fields of what it relays, so the message types in this
/// crate model a subset of the upstream schema. An envelope decoded off the wire is
/// encoded again from its retained bytes, which keeps fields this crate does not model
/// intact in both directions. Envelopes built locally, or changed through
/// [`Envelope::get_mut`], are encoded from their fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Envelope<M> {
    message: M,
    encoded: Option<Bytes>,
}

impl<M> Envelope<M> {
    /// Wrap a locally built message.
    pub fn new(message: M) -> Self {
        Self {
            message,
            encoded: None,
        }
    }

    #[inline]
    pub fn get_ref(&self) -> &M {
        &self.message
    }

    /// Mutable access to the message. Drops the retained bytes.
    pub fn get_mut(&mut self) -> &mut M {
        self.encoded = None;
        &mut self.message
    }

    pub fn into_inner(self) -> M {
        self.message
    }

    /// Bytes the message arrived as, if it was decoded from the wire.
    #[inline]
    pub fn encoded(&self) -> Option<&[u8]> {
        self.encoded.as_deref()
    }
}

impl<M: Message + Default> Envelope<M> {
    /// Decode `bytes` and keep them for re-encoding.
    pub fn decode(bytes: impl Into<Bytes>) -> Result<Self, DecodeError> {
        let bytes = bytes.into();
        let message = M::decode(bytes.clone())?;
        Ok(Self {
            message,
            encoded: Some(bytes),
        })
    }
}

impl<M: Message> Envelope<M> {
    pub fn encoded_len(&self) -> usize {
        match &self.encoded {
            Some(bytes) => bytes.len(),
            None => self.message.encoded_len(),
        }
    }

    /// Write the wire form into `buf`, which must be able to grow.
    pub fn encode_to(&self, buf: &mut impl BufMut) {
        match &self.encoded {
            Some(bytes) => buf.put_slice(bytes),
            None => self.message.encode_raw(buf),
        }
    }

    pub fn encode_to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode_to(&mut buf);
        buf
    }
}

impl<M> From<M> for Envelope<M> {
    fn from(message: M) -> Self {
        Self::new(message)
    }
}

impl<M> Deref for Envelope<M> {
    type Target = M;

    fn deref(&self) -> &M {
        &self.message
    }
}
