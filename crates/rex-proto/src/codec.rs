//! gRPC codec for [`Envelope`] messages.
//!
//! Works like `tonic::codec::ProstCodec`, except that decoded messages keep their bytes
//! and are written back out verbatim.
use std::marker::PhantomData;

use prost::{Message, bytes::Buf};
use tonic::{
    Status,
    codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder},
};

use crate::Envelope;

#[derive(Debug, Clone)]
pub struct EnvelopeCodec<T, U> {
    _pd: PhantomData<(T, U)>,
}

impl<T, U> Default for EnvelopeCodec<T, U> {
    fn default() -> Self {
        Self { _pd: PhantomData }
    }
}

impl<T, U> Codec for EnvelopeCodec<T, U>
where
    T: Message + Send + 'static,
    U: Message + Default + Send + 'static,
{
    type Encode = Envelope<T>;
    type Decode = Envelope<U>;

    type Encoder = EnvelopeEncoder<T>;
    type Decoder = EnvelopeDecoder<U>;

    fn encoder(&mut self) -> Self::Encoder {
        EnvelopeEncoder { _pd: PhantomData }
    }

    fn decoder(&mut self) -> Self::Decoder {
        EnvelopeDecoder { _pd: PhantomData }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EnvelopeEncoder<T> {
    _pd: PhantomData<T>,
}

impl<T: Message> Encoder for EnvelopeEncoder<T> {
    type Item = Envelope<T>;
    type Error = Status;

    fn encode(&mut self, item: Self::Item, buf: &mut EncodeBuf<'_>) -> Result<(), Self::Error> {
        item.encode_to(buf);
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct EnvelopeDecoder<U> {
    _pd: PhantomData<U>,
}

impl<U: Message + Default> Decoder for EnvelopeDecoder<U> {
    type Item = Envelope<U>;
    type Error = Status;

    fn decode(&mut self, buf: &mut DecodeBuf<'_>) -> Result<Option<Self::Item>, Self::Error> {
        let bytes = buf.copy_to_bytes(buf.remaining());
        // Same status code as tonic's prost codec for malformed payloads.
        Envelope::decode(bytes)
            .map(Some)
            .map_err(|e| Status::internal(e.to_string()))
    }
}
