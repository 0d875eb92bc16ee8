//! Wire contract between the map client and the replicated service.
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! Request               := OpTag:u8 [Frame] [Frame]
//! Frame                 := Len:u32 Blob:[u8; Len]
//! Reply(PUT|GET|REMOVE) := <empty> | Frame
//! Reply(SIZE)           := i32
//! Reply(KEYSET)         := Count:u32 Frame{Count}
//! ```
//!
//! Blobs are opaque to this layer; the client serializes typed keys and
//! values into them. An empty reply payload means "no value", a present
//! zero-length blob still carries its length prefix.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("unknown op tag {0}")]
    UnknownTag(u8),

    #[error("truncated message")]
    Truncated,

    #[error("{0} trailing bytes after message")]
    Trailing(usize),

    #[error("size reply is {0} bytes, expected 4")]
    SizeReplyLength(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Discipline {
    Ordered,
    Unordered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Put,
    Get,
    Remove,
    Size,
    KeySet,
}

impl Op {
    pub const ALL: [Op; 5] = [Op::Put, Op::Get, Op::Remove, Op::Size, Op::KeySet];

    pub fn tag(self) -> u8 {
        match self {
            Self::Put => 0,
            Self::Get => 1,
            Self::Remove => 2,
            Self::Size => 3,
            Self::KeySet => 4,
        }
    }

    pub fn from_tag(tag: u8) -> Result<Self, WireError> {
        Ok(match tag {
            0 => Self::Put,
            1 => Self::Get,
            2 => Self::Remove,
            3 => Self::Size,
            4 => Self::KeySet,
            _ => Err(WireError::UnknownTag(tag))?,
        })
    }

    /// Mutations go through total-order agreement, reads take the cheaper
    /// unordered quorum path.
    pub fn discipline(self) -> Discipline {
        match self {
            Self::Put | Self::Remove => Discipline::Ordered,
            Self::Get | Self::Size | Self::KeySet => Discipline::Unordered,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub op: Op,
    pub key: Option<Bytes>,
    pub value: Option<Bytes>,
}

impl Request {
    pub fn put(key: Bytes, value: Bytes) -> Self {
        Self {
            op: Op::Put,
            key: Some(key),
            value: Some(value),
        }
    }

    pub fn get(key: Bytes) -> Self {
        Self {
            op: Op::Get,
            key: Some(key),
            value: None,
        }
    }

    pub fn remove(key: Bytes) -> Self {
        Self {
            op: Op::Remove,
            key: Some(key),
            value: None,
        }
    }

    pub fn size() -> Self {
        Self {
            op: Op::Size,
            key: None,
            value: None,
        }
    }

    pub fn key_set() -> Self {
        Self {
            op: Op::KeySet,
            key: None,
            value: None,
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(
            1 + self.key.as_ref().map(|k| 4 + k.len()).unwrap_or(0)
                + self.value.as_ref().map(|v| 4 + v.len()).unwrap_or(0),
        );
        buf.put_u8(self.op.tag());
        if let Some(key) = &self.key {
            put_frame(&mut buf, key)
        }
        if let Some(value) = &self.value {
            put_frame(&mut buf, value)
        }
        buf.freeze()
    }

    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        let mut buf = buf;
        if !buf.has_remaining() {
            Err(WireError::Truncated)?
        }
        let op = Op::from_tag(buf.get_u8())?;
        let request = match op {
            Op::Put => Self::put(get_frame(&mut buf)?, get_frame(&mut buf)?),
            Op::Get => Self::get(get_frame(&mut buf)?),
            Op::Remove => Self::remove(get_frame(&mut buf)?),
            Op::Size => Self::size(),
            Op::KeySet => Self::key_set(),
        };
        exhausted(buf)?;
        Ok(request)
    }
}

pub fn encode_value_reply(value: Option<&[u8]>) -> Bytes {
    match value {
        None => Bytes::new(),
        Some(value) => {
            let mut buf = BytesMut::with_capacity(4 + value.len());
            put_frame(&mut buf, value);
            buf.freeze()
        }
    }
}

pub fn decode_value_reply(buf: &[u8]) -> Result<Option<Bytes>, WireError> {
    let mut buf = buf;
    if !buf.has_remaining() {
        return Ok(None);
    }
    let value = get_frame(&mut buf)?;
    exhausted(buf)?;
    Ok(Some(value))
}

pub fn encode_size_reply(size: i32) -> Bytes {
    let mut buf = BytesMut::with_capacity(4);
    buf.put_i32_le(size);
    buf.freeze()
}

pub fn decode_size_reply(buf: &[u8]) -> Result<i32, WireError> {
    let mut buf = buf;
    if buf.remaining() != 4 {
        Err(WireError::SizeReplyLength(buf.remaining()))?
    }
    Ok(buf.get_i32_le())
}

pub fn encode_key_set_reply<'a>(keys: impl ExactSizeIterator<Item = &'a [u8]>) -> Bytes {
    let mut buf = BytesMut::new();
    buf.put_u32_le(keys.len() as _);
    for key in keys {
        put_frame(&mut buf, key)
    }
    buf.freeze()
}

/// The count prefix is not trusted: every counted frame must parse and the
/// payload must be exactly exhausted afterward.
pub fn decode_key_set_reply(buf: &[u8]) -> Result<Vec<Bytes>, WireError> {
    let mut buf = buf;
    if buf.remaining() < 4 {
        Err(WireError::Truncated)?
    }
    let count = buf.get_u32_le();
    let mut keys = Vec::with_capacity(count.min(1024) as _);
    for _ in 0..count {
        keys.push(get_frame(&mut buf)?)
    }
    exhausted(buf)?;
    Ok(keys)
}

fn put_frame(buf: &mut BytesMut, blob: &[u8]) {
    buf.put_u32_le(blob.len() as _);
    buf.put_slice(blob)
}

fn get_frame(buf: &mut &[u8]) -> Result<Bytes, WireError> {
    if buf.remaining() < 4 {
        Err(WireError::Truncated)?
    }
    let len = buf.get_u32_le() as usize;
    if buf.remaining() < len {
        Err(WireError::Truncated)?
    }
    Ok(buf.copy_to_bytes(len))
}

fn exhausted(buf: &[u8]) -> Result<(), WireError> {
    if buf.has_remaining() {
        Err(WireError::Trailing(buf.remaining()))?
    }
    Ok(())
}
