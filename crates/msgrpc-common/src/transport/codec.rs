use bytes::{BufMut, BytesMut};
use rmp::Marker;
use rmpv::Value;
use std::io::{self, Cursor};
use tokio_util::codec::{Decoder, Encoder};

use crate::protocol::error::{Result, RpcError};
use crate::protocol::Message;

/// Largest single message accepted from the wire (100 MB).
///
/// A buffered but still incomplete value beyond this size is treated as a
/// malformed stream rather than waiting for more bytes.
pub const MAX_MESSAGE_SIZE: usize = 100 * 1024 * 1024;

/// Frame codec for msgrpc messages.
///
/// MessagePack values are self-delimiting, so there is no length prefix: the
/// decoder parses exactly one value from the buffered bytes and consumes as
/// many bytes as that value occupied. An incomplete value leaves the buffer
/// untouched and asks for more input.
///
/// The codec remembers how far it has walked the value at the front of the
/// buffer, so a message arriving over many reads is scanned once overall and
/// only parsed when it is complete.
///
/// # Example
///
/// ```
/// use bytes::BytesMut;
/// use msgrpc_common::protocol::{Message, Request};
/// use msgrpc_common::transport::MessageCodec;
/// use tokio_util::codec::{Decoder, Encoder};
///
/// let mut codec = MessageCodec::new();
/// let mut buf = BytesMut::new();
///
/// let request = Message::Request(Request::new(1, "ping", vec![]));
/// codec.encode(request.clone(), &mut buf).unwrap();
///
/// let decoded = codec.decode(&mut buf).unwrap();
/// assert_eq!(decoded, Some(request));
/// assert!(buf.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct MessageCodec {
    max_message_size: usize,
    scanner: FrameScanner,
}

impl MessageCodec {
    pub fn new() -> Self {
        Self {
            max_message_size: MAX_MESSAGE_SIZE,
            scanner: FrameScanner::new(),
        }
    }

    /// Overrides the largest accepted message size.
    pub fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.max_message_size = max_message_size;
        self
    }

    /// Encodes a single message into a standalone byte vector.
    pub fn encode_message(message: Message) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        rmpv::encode::write_value(&mut buf, &message.into_value())
            .map_err(|e| RpcError::Io(io::Error::other(e.to_string())))?;
        Ok(buf)
    }

    /// Decodes one complete message from `data`, returning it together with
    /// the number of bytes consumed. `Ok(None)` means `data` ends mid-value.
    pub fn decode_message(data: &[u8]) -> Result<Option<(Message, usize)>> {
        let mut cursor = Cursor::new(data);
        match rmpv::decode::read_value(&mut cursor) {
            Ok(value) => {
                let consumed = cursor.position() as usize;
                Ok(Some((Message::try_from(value)?, consumed)))
            }
            Err(e) if is_incomplete(&e) => Ok(None),
            Err(e) => Err(RpcError::MalformedMessage(e.to_string())),
        }
    }
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = RpcError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>> {
        if src.is_empty() {
            return Ok(None);
        }

        match self.scanner.scan(src)? {
            Some(len) => {
                let frame = src.split_to(len);
                let (message, _) = Self::decode_message(&frame)?.ok_or_else(|| {
                    RpcError::MalformedMessage("value ended before its declared length".to_string())
                })?;
                Ok(Some(message))
            }
            None if src.len() > self.max_message_size => Err(RpcError::MalformedMessage(format!(
                "Message too large: more than {} bytes buffered without a complete value",
                self.max_message_size
            ))),
            None => Ok(None),
        }
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = RpcError;

    fn encode(&mut self, message: Message, dst: &mut BytesMut) -> Result<()> {
        let value: Value = message.into_value();
        rmpv::encode::write_value(&mut dst.writer(), &value)
            .map_err(|e| RpcError::Io(io::Error::other(e.to_string())))?;
        Ok(())
    }
}

fn is_incomplete(err: &rmpv::decode::Error) -> bool {
    match err {
        rmpv::decode::Error::InvalidMarkerRead(e) | rmpv::decode::Error::InvalidDataRead(e) => {
            e.kind() == io::ErrorKind::UnexpectedEof
        }
        _ => false,
    }
}

/// Resumable walk over the markers of the value at the front of a buffer.
///
/// `offset` is how many bytes have been fully accounted for and `remaining`
/// how many values (array elements, map keys and values) still have to be
/// walked before the outermost value is complete.
#[derive(Debug, Clone)]
struct FrameScanner {
    offset: usize,
    remaining: usize,
}

impl FrameScanner {
    fn new() -> Self {
        Self {
            offset: 0,
            remaining: 1,
        }
    }

    /// Length of the first complete value in `buf`, or `None` if more bytes
    /// are needed. `buf` must start with the same bytes as on the previous
    /// call that returned `None`.
    fn scan(&mut self, buf: &[u8]) -> Result<Option<usize>> {
        while self.remaining > 0 {
            let Some(&byte) = buf.get(self.offset) else {
                return Ok(None);
            };
            let at = self.offset + 1;

            // (bytes occupied by this item excluding children, child count)
            let step = match Marker::from_u8(byte) {
                Marker::FixPos(_) | Marker::FixNeg(_) | Marker::Null | Marker::True | Marker::False => {
                    Some((1, 0))
                }
                Marker::U8 | Marker::I8 => Some((2, 0)),
                Marker::U16 | Marker::I16 => Some((3, 0)),
                Marker::U32 | Marker::I32 | Marker::F32 => Some((5, 0)),
                Marker::U64 | Marker::I64 | Marker::F64 => Some((9, 0)),
                Marker::FixStr(len) => Some((1 + usize::from(len), 0)),
                Marker::Str8 | Marker::Bin8 => length_field(buf, at, 1).map(|len| (2 + len, 0)),
                Marker::Str16 | Marker::Bin16 => length_field(buf, at, 2).map(|len| (3 + len, 0)),
                Marker::Str32 | Marker::Bin32 => length_field(buf, at, 4).map(|len| (5 + len, 0)),
                Marker::FixExt1 => Some((3, 0)),
                Marker::FixExt2 => Some((4, 0)),
                Marker::FixExt4 => Some((6, 0)),
                Marker::FixExt8 => Some((10, 0)),
                Marker::FixExt16 => Some((18, 0)),
                Marker::Ext8 => length_field(buf, at, 1).map(|len| (3 + len, 0)),
                Marker::Ext16 => length_field(buf, at, 2).map(|len| (4 + len, 0)),
                Marker::Ext32 => length_field(buf, at, 4).map(|len| (6 + len, 0)),
                Marker::FixArray(n) => Some((1, usize::from(n))),
                Marker::Array16 => length_field(buf, at, 2).map(|n| (3, n)),
                Marker::Array32 => length_field(buf, at, 4).map(|n| (5, n)),
                Marker::FixMap(n) => Some((1, 2 * usize::from(n))),
                Marker::Map16 => length_field(buf, at, 2).map(|n| (3, 2 * n)),
                Marker::Map32 => length_field(buf, at, 4).map(|n| (5, 2 * n)),
                Marker::Reserved => {
                    *self = Self::new();
                    return Err(RpcError::MalformedMessage(format!(
                        "invalid MessagePack marker 0x{:02x}",
                        byte
                    )));
                }
            };

            let Some((size, children)) = step else {
                return Ok(None);
            };
            if buf.len() < self.offset + size {
                return Ok(None);
            }

            self.offset += size;
            self.remaining = self.remaining - 1 + children;
        }

        let len = self.offset;
        *self = Self::new();
        Ok(Some(len))
    }
}

/// Big-endian length field of `width` bytes at `at`, if fully buffered.
fn length_field(buf: &[u8], at: usize, width: usize) -> Option<usize> {
    let bytes = buf.get(at..at + width)?;
    Some(bytes.iter().fold(0usize, |len, &b| (len << 8) | usize::from(b)))
}
