use std::collections::HashMap;
use std::convert::TryFrom;
use std::ops::{Deref, DerefMut, RangeBounds};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use snafu::{ensure, OptionExt, ResultExt};

use crate::errors::{self, DecodeError, EncodeError};
use crate::features::ProtocolVersion;

/// Arbitrary key/value headers attached to a message (`uint16` key, a
/// length-prefixed byte value).
pub type KeyValues = HashMap<u16, Bytes>;
/// Free-form string annotations a client can attach to a request, echoed
/// back verbatim on `CommandDataDescription`.
pub type Annotations = HashMap<String, String>;

/// A read cursor over one fully-buffered message payload.
pub struct Input {
    proto: ProtocolVersion,
    bytes: Bytes,
}

/// A write cursor appending to a shared output buffer.
pub struct Output<'a> {
    proto: &'a ProtocolVersion,
    bytes: &'a mut BytesMut,
}

pub(crate) trait Encode {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError>;
}

pub(crate) trait Decode: Sized {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError>;
}

impl Input {
    pub fn new(proto: ProtocolVersion, bytes: Bytes) -> Input {
        Input { proto, bytes }
    }

    pub fn proto(&self) -> &ProtocolVersion {
        &self.proto
    }

    pub fn slice(&self, range: impl RangeBounds<usize>) -> Input {
        Input {
            proto: self.proto.clone(),
            bytes: self.bytes.slice(range),
        }
    }
}

impl Buf for Input {
    fn remaining(&self) -> usize {
        self.bytes.remaining()
    }
    fn chunk(&self) -> &[u8] {
        self.bytes.chunk()
    }
    fn advance(&mut self, cnt: usize) {
        self.bytes.advance(cnt)
    }
    fn copy_to_bytes(&mut self, len: usize) -> Bytes {
        self.bytes.copy_to_bytes(len)
    }
}

impl Deref for Input {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.bytes[..]
    }
}

impl Deref for Output<'_> {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.bytes[..]
    }
}

impl DerefMut for Output<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.bytes[..]
    }
}

impl Output<'_> {
    pub fn new<'x>(proto: &'x ProtocolVersion, bytes: &'x mut BytesMut) -> Output<'x> {
        Output { proto, bytes }
    }

    pub fn proto(&self) -> &ProtocolVersion {
        self.proto
    }

    pub fn reserve(&mut self, size: usize) {
        self.bytes.reserve(size)
    }

    pub fn extend(&mut self, slice: &[u8]) {
        self.bytes.extend(slice)
    }
}

unsafe impl BufMut for Output<'_> {
    fn remaining_mut(&self) -> usize {
        self.bytes.remaining_mut()
    }
    unsafe fn advance_mut(&mut self, cnt: usize) {
        self.bytes.advance_mut(cnt)
    }
    fn chunk_mut(&mut self) -> &mut bytes::buf::UninitSlice {
        self.bytes.chunk_mut()
    }
}

/// Append a full `(tag, length, payload)` message to `buf`, patching the
/// 4-byte length (which includes itself) once the payload is known.
pub(crate) fn encode<T: Encode>(buf: &mut Output, code: u8, msg: &T) -> Result<(), EncodeError> {
    buf.reserve(5);
    buf.put_u8(code);
    let base = buf.len();
    buf.put_slice(&[0; 4]);

    msg.encode(buf)?;

    let size = u32::try_from(buf.len() - base)
        .ok()
        .context(errors::MessageTooLong)?;
    buf[base..base + 4].copy_from_slice(&size.to_be_bytes()[..]);
    Ok(())
}

impl Encode for String {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        buf.reserve(4 + self.len());
        buf.put_u32(
            u32::try_from(self.len())
                .ok()
                .context(errors::StringTooLong)?,
        );
        buf.extend(self.as_bytes());
        Ok(())
    }
}

impl Encode for Bytes {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        buf.reserve(4 + self.len());
        buf.put_u32(
            u32::try_from(self.len())
                .ok()
                .context(errors::StringTooLong)?,
        );
        buf.extend(&self[..]);
        Ok(())
    }
}

impl Decode for String {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        ensure!(buf.remaining() >= 4, errors::Underflow);
        let len = buf.get_u32() as usize;
        ensure!(buf.remaining() >= len, errors::Underflow);
        let mut data = vec![0u8; len];
        buf.copy_to_slice(&mut data[..]);
        String::from_utf8(data)
            .map_err(|e| e.utf8_error())
            .context(errors::InvalidUtf8)
    }
}

impl Decode for Bytes {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        ensure!(buf.remaining() >= 4, errors::Underflow);
        let len = buf.get_u32() as usize;
        ensure!(buf.remaining() >= len, errors::Underflow);
        Ok(buf.copy_to_bytes(len))
    }
}

impl Decode for uuid::Uuid {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        ensure!(buf.remaining() >= 16, errors::Underflow);
        let mut bytes = [0u8; 16];
        buf.copy_to_slice(&mut bytes[..]);
        uuid::Uuid::from_slice(&bytes).context(errors::InvalidUuid)
    }
}

impl Encode for uuid::Uuid {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        buf.extend(self.as_bytes());
        Ok(())
    }
}

impl Decode for KeyValues {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        ensure!(buf.remaining() >= 2, errors::Underflow);
        let count = buf.get_u16();
        let mut map = HashMap::with_capacity(count as usize);
        for _ in 0..count {
            ensure!(buf.remaining() >= 2, errors::Underflow);
            let key = buf.get_u16();
            let value = Bytes::decode(buf)?;
            map.insert(key, value);
        }
        Ok(map)
    }
}

impl Encode for KeyValues {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        buf.reserve(2);
        buf.put_u16(u16::try_from(self.len()).ok().context(errors::TooManyHeaders)?);
        for (&key, value) in self {
            buf.reserve(2);
            buf.put_u16(key);
            value.encode(buf)?;
        }
        Ok(())
    }
}

/// CRC-16/CCITT-FALSE (polynomial `0x1021`, init `0xFFFF`, no reflection)
/// used to checksum the client proof during the SCRAM exchange.
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc16_of_empty_is_init_value() {
        assert_eq!(crc16(b""), 0xFFFF);
    }

    #[test]
    fn crc16_is_stable_for_repeated_input() {
        assert_eq!(crc16(b"123456789"), crc16(b"123456789"));
    }
}
