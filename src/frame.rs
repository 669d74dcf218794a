//! Wire-level frames.
//!
//! [`Frame`] is the codec view: a header plus a payload slice, marshalled into
//! and unmarshalled from raw bytes without any I/O. [`FrameBuf`] is the owned,
//! pool-recycled form the connection hands out on the read path.

use bytes::{Buf, Bytes, BytesMut};

use crate::{OpCode, error::DecodeError, mask::apply_mask, pool::Recycle};

/// The largest header a frame can have: 2 base bytes, an 8 byte extended length and a 4 byte masking key.
pub const MAX_HEAD_SIZE: usize = 14;

const MIN_HEAD_SIZE: usize = 2;

/// Frame header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Header {
    /// Indicates if this is the final frame in a message.
    fin: bool,
    /// `rsv1`, `rsv2` and `rsv3` in the low 3 bits.
    rsv: u8,
    /// The opcode of the frame.
    opcode: OpCode,
    /// The masking key of the frame, if any.
    mask: Option<[u8; 4]>,
    /// The length of the payload.
    payload_len: usize,
}

impl Header {
    /// Creates a new unmasked [`Header`] with all reserved bits cleared.
    pub const fn new(fin: bool, opcode: OpCode, payload_len: usize) -> Self {
        Self {
            fin,
            rsv: 0,
            opcode,
            mask: None,
            payload_len,
        }
    }

    /// Sets the masking key.
    pub const fn with_mask(mut self, mask: Option<[u8; 4]>) -> Self {
        self.mask = mask;
        self
    }

    /// Sets the reserved bits.
    pub const fn with_rsv(mut self, rsv1: bool, rsv2: bool, rsv3: bool) -> Self {
        self.rsv = (rsv1 as u8) << 2 | (rsv2 as u8) << 1 | rsv3 as u8;
        self
    }

    /// Returns whether this is the final frame in a message.
    pub const fn is_final(&self) -> bool {
        self.fin
    }

    /// Returns the `rsv1` bit.
    pub const fn rsv1(&self) -> bool {
        self.rsv & 0b100 != 0
    }

    /// Returns the `rsv2` bit.
    pub const fn rsv2(&self) -> bool {
        self.rsv & 0b010 != 0
    }

    /// Returns the `rsv3` bit.
    pub const fn rsv3(&self) -> bool {
        self.rsv & 0b001 != 0
    }

    /// Returns the opcode.
    pub const fn opcode(&self) -> OpCode {
        self.opcode
    }

    /// Returns the masking key, if the frame is masked.
    pub const fn mask(&self) -> Option<[u8; 4]> {
        self.mask
    }

    /// Returns the declared payload length.
    pub const fn payload_len(&self) -> usize {
        self.payload_len
    }

    /// Returns the number of bytes [`Header::encode`] writes.
    pub const fn size(&self) -> usize {
        let extra = if self.payload_len < 126 {
            0
        } else if self.payload_len < 65536 {
            2
        } else {
            8
        };

        let mask = if self.mask.is_some() { 4 } else { 0 };

        MIN_HEAD_SIZE + extra + mask
    }

    /// Decodes a header from the start of `src`.
    ///
    /// Returns `Ok(None)` if `src` is too short to hold the whole header,
    /// otherwise the header and the number of bytes it occupies.
    pub fn decode(src: &[u8]) -> Result<Option<(Self, usize)>, DecodeError> {
        if src.len() < MIN_HEAD_SIZE {
            return Ok(None);
        }

        let fin = src[0] & 0b1000_0000 != 0;
        let rsv = (src[0] >> 4) & 0b0111;
        let opcode = OpCode::from(src[0]);

        let masked = src[1] & 0b1000_0000 != 0;
        let length_code = src[1] & 0x7F;

        let extra = match length_code {
            126 => 2,
            127 => 8,
            _ => 0,
        };

        let head_len = MIN_HEAD_SIZE + extra + masked as usize * 4;

        if src.len() < head_len {
            return Ok(None);
        }

        let payload_len = match extra {
            0 => length_code as usize,
            2 => u16::from_be_bytes([src[2], src[3]]) as usize,
            _ => {
                let len = u64::from_be_bytes([
                    src[2], src[3], src[4], src[5], src[6], src[7], src[8], src[9],
                ]);

                // The most significant bit must be 0.
                if len >> 63 != 0 {
                    return Err(DecodeError::PayloadTooLarge { len });
                }

                usize::try_from(len).map_err(|_| DecodeError::PayloadTooLarge { len })?
            }
        };

        let mask = masked.then(|| {
            [
                src[2 + extra],
                src[3 + extra],
                src[4 + extra],
                src[5 + extra],
            ]
        });

        let header = Self {
            fin,
            rsv,
            opcode,
            mask,
            payload_len,
        };

        Ok(Some((header, head_len)))
    }

    /// Writes the header into `dst`.
    ///
    /// Returns `None` if `dst` is shorter than [`Header::size`].
    pub fn encode(&self, dst: &mut [u8]) -> Option<usize> {
        if dst.len() < self.size() {
            return None;
        }

        Some(self.write(dst))
    }

    fn write(&self, dst: &mut [u8]) -> usize {
        dst[0] = (self.fin as u8) << 7 | self.rsv << 4 | u8::from(self.opcode);

        let len = self.payload_len;

        let size = if len < 126 {
            dst[1] = len as u8;
            2
        } else if len < 65536 {
            dst[1] = 126;
            dst[2..4].copy_from_slice(&(len as u16).to_be_bytes());
            4
        } else {
            dst[1] = 127;
            dst[2..10].copy_from_slice(&(len as u64).to_be_bytes());
            10
        };

        match self.mask {
            None => size,
            Some(mask) => {
                dst[1] |= 0x80;
                dst[size..size + 4].copy_from_slice(&mask);
                size + 4
            }
        }
    }
}

/// A frame whose payload borrows from somewhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    header: Header,
    payload: &'a [u8],
}

impl<'a> Frame<'a> {
    /// Creates a new unmasked [`Frame`].
    pub const fn new(fin: bool, opcode: OpCode, payload: &'a [u8]) -> Self {
        Self {
            header: Header::new(fin, opcode, payload.len()),
            payload,
        }
    }

    /// Sets the masking key used by [`Frame::marshal`].
    pub const fn with_mask(mut self, mask: Option<[u8; 4]>) -> Self {
        self.header = self.header.with_mask(mask);
        self
    }

    /// Sets the reserved bits.
    pub const fn with_rsv(mut self, rsv1: bool, rsv2: bool, rsv3: bool) -> Self {
        self.header = self.header.with_rsv(rsv1, rsv2, rsv3);
        self
    }

    /// Returns the header.
    pub const fn header(&self) -> &Header {
        &self.header
    }

    /// Returns whether this is the final frame in a message.
    pub const fn is_final(&self) -> bool {
        self.header.fin
    }

    /// Returns the opcode of the frame.
    pub const fn opcode(&self) -> OpCode {
        self.header.opcode
    }

    /// Returns the unmasked payload of the frame.
    pub const fn payload(&self) -> &'a [u8] {
        self.payload
    }

    /// Returns the number of bytes [`Frame::marshal`] produces.
    pub const fn size(&self) -> usize {
        self.header.size() + self.payload.len()
    }

    /// Decodes one frame from the start of `src`.
    ///
    /// Returns `Ok(None)` when `src` does not yet hold the whole frame; nothing
    /// is modified in that case. On success the payload is unmasked in place and
    /// the returned frame borrows it from `src`, together with the number of bytes
    /// the frame occupied.
    pub fn unmarshal(src: &'a mut [u8]) -> Result<Option<(Self, usize)>, DecodeError> {
        let Some((header, head_len)) = Header::decode(src)? else {
            return Ok(None);
        };

        let end = head_len
            .checked_add(header.payload_len)
            .ok_or(DecodeError::PayloadTooLarge {
                len: header.payload_len as u64,
            })?;

        if src.len() < end {
            return Ok(None);
        }

        let payload = &mut src[head_len..end];

        if let Some(mask) = header.mask {
            apply_mask(payload, mask);
        }

        Ok(Some((Self { header, payload }, end)))
    }

    /// Encodes the frame into `dst` and returns the encoded bytes.
    ///
    /// `dst` is reused when it is long enough and grown to exactly the frame size
    /// otherwise. A masked frame is masked inside `dst`; the payload this frame
    /// borrows is left untouched.
    pub fn marshal<'d>(&self, dst: &'d mut Vec<u8>) -> &'d [u8] {
        let size = self.size();

        if dst.len() < size {
            dst.reserve_exact(size - dst.len());
            dst.resize(size, 0);
        }

        let dst = &mut dst[..size];

        let head_len = self.header.write(dst);

        dst[head_len..].copy_from_slice(self.payload);

        if let Some(mask) = self.header.mask {
            apply_mask(&mut dst[head_len..], mask);
        }

        dst
    }
}

/// An owned frame, recycled through the frame pool.
///
/// The payload is split off the connection's accumulation buffer without
/// copying.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameBuf {
    header: Header,
    payload: Bytes,
}

impl FrameBuf {
    /// Returns the header.
    pub const fn header(&self) -> &Header {
        &self.header
    }

    /// Returns whether this is the final frame in a message.
    pub const fn is_final(&self) -> bool {
        self.header.fin
    }

    /// Returns the opcode of the frame.
    pub const fn opcode(&self) -> OpCode {
        self.header.opcode
    }

    /// Returns the unmasked payload.
    pub const fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Moves the payload out, leaving an empty one behind.
    pub fn take_payload(&mut self) -> Bytes {
        core::mem::take(&mut self.payload)
    }

    /// Borrows this frame as a [`Frame`].
    pub fn as_frame(&self) -> Frame<'_> {
        Frame {
            header: self.header,
            payload: &self.payload,
        }
    }

    /// Decodes one frame from the front of `src` into `self`.
    ///
    /// On success the frame's bytes are removed from `src` and `true` is returned.
    /// On `false`, `src` is left as it was.
    pub(crate) fn decode(
        &mut self,
        src: &mut BytesMut,
        max_payload_len: Option<usize>,
    ) -> Result<bool, DecodeError> {
        if let Some(max) = max_payload_len {
            if let Some((header, _)) = Header::decode(&src[..])? {
                if header.payload_len > max {
                    return Err(DecodeError::PayloadTooLarge {
                        len: header.payload_len as u64,
                    });
                }
            }
        }

        let (header, consumed) = match Frame::unmarshal(&mut src[..])? {
            None => return Ok(false),
            Some((frame, consumed)) => (frame.header, consumed),
        };

        let mut bytes = src.split_to(consumed);
        bytes.advance(consumed - header.payload_len);

        self.header = header;
        self.payload = bytes.freeze();

        Ok(true)
    }
}

impl Recycle for FrameBuf {
    fn recycle(&mut self) {
        *self = Self::default();
    }
}
