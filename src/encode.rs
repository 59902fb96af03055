//! # Encode Iterator - Stateful Write Cursor
//!
//! ## Purpose
//!
//! A single forward-moving write position over a caller-owned buffer, plus
//! a stack of container frames tracking every `encode_init` that has not
//! yet seen its `encode_complete`. Length prefixes whose final value is
//! unknown at init time are reserved at maximum width and back-patched on
//! complete; when the short form suffices the payload is slid down so the
//! finished bytes are identical to a single-pass encode. That equivalence
//! is what makes pre-encoded splicing safe.
//!
//! ## Failure Discipline
//!
//! Recoverable conditions (buffer exhaustion, oversized payloads, depth
//! overrun) come back as [`CodecError`] and leave the cursor positioned so
//! the caller can roll back the failed scope and retry with a larger
//! buffer. Misuse of the init/complete pairing protocol is a programming
//! error and panics.

use crate::error::{CodecError, Result};
use crate::wire::{self, MAX_U15};
use crate::{RWF_MAJOR_VERSION, RWF_MINOR_VERSION};

/// Containers may nest at most this deep, messages included.
pub(crate) const MAX_ENCODE_DEPTH: usize = 16;

/// Which structure opened the current frame. Entry and complete calls
/// verify they are paired with the matching init.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FrameKind {
    FieldList,
    ElementList,
    Map,
    Series,
    Vector,
    FilterList,
    Array,
    Msg,
}

/// Where the open frame is in its init / entries / complete protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EncodeState {
    /// Header written, waiting on summary data or first entry.
    Init,
    /// Inside an init'd summary-data scope.
    SummaryData,
    /// Accepting entries.
    Entries,
    /// Inside an init'd entry scope (pre-sized or nested encode).
    EntryOpen,
    /// Message waiting on a caller-encoded key attrib container.
    KeyAttrib,
    /// Message waiting on a caller-encoded extended header.
    ExtendedHeader,
    /// Message header complete, payload bytes may follow.
    Payload,
}

/// Width class of a reserved, back-patched length prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MarkKind {
    /// One-byte length.
    B8,
    /// Reserved two bytes; collapses to one when the value fits 7 bits.
    B15,
    /// Reserved three bytes (escape + u16); collapses to one below 0xFE.
    B16,
    /// Fixed two-byte length, never collapsed.
    U16,
}

impl MarkKind {
    pub(crate) fn reserved(self) -> usize {
        match self {
            MarkKind::B8 => 1,
            MarkKind::B15 => 2,
            MarkKind::B16 => 3,
            MarkKind::U16 => 2,
        }
    }
}

/// A reserved length slot awaiting its back-patch.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Mark {
    pub pos: usize,
    pub kind: MarkKind,
}

impl Mark {
    /// First byte of the sized content.
    pub(crate) fn content_start(&self) -> usize {
        self.pos + self.kind.reserved()
    }
}

/// One open container scope.
#[derive(Debug)]
pub(crate) struct EncodeFrame {
    pub kind: FrameKind,
    pub state: EncodeState,
    /// Rollback point on failed complete: the first byte this container
    /// wrote.
    pub start_pos: usize,
    /// Back-patched entry count slot, where the container has one.
    pub count_pos: Option<usize>,
    pub count: u16,
    /// Size mark of the entry or summary scope currently open inside this
    /// frame.
    pub entry_mark: Option<Mark>,
    /// Rollback point for the open entry scope.
    pub entry_start: usize,
    /// Message-key wrapper mark, finished together with a pending attrib.
    pub key_mark: Option<Mark>,
}

impl EncodeFrame {
    fn new(kind: FrameKind, start_pos: usize) -> Self {
        EncodeFrame {
            kind,
            state: EncodeState::Init,
            start_pos,
            count_pos: None,
            count: 0,
            entry_mark: None,
            entry_start: 0,
            key_mark: None,
        }
    }
}

/// Write cursor over a caller-owned buffer. One iterator encodes one
/// top-level structure; bind a fresh buffer (or call [`set_buffer`]) to
/// start over.
///
/// [`set_buffer`]: EncodeIterator::set_buffer
///
/// ```
/// use omm_codec::{EncodeIterator, PrimitiveValue};
/// use omm_codec::container::{FieldList, FieldEntry};
///
/// let mut buf = [0u8; 64];
/// let mut iter = EncodeIterator::new(&mut buf).unwrap();
/// FieldList::new().encode_init(&mut iter).unwrap();
/// FieldEntry::new(22).encode(&mut iter, &PrimitiveValue::UInt(100)).unwrap();
/// FieldList::encode_complete(&mut iter, true).unwrap();
/// assert!(!iter.encoded().is_empty());
/// ```
pub struct EncodeIterator<'a> {
    buf: &'a mut [u8],
    pos: usize,
    major: u8,
    minor: u8,
    frames: Vec<EncodeFrame>,
}

impl<'a> EncodeIterator<'a> {
    /// Bind the cursor to `buf` at the current protocol version.
    pub fn new(buf: &'a mut [u8]) -> Result<Self> {
        Self::with_version(buf, RWF_MAJOR_VERSION, RWF_MINOR_VERSION)
    }

    /// Bind at an explicit wire version. Only the current major version is
    /// encodable.
    pub fn with_version(buf: &'a mut [u8], major: u8, minor: u8) -> Result<Self> {
        if buf.is_empty() {
            return Err(CodecError::InvalidArgument("encode buffer is empty"));
        }
        if major != RWF_MAJOR_VERSION {
            return Err(CodecError::UnsupportedVersion { major, minor });
        }
        Ok(EncodeIterator {
            buf,
            pos: 0,
            major,
            minor,
            frames: Vec::with_capacity(MAX_ENCODE_DEPTH),
        })
    }

    /// Rebind to a different buffer, discarding all progress and open
    /// frames.
    pub fn set_buffer(&mut self, buf: &'a mut [u8]) -> Result<()> {
        if buf.is_empty() {
            return Err(CodecError::InvalidArgument("encode buffer is empty"));
        }
        self.buf = buf;
        self.pos = 0;
        self.frames.clear();
        Ok(())
    }

    pub fn major_version(&self) -> u8 {
        self.major
    }

    pub fn minor_version(&self) -> u8 {
        self.minor
    }

    /// Bytes encoded so far. Meaningful once every init has been completed.
    pub fn encoded(&self) -> &[u8] {
        &self.buf[..self.pos]
    }

    pub fn encoded_len(&self) -> usize {
        self.pos
    }

    /// Bytes still available past the write position.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    // ---- byte-level writes ------------------------------------------------

    pub(crate) fn put_u8(&mut self, v: u8) -> Result<()> {
        self.pos = wire::put_u8(self.buf, self.pos, v)?;
        Ok(())
    }

    pub(crate) fn put_u16(&mut self, v: u16) -> Result<()> {
        self.pos = wire::put_u16(self.buf, self.pos, v)?;
        Ok(())
    }

    pub(crate) fn put_i16(&mut self, v: i16) -> Result<()> {
        self.pos = wire::put_i16(self.buf, self.pos, v)?;
        Ok(())
    }

    pub(crate) fn put_u32(&mut self, v: u32) -> Result<()> {
        self.pos = wire::put_u32(self.buf, self.pos, v)?;
        Ok(())
    }

    pub(crate) fn put_i32(&mut self, v: i32) -> Result<()> {
        self.pos = wire::put_i32(self.buf, self.pos, v)?;
        Ok(())
    }

    pub(crate) fn put_u15rb(&mut self, v: usize) -> Result<()> {
        self.pos = wire::put_u15rb(self.buf, self.pos, v)?;
        Ok(())
    }

    pub(crate) fn put_u16ob(&mut self, v: usize) -> Result<()> {
        self.pos = wire::put_u16ob(self.buf, self.pos, v)?;
        Ok(())
    }

    pub(crate) fn put_u30rb(&mut self, v: u32) -> Result<()> {
        self.pos = wire::put_u30rb(self.buf, self.pos, v)?;
        Ok(())
    }

    pub(crate) fn put_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.pos = wire::put_bytes(self.buf, self.pos, data)?;
        Ok(())
    }

    /// Append opaque bytes at the write position. For non-RWF content
    /// inside a caller-managed scope: a pending extended header, summary
    /// data, or an opaque message payload.
    pub fn append(&mut self, data: &[u8]) -> Result<()> {
        self.put_bytes(data)
    }

    /// Length-prefixed small buffer: u15-rb length then the bytes.
    pub(crate) fn put_b15(&mut self, data: &[u8]) -> Result<()> {
        self.put_u15rb(data.len())?;
        self.put_bytes(data)
    }

    /// Length-prefixed buffer: u16-ob length then the bytes.
    pub(crate) fn put_b16(&mut self, data: &[u8]) -> Result<()> {
        self.put_u16ob(data.len())?;
        self.put_bytes(data)
    }

    /// One-byte-prefixed buffer.
    pub(crate) fn put_b8(&mut self, data: &[u8]) -> Result<()> {
        if data.len() > u8::MAX as usize {
            return Err(CodecError::InvalidArgument("buffer exceeds 255 bytes"));
        }
        self.put_u8(data.len() as u8)?;
        self.put_bytes(data)
    }

    /// Minimal-width payload of a primitive value at the write position.
    pub(crate) fn put_primitive_ls(
        &mut self,
        value: &crate::primitive::PrimitiveValue<'_>,
    ) -> Result<()> {
        self.pos = value.encode_ls(self.buf, self.pos)?;
        Ok(())
    }

    /// Primitive payload padded to a declared fixed width (array slots).
    pub(crate) fn put_primitive_fixed(
        &mut self,
        value: &crate::primitive::PrimitiveValue<'_>,
        len: usize,
    ) -> Result<()> {
        self.pos = value.encode_fixed(self.buf, self.pos, len)?;
        Ok(())
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn set_position(&mut self, pos: usize) {
        debug_assert!(pos <= self.pos);
        self.pos = pos;
    }

    /// Back-patch a u16 written earlier (entry counts).
    pub(crate) fn patch_u16(&mut self, at: usize, v: u16) {
        self.buf[at] = (v >> 8) as u8;
        self.buf[at + 1] = v as u8;
    }

    pub(crate) fn patch_u8(&mut self, at: usize, v: u8) {
        self.buf[at] = v;
    }

    pub(crate) fn byte_at(&self, at: usize) -> u8 {
        self.buf[at]
    }

    // ---- reserved length marks -------------------------------------------

    /// Reserve a length slot at the write position. The slot is written at
    /// maximum width and finalized by [`finish_mark`].
    ///
    /// [`finish_mark`]: EncodeIterator::finish_mark
    pub(crate) fn reserve(&mut self, kind: MarkKind) -> Result<Mark> {
        let width = kind.reserved();
        if self.remaining() < width {
            return Err(CodecError::BufferTooSmall {
                needed: width,
                remaining: self.remaining(),
            });
        }
        let mark = Mark { pos: self.pos, kind };
        self.pos += width;
        Ok(mark)
    }

    /// Patch `mark` with the number of bytes written since the reservation.
    /// Short values collapse the slot to its one-byte form by sliding the
    /// content down, so the output matches a single-pass encode exactly.
    pub(crate) fn finish_mark(&mut self, mark: Mark) -> Result<()> {
        let content = mark.content_start();
        debug_assert!(content <= self.pos);
        let len = self.pos - content;
        match mark.kind {
            MarkKind::B8 => {
                if len > u8::MAX as usize {
                    return Err(CodecError::InvalidArgument("scope exceeds 255 bytes"));
                }
                self.buf[mark.pos] = len as u8;
            }
            MarkKind::B15 => {
                if len < 0x80 {
                    self.buf[mark.pos] = len as u8;
                    self.buf.copy_within(content..self.pos, mark.pos + 1);
                    self.pos -= 1;
                } else if len <= MAX_U15 as usize {
                    self.buf[mark.pos] = (len >> 8) as u8 | 0x80;
                    self.buf[mark.pos + 1] = len as u8;
                } else {
                    return Err(CodecError::InvalidArgument("scope exceeds 32767 bytes"));
                }
            }
            MarkKind::B16 => {
                if len < 0xFE {
                    self.buf[mark.pos] = len as u8;
                    self.buf.copy_within(content..self.pos, mark.pos + 1);
                    self.pos -= 2;
                } else if len <= u16::MAX as usize {
                    self.buf[mark.pos] = 0xFE;
                    self.buf[mark.pos + 1] = (len >> 8) as u8;
                    self.buf[mark.pos + 2] = len as u8;
                } else {
                    return Err(CodecError::InvalidArgument("scope exceeds 65535 bytes"));
                }
            }
            MarkKind::U16 => {
                if len > u16::MAX as usize {
                    return Err(CodecError::InvalidArgument("scope exceeds 65535 bytes"));
                }
                self.buf[mark.pos] = (len >> 8) as u8;
                self.buf[mark.pos + 1] = len as u8;
            }
        }
        Ok(())
    }

    // ---- frame stack ------------------------------------------------------

    pub(crate) fn push_frame(&mut self, kind: FrameKind, start_pos: usize) -> Result<()> {
        if self.frames.len() >= MAX_ENCODE_DEPTH {
            return Err(CodecError::IteratorOverrun { max: MAX_ENCODE_DEPTH });
        }
        self.frames.push(EncodeFrame::new(kind, start_pos));
        Ok(())
    }

    pub(crate) fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Current frame, which must have been opened by `kind`. Calling an
    /// entry or complete routine against the wrong container is misuse.
    pub(crate) fn frame_mut(&mut self, kind: FrameKind) -> &mut EncodeFrame {
        match self.frames.last_mut() {
            Some(frame) if frame.kind == kind => frame,
            Some(frame) => panic!(
                "encode call for {:?} while a {:?} frame is open",
                kind, frame.kind
            ),
            None => panic!("encode call for {:?} without a matching init", kind),
        }
    }

    pub(crate) fn pop_frame(&mut self, kind: FrameKind) -> EncodeFrame {
        // Validates pairing before popping.
        let _ = self.frame_mut(kind);
        match self.frames.pop() {
            Some(frame) => frame,
            None => unreachable!(),
        }
    }

    /// Drop the frame and rewind to its first byte, erasing everything the
    /// aborted scope wrote.
    pub(crate) fn rollback_frame(&mut self, kind: FrameKind) {
        let frame = self.pop_frame(kind);
        self.pos = frame.start_pos;
    }

    /// Run `f`, rewinding the write position if it fails. Keeps a failed
    /// entry from leaving half-written bytes behind.
    pub(crate) fn with_rollback<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let save = self.pos;
        match f(self) {
            Ok(v) => Ok(v),
            Err(e) => {
                self.pos = save;
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for EncodeIterator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodeIterator")
            .field("pos", &self.pos)
            .field("capacity", &self.buf.len())
            .field("depth", &self.frames.len())
            .finish()
    }
}
