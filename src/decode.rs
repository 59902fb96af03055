//! # Decode Iterator - Stateful Read Cursor
//!
//! ## Purpose
//!
//! A forward-only read position over a borrowed byte slice, plus a frame
//! stack mirroring the container nesting being walked. Each container
//! `decode` validates its fixed header and pushes a frame bounding the
//! entry region; entry decodes advance lazily and return `Ok(None)` once
//! the region is exhausted, popping the frame so the parent's iteration
//! resumes seamlessly. All decoded values borrow from the bound buffer;
//! nothing is copied.
//!
//! ## Safety Against Hostile Input
//!
//! Every read is bounds-checked against the innermost frame. Truncated or
//! self-contradictory input fails the smallest enclosing frame with
//! [`CodecError::Incomplete`] or [`CodecError::InvalidData`]; the iterator
//! never panics on input bytes and never reads outside the bound slice.

use crate::encode::{FrameKind, MAX_ENCODE_DEPTH};
use crate::error::{CodecError, Result};
use crate::wire;
use crate::{RWF_MAJOR_VERSION, RWF_MINOR_VERSION};

/// One container being walked: `end` bounds its payload, `remaining`
/// counts entries not yet visited, `next_entry` is where the next entry
/// header starts (the current entry's payload may end short of it).
#[derive(Debug)]
pub(crate) struct DecodeFrame {
    pub kind: FrameKind,
    pub end: usize,
    pub remaining: u16,
    pub next_entry: usize,
}

/// Read cursor over a borrowed buffer. Decoded strings, buffers, and entry
/// payloads all borrow from that buffer for the iterator's lifetime.
///
/// Re-decoding the same bytes is a matter of binding a fresh iterator;
/// iteration is forward-only and never mutates the input.
pub struct DecodeIterator<'a> {
    buf: &'a [u8],
    pos: usize,
    major: u8,
    minor: u8,
    frames: Vec<DecodeFrame>,
}

impl<'a> DecodeIterator<'a> {
    /// Bind the cursor to `buf` at the current protocol version.
    pub fn new(buf: &'a [u8]) -> Result<Self> {
        Self::with_version(buf, RWF_MAJOR_VERSION, RWF_MINOR_VERSION)
    }

    /// Bind at an explicit wire version carried out-of-band (e.g. from a
    /// connection handshake). Only the current major version is decodable.
    pub fn with_version(buf: &'a [u8], major: u8, minor: u8) -> Result<Self> {
        if major != RWF_MAJOR_VERSION {
            return Err(CodecError::UnsupportedVersion { major, minor });
        }
        Ok(DecodeIterator {
            buf,
            pos: 0,
            major,
            minor,
            frames: Vec::with_capacity(MAX_ENCODE_DEPTH),
        })
    }

    /// Rebind to different bytes, discarding iteration state.
    pub fn set_buffer(&mut self, buf: &'a [u8]) {
        self.buf = buf;
        self.pos = 0;
        self.frames.clear();
    }

    pub fn major_version(&self) -> u8 {
        self.major
    }

    pub fn minor_version(&self) -> u8 {
        self.minor
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn set_position(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// One past the last byte the current scope may read.
    pub(crate) fn limit(&self) -> usize {
        match self.frames.last() {
            Some(frame) => {
                if self.pos < frame.next_entry {
                    frame.next_entry
                } else {
                    frame.end
                }
            }
            None => self.buf.len(),
        }
    }

    pub(crate) fn remaining_in_scope(&self) -> usize {
        self.limit().saturating_sub(self.pos)
    }

    fn check(&self, need: usize) -> Result<()> {
        if self.pos + need > self.limit() {
            return Err(CodecError::Incomplete { offset: self.pos });
        }
        Ok(())
    }

    // ---- byte-level reads -------------------------------------------------

    pub(crate) fn get_u8(&mut self) -> Result<u8> {
        self.check(1)?;
        let (v, pos) = wire::get_u8(self.buf, self.pos)?;
        self.pos = pos;
        Ok(v)
    }

    pub(crate) fn get_u16(&mut self) -> Result<u16> {
        self.check(2)?;
        let (v, pos) = wire::get_u16(self.buf, self.pos)?;
        self.pos = pos;
        Ok(v)
    }

    pub(crate) fn get_i16(&mut self) -> Result<i16> {
        self.check(2)?;
        let (v, pos) = wire::get_i16(self.buf, self.pos)?;
        self.pos = pos;
        Ok(v)
    }

    pub(crate) fn get_u32(&mut self) -> Result<u32> {
        self.check(4)?;
        let (v, pos) = wire::get_u32(self.buf, self.pos)?;
        self.pos = pos;
        Ok(v)
    }

    pub(crate) fn get_i32(&mut self) -> Result<i32> {
        self.check(4)?;
        let (v, pos) = wire::get_i32(self.buf, self.pos)?;
        self.pos = pos;
        Ok(v)
    }

    pub(crate) fn get_u15rb(&mut self) -> Result<u16> {
        let (v, pos) = wire::get_u15rb(&self.buf[..self.limit()], self.pos)?;
        self.pos = pos;
        Ok(v)
    }

    pub(crate) fn get_u16ob(&mut self) -> Result<u16> {
        let (v, pos) = wire::get_u16ob(&self.buf[..self.limit()], self.pos)?;
        self.pos = pos;
        Ok(v)
    }

    pub(crate) fn get_u30rb(&mut self) -> Result<u32> {
        let (v, pos) = wire::get_u30rb(&self.buf[..self.limit()], self.pos)?;
        self.pos = pos;
        Ok(v)
    }

    /// Borrow the next `len` bytes.
    pub(crate) fn get_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.check(len)?;
        let span = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(span)
    }

    /// u8-length-prefixed buffer.
    pub(crate) fn get_b8(&mut self) -> Result<&'a [u8]> {
        let len = self.get_u8()? as usize;
        self.get_bytes(len)
    }

    /// u15-rb-length-prefixed buffer.
    pub(crate) fn get_b15(&mut self) -> Result<&'a [u8]> {
        let len = self.get_u15rb()? as usize;
        self.get_bytes(len)
    }

    /// u16-ob-length-prefixed buffer.
    pub(crate) fn get_b16(&mut self) -> Result<&'a [u8]> {
        let len = self.get_u16ob()? as usize;
        self.get_bytes(len)
    }

    /// Everything remaining in the current scope.
    pub(crate) fn get_rest(&mut self) -> Result<&'a [u8]> {
        self.get_bytes(self.remaining_in_scope())
    }

    /// Everything remaining in the current scope, without advancing.
    pub(crate) fn peek_rest(&self) -> &'a [u8] {
        &self.buf[self.pos..self.limit()]
    }

    // ---- frame stack ------------------------------------------------------

    /// Open a container frame spanning `[self.pos, end)` with `count`
    /// pending entries.
    pub(crate) fn push_frame(&mut self, kind: FrameKind, end: usize, count: u16) -> Result<()> {
        if self.frames.len() >= MAX_ENCODE_DEPTH {
            return Err(CodecError::IteratorOverrun { max: MAX_ENCODE_DEPTH });
        }
        if end > self.buf.len() {
            return Err(CodecError::Incomplete { offset: self.buf.len() });
        }
        self.frames.push(DecodeFrame {
            kind,
            end,
            remaining: count,
            next_entry: self.pos,
        });
        Ok(())
    }

    pub(crate) fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Current frame, which must belong to `kind`. Entry decodes against a
    /// container that was never decoded on this iterator are misuse.
    pub(crate) fn frame_mut(&mut self, kind: FrameKind) -> &mut DecodeFrame {
        match self.frames.last_mut() {
            Some(frame) if frame.kind == kind => frame,
            Some(frame) => panic!(
                "entry decode for {:?} while a {:?} frame is open",
                kind, frame.kind
            ),
            None => panic!("entry decode for {:?} without a decoded container", kind),
        }
    }

    /// Begin the next entry of the current `kind` frame: skips whatever the
    /// caller left unread of the previous entry, and ends the frame when
    /// the count is exhausted. Returns `false` once the container is done
    /// (the frame is popped and the cursor sits at the container's end).
    pub(crate) fn next_entry(&mut self, kind: FrameKind) -> Result<bool> {
        let frame = self.frame_mut(kind);
        let next = frame.next_entry;
        let end = frame.end;
        if frame.remaining == 0 {
            self.pos = end;
            self.frames.pop();
            return Ok(false);
        }
        frame.remaining -= 1;
        if next > end {
            return Err(CodecError::Incomplete { offset: end });
        }
        self.pos = next;
        Ok(true)
    }

    /// Record where the entry just parsed ends, so iteration can continue
    /// whether or not the caller consumes the payload.
    pub(crate) fn set_entry_end(&mut self, kind: FrameKind, end: usize) {
        let frame = self.frame_mut(kind);
        frame.next_entry = end;
    }

    /// Abandon the remaining entries of the current container and position
    /// at its end, resuming the parent's iteration.
    pub fn finish_entries(&mut self) {
        if let Some(frame) = self.frames.pop() {
            self.pos = frame.end;
        }
    }
}

impl std::fmt::Debug for DecodeIterator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodeIterator")
            .field("pos", &self.pos)
            .field("len", &self.buf.len())
            .field("depth", &self.frames.len())
            .finish()
    }
}
