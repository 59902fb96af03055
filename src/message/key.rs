//! Message key: the fields that name the item a stream carries. Encoded
//! as a u15-rb-sized block so decoders can skip key content they do not
//! recognize; everything inside is flag-gated.

use crate::container::{ContainerType, OpaqueData};
use crate::decode::DecodeIterator;
use crate::encode::{EncodeIterator, Mark, MarkKind};
use crate::error::{CodecError, Result};

const HAS_SERVICE_ID: u16 = 0x01;
const HAS_NAME: u16 = 0x02;
const HAS_NAME_TYPE: u16 = 0x04;
const HAS_FILTER: u16 = 0x08;
const HAS_IDENTIFIER: u16 = 0x10;
const HAS_ATTRIB: u16 = 0x20;

/// Well-known name types. `RIC` is the default when a name is carried
/// without an explicit type.
pub mod name_type {
    pub const UNSPECIFIED: u8 = 0;
    pub const RIC: u8 = 1;
    pub const CONTRIBUTOR: u8 = 2;
}

/// Item identity attached to a message header.
///
/// `name_type` is only meaningful alongside `name` and is dropped on
/// encode when no name is set. The attrib is an optional nested container
/// holding identity detail beyond the fixed fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsgKey<'a> {
    pub service_id: Option<u16>,
    pub name: Option<&'a [u8]>,
    pub name_type: Option<u8>,
    pub filter: Option<u32>,
    pub identifier: Option<i32>,
    pub attrib_container_type: ContainerType,
    pub attrib: OpaqueData<'a>,
}

impl Default for MsgKey<'_> {
    fn default() -> Self {
        MsgKey {
            service_id: None,
            name: None,
            name_type: None,
            filter: None,
            identifier: None,
            attrib_container_type: ContainerType::NoData,
            attrib: OpaqueData::None,
        }
    }
}

/// Outcome of [`MsgKey::encode`]: either the key block is closed, or it is
/// suspended on a pending attrib and both size marks await the matching
/// complete call.
pub(crate) enum KeyEncode {
    Done,
    Pending { key_mark: Mark, attrib_mark: Mark },
}

impl<'a> MsgKey<'a> {
    /// Key naming `name` on service `service_id`.
    pub fn with_name(service_id: u16, name: &'a [u8]) -> Self {
        MsgKey {
            service_id: Some(service_id),
            name: Some(name),
            ..Default::default()
        }
    }

    fn flags(&self) -> u16 {
        let mut flags = 0;
        if self.service_id.is_some() {
            flags |= HAS_SERVICE_ID;
        }
        if self.name.is_some() {
            flags |= HAS_NAME;
            if self.name_type.is_some() {
                flags |= HAS_NAME_TYPE;
            }
        }
        if self.filter.is_some() {
            flags |= HAS_FILTER;
        }
        if self.identifier.is_some() {
            flags |= HAS_IDENTIFIER;
        }
        if self.attrib.is_present() {
            flags |= HAS_ATTRIB;
        }
        flags
    }

    pub(crate) fn encode(&self, iter: &mut EncodeIterator<'_>) -> Result<KeyEncode> {
        if self.attrib.is_present() && self.attrib_container_type == ContainerType::NoData {
            return Err(CodecError::InvalidArgument(
                "key attrib requires a container type",
            ));
        }
        let key_mark = iter.reserve(MarkKind::B15)?;
        iter.put_u15rb(self.flags() as usize)?;
        if let Some(id) = self.service_id {
            iter.put_u16ob(id as usize)?;
        }
        if let Some(name) = self.name {
            iter.put_b8(name)?;
            if let Some(nt) = self.name_type {
                iter.put_u8(nt)?;
            }
        }
        if let Some(filter) = self.filter {
            iter.put_u32(filter)?;
        }
        if let Some(id) = self.identifier {
            iter.put_i32(id)?;
        }
        match self.attrib {
            OpaqueData::None => {
                iter.finish_mark(key_mark)?;
                Ok(KeyEncode::Done)
            }
            OpaqueData::PreEncoded(bytes) => {
                iter.put_u8(self.attrib_container_type.to_wire())?;
                iter.put_b15(bytes)?;
                iter.finish_mark(key_mark)?;
                Ok(KeyEncode::Done)
            }
            OpaqueData::Pending => {
                iter.put_u8(self.attrib_container_type.to_wire())?;
                let attrib_mark = iter.reserve(MarkKind::B15)?;
                Ok(KeyEncode::Pending {
                    key_mark,
                    attrib_mark,
                })
            }
        }
    }

    /// Decode a sized key block. The position always lands at the block
    /// end, so key fields from newer minor versions are skipped.
    pub(crate) fn decode(iter: &mut DecodeIterator<'a>) -> Result<MsgKey<'a>> {
        let key_size = iter.get_u15rb()? as usize;
        let key_end = iter.position() + key_size;
        if key_end > iter.limit() {
            return Err(CodecError::Incomplete {
                offset: iter.limit(),
            });
        }
        let flags = iter.get_u15rb()?;
        let mut key = MsgKey::default();
        if flags & HAS_SERVICE_ID != 0 {
            key.service_id = Some(iter.get_u16ob()?);
        }
        if flags & HAS_NAME != 0 {
            key.name = Some(iter.get_b8()?);
            if flags & HAS_NAME_TYPE != 0 {
                key.name_type = Some(iter.get_u8()?);
            }
        }
        if flags & HAS_FILTER != 0 {
            key.filter = Some(iter.get_u32()?);
        }
        if flags & HAS_IDENTIFIER != 0 {
            key.identifier = Some(iter.get_i32()?);
        }
        if flags & HAS_ATTRIB != 0 {
            let ct = ContainerType::from_wire(iter.get_u8()?)?;
            key.attrib_container_type = ct;
            if ct != ContainerType::NoData {
                key.attrib = OpaqueData::PreEncoded(iter.get_b15()?);
            }
        }
        iter.set_position(key_end);
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(key: MsgKey<'_>, buf: &mut [u8]) -> usize {
        let mut iter = EncodeIterator::new(buf).unwrap();
        match key.encode(&mut iter).unwrap() {
            KeyEncode::Done => {}
            KeyEncode::Pending { .. } => panic!("unexpected pending attrib"),
        }
        iter.encoded_len()
    }

    #[test]
    fn name_and_service_roundtrip() {
        let key = MsgKey {
            name_type: Some(name_type::RIC),
            ..MsgKey::with_name(260, b"IBM.N")
        };
        let mut buf = [0u8; 64];
        let len = roundtrip(key, &mut buf);
        let mut iter = DecodeIterator::new(&buf[..len]).unwrap();
        let decoded = MsgKey::decode(&mut iter).unwrap();
        assert_eq!(decoded, key);
    }

    #[test]
    fn all_fixed_fields_roundtrip() {
        let key = MsgKey {
            service_id: Some(1),
            name: Some(b"TRI.TO"),
            name_type: None,
            filter: Some(0x0000_0015),
            identifier: Some(-7),
            ..Default::default()
        };
        let mut buf = [0u8; 64];
        let len = roundtrip(key, &mut buf);
        let mut iter = DecodeIterator::new(&buf[..len]).unwrap();
        assert_eq!(MsgKey::decode(&mut iter).unwrap(), key);
    }

    #[test]
    fn unknown_trailing_key_content_skipped() {
        // An empty key block declaring 4 bytes: flags plus three bytes of
        // content this version does not define.
        let wire = [4u8, 0, 0xAA, 0xBB, 0xCC, 0x77];
        let mut iter = DecodeIterator::new(&wire).unwrap();
        let key = MsgKey::decode(&mut iter).unwrap();
        assert_eq!(key, MsgKey::default());
        // Position lands past the declared block, at the trailing byte.
        assert_eq!(iter.get_u8().unwrap(), 0x77);
    }

    #[test]
    fn attrib_without_container_type_rejected() {
        let key = MsgKey {
            attrib: OpaqueData::PreEncoded(b"x"),
            ..Default::default()
        };
        let mut buf = [0u8; 64];
        let mut iter = EncodeIterator::new(&mut buf).unwrap();
        assert!(matches!(
            key.encode(&mut iter),
            Err(CodecError::InvalidArgument(_))
        ));
    }

    #[test]
    fn truncated_key_block_rejected() {
        // Declares 10 bytes of key but the buffer ends first.
        let wire = [10u8, 0];
        let mut iter = DecodeIterator::new(&wire).unwrap();
        assert!(matches!(
            MsgKey::decode(&mut iter),
            Err(CodecError::Incomplete { .. })
        ));
    }
}
