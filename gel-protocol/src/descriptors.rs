//! The type descriptor tree the server attaches to a `Prepare` response.
//!
//! Descriptors are emitted leaf-first in one contiguous blob; this module
//! parses that blob into an arena (`Vec<Descriptor>`) addressed by
//! position, not by the server's 16-byte id, so that looking a node up
//! while decoding a row never needs a hash lookup.

use bytes::Buf;
use snafu::ensure;
use uuid::Uuid;

use crate::encoding::{Decode, Input};
use crate::errors::{self, DecodeError};

/// Index into the flat descriptor arena produced by [`TypeDescriptors::decode`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypePos(pub u16);

/// Sentinel descriptor id meaning "no type" (used for the `Nothing` value
/// and for queries with no parameters).
pub const NIL_ID: Uuid = Uuid::from_u128(0);

#[derive(Debug, Clone)]
pub enum Descriptor {
    Set(SetDescriptor),
    BaseScalar(BaseScalarTypeDescriptor),
    ScalarAlias(ScalarTypeDescriptor),
    Tuple(TupleTypeDescriptor),
    NamedTuple(NamedTupleTypeDescriptor),
    Array(ArrayTypeDescriptor),
    Enumeration(EnumerationTypeDescriptor),
    ObjectShape(ObjectShapeDescriptor),
    Range(RangeTypeDescriptor),
}

impl Descriptor {
    pub fn id(&self) -> &Uuid {
        match self {
            Descriptor::Set(d) => &d.id,
            Descriptor::BaseScalar(d) => &d.id,
            Descriptor::ScalarAlias(d) => &d.id,
            Descriptor::Tuple(d) => &d.id,
            Descriptor::NamedTuple(d) => &d.id,
            Descriptor::Array(d) => &d.id,
            Descriptor::Enumeration(d) => &d.id,
            Descriptor::ObjectShape(d) => &d.id,
            Descriptor::Range(d) => &d.id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SetDescriptor {
    pub id: Uuid,
    pub type_pos: TypePos,
}

#[derive(Debug, Clone)]
pub struct BaseScalarTypeDescriptor {
    pub id: Uuid,
}

#[derive(Debug, Clone)]
pub struct ScalarTypeDescriptor {
    pub id: Uuid,
    pub base_type_pos: TypePos,
}

#[derive(Debug, Clone)]
pub struct TupleTypeDescriptor {
    pub id: Uuid,
    pub element_types: Vec<TypePos>,
}

#[derive(Debug, Clone)]
pub struct TupleElement {
    pub name: String,
    pub type_pos: TypePos,
}

#[derive(Debug, Clone)]
pub struct NamedTupleTypeDescriptor {
    pub id: Uuid,
    pub elements: Vec<TupleElement>,
}

#[derive(Debug, Clone)]
pub struct ArrayTypeDescriptor {
    pub id: Uuid,
    pub type_pos: TypePos,
    pub dimensions: Vec<Option<u32>>,
}

#[derive(Debug, Clone)]
pub struct EnumerationTypeDescriptor {
    pub id: Uuid,
    pub members: Vec<String>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Cardinality {
    AtMostOne,
    One,
}

#[derive(Debug, Clone)]
pub struct ShapeElement {
    pub flag_implicit: bool,
    pub flag_link_property: bool,
    pub flag_link: bool,
    pub cardinality: Option<Cardinality>,
    pub name: String,
    pub type_pos: TypePos,
}

#[derive(Debug, Clone)]
pub struct ObjectShapeDescriptor {
    pub id: Uuid,
    pub ephemeral_free_shape: bool,
    pub elements: Vec<ShapeElement>,
}

#[derive(Debug, Clone)]
pub struct RangeTypeDescriptor {
    pub id: Uuid,
    pub type_pos: TypePos,
}

const SET: u8 = 0;
const OBJECT_SHAPE: u8 = 1;
const BASE_SCALAR: u8 = 2;
const SCALAR: u8 = 3;
const TUPLE: u8 = 4;
const NAMED_TUPLE: u8 = 5;
const ARRAY: u8 = 6;
const ENUMERATION: u8 = 7;
const RANGE: u8 = 9;

/// The parsed descriptor tree for one query's input or output shape.
#[derive(Debug, Clone)]
pub struct Typedesc {
    proto: crate::features::ProtocolVersion,
    array: Vec<Descriptor>,
    root_id: Uuid,
    root_pos: Option<TypePos>,
}

impl Typedesc {
    pub fn root_id(&self) -> &Uuid {
        &self.root_id
    }

    pub fn root_pos(&self) -> Option<TypePos> {
        self.root_pos
    }

    pub fn descriptors(&self) -> &[Descriptor] {
        &self.array
    }

    pub fn get(&self, pos: TypePos) -> Result<&Descriptor, DecodeError> {
        self.array
            .get(pos.0 as usize)
            .ok_or_else(|| errors::UnexpectedTypePos { position: pos.0 }.build())
    }

    /// Parse a `CommandDataDescription` body: a 16-byte root id followed by
    /// a sequence of length-implicit descriptor records, emitted leaves
    /// first so that a later entry may reference an earlier `TypePos`.
    pub fn decode_with_id(
        proto: crate::features::ProtocolVersion,
        root_id: Uuid,
        mut buf: Input,
    ) -> Result<Typedesc, DecodeError> {
        if root_id == NIL_ID {
            return Ok(Typedesc {
                proto,
                array: Vec::new(),
                root_id,
                root_pos: None,
            });
        }
        let mut array = Vec::new();
        while buf.remaining() > 0 {
            let desc = decode_descriptor(&mut buf)?;
            array.push(desc);
        }
        let root_pos = array
            .iter()
            .position(|d| d.id() == &root_id)
            .map(|i| TypePos(i as u16));
        Ok(Typedesc {
            proto,
            array,
            root_id,
            root_pos,
        })
    }

    pub fn proto(&self) -> &crate::features::ProtocolVersion {
        &self.proto
    }
}

fn decode_descriptor(buf: &mut Input) -> Result<Descriptor, DecodeError> {
    ensure!(buf.remaining() >= 1, errors::Underflow);
    let tag = buf.get_u8();
    ensure!(buf.remaining() >= 16, errors::Underflow);
    let id = Uuid::decode(buf)?;
    match tag {
        SET => {
            ensure!(buf.remaining() >= 2, errors::Underflow);
            let type_pos = TypePos(buf.get_u16());
            Ok(Descriptor::Set(SetDescriptor { id, type_pos }))
        }
        BASE_SCALAR => Ok(Descriptor::BaseScalar(BaseScalarTypeDescriptor { id })),
        SCALAR => {
            ensure!(buf.remaining() >= 2, errors::Underflow);
            let base_type_pos = TypePos(buf.get_u16());
            Ok(Descriptor::ScalarAlias(ScalarTypeDescriptor {
                id,
                base_type_pos,
            }))
        }
        TUPLE => {
            ensure!(buf.remaining() >= 2, errors::Underflow);
            let count = buf.get_u16();
            let mut element_types = Vec::with_capacity(count as usize);
            for _ in 0..count {
                ensure!(buf.remaining() >= 2, errors::Underflow);
                element_types.push(TypePos(buf.get_u16()));
            }
            Ok(Descriptor::Tuple(TupleTypeDescriptor { id, element_types }))
        }
        NAMED_TUPLE => {
            ensure!(buf.remaining() >= 2, errors::Underflow);
            let count = buf.get_u16();
            let mut elements = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let name = String::decode(buf)?;
                ensure!(buf.remaining() >= 2, errors::Underflow);
                let type_pos = TypePos(buf.get_u16());
                elements.push(TupleElement { name, type_pos });
            }
            Ok(Descriptor::NamedTuple(NamedTupleTypeDescriptor {
                id,
                elements,
            }))
        }
        ARRAY => {
            ensure!(buf.remaining() >= 2, errors::Underflow);
            let type_pos = TypePos(buf.get_u16());
            ensure!(buf.remaining() >= 2, errors::Underflow);
            let ndims = buf.get_u16();
            let mut dimensions = Vec::with_capacity(ndims as usize);
            for _ in 0..ndims {
                ensure!(buf.remaining() >= 4, errors::Underflow);
                let dim = buf.get_i32();
                dimensions.push(if dim < 0 { None } else { Some(dim as u32) });
            }
            Ok(Descriptor::Array(ArrayTypeDescriptor {
                id,
                type_pos,
                dimensions,
            }))
        }
        ENUMERATION => {
            ensure!(buf.remaining() >= 2, errors::Underflow);
            let count = buf.get_u16();
            let mut members = Vec::with_capacity(count as usize);
            for _ in 0..count {
                members.push(String::decode(buf)?);
            }
            Ok(Descriptor::Enumeration(EnumerationTypeDescriptor {
                id,
                members,
            }))
        }
        RANGE => {
            ensure!(buf.remaining() >= 2, errors::Underflow);
            let type_pos = TypePos(buf.get_u16());
            Ok(Descriptor::Range(RangeTypeDescriptor { id, type_pos }))
        }
        OBJECT_SHAPE => {
            ensure!(buf.remaining() >= 1, errors::Underflow);
            let ephemeral_free_shape = buf.get_u8() != 0;
            ensure!(buf.remaining() >= 2, errors::Underflow);
            let count = buf.get_u16();
            let mut elements = Vec::with_capacity(count as usize);
            for _ in 0..count {
                ensure!(buf.remaining() >= 1, errors::Underflow);
                let flags = buf.get_u8();
                ensure!(buf.remaining() >= 1, errors::Underflow);
                let cardinality = match buf.get_u8() {
                    0x6f => Some(Cardinality::AtMostOne),
                    0x41 => Some(Cardinality::One),
                    _ => None,
                };
                let name = String::decode(buf)?;
                ensure!(buf.remaining() >= 2, errors::Underflow);
                let type_pos = TypePos(buf.get_u16());
                elements.push(ShapeElement {
                    flag_implicit: flags & 0b001 != 0,
                    flag_link_property: flags & 0b010 != 0,
                    flag_link: flags & 0b100 != 0,
                    cardinality,
                    name,
                    type_pos,
                });
            }
            Ok(Descriptor::ObjectShape(ObjectShapeDescriptor {
                id,
                ephemeral_free_shape,
                elements,
            }))
        }
        other => errors::InvalidTypeDescriptor { descriptor: other }.fail(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{BufMut, BytesMut};

    #[test]
    fn empty_typedesc_has_no_root() {
        let td = Typedesc::decode_with_id(
            crate::features::ProtocolVersion::current(),
            NIL_ID,
            Input::new(crate::features::ProtocolVersion::current(), bytes::Bytes::new()),
        )
        .unwrap();
        assert_eq!(td.root_pos(), None);
        assert!(td.descriptors().is_empty());
    }

    #[test]
    fn parses_single_base_scalar() {
        let root = Uuid::from_u128(0x103);
        let mut raw = BytesMut::new();
        raw.put_u8(BASE_SCALAR);
        raw.extend_from_slice(root.as_bytes());
        let input = Input::new(
            crate::features::ProtocolVersion::current(),
            raw.freeze(),
        );
        let td = Typedesc::decode_with_id(
            crate::features::ProtocolVersion::current(),
            root,
            input,
        )
        .unwrap();
        assert_eq!(td.root_id(), &root);
        assert_eq!(td.root_pos(), Some(TypePos(0)));
        assert_eq!(td.descriptors().len(), 1);
    }
}
