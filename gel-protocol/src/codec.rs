//! Well-known base-scalar type ids and the shared shape types used by
//! [`crate::value::Value`] for objects, named tuples and enums.

use std::sync::Arc;

use crate::descriptors::Cardinality;
use crate::model::Uuid;

macro_rules! well_known {
    ($name:ident, $low:expr) => {
        pub const $name: Uuid = Uuid::from_u128($low);
    };
}

well_known!(STD_UUID, 0x100);
well_known!(STD_STR, 0x101);
well_known!(STD_BYTES, 0x102);
well_known!(STD_INT16, 0x103);
well_known!(STD_INT32, 0x104);
well_known!(STD_INT64, 0x105);
well_known!(STD_FLOAT32, 0x106);
well_known!(STD_FLOAT64, 0x107);
well_known!(STD_DECIMAL, 0x108);
well_known!(STD_BOOL, 0x109);
well_known!(STD_DATETIME, 0x10a);
well_known!(CAL_LOCAL_DATETIME, 0x10b);
well_known!(CAL_LOCAL_DATE, 0x10c);
well_known!(CAL_LOCAL_TIME, 0x10d);
well_known!(STD_DURATION, 0x10e);
well_known!(CFG_MEMORY, 0x10f);
well_known!(STD_BIGINT, 0x110);
well_known!(CAL_RELATIVE_DURATION, 0x111);
well_known!(CAL_DATE_DURATION, 0x112);
well_known!(STD_JSON, 0x113);
well_known!(PGVECTOR_VECTOR, 0x9565dd88_f8e9_11ec_b932_0242ac120002);

/// One field of an object shape or named tuple as carried over the wire:
/// its name, whether it may be absent (`AtMostOne`) and link/property flags.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShapeElement {
    pub name: String,
    pub flag_implicit: bool,
    pub flag_link_property: bool,
    pub flag_link: bool,
    pub cardinality: Option<Cardinality>,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) struct ObjectShapeInfo {
    pub elements: Vec<ShapeElement>,
}

/// Shared, reference-counted field metadata for one decoded object shape.
///
/// Cloning an `ObjectShape` is cheap: every row of the same result set
/// shares the same `Arc`.
#[derive(Clone, Debug)]
pub struct ObjectShape(pub(crate) Arc<ObjectShapeInfo>);

impl PartialEq for ObjectShape {
    fn eq(&self, other: &ObjectShape) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl ObjectShape {
    pub fn new(elements: Vec<ShapeElement>) -> ObjectShape {
        ObjectShape(Arc::new(ObjectShapeInfo { elements }))
    }

    pub fn elements(&self) -> &[ShapeElement] {
        &self.0.elements
    }
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) struct NamedTupleShapeInfo {
    pub elements: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct NamedTupleShape(pub(crate) Arc<NamedTupleShapeInfo>);

impl PartialEq for NamedTupleShape {
    fn eq(&self, other: &NamedTupleShape) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl NamedTupleShape {
    pub fn new(elements: Vec<String>) -> NamedTupleShape {
        NamedTupleShape(Arc::new(NamedTupleShapeInfo { elements }))
    }

    pub fn elements(&self) -> &[String] {
        &self.0.elements
    }
}

/// A decoded value of an enumeration type: the label string plus the
/// enum's type id, so two enums with the same label but different
/// declared types never compare equal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumValue {
    pub label: String,
}

impl EnumValue {
    pub fn as_str(&self) -> &str {
        &self.label
    }
}

impl From<&str> for EnumValue {
    fn from(s: &str) -> EnumValue {
        EnumValue { label: s.to_owned() }
    }
}

impl From<String> for EnumValue {
    fn from(label: String) -> EnumValue {
        EnumValue { label }
    }
}
