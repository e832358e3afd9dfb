//! The dynamically-typed [`Value`] tree produced when decoding without a
//! statically-known Rust type (e.g. introspection queries, the CLI).

use std::sync::Arc;

use bytes::{Buf, Bytes};
use snafu::ensure;

pub use crate::codec::EnumValue;
use crate::codec::{NamedTupleShape, ObjectShape, ShapeElement};
use crate::descriptors::{Descriptor, TypePos};
use crate::errors::{self, DecodeError};
use crate::model::{BigInt, ConfigMemory, DateDuration, Datetime, Decimal, Duration, Json};
use crate::model::{LocalDate, LocalDatetime, LocalTime, Range, RelativeDuration, Uuid, Vector};
use crate::queryable::Decoder;
use crate::serialization::decode::{DecodeArrayLike, DecodeTupleLike, RawCodec};

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Nothing,
    Uuid(Uuid),
    Str(String),
    Bytes(Bytes),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    BigInt(BigInt),
    ConfigMemory(ConfigMemory),
    Decimal(Decimal),
    Bool(bool),
    Datetime(Datetime),
    LocalDatetime(LocalDatetime),
    LocalDate(LocalDate),
    LocalTime(LocalTime),
    Duration(Duration),
    RelativeDuration(RelativeDuration),
    DateDuration(DateDuration),
    Json(Json),
    Set(Vec<Value>),
    Object {
        shape: ObjectShape,
        fields: Vec<Option<Value>>,
    },
    Tuple(Vec<Value>),
    NamedTuple {
        shape: NamedTupleShape,
        fields: Vec<Value>,
    },
    Array(Vec<Value>),
    Vector(Vector),
    Enum(EnumValue),
    Range(Range<Box<Value>>),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        use Value::*;
        match self {
            Array(..) => "array",
            BigInt(..) => "bigint",
            Bool(..) => "bool",
            Bytes(..) => "bytes",
            ConfigMemory(..) => "cfg::memory",
            DateDuration(..) => "cal::date_duration",
            Datetime(..) => "datetime",
            Decimal(..) => "decimal",
            Duration(..) => "duration",
            Enum(..) => "enum",
            Float32(..) => "float32",
            Float64(..) => "float64",
            Int16(..) => "int16",
            Int32(..) => "int32",
            Int64(..) => "int64",
            Json(..) => "json",
            LocalDate(..) => "cal::local_date",
            LocalDatetime(..) => "cal::local_datetime",
            LocalTime(..) => "cal::local_time",
            NamedTuple { .. } => "named_tuple",
            Nothing => "nothing",
            Object { .. } => "object",
            Range(..) => "range",
            RelativeDuration(..) => "cal::relative_duration",
            Set(..) => "set",
            Str(..) => "str",
            Tuple(..) => "tuple",
            Uuid(..) => "uuid",
            Vector(..) => "ext::pgvector::vector",
        }
    }

    pub fn empty_tuple() -> Value {
        Value::Tuple(Vec::new())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::Str(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::Str(s.to_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Bool(b)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Value {
        Value::Int16(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Value {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Value {
        Value::Int64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Value {
        Value::Float32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Value {
        Value::Float64(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Value {
        Value::Uuid(v)
    }
}

/// The full set of field names/metadata for one object shape or named
/// tuple, wrapped in an `Arc` so decoded rows that share a descriptor
/// share one allocation instead of cloning the shape per row.
pub(crate) fn arc_eq<T: PartialEq>(a: &Arc<T>, b: &Arc<T>) -> bool {
    Arc::ptr_eq(a, b) || **a == **b
}

/// Decode one value with no statically-known Rust type, walking the
/// server's descriptor tree recursively instead of consulting a codec
/// built ahead of time.
pub(crate) fn decode_value(
    descriptors: &[Descriptor],
    decoder: &Decoder,
    type_pos: TypePos,
    buf: &[u8],
) -> Result<Value, DecodeError> {
    let desc = descriptors
        .get(type_pos.0 as usize)
        .ok_or_else(|| errors::UnexpectedTypePos { position: type_pos.0 }.build())?;
    match desc {
        Descriptor::BaseScalar(d) => decode_base_scalar(d.id, buf),
        Descriptor::ScalarAlias(d) => decode_value(descriptors, decoder, d.base_type_pos, buf),
        Descriptor::Tuple(d) => {
            let mut elements = DecodeTupleLike::new_tuple(buf, d.element_types.len())?;
            let mut fields = Vec::with_capacity(d.element_types.len());
            for &pos in &d.element_types {
                let value = match elements.read()? {
                    Some(bytes) => decode_value(descriptors, decoder, pos, bytes)?,
                    None => Value::Nothing,
                };
                fields.push(value);
            }
            Ok(Value::Tuple(fields))
        }
        Descriptor::NamedTuple(d) => {
            let mut elements = DecodeTupleLike::new_tuple(buf, d.elements.len())?;
            let mut names = Vec::with_capacity(d.elements.len());
            let mut fields = Vec::with_capacity(d.elements.len());
            for element in &d.elements {
                names.push(element.name.clone());
                let value = match elements.read()? {
                    Some(bytes) => decode_value(descriptors, decoder, element.type_pos, bytes)?,
                    None => Value::Nothing,
                };
                fields.push(value);
            }
            Ok(Value::NamedTuple {
                shape: NamedTupleShape::new(names),
                fields,
            })
        }
        Descriptor::ObjectShape(d) => {
            let mut elements = DecodeTupleLike::new_object(buf, d.elements.len())?;
            let mut shape_elements = Vec::with_capacity(d.elements.len());
            let mut fields = Vec::with_capacity(d.elements.len());
            for element in &d.elements {
                shape_elements.push(ShapeElement {
                    name: element.name.clone(),
                    flag_implicit: element.flag_implicit,
                    flag_link_property: element.flag_link_property,
                    flag_link: element.flag_link,
                    cardinality: element.cardinality,
                });
                let value = match elements.read()? {
                    Some(bytes) => Some(decode_value(descriptors, decoder, element.type_pos, bytes)?),
                    None => None,
                };
                fields.push(value);
            }
            Ok(Value::Object {
                shape: ObjectShape::new(shape_elements),
                fields,
            })
        }
        Descriptor::Array(d) => {
            let items = DecodeArrayLike::new_array(buf)?;
            let mut result = Vec::with_capacity(items.len());
            for item in items {
                result.push(decode_value(descriptors, decoder, d.type_pos, item?)?);
            }
            Ok(Value::Array(result))
        }
        Descriptor::Set(d) => {
            let items = DecodeArrayLike::new_collection(buf)?;
            let mut result = Vec::with_capacity(items.len());
            for item in items {
                result.push(decode_value(descriptors, decoder, d.type_pos, item?)?);
            }
            Ok(Value::Set(result))
        }
        Descriptor::Enumeration(_) => Ok(Value::Enum(EnumValue::from(<&str as RawCodec>::decode(buf)?))),
        Descriptor::Range(d) => decode_range(descriptors, decoder, d.type_pos, buf),
    }
}

fn decode_base_scalar(id: Uuid, buf: &[u8]) -> Result<Value, DecodeError> {
    use crate::codec::*;
    Ok(match id {
        STD_UUID => Value::Uuid(<Uuid as RawCodec>::decode(buf)?),
        STD_STR => Value::Str(<String as RawCodec>::decode(buf)?),
        STD_BYTES => Value::Bytes(<Bytes as RawCodec>::decode(buf)?),
        STD_INT16 => Value::Int16(<i16 as RawCodec>::decode(buf)?),
        STD_INT32 => Value::Int32(<i32 as RawCodec>::decode(buf)?),
        STD_INT64 => Value::Int64(<i64 as RawCodec>::decode(buf)?),
        STD_FLOAT32 => Value::Float32(<f32 as RawCodec>::decode(buf)?),
        STD_FLOAT64 => Value::Float64(<f64 as RawCodec>::decode(buf)?),
        STD_DECIMAL => Value::Decimal(<Decimal as RawCodec>::decode(buf)?),
        STD_BOOL => Value::Bool(<bool as RawCodec>::decode(buf)?),
        STD_DATETIME => Value::Datetime(<Datetime as RawCodec>::decode(buf)?),
        CAL_LOCAL_DATETIME => Value::LocalDatetime(<LocalDatetime as RawCodec>::decode(buf)?),
        CAL_LOCAL_DATE => Value::LocalDate(<LocalDate as RawCodec>::decode(buf)?),
        CAL_LOCAL_TIME => Value::LocalTime(<LocalTime as RawCodec>::decode(buf)?),
        STD_DURATION => Value::Duration(<Duration as RawCodec>::decode(buf)?),
        CFG_MEMORY => Value::ConfigMemory(<ConfigMemory as RawCodec>::decode(buf)?),
        STD_BIGINT => Value::BigInt(<BigInt as RawCodec>::decode(buf)?),
        CAL_RELATIVE_DURATION => Value::RelativeDuration(<RelativeDuration as RawCodec>::decode(buf)?),
        CAL_DATE_DURATION => Value::DateDuration(<DateDuration as RawCodec>::decode(buf)?),
        STD_JSON => Value::Json(<Json as RawCodec>::decode(buf)?),
        PGVECTOR_VECTOR => Value::Vector(decode_vector(buf)?),
        other => {
            return Err(errors::DescriptorMismatch {
                message: format!("unknown base scalar type {other}"),
            }
            .build())
        }
    })
}

fn decode_vector(mut buf: &[u8]) -> Result<Vector, DecodeError> {
    ensure!(buf.remaining() >= 4, errors::Underflow);
    let length = buf.get_u16() as usize;
    let _reserved = buf.get_u16();
    ensure!(buf.remaining() >= length * 4, errors::Underflow);
    let items = (0..length).map(|_| buf.get_f32()).collect();
    Ok(Vector(items))
}

fn decode_range(
    descriptors: &[Descriptor],
    decoder: &Decoder,
    type_pos: TypePos,
    mut buf: &[u8],
) -> Result<Value, DecodeError> {
    ensure!(buf.remaining() >= 1, errors::Underflow);
    let flags = buf.get_u8();
    let (lb_inf, ub_inf, empty) = crate::model::range_flags_bits(flags);
    let lower = if empty || lb_inf {
        None
    } else {
        ensure!(buf.remaining() >= 4, errors::Underflow);
        let len = buf.get_i32() as usize;
        ensure!(buf.remaining() >= len, errors::Underflow);
        let item = &buf[..len];
        buf.advance(len);
        Some(Box::new(decode_value(descriptors, decoder, type_pos, item)?))
    };
    let upper = if empty || ub_inf {
        None
    } else {
        ensure!(buf.remaining() >= 4, errors::Underflow);
        let len = buf.get_i32() as usize;
        ensure!(buf.remaining() >= len, errors::Underflow);
        let item = &buf[..len];
        buf.advance(len);
        Some(Box::new(decode_value(descriptors, decoder, type_pos, item)?))
    };
    Ok(Value::Range(Range::from_parts(flags, lower, upper)))
}
