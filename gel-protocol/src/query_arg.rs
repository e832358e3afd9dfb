//! Encode-side counterpart of [`crate::queryable::Queryable`]: turns Rust
//! values into the wire's length-prefixed element form, checked against the
//! same [`DescriptorContext`] used for decoding.

use bytes::{BufMut, Bytes};

use crate::descriptors::{Descriptor, TypePos};
use crate::errors::EncodeError;
use crate::model::{BigInt, ConfigMemory, DateDuration, Datetime, Decimal, Duration, Json};
use crate::model::{LocalDate, LocalDatetime, LocalTime, RelativeDuration, Uuid};
use crate::queryable::{DescriptorContext, DescriptorMismatch};
use crate::serialization::decode::queryable::scalars::check_scalar;

/// A single query parameter value, encoded as raw element bytes (no
/// length prefix -- the caller adds that, matching `Decoder`'s raw slices).
pub trait QueryArg: Sized {
    /// `None` means SQL/EdgeQL `{}` (an empty set / missing value).
    fn encode_arg(&self, buf: &mut Vec<u8>) -> Result<(), EncodeError>;

    /// Confirms the positional parameter descriptor matches this Rust type.
    fn check_descriptor(ctx: &DescriptorContext, type_pos: TypePos) -> Result<(), DescriptorMismatch>;
}

impl<T: QueryArg> QueryArg for Option<T> {
    fn encode_arg(&self, buf: &mut Vec<u8>) -> Result<(), EncodeError> {
        match self {
            Some(v) => v.encode_arg(buf),
            None => Ok(()),
        }
    }

    fn check_descriptor(ctx: &DescriptorContext, type_pos: TypePos) -> Result<(), DescriptorMismatch> {
        T::check_descriptor(ctx, type_pos)
    }
}

macro_rules! scalar_arg {
    ($ty:ty, $uuid:expr, $name:expr, |$val:ident, $buf:ident| $body:block) => {
        impl QueryArg for $ty {
            fn encode_arg(&self, $buf: &mut Vec<u8>) -> Result<(), EncodeError> {
                let $val = self;
                $body
            }

            fn check_descriptor(
                ctx: &DescriptorContext,
                type_pos: TypePos,
            ) -> Result<(), DescriptorMismatch> {
                check_scalar(ctx, type_pos, $uuid, $name)
            }
        }
    };
}

scalar_arg!(String, crate::codec::STD_STR, "std::str", |v, buf| {
    buf.extend_from_slice(v.as_bytes());
    Ok(())
});
scalar_arg!(bool, crate::codec::STD_BOOL, "std::bool", |v, buf| {
    buf.put_u8(if *v { 1 } else { 0 });
    Ok(())
});
scalar_arg!(i16, crate::codec::STD_INT16, "std::int16", |v, buf| {
    buf.put_i16(*v);
    Ok(())
});
scalar_arg!(i32, crate::codec::STD_INT32, "std::int32", |v, buf| {
    buf.put_i32(*v);
    Ok(())
});
scalar_arg!(i64, crate::codec::STD_INT64, "std::int64", |v, buf| {
    buf.put_i64(*v);
    Ok(())
});
scalar_arg!(f32, crate::codec::STD_FLOAT32, "std::float32", |v, buf| {
    buf.put_f32(*v);
    Ok(())
});
scalar_arg!(f64, crate::codec::STD_FLOAT64, "std::float64", |v, buf| {
    buf.put_f64(*v);
    Ok(())
});
scalar_arg!(Uuid, crate::codec::STD_UUID, "std::uuid", |v, buf| {
    buf.extend_from_slice(v.as_bytes());
    Ok(())
});
scalar_arg!(Bytes, crate::codec::STD_BYTES, "std::bytes", |v, buf| {
    buf.extend_from_slice(v);
    Ok(())
});
scalar_arg!(ConfigMemory, crate::codec::CFG_MEMORY, "cfg::memory", |v, buf| {
    buf.put_i64(v.0);
    Ok(())
});
scalar_arg!(Datetime, crate::codec::STD_DATETIME, "std::datetime", |v, buf| {
    buf.put_i64(v.micros);
    Ok(())
});
scalar_arg!(
    LocalDatetime,
    crate::codec::CAL_LOCAL_DATETIME,
    "cal::local_datetime",
    |v, buf| {
        buf.put_i64(v.micros);
        Ok(())
    }
);
scalar_arg!(LocalDate, crate::codec::CAL_LOCAL_DATE, "cal::local_date", |v, buf| {
    buf.put_i32(v.to_days());
    Ok(())
});
scalar_arg!(LocalTime, crate::codec::CAL_LOCAL_TIME, "cal::local_time", |v, buf| {
    buf.put_i64(v.to_micros() as i64);
    Ok(())
});
scalar_arg!(Duration, crate::codec::STD_DURATION, "std::duration", |v, buf| {
    buf.put_i64(v.to_micros());
    buf.put_u32(0);
    buf.put_u32(0);
    Ok(())
});
scalar_arg!(
    RelativeDuration,
    crate::codec::CAL_RELATIVE_DURATION,
    "cal::relative_duration",
    |v, buf| {
        buf.put_i64(v.micros);
        buf.put_i32(v.days);
        buf.put_i32(v.months);
        Ok(())
    }
);
scalar_arg!(
    DateDuration,
    crate::codec::CAL_DATE_DURATION,
    "cal::date_duration",
    |v, buf| {
        buf.put_i64(0);
        buf.put_i32(v.days);
        buf.put_i32(v.months);
        Ok(())
    }
);

impl QueryArg for Json {
    fn encode_arg(&self, buf: &mut Vec<u8>) -> Result<(), EncodeError> {
        buf.put_u8(1);
        buf.extend_from_slice(self.as_ref().as_bytes());
        Ok(())
    }

    fn check_descriptor(ctx: &DescriptorContext, type_pos: TypePos) -> Result<(), DescriptorMismatch> {
        check_scalar(ctx, type_pos, crate::codec::STD_JSON, "std::json")
    }
}

fn encode_digit_groups(
    buf: &mut Vec<u8>,
    negative: bool,
    weight: i16,
    decimal_digits: u16,
    digits: &[u16],
) {
    buf.put_u16(digits.len() as u16);
    buf.put_i16(weight);
    buf.put_u16(if negative { 0x4000 } else { 0x0000 });
    buf.put_u16(decimal_digits);
    for &d in digits {
        buf.put_u16(d);
    }
}

impl QueryArg for BigInt {
    fn encode_arg(&self, buf: &mut Vec<u8>) -> Result<(), EncodeError> {
        encode_digit_groups(buf, self.negative, self.weight, 0, &self.digits);
        Ok(())
    }

    fn check_descriptor(ctx: &DescriptorContext, type_pos: TypePos) -> Result<(), DescriptorMismatch> {
        check_scalar(ctx, type_pos, crate::codec::STD_BIGINT, "std::bigint")
    }
}

impl QueryArg for Decimal {
    fn encode_arg(&self, buf: &mut Vec<u8>) -> Result<(), EncodeError> {
        encode_digit_groups(
            buf,
            self.negative,
            self.weight,
            self.decimal_digits,
            &self.digits,
        );
        Ok(())
    }

    fn check_descriptor(ctx: &DescriptorContext, type_pos: TypePos) -> Result<(), DescriptorMismatch> {
        check_scalar(ctx, type_pos, crate::codec::STD_DECIMAL, "std::decimal")
    }
}

/// Carries both the output buffer and the descriptor context a
/// [`QueryArgs`] impl needs while encoding (container element types are
/// only known by consulting the same context used for validation).
pub struct Encoder<'a> {
    pub ctx: &'a DescriptorContext<'a>,
    pub buf: &'a mut Vec<u8>,
}

impl<'a> Encoder<'a> {
    pub fn new(ctx: &'a DescriptorContext<'a>, buf: &'a mut Vec<u8>) -> Encoder<'a> {
        Encoder { ctx, buf }
    }
}

/// A full positional argument tuple for one query, encoded into one
/// `(4-byte reserved, length, payload)` element per argument.
pub trait QueryArgs {
    fn encode(&self, encoder: &mut Encoder) -> Result<(), EncodeError>;
    fn check_descriptor(ctx: &DescriptorContext, type_pos: TypePos) -> Result<(), DescriptorMismatch>;
}

fn encode_element<T: QueryArg>(buf: &mut Vec<u8>, val: &T) -> Result<(), EncodeError> {
    buf.put_i32(0);
    let start = buf.len();
    buf.put_i32(0);
    val.encode_arg(buf)?;
    let len = (buf.len() - start - 4) as i32;
    buf[start..start + 4].copy_from_slice(&len.to_be_bytes());
    Ok(())
}

impl QueryArgs for () {
    fn encode(&self, _encoder: &mut Encoder) -> Result<(), EncodeError> {
        Ok(())
    }

    fn check_descriptor(ctx: &DescriptorContext, type_pos: TypePos) -> Result<(), DescriptorMismatch> {
        match ctx.get(type_pos)? {
            Descriptor::Tuple(desc) if desc.element_types.is_empty() => Ok(()),
            desc => Err(ctx.wrong_type(desc, "empty tuple")),
        }
    }
}

macro_rules! implement_query_args {
    ( $count:expr, $($name:ident = $idx:tt,)+ ) => (
        impl<$($name: QueryArg),+> QueryArgs for ($($name,)+) {
            fn encode(&self, encoder: &mut Encoder) -> Result<(), EncodeError> {
                let buf = &mut *encoder.buf;
                buf.put_u32($count);
                $(
                    encode_element(buf, &self.$idx)?;
                )+
                Ok(())
            }

            fn check_descriptor(ctx: &DescriptorContext, type_pos: TypePos)
                -> Result<(), DescriptorMismatch>
            {
                let desc = ctx.get(type_pos)?;
                match desc {
                    Descriptor::Tuple(d) => {
                        if d.element_types.len() != $count as usize {
                            return Err(ctx.field_number($count as usize, d.element_types.len()));
                        }
                        let mut element_types = d.element_types.iter().copied();
                        $(
                            $name::check_descriptor(ctx, element_types.next().unwrap())?;
                        )+
                        Ok(())
                    }
                    _ => Err(ctx.wrong_type(desc, "tuple")),
                }
            }
        }
    )
}

implement_query_args! {1, T0 = 0, }
implement_query_args! {2, T0 = 0, T1 = 1, }
implement_query_args! {3, T0 = 0, T1 = 1, T2 = 2, }
implement_query_args! {4, T0 = 0, T1 = 1, T2 = 2, T3 = 3, }
implement_query_args! {5, T0 = 0, T1 = 1, T2 = 2, T3 = 3, T4 = 4, }
