use bytes::Bytes;

use crate::codec;
use crate::descriptors::TypePos;
use crate::errors::DecodeError;
use crate::model::{BigInt, ConfigMemory, DateDuration, Decimal, Json, RelativeDuration, Uuid};
use crate::model::{Datetime, Duration, LocalDate, LocalDatetime, LocalTime};
use crate::queryable::{Decoder, DescriptorContext, DescriptorMismatch, Queryable};
use crate::serialization::decode::RawCodec;

/// Walks up `ScalarAlias` chains to confirm `type_pos` ultimately names
/// `type_id`, the one check every scalar `Queryable` impl shares.
pub(crate) fn check_scalar(
    ctx: &DescriptorContext,
    type_pos: TypePos,
    type_id: Uuid,
    name: &str,
) -> Result<(), DescriptorMismatch> {
    use crate::descriptors::Descriptor::{BaseScalar, ScalarAlias};
    let desc = ctx.get(type_pos)?;
    match desc {
        ScalarAlias(scalar) => check_scalar(ctx, scalar.base_type_pos, type_id, name),
        BaseScalar(base) if base.id == type_id => Ok(()),
        _ => Err(ctx.wrong_type(desc, name)),
    }
}

/// Scalars whose `Queryable` impl is "decode the raw bytes, check one
/// base-type id" — every scalar except enums, vectors and composites.
pub(crate) trait DecodeScalar: for<'a> RawCodec<'a> + Sized {
    fn uuid() -> Uuid;
    fn typename() -> &'static str;
}

impl<T: DecodeScalar> Queryable for T {
    type Args = ();

    fn decode(_decoder: &Decoder, _args: &(), buf: &[u8]) -> Result<Self, DecodeError> {
        RawCodec::decode(buf)
    }

    fn check_descriptor(ctx: &DescriptorContext, type_pos: TypePos) -> Result<(), DescriptorMismatch> {
        check_scalar(ctx, type_pos, T::uuid(), T::typename())
    }
}

macro_rules! decode_scalar {
    ($ty:ty, $uuid:expr, $name:expr) => {
        impl DecodeScalar for $ty {
            fn uuid() -> Uuid {
                $uuid
            }
            fn typename() -> &'static str {
                $name
            }
        }
    };
}

decode_scalar!(String, codec::STD_STR, "std::str");
decode_scalar!(Bytes, codec::STD_BYTES, "std::bytes");
decode_scalar!(Json, codec::STD_JSON, "std::json");
decode_scalar!(i16, codec::STD_INT16, "std::int16");
decode_scalar!(i32, codec::STD_INT32, "std::int32");
decode_scalar!(i64, codec::STD_INT64, "std::int64");
decode_scalar!(f32, codec::STD_FLOAT32, "std::float32");
decode_scalar!(f64, codec::STD_FLOAT64, "std::float64");
decode_scalar!(Uuid, codec::STD_UUID, "std::uuid");
decode_scalar!(bool, codec::STD_BOOL, "std::bool");
decode_scalar!(BigInt, codec::STD_BIGINT, "std::bigint");
decode_scalar!(Decimal, codec::STD_DECIMAL, "std::decimal");
decode_scalar!(LocalDatetime, codec::CAL_LOCAL_DATETIME, "cal::local_datetime");
decode_scalar!(LocalDate, codec::CAL_LOCAL_DATE, "cal::local_date");
decode_scalar!(LocalTime, codec::CAL_LOCAL_TIME, "cal::local_time");
decode_scalar!(Duration, codec::STD_DURATION, "std::duration");
decode_scalar!(RelativeDuration, codec::CAL_RELATIVE_DURATION, "cal::relative_duration");
decode_scalar!(Datetime, codec::STD_DATETIME, "std::datetime");
decode_scalar!(ConfigMemory, codec::CFG_MEMORY, "cfg::memory");
decode_scalar!(DateDuration, codec::CAL_DATE_DURATION, "cal::date_duration");
