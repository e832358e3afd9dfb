mod raw_composite;
mod raw_scalar;
pub(crate) mod queryable;

pub use self::raw_composite::DecodeTupleLike;
pub(crate) use self::raw_composite::DecodeArrayLike;
pub(crate) use self::raw_scalar::RawCodec;
