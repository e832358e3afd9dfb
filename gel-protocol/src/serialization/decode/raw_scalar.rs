use std::mem::size_of;
use std::str;

use bytes::{Buf, Bytes};
use snafu::{ensure, ResultExt};

use crate::errors::{self, DecodeError};
use crate::model::{BigInt, ConfigMemory, DateDuration, Decimal, Duration, Json, RelativeDuration};
use crate::model::{Datetime, LocalDate, LocalDatetime, LocalTime, Uuid};

/// Decodes a fixed or variable-width scalar straight from its raw element
/// bytes, with no descriptor to consult (the caller already matched the
/// descriptor in `check_descriptor`).
pub trait RawCodec<'t>: Sized {
    fn decode(buf: &'t [u8]) -> Result<Self, DecodeError>;
}

fn ensure_exact_size(buf: &[u8], expected_size: usize) -> Result<(), DecodeError> {
    if buf.len() != expected_size {
        if buf.len() < expected_size {
            return errors::Underflow.fail();
        }
        return errors::ExtraData.fail();
    }
    Ok(())
}

impl RawCodec<'_> for String {
    fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        str::from_utf8(buf)
            .context(errors::InvalidUtf8)
            .map(|s| s.to_owned())
    }
}

impl<'t> RawCodec<'t> for &'t str {
    fn decode(buf: &'t [u8]) -> Result<Self, DecodeError> {
        str::from_utf8(buf).context(errors::InvalidUtf8)
    }
}

impl RawCodec<'_> for Json {
    fn decode(mut buf: &[u8]) -> Result<Self, DecodeError> {
        ensure!(buf.remaining() >= 1, errors::Underflow);
        let format = buf.get_u8();
        ensure!(format == 1, errors::InvalidJsonFormat);
        let val = str::from_utf8(buf).context(errors::InvalidUtf8)?.to_owned();
        Ok(Json::new_unchecked(val))
    }
}

impl RawCodec<'_> for Uuid {
    fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        ensure_exact_size(buf, 16)?;
        Ok(Uuid::from_slice(buf).context(errors::InvalidUuid)?)
    }
}

impl RawCodec<'_> for bool {
    fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        ensure_exact_size(buf, 1)?;
        match buf[0] {
            0x00 => Ok(false),
            0x01 => Ok(true),
            val => errors::InvalidBool { val }.fail(),
        }
    }
}

impl RawCodec<'_> for i16 {
    fn decode(mut buf: &[u8]) -> Result<Self, DecodeError> {
        ensure_exact_size(buf, size_of::<Self>())?;
        Ok(buf.get_i16())
    }
}

impl RawCodec<'_> for i32 {
    fn decode(mut buf: &[u8]) -> Result<Self, DecodeError> {
        ensure_exact_size(buf, size_of::<Self>())?;
        Ok(buf.get_i32())
    }
}

impl RawCodec<'_> for i64 {
    fn decode(mut buf: &[u8]) -> Result<Self, DecodeError> {
        ensure_exact_size(buf, size_of::<Self>())?;
        Ok(buf.get_i64())
    }
}

impl RawCodec<'_> for f32 {
    fn decode(mut buf: &[u8]) -> Result<Self, DecodeError> {
        ensure_exact_size(buf, size_of::<Self>())?;
        Ok(buf.get_f32())
    }
}

impl RawCodec<'_> for f64 {
    fn decode(mut buf: &[u8]) -> Result<Self, DecodeError> {
        ensure_exact_size(buf, size_of::<Self>())?;
        Ok(buf.get_f64())
    }
}

impl RawCodec<'_> for ConfigMemory {
    fn decode(mut buf: &[u8]) -> Result<Self, DecodeError> {
        ensure_exact_size(buf, size_of::<i64>())?;
        Ok(ConfigMemory(buf.get_i64()))
    }
}

impl RawCodec<'_> for Bytes {
    fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        Ok(Bytes::copy_from_slice(buf))
    }
}

impl<'t> RawCodec<'t> for &'t [u8] {
    fn decode(buf: &'t [u8]) -> Result<Self, DecodeError> {
        Ok(buf)
    }
}

fn decode_digit_groups(mut buf: &[u8]) -> Result<(bool, i16, u16, Vec<u16>), DecodeError> {
    ensure!(buf.remaining() >= 8, errors::Underflow);
    let ndigits = buf.get_u16() as usize;
    let weight = buf.get_i16();
    let negative = match buf.get_u16() {
        0x0000 => false,
        0x4000 => true,
        _ => return errors::BadSign.fail(),
    };
    let decimal_digits = buf.get_u16();
    ensure_exact_size(buf, ndigits * 2)?;
    let mut digits = Vec::with_capacity(ndigits);
    for _ in 0..ndigits {
        digits.push(buf.get_u16());
    }
    Ok((negative, weight, decimal_digits, digits))
}

impl RawCodec<'_> for BigInt {
    fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let (negative, weight, decimal_digits, digits) = decode_digit_groups(buf)?;
        ensure!(decimal_digits == 0, errors::NonZeroReservedBytes);
        Ok(BigInt {
            negative,
            weight,
            digits,
        })
    }
}

impl RawCodec<'_> for Decimal {
    fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let (negative, weight, decimal_digits, digits) = decode_digit_groups(buf)?;
        Ok(Decimal {
            negative,
            weight,
            decimal_digits,
            digits,
        })
    }
}

impl RawCodec<'_> for Duration {
    fn decode(mut buf: &[u8]) -> Result<Self, DecodeError> {
        ensure_exact_size(buf, 16)?;
        let micros = buf.get_i64();
        let days = buf.get_u32();
        let months = buf.get_u32();
        ensure!(months == 0 && days == 0, errors::NonZeroReservedBytes);
        Ok(Duration::from_micros(micros))
    }
}

impl RawCodec<'_> for RelativeDuration {
    fn decode(mut buf: &[u8]) -> Result<Self, DecodeError> {
        ensure_exact_size(buf, 16)?;
        let micros = buf.get_i64();
        let days = buf.get_i32();
        let months = buf.get_i32();
        Ok(RelativeDuration {
            micros,
            days,
            months,
        })
    }
}

impl RawCodec<'_> for DateDuration {
    fn decode(mut buf: &[u8]) -> Result<Self, DecodeError> {
        ensure_exact_size(buf, 16)?;
        let micros = buf.get_i64();
        let days = buf.get_i32();
        let months = buf.get_i32();
        ensure!(micros == 0, errors::NonZeroReservedBytes);
        Ok(DateDuration { days, months })
    }
}

impl RawCodec<'_> for Datetime {
    fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let micros = i64::decode(buf)?;
        Ok(Datetime::from_micros(micros))
    }
}

impl RawCodec<'_> for LocalDatetime {
    fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let micros = i64::decode(buf)?;
        Ok(LocalDatetime::from_micros(micros))
    }
}

impl RawCodec<'_> for LocalDate {
    fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let days = i32::decode(buf)?;
        Ok(LocalDate::from_days(days))
    }
}

impl RawCodec<'_> for LocalTime {
    fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let micros = i64::decode(buf)?;
        ensure!(micros >= 0, errors::InvalidDate);
        Ok(LocalTime::from_micros(micros as u64))
    }
}
