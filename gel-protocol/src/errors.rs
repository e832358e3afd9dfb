use std::str;

use snafu::{Backtrace, Snafu};
use uuid;

#[derive(Snafu, Debug)]
#[snafu(visibility(pub(crate)))]
pub enum DecodeError {
    #[snafu(display("unexpected end of frame"))]
    Underflow { backtrace: Backtrace },
    #[snafu(display("invalid utf8 when decoding string: {}", source))]
    InvalidUtf8 {
        backtrace: Backtrace,
        source: str::Utf8Error,
    },
    #[snafu(display("invalid uuid: {}", source))]
    InvalidUuid {
        backtrace: Backtrace,
        source: uuid::Error,
    },
    #[snafu(display("invalid transaction state: {:x}", transaction_state))]
    InvalidTransactionState {
        backtrace: Backtrace,
        transaction_state: u8,
    },
    #[snafu(display("invalid io format: {:x}", io_format))]
    InvalidIoFormat { backtrace: Backtrace, io_format: u8 },
    #[snafu(display("invalid cardinality: {:x}", cardinality))]
    InvalidCardinality {
        backtrace: Backtrace,
        cardinality: u8,
    },
    #[snafu(display("invalid authentication status: {:x}", status))]
    InvalidAuthStatus { backtrace: Backtrace, status: u32 },
    #[snafu(display("invalid type descriptor tag: {:x}", descriptor))]
    InvalidTypeDescriptor {
        backtrace: Backtrace,
        descriptor: u8,
    },
    #[snafu(display("unexpected type position {}", position))]
    UnexpectedTypePos { backtrace: Backtrace, position: u16 },
    #[snafu(display("more than 65535 descriptors"))]
    TooManyDescriptors { backtrace: Backtrace, index: usize },
    #[snafu(display("base scalar type {} is not defined", uuid))]
    UndefinedBaseScalar { backtrace: Backtrace, uuid: uuid::Uuid },
    #[snafu(display("no descriptor for id {}", uuid))]
    UuidNotFound { backtrace: Backtrace, uuid: uuid::Uuid },
    #[snafu(display("invalid value for {}: {}", expected, message))]
    InvalidValue {
        backtrace: Backtrace,
        expected: String,
        message: String,
    },
    #[snafu(display("invalid duration: months and days must be zero"))]
    InvalidDuration { backtrace: Backtrace },
    #[snafu(display("required element missing from row"))]
    MissingRequiredElement { backtrace: Backtrace },
    #[snafu(display("descriptor doesn't match the query result shape: {}", message))]
    DescriptorMismatch { backtrace: Backtrace, message: String },
    #[snafu(display("invalid element marker: {}", marker))]
    InvalidMarker { backtrace: Backtrace, marker: i32 },
    #[snafu(display("array has unsupported shape: {} dimensions", dimensions))]
    InvalidArrayShape { backtrace: Backtrace, dimensions: u32 },
    #[snafu(display("unexpected extra data after last element"))]
    ExtraData { backtrace: Backtrace },
    #[snafu(display("invalid json format byte"))]
    InvalidJsonFormat { backtrace: Backtrace },
    #[snafu(display("invalid bool byte"))]
    InvalidBool { backtrace: Backtrace, val: u8 },
    #[snafu(display("invalid numeric sign bytes"))]
    BadSign { backtrace: Backtrace },
    #[snafu(display("reserved bytes must be zero"))]
    NonZeroReservedBytes { backtrace: Backtrace },
    #[snafu(display("date/time value out of range"))]
    InvalidDate { backtrace: Backtrace },
    #[snafu(display("scalar custom codec failed: {}", source))]
    CustomDecode {
        backtrace: Backtrace,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl DecodeError {
    pub fn invalid_value(expected: impl Into<String>, message: impl std::fmt::Display) -> Self {
        InvalidValue {
            expected: expected.into(),
            message: message.to_string(),
        }
        .build()
    }
}

/// Wraps a scalar decode failure from derived `Queryable` impls, which see
/// only `std::error::Error` from the user's own `TryFrom`/custom codec.
pub fn decode_error(source: impl std::error::Error + Send + Sync + 'static) -> DecodeError {
    CustomDecode {
        source: Box::new(source) as Box<dyn std::error::Error + Send + Sync>,
    }
    .build()
}

#[derive(Snafu, Debug)]
#[snafu(visibility(pub(crate)))]
pub enum EncodeError {
    #[snafu(display("message doesn't fit in 4GiB"))]
    MessageTooLong { backtrace: Backtrace },
    #[snafu(display("string or bytes value is larger than 4GiB"))]
    StringTooLong { backtrace: Backtrace },
    #[snafu(display("more than 65535 headers"))]
    TooManyHeaders { backtrace: Backtrace },
    #[snafu(display("more than 65535 params"))]
    TooManyParams { backtrace: Backtrace },
    #[snafu(display("more than 65535 elements"))]
    TooManyElements { backtrace: Backtrace },
    #[snafu(display("value {} doesn't match codec {}", value, expected))]
    InvalidValue {
        backtrace: Backtrace,
        expected: String,
        value: String,
    },
    #[snafu(display("named tuple or object field is missing a name annotation"))]
    MissingFieldName { backtrace: Backtrace },
    #[snafu(display("unknown message variant can't be re-encoded"))]
    UnknownMessageCantBeEncoded { backtrace: Backtrace },
    #[snafu(display("scalar custom codec failed: {}", source))]
    CustomEncode {
        backtrace: Backtrace,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl EncodeError {
    pub fn invalid_value(expected: impl Into<String>, value: impl std::fmt::Debug) -> Self {
        InvalidValue {
            expected: expected.into(),
            value: format!("{:?}", value),
        }
        .build()
    }
}

#[derive(Snafu, Debug)]
#[snafu(visibility(pub(crate)))]
pub enum CodecError {
    #[snafu(display("unexpected type position {}", position))]
    UnexpectedTypePos { backtrace: Backtrace, position: u16 },
    #[snafu(display("more than 65535 descriptors, index {}", index))]
    TooManyDescriptors { backtrace: Backtrace, index: usize },
    #[snafu(display("base scalar type {} is not defined", uuid))]
    UndefinedBaseScalar { backtrace: Backtrace, uuid: uuid::Uuid },
    #[snafu(display("no descriptor for id {}", uuid))]
    UuidNotFound { backtrace: Backtrace, uuid: uuid::Uuid },
    #[snafu(display("unsupported descriptor variant for codec construction"))]
    Unimplemented { backtrace: Backtrace },
}
