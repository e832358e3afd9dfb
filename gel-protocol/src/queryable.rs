//! The [`Queryable`] trait: how a Rust type is produced from one decoded
//! row/scalar, and how it validates the server's descriptor tree before
//! any bytes are read.

use snafu::Snafu;

use crate::descriptors::{Descriptor, TypePos};
use crate::errors::{self, DecodeError};

/// Protocol-version-dependent decode hints, computed once per
/// `CommandDataDescription` and threaded through every `decode` call.
#[non_exhaustive]
#[derive(Default, Debug, Clone, Copy)]
pub struct Decoder {
    pub has_implicit_id: bool,
    pub has_implicit_tid: bool,
    pub has_implicit_tname: bool,
}

impl Decoder {
    pub fn new(proto: &crate::features::ProtocolVersion) -> Decoder {
        Decoder {
            has_implicit_id: false,
            has_implicit_tid: proto.has_implicit_tid(),
            has_implicit_tname: false,
        }
    }
}

/// A mismatch between a user type's shape and the server's descriptor
/// tree, surfaced to the caller as a `DescriptorMismatchError`.
#[derive(Snafu, Debug)]
#[non_exhaustive]
pub enum DescriptorMismatch {
    #[snafu(display("unexpected type {}, expected {}", unexpected, expected))]
    WrongType { unexpected: String, expected: String },
    #[snafu(display("unexpected field {}, expected {}", unexpected, expected))]
    WrongField { unexpected: String, expected: String },
    #[snafu(display("expected {} fields, got {}", expected, unexpected))]
    FieldNumber { unexpected: usize, expected: usize },
    #[snafu(display("expected {}", expected))]
    Expected { expected: String },
    #[snafu(display("invalid type descriptor"))]
    InvalidDescriptor,
}

impl From<DescriptorMismatch> for DecodeError {
    fn from(e: DescriptorMismatch) -> DecodeError {
        errors::DescriptorMismatch {
            message: e.to_string(),
        }
        .build()
    }
}

/// A read-only view of the descriptor arena used while validating a
/// user type against the server's output shape.
pub struct DescriptorContext<'a> {
    pub has_implicit_id: bool,
    pub has_implicit_tid: bool,
    pub has_implicit_tname: bool,
    descriptors: &'a [Descriptor],
}

impl<'a> DescriptorContext<'a> {
    pub fn new(descriptors: &'a [Descriptor], decoder: &Decoder) -> DescriptorContext<'a> {
        DescriptorContext {
            descriptors,
            has_implicit_id: decoder.has_implicit_id,
            has_implicit_tid: decoder.has_implicit_tid,
            has_implicit_tname: decoder.has_implicit_tname,
        }
    }

    pub fn get(&self, type_pos: TypePos) -> Result<&'a Descriptor, DescriptorMismatch> {
        self.descriptors
            .get(type_pos.0 as usize)
            .ok_or(DescriptorMismatch::InvalidDescriptor)
    }

    /// The full descriptor arena, for callers (like the dynamic `Value`
    /// decoder) that need to walk it recursively rather than look up one
    /// position at a time.
    pub fn descriptors(&self) -> &'a [Descriptor] {
        self.descriptors
    }

    pub fn wrong_type(&self, descriptor: &Descriptor, expected: &str) -> DescriptorMismatch {
        DescriptorMismatch::WrongType {
            unexpected: format!("{descriptor:?}"),
            expected: expected.into(),
        }
    }

    pub fn field_number(&self, expected: usize, unexpected: usize) -> DescriptorMismatch {
        DescriptorMismatch::FieldNumber {
            expected,
            unexpected,
        }
    }

    pub fn wrong_field(&self, expected: &str, unexpected: &str) -> DescriptorMismatch {
        DescriptorMismatch::WrongField {
            expected: expected.into(),
            unexpected: unexpected.into(),
        }
    }

    pub fn expected(&self, expected: &str) -> DescriptorMismatch {
        DescriptorMismatch::Expected {
            expected: expected.into(),
        }
    }
}

/// Decodes one row or scalar from the server's wire format, after first
/// validating that the server's output descriptor matches this type's
/// shape. Implemented for every scalar, `Option<T>`, `Vec<T>`, tuples up
/// to 12 elements, and derived via `#[derive(Queryable)]` for structs
/// mapped onto object shapes.
pub trait Queryable: Sized {
    /// Extra state `check_descriptor` computes that `decode` needs (e.g.
    /// an element type's own `Args` for a container). `()` for scalars.
    type Args;

    fn decode(decoder: &Decoder, args: &Self::Args, buf: &[u8]) -> Result<Self, DecodeError>;

    fn decode_optional(
        decoder: &Decoder,
        args: &Self::Args,
        buf: Option<&[u8]>,
    ) -> Result<Self, DecodeError> {
        let buf = buf.ok_or_else(|| errors::MissingRequiredElement.build())?;
        Self::decode(decoder, args, buf)
    }

    fn check_descriptor(
        ctx: &DescriptorContext,
        type_pos: TypePos,
    ) -> Result<Self::Args, DescriptorMismatch>;
}
