//! Bridges a statically-typed [`Queryable`] (and the dynamically-typed
//! [`Value`]) to the two-phase shape every query result goes through:
//! validate the server's output descriptor once per `Prepare`, then
//! decode each row's bytes against that validated state.

use crate::descriptors::{Descriptor, TypePos};
use crate::errors::DecodeError;
use crate::queryable::{Decoder, DescriptorContext, Queryable};
use crate::value::{self, Value};

mod sealed {
    pub trait Sealed {}
}
use sealed::Sealed;

impl<T: Queryable> Sealed for T {}
impl Sealed for Value {}

/// A type a query's rows can be decoded into.
///
/// Blanket-implemented for every [`Queryable`] (structs, scalars,
/// `Option<T>`, tuples, `#[derive(Queryable)]` types) and implemented
/// directly for [`Value`], which has no single static shape and instead
/// walks the descriptor tree at decode time.
pub trait QueryResult: Sealed + Sized {
    type State;

    fn prepare(ctx: &DescriptorContext, root_pos: TypePos) -> Result<Self::State, DecodeError>;
    fn decode(state: &Self::State, buf: &[u8]) -> Result<Self, DecodeError>;
}

impl<T: Queryable> QueryResult for T {
    type State = (Decoder, T::Args);

    fn prepare(ctx: &DescriptorContext, root_pos: TypePos) -> Result<Self::State, DecodeError> {
        let args = T::check_descriptor(ctx, root_pos)?;
        let decoder = Decoder {
            has_implicit_id: ctx.has_implicit_id,
            has_implicit_tid: ctx.has_implicit_tid,
            has_implicit_tname: ctx.has_implicit_tname,
        };
        Ok((decoder, args))
    }

    fn decode(state: &Self::State, buf: &[u8]) -> Result<Self, DecodeError> {
        let (decoder, args) = state;
        Queryable::decode(decoder, args, buf)
    }
}

impl QueryResult for Value {
    type State = (Vec<Descriptor>, Decoder, TypePos);

    fn prepare(ctx: &DescriptorContext, root_pos: TypePos) -> Result<Self::State, DecodeError> {
        // Validate that the position actually resolves before committing to it.
        ctx.get(root_pos)?;
        let decoder = Decoder {
            has_implicit_id: ctx.has_implicit_id,
            has_implicit_tid: ctx.has_implicit_tid,
            has_implicit_tname: ctx.has_implicit_tname,
        };
        Ok((ctx.descriptors().to_vec(), decoder, root_pos))
    }

    fn decode(state: &Self::State, buf: &[u8]) -> Result<Self, DecodeError> {
        let (descriptors, decoder, root_pos) = state;
        value::decode_value(descriptors, decoder, *root_pos, buf)
    }
}
