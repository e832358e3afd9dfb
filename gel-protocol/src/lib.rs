//! The wire protocol core: type descriptors, the value codec, and the
//! client/server message catalog shared by every crate that speaks to a
//! server over a single connection.

pub mod annotations;
pub mod client_message;
pub mod codec;
pub mod common;
pub mod descriptors;
pub mod encoding;
pub mod errors;
pub mod features;
pub mod model;
pub mod query_arg;
pub mod query_result;
pub mod queryable;
pub mod server_message;
pub mod value;

mod serialization;

pub use crate::query_arg::{QueryArg, QueryArgs};
pub use crate::query_result::QueryResult;
pub use crate::queryable::Queryable;
pub use crate::value::Value;
pub use serialization::decode::DecodeTupleLike;
