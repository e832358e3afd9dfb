//! Wire-format encoding/decoding of [`crate::value::Value`] and user
//! types via [`crate::queryable::Queryable`].

pub(crate) mod decode;
