use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt;

use bytes::Bytes;

use crate::error::{Error, Inner, Tag};

/// Sealed supertrait that ties a marker type to its place in the error
/// hierarchy.
///
/// Not implementable outside this crate: [`crate::kinds`] is the only
/// place new error kinds are defined.
pub trait Sealed {
    /// Numeric code identifying this kind, matching the protocol's 4-byte
    /// error code space (most significant byte first).
    const CODE: u32;
    const MASK: u32;
    const NAME: &'static str;
    const TAGS: &'static [Tag];

    fn is_superclass_of(code: u32) -> bool;
}

/// Marker trait implemented by every error kind (e.g. [`crate::InvalidArgumentError`]).
///
/// Kinds are zero-sized marker types; use them with [`Error::is`] to test
/// an error's place in the hierarchy, or with the constructors below to
/// build a new error of that kind.
pub trait ErrorKind: Sealed {
    fn with_message(msg: impl Into<String>) -> Error
    where
        Self: Sized,
    {
        Error::new::<Self>(msg.into())
    }

    fn with_source<S>(source: S) -> Error
    where
        S: StdError + Send + Sync + 'static,
        Self: Sized,
    {
        Error::new::<Self>(Self::NAME.to_string()).with_cause(Box::new(source))
    }

    fn with_source_box(source: Box<dyn StdError + Send + Sync>) -> Error
    where
        Self: Sized,
    {
        Error::new::<Self>(Self::NAME.to_string()).with_cause(source)
    }

    fn with_source_ref<S>(source: S) -> Error
    where
        S: fmt::Display + fmt::Debug + Send + Sync + 'static,
        Self: Sized,
    {
        Error::new::<Self>(Self::NAME.to_string()).with_cause(Box::new(DisplayError(source)))
    }

    fn build() -> Error
    where
        Self: Sized,
    {
        Error::new::<Self>(Self::NAME.to_string())
    }
}

impl<T: Sealed> ErrorKind for T {}

#[derive(Debug)]
struct DisplayError<T>(T);

impl<T: fmt::Display> fmt::Display for DisplayError<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<T: fmt::Display + fmt::Debug> StdError for DisplayError<T> {}

/// A typed header field, used to stash structured side-channel data
/// (e.g. the query text that caused an error) on an [`Error`].
pub trait Field {
    const NAME: &'static str;
    type Value: fmt::Debug + Send + Sync + 'static;
}

pub(crate) struct FieldHeader(pub u16, pub Bytes);

/// Extension trait mirroring [`std::result::Result::map_err`] for
/// attaching context to an error kind while propagating the original
/// cause via `.source()`.
pub trait ResultExt<T>: Sized {
    fn context<K: ErrorKind>(self, msg: impl Into<Cow<'static, str>>) -> Result<T, Error>;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: StdError + Send + Sync + 'static,
{
    fn context<K: ErrorKind>(self, msg: impl Into<Cow<'static, str>>) -> Result<T, Error> {
        self.map_err(|e| {
            Error(Box::new(Inner {
                code: K::CODE,
                messages: vec![msg.into()],
                error: Some(Box::new(e)),
                headers: Default::default(),
                fields: Default::default(),
            }))
        })
    }
}
