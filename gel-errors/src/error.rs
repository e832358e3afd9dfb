use std::borrow::Cow;
use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;

use bytes::Bytes;

use crate::traits::{ErrorKind, Field};

pub(crate) const FIELD_HINT: u16 = 0x_0001;
pub(crate) const FIELD_DETAILS: u16 = 0x_0002;
pub(crate) const FIELD_SERVER_TRACEBACK: u16 = 0x_0101;
pub(crate) const FIELD_POSITION_START: u16 = 0x_FFF1;
pub(crate) const FIELD_POSITION_END: u16 = 0x_FFF2;
pub(crate) const FIELD_LINE: u16 = 0x_FFF3;
pub(crate) const FIELD_COLUMN: u16 = 0x_FFF4;

/// A single bit in an error's tag set.
///
/// Tags cut across the kind hierarchy: two unrelated error kinds (say
/// `ClientConnectionTimeoutError` and `TransactionConflictError`) can both
/// carry [`crate::SHOULD_RETRY`] even though neither is an ancestor of the
/// other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag(pub(crate) u32);

pub(crate) struct Inner {
    pub code: u32,
    pub messages: Vec<Cow<'static, str>>,
    pub error: Option<Box<dyn StdError + Send + Sync>>,
    pub headers: HashMap<u16, Bytes>,
    pub fields: HashMap<&'static str, Box<dyn std::any::Any + Send + Sync>>,
}

/// A single error produced anywhere in the driver.
///
/// Despite the singular type, an `Error` carries the full hierarchy
/// information of the kind it was built from: [`Error::is`] walks the
/// hierarchy, [`Error::has_tag`] checks the tag set, and [`Error::source`]
/// exposes the wrapped cause (if any) like any other `std::error::Error`.
pub struct Error(pub(crate) Box<Inner>);

impl Error {
    pub(crate) fn new<K: ErrorKind>(msg: String) -> Self {
        Error(Box::new(Inner {
            code: K::CODE,
            messages: vec![msg.into()],
            error: None,
            headers: HashMap::new(),
            fields: HashMap::new(),
        }))
    }

    pub(crate) fn with_cause(mut self, cause: Box<dyn StdError + Send + Sync>) -> Self {
        self.0.error = Some(cause);
        self
    }

    /// Construct an error directly from a wire error code, used by the
    /// protocol engine when decoding an `ErrorResponse` frame.
    pub fn from_code(code: u32, message: impl Into<Cow<'static, str>>) -> Self {
        Error(Box::new(Inner {
            code,
            messages: vec![message.into()],
            error: None,
            headers: HashMap::new(),
            fields: HashMap::new(),
        }))
    }

    /// Attach more context, pushing the new message in front so the most
    /// specific explanation prints first.
    #[must_use]
    pub fn context(mut self, msg: impl Into<Cow<'static, str>>) -> Self {
        self.0.messages.insert(0, msg.into());
        self
    }

    #[must_use]
    pub fn with_headers(mut self, headers: impl IntoIterator<Item = (u16, Bytes)>) -> Self {
        self.0.headers.extend(headers);
        self
    }

    #[must_use]
    pub fn set_field<F: Field>(mut self, value: F::Value) -> Self {
        self.0.fields.insert(F::NAME, Box::new(value));
        self
    }

    pub fn get_field<F: Field>(&self) -> Option<&F::Value> {
        self.0.fields.get(F::NAME)?.downcast_ref()
    }

    pub fn headers(&self) -> impl Iterator<Item = (u16, &Bytes)> {
        self.0.headers.iter().map(|(&k, v)| (k, v))
    }

    pub fn unknown_headers(&self) -> impl Iterator<Item = (u16, &Bytes)> {
        self.headers().filter(|&(k, _)| {
            !matches!(
                k,
                FIELD_HINT
                    | FIELD_DETAILS
                    | FIELD_SERVER_TRACEBACK
                    | FIELD_POSITION_START
                    | FIELD_POSITION_END
                    | FIELD_LINE
                    | FIELD_COLUMN
            )
        })
    }

    fn header_str(&self, key: u16) -> Option<Cow<str>> {
        self.0
            .headers
            .get(&key)
            .map(|b| String::from_utf8_lossy(b))
    }

    fn header_num(&self, key: u16) -> Option<usize> {
        self.header_str(key)?.parse().ok()
    }

    pub fn hint(&self) -> Option<Cow<str>> {
        self.header_str(FIELD_HINT)
    }

    pub fn details(&self) -> Option<Cow<str>> {
        self.header_str(FIELD_DETAILS)
    }

    pub fn server_traceback(&self) -> Option<Cow<str>> {
        self.header_str(FIELD_SERVER_TRACEBACK)
    }

    pub fn position_start(&self) -> Option<usize> {
        self.header_num(FIELD_POSITION_START)
    }

    pub fn position_end(&self) -> Option<usize> {
        self.header_num(FIELD_POSITION_END)
    }

    pub fn line(&self) -> Option<usize> {
        self.header_num(FIELD_LINE)
    }

    pub fn column(&self) -> Option<usize> {
        self.header_num(FIELD_COLUMN)
    }

    /// Code as reported by the server (or synthesized locally for
    /// client-side errors).
    pub fn code(&self) -> u32 {
        self.0.code
    }

    /// Is this error (or one of its ancestor kinds) `K`?
    pub fn is<K: ErrorKind>(&self) -> bool {
        K::is_superclass_of(self.0.code)
    }

    pub fn has_tag(&self, tag: Tag) -> bool {
        tag_set_for(self.0.code).iter().any(|t| t.0 == tag.0)
    }

    /// Downcast the wrapped cause, if there is one and it matches `T`.
    pub fn source_ref<T: StdError + 'static>(&self) -> Option<&T> {
        self.0.error.as_deref()?.downcast_ref()
    }

    pub fn kind_name(&self) -> &'static str {
        crate::kinds::name_for(self.0.code)
    }

    pub fn kind_debug(&self) -> &'static str {
        self.kind_name()
    }

    pub fn initial_message(&self) -> &str {
        self.0
            .messages
            .last()
            .map(|m| m.as_ref())
            .unwrap_or_default()
    }

    pub fn contexts(&self) -> impl Iterator<Item = &str> {
        self.0.messages.iter().map(|m| m.as_ref())
    }
}

fn tag_set_for(code: u32) -> &'static [Tag] {
    crate::kinds::tags_for(code)
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Error")
            .field("kind", &self.kind_name())
            .field("code", &format_args!("{:#010x}", self.0.code))
            .field("messages", &self.0.messages)
            .finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: ", self.kind_name())?;
        for (idx, msg) in self.0.messages.iter().enumerate() {
            if idx > 0 {
                write!(f, ": ")?;
            }
            write!(f, "{}", msg)?;
        }
        if f.alternate() {
            if let Some(hint) = self.hint() {
                write!(f, "\n  Hint: {}", hint)?;
            }
            if let Some(details) = self.details() {
                write!(f, "\n  Details: {}", details)?;
            }
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.error.as_deref().map(|e| e as &(dyn StdError + 'static))
    }
}

/// Carries either a driver-side [`Error`] or a user-supplied error `E`,
/// used as the return type of a transaction body so the retry loop can
/// tell the two apart without the caller's error type implementing
/// anything special.
#[derive(Debug)]
pub enum TransactionError<E> {
    Gel(Error),
    User(E),
}

impl<E> From<Error> for TransactionError<E> {
    fn from(e: Error) -> Self {
        TransactionError::Gel(e)
    }
}

pub trait AsGelError<E> {
    fn as_gel_error(&self) -> Option<&Error>;
}

impl<E> AsGelError<E> for TransactionError<E> {
    fn as_gel_error(&self) -> Option<&Error> {
        match self {
            TransactionError::Gel(e) => Some(e),
            TransactionError::User(_) => None,
        }
    }
}

impl<E: fmt::Display> fmt::Display for TransactionError<E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TransactionError::Gel(e) => e.fmt(f),
            TransactionError::User(e) => e.fmt(f),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> StdError for TransactionError<E> {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            TransactionError::Gel(e) => e.source(),
            TransactionError::User(_) => None,
        }
    }
}
