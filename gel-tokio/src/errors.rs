//! Re-exports the shared error hierarchy from [`gel_errors`] under the
//! names this crate's modules use, plus a couple of crate-local aliases
//! for client-side conditions that don't warrant their own entry in the
//! protocol's error code tree.

pub use gel_errors::{
    AuthenticationError, ClientConnectionClosedError, ClientConnectionEosError, ClientConnectionError,
    ClientConnectionFailedError, ClientConnectionFailedTemporarilyError,
    ClientConnectionTimeoutError, ClientEncodingError, ClientError, ClientNoCredentialsError,
    ConfigurationError, DescriptorMismatchError, Error, ErrorKind, IdleSessionTimeoutError,
    InterfaceError, InternalClientError, InvalidArgumentError, MissingArgumentError, NoDataError,
    PasswordRequired, ProtocolEncodingError, ProtocolError, ProtocolOutOfOrderError,
    ProtocolTlsError, ResultCardinalityMismatchError, UnknownArgumentError, UserError,
    NoResultExpectedError as NoResultExpected, SHOULD_RECONNECT, SHOULD_RETRY,
};

/// Raised when a call that requires an idle connection finds one stuck
/// mid-protocol-exchange -- e.g. a background ping that never completed.
/// Not a distinct protocol error code; aliases [`InternalClientError`],
/// the same family the EdgeDB/Gel server itself never produces.
pub use gel_errors::InternalClientError as ClientInconsistentError;
