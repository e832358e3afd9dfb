//! The error kind hierarchy.
//!
//! Every kind is a zero-sized marker type implementing [`crate::ErrorKind`].
//! Codes mirror the server's 4-byte error code space: the most significant
//! byte selects the family, and each following byte narrows the kind one
//! level further. [`Error::is`](crate::Error::is) walks this hierarchy by
//! masked comparison; [`Error::has_tag`](crate::Error::has_tag) checks the
//! orthogonal tag set below.

use crate::error::Tag;
use crate::traits::Sealed;

/// Attached to errors where retrying the same operation (a transaction, a
/// reconnect attempt) has a reasonable chance of succeeding.
pub const SHOULD_RETRY: Tag = Tag(0x01);
/// Attached to errors where the connection itself must be re-established
/// before anything else can be retried.
pub const SHOULD_RECONNECT: Tag = Tag(0x02);

struct KindEntry {
    name: &'static str,
    mask: u32,
    code: u32,
    tags: &'static [Tag],
}

macro_rules! define {
    ($id:ident, $mask:expr, $code:expr) => {
        define!($id, $mask, $code, &[]);
    };
    ($id:ident, $mask:expr, $code:expr, $tags:expr) => {
        #[doc = concat!("`", stringify!($id), "`, code `", stringify!($code), "`.")]
        pub struct $id;

        impl Sealed for $id {
            const CODE: u32 = $code;
            const MASK: u32 = $mask;
            const NAME: &'static str = stringify!($id);
            const TAGS: &'static [Tag] = $tags;

            fn is_superclass_of(code: u32) -> bool {
                code & $mask == $code & $mask
            }
        }
    };
}

macro_rules! table {
    ($($id:ident,)+) => {
        const KIND_TABLE: &[KindEntry] = &[
            $(
                KindEntry {
                    name: $id::NAME,
                    mask: $id::MASK,
                    code: $id::CODE,
                    tags: $id::TAGS,
                },
            )+
        ];
    };
}

pub(crate) fn name_for(code: u32) -> &'static str {
    best_match(code).map(|e| e.name).unwrap_or("UnknownError")
}

pub(crate) fn tags_for(code: u32) -> &'static [Tag] {
    best_match(code).map(|e| e.tags).unwrap_or(&[])
}

fn best_match(code: u32) -> Option<&'static KindEntry> {
    KIND_TABLE
        .iter()
        .filter(|e| code & e.mask == e.code & e.mask)
        .max_by_key(|e| e.mask.count_ones())
}

// Family 0x01: internal server errors, never the caller's fault.
define!(InternalServerError, 0xFF_00_00_00, 0x01_00_00_00);

// Family 0x02: the server understood the request but refuses to support it.
define!(UnsupportedFeatureError, 0xFF_00_00_00, 0x02_00_00_00);

// Family 0x03: malformed or out-of-order wire protocol usage.
define!(ProtocolError, 0xFF_00_00_00, 0x03_00_00_00);
define!(BinaryProtocolError, 0xFFFF_00_00, 0x03_01_00_00);
define!(
    UnsupportedProtocolVersionError,
    0xFFFFFF_00,
    0x03_01_01_00
);
define!(TypeSpecNotFoundError, 0xFFFFFF_00, 0x03_01_02_00);
define!(UnexpectedMessageError, 0xFFFFFF_00, 0x03_01_03_00);
define!(InputDataError, 0xFFFF_00_00, 0x03_02_00_00);
define!(ProtocolEncodingError, 0xFFFFFF_00, 0x03_02_01_00);
define!(ResultCardinalityMismatchError, 0xFFFF_00_00, 0x03_03_00_00);
define!(CapabilityError, 0xFFFF_00_00, 0x03_04_00_00);
define!(UnsupportedCapabilityError, 0xFFFFFF_00, 0x03_04_01_00);
define!(DisabledCapabilityError, 0xFFFFFF_00, 0x03_04_02_00);
define!(ProtocolOutOfOrderError, 0xFFFF_00_00, 0x03_05_00_00);
define!(ProtocolTlsError, 0xFFFF_00_00, 0x03_06_00_00);

// Family 0x04: the submitted query itself is invalid.
define!(QueryError, 0xFF_00_00_00, 0x04_00_00_00);
define!(InvalidSyntaxError, 0xFFFF_00_00, 0x04_01_00_00);
define!(InvalidTypeError, 0xFFFF_00_00, 0x04_02_00_00);
define!(InvalidTargetError, 0xFFFF_00_00, 0x04_03_00_00);
define!(MissingRequiredError, 0xFFFF_00_00, 0x04_04_00_00);
define!(UnknownModuleError, 0xFFFF_00_00, 0x04_05_00_00);
define!(UnknownLinkError, 0xFFFF_00_00, 0x04_06_00_00);
define!(UnknownPropertyError, 0xFFFF_00_00, 0x04_07_00_00);
define!(SchemaError, 0xFFFF_00_00, 0x04_08_00_00);
define!(SchemaDefinitionError, 0xFFFF_00_00, 0x04_09_00_00);

// Family 0x05: compiled and started, failed while running.
define!(ExecutionError, 0xFF_00_00_00, 0x05_00_00_00);
define!(InvalidValueError, 0xFFFF_00_00, 0x05_01_00_00);
define!(DivisionByZeroError, 0xFFFFFF_00, 0x05_01_01_00);
define!(NumericOutOfRangeError, 0xFFFFFF_00, 0x05_01_02_00);
define!(IntegrityError, 0xFFFF_00_00, 0x05_02_00_00);
define!(ConstraintViolationError, 0xFFFFFF_00, 0x05_02_01_00);
define!(CardinalityViolationError, 0xFFFFFF_00, 0x05_02_02_00);
define!(TransactionError, 0xFFFF_00_00, 0x05_03_00_00);
define!(
    TransactionConflictError,
    0xFFFFFF_00,
    0x05_03_01_00,
    &[SHOULD_RETRY]
);
define!(
    TransactionSerializationError,
    0xFFFFFFFF,
    0x05_03_01_01,
    &[SHOULD_RETRY]
);
define!(
    TransactionDeadlockError,
    0xFFFFFFFF,
    0x05_03_01_02,
    &[SHOULD_RETRY]
);
define!(WatchError, 0xFFFF_00_00, 0x05_04_00_00);

// Family 0x06: the connection's configuration is invalid.
define!(ConfigurationError, 0xFF_00_00_00, 0x06_00_00_00);

// Family 0x07: the caller isn't allowed to do what it asked.
define!(AccessError, 0xFF_00_00_00, 0x07_00_00_00);
define!(AuthenticationError, 0xFFFF_00_00, 0x07_01_00_00);

// Family 0xFF: errors that never reached the server, or never should have.
define!(ClientError, 0xFF_00_00_00, 0xFF_00_00_00);
define!(ClientConnectionError, 0xFFFF_00_00, 0xFF_01_00_00);
define!(
    ClientConnectionFailedError,
    0xFFFFFF_00,
    0xFF_01_01_00,
    &[SHOULD_RECONNECT]
);
define!(
    ClientConnectionFailedTemporarilyError,
    0xFFFFFFFF,
    0xFF_01_01_01,
    &[SHOULD_RETRY, SHOULD_RECONNECT]
);
define!(
    ClientConnectionTimeoutError,
    0xFFFFFF_00,
    0xFF_01_02_00,
    &[SHOULD_RETRY, SHOULD_RECONNECT]
);
define!(
    ClientConnectionClosedError,
    0xFFFFFF_00,
    0xFF_01_03_00,
    &[SHOULD_RETRY, SHOULD_RECONNECT]
);
define!(ClientConnectionEosError, 0xFFFFFF_00, 0xFF_01_04_00);
define!(InterfaceError, 0xFFFF_00_00, 0xFF_02_00_00);
define!(QueryArgumentError, 0xFFFFFF_00, 0xFF_02_01_00);
define!(MissingArgumentError, 0xFFFFFFFF, 0xFF_02_01_01);
define!(UnknownArgumentError, 0xFFFFFFFF, 0xFF_02_01_02);
define!(InvalidArgumentError, 0xFFFFFFFF, 0xFF_02_01_03);
define!(NoDataError, 0xFFFFFF_00, 0xFF_02_02_00);
define!(InternalClientError, 0xFFFFFF_00, 0xFF_02_03_00);
define!(ClientEncodingError, 0xFFFFFF_00, 0xFF_02_04_00);
define!(DescriptorMismatchError, 0xFFFFFFFF, 0xFF_02_04_01);
define!(ParameterTypeMismatchError, 0xFFFFFFFF, 0xFF_02_04_02);
define!(InvalidReferenceError, 0xFFFFFFFF, 0xFF_02_04_03);
define!(NoResultExpectedError, 0xFFFF_00_00, 0xFF_03_00_00);
define!(IdleSessionTimeoutError, 0xFFFF_00_00, 0xFF_04_00_00);
define!(ClientNoCredentialsError, 0xFFFF_00_00, 0xFF_05_00_00);
define!(PasswordRequired, 0xFFFF_00_00, 0xFF_06_00_00);
define!(UserError, 0xFFFF_00_00, 0xFF_07_00_00);

table![
    InternalServerError,
    UnsupportedFeatureError,
    ProtocolError,
    BinaryProtocolError,
    UnsupportedProtocolVersionError,
    TypeSpecNotFoundError,
    UnexpectedMessageError,
    InputDataError,
    ProtocolEncodingError,
    ResultCardinalityMismatchError,
    CapabilityError,
    UnsupportedCapabilityError,
    DisabledCapabilityError,
    ProtocolOutOfOrderError,
    ProtocolTlsError,
    QueryError,
    InvalidSyntaxError,
    InvalidTypeError,
    InvalidTargetError,
    MissingRequiredError,
    UnknownModuleError,
    UnknownLinkError,
    UnknownPropertyError,
    SchemaError,
    SchemaDefinitionError,
    ExecutionError,
    InvalidValueError,
    DivisionByZeroError,
    NumericOutOfRangeError,
    IntegrityError,
    ConstraintViolationError,
    CardinalityViolationError,
    TransactionError,
    TransactionConflictError,
    TransactionSerializationError,
    TransactionDeadlockError,
    WatchError,
    ConfigurationError,
    AccessError,
    AuthenticationError,
    ClientError,
    ClientConnectionError,
    ClientConnectionFailedError,
    ClientConnectionFailedTemporarilyError,
    ClientConnectionTimeoutError,
    ClientConnectionClosedError,
    ClientConnectionEosError,
    InterfaceError,
    QueryArgumentError,
    MissingArgumentError,
    UnknownArgumentError,
    InvalidArgumentError,
    NoDataError,
    InternalClientError,
    ClientEncodingError,
    DescriptorMismatchError,
    ParameterTypeMismatchError,
    InvalidReferenceError,
    NoResultExpectedError,
    IdleSessionTimeoutError,
    ClientNoCredentialsError,
    PasswordRequired,
    UserError,
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn hierarchy_walks_up() {
        let e = MissingArgumentError::with_message("boom");
        assert!(e.is::<MissingArgumentError>());
        assert!(e.is::<QueryArgumentError>());
        assert!(e.is::<InterfaceError>());
        assert!(e.is::<ClientError>());
        assert!(!e.is::<ExecutionError>());
    }

    #[test]
    fn tags_cross_families() {
        let a = ClientConnectionTimeoutError::with_message("timeout");
        let b = TransactionConflictError::with_message("conflict");
        assert!(a.has_tag(SHOULD_RETRY));
        assert!(b.has_tag(SHOULD_RETRY));
        assert!(!a.is::<ExecutionError>());
        assert!(b.is::<ExecutionError>());
    }

    #[test]
    fn name_resolves_to_most_specific() {
        let e = TransactionDeadlockError::with_message("deadlock");
        assert_eq!(e.kind_name(), "TransactionDeadlockError");
    }
}
