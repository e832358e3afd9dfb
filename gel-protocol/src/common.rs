use bytes::{Buf, Bytes};
use snafu::ensure;
use uuid::Uuid;

use crate::encoding::{Annotations, Decode, Input, KeyValues};
use crate::errors::{self, DecodeError};

bitflags::bitflags! {
    /// Capability bits a query is allowed to use, sent on every `Prepare`,
    /// `Execute` and `ExecuteScript` message.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Capabilities: u64 {
        const MODIFICATIONS   = 0b0000_0001;
        const SESSION_CONFIG   = 0b0000_0010;
        const TRANSACTION      = 0b0000_0100;
        const DDL              = 0b0000_1000;
        const PERSISTENT_CONFIG = 0b0001_0000;
        const ALL = Self::MODIFICATIONS.bits()
            | Self::SESSION_CONFIG.bits()
            | Self::TRANSACTION.bits()
            | Self::DDL.bits()
            | Self::PERSISTENT_CONFIG.bits();
    }
}

impl Capabilities {
    /// The bitmap every non-transaction-control call advertises: every
    /// capability except `TRANSACTION`, so the server refuses stray
    /// `START TRANSACTION` issued outside the transaction manager.
    pub fn without_transaction_control() -> Capabilities {
        Capabilities::ALL - Capabilities::TRANSACTION
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Cardinality {
    NoResult = 0x6e,
    AtMostOne = 0x6f,
    Many = 0x6d,
}

impl Cardinality {
    pub(crate) fn from_u8(v: u8) -> Result<Cardinality, DecodeError> {
        match v {
            0x6e => Ok(Cardinality::NoResult),
            0x6f => Ok(Cardinality::AtMostOne),
            0x6d => Ok(Cardinality::Many),
            _ => errors::InvalidCardinality { cardinality: v }.fail(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum IoFormat {
    Binary = 0x62,
    Json = 0x6a,
    JsonElements = 0x4a,
}

impl IoFormat {
    pub(crate) fn from_u8(v: u8) -> Result<IoFormat, DecodeError> {
        match v {
            0x62 => Ok(IoFormat::Binary),
            0x6a => Ok(IoFormat::Json),
            0x4a => Ok(IoFormat::JsonElements),
            _ => errors::InvalidIoFormat { io_format: v }.fail(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InputLanguage {
    EdgeQL = 0x45,
    Sql = 0x53,
}

/// The state of the most recently completed transaction, as reported on
/// `ReadyForCommand`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TransactionState {
    NotInTransaction = 0x49,
    InTransaction = 0x54,
    InFailedTransaction = 0x45,
}

impl TransactionState {
    pub(crate) fn from_u8(v: u8) -> Result<TransactionState, DecodeError> {
        match v {
            0x49 => Ok(TransactionState::NotInTransaction),
            0x54 => Ok(TransactionState::InTransaction),
            0x45 => Ok(TransactionState::InFailedTransaction),
            _ => errors::InvalidTransactionState {
                transaction_state: v,
            }
            .fail(),
        }
    }
}

/// Options for compiling a query, sent with `Prepare`/`Execute`/`OptimisticExecute`.
#[derive(Debug, Clone)]
pub struct CompilationOptions {
    pub implicit_limit: Option<u64>,
    pub implicit_typenames: bool,
    pub implicit_typeids: bool,
    pub explicit_objectids: bool,
    pub allow_capabilities: Capabilities,
    pub input_language: InputLanguage,
    pub io_format: IoFormat,
    pub expected_cardinality: Cardinality,
}

/// The session state blob echoed back to the server on every request so it
/// can restore per-session settings (e.g. the active branch) without a
/// round trip.
#[derive(Debug, Clone, Default)]
pub struct State {
    pub typedesc_id: Uuid,
    pub data: Bytes,
}

impl State {
    pub fn empty() -> State {
        State {
            typedesc_id: Uuid::nil(),
            data: Bytes::new(),
        }
    }
}

/// A type descriptor blob as received verbatim from the server, paired
/// with the protocol version it was parsed under (some encodings are
/// version-dependent).
#[derive(Debug, Clone)]
pub struct RawTypedesc {
    pub(crate) proto: crate::features::ProtocolVersion,
    pub(crate) id: Uuid,
    pub(crate) data: Bytes,
}

impl RawTypedesc {
    pub fn id(&self) -> &Uuid {
        &self.id
    }

    pub fn is_empty(&self) -> bool {
        self.id == Uuid::nil()
    }

    pub fn uncached() -> RawTypedesc {
        RawTypedesc {
            proto: crate::features::ProtocolVersion::current(),
            id: Uuid::nil(),
            data: Bytes::new(),
        }
    }
}

pub(crate) fn decode_headers(buf: &mut Input) -> Result<KeyValues, DecodeError> {
    ensure!(buf.remaining() >= 2, errors::Underflow);
    KeyValues::decode(buf)
}

pub(crate) fn decode_annotations(buf: &mut Input) -> Result<Annotations, DecodeError> {
    ensure!(buf.remaining() >= 2, errors::Underflow);
    let count = buf.get_u16();
    let mut annotations = Annotations::with_capacity(count as usize);
    for _ in 0..count {
        let name = String::decode(buf)?;
        let value = String::decode(buf)?;
        annotations.insert(name, value);
    }
    Ok(annotations)
}
