//! Messages received from the server: the handshake, authentication
//! challenges, command results and error frames.

use std::collections::HashMap;

use bytes::{Buf, Bytes};
use snafu::ensure;
use uuid::Uuid;

pub use crate::common::{Cardinality, RawTypedesc, TransactionState};
use crate::encoding::{Decode, Input, KeyValues};
use crate::errors::{self, DecodeError};
use crate::features::ProtocolVersion;

/// A message received from the server.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ServerMessage {
    ServerHandshake(ServerHandshake),
    ErrorResponse(ErrorResponse),
    LogMessage(LogMessage),
    Authentication(Authentication),
    ReadyForCommand(ReadyForCommand),
    ServerKeyData(ServerKeyData),
    ParameterStatus(ParameterStatus),
    CommandComplete(CommandComplete),
    PrepareComplete(PrepareComplete),
    CommandDataDescription(CommandDataDescription),
    Data(Data),
    UnknownMessage(u8, Bytes),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerHandshake {
    pub major_ver: u16,
    pub minor_ver: u16,
    pub extensions: HashMap<String, KeyValues>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Authentication {
    Ok,
    Sasl { methods: Vec<String> },
    SaslContinue { data: Bytes },
    SaslFinal { data: Bytes },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorSeverity {
    Error,
    Fatal,
    Panic,
    Unknown(u8),
}

impl ErrorSeverity {
    fn from_u8(v: u8) -> ErrorSeverity {
        match v {
            120 => ErrorSeverity::Error,
            200 => ErrorSeverity::Fatal,
            255 => ErrorSeverity::Panic,
            other => ErrorSeverity::Unknown(other),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MessageSeverity {
    Debug,
    Info,
    Notice,
    Warning,
    Unknown(u8),
}

impl MessageSeverity {
    fn from_u8(v: u8) -> MessageSeverity {
        match v {
            20 => MessageSeverity::Debug,
            40 => MessageSeverity::Info,
            60 => MessageSeverity::Notice,
            80 => MessageSeverity::Warning,
            other => MessageSeverity::Unknown(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ErrorResponse {
    pub severity: ErrorSeverity,
    pub code: u32,
    pub message: String,
    pub attributes: KeyValues,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogMessage {
    pub severity: MessageSeverity,
    pub code: u32,
    pub text: String,
    pub attributes: KeyValues,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerKeyData {
    pub data: [u8; 32],
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterStatus {
    pub name: Bytes,
    pub value: Bytes,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommandComplete {
    pub headers: KeyValues,
    pub status_data: Bytes,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrepareComplete {
    pub headers: KeyValues,
    pub cardinality: Cardinality,
    pub input_typedesc_id: Uuid,
    pub output_typedesc_id: Uuid,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommandDataDescription {
    pub proto: ProtocolVersion,
    pub headers: KeyValues,
    pub result_cardinality: Cardinality,
    pub input_typedesc_id: Uuid,
    pub input_typedesc: Bytes,
    pub output_typedesc_id: Uuid,
    pub output_typedesc: Bytes,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadyForCommand {
    pub headers: KeyValues,
    pub transaction_state: TransactionState,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Data {
    pub data: Vec<Bytes>,
}

impl ServerMessage {
    /// Decode exactly one frame. `buf` must already contain the full
    /// `(tag, length, payload)` record; the length field is not re-checked.
    pub fn decode(buf: &mut Input) -> Result<ServerMessage, DecodeError> {
        use ServerMessage as M;
        ensure!(buf.remaining() >= 5, errors::Underflow);
        let code = buf[0];
        let mut data = buf.slice(5..);
        match code {
            0x76 => ServerHandshake::decode(&mut data).map(M::ServerHandshake),
            0x45 => ErrorResponse::decode(&mut data).map(M::ErrorResponse),
            0x4c => LogMessage::decode(&mut data).map(M::LogMessage),
            0x52 => Authentication::decode(&mut data).map(M::Authentication),
            0x5a => ReadyForCommand::decode(&mut data).map(M::ReadyForCommand),
            0x4b => ServerKeyData::decode(&mut data).map(M::ServerKeyData),
            0x53 => ParameterStatus::decode(&mut data).map(M::ParameterStatus),
            0x43 => CommandComplete::decode(&mut data).map(M::CommandComplete),
            0x31 => PrepareComplete::decode(&mut data).map(M::PrepareComplete),
            0x54 => CommandDataDescription::decode(&mut data).map(M::CommandDataDescription),
            0x44 => Data::decode(&mut data).map(M::Data),
            other => Ok(M::UnknownMessage(other, data.copy_to_bytes(data.remaining()))),
        }
    }
}

impl Decode for ServerHandshake {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        ensure!(buf.remaining() >= 6, errors::Underflow);
        let major_ver = buf.get_u16();
        let minor_ver = buf.get_u16();
        let num_ext = buf.get_u16();
        let mut extensions = HashMap::new();
        for _ in 0..num_ext {
            let name = String::decode(buf)?;
            let headers = KeyValues::decode(buf)?;
            extensions.insert(name, headers);
        }
        Ok(ServerHandshake {
            major_ver,
            minor_ver,
            extensions,
        })
    }
}

impl Decode for Authentication {
    fn decode(buf: &mut Input) -> Result<Authentication, DecodeError> {
        ensure!(buf.remaining() >= 4, errors::Underflow);
        match buf.get_u32() {
            0x00 => Ok(Authentication::Ok),
            0x0A => {
                ensure!(buf.remaining() >= 4, errors::Underflow);
                let num_methods = buf.get_u32() as usize;
                let mut methods = Vec::with_capacity(num_methods);
                for _ in 0..num_methods {
                    methods.push(String::decode(buf)?);
                }
                Ok(Authentication::Sasl { methods })
            }
            0x0B => Ok(Authentication::SaslContinue {
                data: Bytes::decode(buf)?,
            }),
            0x0C => Ok(Authentication::SaslFinal {
                data: Bytes::decode(buf)?,
            }),
            other => errors::InvalidAuthStatus { status: other }.fail(),
        }
    }
}

impl Decode for ErrorResponse {
    fn decode(buf: &mut Input) -> Result<ErrorResponse, DecodeError> {
        ensure!(buf.remaining() >= 9, errors::Underflow);
        let severity = ErrorSeverity::from_u8(buf.get_u8());
        let code = buf.get_u32();
        let message = String::decode(buf)?;
        let attributes = KeyValues::decode(buf)?;
        Ok(ErrorResponse {
            severity,
            code,
            message,
            attributes,
        })
    }
}

impl Decode for LogMessage {
    fn decode(buf: &mut Input) -> Result<LogMessage, DecodeError> {
        ensure!(buf.remaining() >= 9, errors::Underflow);
        let severity = MessageSeverity::from_u8(buf.get_u8());
        let code = buf.get_u32();
        let text = String::decode(buf)?;
        let attributes = KeyValues::decode(buf)?;
        Ok(LogMessage {
            severity,
            code,
            text,
            attributes,
        })
    }
}

impl Decode for ServerKeyData {
    fn decode(buf: &mut Input) -> Result<ServerKeyData, DecodeError> {
        ensure!(buf.remaining() >= 32, errors::Underflow);
        let mut data = [0u8; 32];
        buf.copy_to_slice(&mut data[..]);
        Ok(ServerKeyData { data })
    }
}

impl Decode for ParameterStatus {
    fn decode(buf: &mut Input) -> Result<ParameterStatus, DecodeError> {
        let name = Bytes::decode(buf)?;
        let value = Bytes::decode(buf)?;
        Ok(ParameterStatus { name, value })
    }
}

impl Decode for CommandComplete {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        let headers = KeyValues::decode(buf)?;
        let status_data = Bytes::decode(buf)?;
        Ok(CommandComplete {
            headers,
            status_data,
        })
    }
}

impl Decode for PrepareComplete {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        let headers = KeyValues::decode(buf)?;
        ensure!(buf.remaining() >= 33, errors::Underflow);
        let cardinality = Cardinality::from_u8(buf.get_u8())?;
        let input_typedesc_id = Uuid::decode(buf)?;
        let output_typedesc_id = Uuid::decode(buf)?;
        Ok(PrepareComplete {
            headers,
            cardinality,
            input_typedesc_id,
            output_typedesc_id,
        })
    }
}

impl Decode for CommandDataDescription {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        let proto = buf.proto().clone();
        let headers = KeyValues::decode(buf)?;
        ensure!(buf.remaining() >= 33, errors::Underflow);
        let result_cardinality = Cardinality::from_u8(buf.get_u8())?;
        let input_typedesc_id = Uuid::decode(buf)?;
        let input_typedesc = Bytes::decode(buf)?;
        let output_typedesc_id = Uuid::decode(buf)?;
        let output_typedesc = Bytes::decode(buf)?;
        Ok(CommandDataDescription {
            proto,
            headers,
            result_cardinality,
            input_typedesc_id,
            input_typedesc,
            output_typedesc_id,
            output_typedesc,
        })
    }
}

impl Decode for ReadyForCommand {
    fn decode(buf: &mut Input) -> Result<ReadyForCommand, DecodeError> {
        let headers = KeyValues::decode(buf)?;
        ensure!(buf.remaining() >= 1, errors::Underflow);
        let transaction_state = TransactionState::from_u8(buf.get_u8())?;
        Ok(ReadyForCommand {
            headers,
            transaction_state,
        })
    }
}

impl Decode for Data {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        ensure!(buf.remaining() >= 2, errors::Underflow);
        let num_chunks = buf.get_u16() as usize;
        let mut data = Vec::with_capacity(num_chunks);
        for _ in 0..num_chunks {
            data.push(Bytes::decode(buf)?);
        }
        Ok(Data { data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn authentication_ok_decodes() {
        let proto = ProtocolVersion::current();
        let mut raw = BytesMut::new();
        raw.extend_from_slice(&0u32.to_be_bytes());
        let mut input = Input::new(proto, raw.freeze());
        let auth = Authentication::decode(&mut input).unwrap();
        assert_eq!(auth, Authentication::Ok);
    }

    #[test]
    fn ready_for_command_decodes_transaction_state() {
        let proto = ProtocolVersion::current();
        let mut raw = BytesMut::new();
        raw.extend_from_slice(&0u16.to_be_bytes());
        raw.extend_from_slice(&[0x49]);
        let mut input = Input::new(proto, raw.freeze());
        let msg = ReadyForCommand::decode(&mut input).unwrap();
        assert_eq!(msg.transaction_state, TransactionState::NotInTransaction);
    }
}
