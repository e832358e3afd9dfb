//! Messages sent from client to server: the handshake, the SASL exchange,
//! and the granular/script query flows.

use std::collections::HashMap;

use bytes::{BufMut, Bytes};
use uuid::Uuid;

use crate::common::{CompilationOptions, State};
use crate::encoding::{encode, Annotations, Encode, KeyValues, Output};
use crate::errors::{self, EncodeError};

/// A message sent from client to server.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ClientMessage {
    ClientHandshake(ClientHandshake),
    AuthenticationSaslInitialResponse(SaslInitialResponse),
    AuthenticationSaslResponse(SaslResponse),
    Prepare(Prepare),
    Execute(Execute),
    OptimisticExecute(OptimisticExecute),
    ExecuteScript(ExecuteScript),
    Terminate,
    UnknownMessage(u8, Bytes),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientHandshake {
    pub major_ver: u16,
    pub minor_ver: u16,
    pub params: HashMap<String, String>,
    pub extensions: HashMap<String, KeyValues>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SaslInitialResponse {
    pub method: String,
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SaslResponse {
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prepare {
    pub annotations: Annotations,
    pub options: CompilationOptions,
    pub command_text: String,
    pub state: State,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Execute {
    pub annotations: Annotations,
    pub options: CompilationOptions,
    pub command_text: String,
    pub state: State,
    pub input_typedesc_id: Uuid,
    pub output_typedesc_id: Uuid,
    pub arguments: Bytes,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimisticExecute {
    pub annotations: Annotations,
    pub options: CompilationOptions,
    pub command_text: String,
    pub state: State,
    pub input_typedesc_id: Uuid,
    pub output_typedesc_id: Uuid,
    pub arguments: Bytes,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecuteScript {
    pub annotations: Annotations,
    pub allow_capabilities: crate::common::Capabilities,
    pub command_text: String,
    pub state: State,
}

impl ClientMessage {
    pub fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        use ClientMessage::*;
        match self {
            ClientHandshake(h) => encode(buf, 0x56, h),
            AuthenticationSaslInitialResponse(h) => encode(buf, 0x70, h),
            AuthenticationSaslResponse(h) => encode(buf, 0x72, h),
            Prepare(h) => encode(buf, 0x50, h),
            Execute(h) => encode(buf, 0x45, h),
            OptimisticExecute(h) => encode(buf, 0x4f, h),
            ExecuteScript(h) => encode(buf, 0x51, h),
            Terminate => encode(buf, 0x58, &EmptyMessage),
            UnknownMessage(..) => errors::UnknownMessageCantBeEncoded.fail(),
        }
    }
}

struct EmptyMessage;
impl Encode for EmptyMessage {
    fn encode(&self, _buf: &mut Output) -> Result<(), EncodeError> {
        Ok(())
    }
}

impl Encode for ClientHandshake {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        buf.reserve(8);
        buf.put_u16(self.major_ver);
        buf.put_u16(self.minor_ver);
        buf.put_u16(u16::try_from(self.params.len()).ok().context_too_many_params()?);
        for (k, v) in &self.params {
            k.clone().encode(buf)?;
            v.clone().encode(buf)?;
        }
        buf.reserve(2);
        buf.put_u16(u16::try_from(self.extensions.len()).ok().context_too_many_headers()?);
        for (name, headers) in &self.extensions {
            name.clone().encode(buf)?;
            headers.encode(buf)?;
        }
        Ok(())
    }
}

trait OptionExtHelpers<T> {
    fn context_too_many_params(self) -> Result<T, EncodeError>;
    fn context_too_many_headers(self) -> Result<T, EncodeError>;
}

impl<T> OptionExtHelpers<T> for Option<T> {
    fn context_too_many_params(self) -> Result<T, EncodeError> {
        self.ok_or_else(|| errors::TooManyParams.build())
    }
    fn context_too_many_headers(self) -> Result<T, EncodeError> {
        self.ok_or_else(|| errors::TooManyHeaders.build())
    }
}

impl Encode for SaslInitialResponse {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        self.method.clone().encode(buf)?;
        self.data.clone().encode(buf)?;
        Ok(())
    }
}

impl Encode for SaslResponse {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        self.data.clone().encode(buf)?;
        Ok(())
    }
}

fn encode_annotations(buf: &mut Output, annotations: &Annotations) -> Result<(), EncodeError> {
    buf.reserve(2);
    buf.put_u16(u16::try_from(annotations.len()).ok().context_too_many_headers()?);
    for (k, v) in annotations {
        k.clone().encode(buf)?;
        v.clone().encode(buf)?;
    }
    Ok(())
}

fn encode_compilation_options(buf: &mut Output, options: &CompilationOptions) -> Result<(), EncodeError> {
    buf.reserve(19);
    buf.put_u64(options.implicit_limit.unwrap_or(0));
    let mut flags: u8 = 0;
    if options.implicit_typenames {
        flags |= 0x01;
    }
    if options.implicit_typeids {
        flags |= 0x02;
    }
    if options.explicit_objectids {
        flags |= 0x04;
    }
    buf.put_u8(flags);
    buf.put_u64(options.allow_capabilities.bits());
    buf.put_u8(options.input_language as u8);
    buf.put_u8(options.io_format as u8);
    buf.put_u8(options.expected_cardinality as u8);
    Ok(())
}

impl Encode for Prepare {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        encode_annotations(buf, &self.annotations)?;
        encode_compilation_options(buf, &self.options)?;
        self.command_text.clone().encode(buf)?;
        self.state.typedesc_id.encode(buf)?;
        self.state.data.clone().encode(buf)?;
        Ok(())
    }
}

impl Encode for Execute {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        encode_annotations(buf, &self.annotations)?;
        encode_compilation_options(buf, &self.options)?;
        self.command_text.clone().encode(buf)?;
        self.state.typedesc_id.encode(buf)?;
        self.state.data.clone().encode(buf)?;
        self.input_typedesc_id.encode(buf)?;
        self.output_typedesc_id.encode(buf)?;
        self.arguments.clone().encode(buf)?;
        Ok(())
    }
}

impl Encode for OptimisticExecute {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        encode_annotations(buf, &self.annotations)?;
        encode_compilation_options(buf, &self.options)?;
        self.command_text.clone().encode(buf)?;
        self.state.typedesc_id.encode(buf)?;
        self.state.data.clone().encode(buf)?;
        self.input_typedesc_id.encode(buf)?;
        self.output_typedesc_id.encode(buf)?;
        self.arguments.clone().encode(buf)?;
        Ok(())
    }
}

impl Encode for ExecuteScript {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        encode_annotations(buf, &self.annotations)?;
        buf.reserve(8);
        buf.put_u64(self.allow_capabilities.bits());
        self.command_text.clone().encode(buf)?;
        self.state.typedesc_id.encode(buf)?;
        self.state.data.clone().encode(buf)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ProtocolVersion;
    use bytes::BytesMut;

    #[test]
    fn terminate_has_no_payload() {
        let proto = ProtocolVersion::current();
        let mut bytes = BytesMut::new();
        let mut out = Output::new(&proto, &mut bytes);
        ClientMessage::Terminate.encode(&mut out).unwrap();
        assert_eq!(bytes[0], 0x58);
        assert_eq!(bytes.len(), 5);
    }
}
