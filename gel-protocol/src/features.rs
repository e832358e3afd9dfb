/// The two-number protocol version negotiated during the handshake.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProtocolVersion {
    pub(crate) major_ver: u16,
    pub(crate) minor_ver: u16,
}

/// Lowest protocol version this driver will speak to.
pub const MIN_PROTOCOL_VERSION: (u16, u16) = (0, 7);
/// Highest protocol version this driver offers during the handshake.
pub const PREFERRED_PROTOCOL_VERSION: (u16, u16) = (0, 13);

impl ProtocolVersion {
    pub fn current() -> ProtocolVersion {
        let (major_ver, minor_ver) = PREFERRED_PROTOCOL_VERSION;
        ProtocolVersion {
            major_ver,
            minor_ver,
        }
    }

    pub fn new(major_ver: u16, minor_ver: u16) -> ProtocolVersion {
        ProtocolVersion {
            major_ver,
            minor_ver,
        }
    }

    pub fn version_tuple(&self) -> (u16, u16) {
        (self.major_ver, self.minor_ver)
    }

    pub fn is_supported(&self) -> bool {
        self.version_tuple() >= MIN_PROTOCOL_VERSION
    }

    pub fn supports_inline_typenames(&self) -> bool {
        self.version_tuple() >= (0, 9)
    }

    pub fn has_implicit_tid(&self) -> bool {
        self.version_tuple() <= (0, 8)
    }
}
