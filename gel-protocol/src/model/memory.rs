use std::fmt::{Debug, Display};

/// A `cfg::memory` value, carried over the wire as a signed byte count.
#[derive(Copy, Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ConfigMemory(pub(crate) i64);

impl ConfigMemory {
    pub fn from_bytes(bytes: i64) -> ConfigMemory {
        ConfigMemory(bytes)
    }

    pub fn to_bytes(self) -> i64 {
        self.0
    }
}

static KIB: i64 = 1024;
static MIB: i64 = 1024 * KIB;
static GIB: i64 = 1024 * MIB;
static TIB: i64 = 1024 * GIB;

impl Display for ConfigMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let v = self.0;
        if v >= TIB && v % TIB == 0 {
            write!(f, "{}TiB", v / TIB)
        } else if v >= GIB && v % GIB == 0 {
            write!(f, "{}GiB", v / GIB)
        } else if v >= MIB && v % MIB == 0 {
            write!(f, "{}MiB", v / MIB)
        } else if v >= KIB && v % KIB == 0 {
            write!(f, "{}KiB", v / KIB)
        } else {
            write!(f, "{}B", v)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_exact_units() {
        assert_eq!(ConfigMemory::from_bytes(1024).to_string(), "1KiB");
        assert_eq!(ConfigMemory::from_bytes(1024 * 1024).to_string(), "1MiB");
        assert_eq!(ConfigMemory::from_bytes(3).to_string(), "3B");
    }
}
