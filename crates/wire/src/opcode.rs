use strum::FromRepr;

/// Operation codes, ordered to match the original protocol's `MSG_*`
/// constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
#[repr(u16)]
pub enum Opcode {
    GetFile = 0,
    SearchFile = 1,
    CreateFile = 2,
    ReadFile = 3,
    WriteFile = 4,
    CreateDir = 5,
    DeleteDir = 6,
    Link = 7,
    Unlink = 8,
    Sync = 9,
}

impl Opcode {
    #[must_use]
    pub fn from_raw(value: u16) -> Option<Self> {
        Self::from_repr(value)
    }

    /// Requests that carry a bulk data payload alongside the header
    /// (`spec.md` §6's `DataPacket.pointer`, realized as channel bytes).
    #[must_use]
    pub fn carries_payload(self) -> bool {
        matches!(self, Self::ReadFile | Self::WriteFile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_variant() {
        for raw in 0..=9u16 {
            assert!(Opcode::from_raw(raw).is_some(), "missing opcode for {raw}");
        }
        assert!(Opcode::from_raw(10).is_none());
    }

    #[test]
    fn only_read_and_write_carry_payloads() {
        assert!(Opcode::ReadFile.carries_payload());
        assert!(Opcode::WriteFile.carries_payload());
        assert!(!Opcode::Sync.carries_payload());
    }
}
