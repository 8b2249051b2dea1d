//! Relay cell vocabulary
//!
//! The relay-cell codec itself belongs to the circuit. Streams only need the
//! relay command verbs, the END reason codes, and the payload budget of one
//! RELAY_DATA cell.

/// Relay command types (wire values from the Tor protocol)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RelayCommand {
    /// BEGIN - open a stream
    Begin = 1,
    /// DATA - stream data
    Data = 2,
    /// END - close a stream
    End = 3,
    /// CONNECTED - stream opened
    Connected = 4,
    /// SENDME - flow control acknowledgement
    Sendme = 5,
    /// EXTEND - extend circuit (TAP)
    Extend = 6,
    /// EXTENDED - circuit extended (TAP)
    Extended = 7,
    /// TRUNCATE - truncate circuit
    Truncate = 8,
    /// TRUNCATED - circuit truncated
    Truncated = 9,
    /// DROP - long-range padding
    Drop = 10,
    /// RESOLVE - DNS resolve
    Resolve = 11,
    /// RESOLVED - DNS resolved
    Resolved = 12,
    /// BEGIN_DIR - open a directory stream
    BeginDir = 13,
    /// EXTEND2 - extend circuit
    Extend2 = 14,
    /// EXTENDED2 - circuit extended
    Extended2 = 15,
}

impl RelayCommand {
    /// Parse command from byte
    pub fn from_u8(cmd: u8) -> Option<Self> {
        match cmd {
            1 => Some(RelayCommand::Begin),
            2 => Some(RelayCommand::Data),
            3 => Some(RelayCommand::End),
            4 => Some(RelayCommand::Connected),
            5 => Some(RelayCommand::Sendme),
            6 => Some(RelayCommand::Extend),
            7 => Some(RelayCommand::Extended),
            8 => Some(RelayCommand::Truncate),
            9 => Some(RelayCommand::Truncated),
            10 => Some(RelayCommand::Drop),
            11 => Some(RelayCommand::Resolve),
            12 => Some(RelayCommand::Resolved),
            13 => Some(RelayCommand::BeginDir),
            14 => Some(RelayCommand::Extend2),
            15 => Some(RelayCommand::Extended2),
            _ => None,
        }
    }

    /// Whether this command addresses a stream (non-zero stream id)
    pub fn is_stream_command(self) -> bool {
        matches!(
            self,
            RelayCommand::Begin
                | RelayCommand::Data
                | RelayCommand::End
                | RelayCommand::Connected
                | RelayCommand::Resolve
                | RelayCommand::Resolved
                | RelayCommand::BeginDir
        )
    }
}

/// Reason byte carried in a RELAY_END payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EndReason {
    Misc = 1,
    ResolveFailed = 2,
    ConnectRefused = 3,
    ExitPolicy = 4,
    Destroy = 5,
    /// Clean close
    Done = 6,
    Timeout = 7,
    NoRoute = 8,
    Hibernating = 9,
    Internal = 10,
    ResourceLimit = 11,
    ConnReset = 12,
    TorProtocol = 13,
    NotDirectory = 14,
}

impl EndReason {
    /// Parse reason from byte. Unknown values collapse to `Misc`.
    pub fn from_u8(reason: u8) -> Self {
        match reason {
            2 => EndReason::ResolveFailed,
            3 => EndReason::ConnectRefused,
            4 => EndReason::ExitPolicy,
            5 => EndReason::Destroy,
            6 => EndReason::Done,
            7 => EndReason::Timeout,
            8 => EndReason::NoRoute,
            9 => EndReason::Hibernating,
            10 => EndReason::Internal,
            11 => EndReason::ResourceLimit,
            12 => EndReason::ConnReset,
            13 => EndReason::TorProtocol,
            14 => EndReason::NotDirectory,
            _ => EndReason::Misc,
        }
    }

    /// Reason from an END payload (empty payload means `Misc`)
    pub fn from_payload(payload: &[u8]) -> Self {
        payload.first().map_or(EndReason::Misc, |b| Self::from_u8(*b))
    }

    pub fn name(self) -> &'static str {
        match self {
            EndReason::Misc => "MISC",
            EndReason::ResolveFailed => "RESOLVEFAILED",
            EndReason::ConnectRefused => "CONNECTREFUSED",
            EndReason::ExitPolicy => "EXITPOLICY",
            EndReason::Destroy => "DESTROY",
            EndReason::Done => "DONE",
            EndReason::Timeout => "TIMEOUT",
            EndReason::NoRoute => "NOROUTE",
            EndReason::Hibernating => "HIBERNATING",
            EndReason::Internal => "INTERNAL",
            EndReason::ResourceLimit => "RESOURCELIMIT",
            EndReason::ConnReset => "CONNRESET",
            EndReason::TorProtocol => "TORPROTOCOL",
            EndReason::NotDirectory => "NOTDIRECTORY",
        }
    }
}

/// Relay cell payload size (cell body)
pub const CELL_PAYLOAD_SIZE: usize = 509;

/// Relay header: command (1) | recognized (2) | stream id (2) | digest (4) | length (2)
pub const RELAY_HEADER_SIZE: usize = 1 + 2 + 2 + 4 + 2;

/// Maximum bytes of stream data carried by one RELAY_DATA cell
pub const MAX_PAYLOAD: usize = CELL_PAYLOAD_SIZE - RELAY_HEADER_SIZE;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_budget() {
        assert_eq!(MAX_PAYLOAD, 498);
        assert_eq!(MAX_PAYLOAD, 509 - 1 - 2 - 2 - 4 - 2);
    }

    #[test]
    fn test_relay_command_wire_values() {
        assert_eq!(RelayCommand::Data as u8, 2);
        assert_eq!(RelayCommand::End as u8, 3);
        assert_eq!(RelayCommand::Sendme as u8, 5);

        for cmd in 1..=15u8 {
            let parsed = RelayCommand::from_u8(cmd).unwrap();
            assert_eq!(parsed as u8, cmd);
        }
        assert!(RelayCommand::from_u8(0).is_none());
        assert!(RelayCommand::from_u8(200).is_none());
    }

    #[test]
    fn test_stream_commands() {
        assert!(RelayCommand::Data.is_stream_command());
        assert!(RelayCommand::End.is_stream_command());
        assert!(!RelayCommand::Extend2.is_stream_command());
        // SENDME may be circuit- or stream-level
        assert!(!RelayCommand::Sendme.is_stream_command());
    }

    #[test]
    fn test_end_reason() {
        assert_eq!(EndReason::Done as u8, 6);
        assert_eq!(EndReason::from_u8(6), EndReason::Done);
        assert_eq!(EndReason::from_u8(99), EndReason::Misc);
        assert_eq!(EndReason::from_payload(&[]), EndReason::Misc);
        assert_eq!(EndReason::from_payload(&[3, 0, 0]), EndReason::ConnectRefused);
        assert_eq!(EndReason::ExitPolicy.name(), "EXITPOLICY");
    }
}
