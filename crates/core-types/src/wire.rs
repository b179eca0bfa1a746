//! Wire vocabulary for the device protocol.
//!
//! Every reply from the device starts with a status byte; output payloads
//! are framed as `OUTPUT_BEGIN .. OUTPUT_END` with `ESCAPE` prefixing any
//! literal byte that collides with `OUTPUT_END` or `ESCAPE` itself. Bytes
//! 246..=255 are error codes with stable symbolic names.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Status bytes emitted by the device.
pub mod status {
    /// Command accepted, no output follows (terminal).
    pub const OK: u8 = 1;
    /// Device requests more input from the caller (terminal).
    pub const SEND_INPUT: u8 = 2;
    /// User cancelled the operation on the device (terminal).
    pub const REJECTED: u8 = 3;
    /// An escape-encoded output payload follows.
    pub const OUTPUT_BEGIN: u8 = 4;
    /// End of the output payload (terminal).
    pub const OUTPUT_END: u8 = 5;
    /// The next payload byte is a literal.
    pub const ESCAPE: u8 = 6;
    /// Device is waiting for the user to confirm on-device (non-terminal).
    pub const WAIT_USER_CONFIRM: u8 = 10;
    /// Device requires its PIN before it will proceed (non-terminal by
    /// default, see the `reject_on_locked` configuration key).
    pub const LOCKED: u8 = 11;
    /// First byte of the device error range (246..=255).
    pub const ERROR_MIN: u8 = 246;
}

/// Command opcodes understood by the device. A command payload is the
/// opcode followed by command-specific argument bytes; the engine treats
/// the whole payload as opaque.
pub mod command {
    pub const WAKE: u8 = 1;
    pub const INFO: u8 = 2;

    pub const SETUP: u8 = 10;
    pub const RESTORE_FROM_SEED: u8 = 11;
    pub const RESTORE_FROM_MNEMONIC: u8 = 12;
    pub const ERASE: u8 = 13;

    pub const EXPORT_OWNER_KEY: u8 = 18;
    pub const EXPORT_OWNER_PRIVATE_KEY: u8 = 19;
    pub const EXPORT_APP_KEY: u8 = 20;
    pub const EXPORT_APP_PRIVATE_KEY: u8 = 21;
    pub const EXPORT_OWNER_APP_PRIVATE_KEY: u8 = 22;
    pub const EXPORT_PUBLIC_IDENTITIES: u8 = 23;

    pub const EXPORT_PUBLIC_IDENTITY: u8 = 30;
    pub const START_ENCRYPT: u8 = 31;

    pub const START_DECRYPT: u8 = 40;
    pub const END_ENCRYPT_DECRYPT: u8 = 41;

    pub const CANCEL: u8 = 100;
}

/// Error codes reported by the device (bytes 246..=255).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceError {
    #[error("unknown command")]
    UnknownCommand,
    #[error("device not initialised")]
    NotInitialised,
    #[error("device memory error")]
    MemoryError,
    #[error("app domain too long")]
    AppDomainTooLong,
    #[error("app domain invalid")]
    AppDomainInvalid,
    #[error("mnemonic too long")]
    MnemonicTooLong,
    #[error("mnemonic invalid")]
    MnemonicInvalid,
    #[error("mnemonic generation failed")]
    GenerateMnemonic,
    #[error("device input timeout")]
    InputTimeout,
    #[error("not implemented")]
    NotImplemented,
}

impl DeviceError {
    /// Map a wire byte to its error, `None` if the byte is not in the
    /// error range.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            255 => Some(Self::UnknownCommand),
            254 => Some(Self::NotInitialised),
            253 => Some(Self::MemoryError),
            252 => Some(Self::AppDomainTooLong),
            251 => Some(Self::AppDomainInvalid),
            250 => Some(Self::MnemonicTooLong),
            249 => Some(Self::MnemonicInvalid),
            248 => Some(Self::GenerateMnemonic),
            247 => Some(Self::InputTimeout),
            246 => Some(Self::NotImplemented),
            _ => None,
        }
    }

    /// The wire byte for this error.
    pub fn code(&self) -> u8 {
        match self {
            Self::UnknownCommand => 255,
            Self::NotInitialised => 254,
            Self::MemoryError => 253,
            Self::AppDomainTooLong => 252,
            Self::AppDomainInvalid => 251,
            Self::MnemonicTooLong => 250,
            Self::MnemonicInvalid => 249,
            Self::GenerateMnemonic => 248,
            Self::InputTimeout => 247,
            Self::NotImplemented => 246,
        }
    }
}

/// Terminal status bytes that complete an exchange with a plain status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplyStatus {
    Ok,
    SendInput,
    Rejected,
}

impl ReplyStatus {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            status::OK => Some(Self::Ok),
            status::SEND_INPUT => Some(Self::SendInput),
            status::REJECTED => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn byte(&self) -> u8 {
        match self {
            Self::Ok => status::OK,
            Self::SendInput => status::SEND_INPUT,
            Self::Rejected => status::REJECTED,
        }
    }
}

/// Successful completion of an exchange: either a terminal status byte or
/// a decoded output payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Status(ReplyStatus),
    Output(Vec<u8>),
}

impl Reply {
    pub fn is_ok(&self) -> bool {
        matches!(self, Reply::Status(ReplyStatus::Ok))
    }

    /// The output payload, if the device delivered one.
    pub fn output(&self) -> Option<&[u8]> {
        match self {
            Reply::Output(bytes) => Some(bytes),
            Reply::Status(_) => None,
        }
    }
}

/// Normalized command bytes for `send`.
///
/// A single opcode byte becomes a one-byte payload, strings contribute
/// their raw bytes, and a collection of parts is concatenated in order:
///
/// ```
/// use core_types::wire::{command, Payload};
///
/// let p: Payload = command::INFO.into();
/// assert_eq!(p.as_ref(), &[2]);
///
/// let p: Payload = vec![Payload::from(command::SETUP), Payload::from("pin")].into();
/// assert_eq!(p.as_ref(), b"\x0apin");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Payload(Vec<u8>);

impl Payload {
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for Payload {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<u8> for Payload {
    fn from(byte: u8) -> Self {
        Payload(vec![byte])
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload(bytes)
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Payload(bytes.to_vec())
    }
}

impl<const N: usize> From<[u8; N]> for Payload {
    fn from(bytes: [u8; N]) -> Self {
        Payload(bytes.to_vec())
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Payload(s.as_bytes().to_vec())
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Payload(s.into_bytes())
    }
}

impl From<Vec<Payload>> for Payload {
    fn from(parts: Vec<Payload>) -> Self {
        let mut bytes = Vec::with_capacity(parts.iter().map(Payload::len).sum());
        for part in parts {
            bytes.extend_from_slice(part.as_ref());
        }
        Payload(bytes)
    }
}

impl FromIterator<Payload> for Payload {
    fn from_iter<I: IntoIterator<Item = Payload>>(iter: I) -> Self {
        let mut bytes = Vec::new();
        for part in iter {
            bytes.extend_from_slice(part.as_ref());
        }
        Payload(bytes)
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_device_error_roundtrip() {
        for byte in status::ERROR_MIN..=255 {
            let err = DeviceError::from_byte(byte).unwrap();
            assert_eq!(err.code(), byte);
        }
    }

    #[test]
    fn test_device_error_outside_range() {
        assert_eq!(DeviceError::from_byte(245), None);
        assert_eq!(DeviceError::from_byte(status::OK), None);
        assert_eq!(DeviceError::from_byte(0), None);
    }

    #[test]
    fn test_device_error_names() {
        assert_eq!(DeviceError::from_byte(0xFE), Some(DeviceError::NotInitialised));
        assert_eq!(DeviceError::from_byte(0xFF), Some(DeviceError::UnknownCommand));
        assert_eq!(DeviceError::from_byte(0xF6), Some(DeviceError::NotImplemented));
    }

    #[test]
    fn test_reply_status_bytes() {
        assert_eq!(ReplyStatus::from_byte(1), Some(ReplyStatus::Ok));
        assert_eq!(ReplyStatus::from_byte(2), Some(ReplyStatus::SendInput));
        assert_eq!(ReplyStatus::from_byte(3), Some(ReplyStatus::Rejected));
        assert_eq!(ReplyStatus::from_byte(4), None);
        assert_eq!(ReplyStatus::Rejected.byte(), status::REJECTED);
    }

    #[test]
    fn test_reply_accessors() {
        assert!(Reply::Status(ReplyStatus::Ok).is_ok());
        assert!(!Reply::Status(ReplyStatus::Rejected).is_ok());
        assert_eq!(Reply::Output(vec![1, 2]).output(), Some(&[1u8, 2][..]));
        assert_eq!(Reply::Status(ReplyStatus::Ok).output(), None);
    }

    #[test]
    fn test_payload_from_single_byte() {
        let p: Payload = command::INFO.into();
        assert_eq!(p.as_ref(), &[2]);
    }

    #[test]
    fn test_payload_from_str() {
        let p: Payload = "hi".into();
        assert_eq!(p.as_ref(), b"hi");
    }

    #[test]
    fn test_payload_concatenation() {
        let p: Payload = vec![
            Payload::from(command::RESTORE_FROM_MNEMONIC),
            Payload::from("word"),
            Payload::from(vec![0x00]),
        ]
        .into();
        assert_eq!(p.as_ref(), b"\x0cword\x00");
    }

    #[test]
    fn test_command_catalogue_first_bytes() {
        // The catalogue covers exactly the documented opcodes.
        let all = [
            command::WAKE,
            command::INFO,
            command::SETUP,
            command::RESTORE_FROM_SEED,
            command::RESTORE_FROM_MNEMONIC,
            command::ERASE,
            command::EXPORT_OWNER_KEY,
            command::EXPORT_OWNER_PRIVATE_KEY,
            command::EXPORT_APP_KEY,
            command::EXPORT_APP_PRIVATE_KEY,
            command::EXPORT_OWNER_APP_PRIVATE_KEY,
            command::EXPORT_PUBLIC_IDENTITIES,
            command::EXPORT_PUBLIC_IDENTITY,
            command::START_ENCRYPT,
            command::START_DECRYPT,
            command::END_ENCRYPT_DECRYPT,
            command::CANCEL,
        ];
        assert_eq!(
            all.to_vec(),
            vec![1, 2, 10, 11, 12, 13, 18, 19, 20, 21, 22, 23, 30, 31, 40, 41, 100]
        );
    }
}
