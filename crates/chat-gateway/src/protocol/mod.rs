//! Gateway protocol definitions
//!
//! Framing, message tags, field encoding and the typed messages built on them.

pub mod codec;
pub mod commands;
pub mod messages;
pub mod tags;
pub mod wire;

pub use codec::{prepare_payload, FrameCodec, FrameError, ZSTD_MAGIC};
pub use commands::{Command, CommandId};
pub use messages::{ClientMessage, EntryAction, InlineLogin, ServerMessage, VerificationAction};
pub use tags::{ClientTag, CredentialKind, EntryResultCode, EntryType, ServerTag};
pub use wire::{PayloadReader, ProtocolError, ProtocolResult};
