//! Commands of the authenticated stage
//!
//! Light commands only read the connection's cached identity and are answered
//! inline. Heavy commands touch storage or shared state and go through the
//! connection's ordered command queue.
//!
//! Argument layouts (after the `u32` command ID):
//!
//! | Command | Arguments |
//! |---|---|
//! | `CHANGE_USERNAME` | rest = new username |
//! | `CHANGE_PASSWORD` | `lp current`, rest = new password |
//! | `SEND/ACCEPT/DECLINE_CHAT_REQUEST` | `i32 client` |
//! | `DELETE_CHAT_SESSION` | `i32 session` |
//! | `DELETE_CHAT_MESSAGE`, `DOWNLOAD_FILE` | `i32 session`, `i32 message` |
//! | `SET_ACCOUNT_ICON` | rest = icon bytes |
//! | `FETCH_MESSAGES` | `i32 session`, `u32 offset`, `u32 count` |
//!
//! Every other command takes no arguments.

use bytes::{BufMut, Bytes, BytesMut};
use chat_core::{ChatSessionId, ClientId, MessageId};

use super::wire::{put_lp, PayloadReader, ProtocolError, ProtocolResult};

/// Numeric command identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum CommandId {
    FetchUsername = 1,
    FetchClientId = 2,
    FetchChatRequests = 3,
    FetchChatSessions = 4,
    ChangeUsername = 5,
    ChangePassword = 6,
    SendChatRequest = 7,
    AcceptChatRequest = 8,
    DeclineChatRequest = 9,
    DeleteChatSession = 10,
    DeleteChatMessage = 11,
    SetAccountIcon = 12,
    FetchAccountIcon = 13,
    FetchMessages = 14,
    DownloadFile = 15,
    FetchDevices = 16,
    RegenerateBackupCodes = 17,
    Logout = 18,
    LogoutAllDevices = 19,
}

impl CommandId {
    #[must_use]
    pub fn from_u32(value: u32) -> Option<Self> {
        Some(match value {
            1 => Self::FetchUsername,
            2 => Self::FetchClientId,
            3 => Self::FetchChatRequests,
            4 => Self::FetchChatSessions,
            5 => Self::ChangeUsername,
            6 => Self::ChangePassword,
            7 => Self::SendChatRequest,
            8 => Self::AcceptChatRequest,
            9 => Self::DeclineChatRequest,
            10 => Self::DeleteChatSession,
            11 => Self::DeleteChatMessage,
            12 => Self::SetAccountIcon,
            13 => Self::FetchAccountIcon,
            14 => Self::FetchMessages,
            15 => Self::DownloadFile,
            16 => Self::FetchDevices,
            17 => Self::RegenerateBackupCodes,
            18 => Self::Logout,
            19 => Self::LogoutAllDevices,
            _ => return None,
        })
    }

    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self as u32
    }

    /// Whether the command must run on the connection's ordered queue
    #[must_use]
    pub const fn is_heavy(self) -> bool {
        !matches!(
            self,
            Self::FetchUsername
                | Self::FetchClientId
                | Self::FetchChatRequests
                | Self::FetchChatSessions
        )
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::FetchUsername => "FETCH_USERNAME",
            Self::FetchClientId => "FETCH_CLIENT_ID",
            Self::FetchChatRequests => "FETCH_CHAT_REQUESTS",
            Self::FetchChatSessions => "FETCH_CHAT_SESSIONS",
            Self::ChangeUsername => "CHANGE_USERNAME",
            Self::ChangePassword => "CHANGE_PASSWORD",
            Self::SendChatRequest => "SEND_CHAT_REQUEST",
            Self::AcceptChatRequest => "ACCEPT_CHAT_REQUEST",
            Self::DeclineChatRequest => "DECLINE_CHAT_REQUEST",
            Self::DeleteChatSession => "DELETE_CHAT_SESSION",
            Self::DeleteChatMessage => "DELETE_CHAT_MESSAGE",
            Self::SetAccountIcon => "SET_ACCOUNT_ICON",
            Self::FetchAccountIcon => "FETCH_ACCOUNT_ICON",
            Self::FetchMessages => "FETCH_MESSAGES",
            Self::DownloadFile => "DOWNLOAD_FILE",
            Self::FetchDevices => "FETCH_DEVICES",
            Self::RegenerateBackupCodes => "REGENERATE_BACKUP_CODES",
            Self::Logout => "LOGOUT",
            Self::LogoutAllDevices => "LOGOUT_ALL_DEVICES",
        }
    }
}

impl std::fmt::Display for CommandId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.as_u32())
    }
}

/// A command with its parsed arguments
#[derive(Clone, PartialEq, Eq)]
pub enum Command {
    FetchUsername,
    FetchClientId,
    FetchChatRequests,
    FetchChatSessions,
    ChangeUsername(String),
    ChangePassword {
        current: String,
        new_password: String,
    },
    SendChatRequest(ClientId),
    AcceptChatRequest(ClientId),
    DeclineChatRequest(ClientId),
    DeleteChatSession(ChatSessionId),
    DeleteChatMessage {
        session_id: ChatSessionId,
        message_id: MessageId,
    },
    SetAccountIcon(Bytes),
    FetchAccountIcon,
    FetchMessages {
        session_id: ChatSessionId,
        offset: u32,
        count: u32,
    },
    DownloadFile {
        session_id: ChatSessionId,
        message_id: MessageId,
    },
    FetchDevices,
    RegenerateBackupCodes,
    Logout,
    LogoutAllDevices,
}

impl Command {
    pub fn id(&self) -> CommandId {
        match self {
            Self::FetchUsername => CommandId::FetchUsername,
            Self::FetchClientId => CommandId::FetchClientId,
            Self::FetchChatRequests => CommandId::FetchChatRequests,
            Self::FetchChatSessions => CommandId::FetchChatSessions,
            Self::ChangeUsername(_) => CommandId::ChangeUsername,
            Self::ChangePassword { .. } => CommandId::ChangePassword,
            Self::SendChatRequest(_) => CommandId::SendChatRequest,
            Self::AcceptChatRequest(_) => CommandId::AcceptChatRequest,
            Self::DeclineChatRequest(_) => CommandId::DeclineChatRequest,
            Self::DeleteChatSession(_) => CommandId::DeleteChatSession,
            Self::DeleteChatMessage { .. } => CommandId::DeleteChatMessage,
            Self::SetAccountIcon(_) => CommandId::SetAccountIcon,
            Self::FetchAccountIcon => CommandId::FetchAccountIcon,
            Self::FetchMessages { .. } => CommandId::FetchMessages,
            Self::DownloadFile { .. } => CommandId::DownloadFile,
            Self::FetchDevices => CommandId::FetchDevices,
            Self::RegenerateBackupCodes => CommandId::RegenerateBackupCodes,
            Self::Logout => CommandId::Logout,
            Self::LogoutAllDevices => CommandId::LogoutAllDevices,
        }
    }

    #[inline]
    pub fn is_heavy(&self) -> bool {
        self.id().is_heavy()
    }

    /// Parse the command ID and its arguments
    pub fn decode(reader: &mut PayloadReader) -> ProtocolResult<Self> {
        let raw = reader.u32("command")?;
        let id = CommandId::from_u32(raw).ok_or(ProtocolError::UnknownCommand(raw))?;

        Ok(match id {
            CommandId::FetchUsername => Self::FetchUsername,
            CommandId::FetchClientId => Self::FetchClientId,
            CommandId::FetchChatRequests => Self::FetchChatRequests,
            CommandId::FetchChatSessions => Self::FetchChatSessions,
            CommandId::ChangeUsername => Self::ChangeUsername(reader.rest_string("username")?),
            CommandId::ChangePassword => Self::ChangePassword {
                current: reader.lp_string("current password")?,
                new_password: reader.rest_string("new password")?,
            },
            CommandId::SendChatRequest => Self::SendChatRequest(client(reader)?),
            CommandId::AcceptChatRequest => Self::AcceptChatRequest(client(reader)?),
            CommandId::DeclineChatRequest => Self::DeclineChatRequest(client(reader)?),
            CommandId::DeleteChatSession => Self::DeleteChatSession(session(reader)?),
            CommandId::DeleteChatMessage => Self::DeleteChatMessage {
                session_id: session(reader)?,
                message_id: message(reader)?,
            },
            CommandId::SetAccountIcon => Self::SetAccountIcon(reader.rest()),
            CommandId::FetchAccountIcon => Self::FetchAccountIcon,
            CommandId::FetchMessages => Self::FetchMessages {
                session_id: session(reader)?,
                offset: reader.u32("offset")?,
                count: reader.u32("count")?,
            },
            CommandId::DownloadFile => Self::DownloadFile {
                session_id: session(reader)?,
                message_id: message(reader)?,
            },
            CommandId::FetchDevices => Self::FetchDevices,
            CommandId::RegenerateBackupCodes => Self::RegenerateBackupCodes,
            CommandId::Logout => Self::Logout,
            CommandId::LogoutAllDevices => Self::LogoutAllDevices,
        })
    }

    /// Write the command ID and arguments
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.id().as_u32());
        match self {
            Self::ChangeUsername(name) => buf.extend_from_slice(name.as_bytes()),
            Self::ChangePassword {
                current,
                new_password,
            } => {
                put_lp(buf, current.as_bytes());
                buf.extend_from_slice(new_password.as_bytes());
            }
            Self::SendChatRequest(c) | Self::AcceptChatRequest(c) | Self::DeclineChatRequest(c) => {
                buf.put_i32(c.into_inner());
            }
            Self::DeleteChatSession(s) => buf.put_i32(s.into_inner()),
            Self::DeleteChatMessage {
                session_id,
                message_id,
            }
            | Self::DownloadFile {
                session_id,
                message_id,
            } => {
                buf.put_i32(session_id.into_inner());
                buf.put_i32(message_id.into_inner());
            }
            Self::SetAccountIcon(icon) => buf.extend_from_slice(icon),
            Self::FetchMessages {
                session_id,
                offset,
                count,
            } => {
                buf.put_i32(session_id.into_inner());
                buf.put_u32(*offset);
                buf.put_u32(*count);
            }
            _ => {}
        }
    }
}

// Passwords stay out of logs
impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ChangePassword { .. } => f.write_str("ChangePassword { .. }"),
            Self::SetAccountIcon(icon) => write!(f, "SetAccountIcon({} bytes)", icon.len()),
            other => f.write_str(other.id().name()).and_then(|()| match other {
                Self::ChangeUsername(name) => write!(f, "({name})"),
                Self::SendChatRequest(c) | Self::AcceptChatRequest(c) | Self::DeclineChatRequest(c) => {
                    write!(f, "({c})")
                }
                Self::DeleteChatSession(s) => write!(f, "({s})"),
                Self::DeleteChatMessage {
                    session_id,
                    message_id,
                }
                | Self::DownloadFile {
                    session_id,
                    message_id,
                } => write!(f, "({session_id}, {message_id})"),
                Self::FetchMessages {
                    session_id,
                    offset,
                    count,
                } => write!(f, "({session_id}, {offset}, {count})"),
                _ => Ok(()),
            }),
        }
    }
}

fn client(reader: &mut PayloadReader) -> ProtocolResult<ClientId> {
    reader.i32("client id").map(ClientId::new)
}

fn session(reader: &mut PayloadReader) -> ProtocolResult<ChatSessionId> {
    reader.i32("chat session id").map(ChatSessionId::new)
}

fn message(reader: &mut PayloadReader) -> ProtocolResult<MessageId> {
    reader.i32("message id").map(MessageId::new)
}
