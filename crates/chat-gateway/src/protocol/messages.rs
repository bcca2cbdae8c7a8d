//! Typed protocol messages
//!
//! A payload is `[u32 tag][fields]`. Clients only ever send [`ClientMessage`]
//! and receive [`ServerMessage`]; the reverse directions are implemented for
//! test clients.

use bytes::{BufMut, Bytes, BytesMut};
use chat_core::{ChatSessionId, ClientId, ContentType, Message, MessageId};
use chat_service::MessageBody;

use super::commands::{Command, CommandId};
use super::tags::{ClientTag, CredentialKind, EntryResultCode, EntryType, ServerTag};
use super::wire::{i32_list, put_i32_list, put_lp, PayloadReader, ProtocolError, ProtocolResult};

/// Email and password sent along with a LOGIN selection
#[derive(Clone, PartialEq, Eq)]
pub struct InlineLogin {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for InlineLogin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InlineLogin")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Interleaved actions of the entry stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryAction {
    SetBackupCodeMode(bool),
    DeviceInfo(String),
    Back,
}

impl EntryAction {
    const SET_BACKUP_CODE_MODE: u32 = 1;
    const DEVICE_INFO: u32 = 2;
    const BACK: u32 = 3;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationAction {
    ResendCode,
}

impl VerificationAction {
    const RESEND_CODE: u32 = 1;
}

/// Client to server
#[derive(Clone, PartialEq, Eq)]
pub enum ClientMessage {
    EntryType {
        entry_type: EntryType,
        inline: Option<InlineLogin>,
    },
    Credential {
        kind: CredentialKind,
        value: String,
    },
    EntryAction(EntryAction),
    VerificationCode(String),
    VerificationAction(VerificationAction),
    Content {
        session_id: ChatSessionId,
        body: MessageBody,
    },
    Command(Command),
}

impl ClientMessage {
    pub fn tag(&self) -> ClientTag {
        match self {
            Self::EntryType { .. } => ClientTag::EntryType,
            Self::Credential { .. } => ClientTag::Credential,
            Self::EntryAction(_) => ClientTag::EntryAction,
            Self::VerificationCode(_) => ClientTag::VerificationCode,
            Self::VerificationAction(_) => ClientTag::VerificationAction,
            Self::Content { .. } => ClientTag::Content,
            Self::Command(_) => ClientTag::Command,
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.tag().name()
    }

    pub fn decode(payload: Bytes) -> ProtocolResult<Self> {
        let mut r = PayloadReader::new(payload);
        let raw = r.u32("message type")?;
        let tag = ClientTag::from_u32(raw).ok_or(ProtocolError::UnknownTag(raw))?;

        Ok(match tag {
            ClientTag::EntryType => {
                let raw = r.u32("entry type")?;
                let entry_type =
                    EntryType::from_u32(raw).ok_or(ProtocolError::UnknownEntryType(raw))?;
                let inline = if entry_type == EntryType::Login && r.remaining() > 0 {
                    Some(InlineLogin {
                        email: r.lp_string("email")?,
                        password: r.lp_string("password")?,
                    })
                } else {
                    None
                };
                Self::EntryType { entry_type, inline }
            }
            ClientTag::Credential => {
                let raw = r.u32("credential kind")?;
                let kind =
                    CredentialKind::from_u32(raw).ok_or(ProtocolError::UnknownCredentialKind(raw))?;
                Self::Credential {
                    kind,
                    value: r.rest_string("credential")?,
                }
            }
            ClientTag::EntryAction => {
                let action = match r.u32("entry action")? {
                    EntryAction::SET_BACKUP_CODE_MODE => {
                        EntryAction::SetBackupCodeMode(r.bool("backup code mode")?)
                    }
                    EntryAction::DEVICE_INFO => EntryAction::DeviceInfo(r.rest_string("device info")?),
                    EntryAction::BACK => EntryAction::Back,
                    other => return Err(ProtocolError::UnknownAction(other)),
                };
                Self::EntryAction(action)
            }
            ClientTag::VerificationCode => Self::VerificationCode(r.rest_string("verification code")?),
            ClientTag::VerificationAction => match r.u32("verification action")? {
                VerificationAction::RESEND_CODE => {
                    Self::VerificationAction(VerificationAction::ResendCode)
                }
                other => return Err(ProtocolError::UnknownAction(other)),
            },
            ClientTag::Content => {
                let session_id = ChatSessionId::new(r.i32("chat session id")?);
                let raw = r.u32("content type")?;
                let body = match ContentType::from_u32(raw) {
                    Some(ContentType::Text) => MessageBody::Text(r.rest().to_vec()),
                    Some(ContentType::Image) => MessageBody::Image(r.rest().to_vec()),
                    Some(ContentType::File) => MessageBody::File {
                        name: r.lp_string("file name")?,
                        bytes: r.rest().to_vec(),
                    },
                    None => return Err(ProtocolError::UnknownContentType(raw)),
                };
                Self::Content { session_id, body }
            }
            ClientTag::Command => Self::Command(Command::decode(&mut r)?),
        })
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        buf.put_u32(self.tag().as_u32());

        match self {
            Self::EntryType { entry_type, inline } => {
                buf.put_u32(entry_type.as_u32());
                if let Some(login) = inline {
                    put_lp(&mut buf, login.email.as_bytes());
                    put_lp(&mut buf, login.password.as_bytes());
                }
            }
            Self::Credential { kind, value } => {
                buf.put_u32(kind.as_u32());
                buf.extend_from_slice(value.as_bytes());
            }
            Self::EntryAction(action) => match action {
                EntryAction::SetBackupCodeMode(on) => {
                    buf.put_u32(EntryAction::SET_BACKUP_CODE_MODE);
                    buf.put_u8(u8::from(*on));
                }
                EntryAction::DeviceInfo(info) => {
                    buf.put_u32(EntryAction::DEVICE_INFO);
                    buf.extend_from_slice(info.as_bytes());
                }
                EntryAction::Back => buf.put_u32(EntryAction::BACK),
            },
            Self::VerificationCode(code) => buf.extend_from_slice(code.as_bytes()),
            Self::VerificationAction(VerificationAction::ResendCode) => {
                buf.put_u32(VerificationAction::RESEND_CODE);
            }
            Self::Content { session_id, body } => {
                buf.put_i32(session_id.into_inner());
                buf.put_u32(body.content_type().as_u32());
                match body {
                    MessageBody::Text(bytes) | MessageBody::Image(bytes) => {
                        buf.extend_from_slice(bytes);
                    }
                    MessageBody::File { name, bytes } => {
                        put_lp(&mut buf, name.as_bytes());
                        buf.extend_from_slice(bytes);
                    }
                }
            }
            Self::Command(cmd) => cmd.encode(&mut buf),
        }

        buf.freeze()
    }
}

// Credentials and codes never reach the logs
impl std::fmt::Debug for ClientMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EntryType { entry_type, inline } => f
                .debug_struct("EntryType")
                .field("entry_type", entry_type)
                .field("inline", inline)
                .finish(),
            Self::Credential { kind, .. } => {
                f.debug_struct("Credential").field("kind", kind).finish_non_exhaustive()
            }
            Self::EntryAction(action) => f.debug_tuple("EntryAction").field(action).finish(),
            Self::VerificationCode(_) => f.write_str("VerificationCode(..)"),
            Self::VerificationAction(action) => {
                f.debug_tuple("VerificationAction").field(action).finish()
            }
            Self::Content { session_id, body } => f
                .debug_struct("Content")
                .field("session_id", session_id)
                .field("content_type", &body.content_type())
                .finish_non_exhaustive(),
            Self::Command(cmd) => f.debug_tuple("Command").field(cmd).finish(),
        }
    }
}

/// Server to client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    ServerInfo(String),
    IpVerified(bool),
    EntryResult {
        code: EntryResultCode,
        message: String,
    },
    VerificationResult {
        success: bool,
        attempts_left: u32,
        message: String,
    },
    Content {
        session_id: ChatSessionId,
        message_id: MessageId,
        author: ClientId,
        timestamp_ms: i64,
        content_type: ContentType,
        /// Text or image bytes, or the file name of a file message
        body: Bytes,
    },
    MessageSent {
        session_id: ChatSessionId,
        message_id: MessageId,
        timestamp_ms: i64,
    },
    CommandResult {
        command: CommandId,
        success: bool,
        body: Bytes,
    },
    MessageDeleted {
        session_id: ChatSessionId,
        message_id: MessageId,
    },
    ChatRequestReceived(ClientId),
    ChatSessionAdded {
        session_id: ChatSessionId,
        members: Vec<ClientId>,
    },
    ChatSessionDeleted(ChatSessionId),
    ActiveMembers {
        session_id: ChatSessionId,
        clients: Vec<ClientId>,
    },
    BackupCodes(Vec<String>),
}

impl ServerMessage {
    pub fn info(text: impl Into<String>) -> Self {
        Self::ServerInfo(text.into())
    }

    pub fn entry_result(code: EntryResultCode, message: impl Into<String>) -> Self {
        Self::EntryResult {
            code,
            message: message.into(),
        }
    }

    /// The broadcast form of a stored message
    pub fn content(message: &Message) -> Self {
        Self::Content {
            session_id: message.session_id,
            message_id: message.id,
            author: message.author_id,
            timestamp_ms: message.created_at.timestamp_millis(),
            content_type: message.content_type,
            body: Bytes::copy_from_slice(message.broadcast_body()),
        }
    }

    pub fn message_sent(message: &Message) -> Self {
        Self::MessageSent {
            session_id: message.session_id,
            message_id: message.id,
            timestamp_ms: message.created_at.timestamp_millis(),
        }
    }

    pub fn command_ok(command: CommandId, body: impl Into<Bytes>) -> Self {
        Self::CommandResult {
            command,
            success: true,
            body: body.into(),
        }
    }

    pub fn command_failed(command: CommandId, reason: impl Into<String>) -> Self {
        Self::CommandResult {
            command,
            success: false,
            body: Bytes::from(reason.into()),
        }
    }

    pub fn tag(&self) -> ServerTag {
        match self {
            Self::ServerInfo(_) => ServerTag::ServerInfo,
            Self::IpVerified(_) => ServerTag::IpVerified,
            Self::EntryResult { .. } => ServerTag::EntryResult,
            Self::VerificationResult { .. } => ServerTag::VerificationResult,
            Self::Content { .. } => ServerTag::Content,
            Self::MessageSent { .. } => ServerTag::MessageSent,
            Self::CommandResult { .. } => ServerTag::CommandResult,
            Self::MessageDeleted { .. } => ServerTag::MessageDeleted,
            Self::ChatRequestReceived(_) => ServerTag::ChatRequestReceived,
            Self::ChatSessionAdded { .. } => ServerTag::ChatSessionAdded,
            Self::ChatSessionDeleted(_) => ServerTag::ChatSessionDeleted,
            Self::ActiveMembers { .. } => ServerTag::ActiveMembers,
            Self::BackupCodes(_) => ServerTag::BackupCodes,
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.tag().name()
    }

    /// Serialize without the frame prefix
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::new();
        buf.put_u32(self.tag().as_u32());

        match self {
            Self::ServerInfo(text) => buf.extend_from_slice(text.as_bytes()),
            Self::IpVerified(verified) => buf.put_u8(u8::from(*verified)),
            Self::EntryResult { code, message } => {
                buf.put_u32(code.as_u32());
                buf.extend_from_slice(message.as_bytes());
            }
            Self::VerificationResult {
                success,
                attempts_left,
                message,
            } => {
                buf.put_u8(u8::from(*success));
                buf.put_u32(*attempts_left);
                buf.extend_from_slice(message.as_bytes());
            }
            Self::Content {
                session_id,
                message_id,
                author,
                timestamp_ms,
                content_type,
                body,
            } => {
                buf.put_i32(session_id.into_inner());
                buf.put_i32(message_id.into_inner());
                buf.put_i32(author.into_inner());
                buf.put_i64(*timestamp_ms);
                buf.put_u32(content_type.as_u32());
                buf.extend_from_slice(body);
            }
            Self::MessageSent {
                session_id,
                message_id,
                timestamp_ms,
            } => {
                buf.put_i32(session_id.into_inner());
                buf.put_i32(message_id.into_inner());
                buf.put_i64(*timestamp_ms);
            }
            Self::CommandResult {
                command,
                success,
                body,
            } => {
                buf.put_u32(command.as_u32());
                buf.put_u8(u8::from(*success));
                buf.extend_from_slice(body);
            }
            Self::MessageDeleted {
                session_id,
                message_id,
            } => {
                buf.put_i32(session_id.into_inner());
                buf.put_i32(message_id.into_inner());
            }
            Self::ChatRequestReceived(client) => buf.put_i32(client.into_inner()),
            Self::ChatSessionAdded {
                session_id,
                members: clients,
            }
            | Self::ActiveMembers {
                session_id,
                clients,
            } => {
                buf.put_i32(session_id.into_inner());
                put_i32_list(&mut buf, clients.iter().map(|c| c.into_inner()));
            }
            Self::ChatSessionDeleted(session_id) => buf.put_i32(session_id.into_inner()),
            Self::BackupCodes(codes) => {
                buf.put_u32(codes.len() as u32);
                for code in codes {
                    put_lp(&mut buf, code.as_bytes());
                }
            }
        }

        buf
    }

    pub fn decode(payload: Bytes) -> ProtocolResult<Self> {
        let mut r = PayloadReader::new(payload);
        let raw = r.u32("message type")?;
        let tag = ServerTag::from_u32(raw).ok_or(ProtocolError::UnknownTag(raw))?;

        Ok(match tag {
            ServerTag::ServerInfo => Self::ServerInfo(r.rest_string("text")?),
            ServerTag::IpVerified => Self::IpVerified(r.bool("verified")?),
            ServerTag::EntryResult => {
                let raw = r.u32("result code")?;
                Self::EntryResult {
                    code: EntryResultCode::from_u32(raw).ok_or(ProtocolError::UnknownTag(raw))?,
                    message: r.rest_string("message")?,
                }
            }
            ServerTag::VerificationResult => Self::VerificationResult {
                success: r.bool("success")?,
                attempts_left: r.u32("attempts")?,
                message: r.rest_string("message")?,
            },
            ServerTag::Content => {
                let session_id = ChatSessionId::new(r.i32("chat session id")?);
                let message_id = MessageId::new(r.i32("message id")?);
                let author = ClientId::new(r.i32("author")?);
                let timestamp_ms = r.i64("timestamp")?;
                let raw = r.u32("content type")?;
                Self::Content {
                    session_id,
                    message_id,
                    author,
                    timestamp_ms,
                    content_type: ContentType::from_u32(raw)
                        .ok_or(ProtocolError::UnknownContentType(raw))?,
                    body: r.rest(),
                }
            }
            ServerTag::MessageSent => Self::MessageSent {
                session_id: ChatSessionId::new(r.i32("chat session id")?),
                message_id: MessageId::new(r.i32("message id")?),
                timestamp_ms: r.i64("timestamp")?,
            },
            ServerTag::CommandResult => {
                let raw = r.u32("command")?;
                Self::CommandResult {
                    command: CommandId::from_u32(raw).ok_or(ProtocolError::UnknownCommand(raw))?,
                    success: r.bool("success")?,
                    body: r.rest(),
                }
            }
            ServerTag::MessageDeleted => Self::MessageDeleted {
                session_id: ChatSessionId::new(r.i32("chat session id")?),
                message_id: MessageId::new(r.i32("message id")?),
            },
            ServerTag::ChatRequestReceived => {
                Self::ChatRequestReceived(ClientId::new(r.i32("client id")?))
            }
            ServerTag::ChatSessionAdded => Self::ChatSessionAdded {
                session_id: ChatSessionId::new(r.i32("chat session id")?),
                members: clients(&mut r, "members")?,
            },
            ServerTag::ChatSessionDeleted => {
                Self::ChatSessionDeleted(ChatSessionId::new(r.i32("chat session id")?))
            }
            ServerTag::ActiveMembers => Self::ActiveMembers {
                session_id: ChatSessionId::new(r.i32("chat session id")?),
                clients: clients(&mut r, "active clients")?,
            },
            ServerTag::BackupCodes => {
                let n = r.u32("backup code count")?;
                let codes = (0..n)
                    .map(|_| r.lp_string("backup code"))
                    .collect::<ProtocolResult<Vec<_>>>()?;
                Self::BackupCodes(codes)
            }
        })
    }
}

fn clients(r: &mut PayloadReader, field: &'static str) -> ProtocolResult<Vec<ClientId>> {
    Ok(i32_list(r, field)?.into_iter().map(ClientId::new).collect())
}
