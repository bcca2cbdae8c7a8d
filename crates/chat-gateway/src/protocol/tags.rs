//! Message type tags
//!
//! Every payload starts with a big-endian `u32` tag naming its message type.
//! Client and server tags are separate numbering spaces.

/// Tags of messages sent by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ClientTag {
    /// Pick login or account creation (Start)
    EntryType = 1,
    /// One credential field (Entry)
    Credential = 2,
    /// Backup-code mode, device info or back (Entry)
    EntryAction = 3,
    /// A guess at the emailed code (Verification)
    VerificationCode = 4,
    /// Resend the code (Verification)
    VerificationAction = 5,
    /// A chat message (Authenticated)
    Content = 6,
    /// A command with arguments (Authenticated)
    Command = 7,
}

impl ClientTag {
    #[must_use]
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::EntryType),
            2 => Some(Self::Credential),
            3 => Some(Self::EntryAction),
            4 => Some(Self::VerificationCode),
            5 => Some(Self::VerificationAction),
            6 => Some(Self::Content),
            7 => Some(Self::Command),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self as u32
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::EntryType => "ENTRY_TYPE",
            Self::Credential => "CREDENTIAL",
            Self::EntryAction => "ENTRY_ACTION",
            Self::VerificationCode => "VERIFICATION_CODE",
            Self::VerificationAction => "VERIFICATION_ACTION",
            Self::Content => "CONTENT",
            Self::Command => "COMMAND",
        }
    }
}

impl std::fmt::Display for ClientTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.as_u32())
    }
}

/// Tags of messages sent by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ServerTag {
    ServerInfo = 0,
    IpVerified = 1,
    EntryResult = 2,
    VerificationResult = 3,
    Content = 4,
    MessageSent = 5,
    CommandResult = 6,
    MessageDeleted = 7,
    ChatRequestReceived = 8,
    ChatSessionAdded = 9,
    ChatSessionDeleted = 10,
    ActiveMembers = 11,
    BackupCodes = 12,
}

impl ServerTag {
    #[must_use]
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::ServerInfo),
            1 => Some(Self::IpVerified),
            2 => Some(Self::EntryResult),
            3 => Some(Self::VerificationResult),
            4 => Some(Self::Content),
            5 => Some(Self::MessageSent),
            6 => Some(Self::CommandResult),
            7 => Some(Self::MessageDeleted),
            8 => Some(Self::ChatRequestReceived),
            9 => Some(Self::ChatSessionAdded),
            10 => Some(Self::ChatSessionDeleted),
            11 => Some(Self::ActiveMembers),
            12 => Some(Self::BackupCodes),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self as u32
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ServerInfo => "SERVER_INFO",
            Self::IpVerified => "IP_VERIFIED",
            Self::EntryResult => "ENTRY_RESULT",
            Self::VerificationResult => "VERIFICATION_RESULT",
            Self::Content => "CONTENT",
            Self::MessageSent => "MESSAGE_SENT",
            Self::CommandResult => "COMMAND_RESULT",
            Self::MessageDeleted => "MESSAGE_DELETED",
            Self::ChatRequestReceived => "CHAT_REQUEST_RECEIVED",
            Self::ChatSessionAdded => "CHAT_SESSION_ADDED",
            Self::ChatSessionDeleted => "CHAT_SESSION_DELETED",
            Self::ActiveMembers => "ACTIVE_MEMBERS",
            Self::BackupCodes => "BACKUP_CODES",
        }
    }
}

impl std::fmt::Display for ServerTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.as_u32())
    }
}

/// Which flow an `ENTRY_TYPE` message starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum EntryType {
    Login = 1,
    CreateAccount = 2,
}

impl EntryType {
    #[must_use]
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::Login),
            2 => Some(Self::CreateAccount),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self as u32
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Login => "LOGIN",
            Self::CreateAccount => "CREATE_ACCOUNT",
        }
    }
}

/// Field carried by a `CREDENTIAL` message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum CredentialKind {
    Email = 1,
    Username = 2,
    Password = 3,
    BackupCode = 4,
}

impl CredentialKind {
    #[must_use]
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::Email),
            2 => Some(Self::Username),
            3 => Some(Self::Password),
            4 => Some(Self::BackupCode),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self as u32
    }
}

/// Outcome codes of `ENTRY_RESULT`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum EntryResultCode {
    Success = 0,
    /// Fields accepted, a code was emailed
    VerificationRequired = 1,
    InvalidCredentials = 2,
    ValidationFailed = 3,
    EmailInUse = 4,
    /// An ID space is exhausted
    Unavailable = 5,
    ServerError = 6,
}

impl EntryResultCode {
    #[must_use]
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Success),
            1 => Some(Self::VerificationRequired),
            2 => Some(Self::InvalidCredentials),
            3 => Some(Self::ValidationFailed),
            4 => Some(Self::EmailInUse),
            5 => Some(Self::Unavailable),
            6 => Some(Self::ServerError),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self as u32
    }
}
