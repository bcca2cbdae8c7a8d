//! Message entity - represents a chat message

use chrono::{DateTime, Utc};

use crate::value_objects::{ChatSessionId, ClientId, MessageId};

/// Kind of payload a message carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ContentType {
    Text = 0,
    File = 1,
    Image = 2,
}

impl ContentType {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Text),
            1 => Some(Self::File),
            2 => Some(Self::Image),
            _ => None,
        }
    }

    #[inline]
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::File => "FILE",
            Self::Image => "IMAGE",
        }
    }
}

/// Message entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub session_id: ChatSessionId,
    pub id: MessageId,
    pub author_id: ClientId,
    pub content_type: ContentType,
    pub payload: Vec<u8>,
    /// Present only for [`ContentType::File`]
    pub file_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Create a text or image message
    pub fn new(
        session_id: ChatSessionId,
        id: MessageId,
        author_id: ClientId,
        content_type: ContentType,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            session_id,
            id,
            author_id,
            content_type,
            payload,
            file_name: None,
            created_at: Utc::now(),
        }
    }

    /// Create a file message
    pub fn new_file(
        session_id: ChatSessionId,
        id: MessageId,
        author_id: ClientId,
        file_name: String,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            session_id,
            id,
            author_id,
            content_type: ContentType::File,
            payload,
            file_name: Some(file_name),
            created_at: Utc::now(),
        }
    }

    #[inline]
    pub fn is_file(&self) -> bool {
        self.content_type == ContentType::File
    }

    /// Bytes sent to other members when the message is broadcast.
    ///
    /// Files travel by name only; their bytes are fetched on demand.
    pub fn broadcast_body(&self) -> &[u8] {
        match (&self.content_type, &self.file_name) {
            (ContentType::File, Some(name)) => name.as_bytes(),
            _ => &self.payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_roundtrip() {
        for ct in [ContentType::Text, ContentType::File, ContentType::Image] {
            assert_eq!(ContentType::from_u32(ct.as_u32()), Some(ct));
        }
        assert_eq!(ContentType::from_u32(3), None);
    }

    #[test]
    fn test_text_broadcast_body() {
        let msg = Message::new(
            ChatSessionId::new(1),
            MessageId::new(1),
            ClientId::new(2),
            ContentType::Text,
            b"hello".to_vec(),
        );
        assert!(!msg.is_file());
        assert_eq!(msg.broadcast_body(), b"hello");
    }

    #[test]
    fn test_file_broadcast_body_is_name() {
        let msg = Message::new_file(
            ChatSessionId::new(1),
            MessageId::new(2),
            ClientId::new(2),
            "notes.txt".to_string(),
            vec![0u8; 1024],
        );
        assert!(msg.is_file());
        assert_eq!(msg.broadcast_body(), b"notes.txt");
    }
}
