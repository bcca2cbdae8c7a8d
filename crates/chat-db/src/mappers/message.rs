//! Message entity <-> model mapper

use chat_core::entities::{ContentType, Message};
use chat_core::error::DomainError;
use chat_core::value_objects::{ChatSessionId, ClientId, MessageId};

use crate::models::MessageModel;

impl TryFrom<MessageModel> for Message {
    type Error = DomainError;

    fn try_from(model: MessageModel) -> Result<Self, Self::Error> {
        let content_type = u32::try_from(model.content_type)
            .ok()
            .and_then(ContentType::from_u32)
            .ok_or_else(|| {
                DomainError::DatabaseError(format!(
                    "Unknown content type {} stored for message {}",
                    model.content_type, model.message_id
                ))
            })?;

        Ok(Message {
            session_id: ChatSessionId::new(model.session_id),
            id: MessageId::new(model.message_id),
            author_id: ClientId::new(model.author_id),
            content_type,
            payload: model.payload,
            file_name: model.file_name,
            created_at: model.created_at,
        })
    }
}
