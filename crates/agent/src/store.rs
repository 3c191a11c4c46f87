//! In-process `MessageStore`.

use async_trait::async_trait;
use forgeloop_core::error::StoreError;
use forgeloop_core::message::{ConversationId, Message, MessageStore};
use tokio::sync::RwLock;

/// Keeps finalized messages in memory, in persist order.
#[derive(Debug, Default)]
pub struct InMemoryMessageStore {
    messages: RwLock<Vec<(ConversationId, Message)>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn messages(&self, conversation: &ConversationId) -> Vec<Message> {
        self.messages
            .read()
            .await
            .iter()
            .filter(|(id, _)| id == conversation)
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.read().await.is_empty()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn persist(&self, conversation: &ConversationId, message: &Message) -> Result<(), StoreError> {
        if message.is_streaming() {
            return Err(StoreError::NotFinalized(message.id.clone()));
        }
        self.messages
            .write()
            .await
            .push((conversation.clone(), message.clone()));
        Ok(())
    }
}
