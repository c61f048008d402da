//! In-process channel that keeps every reply; used by tests and embedders that read replies back.

use crate::activity::Reply;
use crate::channels::sender::{ChannelError, ReplySender};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

#[derive(Default)]
pub struct MemoryChannel {
    replies: Mutex<Vec<Reply>>,
    closed: AtomicBool,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take all replies sent so far.
    pub async fn drain(&self) -> Vec<Reply> {
        std::mem::take(&mut *self.replies.lock().await)
    }

    /// Replies sent to one conversation so far (not drained).
    pub async fn for_conversation(&self, conversation_id: &str) -> Vec<Reply> {
        self.replies
            .lock()
            .await
            .iter()
            .filter(|r| r.conversation.id == conversation_id)
            .cloned()
            .collect()
    }

    /// Make every further send fail, to exercise transport failures.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ReplySender for MemoryChannel {
    fn id(&self) -> &str {
        "memory"
    }

    async fn send_reply(&self, reply: &Reply) -> Result<(), ChannelError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ChannelError::Closed);
        }
        self.replies.lock().await.push(reply.clone());
        Ok(())
    }
}
