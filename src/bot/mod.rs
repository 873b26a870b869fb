use crate::conversation::ConversationStore;
use crate::error::BotError;
use crate::inbound::translate;
use crate::platform::MessageSender;
use crate::workflow::ConversationWorkflow;
use std::sync::Arc;

/// Drives one raw webhook batch through translation, the workflow
/// engine, and outbound delivery.
pub struct Bot {
    store: Arc<dyn ConversationStore>,
    sender: Arc<dyn MessageSender>,
    workflow: Arc<dyn ConversationWorkflow>,
}

impl Bot {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        sender: Arc<dyn MessageSender>,
        workflow: Arc<dyn ConversationWorkflow>,
    ) -> Self {
        Self {
            store,
            sender,
            workflow,
        }
    }

    /// Process a raw webhook batch.
    ///
    /// Events for one sender run strictly in arrival order, each turn
    /// completing (including its save) before the next begins. A failed
    /// turn abandons that sender's remaining events but never affects
    /// other senders; delivery failures are absorbed by the sender seam.
    pub async fn process(&self, raw: &str) -> Result<(), BotError> {
        let batches = translate(raw)?;

        'senders: for (user_id, events) in batches {
            for event in events {
                let mut conversation = match self.store.get(&user_id) {
                    Ok(conversation) => conversation,
                    Err(error) => {
                        tracing::error!("loading conversation for user {user_id} failed: {error:#}");
                        continue 'senders;
                    }
                };

                let response = match self
                    .workflow
                    .process_conversation(&mut conversation, &event)
                {
                    Ok(response) => response,
                    Err(error) => {
                        tracing::error!("processing turn for user {user_id} failed: {error}");
                        continue 'senders;
                    }
                };

                self.sender.send_all(&response, &user_id).await;
            }
        }

        Ok(())
    }
}
