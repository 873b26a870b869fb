use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// Per-user progress through a workflow.
///
/// Mutated exclusively by the workflow engine while processing a turn;
/// persisted through a [`ConversationStore`] with a single save per turn.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    conversation_id: String,
    user_id: String,
    last_step: Option<String>,
    valid_answers: HashMap<String, String>,
    error_count: u32,
    complete: bool,
}

impl Conversation {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            conversation_id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            last_step: None,
            valid_answers: HashMap::new(),
            error_count: 0,
            complete: false,
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// The machine name of the last step sent to the user, or `None` for
    /// a brand-new conversation.
    pub fn last_step(&self) -> Option<&str> {
        self.last_step.as_deref()
    }

    pub fn set_last_step(&mut self, step: impl Into<String>) {
        self.last_step = Some(step.into());
    }

    pub fn valid_answers(&self) -> &HashMap<String, String> {
        &self.valid_answers
    }

    /// Record a validated answer for a step. An existing answer is
    /// appended to with a blank-line separator unless `replace` is set.
    pub fn set_valid_answer(&mut self, step_machine_name: &str, answer: &str, replace: bool) {
        match self.valid_answers.get_mut(step_machine_name) {
            Some(existing) if !replace => {
                existing.push_str("\n\n");
                existing.push_str(answer);
            }
            _ => {
                self.valid_answers
                    .insert(step_machine_name.to_string(), answer.to_string());
            }
        }
    }

    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    pub fn increment_error_count(&mut self) {
        self.error_count += 1;
    }

    pub fn reset_error_count(&mut self) {
        self.error_count = 0;
    }

    pub fn complete(&self) -> bool {
        self.complete
    }

    pub fn set_complete(&mut self, complete: bool) {
        self.complete = complete;
    }
}

/// Persistence contract for conversations, implemented by the embedding
/// application.
pub trait ConversationStore: Send + Sync {
    /// Load the user's oldest incomplete conversation, creating a fresh
    /// record when none exists.
    fn get(&self, user_id: &str) -> anyhow::Result<Conversation>;

    /// Persist the conversation's current state.
    fn save(&self, conversation: &Conversation) -> anyhow::Result<()>;

    /// Remove the conversation's record entirely.
    fn delete(&self, conversation: &Conversation) -> anyhow::Result<()>;
}

/// In-memory store for tests and storage-less embedders. Records are
/// kept in creation order.
#[derive(Default)]
pub struct MemoryConversationStore {
    records: Mutex<Vec<Conversation>>,
}

impl MemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot a conversation by id, if present.
    pub fn find(&self, conversation_id: &str) -> Option<Conversation> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|c| c.conversation_id() == conversation_id)
            .cloned()
    }
}

impl ConversationStore for MemoryConversationStore {
    fn get(&self, user_id: &str) -> anyhow::Result<Conversation> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = records
            .iter()
            .find(|c| c.user_id() == user_id && !c.complete())
        {
            return Ok(existing.clone());
        }
        let fresh = Conversation::new(user_id);
        records.push(fresh.clone());
        Ok(fresh)
    }

    fn save(&self, conversation: &Conversation) -> anyhow::Result<()> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        match records
            .iter_mut()
            .find(|c| c.conversation_id() == conversation.conversation_id())
        {
            Some(existing) => *existing = conversation.clone(),
            None => records.push(conversation.clone()),
        }
        Ok(())
    }

    fn delete(&self, conversation: &Conversation) -> anyhow::Result<()> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|c| c.conversation_id() != conversation.conversation_id());
        Ok(())
    }
}
