//! In-memory conversation thread.
//!
//! History lives for the lifetime of the process only; nothing is persisted
//! across restarts.

use crate::agent::providers::{Message, Role};

#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    system_context: Option<String>,
    messages: Vec<Message>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            system_context: None,
            messages: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_system_context(&mut self, context: String) {
        self.system_context = Some(context);
    }

    pub fn system_context(&self) -> Option<&str> {
        self.system_context.as_deref()
    }

    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Full message list for the provider: system context first, then history.
    pub fn messages_for_llm(&self) -> Vec<Message> {
        let mut out = Vec::with_capacity(self.messages.len() + 1);
        if let Some(context) = &self.system_context {
            out.push(Message {
                role: Role::System,
                content: context.clone(),
                tool_calls: None,
                tool_call_id: None,
                images: Vec::new(),
            });
        }
        out.extend(self.messages.iter().cloned());
        out
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
