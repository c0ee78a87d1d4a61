use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

use crate::agent::providers::{
    ImageAttachment, LlmProvider, LlmResponseContent, Message, Role,
};
use crate::agent::session::Session;
use crate::agent::tool_executor::ToolExecutor;

/// Fixed reply when an image arrives for a model without vision support.
pub const VISION_DISCLAIMER: &str =
    "Desculpe, este modelo não consegue interpretar imagens. \
     Por favor, descreva o conteúdo da imagem em texto.";

const MAX_TOOL_ITERATIONS: usize = 10;

pub struct ChatEngine {
    provider: Arc<dyn LlmProvider>,
    tool_executor: ToolExecutor,
    supports_vision: bool,
}

impl ChatEngine {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tool_executor: ToolExecutor,
        supports_vision: bool,
    ) -> Self {
        Self {
            provider,
            tool_executor,
            supports_vision,
        }
    }

    /// Run one chat turn: append the user message, call the provider, run
    /// any requested tools, and return the final text reply.
    pub async fn chat(
        &self,
        session: &mut Session,
        message: &str,
        image: Option<ImageAttachment>,
    ) -> Result<String> {
        if image.is_some() && !self.supports_vision {
            info!("Image attached but model has no vision support; replying with disclaimer");
            // Keep the turn in history so a follow-up still has context,
            // but never send the image bytes to the provider.
            session.add_message(Message::user(format!("{}\n\n[imagem anexada]", message)));
            session.add_message(Message::assistant(VISION_DISCLAIMER));
            return Ok(VISION_DISCLAIMER.to_string());
        }

        let mut user_message = Message::user(message);
        if let Some(img) = image {
            user_message.images.push(img);
        }
        session.add_message(user_message);

        let tool_schemas = self.tool_executor.tool_schemas();

        for _ in 0..MAX_TOOL_ITERATIONS {
            let messages = session.messages_for_llm();
            let response = self.provider.chat(&messages, Some(&tool_schemas)).await?;

            match response.content {
                LlmResponseContent::Text(text) => {
                    session.add_message(Message::assistant(text.clone()));
                    return Ok(text);
                }
                LlmResponseContent::ToolCalls(calls) => {
                    session.add_message(Message {
                        role: Role::Assistant,
                        content: String::new(),
                        tool_calls: Some(calls.clone()),
                        tool_call_id: None,
                        images: Vec::new(),
                    });

                    for call in &calls {
                        debug!("Tool call: {} {}", call.name, call.arguments);

                        let output = self
                            .tool_executor
                            .execute_tool(call)
                            .await
                            .unwrap_or_else(|e| format!("Error: {}", e));

                        // Record each result as it lands so partial success
                        // survives a later failure.
                        session.add_message(Message {
                            role: Role::Tool,
                            content: output,
                            tool_calls: None,
                            tool_call_id: Some(call.id.clone()),
                            images: Vec::new(),
                        });
                    }
                }
            }
        }

        anyhow::bail!("Max tool iterations exceeded")
    }
}
