pub mod chat_engine;
pub mod gemini;
pub mod llm_error;
pub mod providers;
pub mod session;
pub mod session_store;
pub mod system_prompt;
pub mod tool_executor;
pub mod tools;

pub use chat_engine::{ChatEngine, VISION_DISCLAIMER};
pub use gemini::GeminiProvider;
pub use llm_error::LlmError;
pub use providers::{
    ImageAttachment, LlmProvider, LlmResponse, LlmResponseContent, Message, Role, ToolCall,
    ToolSchema, Usage,
};
pub use session::Session;
pub use session_store::SessionStore;
pub use tool_executor::ToolExecutor;
pub use tools::{create_default_tools, Tool, SEARCH_KEY_MISSING};

use anyhow::Result;
use std::sync::Arc;

use crate::config::Config;

/// Facade pairing the configured model with its tools.
///
/// One instance serves all sessions; per-conversation state lives in
/// [`Session`] values owned by the caller (usually the [`SessionStore`]).
pub struct Agent {
    engine: ChatEngine,
    config: Config,
}

impl Agent {
    pub fn new(config: &Config) -> Result<Self> {
        let key_env = &config.providers.gemini.api_key_env;
        let api_key = std::env::var(key_env)
            .map_err(|_| LlmError::MissingApiKey(key_env.clone()))?;

        let provider = Arc::new(GeminiProvider::new(
            &api_key,
            &config.providers.gemini.base_url,
            &config.agent.model,
            config.agent.max_tokens,
            config.agent.temperature,
        )?);

        Ok(Self::with_provider(config, provider))
    }

    /// Build against an arbitrary provider. Tests inject stubs here.
    pub fn with_provider(config: &Config, provider: Arc<dyn LlmProvider>) -> Self {
        let tools = create_default_tools(config);
        let engine = ChatEngine::new(
            provider,
            ToolExecutor::new(tools),
            config.agent.supports_vision,
        );

        Self {
            engine,
            config: config.clone(),
        }
    }

    pub fn model(&self) -> &str {
        &self.config.agent.model
    }

    pub fn session_memory(&self) -> bool {
        self.config.agent.session_memory
    }

    /// Fresh session carrying the persona system prompt.
    pub fn new_session(&self) -> Session {
        let mut session = Session::new();
        session.set_system_context(system_prompt::build_system_prompt(&self.config));
        session
    }

    pub async fn chat(
        &self,
        session: &mut Session,
        message: &str,
        image: Option<ImageAttachment>,
    ) -> Result<String> {
        self.engine.chat(session, message, image).await
    }
}
