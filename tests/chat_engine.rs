use anyhow::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use atendente::agent::{
    Agent, ImageAttachment, LlmProvider, LlmResponse, LlmResponseContent, Message, Role, ToolCall,
    ToolSchema, SEARCH_KEY_MISSING, VISION_DISCLAIMER,
};
use atendente::config::Config;

/// Provider that replays a fixed script of responses.
struct ScriptedProvider {
    responses: Mutex<VecDeque<LlmResponse>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    fn new(responses: Vec<LlmResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn chat(
        &self,
        _messages: &[Message],
        _tools: Option<&[ToolSchema]>,
    ) -> Result<LlmResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("No scripted response left"))
    }
}

fn text(content: &str) -> LlmResponse {
    LlmResponse {
        content: LlmResponseContent::Text(content.to_string()),
        usage: None,
    }
}

fn tool_call(name: &str, arguments: &str) -> LlmResponse {
    LlmResponse {
        content: LlmResponseContent::ToolCalls(vec![ToolCall {
            id: name.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }]),
        usage: None,
    }
}

#[test]
fn new_session_carries_the_persona() {
    let config = Config::default();
    let agent = Agent::with_provider(&config, ScriptedProvider::new(vec![]));

    let session = agent.new_session();
    let context = session.system_context().unwrap();
    assert!(context.contains("empresa de pagamentos"));
    assert!(context.contains("search_web"));
}

#[tokio::test]
async fn plain_chat_returns_reply_and_records_history() -> Result<()> {
    let config = Config::default();
    let provider = ScriptedProvider::new(vec![text("Olá! Como posso ajudar com seus pagamentos?")]);
    let agent = Agent::with_provider(&config, provider.clone());

    let mut session = agent.new_session();
    let resposta = agent.chat(&mut session, "Olá", None).await?;

    assert!(!resposta.is_empty());
    assert_eq!(session.messages().len(), 2);
    assert_eq!(session.messages()[0].role, Role::User);
    assert_eq!(session.messages()[1].role, Role::Assistant);
    assert_eq!(session.messages()[1].content, resposta);
    Ok(())
}

#[tokio::test]
async fn image_on_visionless_model_returns_disclaimer_without_provider_call() -> Result<()> {
    let mut config = Config::default();
    config.agent.supports_vision = false;

    let provider = ScriptedProvider::new(vec![text("nunca usado")]);
    let agent = Agent::with_provider(&config, provider.clone());

    let image = ImageAttachment {
        data: "aGVsbG8=".to_string(),
        media_type: "image/png".to_string(),
    };

    let mut session = agent.new_session();
    let resposta = agent
        .chat(&mut session, "O que há nesta foto?", Some(image))
        .await?;

    assert_eq!(resposta, VISION_DISCLAIMER);
    assert_eq!(provider.calls(), 0);
    // The turn is still on record, image bytes dropped
    assert_eq!(session.messages().len(), 2);
    assert!(session.messages()[0].content.contains("[imagem anexada]"));
    assert!(session.messages()[0].images.is_empty());
    Ok(())
}

#[tokio::test]
async fn vision_model_forwards_the_image() -> Result<()> {
    let config = Config::default();
    let provider = ScriptedProvider::new(vec![text("Vejo uma maquininha de cartão.")]);
    let agent = Agent::with_provider(&config, provider.clone());

    let image = ImageAttachment {
        data: "aGVsbG8=".to_string(),
        media_type: "image/png".to_string(),
    };

    let mut session = agent.new_session();
    agent
        .chat(&mut session, "O que há nesta foto?", Some(image))
        .await?;

    assert_eq!(provider.calls(), 1);
    assert_eq!(session.messages()[0].images.len(), 1);
    Ok(())
}

#[tokio::test]
async fn tool_calls_are_executed_and_fed_back() -> Result<()> {
    let mut config = Config::default();
    // Guarantee the search key is absent so the tool answers with its
    // fixed missing-key text instead of hitting the network.
    config.providers.tavily.api_key_env = "ATENDENTE_TEST_NO_TAVILY_KEY".to_string();

    let provider = ScriptedProvider::new(vec![
        tool_call("search_web", r#"{"query": "taxa pix empresa"}"#),
        text("Não consegui consultar taxas atualizadas agora."),
    ]);
    let agent = Agent::with_provider(&config, provider.clone());

    let mut session = agent.new_session();
    let resposta = agent
        .chat(&mut session, "Qual a taxa do Pix hoje?", None)
        .await?;

    assert_eq!(resposta, "Não consegui consultar taxas atualizadas agora.");
    assert_eq!(provider.calls(), 2);

    // user, assistant(tool_calls), tool result, assistant text
    let messages = session.messages();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[1].role, Role::Assistant);
    assert!(messages[1].tool_calls.is_some());
    assert_eq!(messages[2].role, Role::Tool);
    assert_eq!(messages[2].content, SEARCH_KEY_MISSING);
    assert_eq!(messages[2].tool_call_id.as_deref(), Some("search_web"));
    Ok(())
}

#[tokio::test]
async fn unknown_tool_error_becomes_tool_output() -> Result<()> {
    let config = Config::default();
    let provider = ScriptedProvider::new(vec![
        tool_call("consultar_estoque", r#"{}"#),
        text("Desculpe, não consegui consultar."),
    ]);
    let agent = Agent::with_provider(&config, provider.clone());

    let mut session = agent.new_session();
    agent.chat(&mut session, "Tem maquininha?", None).await?;

    let tool_msg = &session.messages()[2];
    assert_eq!(tool_msg.role, Role::Tool);
    assert!(tool_msg.content.contains("Unknown tool"));
    Ok(())
}

#[tokio::test]
async fn runaway_tool_loop_is_capped() {
    let mut config = Config::default();
    config.providers.tavily.api_key_env = "ATENDENTE_TEST_NO_TAVILY_KEY".to_string();

    // Every turn requests another tool call; the engine must give up.
    let provider = ScriptedProvider::new(
        (0..20)
            .map(|_| tool_call("search_web", r#"{"query": "x"}"#))
            .collect(),
    );
    let agent = Agent::with_provider(&config, provider);

    let mut session = agent.new_session();
    let result = agent.chat(&mut session, "oi", None).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn shared_session_accumulates_history() -> Result<()> {
    let config = Config::default();
    let provider = ScriptedProvider::new(vec![text("resposta 1"), text("resposta 2")]);
    let agent = Agent::with_provider(&config, provider);

    let mut session = agent.new_session();
    agent.chat(&mut session, "primeira", None).await?;
    agent.chat(&mut session, "segunda", None).await?;

    assert_eq!(session.messages().len(), 4);

    // A fresh session starts clean
    let fresh = agent.new_session();
    assert!(fresh.messages().is_empty());
    Ok(())
}
