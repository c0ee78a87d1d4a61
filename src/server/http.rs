//! HTTP server for the chat service.
//!
//! `/chat` always answers 200 with a `resposta` string; failures are folded
//! into human-readable text rather than status codes.

use anyhow::Result;
use axum::{
    extract::{FromRequest, Request, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Form, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::agent::{Agent, ImageAttachment, LlmError, SessionStore};
use crate::config::Config;

const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

pub struct Server {
    config: Config,
}

pub struct AppState {
    pub config: Config,
    pub store: SessionStore,
    agent: OnceCell<Agent>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let store = SessionStore::new(
            Duration::from_secs(config.server.session_timeout_secs),
            config.server.max_sessions,
        );
        Self {
            config,
            store,
            agent: OnceCell::new(),
        }
    }

    /// Preset the agent handle. Tests inject stub-backed agents here.
    pub fn with_agent(config: Config, agent: Agent) -> Self {
        let store = SessionStore::new(
            Duration::from_secs(config.server.session_timeout_secs),
            config.server.max_sessions,
        );
        Self {
            config,
            store,
            agent: OnceCell::new_with(Some(agent)),
        }
    }

    /// Shared agent handle, initialized on first use so that a missing API
    /// key surfaces as a per-request error text instead of a startup crash.
    async fn agent(&self) -> Result<&Agent> {
        self.agent
            .get_or_try_init(|| async {
                let agent = Agent::new(&self.config)?;
                info!("Agent initialized with model {}", agent.model());
                Ok(agent)
            })
            .await
    }
}

impl Server {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub async fn run(&self) -> Result<()> {
        let state = Arc::new(AppState::new(self.config.clone()));

        // Session cleanup task
        let cleanup_state = state.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                cleanup_state.store.cleanup_expired().await;
            }
        });

        let app = router(state);

        let addr: SocketAddr =
            format!("{}:{}", self.config.server.bind, self.config.server.port).parse()?;

        info!("Starting HTTP server on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(home))
        .route("/health", get(health))
        .route("/chat", post(chat))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn home() -> Html<&'static str> {
    Html(include_str!("../../assets/index.html"))
}

async fn health() -> &'static str {
    "OK"
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(alias = "message")]
    pub pergunta: String,

    /// Base64 image, raw or as a data URL.
    #[serde(default, alias = "image")]
    pub imagem: Option<String>,

    /// Opaque token partitioning conversation memory.
    #[serde(default, alias = "session_id")]
    pub sessao: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub resposta: String,
}

async fn chat(
    State(state): State<Arc<AppState>>,
    JsonOrForm(request): JsonOrForm<ChatRequest>,
) -> Json<ChatResponse> {
    Json(ChatResponse {
        resposta: respond(&state, request).await,
    })
}

async fn respond(state: &AppState, request: ChatRequest) -> String {
    let agent = match state.agent().await {
        Ok(agent) => agent,
        Err(e) => {
            warn!("Agent initialization failed: {}", e);
            return startup_error_text(&e);
        }
    };

    let image = match decode_image(request.imagem.as_deref()) {
        Ok(image) => image,
        Err(message) => return message,
    };

    match request.sessao.filter(|_| agent.session_memory()) {
        Some(token) => {
            let mut session = state.store.checkout(&token, || agent.new_session()).await;
            let result = agent.chat(&mut session, &request.pergunta, image).await;
            state.store.checkin(token, session).await;
            reply_text(result)
        }
        None => {
            // No token (or memory disabled): throwaway session
            let mut session = agent.new_session();
            reply_text(agent.chat(&mut session, &request.pergunta, image).await)
        }
    }
}

fn reply_text(result: Result<String>) -> String {
    match result {
        Ok(text) => text,
        Err(e) => {
            warn!("Chat turn failed: {}", e);
            format!("Erro no atendimento: {}", e)
        }
    }
}

fn startup_error_text(e: &anyhow::Error) -> String {
    match e.downcast_ref::<LlmError>() {
        Some(LlmError::MissingApiKey(var)) => {
            format!("Erro: {} não encontrada no ambiente.", var)
        }
        _ => format!("Erro ao iniciar o agente: {}", e),
    }
}

fn decode_image(raw: Option<&str>) -> Result<Option<ImageAttachment>, String> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };

    let (media_type, data) = match raw.strip_prefix("data:") {
        Some(rest) => match rest.split_once(";base64,") {
            Some((mime, payload)) => (mime.to_string(), payload.to_string()),
            None => return Err("Erro: imagem inválida (data URL malformada).".to_string()),
        },
        None => ("image/png".to_string(), raw.to_string()),
    };

    if STANDARD.decode(data.as_bytes()).is_err() {
        return Err("Erro: imagem inválida (base64 malformado).".to_string());
    }

    Ok(Some(ImageAttachment { data, media_type }))
}

/// Accepts the chat body as either JSON or an urlencoded form, sniffed
/// from the Content-Type header.
pub struct JsonOrForm<T>(pub T);

impl<S, T> FromRequest<S> for JsonOrForm<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send + 'static,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("");

        if content_type.starts_with("application/json") {
            let Json(payload) = Json::<T>::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            return Ok(Self(payload));
        }

        if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(payload) = Form::<T>::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            return Ok(Self(payload));
        }

        Err(StatusCode::UNSUPPORTED_MEDIA_TYPE.into_response())
    }
}
