use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::agent::providers::ToolSchema;
use crate::config::Config;

/// Fixed tool output when the Tavily key is absent. The agent relays this
/// to the user instead of failing the whole request.
pub const SEARCH_KEY_MISSING: &str = "TAVILY_API_KEY não configurada no ambiente.";

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn schema(&self) -> ToolSchema;
    async fn execute(&self, arguments: &str) -> Result<String>;
}

pub fn create_default_tools(config: &Config) -> Vec<Arc<dyn Tool>> {
    vec![Arc::new(WebSearchTool::new(config))]
}

// Web Search Tool (Tavily)
pub struct WebSearchTool {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    max_results: usize,
}

impl WebSearchTool {
    pub fn new(config: &Config) -> Self {
        let api_key = std::env::var(&config.providers.tavily.api_key_env).ok();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.tools.search_timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: config.providers.tavily.base_url.trim_end_matches('/').to_string(),
            api_key,
            max_results: config.tools.search_max_results,
        }
    }

    fn format_results(body: &Value) -> String {
        let Some(results) = body.get("results").and_then(|r| r.as_array()) else {
            return body.to_string();
        };

        if results.is_empty() {
            return "Nenhum resultado encontrado.".to_string();
        }

        results
            .iter()
            .map(|r| {
                let title = r.get("title").and_then(|v| v.as_str()).unwrap_or("(sem título)");
                let url = r.get("url").and_then(|v| v.as_str()).unwrap_or("");
                let content = r.get("content").and_then(|v| v.as_str()).unwrap_or("");
                format!("- {}\n  {}\n  {}", title, url, content)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "search_web"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "search_web".to_string(),
            description: "Busca informações públicas e atuais na internet".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The search query"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn execute(&self, arguments: &str) -> Result<String> {
        let args: Value = serde_json::from_str(arguments)?;
        let query = args["query"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Missing query"))?;

        let Some(api_key) = &self.api_key else {
            return Ok(SEARCH_KEY_MISSING.to_string());
        };

        debug!("Web search: {}", query);

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .json(&json!({
                "api_key": api_key,
                "query": query,
                "max_results": self.max_results,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Search API error {}: {}", status, text);
        }

        let body: Value = response.json().await?;
        Ok(Self::format_results(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_results_renders_compact_list() {
        let body = json!({
            "results": [
                { "title": "Taxas de cartão", "url": "https://example.com/taxas", "content": "Resumo das taxas." },
                { "title": "Pix", "url": "https://example.com/pix", "content": "Pix é instantâneo." }
            ]
        });
        let text = WebSearchTool::format_results(&body);
        assert!(text.contains("Taxas de cartão"));
        assert!(text.contains("https://example.com/pix"));
        assert_eq!(text.lines().count(), 6);
    }

    #[test]
    fn format_results_handles_empty_and_malformed_bodies() {
        assert_eq!(
            WebSearchTool::format_results(&json!({ "results": [] })),
            "Nenhum resultado encontrado."
        );
        // No results array at all: fall back to raw body
        let odd = json!({ "detail": "quota exceeded" });
        assert!(WebSearchTool::format_results(&odd).contains("quota exceeded"));
    }

    #[tokio::test]
    async fn missing_key_yields_fixed_text() {
        let mut config = Config::default();
        config.providers.tavily.api_key_env = "ATENDENTE_TEST_NO_SUCH_TAVILY_KEY".to_string();

        let tool = WebSearchTool::new(&config);
        let output = tool.execute(r#"{"query": "taxas pix"}"#).await.unwrap();
        assert_eq!(output, SEARCH_KEY_MISSING);
    }
}
