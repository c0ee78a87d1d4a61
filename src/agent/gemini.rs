//! Gemini `generateContent` REST provider.
//!
//! Maps the engine's message list onto Gemini `contents` (user/model roles,
//! text / inlineData / functionCall / functionResponse parts), the system
//! prompt onto `systemInstruction`, and tool schemas onto
//! `tools.functionDeclarations`.

use crate::agent::llm_error::LlmError;
use crate::agent::providers::{
    LlmProvider, LlmResponse, LlmResponseContent, Message, Role, ToolCall, ToolSchema, Usage,
};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: usize,
    temperature: f32,
}

impl GeminiProvider {
    pub fn new(
        api_key: &str,
        base_url: &str,
        model: &str,
        max_tokens: usize,
        temperature: f32,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            max_tokens,
            temperature,
        })
    }

    fn build_request(&self, messages: &[Message], tools: Option<&[ToolSchema]>) -> Value {
        let mut system_parts: Vec<String> = Vec::new();
        let mut contents: Vec<Value> = Vec::new();

        for msg in messages {
            match msg.role {
                Role::System => system_parts.push(msg.content.clone()),
                Role::User => {
                    let mut parts = Vec::new();
                    if !msg.content.is_empty() {
                        parts.push(json!({ "text": msg.content }));
                    }
                    for img in &msg.images {
                        parts.push(json!({
                            "inlineData": {
                                "mimeType": img.media_type,
                                "data": img.data,
                            }
                        }));
                    }
                    if parts.is_empty() {
                        parts.push(json!({ "text": "" }));
                    }
                    contents.push(json!({ "role": "user", "parts": parts }));
                }
                Role::Assistant => {
                    let mut parts = Vec::new();
                    if !msg.content.is_empty() {
                        parts.push(json!({ "text": msg.content }));
                    }
                    if let Some(calls) = &msg.tool_calls {
                        for call in calls {
                            let args: Value = serde_json::from_str(&call.arguments)
                                .unwrap_or(Value::Object(Default::default()));
                            parts.push(json!({
                                "functionCall": { "name": call.name, "args": args }
                            }));
                        }
                    }
                    if parts.is_empty() {
                        parts.push(json!({ "text": "" }));
                    }
                    contents.push(json!({ "role": "model", "parts": parts }));
                }
                Role::Tool => {
                    // Gemini addresses function results by name; ToolCall ids
                    // are derived from the function name (see parse below).
                    let name = msg
                        .tool_call_id
                        .as_deref()
                        .map(|id| id.split('#').next().unwrap_or(id))
                        .unwrap_or("tool");
                    contents.push(json!({
                        "role": "user",
                        "parts": [{
                            "functionResponse": {
                                "name": name,
                                "response": { "result": msg.content }
                            }
                        }]
                    }));
                }
            }
        }

        let mut body = json!({
            "contents": contents,
            "generationConfig": {
                "temperature": self.temperature,
                "maxOutputTokens": self.max_tokens,
            }
        });

        if !system_parts.is_empty() {
            body["systemInstruction"] = json!({
                "parts": [{ "text": system_parts.join("\n\n") }]
            });
        }

        if let Some(schemas) = tools {
            if !schemas.is_empty() {
                let declarations: Vec<Value> = schemas
                    .iter()
                    .map(|s| {
                        json!({
                            "name": s.name,
                            "description": s.description,
                            "parameters": s.parameters,
                        })
                    })
                    .collect();
                body["tools"] = json!([{ "functionDeclarations": declarations }]);
            }
        }

        body
    }
}

/// Pull the reply text out of a candidate object.
///
/// Providers have shipped the content as a plain string, as a list of typed
/// parts, or occasionally as something else entirely, so the chain is:
/// plain string content, then concatenated `text` parts, then the
/// stringified candidate as a last resort.
pub fn extract_candidate_text(candidate: &Value) -> String {
    if let Some(text) = candidate.get("content").and_then(|c| c.as_str()) {
        return text.to_string();
    }

    if let Some(parts) = candidate.pointer("/content/parts").and_then(|p| p.as_array()) {
        let text: String = parts
            .iter()
            .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
            .collect::<Vec<_>>()
            .join("");
        if !text.is_empty() {
            return text;
        }
    }

    candidate.to_string()
}

fn parse_tool_calls(candidate: &Value) -> Vec<ToolCall> {
    let Some(parts) = candidate.pointer("/content/parts").and_then(|p| p.as_array()) else {
        return Vec::new();
    };

    parts
        .iter()
        .filter_map(|p| p.get("functionCall"))
        .enumerate()
        .filter_map(|(i, fc)| {
            let name = fc.get("name").and_then(|n| n.as_str())?;
            let args = fc.get("args").cloned().unwrap_or(json!({}));
            Some(ToolCall {
                id: if i == 0 {
                    name.to_string()
                } else {
                    format!("{}#{}", name, i)
                },
                name: name.to_string(),
                arguments: args.to_string(),
            })
        })
        .collect()
}

fn parse_usage(body: &Value) -> Option<Usage> {
    let meta = body.get("usageMetadata")?;
    Some(Usage {
        input_tokens: meta.get("promptTokenCount").and_then(|v| v.as_u64())?,
        output_tokens: meta
            .get("candidatesTokenCount")
            .and_then(|v| v.as_u64())
            .unwrap_or(0),
    })
}

/// Turn a 2xx response body into a reply.
///
/// Gemini can answer 200 with no `candidates` at all (safety-blocked
/// prompts carry only `promptFeedback`), which must surface as an error,
/// not as a stringified null.
fn parse_response(body: &Value) -> Result<LlmResponse, LlmError> {
    let usage = parse_usage(body);

    let Some(candidate) = body.get("candidates").and_then(|c| c.get(0)) else {
        let reason = body
            .pointer("/promptFeedback/blockReason")
            .and_then(|r| r.as_str())
            .map(|r| format!("prompt blocked ({})", r))
            .unwrap_or_else(|| format!("no candidates in response: {}", body));
        return Err(LlmError::NoReply(reason));
    };

    let calls = parse_tool_calls(candidate);
    let content = if calls.is_empty() {
        LlmResponseContent::Text(extract_candidate_text(candidate))
    } else {
        LlmResponseContent::ToolCalls(calls)
    };

    Ok(LlmResponse { content, usage })
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    async fn chat(
        &self,
        messages: &[Message],
        tools: Option<&[ToolSchema]>,
    ) -> Result<LlmResponse> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url, self.model
        );
        let body = self.build_request(messages, tools);

        debug!("Gemini request to {} ({} messages)", self.model, messages.len());

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(LlmError::ApiRequestFailed)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Provider {
                status: status.as_u16(),
                message,
            }
            .into());
        }

        let json: Value = response.json().await.map_err(LlmError::ApiRequestFailed)?;
        Ok(parse_response(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_concatenates_text_parts() {
        let candidate = json!({
            "content": {
                "role": "model",
                "parts": [{ "text": "Olá, " }, { "text": "tudo bem?" }]
            }
        });
        assert_eq!(extract_candidate_text(&candidate), "Olá, tudo bem?");
    }

    #[test]
    fn extract_accepts_plain_string_content() {
        let candidate = json!({ "content": "resposta direta" });
        assert_eq!(extract_candidate_text(&candidate), "resposta direta");
    }

    #[test]
    fn extract_falls_back_to_stringified_candidate() {
        let candidate = json!({
            "content": { "parts": [{ "thought": true }] },
            "finishReason": "STOP"
        });
        let text = extract_candidate_text(&candidate);
        assert!(text.contains("finishReason"));
    }

    #[test]
    fn body_without_candidates_is_an_error_not_null() {
        // Safety-blocked prompts answer 200 with promptFeedback only.
        let body = json!({
            "promptFeedback": { "blockReason": "SAFETY" }
        });
        let err = parse_response(&body).unwrap_err();
        assert!(matches!(err, LlmError::NoReply(_)));
        assert!(err.to_string().contains("SAFETY"));

        // Same for a body with nothing usable at all.
        let err = parse_response(&json!({})).unwrap_err();
        assert!(matches!(err, LlmError::NoReply(_)));
        assert!(!err.to_string().contains("null"));
    }

    #[test]
    fn well_formed_body_parses_text_and_usage() {
        let body = json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "Olá!" }] }
            }],
            "usageMetadata": { "promptTokenCount": 7, "candidatesTokenCount": 3 }
        });
        let response = parse_response(&body).unwrap();
        assert!(matches!(response.content, LlmResponseContent::Text(ref t) if t == "Olá!"));
        assert_eq!(response.usage.unwrap().input_tokens, 7);
    }

    #[test]
    fn parallel_calls_get_distinct_ids() {
        let candidate = json!({
            "content": {
                "parts": [
                    { "functionCall": { "name": "search_web", "args": { "query": "a" } } },
                    { "functionCall": { "name": "search_web", "args": { "query": "b" } } }
                ]
            }
        });
        let calls = parse_tool_calls(&candidate);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].id, "search_web");
        assert_eq!(calls[1].id, "search_web#1");
        assert_eq!(calls[1].name, "search_web");
    }
}
