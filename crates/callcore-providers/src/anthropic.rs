use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError};
use crate::stream::{parse_sse_line, SseParsed, StreamEvent};

const API_VERSION: &str = "2023-06-01";
const OAUTH_BETA: &str = "oauth-2025-04-20";
const OAUTH_TOKEN_PREFIX: &str = "sk-ant-oat01-";

pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    is_oauth: bool,
}

impl AnthropicProvider {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        let is_oauth = api_key.starts_with(OAUTH_TOKEN_PREFIX);
        Self {
            client: reqwest::Client::new(),
            is_oauth,
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.anthropic.com".to_string()),
        }
    }

    /// Apply auth headers — OAuth tokens use Bearer + beta header,
    /// regular API keys use x-api-key.
    fn apply_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.is_oauth {
            builder
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("anthropic-beta", OAUTH_BETA)
        } else {
            builder.header("x-api-key", &self.api_key)
        }
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let body = build_request_body(req, false);
        let url = format!("{}/v1/messages", self.base_url);

        debug!(model = %req.model, "sending request to Anthropic");

        let builder = self
            .client
            .post(&url)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body);

        let resp = self.apply_auth(builder).send().await?;
        let resp = raise_for_status(resp).await?;

        let api_resp: ApiResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        Ok(parse_response(api_resp))
    }

    async fn send_stream(
        &self,
        req: &ChatRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), ProviderError> {
        let body = build_request_body(req, true);
        let url = format!("{}/v1/messages", self.base_url);

        debug!(model = %req.model, "sending streaming request to Anthropic");

        let builder = self
            .client
            .post(&url)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body);

        let resp = self.apply_auth(builder).send().await?;
        let resp = raise_for_status(resp).await?;

        let mut model = req.model.clone();
        let mut tokens_in = 0u32;
        let mut tokens_out = 0u32;
        let mut stop_reason = String::new();
        let mut pending_event: Option<String> = None;

        let mut byte_stream = resp.bytes_stream();
        let mut buf = String::new();
        while let Some(chunk) = byte_stream.next().await {
            let chunk = chunk?;
            buf.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(pos) = buf.find('\n') {
                let line = buf[..pos].trim_end_matches('\r').to_string();
                buf.drain(..=pos);
                if line.is_empty() {
                    continue;
                }
                match parse_sse_line(&line) {
                    Some(SseParsed::Event(ev)) => pending_event = Some(ev),
                    Some(SseParsed::Data(data)) => {
                        if let Some(event) = handle_sse_data(
                            pending_event.take(),
                            &data,
                            &mut model,
                            &mut tokens_in,
                            &mut tokens_out,
                            &mut stop_reason,
                        ) {
                            let _ = tx.send(event).await;
                        }
                    }
                    None => {}
                }
            }
        }

        let _ = tx
            .send(StreamEvent::Done {
                model,
                tokens_in,
                tokens_out,
                stop_reason,
            })
            .await;
        Ok(())
    }
}

async fn raise_for_status(resp: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = resp.status().as_u16();
    if status == 429 {
        let retry = resp
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(5000);
        return Err(ProviderError::RateLimited {
            retry_after_ms: retry,
        });
    }
    if !resp.status().is_success() {
        let text = resp.text().await.unwrap_or_default();
        warn!(status, body = %text, "Anthropic API error");
        return Err(ProviderError::Api {
            status,
            message: text,
        });
    }
    Ok(resp)
}

/// Applies one `event:`/`data:` pair of Anthropic's message stream to the
/// running totals, returning a `StreamEvent` to forward when the event
/// carries user-visible content.
fn handle_sse_data(
    event: Option<String>,
    data: &str,
    model: &mut String,
    tokens_in: &mut u32,
    tokens_out: &mut u32,
    stop_reason: &mut String,
) -> Option<StreamEvent> {
    let value: serde_json::Value = serde_json::from_str(data).ok()?;
    match event.as_deref() {
        Some("message_start") => {
            if let Some(m) = value["message"]["model"].as_str() {
                *model = m.to_string();
            }
            if let Some(n) = value["message"]["usage"]["input_tokens"].as_u64() {
                *tokens_in = n as u32;
            }
            None
        }
        Some("content_block_delta") => {
            let delta = &value["delta"];
            match delta["type"].as_str() {
                Some("text_delta") => delta["text"]
                    .as_str()
                    .map(|t| StreamEvent::TextDelta { text: t.to_string() }),
                Some("thinking_delta") => delta["thinking"]
                    .as_str()
                    .map(|t| StreamEvent::Thinking { text: t.to_string() }),
                _ => None,
            }
        }
        Some("message_delta") => {
            if let Some(n) = value["usage"]["output_tokens"].as_u64() {
                *tokens_out = n as u32;
            }
            if let Some(r) = value["delta"]["stop_reason"].as_str() {
                *stop_reason = r.to_string();
            }
            None
        }
        Some("error") => value["error"]["message"]
            .as_str()
            .map(|m| StreamEvent::Error { message: m.to_string() }),
        _ => None,
    }
}

fn build_request_body(req: &ChatRequest, stream: bool) -> serde_json::Value {
    let messages: Vec<serde_json::Value> = req
        .messages
        .iter()
        .map(|m| {
            serde_json::json!({
                "role": m.role,
                "content": m.content,
            })
        })
        .collect();

    let system: serde_json::Value = if let Some(ref prompt) = req.system_prompt {
        serde_json::Value::Array(prompt.to_anthropic_blocks())
    } else {
        serde_json::Value::String(req.system.clone())
    };

    serde_json::json!({
        "model": req.model,
        "max_tokens": req.max_tokens,
        "system": system,
        "messages": messages,
        "stream": stream,
    })
}

fn parse_response(resp: ApiResponse) -> ChatResponse {
    let text_parts: Vec<String> = resp
        .content
        .into_iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(text),
            _ => None,
        })
        .collect();

    ChatResponse {
        content: text_parts.join(""),
        model: resp.model,
        tokens_in: resp.usage.input_tokens,
        tokens_out: resp.usage.output_tokens,
        stop_reason: resp.stop_reason.unwrap_or_default(),
    }
}

#[derive(Deserialize)]
struct ApiResponse {
    model: String,
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    usage: Usage,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "thinking")]
    #[allow(dead_code)]
    Thinking { thinking: String },
    #[serde(other)]
    Unknown,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}
