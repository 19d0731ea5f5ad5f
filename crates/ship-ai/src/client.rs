//! Anthropic Messages API client

use crate::{
    error::{Error, Result},
    types::{Completion, CompletionRequest, Content, Role, StopReason, Usage},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";
const DEFAULT_MAX_TOKENS: u32 = 8192;

/// The completion collaborator used by the conversation driver.
///
/// One call, one complete response. Stop reasons consumed by the driver:
/// `end_turn` and `tool_use`.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Send the accumulated history plus system prompt and tool list,
    /// returning the model's full response.
    async fn send_message(&self, request: CompletionRequest) -> Result<Completion>;
}

/// Anthropic API client
#[derive(Clone)]
pub struct AnthropicClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl AnthropicClient {
    /// Create a new client with an API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Create from the ANTHROPIC_API_KEY environment variable
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| Error::InvalidApiKey)?;
        Ok(Self::new(api_key))
    }

    /// Override the base URL (for self-hosted gateways and tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the model id
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Validate the key with a minimal one-token request.
    ///
    /// Used by the gate before starting a loop with a user-supplied key.
    pub async fn validate_key(&self) -> Result<()> {
        let mut request = CompletionRequest::default();
        request.push(crate::types::Message::user("ping"));
        request.max_tokens = Some(1);
        self.send_message(request).await.map(|_| ())
    }

    async fn post_messages(&self, body: &ApiRequest) -> Result<ApiResponse> {
        let url = format!("{}/v1/messages", self.base_url);
        tracing::debug!(model = %body.model, messages = body.messages.len(), "completion request");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("accept", "application/json")
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            let text = response.text().await.unwrap_or_default();
            return Err(parse_api_error(status.as_u16(), retry_after, &text));
        }

        Ok(response.json::<ApiResponse>().await?)
    }
}

#[async_trait]
impl ModelClient for AnthropicClient {
    async fn send_message(&self, request: CompletionRequest) -> Result<Completion> {
        let body = build_request(&self.model, &request);
        let api_response = self.post_messages(&body).await?;

        let stop_reason = api_response
            .stop_reason
            .as_deref()
            .map(parse_stop_reason)
            .transpose()?;

        let content = api_response
            .content
            .into_iter()
            .map(wire_to_content)
            .collect::<Result<Vec<_>>>()?;

        Ok(Completion {
            role: Role::Assistant,
            content,
            stop_reason,
            usage: Usage {
                input_tokens: api_response.usage.input_tokens,
                output_tokens: api_response.usage.output_tokens,
            },
        })
    }
}

fn build_request(model: &str, request: &CompletionRequest) -> ApiRequest {
    ApiRequest {
        model: model.to_string(),
        max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        system: request.system.clone(),
        temperature: request.temperature,
        messages: request.messages.iter().map(message_to_wire).collect(),
        tools: if request.tools.is_empty() {
            None
        } else {
            Some(
                request
                    .tools
                    .iter()
                    .map(|t| WireTool {
                        name: t.name.clone(),
                        description: t.description.clone(),
                        input_schema: t.input_schema.clone(),
                    })
                    .collect(),
            )
        },
    }
}

fn message_to_wire(message: &crate::types::Message) -> WireMessage {
    WireMessage {
        role: match message.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        },
        content: message.content.iter().map(content_to_wire).collect(),
    }
}

fn content_to_wire(content: &Content) -> WireContent {
    match content {
        Content::Text { text } => WireContent::Text { text: text.clone() },
        Content::Image { media_type, data } => WireContent::Image {
            source: ImageSource {
                source_type: "base64".to_string(),
                media_type: media_type.clone(),
                data: data.clone(),
            },
        },
        Content::ToolUse { id, name, input } => WireContent::ToolUse {
            id: id.clone(),
            name: name.clone(),
            input: input.clone(),
        },
        Content::ToolResult {
            tool_use_id,
            content,
            is_error,
        } => WireContent::ToolResult {
            tool_use_id: tool_use_id.clone(),
            content: content.iter().map(content_to_wire).collect(),
            is_error: *is_error,
        },
    }
}

fn wire_to_content(wire: WireContent) -> Result<Content> {
    Ok(match wire {
        WireContent::Text { text } => Content::Text { text },
        WireContent::Image { source } => Content::Image {
            media_type: source.media_type,
            data: source.data,
        },
        WireContent::ToolUse { id, name, input } => Content::ToolUse { id, name, input },
        WireContent::ToolResult {
            tool_use_id,
            content,
            is_error,
        } => Content::ToolResult {
            tool_use_id,
            content: content
                .into_iter()
                .map(wire_to_content)
                .collect::<Result<Vec<_>>>()?,
            is_error,
        },
    })
}

fn parse_stop_reason(s: &str) -> Result<StopReason> {
    match s {
        "end_turn" => Ok(StopReason::EndTurn),
        "tool_use" => Ok(StopReason::ToolUse),
        "max_tokens" => Ok(StopReason::MaxTokens),
        "stop_sequence" => Ok(StopReason::StopSequence),
        other => Err(Error::UnexpectedResponse(format!(
            "unknown stop reason: {}",
            other
        ))),
    }
}

fn parse_api_error(status: u16, retry_after: Option<u64>, body: &str) -> Error {
    if status == 429 {
        return Error::RateLimited { retry_after };
    }

    if let Ok(err) = serde_json::from_str::<ApiErrorEnvelope>(body) {
        if status == 401 || status == 403 || err.error.error_type == "authentication_error" {
            return Error::Auth(err.error.message);
        }
        return Error::api(err.error.error_type, err.error.message);
    }

    if status == 401 || status == 403 {
        return Error::Auth(format!("HTTP {}", status));
    }
    Error::api(format!("http_{}", status), body.to_string())
}

// ---- Wire structs ----

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: Vec<WireContent>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireContent {
    Text {
        text: String,
    },
    Image {
        source: ImageSource,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: Vec<WireContent>,
        #[serde(default)]
        is_error: bool,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct ImageSource {
    #[serde(rename = "type")]
    source_type: String,
    media_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct WireTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<WireContent>,
    stop_reason: Option<String>,
    #[serde(default)]
    usage: WireUsage,
}

#[derive(Debug, Default, Deserialize)]
struct WireUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;

    #[test]
    fn test_build_request_includes_system_and_tools() {
        let mut request = CompletionRequest::with_system("be helpful");
        request.push(Message::user("hi"));
        request.add_tool(crate::types::Tool::new(
            "web_search",
            "Search the web",
            serde_json::json!({"type": "object", "properties": {"query": {"type": "string"}}}),
        ));

        let body = build_request("claude-sonnet-4-5-20250929", &request);
        assert_eq!(body.system.as_deref(), Some("be helpful"));
        assert_eq!(body.messages.len(), 1);
        assert_eq!(body.tools.as_ref().unwrap().len(), 1);
        assert_eq!(body.tools.as_ref().unwrap()[0].name, "web_search");
    }

    #[test]
    fn test_build_request_omits_empty_tools() {
        let mut request = CompletionRequest::default();
        request.push(Message::user("hi"));
        let body = build_request("m", &request);
        assert!(body.tools.is_none());

        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("tools").is_none());
        assert!(json.get("system").is_none());
    }

    #[test]
    fn test_image_block_wire_format() {
        let wire = content_to_wire(&Content::image("image/png", "aGVsbG8="));
        let json = serde_json::to_value(&wire).unwrap();
        assert_eq!(json["type"], "image");
        assert_eq!(json["source"]["type"], "base64");
        assert_eq!(json["source"]["media_type"], "image/png");
    }

    #[test]
    fn test_tool_result_round_trip() {
        let content = Content::tool_result("tu_1", vec![Content::text("found 3 results")]);
        let wire = content_to_wire(&content);
        let back = wire_to_content(wire).unwrap();
        match back {
            Content::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => {
                assert_eq!(tool_use_id, "tu_1");
                assert_eq!(content.len(), 1);
                assert!(!is_error);
            }
            other => panic!("expected tool result, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_stop_reason() {
        assert_eq!(parse_stop_reason("end_turn").unwrap(), StopReason::EndTurn);
        assert_eq!(parse_stop_reason("tool_use").unwrap(), StopReason::ToolUse);
        assert!(parse_stop_reason("mystery").is_err());
    }

    #[test]
    fn test_parse_api_error_auth() {
        let body = r#"{"type":"error","error":{"type":"authentication_error","message":"invalid x-api-key"}}"#;
        let e = parse_api_error(401, None, body);
        assert!(matches!(e, Error::Auth(_)));
        assert!(e.is_auth_error());
    }

    #[test]
    fn test_parse_api_error_rate_limited() {
        let e = parse_api_error(429, Some(30), "{}");
        assert!(matches!(e, Error::RateLimited { retry_after: Some(30) }));
    }

    #[test]
    fn test_parse_api_error_generic() {
        let body = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        let e = parse_api_error(529, None, body);
        match e {
            Error::Api { error_type, .. } => assert_eq!(error_type, "overloaded_error"),
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[test]
    fn test_response_parsing() {
        let raw = r#"{
            "content": [
                {"type": "text", "text": "Let me build that."},
                {"type": "tool_use", "id": "tu_1", "name": "cto", "input": {"project_name": "x"}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 120, "output_tokens": 45}
        }"#;
        let parsed: ApiResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.stop_reason.as_deref(), Some("tool_use"));
        assert_eq!(parsed.usage.input_tokens, 120);

        let content: Vec<Content> = parsed
            .content
            .into_iter()
            .map(wire_to_content)
            .collect::<Result<_>>()
            .unwrap();
        assert!(content[1].is_tool_use());
    }
}
