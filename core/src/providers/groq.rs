use crate::config::GenerationParams;
use crate::traits::{ChatMessage, ChatRequest, ChatResponse, Provider, ToolCall, ToolSpec};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<CompletionMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<CompletionTool<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(flatten)]
    extra: &'a serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct CompletionMessage<'a> {
    role: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ToolCallRequest<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct ToolCallRequest<'a> {
    id: &'a str,
    r#type: &'a str,
    function: FunctionRequest<'a>,
}

#[derive(Debug, Serialize)]
struct FunctionRequest<'a> {
    name: &'a str,
    arguments: &'a str,
}

#[derive(Debug, Serialize)]
struct CompletionTool<'a> {
    r#type: &'a str,
    function: CompletionToolFunction<'a>,
}

#[derive(Debug, Serialize)]
struct CompletionToolFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ResponseToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ResponseToolCall {
    id: String,
    function: ResponseFunction,
}

#[derive(Debug, Deserialize)]
struct ResponseFunction {
    name: String,
    arguments: String,
}

/// Groq's OpenAI-compatible chat completions endpoint.
pub struct GroqProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    params: GenerationParams,
}

impl GroqProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_key: api_key.into(),
            model: "llama-3.3-70b-versatile".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            params: GenerationParams::default(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let url = base_url.into();
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    fn convert_messages<'a>(&self, messages: &'a [ChatMessage]) -> Vec<CompletionMessage<'a>> {
        messages
            .iter()
            .map(|m| {
                let tool_calls: Option<Vec<ToolCallRequest<'a>>> =
                    m.tool_calls.as_ref().map(|tool_calls| {
                        tool_calls
                            .iter()
                            .map(|tc| ToolCallRequest {
                                id: &tc.id,
                                r#type: "function",
                                function: FunctionRequest {
                                    name: &tc.name,
                                    arguments: &tc.arguments,
                                },
                            })
                            .collect()
                    });

                // Assistant turns that only carry tool calls go out with null content.
                let content = if tool_calls.is_some() && m.content.is_empty() {
                    None
                } else {
                    Some(m.content.as_str())
                };

                CompletionMessage {
                    role: &m.role,
                    content,
                    tool_calls,
                    tool_call_id: m.tool_call_id.as_deref(),
                }
            })
            .collect()
    }

    fn convert_tools(tools: &[ToolSpec]) -> Vec<CompletionTool<'_>> {
        tools
            .iter()
            .map(|t| CompletionTool {
                r#type: "function",
                function: CompletionToolFunction {
                    name: &t.name,
                    description: &t.description,
                    parameters: &t.parameters_schema,
                },
            })
            .collect()
    }

    /// Anything that doesn't fit the completions shape comes back as an empty
    /// response carrying the raw body, so the caller can still show it.
    fn parse_response(raw: serde_json::Value) -> ChatResponse {
        let parsed = serde_json::from_value::<CompletionResponse>(raw.clone()).ok();
        let Some(message) = parsed
            .and_then(|r| r.choices.into_iter().next())
            .map(|c| c.message)
        else {
            return ChatResponse {
                text: None,
                tool_calls: vec![],
                raw,
            };
        };

        let tool_calls = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|c| ToolCall {
                id: c.id,
                name: c.function.name,
                arguments: c.function.arguments,
            })
            .collect();

        ChatResponse {
            text: message.content,
            tool_calls,
            raw,
        }
    }
}

#[async_trait]
impl Provider for GroqProvider {
    fn name(&self) -> &str {
        "groq"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn chat(&self, request: ChatRequest<'_>) -> anyhow::Result<ChatResponse> {
        let body = CompletionRequest {
            model: &self.model,
            messages: self.convert_messages(request.messages),
            tools: request.tools.map(Self::convert_tools),
            temperature: self.params.temperature,
            max_tokens: self.params.max_tokens,
            top_p: self.params.top_p,
            extra: &self.params.extra,
        };

        debug!(
            model = %self.model,
            messages = request.messages.len(),
            "sending chat completion"
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Groq API error {}: {}", status, error_text));
        }

        let raw: serde_json::Value = response.json().await?;
        Ok(Self::parse_response(raw))
    }
}
