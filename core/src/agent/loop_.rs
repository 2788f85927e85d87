use crate::agent::{ContextBuilder, ToolRegistry};
use crate::traits::{ChatMessage, ChatRequest, ChatResponse, Provider, ToolCall, ToolResult};
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, warn};

const DEFAULT_MAX_ITERATIONS: usize = 20;

const TOOL_CALL_OPEN_TAG: &str = "<tool_call>";
const TOOL_CALL_CLOSE_TAG: &str = "</tool_call>";

pub struct AgentLoop {
    provider: Arc<dyn Provider>,
    context_builder: ContextBuilder,
    tool_registry: Arc<ToolRegistry>,
    max_iterations: usize,
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn Provider>,
        context_builder: ContextBuilder,
        tool_registry: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            provider,
            context_builder,
            tool_registry,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn tool_registry(&self) -> &ToolRegistry {
        &self.tool_registry
    }

    /// Answers one query from a fresh conversation.
    pub async fn process(&self, message: &str) -> Result<String> {
        let mut messages = self.context_builder.build_messages(message);
        let tools = self.tool_registry.get_specs();

        for iteration in 1..=self.max_iterations {
            let request = ChatRequest {
                messages: &messages,
                tools: if tools.is_empty() { None } else { Some(&tools) },
            };

            let response = self.provider.chat(request).await?;
            debug!(
                iteration,
                tool_calls = response.tool_calls.len(),
                "provider responded"
            );

            let (assistant_text, tool_calls) = if response.has_tool_calls() {
                (
                    response.text.clone().unwrap_or_default(),
                    response.tool_calls.clone(),
                )
            } else if response.has_text() {
                self.parse_tool_calls_fallback(response.text_or_empty())
            } else {
                return Ok(raw_fallback(&response));
            };

            if tool_calls.is_empty() {
                return Ok(assistant_text);
            }

            messages.push(ChatMessage::assistant_with_tool_calls(
                assistant_text,
                tool_calls.clone(),
            ));

            for tool_call in tool_calls {
                let result = match serde_json::from_str::<serde_json::Value>(&tool_call.arguments)
                {
                    Ok(args) => self.tool_registry.execute(&tool_call.name, args).await,
                    Err(e) => {
                        warn!(tool = %tool_call.name, "unparseable tool arguments: {}", e);
                        ToolResult::error(format!(
                            "Failed to parse tool arguments for {}: {}",
                            tool_call.name, e
                        ))
                    }
                };

                messages.push(ChatMessage::tool_result(
                    tool_call.id,
                    serde_json::to_string(&result).unwrap_or_default(),
                ));
            }
        }

        Ok("Max iterations reached".to_string())
    }

    fn parse_tool_calls_fallback(&self, response: &str) -> (String, Vec<ToolCall>) {
        let mut text_parts = Vec::new();
        let mut calls = Vec::new();
        let mut remaining = response;

        while let Some(start) = remaining.find(TOOL_CALL_OPEN_TAG) {
            let before = &remaining[..start];
            if !before.trim().is_empty() {
                text_parts.push(before.trim().to_string());
            }

            let after_open = &remaining[start + TOOL_CALL_OPEN_TAG.len()..];
            let Some(close_idx) = after_open.find(TOOL_CALL_CLOSE_TAG) else {
                remaining = &remaining[start..];
                break;
            };

            let inner = &after_open[..close_idx];
            calls.extend(
                extract_json_values(inner)
                    .iter()
                    .filter_map(parse_tool_call_value),
            );
            remaining = &after_open[close_idx + TOOL_CALL_CLOSE_TAG.len()..];
        }

        if !remaining.trim().is_empty() {
            text_parts.push(remaining.trim().to_string());
        }

        (text_parts.join("\n"), calls)
    }
}

/// Shown when the model produced neither text nor tool calls.
fn raw_fallback(response: &ChatResponse) -> String {
    warn!("provider response had no text or tool calls; returning raw body");
    serde_json::to_string_pretty(&response.raw).unwrap_or_else(|_| response.raw.to_string())
}

fn extract_json_values(text: &str) -> Vec<serde_json::Value> {
    let mut values = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in text.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if !in_string && depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start
                        && let Ok(value) = serde_json::from_str::<serde_json::Value>(&text[s..=i])
                    {
                        values.push(value);
                    }
                    start = None;
                }
            }
            _ => {}
        }
    }

    values
}

fn parse_tool_call_value(value: &serde_json::Value) -> Option<ToolCall> {
    let name = value.get("name")?.as_str()?.to_string();
    let arguments = value
        .get("arguments")
        .cloned()
        .unwrap_or_else(|| serde_json::json!({}));
    let arguments_str = serde_json::to_string(&arguments).ok()?;
    let digest = md5::compute(format!("{name}:{arguments_str}").as_bytes());

    Some(ToolCall {
        id: format!("call_{:x}", digest),
        name,
        arguments: arguments_str,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::register_tracking_tools;
    use crate::tracking::testing::{StaticStore, run};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned responses and records every request it sees.
    struct ScriptedProvider {
        responses: Mutex<VecDeque<ChatResponse>>,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<ChatResponse>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                seen: Mutex::new(vec![]),
            })
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        fn model(&self) -> &str {
            "test"
        }

        async fn chat(&self, request: ChatRequest<'_>) -> Result<ChatResponse> {
            self.seen.lock().unwrap().push(request.messages.to_vec());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| anyhow::anyhow!("script exhausted"))
        }
    }

    fn tool_call(id: &str, name: &str, arguments: serde_json::Value) -> ChatResponse {
        ChatResponse {
            text: None,
            tool_calls: vec![ToolCall {
                id: id.into(),
                name: name.into(),
                arguments: arguments.to_string(),
            }],
            raw: json!({}),
        }
    }

    fn agent(provider: Arc<ScriptedProvider>) -> AgentLoop {
        let store = StaticStore::default()
            .with_experiment("1", "mnist")
            .with_run(run("1", "r1", &[("accuracy", 0.9)]))
            .with_run(run("1", "r2", &[("accuracy", 0.7)]));
        let registry = Arc::new(ToolRegistry::new());
        register_tracking_tools(&registry, Arc::new(store));
        let context = ContextBuilder::new("memory").with_tool_specs(registry.get_specs());
        AgentLoop::new(provider, context, registry)
    }

    fn last_tool_result(provider: &ScriptedProvider) -> ToolResult {
        let seen = provider.seen.lock().unwrap();
        let messages = seen.last().unwrap();
        let tool_msg = messages.iter().rev().find(|m| m.role == "tool").unwrap();
        serde_json::from_str(&tool_msg.content).unwrap()
    }

    #[tokio::test]
    async fn runs_native_tool_calls_then_answers() {
        let provider = ScriptedProvider::new(vec![
            tool_call(
                "c1",
                "find_best_run_by_metric",
                json!({"experiment_ids": ["1"], "metric": "accuracy"}),
            ),
            ChatResponse::text("Run r1 is best."),
        ]);
        let answer = agent(provider.clone()).process("best run?").await.unwrap();

        assert_eq!(answer, "Run r1 is best.");
        let result = last_tool_result(&provider);
        assert!(result.success);
        assert_eq!(result.output["run_id"], "r1");
    }

    #[tokio::test]
    async fn parses_tagged_tool_calls_from_text() {
        let provider = ScriptedProvider::new(vec![
            ChatResponse::text(
                "Let me look.\n<tool_call>\n{\"name\": \"list_experiments\", \"arguments\": {}}\n</tool_call>",
            ),
            ChatResponse::text("There is one experiment: mnist."),
        ]);
        let answer = agent(provider.clone()).process("experiments?").await.unwrap();

        assert_eq!(answer, "There is one experiment: mnist.");
        let result = last_tool_result(&provider);
        assert_eq!(result.output[0]["name"], "mnist");
    }

    #[tokio::test]
    async fn bad_arguments_go_back_to_the_model() {
        let provider = ScriptedProvider::new(vec![
            ChatResponse {
                text: None,
                tool_calls: vec![ToolCall {
                    id: "c1".into(),
                    name: "get_run_metrics".into(),
                    arguments: "{not json".into(),
                }],
                raw: json!({}),
            },
            tool_call("c2", "list_runs", json!({"experiment_ids": "1"})),
            ChatResponse::text("Sorry."),
        ]);
        let answer = agent(provider.clone()).process("metrics?").await.unwrap();

        assert_eq!(answer, "Sorry.");
        let result = last_tool_result(&provider);
        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("Invalid arguments for 'list_runs'"));
    }

    #[tokio::test]
    async fn empty_response_falls_back_to_raw_body() {
        let provider = ScriptedProvider::new(vec![ChatResponse {
            text: Some("   ".into()),
            tool_calls: vec![],
            raw: json!({"choices": [], "id": "resp-1"}),
        }]);
        let answer = agent(provider).process("hello").await.unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&answer).unwrap();
        assert_eq!(parsed["id"], "resp-1");
    }

    #[tokio::test]
    async fn stops_at_iteration_cap() {
        let provider = ScriptedProvider::new(vec![
            tool_call("c1", "list_experiments", json!({})),
            tool_call("c2", "list_experiments", json!({})),
        ]);
        let answer = agent(provider.clone())
            .with_max_iterations(2)
            .process("loop")
            .await
            .unwrap();

        assert_eq!(answer, "Max iterations reached");
        assert_eq!(provider.seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn extracts_json_with_escaped_quotes() {
        let values = extract_json_values(r#"{"name": "a\"}\\"} trailing }"#);
        assert_eq!(values.len(), 1);
        assert_eq!(values[0]["name"], "a\"}\\");
    }

    #[test]
    fn unterminated_tag_is_kept_as_text() {
        let provider = ScriptedProvider::new(vec![]);
        let agent = agent(provider);
        let (text, calls) = agent.parse_tool_calls_fallback("answer <tool_call>{\"name\":");
        assert!(calls.is_empty());
        assert_eq!(text, "answer\n<tool_call>{\"name\":");
    }
}
