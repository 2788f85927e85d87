use crate::traits::{ChatMessage, ToolSpec};
use std::fmt::Write;

const IDENTITY: &str = "You are an MLflow experiment assistant. Use tools as needed.";

const GUIDELINES: &str = "\
- Answer from tool results, never from guesses about the tracking data.
- Experiment ids are strings. Look them up with list_experiments before using them.
- Keep run ids exact when you mention them so the user can search for them.
- Metric values are the latest logged value for each run.";

pub struct ContextBuilder {
    pub tracking_location: String,
    pub tool_specs: Vec<ToolSpec>,
}

impl ContextBuilder {
    pub fn new(tracking_location: impl Into<String>) -> Self {
        Self {
            tracking_location: tracking_location.into(),
            tool_specs: vec![],
        }
    }

    pub fn with_tool_specs(mut self, tool_specs: Vec<ToolSpec>) -> Self {
        self.tool_specs = tool_specs;
        self
    }

    pub fn build_system_prompt(&self) -> String {
        let parts = vec![
            format!("{IDENTITY}\n\n## Guidelines\n\n{GUIDELINES}"),
            self.get_tool_instructions(),
            self.get_runtime_context(),
        ];

        parts
            .into_iter()
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n---\n\n")
    }

    fn get_tool_instructions(&self) -> String {
        if self.tool_specs.is_empty() {
            return String::new();
        }

        let mut instructions = String::new();
        instructions.push_str("## Tool Use Protocol\n\n");
        instructions.push_str(
            "Prefer native function calls. If you cannot make one, wrap a JSON object in <tool_call> tags:\n\n",
        );
        instructions.push_str("```\n<tool_call>\n{\"name\": \"tool_name\", \"arguments\": {\"param\": \"value\"}}\n</tool_call>\n```\n\n");
        instructions.push_str("Example: User asks \"which experiments exist?\". Respond with:\n<tool_call>\n{\"name\":\"list_experiments\",\"arguments\":{}}\n</tool_call>\n\n");
        instructions.push_str("You may use multiple tool calls in a single response. ");
        instructions
            .push_str("Continue reasoning with the results until you can give a final answer.\n\n");
        instructions.push_str("### Available Tools\n\n");

        for tool in &self.tool_specs {
            let _ = writeln!(
                instructions,
                "**{}**: {}\nParameters: `{}`\n",
                tool.name, tool.description, tool.parameters_schema
            );
        }

        instructions
    }

    fn get_runtime_context(&self) -> String {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M (%A)");

        format!(
            "## Runtime Context

### Current Time
{}

### Tracking Store
{}",
            timestamp, self.tracking_location
        )
    }

    pub fn build_messages(&self, current_message: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(self.build_system_prompt()),
            ChatMessage::user(current_message),
        ]
    }
}
