pub mod provider;
pub mod store;
pub mod tool;

pub use provider::{ChatMessage, ChatRequest, ChatResponse, Provider, ToolCall};
pub use store::{StoreError, StoreResult, TrackingStore};
pub use tool::{Tool, ToolError, ToolResult, ToolSpec};
