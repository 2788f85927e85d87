pub mod agent;
pub mod analysis;
pub mod config;
pub mod providers;
pub mod tools;
pub mod tracking;
pub mod traits;

pub use agent::{AgentLoop, ContextBuilder, ToolRegistry};
pub use config::{Config, ConfigError, LlmConfig, TrackingConfig};
pub use providers::{ProviderError, ProviderKind, create_provider};
pub use tracking::create_store;
pub use traits::*;
