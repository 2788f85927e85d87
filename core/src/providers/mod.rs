pub mod factory;
pub mod groq;
pub mod kind;

pub use factory::{ProviderError, create_provider};
pub use groq::GroqProvider;
pub use kind::ProviderKind;
