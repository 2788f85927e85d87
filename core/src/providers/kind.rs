use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Every provider name the config accepts. Only `Groq` has a client; the
/// others are recognized so that selecting them fails loudly at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum ProviderKind {
    #[default]
    Groq,
    OpenAi,
    Ollama,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [Self::Groq, Self::OpenAi, Self::Ollama];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Groq => "groq",
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
        }
    }

    pub fn is_supported(&self) -> bool {
        matches!(self, Self::Groq)
    }

    /// Environment variables consulted for an API key, in order.
    pub fn api_key_env_vars(&self) -> &'static [&'static str] {
        match self {
            Self::Groq => &["GROQ_API_KEY", "MLCHAT_API_KEY"],
            Self::OpenAi => &["OPENAI_API_KEY", "MLCHAT_API_KEY"],
            Self::Ollama => &[],
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == name)
            .ok_or_else(|| format!("Unknown provider: {s}. Available: groq, openai, ollama"))
    }
}

impl TryFrom<String> for ProviderKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!("Groq".parse::<ProviderKind>(), Ok(ProviderKind::Groq));
        assert_eq!(" OPENAI ".parse::<ProviderKind>(), Ok(ProviderKind::OpenAi));
        assert!("anthropic".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn serde_names_match_display() {
        for kind in ProviderKind::ALL {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, serde_json::json!(kind.to_string()));
        }
        assert!(ProviderKind::Groq.is_supported());
        assert!(!ProviderKind::Ollama.is_supported());
    }

    #[test]
    fn deserializes_any_case() {
        let kind: ProviderKind = serde_json::from_value(serde_json::json!("Ollama")).unwrap();
        assert_eq!(kind, ProviderKind::Ollama);
        assert!(serde_json::from_value::<ProviderKind>(serde_json::json!("gemini")).is_err());
    }
}
