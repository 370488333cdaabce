//! Selectable chat models

use serde::{Deserialize, Serialize};

/// Chat model selectable by the user
///
/// Code interpreter variants map onto function-calling capable upstream
/// models and are the only ones sent the tool function list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Model {
    #[serde(rename = "gpt-4")]
    Gpt4,
    #[serde(rename = "gpt-4-0613")]
    Gpt4_0613,
    #[serde(rename = "gpt-4-code-interpreter")]
    Gpt4CodeInterpreter,
    #[serde(rename = "gpt-3.5-turbo-0613")]
    Gpt35Turbo0613,
    #[serde(rename = "gpt-3.5-turbo-16k-0613")]
    Gpt35Turbo16k0613,
    #[default]
    #[serde(rename = "gpt-3.5-code-interpreter-16k")]
    Gpt35CodeInterpreter16k,
}

impl Model {
    pub const ALL: [Model; 6] = [
        Self::Gpt4,
        Self::Gpt4_0613,
        Self::Gpt4CodeInterpreter,
        Self::Gpt35Turbo0613,
        Self::Gpt35Turbo16k0613,
        Self::Gpt35CodeInterpreter16k,
    ];

    /// Catalog id, as used in config files and on the command line
    pub fn id(&self) -> &'static str {
        match self {
            Self::Gpt4 => "gpt-4",
            Self::Gpt4_0613 => "gpt-4-0613",
            Self::Gpt4CodeInterpreter => "gpt-4-code-interpreter",
            Self::Gpt35Turbo0613 => "gpt-3.5-turbo-0613",
            Self::Gpt35Turbo16k0613 => "gpt-3.5-turbo-16k-0613",
            Self::Gpt35CodeInterpreter16k => "gpt-3.5-code-interpreter-16k",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Gpt4 => "GPT-4",
            Self::Gpt4_0613 => "GPT-4-0613",
            Self::Gpt4CodeInterpreter => "GPT-4 Code Interpreter",
            Self::Gpt35Turbo0613 => "GPT-3.5-Turbo-0613",
            Self::Gpt35Turbo16k0613 => "GPT-3.5-turbo-16k-0613",
            Self::Gpt35CodeInterpreter16k => "GPT-3.5 Code Interpreter",
        }
    }

    /// Model name sent upstream
    pub fn api_name(&self) -> &'static str {
        match self {
            Self::Gpt4 => "gpt-4",
            Self::Gpt4_0613 | Self::Gpt4CodeInterpreter => "gpt-4-0613",
            Self::Gpt35Turbo0613 => "gpt-3.5-turbo-0613",
            Self::Gpt35Turbo16k0613 | Self::Gpt35CodeInterpreter16k => "gpt-3.5-turbo-16k-0613",
        }
    }

    /// Whether requests for this model carry the tool function list
    pub fn is_code_interpreter(&self) -> bool {
        matches!(self, Self::Gpt4CodeInterpreter | Self::Gpt35CodeInterpreter16k)
    }
}

impl std::fmt::Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

impl std::str::FromStr for Model {
    type Err = String;

    /// Accepts a catalog id or a display name (case-insensitive)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|m| m.id().eq_ignore_ascii_case(wanted) || m.display_name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|m| m.id()).collect();
                format!("Unknown model '{}', expected one of: {}", s, known.join(", "))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_interpreter_aliases() {
        assert_eq!(Model::Gpt4CodeInterpreter.api_name(), "gpt-4-0613");
        assert_eq!(Model::Gpt35CodeInterpreter16k.api_name(), "gpt-3.5-turbo-16k-0613");
        assert!(Model::Gpt35CodeInterpreter16k.is_code_interpreter());
        assert!(!Model::Gpt4_0613.is_code_interpreter());
    }

    #[test]
    fn test_default_model_is_code_interpreter() {
        assert_eq!(Model::default(), Model::Gpt35CodeInterpreter16k);
        assert!(Model::default().is_code_interpreter());
    }

    #[test]
    fn test_from_str() {
        assert_eq!("gpt-4".parse::<Model>().unwrap(), Model::Gpt4);
        assert_eq!("GPT-4 Code Interpreter".parse::<Model>().unwrap(), Model::Gpt4CodeInterpreter);
        assert!("gpt-5".parse::<Model>().unwrap_err().contains("Unknown model"));
    }

    #[test]
    fn test_serde_uses_catalog_id() {
        let json = serde_json::to_string(&Model::Gpt35Turbo16k0613).unwrap();
        assert_eq!(json, "\"gpt-3.5-turbo-16k-0613\"");
        let model: Model = serde_json::from_str("\"gpt-4-code-interpreter\"").unwrap();
        assert_eq!(model, Model::Gpt4CodeInterpreter);
    }
}
