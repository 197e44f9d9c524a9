use serde::{Deserialize, Serialize};

/// Label used for any text dimension whose stored value is missing or blank.
pub const NONE_LABEL: &str = "(none)";

/// Model value written by the client for locally synthesized messages.
pub const SYNTHETIC_MODEL: &str = "<synthetic>";

/// Lower-cased model labels that never count as a real model.
pub const SENTINEL_MODEL_LABELS: &[&str] = &[NONE_LABEL, "unknown", SYNTHETIC_MODEL];

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum ModelName {
    Known(String),
    Unknown,
    Synthetic,
}

impl ModelName {
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(value) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
            return ModelName::Unknown;
        };
        let lower = value.to_ascii_lowercase();
        if lower == SYNTHETIC_MODEL {
            return ModelName::Synthetic;
        }
        if SENTINEL_MODEL_LABELS.contains(&lower.as_str()) {
            return ModelName::Unknown;
        }
        ModelName::Known(value.to_string())
    }

    pub fn is_known(&self) -> bool {
        matches!(self, ModelName::Known(_))
    }

    pub fn as_known(&self) -> Option<&str> {
        match self {
            ModelName::Known(name) => Some(name),
            ModelName::Unknown | ModelName::Synthetic => None,
        }
    }
}
