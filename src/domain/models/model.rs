use serde_derive::Deserialize;
use serde_derive::Serialize;

/// Used only when the model server can't list its models.
pub const FALLBACK_MODELS: [&str; 4] = ["gemma:7b", "llama3", "mistral", "codellama"];

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelDetails {
    pub format: String,
    pub family: String,
    pub families: Option<Vec<String>>,
    pub parameter_size: String,
    pub quantization_level: String,
}

/// Model entry as reported by Ollama's `/api/tags`. Passed through untouched.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelDescriptor {
    pub name: String,
    pub model: String,
    pub modified_at: String,
    pub size: u64,
    pub digest: String,
    pub details: ModelDetails,
}

impl ModelDescriptor {
    pub fn named(name: &str) -> ModelDescriptor {
        return ModelDescriptor {
            name: name.to_string(),
            model: name.to_string(),
            ..ModelDescriptor::default()
        };
    }

    pub fn summary(&self) -> String {
        let mut parts: Vec<String> = vec![];
        if !self.details.parameter_size.is_empty() {
            parts.push(self.details.parameter_size.to_string());
        }
        if !self.details.quantization_level.is_empty() {
            parts.push(self.details.quantization_level.to_string());
        }
        if self.size > 0 {
            parts.push(format!("{:.1} GB", self.size as f64 / 1_000_000_000.0));
        }

        if parts.is_empty() {
            return self.name.to_string();
        }

        return format!("{} ({})", self.name, parts.join(", "));
    }
}
