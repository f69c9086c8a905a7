#[cfg(test)]
#[path = "models_test.rs"]
mod tests;

use super::SharedStore;
use crate::domain::models::BackendBox;
use crate::domain::models::ModelDescriptor;
use crate::domain::models::FALLBACK_MODELS;

pub const FALLBACK_NOTICE: &str = "Could not fetch models. Using fallback list.";

/// Models the user can pick from, as reported by the server at startup.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModelCatalog {
    pub models: Vec<ModelDescriptor>,
    pub notice: Option<String>,
}

impl ModelCatalog {
    /// Fetches the model list and makes sure the session has a usable
    /// selection.
    pub async fn load(backend: &BackendBox, store: &SharedStore) -> ModelCatalog {
        let catalog = match backend.list_models().await {
            Ok(models) => ModelCatalog {
                models,
                notice: None,
            },
            Err(err) => {
                tracing::warn!(error = %err, "Falling back to the built-in model list");
                ModelCatalog {
                    models: FALLBACK_MODELS
                        .iter()
                        .map(|name| return ModelDescriptor::named(name))
                        .collect(),
                    notice: Some(FALLBACK_NOTICE.to_string()),
                }
            }
        };

        let mut store = store.lock();
        let selected = store.selected_model().to_string();
        if catalog.notice.is_some() {
            if selected.is_empty() {
                store.select_model(FALLBACK_MODELS[0]);
            }
        } else if selected.is_empty() || catalog.position(&selected).is_none() {
            let first = catalog
                .models
                .first()
                .map(|model| return model.name.to_string())
                .unwrap_or_default();
            if first != selected {
                tracing::info!(previous = %selected, model = %first, "Selecting model");
                store.select_model(&first);
            }
        }

        return catalog;
    }

    fn position(&self, name: &str) -> Option<usize> {
        return self.models.iter().position(|model| return model.name == name);
    }

    /// Looks a model up by name or by its 1-based position in the list.
    pub fn resolve(&self, input: &str) -> Option<String> {
        let input = input.trim();
        if let Some(idx) = self.position(input) {
            return Some(self.models[idx].name.to_string());
        }

        return input
            .parse::<usize>()
            .ok()
            .filter(|idx| return *idx > 0)
            .and_then(|idx| return self.models.get(idx - 1))
            .map(|model| return model.name.to_string());
    }

    pub fn format_list(&self, selected: &str) -> String {
        if self.models.is_empty() {
            return "No models available. Pull one with `ollama pull <model>`.".to_string();
        }

        return self
            .models
            .iter()
            .enumerate()
            .map(|(idx, model)| {
                let marker = if model.name == selected { "*" } else { " " };
                return format!("{marker} {}. {}", idx + 1, model.summary());
            })
            .collect::<Vec<String>>()
            .join("\n");
    }
}
