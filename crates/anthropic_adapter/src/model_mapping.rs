//! Anthropic Model Mapping
//!
//! Picks the Copilot model that serves an Anthropic model name, based on the
//! cached model registry.

use copilot_client::api::models::ModelsResponse;
use log::debug;

/// Used when no registry has been cached yet.
pub const DEFAULT_COPILOT_MODEL: &str = "claude-3-5-sonnet-20241022";
pub const PREFERRED_COPILOT_MODEL: &str = "claude-3.7-sonnet";

/// Resolve `anthropic_model` against the registry.
///
/// Order: exact id (case-insensitive), the preferred Claude model, any Claude
/// model, then the first model listed.
pub fn select_copilot_model(anthropic_model: &str, registry: Option<&ModelsResponse>) -> String {
    let Some(registry) = registry.filter(|registry| !registry.data.is_empty()) else {
        return DEFAULT_COPILOT_MODEL.to_string();
    };
    let requested = anthropic_model.to_lowercase();

    if let Some(model) = registry.ids().find(|id| id.to_lowercase() == requested) {
        debug!("Found exact model match: {model}");
        return model.to_string();
    }

    if let Some(model) = registry
        .ids()
        .find(|id| id.to_lowercase() == PREFERRED_COPILOT_MODEL)
    {
        debug!("Using preferred model: {model}");
        return model.to_string();
    }

    if let Some(model) = registry.ids().find(|id| id.to_lowercase().contains("claude")) {
        debug!("Using claude model: {model}");
        return model.to_string();
    }

    let fallback = registry.ids().next().unwrap_or(DEFAULT_COPILOT_MODEL);
    debug!("Using fallback model: {fallback}");
    fallback.to_string()
}
