use crate::api::ModelInfo;
use chrono::{DateTime, Utc};

/// Human-readable creation date for a model, if the upstream reported one.
///
/// Handles both `created` (OpenAI-style Unix timestamp, sometimes in
/// milliseconds) and `created_at` (free-form string) fields.
pub fn format_model_created(model: &ModelInfo) -> Option<String> {
    if let Some(created) = model.created {
        if created == 0 {
            return None;
        }
        let timestamp_secs = if created > 10_000_000_000 {
            created / 1000
        } else {
            created
        };
        return DateTime::<Utc>::from_timestamp(timestamp_secs as i64, 0)
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string());
    }

    model
        .created_at
        .as_ref()
        .filter(|created_at| !created_at.is_empty())
        .cloned()
}

/// Owner worth showing; `system` is what several local servers report for everything.
pub fn displayable_owner(model: &ModelInfo) -> Option<&str> {
    model
        .owned_by
        .as_deref()
        .filter(|owner| !owner.is_empty() && *owner != "system")
}

/// Markdown bullet lines describing one model.
pub fn model_detail_lines(model: &ModelInfo) -> Vec<String> {
    let mut lines = vec![format!("- `{}`", model.id)];
    if let Some(display_name) = &model.display_name {
        if !display_name.is_empty() && display_name != &model.id {
            lines.push(format!("  - Name: {display_name}"));
        }
    }
    if let Some(owner) = displayable_owner(model) {
        lines.push(format!("  - Owner: {owner}"));
    }
    if let Some(created) = format_model_created(model) {
        lines.push(format!("  - Created: {created}"));
    }
    lines
}
