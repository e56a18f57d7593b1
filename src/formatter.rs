//! Option formatting
//!
//! Shapes a `MatchResult` into `{value, display}` pairs. Ordering is taken
//! verbatim from the resolver; nothing is re-sorted here.

use crate::registry::EntityType;
use crate::resolver::MatchResult;
use crate::types::{OptionEntry, OptionValue, Record};

/// Display text of the unselected placeholder
pub const PLACEHOLDER_DISPLAY: &str = "---------";

pub fn placeholder() -> OptionEntry {
    OptionEntry {
        value: OptionValue::Empty,
        display: PLACEHOLDER_DISPLAY.to_string(),
    }
}

/// Format a match result: matched records, then (optionally) exactly one
/// placeholder, then the retained selection.
pub fn format_options(
    entity: &EntityType,
    result: &MatchResult,
    include_placeholder: bool,
) -> Vec<OptionEntry> {
    let entry = |record: &Record| OptionEntry {
        value: OptionValue::Id(record.id.clone()),
        display: entity.display(record),
    };

    let mut options = Vec::with_capacity(result.len() + usize::from(include_placeholder));
    options.extend(result.matched.iter().map(entry));
    if include_placeholder {
        options.push(placeholder());
    }
    options.extend(result.retained.iter().map(entry));
    options
}
