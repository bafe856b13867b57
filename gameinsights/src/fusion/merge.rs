//! Precedence merge
//!
//! For each canonical field, walk its precedence list and take the first
//! source that supplied a value. `Null` counts as supplied: a higher-priority
//! source that returned an uncoercible value still wins over a lower one.
//! Values are never blended.

use crate::fusion::record::{FieldConflict, UnifiedRecord};
use crate::normalize::NormalizedFragment;
use crate::schema::{Field, FieldValue};
use crate::types::SourceId;
use std::collections::HashMap;
use tracing::debug;

/// Winning source and value for `field`, if any source supplied it
pub fn resolve_field(
    field: Field,
    fragments: &HashMap<SourceId, NormalizedFragment>,
) -> Option<(SourceId, &FieldValue)> {
    field.precedence().iter().find_map(|source| {
        fragments
            .get(source)
            .map(|fragment| fragment.get(field))
            .filter(|value| !value.is_absent())
            .map(|value| (*source, value))
    })
}

/// Merge all fragments for `identifier` into one record
///
/// Every canonical field is present in the result; fields no source supplied
/// are `Absent`. Lower-priority values that disagree with the winner are
/// recorded as conflicts for diagnostics and never change the result.
pub fn merge(identifier: &str, fragments: &HashMap<SourceId, NormalizedFragment>) -> UnifiedRecord {
    let mut record = UnifiedRecord::absent(identifier);

    for field in Field::all() {
        let Some((winner, value)) = resolve_field(field, fragments) else {
            continue;
        };
        record.set(field, value.clone(), winner);

        if matches!(value, FieldValue::Null) {
            continue;
        }
        let winning_text = value.to_string();

        for source in field.precedence().iter().filter(|s| **s != winner) {
            let Some(other) = fragments.get(source).map(|f| f.get(field)) else {
                continue;
            };
            if matches!(other, FieldValue::Absent | FieldValue::Null) || other == value {
                continue;
            }
            let other_text = other.to_string();
            record.conflicts.push(FieldConflict {
                field,
                winner,
                winner_value: winning_text.clone(),
                source: *source,
                value: other_text.clone(),
                similarity: strsim::normalized_levenshtein(&winning_text, &other_text),
            });
        }
    }

    if !record.conflicts.is_empty() {
        debug!(
            identifier = %identifier,
            conflicts = record.conflicts.len(),
            "Sources disagree on some fields (precedence winner kept)"
        );
    }

    record
}
