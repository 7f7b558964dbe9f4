//! First-match face-shape classification.

use crate::rules::RuleTable;
use crate::types::{FaceShape, RatioSet};

/// Classify `ratios` against `table`.
///
/// Entries are tried in table order and the first whose three ranges all
/// contain the ratios wins. Falls back to OVAL when nothing matches, so this
/// never fails. Non-finite ratios match no range and therefore yield OVAL.
pub fn classify(table: &RuleTable, ratios: &RatioSet) -> FaceShape {
    match table.entries().iter().find(|entry| entry.matches(ratios)) {
        Some(entry) => entry.shape,
        None => {
            tracing::debug!(?ratios, "no rule matched; falling back to OVAL");
            FaceShape::Oval
        }
    }
}
