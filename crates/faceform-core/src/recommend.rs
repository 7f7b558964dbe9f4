//! Description and hairstyle lookup by face shape.

use crate::rules::RuleTable;
use crate::types::FaceShape;

/// Borrowed view of one table entry's presentation data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Recommendation<'a> {
    /// The shape whose entry was used (OVAL when the request fell back).
    pub shape: FaceShape,
    pub description: &'a str,
    pub recommendations: &'a [String],
}

/// Look up `shape` in `table`, substituting OVAL if the table has no entry
/// for it.
pub fn recommendations(table: &RuleTable, shape: FaceShape) -> Recommendation<'_> {
    let entry = table.get(shape).unwrap_or_else(|| {
        tracing::debug!(%shape, "shape not in rule table; using OVAL");
        table.fallback()
    });
    Recommendation {
        shape: entry.shape,
        description: &entry.description,
        recommendations: &entry.recommendations,
    }
}

/// Look up a shape by name. Unrecognized names resolve to OVAL.
pub fn recommendations_by_name<'a>(table: &'a RuleTable, name: &str) -> Recommendation<'a> {
    match name.parse::<FaceShape>() {
        Ok(shape) => recommendations(table, shape),
        Err(e) => {
            tracing::debug!(error = %e, "using OVAL");
            recommendations(table, FaceShape::Oval)
        }
    }
}
