//! User-facing text for analysis results.

use faceform_core::{Analysis, Recommendation};

pub const NO_FACE: &str =
    "Couldn't find a face in this photo. Try a well-lit, front-facing photo with your whole face visible.";
pub const FAILURE: &str = "Something went wrong while analyzing the photo. Please try again.";

/// Full report for a successful analysis.
pub fn render_analysis(analysis: &Analysis) -> String {
    let mut lines = vec![
        "Analysis complete!".to_string(),
        String::new(),
        format!("Your face shape: {}", analysis.description),
        String::new(),
        "Recommended haircuts:".to_string(),
    ];
    lines.extend(analysis.recommendations.iter().map(|r| format!("- {r}")));

    lines.push(String::new());
    lines.push("Measurements:".to_string());
    for (name, value) in analysis.ratios.named() {
        lines.push(format!("- {name}: {value:.2}"));
    }

    lines.join("\n")
}

/// Description and recommendations for a direct lookup.
pub fn render_recommendation(rec: &Recommendation<'_>) -> String {
    let mut lines = vec![format!("{}: {}", rec.shape, rec.description)];
    lines.extend(rec.recommendations.iter().map(|r| format!("- {r}")));
    lines.join("\n")
}
