//! Face-shape rule table.
//!
//! An ordered list of entries, each giving an inclusive range for every
//! ratio plus the description and hairstyle recommendations for that shape.
//! The built-in table is embedded at compile time from
//! `contrib/rules/default.toml`; a replacement table can be loaded from disk
//! in the same format. Tables are validated once when loaded and are
//! immutable afterwards.

use crate::types::{FaceShape, RatioSet};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;
use thiserror::Error;

const DEFAULT_RULES: &str = include_str!("../../../contrib/rules/default.toml");

static BUILTIN_RULES: OnceLock<RuleTable> = OnceLock::new();

#[derive(Error, Debug)]
pub enum RuleTableError {
    #[error("failed to read rule table {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("bad rule table TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("rule table has no entries")]
    EmptyTable,
    #[error("unknown face shape in rule table: {0}")]
    UnknownShape(String),
    #[error("face shape {0} appears more than once")]
    DuplicateShape(FaceShape),
    #[error("{shape}: {ratio} range [{low}, {high}] is invalid")]
    InvalidRange {
        shape: FaceShape,
        ratio: &'static str,
        low: f64,
        high: f64,
    },
    #[error("rule table has no OVAL entry (required as the fallback)")]
    MissingFallback,
}

/// Inclusive `[low, high]` interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatioRange {
    pub low: f64,
    pub high: f64,
}

impl RatioRange {
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.low <= value && value <= self.high
    }

    fn is_valid(&self) -> bool {
        self.low.is_finite() && self.high.is_finite() && self.low <= self.high
    }

    fn intersects(&self, other: &RatioRange) -> bool {
        self.low <= other.high && other.low <= self.high
    }
}

/// One row of the rule table.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleEntry {
    pub shape: FaceShape,
    pub width_to_length: RatioRange,
    pub forehead_to_jawline: RatioRange,
    pub cheekbone_to_jawline: RatioRange,
    pub description: String,
    /// Presentation order is significant.
    pub recommendations: Vec<String>,
}

impl RuleEntry {
    /// True when every ratio lies inside its range.
    pub fn matches(&self, ratios: &RatioSet) -> bool {
        self.width_to_length.contains(ratios.width_to_length)
            && self.forehead_to_jawline.contains(ratios.forehead_to_jawline)
            && self.cheekbone_to_jawline.contains(ratios.cheekbone_to_jawline)
    }

    /// True when some ratio set would satisfy both entries.
    pub fn overlaps(&self, other: &RuleEntry) -> bool {
        self.width_to_length.intersects(&other.width_to_length)
            && self.forehead_to_jawline.intersects(&other.forehead_to_jawline)
            && self.cheekbone_to_jawline.intersects(&other.cheekbone_to_jawline)
    }

    fn ranges(&self) -> [(&'static str, RatioRange); 3] {
        [
            ("width_to_length", self.width_to_length),
            ("forehead_to_jawline", self.forehead_to_jawline),
            ("cheekbone_to_jawline", self.cheekbone_to_jawline),
        ]
    }
}

/// Validated, ordered rule table. Entry order decides ties.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleTable {
    entries: Vec<RuleEntry>,
    fallback: usize,
}

/// On-disk layout: `[[shape]]` array of tables, in match order.
#[derive(Debug, Deserialize)]
struct RuleFile {
    shape: Vec<RawEntry>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    name: String,
    description: String,
    width_to_length: [f64; 2],
    forehead_to_jawline: [f64; 2],
    cheekbone_to_jawline: [f64; 2],
    #[serde(default)]
    recommendations: Vec<String>,
}

impl TryFrom<RawEntry> for RuleEntry {
    type Error = RuleTableError;

    fn try_from(raw: RawEntry) -> Result<Self, Self::Error> {
        let shape = raw
            .name
            .parse::<FaceShape>()
            .map_err(|e| RuleTableError::UnknownShape(e.0))?;
        let range = |[low, high]: [f64; 2]| RatioRange::new(low, high);
        Ok(RuleEntry {
            shape,
            width_to_length: range(raw.width_to_length),
            forehead_to_jawline: range(raw.forehead_to_jawline),
            cheekbone_to_jawline: range(raw.cheekbone_to_jawline),
            description: raw.description,
            recommendations: raw.recommendations,
        })
    }
}

impl RuleTable {
    /// Validate `entries` and build a table. Order is kept as given.
    pub fn new(entries: Vec<RuleEntry>) -> Result<Self, RuleTableError> {
        if entries.is_empty() {
            return Err(RuleTableError::EmptyTable);
        }

        let mut seen = HashSet::new();
        for entry in &entries {
            if !seen.insert(entry.shape) {
                return Err(RuleTableError::DuplicateShape(entry.shape));
            }
            for (ratio, range) in entry.ranges() {
                if !range.is_valid() {
                    return Err(RuleTableError::InvalidRange {
                        shape: entry.shape,
                        ratio,
                        low: range.low,
                        high: range.high,
                    });
                }
            }
        }

        let fallback = entries
            .iter()
            .position(|e| e.shape == FaceShape::Oval)
            .ok_or(RuleTableError::MissingFallback)?;

        let table = Self { entries, fallback };
        for (first, second) in table.overlapping_pairs() {
            tracing::warn!(
                %first,
                %second,
                "rule table ranges overlap; {first} wins because it is listed first"
            );
        }
        Ok(table)
    }

    /// Parse and validate a table from TOML text.
    pub fn from_toml_str(src: &str) -> Result<Self, RuleTableError> {
        let file: RuleFile = toml::from_str(src)?;
        let entries = file
            .shape
            .into_iter()
            .map(RuleEntry::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(entries)
    }

    /// Load and validate a table from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RuleTableError> {
        let path = path.as_ref();
        let src = std::fs::read_to_string(path).map_err(|source| RuleTableError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let table = Self::from_toml_str(&src)?;
        tracing::info!(path = %path.display(), entries = table.len(), "loaded rule table");
        Ok(table)
    }

    /// The table shipped with the crate. Parsed and validated on first use.
    pub fn builtin() -> Result<Self, RuleTableError> {
        if let Some(table) = BUILTIN_RULES.get() {
            return Ok(table.clone());
        }
        let table = Self::from_toml_str(DEFAULT_RULES)?;
        Ok(BUILTIN_RULES.get_or_init(|| table).clone())
    }

    pub fn entries(&self) -> &[RuleEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, shape: FaceShape) -> Option<&RuleEntry> {
        self.entries.iter().find(|e| e.shape == shape)
    }

    /// The OVAL entry. Always present in a validated table.
    pub fn fallback(&self) -> &RuleEntry {
        &self.entries[self.fallback]
    }

    /// Pairs of entries whose ranges can both match the same ratio set,
    /// as (earlier, later) in table order.
    pub fn overlapping_pairs(&self) -> Vec<(FaceShape, FaceShape)> {
        let mut pairs = Vec::new();
        for (i, a) in self.entries.iter().enumerate() {
            for b in &self.entries[i + 1..] {
                if a.overlaps(b) {
                    pairs.push((a.shape, b.shape));
                }
            }
        }
        pairs
    }
}
