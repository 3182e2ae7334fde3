/// Edit settings chosen in an edit session
///
/// These values describe what will be applied to the working file when the
/// session is submitted. They are plain data: the pipeline in
/// `imaging::pipeline` is what actually touches pixels.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result, ValidationIssue};

/// Lowest accepted brightness/contrast factor
pub const MIN_FACTOR: f32 = 0.5;
/// Highest accepted brightness/contrast factor
pub const MAX_FACTOR: f32 = 1.5;
/// Factor that leaves the image unchanged
pub const NEUTRAL_FACTOR: f32 = 1.0;

/// The fixed set of whole-image filters
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    #[default]
    None,
    Greyscale,
    Sepia,
    Sketch,
    Invert,
}

impl FilterKind {
    pub const ALL: [FilterKind; 5] = [
        FilterKind::None,
        FilterKind::Greyscale,
        FilterKind::Sepia,
        FilterKind::Sketch,
        FilterKind::Invert,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterKind::None => "none",
            FilterKind::Greyscale => "greyscale",
            FilterKind::Sepia => "sepia",
            FilterKind::Sketch => "sketch",
            FilterKind::Invert => "invert",
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(FilterKind::None),
            "greyscale" | "grayscale" => Ok(FilterKind::Greyscale),
            "sepia" => Ok(FilterKind::Sepia),
            "sketch" => Ok(FilterKind::Sketch),
            "invert" => Ok(FilterKind::Invert),
            other => Err(format!(
                "unknown filter '{}' (expected one of: none, greyscale, sepia, sketch, invert)",
                other
            )),
        }
    }
}

/// Everything an edit session can apply to the working file
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct EditSettings {
    /// Filter applied first
    pub filter: FilterKind,

    /// Multiplicative brightness (0.5 to 1.5)
    /// - Below 1.0 darkens, above 1.0 brightens
    /// - 1.0 = no adjustment
    pub brightness: f32,

    /// Multiplicative contrast around the mean grey level (0.5 to 1.5)
    /// - 1.0 = no adjustment
    pub contrast: f32,
}

impl Default for EditSettings {
    fn default() -> Self {
        Self {
            filter: FilterKind::None,
            brightness: NEUTRAL_FACTOR,
            contrast: NEUTRAL_FACTOR,
        }
    }
}

impl EditSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert to JSON (used for logging what a session applied)
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Check if applying these settings would leave the file untouched
    pub fn is_unedited(&self) -> bool {
        *self == Self::default()
    }

    /// Reset all adjustments to default (no edits)
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Reject factors outside the accepted range, reporting each one
    pub fn validate(&self) -> Result<()> {
        let issues: Vec<ValidationIssue> = [("brightness", self.brightness), ("contrast", self.contrast)]
            .into_iter()
            .filter_map(|(name, value)| check_factor(name, value).err())
            .collect();

        if issues.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(issues))
        }
    }
}

/// Range check for a single brightness/contrast factor
pub fn check_factor(name: &'static str, value: f32) -> std::result::Result<(), ValidationIssue> {
    if value.is_finite() && (MIN_FACTOR..=MAX_FACTOR).contains(&value) {
        Ok(())
    } else {
        Err(ValidationIssue::FactorOutOfRange { name, value })
    }
}

/// Whether a factor is close enough to 1.0 to skip the rewrite
pub fn is_neutral(factor: f32) -> bool {
    (factor - NEUTRAL_FACTOR).abs() < f32::EPSILON
}
