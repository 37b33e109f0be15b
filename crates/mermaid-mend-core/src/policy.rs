use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Schema version of [`CorrectionPolicy`]. Bump when a field changes meaning.
pub const POLICY_VERSION: u32 = 1;

/// Fill forced onto every text node.
pub const TEXT_FILL: &str = "#000";
/// Smallest font size (px) a corrected text node may end up with.
pub const MIN_FONT_SIZE_PX: f64 = 20.0;
/// Sizes at or above the floor but below this bound are multiplied by [`ENLARGE_FACTOR`].
pub const ENLARGE_BELOW_PX: f64 = 24.0;
pub const ENLARGE_FACTOR: f64 = 1.5;
/// Size assumed when neither the node, its ancestors nor the fragment stylesheet declare one.
/// Mermaid's theme default.
pub const DEFAULT_FONT_SIZE_PX: f64 = 16.0;
/// A viewBox whose origin-x is below this value gets its origin moved to zero.
pub const ORIGIN_REPAIR_THRESHOLD: f64 = -80.0;
pub const FONT_WEIGHT: &str = "600";
pub const FONT_FAMILY: &str = "Arial, sans-serif";

/// Extra room added around a fragment's viewBox, in user units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewBoxPadding {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl ViewBoxPadding {
    /// Padding used for enlarged text: 20 units on three sides and 80 below for wrapped labels.
    pub const ENLARGED_TEXT: Self = Self {
        left: 20.0,
        top: 20.0,
        right: 20.0,
        bottom: 80.0,
    };
}

/// The values the post-render corrector writes into a fragment.
///
/// A policy is constructed once, handed to the pipeline and never mutated while fragments are
/// being corrected. [`CorrectionPolicy::default`] is the single authoritative set of values;
/// tune them here instead of adding another correction path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CorrectionPolicy {
    pub version: u32,
    pub text_fill: String,
    pub min_font_size: f64,
    pub enlarge_below: f64,
    pub enlarge_factor: f64,
    pub default_font_size: f64,
    pub font_weight: Option<String>,
    pub font_family: Option<String>,
    pub origin_repair_threshold: f64,
    pub viewbox_padding: Option<ViewBoxPadding>,
    /// Drop the renderer's inline `max-width` from the root `<svg>` so the page layout decides.
    pub release_max_width: bool,
}

impl Default for CorrectionPolicy {
    fn default() -> Self {
        Self {
            version: POLICY_VERSION,
            text_fill: TEXT_FILL.to_string(),
            min_font_size: MIN_FONT_SIZE_PX,
            enlarge_below: ENLARGE_BELOW_PX,
            enlarge_factor: ENLARGE_FACTOR,
            default_font_size: DEFAULT_FONT_SIZE_PX,
            font_weight: Some(FONT_WEIGHT.to_string()),
            font_family: Some(FONT_FAMILY.to_string()),
            origin_repair_threshold: ORIGIN_REPAIR_THRESHOLD,
            viewbox_padding: None,
            release_max_width: false,
        }
    }
}

impl CorrectionPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default policy plus [`ViewBoxPadding::ENLARGED_TEXT`], so enlarged labels near the edge
    /// are not clipped.
    pub fn padded() -> Self {
        Self {
            viewbox_padding: Some(ViewBoxPadding::ENLARGED_TEXT),
            ..Self::default()
        }
    }

    pub fn with_viewbox_padding(mut self, padding: Option<ViewBoxPadding>) -> Self {
        self.viewbox_padding = padding;
        self
    }

    /// Target size for a text node currently rendered at `current` px.
    ///
    /// Below the floor → the floor; below `enlarge_below` → scaled by `enlarge_factor`;
    /// otherwise unchanged. Non-finite or non-positive input is treated as missing.
    pub fn corrected_font_size(&self, current: f64) -> f64 {
        if !(current.is_finite() && current > 0.0) || current < self.min_font_size {
            return self.min_font_size;
        }
        if current < self.enlarge_below {
            return current * self.enlarge_factor;
        }
        current
    }

    /// Rejects policies that would shrink text or never terminate growth.
    pub fn validate(&self) -> Result<()> {
        if self.version != POLICY_VERSION {
            return Err(Error::InvalidPolicy {
                message: format!(
                    "unsupported policy version {} (expected {POLICY_VERSION})",
                    self.version
                ),
            });
        }
        let positive = [
            ("minFontSize", self.min_font_size),
            ("enlargeBelow", self.enlarge_below),
            ("enlargeFactor", self.enlarge_factor),
            ("defaultFontSize", self.default_font_size),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::InvalidPolicy {
                    message: format!("{name} must be a positive number, got {value}"),
                });
            }
        }
        if self.enlarge_factor < 1.0 {
            return Err(Error::InvalidPolicy {
                message: format!("enlargeFactor must be >= 1, got {}", self.enlarge_factor),
            });
        }
        if !self.origin_repair_threshold.is_finite() {
            return Err(Error::InvalidPolicy {
                message: "originRepairThreshold must be finite".to_string(),
            });
        }
        if self.text_fill.trim().is_empty() {
            return Err(Error::InvalidPolicy {
                message: "textFill must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
