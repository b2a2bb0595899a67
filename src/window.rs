//
// window.rs
// Tag2Dcm-rs
//
// Linear CT window (width/level) mapping rescaled intensities onto the [0, 1] display range.
//

use ndarray::ArrayD;
use serde::{Deserialize, Serialize};

use crate::error::{Result, Tag2DcmError};

/// A linear intensity-to-display mapping. `width` is the span, `level` the center.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowSpec {
    width: f64,
    level: f64,
}

impl WindowSpec {
    /// Standard soft-tissue CT window used by the compositing pipeline.
    pub const SOFT_TISSUE: WindowSpec = WindowSpec {
        width: 400.0,
        level: 50.0,
    };

    pub fn new(width: f64, level: f64) -> Result<Self> {
        if !(width.is_finite() && width > 0.0) || !level.is_finite() {
            return Err(Tag2DcmError::InvalidWindow { width, level });
        }
        Ok(Self { width, level })
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    /// Maps one intensity into [0, 1]; values landing exactly on a bound are kept.
    pub fn apply(&self, intensity: f64) -> f64 {
        let normalized = (intensity - self.level + 0.5 * self.width) / self.width;
        normalized.clamp(0.0, 1.0)
    }

    pub fn apply_array(&self, intensities: &ArrayD<f64>) -> ArrayD<f64> {
        intensities.mapv(|v| self.apply(v))
    }
}

impl Default for WindowSpec {
    fn default() -> Self {
        Self::SOFT_TISSUE
    }
}
