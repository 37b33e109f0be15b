use crate::policy::ViewBoxPadding;
use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// The root `viewBox="min-x min-y width height"` rectangle of a rendered fragment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewBox {
    pub min_x: f64,
    pub min_y: f64,
    pub width: f64,
    pub height: f64,
}

impl ViewBox {
    pub fn new(min_x: f64, min_y: f64, width: f64, height: f64) -> Self {
        Self {
            min_x,
            min_y,
            width,
            height,
        }
    }

    /// Moves a far-negative origin back to zero, widening the box by the distance moved.
    ///
    /// Renderers sometimes place content deep in negative x; browsers then show empty space on
    /// the left and the diagram looks pushed off-center. Returns `None` when `min_x` is at or
    /// above `threshold`.
    pub fn repair_origin(&self, threshold: f64) -> Option<Self> {
        if self.min_x.is_nan() || self.min_x >= threshold {
            return None;
        }
        Some(Self {
            min_x: 0.0,
            width: self.width + self.min_x.abs(),
            ..*self
        })
    }

    pub fn padded(&self, padding: &ViewBoxPadding) -> Self {
        Self {
            min_x: self.min_x - padding.left,
            min_y: self.min_y - padding.top,
            width: self.width + padding.left + padding.right,
            height: self.height + padding.top + padding.bottom,
        }
    }
}

impl FromStr for ViewBox {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        let invalid = || Error::InvalidViewBox {
            raw: raw.to_string(),
        };
        let mut values = [0.0_f64; 4];
        let mut parts = raw
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|p| !p.is_empty());
        for slot in &mut values {
            let part = parts.next().ok_or_else(invalid)?;
            let value = part.parse::<f64>().map_err(|_| invalid())?;
            if !value.is_finite() {
                return Err(invalid());
            }
            *slot = value;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        let [min_x, min_y, width, height] = values;
        Ok(Self::new(min_x, min_y, width, height))
    }
}

impl fmt::Display for ViewBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            fmt_number(self.min_x),
            fmt_number(self.min_y),
            fmt_number(self.width),
            fmt_number(self.height)
        )
    }
}

/// Formats a coordinate or size with the shortest text that parses back to the same value.
///
/// Values pass through unrounded so untouched components keep their exact renderer output.
pub(crate) fn fmt_number(v: f64) -> String {
    if v == 0.0 {
        return "0".to_string();
    }
    format!("{v}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_space_and_comma_separated_values() {
        let vb: ViewBox = "-120 -8 640.5 300".parse().unwrap();
        assert_eq!(vb, ViewBox::new(-120.0, -8.0, 640.5, 300.0));
        let vb: ViewBox = "0,0, 10 20".parse().unwrap();
        assert_eq!(vb, ViewBox::new(0.0, 0.0, 10.0, 20.0));
    }

    #[test]
    fn rejects_short_long_and_non_numeric_values() {
        assert!("0 0 10".parse::<ViewBox>().is_err());
        assert!("0 0 10 10 10".parse::<ViewBox>().is_err());
        assert!("0 0 wide 10".parse::<ViewBox>().is_err());
        assert!("".parse::<ViewBox>().is_err());
        assert!("0 0 inf 10".parse::<ViewBox>().is_err());
    }

    #[test]
    fn repair_origin_moves_origin_and_widens() {
        let vb = ViewBox::new(-150.0, -8.0, 400.0, 300.0);
        let repaired = vb.repair_origin(-80.0).unwrap();
        assert_eq!(repaired, ViewBox::new(0.0, -8.0, 550.0, 300.0));
    }

    #[test]
    fn repair_origin_ignores_origins_at_or_above_threshold() {
        assert_eq!(ViewBox::new(-80.0, 0.0, 10.0, 10.0).repair_origin(-80.0), None);
        assert_eq!(ViewBox::new(-8.0, 0.0, 10.0, 10.0).repair_origin(-80.0), None);
    }

    #[test]
    fn display_trims_trailing_zeros() {
        assert_eq!(ViewBox::new(0.0, -8.0, 550.25, 300.0).to_string(), "0 -8 550.25 300");
        assert_eq!(fmt_number(-0.0), "0");
        assert_eq!(fmt_number(316.40625), "316.40625");
        assert_eq!(fmt_number(-8.4375), "-8.4375");
    }
}
