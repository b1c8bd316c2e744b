use ratatui::layout::Constraint;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Requested size of an image along one axis, in terminal cells
///
/// An axis with no request at all is modelled as `Option::None`, which is
/// distinct from `Auto`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "DimensionRepr", into = "DimensionRepr")]
pub enum CellDimension {
    /// Derive this axis from the other one (or from the native pixel size)
    Auto,
    /// Explicit number of cells
    Fixed(u16),
}

impl CellDimension {
    /// Map a ratatui layout constraint onto a requested dimension
    ///
    /// Only `Length` pins an exact cell count; every other constraint leaves
    /// the size up to the image.
    pub fn from_constraint(constraint: Constraint) -> Option<CellDimension> {
        match constraint {
            Constraint::Length(n) => Some(CellDimension::Fixed(n)),
            _ => Some(CellDimension::Auto),
        }
    }

    /// Cell count if this is an explicit request
    pub fn fixed(self) -> Option<u16> {
        match self {
            CellDimension::Fixed(n) => Some(n),
            CellDimension::Auto => None,
        }
    }
}

impl fmt::Display for CellDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellDimension::Auto => f.write_str("auto"),
            CellDimension::Fixed(n) => write!(f, "{}", n),
        }
    }
}

/// Error returned when a dimension string is neither `auto` nor a cell count
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid cell dimension '{0}' (expected \"auto\" or a cell count)")]
pub struct DimensionParseError(pub String);

impl FromStr for CellDimension {
    type Err = DimensionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("auto") {
            return Ok(CellDimension::Auto);
        }
        trimmed
            .parse::<u16>()
            .map(CellDimension::Fixed)
            .map_err(|_| DimensionParseError(s.to_string()))
    }
}

/// On-disk form: `"auto"` or a bare integer
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum DimensionRepr {
    Cells(u16),
    Keyword(String),
}

impl TryFrom<DimensionRepr> for CellDimension {
    type Error = DimensionParseError;

    fn try_from(repr: DimensionRepr) -> Result<Self, Self::Error> {
        match repr {
            DimensionRepr::Cells(n) => Ok(CellDimension::Fixed(n)),
            DimensionRepr::Keyword(s) => s.parse(),
        }
    }
}

impl From<CellDimension> for DimensionRepr {
    fn from(dim: CellDimension) -> Self {
        match dim {
            CellDimension::Auto => DimensionRepr::Keyword("auto".to_string()),
            CellDimension::Fixed(n) => DimensionRepr::Cells(n),
        }
    }
}

/// Layout axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Width,
    Height,
}

/// Source of per-axis size requests for an image
///
/// Hosts resolve whatever styling system they have into this before layout,
/// so the resolver only ever sees unset / auto / fixed.
pub trait StyledSize {
    /// Requested dimension for `axis`, or `None` when nothing constrains it
    fn styled_dimension(&self, axis: Axis) -> Option<CellDimension>;

    /// Both requested dimensions as `(width, height)`
    fn styled_size(&self) -> (Option<CellDimension>, Option<CellDimension>) {
        (
            self.styled_dimension(Axis::Width),
            self.styled_dimension(Axis::Height),
        )
    }
}

/// Explicit style for an image widget
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<CellDimension>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<CellDimension>,
}

impl ImageStyle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the requested width
    pub fn width(mut self, width: CellDimension) -> Self {
        self.width = Some(width);
        self
    }

    /// Set the requested height
    pub fn height(mut self, height: CellDimension) -> Self {
        self.height = Some(height);
        self
    }

    /// Build a style from a pair of layout constraints
    pub fn from_constraints(width: Option<Constraint>, height: Option<Constraint>) -> Self {
        ImageStyle {
            width: width.and_then(CellDimension::from_constraint),
            height: height.and_then(CellDimension::from_constraint),
        }
    }
}

impl StyledSize for ImageStyle {
    fn styled_dimension(&self, axis: Axis) -> Option<CellDimension> {
        match axis {
            Axis::Width => self.width,
            Axis::Height => self.height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dimension() {
        assert_eq!("auto".parse::<CellDimension>(), Ok(CellDimension::Auto));
        assert_eq!(" AUTO ".parse::<CellDimension>(), Ok(CellDimension::Auto));
        assert_eq!("40".parse::<CellDimension>(), Ok(CellDimension::Fixed(40)));
        assert_eq!("0".parse::<CellDimension>(), Ok(CellDimension::Fixed(0)));
        assert!("-3".parse::<CellDimension>().is_err());
        assert!("wide".parse::<CellDimension>().is_err());
    }

    #[test]
    fn test_display_matches_parse() {
        for dim in [CellDimension::Auto, CellDimension::Fixed(12)] {
            assert_eq!(dim.to_string().parse::<CellDimension>(), Ok(dim));
        }
    }

    #[test]
    fn test_dimension_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            width: CellDimension,
            height: CellDimension,
        }

        let parsed: Wrapper = toml::from_str("width = \"auto\"\nheight = 24").unwrap();
        assert_eq!(parsed.width, CellDimension::Auto);
        assert_eq!(parsed.height, CellDimension::Fixed(24));

        let bad = toml::from_str::<Wrapper>("width = \"huge\"\nheight = 1");
        assert!(bad.is_err());
    }

    #[test]
    fn test_from_constraint() {
        assert_eq!(
            CellDimension::from_constraint(Constraint::Length(7)),
            Some(CellDimension::Fixed(7))
        );
        assert_eq!(
            CellDimension::from_constraint(Constraint::Percentage(50)),
            Some(CellDimension::Auto)
        );
        assert_eq!(
            CellDimension::from_constraint(Constraint::Fill(1)),
            Some(CellDimension::Auto)
        );
    }

    #[test]
    fn test_style_builder() {
        let style = ImageStyle::new().width(CellDimension::Fixed(40));
        assert_eq!(
            style.styled_dimension(Axis::Width),
            Some(CellDimension::Fixed(40))
        );
        assert_eq!(style.styled_dimension(Axis::Height), None);
        assert_eq!(style.styled_size(), (Some(CellDimension::Fixed(40)), None));

        let style = ImageStyle::from_constraints(None, Some(Constraint::Min(3)));
        assert_eq!(style.styled_size(), (None, Some(CellDimension::Auto)));
    }
}
