//! Placement instructions and normalized suggestion boxes.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What to draw at a placement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlacementKind {
    /// Bordered box with the signature identifier.
    #[default]
    Digital,
    /// The signer's own raster image.
    #[serde(alias = "user")]
    UserImage,
}

/// Draw a mark at a point on a page.
///
/// `x`/`y` are in the page's native user space: origin bottom-left, same
/// units as the page box. Pages are numbered from 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementInstruction {
    pub page: u32,
    pub x: f64,
    pub y: f64,
    #[serde(rename = "type", alias = "kind", default)]
    pub kind: PlacementKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl PlacementInstruction {
    pub fn digital(page: u32, x: f64, y: f64) -> Self {
        Self {
            page,
            x,
            y,
            kind: PlacementKind::Digital,
            label: None,
        }
    }

    pub fn user_image(page: u32, x: f64, y: f64) -> Self {
        Self {
            page,
            x,
            y,
            kind: PlacementKind::UserImage,
            label: None,
        }
    }

    /// Parse a JSON array of placements.
    pub fn parse_list(json: &str) -> Result<Vec<Self>> {
        Ok(serde_json::from_str(json)?)
    }
}

/// A box on the 0-1000 scale, top-left origin, ordered
/// `[ymin, xmin, ymax, xmax]` on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct NormalizedBox {
    pub ymin: f64,
    pub xmin: f64,
    pub ymax: f64,
    pub xmax: f64,
}

impl NormalizedBox {
    /// Full extent of the normalized scale.
    pub const SCALE: f64 = 1000.0;

    pub fn new(ymin: f64, xmin: f64, ymax: f64, xmax: f64) -> Self {
        Self {
            ymin,
            xmin,
            ymax,
            xmax,
        }
    }

    /// Map the box's bottom-left corner into native page coordinates.
    ///
    /// The vertical axis flips: normalized boxes count down from the top,
    /// page space counts up from the bottom.
    pub fn to_native(&self, page_width: f64, page_height: f64) -> (f64, f64) {
        let x = (self.xmin / Self::SCALE) * page_width;
        let y = (1.0 - self.ymax / Self::SCALE) * page_height;
        (x, y)
    }
}

impl From<[f64; 4]> for NormalizedBox {
    fn from([ymin, xmin, ymax, xmax]: [f64; 4]) -> Self {
        Self::new(ymin, xmin, ymax, xmax)
    }
}

impl From<NormalizedBox> for [f64; 4] {
    fn from(b: NormalizedBox) -> Self {
        [b.ymin, b.xmin, b.ymax, b.xmax]
    }
}

fn first_page() -> u32 {
    1
}

fn default_label() -> String {
    "Sign Here".to_string()
}

/// A suggested signing spot as reported by document analysis.
///
/// Untrusted hint only; it never influences what is signed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedSuggestion {
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(rename = "box_2d", default)]
    pub bounds: NormalizedBox,
    #[serde(default = "default_label")]
    pub label: String,
}

/// A suggestion resolved to native page coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedPlacement {
    pub page: u32,
    pub x: f64,
    pub y: f64,
    pub label: String,
}

impl SuggestedPlacement {
    /// Turn the suggestion into an instruction of the given kind.
    pub fn into_instruction(self, kind: PlacementKind) -> PlacementInstruction {
        PlacementInstruction {
            page: self.page,
            x: self.x,
            y: self.y,
            kind,
            label: Some(self.label),
        }
    }
}

/// Resolve suggestions against known page sizes (`(width, height)`, page 1
/// first). Suggestions for pages that do not exist are dropped.
pub fn resolve_suggestions(
    page_sizes: &[(f64, f64)],
    suggestions: &[NormalizedSuggestion],
) -> Vec<SuggestedPlacement> {
    suggestions
        .iter()
        .filter_map(|s| {
            let index = usize::try_from(s.page).ok()?.checked_sub(1)?;
            let (width, height) = *page_sizes.get(index)?;
            let (x, y) = s.bounds.to_native(width, height);
            Some(SuggestedPlacement {
                page: s.page,
                x,
                y,
                label: s.label.clone(),
            })
        })
        .collect()
}

/// Group placements by page, keeping arrival order within each page. Each
/// entry carries the placement's index in the input.
pub(crate) fn group_by_page(
    placements: &[PlacementInstruction],
) -> BTreeMap<u32, Vec<(usize, &PlacementInstruction)>> {
    let mut grouped: BTreeMap<u32, Vec<(usize, &PlacementInstruction)>> = BTreeMap::new();
    for (index, placement) in placements.iter().enumerate() {
        grouped.entry(placement.page).or_default().push((index, placement));
    }
    grouped
}
