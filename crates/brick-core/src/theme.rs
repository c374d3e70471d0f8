//! Block styles and themes.

use crate::colour;
use crate::error::ColourError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A block style as authored. Missing secondary/tertiary colours are
/// derived from the primary when the style is resolved.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockStyle {
    pub colour_primary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colour_secondary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colour_tertiary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hat: Option<String>,
}

impl BlockStyle {
    pub fn from_colour(colour: impl Into<String>) -> Self {
        Self {
            colour_primary: colour.into(),
            ..Default::default()
        }
    }
}

/// A style with every colour parsed to `#rrggbb`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStyle {
    pub primary: String,
    pub secondary: String,
    pub tertiary: String,
    pub hat: Option<String>,
}

/// Tint toward white used when a style omits its secondary colour.
pub const SECONDARY_TINT: f64 = 0.6;
/// Tint toward white used when a style omits its tertiary colour.
pub const TERTIARY_TINT: f64 = 0.3;
/// Shade toward black for the dark edge.
pub const DARK_SHADE: f64 = 0.2;

impl BlockStyle {
    /// Parse every colour, filling the gaps with tints of the primary.
    pub fn resolve(&self) -> Result<ResolvedStyle, ColourError> {
        let primary = colour::parse_block_colour(&self.colour_primary)?;
        let secondary = match &self.colour_secondary {
            Some(c) => colour::parse_block_colour(c)?,
            None => colour::blend("#ffffff", &primary, SECONDARY_TINT)?,
        };
        let tertiary = match &self.colour_tertiary {
            Some(c) => colour::parse_block_colour(c)?,
            None => colour::blend("#ffffff", &primary, TERTIARY_TINT)?,
        };
        Ok(ResolvedStyle {
            primary,
            secondary,
            tertiary,
            hat: self.hat.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
    pub name: String,
    pub block_styles: HashMap<String, BlockStyle>,
}

impl Theme {
    /// The classic hue-based palette.
    pub fn classic() -> Self {
        let hues = [
            ("colour_blocks", "20"),
            ("list_blocks", "260"),
            ("logic_blocks", "210"),
            ("loop_blocks", "120"),
            ("math_blocks", "230"),
            ("procedure_blocks", "290"),
            ("text_blocks", "160"),
            ("variable_blocks", "330"),
            ("hat_blocks", "330"),
        ];
        let mut block_styles: HashMap<String, BlockStyle> = hues
            .iter()
            .map(|(name, hue)| (name.to_string(), BlockStyle::from_colour(*hue)))
            .collect();
        if let Some(hat) = block_styles.get_mut("hat_blocks") {
            hat.hat = Some("cap".to_string());
        }
        Self {
            name: "classic".to_string(),
            block_styles,
        }
    }

    pub fn style(&self, name: &str) -> Option<&BlockStyle> {
        self.block_styles.get(name)
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::classic()
    }
}
