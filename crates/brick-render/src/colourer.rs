//! Block colours: style lookup, derived tints, shadow and normal paints.

use crate::error::RenderError;
use brick_core::block::Block;
use brick_core::colour;
use brick_core::error::ColourError;
use brick_core::theme::{BlockStyle, DARK_SHADE, Theme};

/// Resolved colours for one block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Colourer {
    pub primary: String,
    pub secondary: String,
    pub tertiary: String,
}

/// Fill and stroke for one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paint {
    pub fill: String,
    pub stroke: Option<String>,
}

impl Colourer {
    /// Resolve a style, deriving missing secondary and tertiary colours.
    pub fn from_style(style: &BlockStyle) -> Result<Self, ColourError> {
        let resolved = style.resolve()?;
        Ok(Self {
            primary: resolved.primary,
            secondary: resolved.secondary,
            tertiary: resolved.tertiary,
        })
    }

    /// A block's `style` names a theme style; failing that it is read as a
    /// hue or literal colour.
    pub fn for_block(theme: &Theme, block: &Block) -> Result<Self, RenderError> {
        let colourer = match theme.style(&block.style) {
            Some(style) => Self::from_style(style)?,
            None if block.style.is_empty() => Self::from_style(&BlockStyle::from_colour("0"))?,
            None => Self::from_style(&BlockStyle::from_colour(block.style.clone()))?,
        };
        Ok(colourer)
    }

    /// Shadow blocks: secondary fill, no stroke. Others: primary fill with
    /// a tertiary stroke.
    pub fn apply(&self, is_shadow: bool) -> Paint {
        if is_shadow {
            Paint {
                fill: self.secondary.clone(),
                stroke: None,
            }
        } else {
            Paint {
                fill: self.primary.clone(),
                stroke: Some(self.tertiary.clone()),
            }
        }
    }

    /// The primary shaded toward black.
    pub fn dark(&self) -> Result<String, ColourError> {
        colour::blend("#000000", &self.primary, DARK_SHADE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brick_core::id::BlockId;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_tints_are_derived_from_primary() {
        let colourer = Colourer::from_style(&BlockStyle::from_colour("#000000")).unwrap();
        assert_eq!(colourer.primary, "#000000");
        // 60% and 30% toward white.
        assert_eq!(colourer.secondary, "#999999");
        assert_eq!(colourer.tertiary, "#4d4d4d");
    }

    #[test]
    fn explicit_tints_win() {
        let style = BlockStyle {
            colour_primary: "#a55b80".into(),
            colour_secondary: Some("#ffffff".into()),
            colour_tertiary: Some("red".into()),
            hat: None,
        };
        let colourer = Colourer::from_style(&style).unwrap();
        assert_eq!(colourer.secondary, "#ffffff");
        assert_eq!(colourer.tertiary, "#ff0000");
    }

    #[test]
    fn shadow_and_normal_treatments() {
        let colourer = Colourer::from_style(&BlockStyle::from_colour("#336699")).unwrap();
        let normal = colourer.apply(false);
        assert_eq!(normal.fill, "#336699");
        assert_eq!(normal.stroke.as_deref(), Some(colourer.tertiary.as_str()));
        let shadow = colourer.apply(true);
        assert_eq!(shadow.fill, colourer.secondary);
        assert_eq!(shadow.stroke, None);
    }

    #[test]
    fn block_style_falls_back_to_a_literal_colour() {
        let theme = Theme::classic();
        let mut block = Block::new(BlockId::intern("c1"), "thing");
        block.style = "logic_blocks".into();
        let themed = Colourer::for_block(&theme, &block).unwrap();
        assert_eq!(themed.primary, colour::hue_to_hex(210.0));

        block.style = "#123456".into();
        assert_eq!(Colourer::for_block(&theme, &block).unwrap().primary, "#123456");

        block.style = "not a colour".into();
        assert_eq!(
            Colourer::for_block(&theme, &block),
            Err(RenderError::Colour(ColourError::InvalidColour("not a colour".into())))
        );
    }
}
