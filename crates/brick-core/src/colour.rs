//! Colour parsing and blending.
//!
//! Colours are normalized to lowercase `#rrggbb`. Block colours may also be
//! given as a hue in degrees, converted through a fixed saturation/value.

use crate::error::ColourError;

/// Saturation applied to hue-specified block colours.
pub const HSV_SATURATION: f64 = 0.45;
/// Value (brightness) applied to hue-specified block colours.
pub const HSV_VALUE: f64 = 0.65;

const NAMED: &[(&str, &str)] = &[
    ("aqua", "#00ffff"),
    ("black", "#000000"),
    ("blue", "#0000ff"),
    ("fuchsia", "#ff00ff"),
    ("gray", "#808080"),
    ("green", "#008000"),
    ("lime", "#00ff00"),
    ("maroon", "#800000"),
    ("navy", "#000080"),
    ("olive", "#808000"),
    ("purple", "#800080"),
    ("red", "#ff0000"),
    ("silver", "#c0c0c0"),
    ("teal", "#008080"),
    ("white", "#ffffff"),
    ("yellow", "#ffff00"),
];

/// Parse a literal colour: `#rrggbb`, `#rgb`, `0xrrggbb`, `rgb(r, g, b)`,
/// or a basic named colour.
pub fn parse(value: &str) -> Result<String, ColourError> {
    let invalid = || ColourError::InvalidColour(value.to_string());
    let s = value.trim().to_ascii_lowercase();

    if let Some((_, hex)) = NAMED.iter().find(|(name, _)| *name == s) {
        return Ok((*hex).to_string());
    }

    let hex = s
        .strip_prefix('#')
        .or_else(|| s.strip_prefix("0x"))
        .unwrap_or(&s);
    if hex.chars().all(|c| c.is_ascii_hexdigit()) {
        match hex.len() {
            6 => return Ok(format!("#{hex}")),
            3 => {
                let mut out = String::from("#");
                for c in hex.chars() {
                    out.push(c);
                    out.push(c);
                }
                return Ok(out);
            }
            _ => {}
        }
    }

    if let Some(inner) = s.strip_prefix("rgb(").and_then(|r| r.strip_suffix(')')) {
        let parts: Vec<u8> = inner
            .split(',')
            .map(|p| p.trim().parse::<u8>())
            .collect::<Result<_, _>>()
            .map_err(|_| invalid())?;
        if let [r, g, b] = parts[..] {
            return Ok(rgb_to_hex(r, g, b));
        }
    }

    Err(invalid())
}

/// Parse a block colour: either a hue in `0..=360` or a literal colour.
pub fn parse_block_colour(value: &str) -> Result<String, ColourError> {
    let trimmed = value.trim();
    if let Ok(hue) = trimmed.parse::<f64>() {
        if (0.0..=360.0).contains(&hue) {
            return Ok(hue_to_hex(hue));
        }
        return Err(ColourError::InvalidColour(value.to_string()));
    }
    parse(value)
}

/// Hue in degrees → hex with the fixed block saturation and value.
pub fn hue_to_hex(hue: f64) -> String {
    hsv_to_hex(hue, HSV_SATURATION, HSV_VALUE * 255.0)
}

/// HSV → hex. `v` is in `0..=255`.
pub fn hsv_to_hex(h: f64, s: f64, v: f64) -> String {
    let (r, g, b) = if s == 0.0 {
        (v, v, v)
    } else {
        let sextant = (h / 60.0).floor();
        let remainder = h / 60.0 - sextant;
        let val1 = v * (1.0 - s);
        let val2 = v * (1.0 - s * remainder);
        let val3 = v * (1.0 - s * (1.0 - remainder));
        match sextant as i64 {
            1 => (val2, v, val1),
            2 => (val1, v, val3),
            3 => (val1, val2, v),
            4 => (val3, val1, v),
            5 => (v, val1, val2),
            _ => (v, val3, val1),
        }
    };
    rgb_to_hex(r.floor() as u8, g.floor() as u8, b.floor() as u8)
}

pub fn rgb_to_hex(r: u8, g: u8, b: u8) -> String {
    format!("#{r:02x}{g:02x}{b:02x}")
}

/// Parse any literal colour into its channels.
pub fn hex_to_rgb(value: &str) -> Result<(u8, u8, u8), ColourError> {
    let hex = parse(value)?;
    let channel = |i: usize| {
        u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| ColourError::InvalidColour(value.to_string()))
    };
    Ok((channel(1)?, channel(3)?, channel(5)?))
}

/// Mix `colour1` into `colour2`. `factor` 1.0 yields `colour1`,
/// 0.0 yields `colour2`.
pub fn blend(colour1: &str, colour2: &str, factor: f64) -> Result<String, ColourError> {
    let (r1, g1, b1) = hex_to_rgb(colour1)?;
    let (r2, g2, b2) = hex_to_rgb(colour2)?;
    let mix = |a: u8, b: u8| (b as f64 + factor * (a as f64 - b as f64)).round() as u8;
    Ok(rgb_to_hex(mix(r1, r2), mix(g1, g2), mix(b1, b2)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn hue_matches_classic_palette() {
        assert_eq!(hue_to_hex(210.0), "#5b80a5");
        assert_eq!(hue_to_hex(120.0), "#5ba55b");
        assert_eq!(hue_to_hex(230.0), "#5b67a5");
    }

    #[test]
    fn literal_forms() {
        assert_eq!(parse("#FF0000").unwrap(), "#ff0000");
        assert_eq!(parse("#f00").unwrap(), "#ff0000");
        assert_eq!(parse("0x00ff00").unwrap(), "#00ff00");
        assert_eq!(parse("rgb(0, 0, 255)").unwrap(), "#0000ff");
        assert_eq!(parse("Navy").unwrap(), "#000080");
    }

    #[test]
    fn invalid_colour_names_the_value() {
        let err = parse_block_colour("not-a-colour").unwrap_err();
        assert_eq!(err.to_string(), "invalid colour: 'not-a-colour'");
        assert!(parse_block_colour("400").is_err());
        assert!(parse("#12345").is_err());
    }

    #[test]
    fn blend_endpoints() {
        assert_eq!(blend("#ffffff", "#000000", 1.0).unwrap(), "#ffffff");
        assert_eq!(blend("#ffffff", "#000000", 0.0).unwrap(), "#000000");
        assert_eq!(blend("#ffffff", "#5b80a5", 0.6).unwrap(), "#bdccdb");
    }
}
