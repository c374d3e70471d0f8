//! Parser for the persisted XML text → `XmlElement`.
//!
//! Built on `winnow` 0.7. Handles the prolog, comments, CDATA, both quote
//! styles, and the predefined plus numeric character entities.

use crate::dom::{XmlElement, XmlNode};
use crate::error::XmlError;
use winnow::combinator::{alt, cut_err, delimited, fail};
use winnow::error::{StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::{take_till, take_until, take_while};

/// Parse XML text into its root element.
pub fn parse_xml(input: &str) -> Result<XmlElement, XmlError> {
    let mut rest = input;
    let offset = |rest: &str| input.len() - rest.len();

    skip_misc(&mut rest).map_err(|e| XmlError::Parse {
        offset: offset(rest),
        message: e.to_string(),
    })?;
    if rest.is_empty() {
        return Err(XmlError::Parse {
            offset: 0,
            message: "document has no root element".to_string(),
        });
    }
    let root = parse_element.parse_next(&mut rest).map_err(|e| XmlError::Parse {
        offset: offset(rest),
        message: e.to_string(),
    })?;
    skip_misc(&mut rest).map_err(|e| XmlError::Parse {
        offset: offset(rest),
        message: e.to_string(),
    })?;
    if !rest.is_empty() {
        return Err(XmlError::Parse {
            offset: offset(rest),
            message: "unexpected content after the root element".to_string(),
        });
    }
    Ok(root)
}

// ─── Low-level parsers ──────────────────────────────────────────────────

fn skip_ws(input: &mut &str) {
    *input = input.trim_start();
}

/// Skip whitespace, `<?...?>` declarations, `<!DOCTYPE ...>`, and comments.
fn skip_misc(input: &mut &str) -> ModalResult<()> {
    loop {
        skip_ws(input);
        if input.starts_with("<?") {
            let _ = delimited("<?", take_until(0.., "?>"), "?>").parse_next(input)?;
        } else if input.starts_with("<!--") {
            skip_comment(input)?;
        } else if input.starts_with("<!") {
            let _ = delimited("<!", take_till(0.., '>'), '>').parse_next(input)?;
        } else {
            return Ok(());
        }
    }
}

fn skip_comment(input: &mut &str) -> ModalResult<()> {
    let _ = delimited(
        "<!--",
        take_until(0.., "-->"),
        cut_err("-->").context(StrContext::Expected(StrContextValue::StringLiteral("-->"))),
    )
    .parse_next(input)?;
    Ok(())
}

fn parse_name<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    take_while(1.., |c: char| {
        c.is_alphanumeric() || matches!(c, '_' | '-' | ':' | '.')
    })
    .context(StrContext::Label("name"))
    .parse_next(input)
}

fn parse_quoted<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    alt((
        delimited('"', take_till(0.., '"'), '"'),
        delimited('\'', take_till(0.., '\''), '\''),
    ))
    .context(StrContext::Label("attribute value"))
    .parse_next(input)
}

fn parse_attribute(input: &mut &str) -> ModalResult<(String, String)> {
    let key = parse_name.parse_next(input)?;
    skip_ws(input);
    let _ = cut_err('=')
        .context(StrContext::Expected(StrContextValue::CharLiteral('=')))
        .parse_next(input)?;
    skip_ws(input);
    let raw = cut_err(parse_quoted).parse_next(input)?;
    let Some(value) = unescape(raw) else {
        return bad_entity(input);
    };
    Ok((key.to_string(), value))
}

fn parse_element(input: &mut &str) -> ModalResult<XmlElement> {
    let _ = '<'.parse_next(input)?;
    let name = parse_name.parse_next(input)?;
    let mut el = XmlElement::new(name);

    loop {
        skip_ws(input);
        if let Some(rest) = input.strip_prefix("/>") {
            *input = rest;
            return Ok(el);
        }
        if let Some(rest) = input.strip_prefix('>') {
            *input = rest;
            break;
        }
        let attr = cut_err(parse_attribute).parse_next(input)?;
        el.attributes.push(attr);
    }

    loop {
        if input.starts_with("</") {
            let _ = "</".parse_next(input)?;
            let close = parse_name.parse_next(input)?;
            if close != el.name {
                return cut_err(fail.context(StrContext::Label("matching closing tag")))
                    .parse_next(input);
            }
            skip_ws(input);
            let _ = cut_err('>')
                .context(StrContext::Expected(StrContextValue::CharLiteral('>')))
                .parse_next(input)?;
            drop_layout_whitespace(&mut el);
            return Ok(el);
        }
        if input.starts_with("<!--") {
            skip_comment(input)?;
            continue;
        }
        if input.starts_with("<![CDATA[") {
            let raw = delimited("<![CDATA[", take_until(0.., "]]>"), "]]>").parse_next(input)?;
            el.children.push(XmlNode::Text(raw.to_string()));
            continue;
        }
        if input.starts_with('<') {
            let child = parse_element.parse_next(input)?;
            el.children.push(XmlNode::Element(child));
            continue;
        }
        if input.is_empty() {
            return cut_err(fail.context(StrContext::Label("closing tag"))).parse_next(input);
        }
        let raw = take_till(1.., '<').parse_next(input)?;
        let Some(text) = unescape(raw) else {
            return bad_entity(input);
        };
        el.children.push(XmlNode::Text(text));
    }
}

/// Whitespace between child elements is layout, not content. An element
/// with only text keeps it verbatim so `<field> </field>` survives.
fn drop_layout_whitespace(el: &mut XmlElement) {
    let has_elements = el.children.iter().any(|c| matches!(c, XmlNode::Element(_)));
    if has_elements {
        el.children
            .retain(|c| !matches!(c, XmlNode::Text(t) if t.trim().is_empty()));
    }
}

fn bad_entity<O>(input: &mut &str) -> ModalResult<O> {
    cut_err(fail.context(StrContext::Label("character entity"))).parse_next(input)
}

/// Decode the predefined entities and `&#N;` / `&#xN;` references.
fn unescape(raw: &str) -> Option<String> {
    if !raw.contains('&') {
        return Some(raw.to_string());
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos + 1..];
        let end = rest.find(';')?;
        let entity = &rest[..end];
        let ch = match entity {
            "lt" => '<',
            "gt" => '>',
            "amp" => '&',
            "quot" => '"',
            "apos" => '\'',
            _ => {
                let code = if let Some(hex) = entity.strip_prefix("#x").or(entity.strip_prefix("#X")) {
                    u32::from_str_radix(hex, 16).ok()?
                } else if let Some(dec) = entity.strip_prefix('#') {
                    dec.parse::<u32>().ok()?
                } else {
                    return None;
                };
                char::from_u32(code)?
            }
        };
        out.push(ch);
        rest = &rest[end + 1..];
    }
    out.push_str(rest);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_nested_blocks() {
        let xml = r#"<?xml version="1.0"?>
            <xml xmlns="https://developers.google.com/blockly/xml">
              <!-- a comment -->
              <block type="text_print" id="p1" x="10" y="20">
                <value name="TEXT">
                  <block type="text"><field name="TEXT">hi &amp; bye</field></block>
                </value>
              </block>
            </xml>"#;
        let root = parse_xml(xml).unwrap();
        assert_eq!(root.name, "xml");
        let block = root.child("block").unwrap();
        assert_eq!(block.attr("id"), Some("p1"));
        assert_eq!(block.elements().count(), 1);
        let field = block
            .child("value")
            .and_then(|v| v.child("block"))
            .and_then(|b| b.child("field"))
            .unwrap();
        assert_eq!(field.text(), "hi & bye");
    }

    #[test]
    fn whitespace_only_field_text_is_kept() {
        let root = parse_xml("<field name='T'> </field>").unwrap();
        assert_eq!(root.text(), " ");
    }

    #[test]
    fn numeric_entities() {
        let root = parse_xml("<f>&#65;&#x42;</f>").unwrap();
        assert_eq!(root.text(), "AB");
    }

    #[test]
    fn mismatched_close_is_an_error() {
        let err = parse_xml("<xml><block></xml>").unwrap_err();
        assert!(matches!(err, XmlError::Parse { .. }));
    }

    #[test]
    fn trailing_garbage_is_an_error() {
        let err = parse_xml("<xml/><xml/>").unwrap_err();
        assert!(err.to_string().contains("after the root element"));
    }

    #[test]
    fn emit_then_parse_preserves_tree() {
        let src = r#"<block type="text" id="t1"><field name="TEXT">"quoted" &lt;tag&gt;</field></block>"#;
        let parsed = parse_xml(src).unwrap();
        assert_eq!(parse_xml(&parsed.to_xml_string()).unwrap(), parsed);
    }
}
