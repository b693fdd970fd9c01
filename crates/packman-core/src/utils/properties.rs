//! Reader for the XML form of Java properties files.
//!
//! Package metadata is stored as
//! `<properties><entry key="name">value</entry>...</properties>`.
//! Only the flat key/value entries are of interest here.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{PackmanError, PackmanResult};

static ROOT: Lazy<Regex> = Lazy::new(|| Regex::new(r"<properties(\s[^>]*)?>").unwrap());

/// An `<entry>` element: its attributes, then its content unless self-closing.
/// CDATA sections are skipped whole so they may contain `</entry>`.
static ENTRY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<entry\b([^>]*?)(?:/>|>((?:<!\[CDATA\[.*?\]\]>|.)*?)</entry>)").unwrap()
});

static KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?:^|\s)key\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap());

static COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());

/// Parse a properties XML document into a key/value map.
///
/// Later entries override earlier ones with the same key.
pub fn parse_properties_xml(xml: &str) -> PackmanResult<HashMap<String, String>> {
    let xml = COMMENT.replace_all(xml, "");
    if !ROOT.is_match(&xml) {
        return Err(PackmanError::Archive {
            message: "properties document has no <properties> root element".to_string(),
            source: None,
        });
    }

    let mut props = HashMap::new();
    for caps in ENTRY.captures_iter(&xml) {
        let attributes = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let Some(key) = KEY.captures(attributes) else {
            continue;
        };
        let key = key
            .get(1)
            .or_else(|| key.get(2))
            .map(|m| unescape(m.as_str()))
            .unwrap_or_default();
        let value = caps.get(2).map(|m| unescape(m.as_str())).unwrap_or_default();
        props.insert(key, value);
    }
    Ok(props)
}

/// Resolve the predefined XML entities, character references and CDATA sections
fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(pos) = rest.find(['&', '<']) {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];

        if let Some(cdata) = rest.strip_prefix("<![CDATA[") {
            match cdata.find("]]>") {
                Some(end) => {
                    out.push_str(&cdata[..end]);
                    rest = &cdata[end + 3..];
                }
                None => {
                    out.push_str(cdata);
                    rest = "";
                }
            }
            continue;
        }

        if rest.starts_with('<') {
            out.push('<');
            rest = &rest[1..];
            continue;
        }

        let Some(end) = rest.find(';') else {
            out.push_str(rest);
            rest = "";
            break;
        };
        let entity = &rest[1..end];
        let resolved = match entity {
            "lt" => Some('<'),
            "gt" => Some('>'),
            "amp" => Some('&'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                .and_then(char::from_u32),
        };
        match resolved {
            Some(c) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }

    out.push_str(rest);
    out
}
