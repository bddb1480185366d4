//! Derived-metadata extraction: front-matter, wiki links, tags.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::document::DerivedMetadata;

fn link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // [[target]], [[target|alias]], [[target#heading]]
    RE.get_or_init(|| Regex::new(r"\[\[([^\]\|#]+)(?:[^\]]*)\]\]").unwrap())
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // #tag tokens: start of line or whitespace, then # + word chars (with / nesting)
    RE.get_or_init(|| Regex::new(r"(?:^|\s)#([A-Za-z][\w/-]*)").unwrap())
}

/// Extract all derived metadata from a document body.
pub fn extract(body: &str) -> DerivedMetadata {
    let (frontmatter, rest) = split_frontmatter(body);
    let mut meta = DerivedMetadata {
        frontmatter: frontmatter.map(parse_frontmatter).unwrap_or_default(),
        links: Vec::new(),
        tags: Vec::new(),
    };

    for caps in link_re().captures_iter(rest) {
        let target = caps[1].trim().to_string();
        if !target.is_empty() && !meta.links.contains(&target) {
            meta.links.push(target);
        }
    }

    for caps in tag_re().captures_iter(rest) {
        let tag = caps[1].to_string();
        if !meta.tags.contains(&tag) {
            meta.tags.push(tag);
        }
    }

    // Front-matter `tags:` entries count as tags too.
    if let Some(fm_tags) = meta.frontmatter.get("tags") {
        let listed: Vec<String> = match fm_tags {
            serde_json::Value::Array(items) => items
                .iter()
                .filter_map(|v| v.as_str().map(|s| s.trim_start_matches('#').to_string()))
                .collect(),
            serde_json::Value::String(s) => s
                .split(',')
                .map(|t| t.trim().trim_start_matches('#').to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            _ => Vec::new(),
        };
        for tag in listed {
            if !meta.tags.contains(&tag) {
                meta.tags.push(tag);
            }
        }
    }

    meta
}

/// Split a body into `(frontmatter_yaml, remainder)`. Front matter must
/// start at the first line with `---` and be closed by a `---` line.
fn split_frontmatter(body: &str) -> (Option<&str>, &str) {
    let Some(after_open) = body.strip_prefix("---\n").or_else(|| body.strip_prefix("---\r\n"))
    else {
        return (None, body);
    };
    for marker in ["\n---\n", "\n---\r\n"] {
        if let Some(end) = after_open.find(marker) {
            return (
                Some(&after_open[..end]),
                &after_open[end + marker.len()..],
            );
        }
    }
    // Closing fence at end of body without trailing newline
    if let Some(yaml) = after_open.strip_suffix("\n---") {
        return (Some(yaml), "");
    }
    (None, body)
}

fn parse_frontmatter(yaml: &str) -> BTreeMap<String, serde_json::Value> {
    match serde_yaml::from_str::<BTreeMap<String, serde_json::Value>>(yaml) {
        Ok(map) => map,
        Err(e) => {
            tracing::debug!("unparseable front matter ignored: {}", e);
            BTreeMap::new()
        }
    }
}
