//! Content-type-detected parsing of a mirror document.
//!
//! Grounded in `examples/original_source/zypp/repo/RepoMirrorList.cc`'s
//! `RepoMirrorListParseXML`/`...ParseJSON`/`...ParseTXT` trio: parse by
//! format, then apply the same post-filter to every format's output
//! (`rsync`/`cifs`/`smb` schemes dropped, a trailing
//! `repodata/repomd.xml` stripped from the path).

use url::Url;

use crate::model::{MirrorEntry, MirrorList, MirrorListFormat};

const DROPPED_SCHEMES: &[&str] = &["rsync", "cifs", "smb"];
const REPOMD_SUFFIX: &str = "repodata/repomd.xml";

/// Parse `content` as `format`, returning the filtered, ordered mirror
/// list. Parsing never fails outright — a malformed entry is dropped and
/// logged, matching the original's "ignore malformed urls" discipline;
/// only a structurally invalid JSON/XML *document* is reported as `Err`
/// (metalink: unparsable XML; JSON: top level not an array).
pub fn parse(content: &[u8], format: MirrorListFormat) -> Result<MirrorList, String> {
    let raw = match format {
        MirrorListFormat::Metalink => parse_metalink(content)?,
        MirrorListFormat::Json => parse_json(content)?,
        MirrorListFormat::Text => parse_text(content),
    };
    Ok(MirrorList {
        entries: raw.into_iter().filter_map(filter_entry).collect(),
    })
}

fn filter_entry(mut entry: MirrorEntry) -> Option<MirrorEntry> {
    if DROPPED_SCHEMES.contains(&entry.url.scheme()) {
        return None;
    }
    let path = entry.url.path();
    if let Some(pos) = path.find(REPOMD_SUFFIX) {
        let trimmed = &path[..pos];
        entry.url.set_path(trimmed);
    }
    Some(entry)
}

fn parse_text(content: &[u8]) -> Vec<MirrorEntry> {
    let text = String::from_utf8_lossy(content);
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| Url::parse(line).ok())
        .map(|url| MirrorEntry { url, preference: None })
        .collect()
}

fn parse_json(content: &[u8]) -> Result<Vec<MirrorEntry>, String> {
    let value: serde_json::Value =
        serde_json::from_slice(content).map_err(|e| format!("invalid JSON mirror list: {e}"))?;
    let array = value
        .as_array()
        .ok_or_else(|| "top level element must be a JSON array".to_string())?;

    let mut entries = Vec::new();
    for item in array {
        let Some(obj) = item.as_object() else {
            tracing::debug!("ignoring non-object JSON mirror list element");
            continue;
        };
        let Some(url_str) = obj.get("url").and_then(|v| v.as_str()) else {
            tracing::debug!("ignoring JSON mirror list element with no string \"url\"");
            continue;
        };
        match Url::parse(url_str) {
            Ok(url) => entries.push(MirrorEntry { url, preference: None }),
            Err(e) => tracing::debug!(url = url_str, error = %e, "ignoring invalid URL in JSON mirror list"),
        }
    }
    Ok(entries)
}

/// Minimal metalink4 (RFC 5854) parser: only the fields this core needs —
/// `<file>/<resources>/<url>` entries and each resource's `preference`
/// attribute.
fn parse_metalink(content: &[u8]) -> Result<Vec<MirrorEntry>, String> {
    let text = std::str::from_utf8(content).map_err(|e| format!("metalink is not valid UTF-8: {e}"))?;
    let doc = roxmltree::Document::parse(text).map_err(|e| format!("invalid metalink XML: {e}"))?;

    let mut entries = Vec::new();
    for url_node in doc
        .descendants()
        .filter(|n| n.has_tag_name("url") && n.parent().is_some_and(|p| p.has_tag_name("resources")))
    {
        let Some(text) = url_node.text() else {
            continue;
        };
        match Url::parse(text.trim()) {
            Ok(url) => {
                let preference = url_node
                    .attribute("preference")
                    .and_then(|v| v.parse::<u32>().ok());
                entries.push(MirrorEntry { url, preference });
            }
            Err(e) => tracing::debug!(url = text, error = %e, "ignoring invalid URL in metalink"),
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_format_by_first_byte() {
        assert_eq!(MirrorListFormat::detect(b"  <metalink>"), MirrorListFormat::Metalink);
        assert_eq!(MirrorListFormat::detect(b" [ {} ]"), MirrorListFormat::Json);
        assert_eq!(MirrorListFormat::detect(b"https://example.com/"), MirrorListFormat::Text);
    }

    #[test]
    fn json_drops_rsync_scheme_and_keeps_https() {
        let input = br#"[ {"url":"https://a/"}, {"url":"rsync://b/"} ]"#;
        let list = parse(input, MirrorListFormat::Json).unwrap();
        assert_eq!(list.urls(), vec![Url::parse("https://a/").unwrap()]);
    }

    #[test]
    fn json_top_level_must_be_an_array() {
        let input = br#"{"url":"https://a/"}"#;
        assert!(parse(input, MirrorListFormat::Json).is_err());
    }

    #[test]
    fn text_ignores_comments_and_blank_lines() {
        let input = b"# a comment\nhttps://a.example/\n\nhttps://b.example/\n";
        let list = parse(input, MirrorListFormat::Text).unwrap();
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn text_drops_cifs_and_smb() {
        let input = b"https://a.example/\ncifs://b.example/\nsmb://c.example/\n";
        let list = parse(input, MirrorListFormat::Text).unwrap();
        assert_eq!(list.urls(), vec![Url::parse("https://a.example/").unwrap()]);
    }

    #[test]
    fn strips_trailing_repomd_path() {
        let input = b"https://a.example/repo/repodata/repomd.xml\n";
        let list = parse(input, MirrorListFormat::Text).unwrap();
        assert_eq!(list.urls()[0].path(), "/repo/");
    }

    #[test]
    fn parses_metalink_resources_with_preference() {
        let xml = r#"<?xml version="1.0"?>
<metalink version="4.0">
  <files>
    <file name="repomd.xml">
      <resources>
        <url preference="90">https://mirror-a.example/repodata/repomd.xml</url>
        <url preference="50">https://mirror-b.example/repodata/repomd.xml</url>
      </resources>
    </file>
  </files>
</metalink>"#;
        let list = parse(xml.as_bytes(), MirrorListFormat::Metalink).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list.entries[0].preference, Some(90));
        assert_eq!(list.entries[0].url.path(), "/");
    }
}
