//! A small, purpose-built `.repo`/`.service` INI codec.
//!
//! This is not a general INI parser: it implements exactly the dialect
//! libzypp's `.repo`/`.service` files use — `[alias]` sections, `key = value`
//! pairs, `#`/`;` comment lines, and multi-line values continued by
//! indenting the following line(s) (used for multi-URL `baseurl=` and
//! `gpgkey=` entries). A generic INI crate would accept dialects this format
//! does not (e.g. `key: value`) and silently diverge from what the rest of
//! the ecosystem (and every existing `.repo` file on disk) expects.

use std::collections::BTreeMap;

/// One `[alias]` section: its name plus an ordered list of `key = value`
/// pairs (order preserved so round-tripping a hand-edited file does not
/// needlessly reorder it).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IniSection {
    pub name: String,
    pub entries: Vec<(String, String)>,
}

impl IniSection {
    /// First value for `key`, if present. When a key appears more than
    /// once, the last occurrence wins (matches libzypp's `std::map`-based
    /// INI reader).
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All values for `key` in file order, splitting multi-line entries on
    /// newlines (libzypp's convention for repeated-URL keys such as
    /// `baseurl=`/`gpgkey=`).
    pub fn get_all(&self, key: &str) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(k, _)| k == key)
            .flat_map(|(_, v)| v.lines().map(str::to_string))
            .filter(|line| !line.trim().is_empty())
            .collect()
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push((key.into(), value.into()));
    }

    /// Push a multi-valued key as one continuation-joined entry, skipped
    /// entirely when `values` is empty.
    pub fn push_multi(&mut self, key: impl Into<String>, values: &[String]) {
        if values.is_empty() {
            return;
        }
        self.entries.push((key.into(), values.join("\n")));
    }
}

/// Parse an INI document into its sections, in file order.
///
/// Lines are classified as: comments (`#`/`;` as the first non-whitespace
/// character), a section header (`[name]`), a `key = value` / `key: value`
/// pair, or — if indented and a key is already open — a continuation of
/// that key's value.
pub fn parse(text: &str) -> Vec<IniSection> {
    let mut sections: Vec<IniSection> = Vec::new();
    let mut current_key: Option<String> = None;

    for raw_line in text.lines() {
        if raw_line.trim().is_empty() {
            current_key = None;
            continue;
        }
        let is_continuation = raw_line.starts_with(' ') || raw_line.starts_with('\t');
        let trimmed = raw_line.trim();

        if trimmed.starts_with('#') || trimmed.starts_with(';') {
            continue;
        }

        if is_continuation {
            if let (Some(key), Some(section)) = (&current_key, sections.last_mut()) {
                if let Some(last) = section.entries.iter_mut().rev().find(|(k, _)| k == key) {
                    last.1.push('\n');
                    last.1.push_str(trimmed);
                    continue;
                }
            }
            // Continuation with no open key: ignore the stray line.
            continue;
        }

        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            sections.push(IniSection {
                name: trimmed[1..trimmed.len() - 1].to_string(),
                entries: Vec::new(),
            });
            current_key = None;
            continue;
        }

        let Some(section) = sections.last_mut() else {
            // Entries before any `[section]` header have no home; skip.
            continue;
        };

        if let Some((key, value)) = split_key_value(trimmed) {
            section.push(key.trim(), value.trim());
            current_key = Some(key.trim().to_string());
        }
    }

    sections
}

fn split_key_value(line: &str) -> Option<(&str, &str)> {
    let eq = line.find('=');
    let colon = line.find(':');
    let idx = match (eq, colon) {
        (Some(e), Some(c)) => e.min(c),
        (Some(e), None) => e,
        (None, Some(c)) => c,
        (None, None) => return None,
    };
    Some((&line[..idx], &line[idx + 1..]))
}

/// Render sections back into `.repo`/`.service` file text. Multi-line
/// values are re-wrapped with a single leading space of indentation on
/// continuation lines, matching libzypp's writer.
pub fn write(sections: &[IniSection]) -> String {
    let mut out = String::new();
    for section in sections {
        out.push('[');
        out.push_str(&section.name);
        out.push_str("]\n");
        for (key, value) in &section.entries {
            let mut lines = value.lines();
            if let Some(first) = lines.next() {
                out.push_str(key);
                out.push_str(" = ");
                out.push_str(first);
                out.push('\n');
            } else {
                out.push_str(key);
                out.push_str(" = \n");
            }
            for cont in lines {
                out.push(' ');
                out.push_str(cont);
                out.push('\n');
            }
        }
        out.push('\n');
    }
    out
}

/// Index sections by name for `O(log n)` alias lookup, keeping the last
/// occurrence of a duplicated alias (matches libzypp's tolerant re-read of
/// hand-edited files with a repeated section).
pub fn index_by_name(sections: Vec<IniSection>) -> BTreeMap<String, IniSection> {
    let mut map = BTreeMap::new();
    for section in sections {
        map.insert(section.name.clone(), section);
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_basic_section() {
        let text = "[oss]\nname = OSS\nenabled = 1\n";
        let sections = parse(text);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].name, "oss");
        assert_eq!(sections[0].get("name"), Some("OSS"));
        assert_eq!(sections[0].get("enabled"), Some("1"));
    }

    #[test]
    fn joins_continuation_lines() {
        let text = "[oss]\nbaseurl = https://a.example/repo\n  https://b.example/repo\n";
        let sections = parse(text);
        let urls = sections[0].get_all("baseurl");
        assert_eq!(
            urls,
            vec![
                "https://a.example/repo".to_string(),
                "https://b.example/repo".to_string()
            ]
        );
    }

    #[test]
    fn ignores_comments_and_blank_lines() {
        let text = "# a comment\n[oss]\n; another comment\nname = OSS\n\n";
        let sections = parse(text);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].entries.len(), 1);
    }

    #[test]
    fn round_trips_multi_value_entries() {
        let mut section = IniSection {
            name: "oss".to_string(),
            entries: Vec::new(),
        };
        section.push_multi(
            "baseurl",
            &["https://a.example".to_string(), "https://b.example".to_string()],
        );
        let text = write(&[section]);
        let reparsed = parse(&text);
        assert_eq!(
            reparsed[0].get_all("baseurl"),
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
    }

    #[test]
    fn last_entry_wins_on_duplicate_key() {
        let text = "[oss]\nenabled = 1\nenabled = 0\n";
        let sections = parse(text);
        assert_eq!(sections[0].get("enabled"), Some("0"));
    }
}
