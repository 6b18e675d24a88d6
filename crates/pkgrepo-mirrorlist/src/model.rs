//! The parsed mirror list itself: an ordered list of [`MirrorEntry`].

use url::Url;

/// One mirror URL, in the order its source document listed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorEntry {
    /// The mirror's URL, already stripped of a trailing
    /// `repodata/repomd.xml` suffix.
    pub url: Url,
    /// The metalink `<resources>` `preference` attribute, when the source
    /// document is a metalink and declares one. Used only for ordering;
    /// selection policy is out of scope for this crate.
    pub preference: Option<u32>,
}

/// Which on-disk/wire format a mirror document was detected or declared as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorListFormat {
    /// Metalink XML (`<metalink>` document, content starts with `<`).
    Metalink,
    /// A JSON array of `{"url": ...}` objects, content starts with `[`.
    Json,
    /// Line-oriented plain text, one URL per line, `#`-prefixed comments
    /// allowed.
    Text,
}

impl MirrorListFormat {
    /// The file extension this format's cache file is named with.
    pub fn cache_extension(self) -> &'static str {
        match self {
            Self::Metalink => "xml",
            Self::Json => "json",
            Self::Text => "txt",
        }
    }

    /// Detect the format from the document's first non-whitespace byte.
    pub fn detect(content: &[u8]) -> Self {
        match content.iter().find(|b| !b.is_ascii_whitespace()) {
            Some(b'<') => Self::Metalink,
            Some(b'[') => Self::Json,
            _ => Self::Text,
        }
    }
}

/// An ordered mirror list, as produced by [`crate::parse::parse`] or
/// retrieved from the disk cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorList {
    pub entries: Vec<MirrorEntry>,
}

impl MirrorList {
    /// The URLs in list order, dropping [`MirrorEntry::preference`].
    pub fn urls(&self) -> Vec<Url> {
        self.entries.iter().map(|e| e.url.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
