//! [`VerifyFileContext`]: the inputs/outputs struct threaded through the
//! signature verification workflow.

use std::path::PathBuf;

/// A user's decision when asked whether to trust a newly-seen key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustDecision {
    DontTrust,
    TrustTemporarily,
    TrustAndImport,
}

/// Inputs to the signature verification workflow: the file to verify, its
/// detached signature, and enough context to find or fetch the signing
/// key.
#[derive(Debug, Clone)]
pub struct VerifyFileContext {
    /// Path to the content being verified, for reporting.
    pub file: PathBuf,
    /// Path to the detached signature sidecar, for reporting.
    pub signature: PathBuf,
    /// Short human-readable description of what is being verified (e.g.
    /// "repomd.xml" or a repo alias), surfaced in prompts.
    pub short_description: String,
    /// Alias of the repository this verification is for, if any. Used to
    /// resolve `gpgKeyUrls`/pubkey cache through a `KeyContext`
    /// implementation without this crate depending on repo metadata
    /// directly.
    pub repo_alias: Option<String>,
    /// Additional key ids (from `gpgkey=` lines or elsewhere) that are
    /// candidates for the auto-import-buddies step.
    pub buddy_keys: Vec<String>,

    /// Output: the signing key id read from the signature, once known.
    pub signature_id: Option<String>,
    /// Output: whether `signature_id` resolved to a key in the trusted
    /// ring.
    pub signature_id_trusted: bool,
    /// Output: whether the signature bytes verified against the resolved
    /// key.
    pub file_validated: bool,
    /// Output: whether a signing key was found at all, whether already
    /// trusted, fetched via a `KeyContext`, or accepted ad hoc by the user.
    /// `false` means verification never got past "no key available".
    pub key_found: bool,
    /// Output: whether the overall result is accepted (possibly because
    /// the user chose to proceed despite a failure).
    pub file_accepted: bool,
}

impl VerifyFileContext {
    /// Build a fresh context, with all outputs reset.
    pub fn new(
        file: impl Into<PathBuf>,
        signature: impl Into<PathBuf>,
        short_description: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            signature: signature.into(),
            short_description: short_description.into(),
            repo_alias: None,
            buddy_keys: Vec::new(),
            signature_id: None,
            signature_id_trusted: false,
            file_validated: false,
            key_found: false,
            file_accepted: false,
        }
    }

    /// Attach a repo alias, for `provideAndImportKeyFromRepository`.
    pub fn with_repo_alias(mut self, alias: impl Into<String>) -> Self {
        self.repo_alias = Some(alias.into());
        self
    }

    /// Attach candidate buddy key ids.
    pub fn with_buddy_keys(mut self, buddy_keys: Vec<String>) -> Self {
        self.buddy_keys = buddy_keys;
        self
    }

    /// Reset all output fields, keeping inputs intact.
    pub fn reset_results(&mut self) {
        self.signature_id = None;
        self.signature_id_trusted = false;
        self.file_validated = false;
        self.key_found = false;
        self.file_accepted = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_results_clears_outputs_only() {
        let mut ctx = VerifyFileContext::new("repomd.xml", "repomd.xml.asc", "repomd.xml");
        ctx.signature_id = Some("abc".to_string());
        ctx.file_validated = true;
        ctx.reset_results();
        assert!(ctx.signature_id.is_none());
        assert!(!ctx.file_validated);
        assert_eq!(ctx.short_description, "repomd.xml");
    }
}
