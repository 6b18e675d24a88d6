//! User-facing prompts and progress reporting.
//!
//! This crate never talks to a terminal directly — it calls named methods
//! on a [`Reporter`] trait object supplied by whatever front end embeds it.
//! This mirrors libzypp's `UserInterface`/`callback` split: the library
//! asks a question, the application decides how (or whether) to ask the
//! human.

use std::fmt;

/// What the keyring/signature workflow is asking the user to decide about
/// an unsigned repository file.
#[derive(Debug, Clone)]
pub struct UnsignedFilePrompt {
    pub repo_alias: String,
    pub file_name: String,
}

/// What the keyring workflow is asking about a key it does not yet trust.
#[derive(Debug, Clone)]
pub struct UntrustedKeyPrompt {
    pub repo_alias: String,
    pub key_id: String,
    pub key_name: String,
    pub key_fingerprint: String,
}

/// A key that was imported automatically because the repository is
/// configured to trust keys on first use without asking.
#[derive(Debug, Clone)]
pub struct AutoImportedKey {
    pub repo_alias: String,
    pub key_id: String,
    pub key_fingerprint: String,
}

/// A signature that failed verification outright (not merely unsigned or
/// untrusted — the signature bytes did not match).
#[derive(Debug, Clone)]
pub struct VerificationFailedPrompt {
    pub repo_alias: String,
    pub file_name: String,
    pub key_id: Option<String>,
}

/// A signed file whose key is entirely unknown (no key id recognized).
#[derive(Debug, Clone)]
pub struct UnknownKeyPrompt {
    pub repo_alias: String,
    pub file_name: String,
    pub key_id: String,
}

/// A package whose signing key differs from the repository metadata's
/// signing key.
#[derive(Debug, Clone)]
pub struct PackageKeyPrompt {
    pub repo_alias: String,
    pub package_name: String,
    pub key_id: String,
}

/// The three answers allowed when a key is known to the general ring but
/// not yet trusted: decline outright, trust it for this session only, or
/// trust it and import it into the trusted ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTrustDecision {
    /// Reject the key; the file it signed is not accepted.
    DontTrust,
    /// Trust the key for this single verification, without persisting it
    /// into the trusted ring.
    TrustTemporarily,
    /// Trust the key and import it into the trusted ring so future
    /// verifications succeed without asking again.
    TrustAndImport,
}

impl KeyTrustDecision {
    /// Whether this decision allows the current verification to proceed
    /// (either of the two "trust" answers).
    pub fn trusts(self) -> bool {
        !matches!(self, Self::DontTrust)
    }
}

/// A generic problem report that does not fit one of the named prompts
/// above.
#[derive(Debug, Clone)]
pub struct Problem {
    pub summary: String,
    pub detail: Option<String>,
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{}: {}", self.summary, detail),
            None => f.write_str(&self.summary),
        }
    }
}

/// The three ways a [`Problem`] can be resolved. Distinct from a plain
/// `bool`: `Ignore` accepts the underlying (possibly insecure) file as-is,
/// while `Abort` is a hard stop that should surface as a user-cancellation
/// error rather than a plain rejection, and `Retry` asks the caller to redo
/// whatever produced the problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProblemResponse {
    /// Redo the operation that ran into the problem.
    Retry,
    /// Proceed despite the problem, accepting the file or result as-is.
    Ignore,
    /// Stop outright; the caller should treat this as a user cancellation.
    Abort,
}

/// Asks the user to make decisions during repository/key/package workflows.
///
/// Every method returns a plain `bool` ("proceed anyway?" / "trust this
/// key?"); a front end that cannot ask (non-interactive, or running
/// unattended) answers through a fixed policy rather than blocking, which
/// is exactly what [`NonInteractiveReporter`] does.
pub trait Reporter: Send + Sync {
    /// Ask whether to proceed despite an entirely unsigned repository
    /// file. Returns `true` to proceed.
    fn ask_user_to_accept_unsigned_file(&self, prompt: &UnsignedFilePrompt) -> bool;

    /// Ask whether, and how, to trust a key known to the general ring but
    /// not yet trusted.
    fn ask_user_to_accept_key(&self, prompt: &UntrustedKeyPrompt) -> KeyTrustDecision;

    /// Inform the user a key was imported automatically; no decision
    /// required.
    fn report_auto_import_key(&self, info: &AutoImportedKey);

    /// Ask whether to proceed despite a signature that failed verification
    /// outright. Returns `true` to proceed anyway.
    fn ask_user_to_accept_verification_failed(&self, prompt: &VerificationFailedPrompt) -> bool;

    /// Ask whether to proceed despite a signature from a completely
    /// unrecognized key. Returns `true` to proceed anyway.
    fn ask_user_to_accept_unknown_key(&self, prompt: &UnknownKeyPrompt) -> bool;

    /// Ask whether to accept a package signed by a key other than the
    /// repository's own signing key. Returns `true` to accept.
    fn ask_user_to_accept_package_key(&self, prompt: &PackageKeyPrompt) -> bool;

    /// Ask whether to retry a failed retrieval attempt. Returns `true` to
    /// retry.
    fn ask_to_retry_retrieval(&self, detail: &str) -> bool;

    /// Report a problem that doesn't fit one of the named prompts, and ask
    /// how to proceed.
    fn problem(&self, problem: &Problem) -> ProblemResponse;
}

/// Observes long-running operation progress (downloads, cache builds,
/// refreshes). Percentage is `0..=100`; implementors that don't render a
/// progress bar can ignore it entirely.
pub trait ProgressObserver: Send + Sync {
    /// A named stage of work has started (e.g. "downloading repomd.xml").
    fn start(&self, task: &str);
    /// Progress within the current stage.
    fn progress(&self, percent: u8);
    /// The current stage finished.
    fn finish(&self, task: &str);
}

/// A [`Reporter`] for unattended/scripted runs: answers every prompt with a
/// fixed, conservative policy and logs everything through `tracing` instead
/// of asking. Auto-import is refused, unsigned/unverified/unknown-key
/// content is refused, and retries are allowed up to the caller's own
/// retry-count logic (this reporter always says yes to a retry — giving up
/// is the caller's decision, not the reporter's).
#[derive(Debug, Clone, Copy, Default)]
pub struct NonInteractiveReporter;

impl Reporter for NonInteractiveReporter {
    fn ask_user_to_accept_unsigned_file(&self, prompt: &UnsignedFilePrompt) -> bool {
        tracing::warn!(repo = %prompt.repo_alias, file = %prompt.file_name, "refusing unsigned file (non-interactive)");
        false
    }

    fn ask_user_to_accept_key(&self, prompt: &UntrustedKeyPrompt) -> KeyTrustDecision {
        tracing::warn!(repo = %prompt.repo_alias, key_id = %prompt.key_id, "refusing untrusted key (non-interactive)");
        KeyTrustDecision::DontTrust
    }

    fn report_auto_import_key(&self, info: &AutoImportedKey) {
        tracing::info!(repo = %info.repo_alias, key_id = %info.key_id, "key imported automatically");
    }

    fn ask_user_to_accept_verification_failed(&self, prompt: &VerificationFailedPrompt) -> bool {
        tracing::error!(repo = %prompt.repo_alias, file = %prompt.file_name, "refusing failed signature verification (non-interactive)");
        false
    }

    fn ask_user_to_accept_unknown_key(&self, prompt: &UnknownKeyPrompt) -> bool {
        tracing::warn!(repo = %prompt.repo_alias, key_id = %prompt.key_id, "refusing unknown key (non-interactive)");
        false
    }

    fn ask_user_to_accept_package_key(&self, prompt: &PackageKeyPrompt) -> bool {
        tracing::warn!(repo = %prompt.repo_alias, package = %prompt.package_name, "refusing package signed by foreign key (non-interactive)");
        false
    }

    fn ask_to_retry_retrieval(&self, detail: &str) -> bool {
        tracing::debug!(detail, "retrying retrieval");
        true
    }

    fn problem(&self, problem: &Problem) -> ProblemResponse {
        tracing::error!(%problem, "reported problem (non-interactive, aborting)");
        ProblemResponse::Abort
    }
}

/// A [`Reporter`] test double that replays fixed answers recorded ahead of
/// time, for exercising both the "user says yes" and "user says no"
/// branches of signature workflows without any real interactivity.
#[derive(Debug)]
pub struct ScriptedReporter {
    accept_unsigned: std::sync::atomic::AtomicBool,
    key_decision: std::sync::Mutex<KeyTrustDecision>,
    accept_verification_failed: std::sync::atomic::AtomicBool,
    accept_unknown_key: std::sync::atomic::AtomicBool,
    accept_package_key: std::sync::atomic::AtomicBool,
    retry: std::sync::atomic::AtomicBool,
    problem_response: std::sync::Mutex<ProblemResponse>,
    problems: std::sync::Mutex<Vec<Problem>>,
}

impl Default for ScriptedReporter {
    fn default() -> Self {
        Self {
            accept_unsigned: std::sync::atomic::AtomicBool::new(false),
            key_decision: std::sync::Mutex::new(KeyTrustDecision::DontTrust),
            accept_verification_failed: std::sync::atomic::AtomicBool::new(false),
            accept_unknown_key: std::sync::atomic::AtomicBool::new(false),
            accept_package_key: std::sync::atomic::AtomicBool::new(false),
            retry: std::sync::atomic::AtomicBool::new(false),
            problem_response: std::sync::Mutex::new(ProblemResponse::Abort),
            problems: std::sync::Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedReporter {
    /// A reporter that answers every prompt in the negative (nothing
    /// accepted, no retries).
    pub fn refuse_everything() -> Self {
        Self::default()
    }

    /// A reporter that accepts everything, importing every untrusted key
    /// it is asked about.
    pub fn accept_everything() -> Self {
        use std::sync::atomic::AtomicBool;
        Self {
            accept_unsigned: AtomicBool::new(true),
            key_decision: std::sync::Mutex::new(KeyTrustDecision::TrustAndImport),
            accept_verification_failed: AtomicBool::new(true),
            accept_unknown_key: AtomicBool::new(true),
            accept_package_key: AtomicBool::new(true),
            retry: AtomicBool::new(true),
            problem_response: std::sync::Mutex::new(ProblemResponse::Ignore),
            problems: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Override the answer [`Reporter::ask_user_to_accept_key`] gives.
    pub fn set_key_decision(&self, decision: KeyTrustDecision) {
        *self.key_decision.lock().unwrap() = decision;
    }

    /// Override the answer [`Reporter::problem`] gives.
    pub fn set_problem_response(&self, response: ProblemResponse) {
        *self.problem_response.lock().unwrap() = response;
    }

    /// Override the answer [`Reporter::ask_user_to_accept_package_key`]
    /// gives, independently of every other scripted answer.
    pub fn set_accept_package_key(&self, accept: bool) {
        self.accept_package_key.store(accept, std::sync::atomic::Ordering::SeqCst);
    }

    /// Problems reported so far, for test assertions.
    pub fn reported_problems(&self) -> Vec<Problem> {
        self.problems.lock().unwrap().clone()
    }
}

impl Reporter for ScriptedReporter {
    fn ask_user_to_accept_unsigned_file(&self, _prompt: &UnsignedFilePrompt) -> bool {
        self.accept_unsigned.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn ask_user_to_accept_key(&self, _prompt: &UntrustedKeyPrompt) -> KeyTrustDecision {
        *self.key_decision.lock().unwrap()
    }

    fn report_auto_import_key(&self, _info: &AutoImportedKey) {}

    fn ask_user_to_accept_verification_failed(&self, _prompt: &VerificationFailedPrompt) -> bool {
        self.accept_verification_failed.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn ask_user_to_accept_unknown_key(&self, _prompt: &UnknownKeyPrompt) -> bool {
        self.accept_unknown_key.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn ask_user_to_accept_package_key(&self, _prompt: &PackageKeyPrompt) -> bool {
        self.accept_package_key.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn ask_to_retry_retrieval(&self, _detail: &str) -> bool {
        self.retry.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn problem(&self, problem: &Problem) -> ProblemResponse {
        self.problems.lock().unwrap().push(problem.clone());
        *self.problem_response.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_interactive_reporter_refuses_every_prompt() {
        let reporter = NonInteractiveReporter;
        assert!(!reporter.ask_user_to_accept_unsigned_file(&UnsignedFilePrompt {
            repo_alias: "oss".into(),
            file_name: "repomd.xml".into(),
        }));
        assert!(reporter.ask_to_retry_retrieval("timed out"));
    }

    #[test]
    fn scripted_reporter_replays_recorded_answers() {
        let reporter = ScriptedReporter::accept_everything();
        assert_eq!(
            reporter.ask_user_to_accept_key(&UntrustedKeyPrompt {
                repo_alias: "oss".into(),
                key_id: "ABCD1234".into(),
                key_name: "openSUSE".into(),
                key_fingerprint: "deadbeef".into(),
            }),
            KeyTrustDecision::TrustAndImport
        );

        let reporter = ScriptedReporter::refuse_everything();
        assert!(!reporter.ask_user_to_accept_package_key(&PackageKeyPrompt {
            repo_alias: "oss".into(),
            package_name: "bash".into(),
            key_id: "ABCD1234".into(),
        }));
    }

    #[test]
    fn scripted_reporter_records_problems() {
        let reporter = ScriptedReporter::refuse_everything();
        let response = reporter.problem(&Problem {
            summary: "cache corrupt".into(),
            detail: Some("checksum mismatch".into()),
        });
        assert_eq!(reporter.reported_problems().len(), 1);
        assert_eq!(response, ProblemResponse::Abort);
    }

    #[test]
    fn scripted_reporter_problem_response_is_overridable() {
        let reporter = ScriptedReporter::refuse_everything();
        reporter.set_problem_response(ProblemResponse::Retry);
        assert_eq!(
            reporter.problem(&Problem {
                summary: "transient".into(),
                detail: None,
            }),
            ProblemResponse::Retry
        );
    }

    #[test]
    fn non_interactive_reporter_aborts_on_problem() {
        let reporter = NonInteractiveReporter;
        assert_eq!(
            reporter.problem(&Problem {
                summary: "cache corrupt".into(),
                detail: None,
            }),
            ProblemResponse::Abort
        );
    }
}
