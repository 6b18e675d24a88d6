//! The signature verification workflow: the 8-step algorithm
//! that turns a [`VerifyFileContext`] plus a [`KeyRing`] into an
//! accept/reject decision, asking a [`Reporter`] whenever a human judgment
//! call is needed.
//!
//! Generalizes `zypp/ng/workflows/keyringwf.cc`'s `verifyFileSignatureWorkflow`:
//! that function closes over a concrete `RepoInfo`/`KeyRing` pair and an
//! `Executor` template parameter for sync/async. Here the RepoInfo
//! dependency is factored behind [`KeyContext`] so this crate never depends
//! on `pkgrepo-repoinfo`, and the `Executor` parameter is real: every
//! reporter prompt runs through `Exec::ask_user`, so a caller driving this
//! workflow with an [`pkgrepo_core::AsyncExecutor`] gets those prompts
//! dispatched onto its runtime instead of blocking the calling thread.

use pkgrepo_core::{
    AutoImportedKey, Executor, Expected, KeyTrustDecision, Reporter, SyncExecutor, UnknownKeyPrompt, UnsignedFilePrompt,
    UntrustedKeyPrompt, VerificationFailedPrompt,
};

use crate::error::{KeyringError, KeyringResult, SignatureErrorKind};
use crate::key::{is_safe_id, KeyData};
use crate::keyring::{KeyRing, Ring};
use crate::verify_context::VerifyFileContext;

/// Supplies the repo-specific half of the workflow without this crate depending on
/// `pkgrepo-repoinfo` directly. `pkgrepo-manager` implements this over its
/// `RepoInfo` type, mirroring the `VariableResolver` trait `pkgrepo-repoinfo`
/// itself uses to stay decoupled from `pkgrepo-core`.
pub trait KeyContext {
    /// The repo alias this context fetches keys for, for reporting.
    fn repo_alias(&self) -> &str;

    /// Fetch and decode a candidate key from this repo's `gpgkey=` URLs or
    /// pubkey cache. Returns `Ok(None)` if nothing is available; the
    /// specific transport error (if any) is logged by the implementation,
    /// not surfaced here, since a missing `gpgkey=` is an expected case,
    /// not a failure.
    fn provide_key(&self) -> KeyringResult<Option<KeyData>>;
}

/// Run the signature verification workflow over `ctx`, consulting `ring`
/// and `reporter`, and (if `ctx.repo_alias` is set and no other key is
/// found) `key_context` for step 5's repository fallback.
///
/// Returns whether the file is accepted; `ctx` is updated in place with the
/// intermediate results. Runs every prompt inline on the calling thread;
/// use [`verify_file_signature_with`] to drive this through an
/// [`pkgrepo_core::AsyncExecutor`] instead.
pub fn verify_file_signature(
    ctx: &mut VerifyFileContext,
    file_bytes: &[u8],
    signature_bytes: Option<&[u8]>,
    ring: &KeyRing,
    reporter: &dyn Reporter,
    key_context: Option<&dyn KeyContext>,
) -> KeyringResult<bool> {
    verify_file_signature_with(&SyncExecutor, ctx, file_bytes, signature_bytes, ring, reporter, key_context)
}

/// Same as [`verify_file_signature`], generic over the [`Executor`] that
/// dispatches every `reporter.ask_*` call.
pub fn verify_file_signature_with<Exec: Executor>(
    exec: &Exec,
    ctx: &mut VerifyFileContext,
    file_bytes: &[u8],
    signature_bytes: Option<&[u8]>,
    ring: &KeyRing,
    reporter: &dyn Reporter,
    key_context: Option<&dyn KeyContext>,
) -> KeyringResult<bool> {
    // Step 1: reset results.
    ctx.reset_results();

    // Step 2: missing/empty signature.
    let Some(signature_bytes) = signature_bytes.filter(|b| !b.is_empty()) else {
        let accepted = exec.ask_user(|| {
            reporter.ask_user_to_accept_unsigned_file(&UnsignedFilePrompt {
                repo_alias: ctx.repo_alias.clone().unwrap_or_default(),
                file_name: ctx.short_description.clone(),
            })
        });
        ctx.file_accepted = accepted;
        return Ok(accepted);
    };

    // Step 3: read signature key id.
    let signature_id = match Expected::from(ring.read_signature_key_id(&ctx.signature, signature_bytes)) {
        Expected::Ok(id) => id,
        Expected::Err(_) => {
            ctx.file_accepted = false;
            return Ok(false);
        }
    };
    ctx.signature_id = Some(signature_id.clone());

    // Step 4: compute buddies — safe-id, not already trusted, present in
    // the general ring, not the signing key itself.
    let buddies: Vec<String> = ctx
        .buddy_keys
        .iter()
        .filter(|id| {
            is_safe_id(id)
                && **id != signature_id
                && !ring.is_key_trusted(id)
                && ring.provides_key(id, Ring::General)
        })
        .cloned()
        .collect();

    // Step 5: resolve the signing key.
    let resolved = resolve_signing_key(exec, ctx, &signature_id, ring, reporter, key_context)?;

    let Some(key) = resolved else {
        // Step 8: no key could be found at all.
        ctx.key_found = false;
        let accepted = exec.ask_user(|| {
            reporter.ask_user_to_accept_unknown_key(&UnknownKeyPrompt {
                repo_alias: ctx.repo_alias.clone().unwrap_or_default(),
                file_name: ctx.short_description.clone(),
                key_id: signature_id.clone(),
            })
        });
        ctx.file_accepted = accepted;
        return Ok(accepted);
    };
    ctx.key_found = true;

    // Step 6: verify against the resolved key.
    let trusted_matches = ring
        .export_key(&key.meta.key_id, Ring::Trusted)
        .map(|k| k.verifying_key == key.verifying_key)
        .unwrap_or(false);
    ctx.signature_id_trusted = trusted_matches;

    use ed25519_dalek::Verifier;
    let valid = match crate::key::DetachedSignature::parse(signature_bytes) {
        Ok(sig) => key.verifying_key.verify(file_bytes, &sig.signature).is_ok(),
        Err(_) => false,
    };
    ctx.file_validated = valid;

    if valid {
        if !buddies.is_empty() {
            for buddy_id in &buddies {
                if let Ok(buddy_key) = ring.export_key(buddy_id, Ring::General) {
                    reporter.report_auto_import_key(&AutoImportedKey {
                        repo_alias: ctx.repo_alias.clone().unwrap_or_default(),
                        key_id: buddy_key.meta.key_id.clone(),
                        key_fingerprint: buddy_key.meta.fingerprint.clone(),
                    });
                    ring.import_key(buddy_key, true)?;
                }
            }
        }
        ctx.file_accepted = true;
        return Ok(true);
    }

    // Step 7: verification failed.
    let accepted = exec.ask_user(|| {
        reporter.ask_user_to_accept_verification_failed(&VerificationFailedPrompt {
            repo_alias: ctx.repo_alias.clone().unwrap_or_default(),
            file_name: ctx.short_description.clone(),
            key_id: Some(key.meta.key_id.clone()),
        })
    });
    ctx.file_accepted = accepted;
    Ok(accepted)
}

fn resolve_signing_key<Exec: Executor>(
    exec: &Exec,
    ctx: &mut VerifyFileContext,
    signature_id: &str,
    ring: &KeyRing,
    reporter: &dyn Reporter,
    key_context: Option<&dyn KeyContext>,
) -> KeyringResult<Option<KeyData>> {
    if let Some((key, trusted)) = ring.resolve_signing_key(signature_id)? {
        if trusted {
            return Ok(Some(key));
        }
        // Known to general ring only: ask the user.
        let decision = exec.ask_user(|| {
            reporter.ask_user_to_accept_key(&UntrustedKeyPrompt {
                repo_alias: ctx.repo_alias.clone().unwrap_or_default(),
                key_id: key.meta.key_id.clone(),
                key_name: key.meta.name.clone(),
                key_fingerprint: key.meta.fingerprint.clone(),
            })
        });
        return match decision {
            KeyTrustDecision::DontTrust => Ok(None),
            KeyTrustDecision::TrustTemporarily => Ok(Some(key)),
            KeyTrustDecision::TrustAndImport => {
                ring.import_key(key.clone(), true)?;
                Ok(Some(key))
            }
        };
    }

    let Some(key_context) = key_context else {
        return Ok(None);
    };
    let Some(candidate) = key_context.provide_key()? else {
        return Ok(None);
    };
    if candidate.meta.key_id != signature_id && !candidate.provides(signature_id) {
        return Ok(None);
    }
    let decision = exec.ask_user(|| {
        reporter.ask_user_to_accept_key(&UntrustedKeyPrompt {
            repo_alias: key_context.repo_alias().to_string(),
            key_id: candidate.meta.key_id.clone(),
            key_name: candidate.meta.name.clone(),
            key_fingerprint: candidate.meta.fingerprint.clone(),
        })
    });
    match decision {
        KeyTrustDecision::DontTrust => Ok(None),
        KeyTrustDecision::TrustTemporarily => Ok(Some(candidate)),
        KeyTrustDecision::TrustAndImport => {
            ring.import_key(candidate.clone(), true)?;
            Ok(Some(candidate))
        }
    }
}

/// Surface the closed `SignatureError` taxonomy for a caller that
/// needs a `Result`-shaped outcome instead of the workflow's plain
/// `bool`/`VerifyFileContext` pair (e.g. the package-signature retry loop
/// in `pkgrepo-package`).
pub fn classify_failure(ctx: &VerifyFileContext) -> Option<KeyringError> {
    if ctx.file_accepted {
        return None;
    }
    let kind = if ctx.signature_id.is_none() {
        SignatureErrorKind::NoSignature
    } else if !ctx.key_found {
        SignatureErrorKind::NoKey
    } else if !ctx.signature_id_trusted && !ctx.file_validated {
        SignatureErrorKind::Untrusted
    } else {
        SignatureErrorKind::BadSignature
    };
    Some(KeyRing::signature_error(kind))
}
