//! [`PackageProvider`]: the cache-or-fetch, delta-reconstruction, and
//! signature-checked retrieval of a single package, grounded in
//! `examples/original_source/zypp/repo/PackageProvider.cc`.
//!
//! The outer retry loop ([`PackageProvider::retry_pipeline`]) and the inner
//! per-attempt fetch/verify chain ([`PackageProvider::download_once`]) are
//! each an [`Expected`] pipeline driven by an [`Executor`], nested the way
//! `zypp/ng/workflows/keyringwf.cc`'s `ImportKeyFromRepoLogic` nests a
//! key-import pipeline inside its caller's own pipeline: the outer one
//! `or_else`s into a retry of the inner one, rather than a hand-rolled
//! recursive loop reaching past the engine to call itself.

use std::path::{Path, PathBuf};

use pkgrepo_core::{Executor, Expected, PackageKeyPrompt, Problem, ProblemResponse, Reporter, SyncExecutor, VerificationFailedPrompt};
use pkgrepo_keyring::{classify_failure, verify_file_signature_with, KeyContext, KeyRing, KeyringError, SignatureErrorKind, VerifyFileContext};
use pkgrepo_provider::{ProvideOptions, Provider};

use crate::cache::TopLevelCache;
use crate::checksum_exceptions::ChecksumExceptionCache;
use crate::delta::{DeltaApplier, InstalledEditions};
use crate::disposer::ManagedPackageFile;
use crate::error::{PackageError, PackageResult};
use crate::item::{Checksum, DeltaCandidate, PackageItem};

/// How a [`ProvidedPackage`] was ultimately obtained, for reporting/metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageSource {
    /// `item.cached_path` already pointed at a usable file (step 1).
    AlreadyCached,
    /// Hard-linked/copied out of the shared top-level cache (step 2).
    TopLevelCache,
    /// Rebuilt from a delta against an installed edition (step 3).
    DeltaReconstructed,
    /// Downloaded in full via the `Provider` (step 4).
    Downloaded,
}

/// The result of a successful [`PackageProvider::provide`] call.
#[derive(Debug)]
pub struct ProvidedPackage {
    /// The retrieved file; dropping it honors the repo's `keepPackages`
    /// setting.
    pub file: ManagedPackageFile,
    /// How the file was obtained.
    pub source: PackageSource,
}

/// Per-call inputs to [`PackageProvider::provide`].
pub struct ProvideRequest<'a> {
    /// The package to retrieve.
    pub item: &'a PackageItem,
    /// Delta candidates that could reconstruct `item`, in preference order.
    pub deltas: &'a [DeltaCandidate],
    /// The repository's package cache directory (`%PKG%`); `item.location`
    /// is resolved under it.
    pub dest_dir: &'a Path,
    /// The repo's `keepPackages` setting — whether the returned handle
    /// leaves its file in place on drop.
    pub keep_packages: bool,
    /// Whether the deployment's config permits delta reconstruction at all.
    pub allow_deltas: bool,
    /// Whether this repository's scheme is a downloading one (http/https/ftp
    /// style) as opposed to a local/removable medium.
    pub downloading_scheme: bool,
    /// An explicit "always attempt deltas" override, bypassing the
    /// `downloading_scheme` check.
    pub force_deltas: bool,
    /// Supplies `gpgkey=`/pubkey-cache fallback key resolution, mirroring
    /// the repo-metadata signature workflow's `KeyContext`.
    pub key_context: Option<&'a dyn KeyContext>,
    /// Deadline/cancellation/auth threaded into every `Provider` call.
    pub opts: &'a ProvideOptions,
}

/// The default, inline executor used by [`PackageProvider::new`]. A single
/// shared instance suffices since `SyncExecutor` holds no state.
static SYNC_EXECUTOR: SyncExecutor = SyncExecutor;

/// Retrieves individual packages: cache hit, top-level cache, delta
/// reconstruction, or full download, each gated by signature and checksum
/// verification. Generic over the [`Executor`] driving its retry/verify
/// pipelines; [`PackageProvider::new`] defaults to [`SyncExecutor`].
pub struct PackageProvider<'a, Exec: Executor = SyncExecutor> {
    provider: &'a dyn Provider,
    keyring: &'a KeyRing,
    reporter: &'a dyn Reporter,
    top_level_cache: Option<&'a TopLevelCache>,
    delta_applier: &'a dyn DeltaApplier,
    installed_editions: &'a dyn InstalledEditions,
    checksum_exceptions: &'a ChecksumExceptionCache,
    max_retries: u32,
    exec: &'a Exec,
}

impl<'a> PackageProvider<'a, SyncExecutor> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        provider: &'a dyn Provider,
        keyring: &'a KeyRing,
        reporter: &'a dyn Reporter,
        top_level_cache: Option<&'a TopLevelCache>,
        delta_applier: &'a dyn DeltaApplier,
        installed_editions: &'a dyn InstalledEditions,
        checksum_exceptions: &'a ChecksumExceptionCache,
    ) -> Self {
        Self::new_with_executor(
            &SYNC_EXECUTOR,
            provider,
            keyring,
            reporter,
            top_level_cache,
            delta_applier,
            installed_editions,
            checksum_exceptions,
        )
    }
}

impl<'a, Exec: Executor> PackageProvider<'a, Exec> {
    /// Same as [`PackageProvider::new`], but driven by an explicit
    /// [`Executor`] (e.g. an [`pkgrepo_core::AsyncExecutor`] so every
    /// `reporter.ask_*` prompt dispatches onto that runtime instead of
    /// blocking the calling thread).
    #[allow(clippy::too_many_arguments)]
    pub fn new_with_executor(
        exec: &'a Exec,
        provider: &'a dyn Provider,
        keyring: &'a KeyRing,
        reporter: &'a dyn Reporter,
        top_level_cache: Option<&'a TopLevelCache>,
        delta_applier: &'a dyn DeltaApplier,
        installed_editions: &'a dyn InstalledEditions,
        checksum_exceptions: &'a ChecksumExceptionCache,
    ) -> Self {
        Self {
            provider,
            keyring,
            reporter,
            top_level_cache,
            delta_applier,
            installed_editions,
            checksum_exceptions,
            max_retries: 3,
            exec,
        }
    }

    /// Override the outer retry loop's attempt budget (default 3).
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Retrieve `req.item` via the four-step cache/top-level-cache/delta/
    /// download algorithm.
    pub fn provide(&self, req: &ProvideRequest<'_>) -> PackageResult<ProvidedPackage> {
        // Step 1: already-cached file.
        if let Some(cached) = req.item.cached_path.as_ref() {
            if cached.is_file() {
                tracing::debug!(package = %req.item.name, path = %cached.display(), "serving already-cached package");
                return Ok(ProvidedPackage {
                    file: ManagedPackageFile::new(cached.clone(), true),
                    source: PackageSource::AlreadyCached,
                });
            }
        }

        let dest = req.dest_dir.join(&req.item.location);

        // Step 2: shared top-level package cache.
        if let (Some(cache), Some(checksum)) = (self.top_level_cache, req.item.expected_checksum.as_ref()) {
            if cache.lookup(checksum).is_some() {
                cache.materialize(checksum, &dest).map_err(|e| PackageError::io(&dest, e))?;
                tracing::debug!(package = %req.item.name, "served from top-level package cache");
                return Ok(ProvidedPackage {
                    file: ManagedPackageFile::new(dest, req.keep_packages),
                    source: PackageSource::TopLevelCache,
                });
            }
        }

        // Step 3: delta reconstruction.
        if req.allow_deltas && (req.downloading_scheme || req.force_deltas) {
            if let Some(provided) = self.try_delta(req, &dest)? {
                return Ok(provided);
            }
        }

        // Step 4: full download, wrapped in the outer retry loop.
        self.download_with_retries(req, &dest)
    }

    fn try_delta(&self, req: &ProvideRequest<'_>, dest: &Path) -> PackageResult<Option<ProvidedPackage>> {
        let Some(candidate) = req
            .deltas
            .iter()
            .find(|d| self.installed_editions.is_installed(&req.item.repo_alias, &d.base_edition))
        else {
            return Ok(None);
        };

        let delta_dest = append_extension(dest, "delta");
        if let Some(parent) = delta_dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PackageError::io(parent, e))?;
        }

        let delta_file = match self.provider.provide_file(&candidate.delta_url, &delta_dest, req.opts) {
            Ok(file) => file,
            Err(e) => {
                tracing::debug!(package = %req.item.name, error = %e, "delta fetch failed, falling back to full download");
                let _ = std::fs::remove_file(&delta_dest);
                return Ok(None);
            }
        };

        if !self.delta_applier.quick_check(&delta_file.path, &candidate.result_checksum) {
            tracing::debug!(package = %req.item.name, "delta quick-check failed, falling back to full download");
            let _ = std::fs::remove_file(&delta_file.path);
            return Ok(None);
        }

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PackageError::io(parent, e))?;
        }
        if let Err(e) = self.delta_applier.apply(&delta_file.path, dest) {
            tracing::debug!(package = %req.item.name, error = %e, "delta apply failed, falling back to full download");
            let _ = std::fs::remove_file(&delta_file.path);
            let _ = std::fs::remove_file(dest);
            return Ok(None);
        }
        let _ = std::fs::remove_file(&delta_file.path);

        // Reconstruction succeeded: verify the rebuilt file. Failures here
        // propagate rather than falling back to a full download.
        self.verify_checksum(req, dest)?;
        self.verify_signature(req, dest)?;

        tracing::info!(package = %req.item.name, base_edition = %candidate.base_edition, "reconstructed package from delta");
        Ok(Some(ProvidedPackage {
            file: ManagedPackageFile::new(dest.to_path_buf(), req.keep_packages),
            source: PackageSource::DeltaReconstructed,
        }))
    }

    /// The outer pipeline: drives [`Self::download_once`] (the inner
    /// pipeline) and, on a retryable failure within budget, asks whether to
    /// retry and recurses rather than looping by hand.
    fn download_with_retries(&self, req: &ProvideRequest<'_>, dest: &Path) -> PackageResult<ProvidedPackage> {
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PackageError::io(parent, e))?;
        }
        self.retry_pipeline(req, dest, 1).into_result()
    }

    fn retry_pipeline(&self, req: &ProvideRequest<'_>, dest: &Path, attempt: u32) -> Expected<ProvidedPackage, PackageError> {
        self.download_once(req, dest).or_else(|e| {
            let _ = std::fs::remove_file(dest);
            if !e.is_retryable() || attempt >= self.max_retries {
                return Expected::err(e);
            }
            let retry = self.exec.ask_user(|| self.reporter.ask_to_retry_retrieval(&e.to_string()));
            if !retry {
                return Expected::err(e);
            }
            tracing::debug!(package = %req.item.name, attempt, error = %e, "retrying package retrieval");
            self.retry_pipeline(req, dest, attempt + 1)
        })
    }

    /// The inner pipeline: fetch, checksum, signature, cache-populate, each
    /// step chained through `self.exec` so an async executor genuinely
    /// dispatches every step onto its own runtime.
    fn download_once(&self, req: &ProvideRequest<'_>, dest: &Path) -> Expected<ProvidedPackage, PackageError> {
        let fetched = self.exec.and_then(self.exec.lift(()), |()| {
            Expected::from(self.provider.provide_file(&req.item.url, dest, req.opts).map_err(PackageError::from))
        });
        let checksummed = self.exec.and_then(fetched, |()| Expected::from(self.verify_checksum(req, dest)));
        let verified = self.exec.and_then(checksummed, |()| Expected::from(self.verify_signature(req, dest)));
        self.exec.and_then(verified, |()| {
            tracing::info!(package = %req.item.name, "package downloaded");

            if let Some(cache) = self.top_level_cache {
                if let Some(checksum) = req.item.expected_checksum.as_ref() {
                    if let Err(e) = cache.store(checksum, dest) {
                        tracing::warn!(package = %req.item.name, error = %e, "failed to populate top-level package cache");
                    }
                }
            }

            Expected::ok(ProvidedPackage {
                file: ManagedPackageFile::new(dest.to_path_buf(), req.keep_packages),
                source: PackageSource::Downloaded,
            })
        })
    }

    /// A checksum mismatch the user accepted is auto-accepted again for
    /// 12 hours before re-prompting.
    fn verify_checksum(&self, req: &ProvideRequest<'_>, path: &Path) -> PackageResult<()> {
        let Some(expected) = req.item.expected_checksum.as_ref() else {
            return Ok(());
        };
        let bytes = std::fs::read(path).map_err(|e| PackageError::io(path, e))?;
        let got = Checksum::from_bytes(&bytes);
        if got == *expected {
            return Ok(());
        }

        if self.checksum_exceptions.is_exempt(expected.as_str(), got.as_str()) {
            tracing::warn!(
                package = %req.item.name,
                expected = expected.as_str(),
                got = got.as_str(),
                "checksum mismatch auto-accepted under standing exception"
            );
            return Ok(());
        }

        let accepted = self.reporter.ask_user_to_accept_verification_failed(&VerificationFailedPrompt {
            repo_alias: req.item.repo_alias.clone(),
            file_name: req.item.name.clone(),
            key_id: None,
        });
        if accepted {
            self.checksum_exceptions.remember(expected.as_str(), got.as_str());
            return Ok(());
        }

        Err(PackageError::ChecksumMismatch {
            expected: expected.as_str().to_string(),
            got: got.as_str().to_string(),
        })
    }

    fn verify_signature(&self, req: &ProvideRequest<'_>, path: &Path) -> PackageResult<()> {
        let file_bytes = std::fs::read(path).map_err(|e| PackageError::io(path, e))?;
        let sig_path = append_extension(path, "asc");
        let sig_bytes = std::fs::read(&sig_path).ok();

        let mut ctx = VerifyFileContext::new(path, sig_path, req.item.name.clone()).with_repo_alias(req.item.repo_alias.clone());
        let accepted =
            verify_file_signature_with(self.exec, &mut ctx, &file_bytes, sig_bytes.as_deref(), self.keyring, self.reporter, req.key_context)?;

        if accepted {
            return Ok(());
        }

        let reason = classify_failure(&ctx);

        // A package signed by a key the repo-metadata workflow never saw
        // may still be legitimate — some repos sign individual packages
        // with a package-specific key. Re-check with the operator before
        // falling through to the generic problem report.
        if let (Some(KeyringError::Signature { kind: SignatureErrorKind::NoKey }), Some(key_id)) =
            (&reason, ctx.signature_id.clone())
        {
            let prompt = PackageKeyPrompt {
                repo_alias: req.item.repo_alias.clone(),
                package_name: req.item.name.clone(),
                key_id,
            };
            if self.exec.ask_user(|| self.reporter.ask_user_to_accept_package_key(&prompt)) {
                tracing::warn!(package = %req.item.name, key_id = %prompt.key_id, "package accepted under a key not seen in repository metadata");
                return Ok(());
            }
        }

        let response = self.exec.ask_user(|| {
            self.reporter.problem(&Problem {
                summary: format!("package '{}' failed signature verification", req.item.name),
                detail: reason.as_ref().map(std::string::ToString::to_string),
            })
        });
        match response {
            ProblemResponse::Ignore => {
                tracing::warn!(package = %req.item.name, "signature problem ignored, accepting file");
                Ok(())
            }
            ProblemResponse::Abort => Err(PackageError::UserAbort {
                operation: format!("signature check for '{}'", req.item.name),
            }),
            ProblemResponse::Retry => Err(PackageError::SignatureRetry {
                operation: format!("signature check for '{}'", req.item.name),
                detail: reason.as_ref().map(std::string::ToString::to_string).unwrap_or_default(),
            }),
        }
    }
}

fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".");
    os.push(ext);
    PathBuf::from(os)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::{NoInstalledEditions, NullDeltaApplier};
    use ed25519_dalek::{Signer, SigningKey};
    use pkgrepo_core::ScriptedReporter;
    use pkgrepo_provider::MapProvider;
    use std::time::Duration;
    use tempfile::tempdir;
    use url::Url;

    fn new_ring() -> (KeyRing, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let ring = KeyRing::open(dir.path().join("trusted"), dir.path().join("general")).unwrap();
        (ring, dir)
    }

    fn sidecar(signing_key: &SigningKey, key_id: &str, bytes: &[u8]) -> Vec<u8> {
        use base64::{engine::general_purpose::STANDARD, Engine};
        let sig = signing_key.sign(bytes);
        format!("{key_id}\n{}\n", STANDARD.encode(sig.to_bytes())).into_bytes()
    }

    struct Fixture {
        ring: KeyRing,
        _ring_dir: tempfile::TempDir,
        signing_key: SigningKey,
        key_id: String,
    }

    fn fixture() -> Fixture {
        let (ring, ring_dir) = new_ring();
        let signing_key = SigningKey::from_bytes(&[9u8; 32]);
        let key = pkgrepo_keyring::KeyData::new("test repo", signing_key.verifying_key(), 1).unwrap();
        let key_id = key.meta.key_id.clone();
        ring.import_key(key, true).unwrap();
        Fixture {
            ring,
            _ring_dir: ring_dir,
            signing_key,
            key_id,
        }
    }

    #[test]
    fn already_cached_file_short_circuits_everything() {
        let fx = fixture();
        let provider = MapProvider::new();
        let reporter = ScriptedReporter::refuse_everything();
        let top_cache = None;
        let applier = NullDeltaApplier;
        let installed = NoInstalledEditions;
        let exceptions = ChecksumExceptionCache::new();

        let cache_dir = tempdir().unwrap();
        let cached_path = cache_dir.path().join("bash.rpm");
        std::fs::write(&cached_path, b"already here").unwrap();

        let item = PackageItem::new(
            "oss",
            "bash.rpm",
            Url::parse("https://example.com/bash.rpm").unwrap(),
            "bash.rpm",
        )
        .with_cached_path(&cached_path);

        let dest_dir = tempdir().unwrap();
        let pp = PackageProvider::new(&provider, &fx.ring, &reporter, top_cache, &applier, &installed, &exceptions);
        let req = ProvideRequest {
            item: &item,
            deltas: &[],
            dest_dir: dest_dir.path(),
            keep_packages: true,
            allow_deltas: false,
            downloading_scheme: true,
            force_deltas: false,
            key_context: None,
            opts: &ProvideOptions::default(),
        };

        let result = pp.provide(&req).unwrap();
        assert_eq!(result.source, PackageSource::AlreadyCached);
        assert_eq!(result.file.path(), cached_path);
    }

    #[test]
    fn full_download_with_valid_signature_and_checksum_succeeds() {
        let fx = fixture();
        let bytes = b"package payload bytes".to_vec();
        let url = Url::parse("https://example.com/repo/bash.rpm").unwrap();
        let provider = MapProvider::new();
        provider.insert(url.clone(), bytes.clone());

        let reporter = ScriptedReporter::refuse_everything();
        let applier = NullDeltaApplier;
        let installed = NoInstalledEditions;
        let exceptions = ChecksumExceptionCache::new();

        let dest_dir = tempdir().unwrap();
        let sig_path = dest_dir.path().join("bash.rpm.asc");
        std::fs::write(&sig_path, sidecar(&fx.signing_key, &fx.key_id, &bytes)).unwrap();

        let item = PackageItem::new("oss", "bash.rpm", url, "bash.rpm").with_checksum(Checksum::from_bytes(&bytes));

        let pp = PackageProvider::new(&provider, &fx.ring, &reporter, None, &applier, &installed, &exceptions);
        let req = ProvideRequest {
            item: &item,
            deltas: &[],
            dest_dir: dest_dir.path(),
            keep_packages: true,
            allow_deltas: false,
            downloading_scheme: true,
            force_deltas: false,
            key_context: None,
            opts: &ProvideOptions::default(),
        };

        let result = pp.provide(&req).unwrap();
        assert_eq!(result.source, PackageSource::Downloaded);
        assert_eq!(std::fs::read(result.file.path()).unwrap(), bytes);
    }

    #[test]
    fn checksum_mismatch_is_rejected_when_reporter_declines() {
        let fx = fixture();
        let bytes = b"actual bytes".to_vec();
        let url = Url::parse("https://example.com/repo/bash.rpm").unwrap();
        let provider = MapProvider::new();
        provider.insert(url.clone(), bytes.clone());

        let reporter = ScriptedReporter::refuse_everything();
        let applier = NullDeltaApplier;
        let installed = NoInstalledEditions;
        let exceptions = ChecksumExceptionCache::new();

        let dest_dir = tempdir().unwrap();
        let item = PackageItem::new("oss", "bash.rpm", url, "bash.rpm").with_checksum(Checksum::from_hex("b".repeat(64)));

        let pp = PackageProvider::new(&provider, &fx.ring, &reporter, None, &applier, &installed, &exceptions);
        let req = ProvideRequest {
            item: &item,
            deltas: &[],
            dest_dir: dest_dir.path(),
            keep_packages: true,
            allow_deltas: false,
            downloading_scheme: true,
            force_deltas: false,
            key_context: None,
            opts: &ProvideOptions::default(),
        };

        let err = pp.provide(&req).unwrap_err();
        assert!(matches!(err, PackageError::ChecksumMismatch { .. }));
        assert!(!dest_dir.path().join("bash.rpm").exists());
    }

    #[test]
    fn accepted_checksum_mismatch_is_auto_accepted_within_window() {
        let fx = fixture();
        let bytes = b"actual bytes".to_vec();
        let url = Url::parse("https://example.com/repo/bash.rpm").unwrap();
        let provider = MapProvider::new();
        provider.insert(url.clone(), bytes.clone());

        let reporter = ScriptedReporter::accept_everything();
        let applier = NullDeltaApplier;
        let installed = NoInstalledEditions;
        let exceptions = ChecksumExceptionCache::with_window(Duration::from_secs(3600));

        let expected = Checksum::from_hex("b".repeat(64));
        let got = Checksum::from_bytes(&bytes);

        let dest_dir = tempdir().unwrap();
        let sig_path = dest_dir.path().join("bash.rpm.asc");
        std::fs::write(&sig_path, sidecar(&fx.signing_key, &fx.key_id, &bytes)).unwrap();

        let item = PackageItem::new("oss", "bash.rpm", url.clone(), "bash.rpm").with_checksum(expected.clone());

        let pp = PackageProvider::new(&provider, &fx.ring, &reporter, None, &applier, &installed, &exceptions);
        let req = ProvideRequest {
            item: &item,
            deltas: &[],
            dest_dir: dest_dir.path(),
            keep_packages: true,
            allow_deltas: false,
            downloading_scheme: true,
            force_deltas: false,
            key_context: None,
            opts: &ProvideOptions::default(),
        };

        pp.provide(&req).unwrap();
        assert!(exceptions.is_exempt(expected.as_str(), got.as_str()));

        // A second, identical mismatch within the window is auto-accepted
        // even if the reporter would now refuse.
        let reporter2 = ScriptedReporter::refuse_everything();
        std::fs::remove_file(dest_dir.path().join("bash.rpm")).ok();
        let pp2 = PackageProvider::new(&provider, &fx.ring, &reporter2, None, &applier, &installed, &exceptions);
        pp2.provide(&req).unwrap();
    }

    #[test]
    fn top_level_cache_hit_avoids_provider_entirely() {
        let fx = fixture();
        let bytes = b"cached payload".to_vec();
        let checksum = Checksum::from_bytes(&bytes);

        let cache_root = tempdir().unwrap();
        let cache = TopLevelCache::new(Some(cache_root.path().join("pkgcache"))).unwrap();
        let seed_dir = tempdir().unwrap();
        let seed = seed_dir.path().join("bash.rpm");
        std::fs::write(&seed, &bytes).unwrap();
        cache.store(&checksum, &seed).unwrap();

        // A NullProvider would fail any real fetch; top-level cache must
        // short-circuit before that ever happens.
        let provider = pkgrepo_provider::NullProvider;
        let reporter = ScriptedReporter::refuse_everything();
        let applier = NullDeltaApplier;
        let installed = NoInstalledEditions;
        let exceptions = ChecksumExceptionCache::new();

        let item = PackageItem::new(
            "oss",
            "bash.rpm",
            Url::parse("https://example.com/bash.rpm").unwrap(),
            "bash.rpm",
        )
        .with_checksum(checksum);

        let dest_dir = tempdir().unwrap();
        let pp = PackageProvider::new(&provider, &fx.ring, &reporter, Some(&cache), &applier, &installed, &exceptions);
        let req = ProvideRequest {
            item: &item,
            deltas: &[],
            dest_dir: dest_dir.path(),
            keep_packages: true,
            allow_deltas: false,
            downloading_scheme: true,
            force_deltas: false,
            key_context: None,
            opts: &ProvideOptions::default(),
        };

        let result = pp.provide(&req).unwrap();
        assert_eq!(result.source, PackageSource::TopLevelCache);
        assert_eq!(std::fs::read(result.file.path()).unwrap(), bytes);
    }

    #[test]
    fn delta_reconstruction_is_used_when_an_installed_edition_matches() {
        struct AlwaysReconstruct(Vec<u8>);
        impl DeltaApplier for AlwaysReconstruct {
            fn quick_check(&self, _delta_path: &Path, _result_checksum: &Checksum) -> bool {
                true
            }
            fn apply(&self, _delta_path: &Path, output_path: &Path) -> PackageResult<()> {
                std::fs::write(output_path, &self.0).map_err(|e| PackageError::io(output_path, e))
            }
        }
        struct OnlyThisEdition(&'static str);
        impl InstalledEditions for OnlyThisEdition {
            fn is_installed(&self, _repo_alias: &str, edition: &str) -> bool {
                edition == self.0
            }
        }

        let fx = fixture();
        let reconstructed = b"full package after delta apply".to_vec();
        let delta_url = Url::parse("https://example.com/repo/bash.delta").unwrap();
        let provider = MapProvider::new();
        provider.insert(delta_url.clone(), b"small delta bytes".to_vec());

        let reporter = ScriptedReporter::refuse_everything();
        let applier = AlwaysReconstruct(reconstructed.clone());
        let installed = OnlyThisEdition("bash-5.1-1.1.x86_64");
        let exceptions = ChecksumExceptionCache::new();

        let dest_dir = tempdir().unwrap();
        let sig_path = dest_dir.path().join("bash.rpm.asc");
        std::fs::write(&sig_path, sidecar(&fx.signing_key, &fx.key_id, &reconstructed)).unwrap();

        let item = PackageItem::new(
            "oss",
            "bash.rpm",
            Url::parse("https://example.com/repo/bash-full.rpm").unwrap(),
            "bash.rpm",
        )
        .with_checksum(Checksum::from_bytes(&reconstructed));

        let deltas = vec![DeltaCandidate {
            base_edition: "bash-5.1-1.1.x86_64".to_string(),
            delta_url,
            result_checksum: Checksum::from_bytes(&reconstructed),
        }];

        let pp = PackageProvider::new(&provider, &fx.ring, &reporter, None, &applier, &installed, &exceptions);
        let req = ProvideRequest {
            item: &item,
            deltas: &deltas,
            dest_dir: dest_dir.path(),
            keep_packages: true,
            allow_deltas: true,
            downloading_scheme: true,
            force_deltas: false,
            key_context: None,
            opts: &ProvideOptions::default(),
        };

        let result = pp.provide(&req).unwrap();
        assert_eq!(result.source, PackageSource::DeltaReconstructed);
        assert_eq!(std::fs::read(result.file.path()).unwrap(), reconstructed);
    }

    #[test]
    fn delta_falls_back_to_full_download_when_quick_check_fails() {
        let fx = fixture();
        let bytes = b"the full download payload".to_vec();
        let full_url = Url::parse("https://example.com/repo/bash-full.rpm").unwrap();
        let delta_url = Url::parse("https://example.com/repo/bash.delta").unwrap();
        let provider = MapProvider::new();
        provider.insert(full_url.clone(), bytes.clone());
        provider.insert(delta_url.clone(), b"delta bytes".to_vec());

        let reporter = ScriptedReporter::refuse_everything();
        let applier = NullDeltaApplier; // quick_check always false
        struct OnlyThisEdition;
        impl InstalledEditions for OnlyThisEdition {
            fn is_installed(&self, _repo_alias: &str, _edition: &str) -> bool {
                true
            }
        }
        let installed = OnlyThisEdition;
        let exceptions = ChecksumExceptionCache::new();

        let dest_dir = tempdir().unwrap();
        let sig_path = dest_dir.path().join("bash.rpm.asc");
        std::fs::write(&sig_path, sidecar(&fx.signing_key, &fx.key_id, &bytes)).unwrap();

        let item = PackageItem::new("oss", "bash.rpm", full_url, "bash.rpm").with_checksum(Checksum::from_bytes(&bytes));
        let deltas = vec![DeltaCandidate {
            base_edition: "anything".to_string(),
            delta_url,
            result_checksum: Checksum::from_bytes(&bytes),
        }];

        let pp = PackageProvider::new(&provider, &fx.ring, &reporter, None, &applier, &installed, &exceptions);
        let req = ProvideRequest {
            item: &item,
            deltas: &deltas,
            dest_dir: dest_dir.path(),
            keep_packages: true,
            allow_deltas: true,
            downloading_scheme: true,
            force_deltas: false,
            key_context: None,
            opts: &ProvideOptions::default(),
        };

        let result = pp.provide(&req).unwrap();
        assert_eq!(result.source, PackageSource::Downloaded);
    }

    #[test]
    fn keep_packages_false_removes_file_once_handle_drops() {
        let fx = fixture();
        let bytes = b"transient payload".to_vec();
        let url = Url::parse("https://example.com/repo/bash.rpm").unwrap();
        let provider = MapProvider::new();
        provider.insert(url.clone(), bytes.clone());

        let reporter = ScriptedReporter::refuse_everything();
        let applier = NullDeltaApplier;
        let installed = NoInstalledEditions;
        let exceptions = ChecksumExceptionCache::new();

        let dest_dir = tempdir().unwrap();
        let sig_path = dest_dir.path().join("bash.rpm.asc");
        std::fs::write(&sig_path, sidecar(&fx.signing_key, &fx.key_id, &bytes)).unwrap();

        let item = PackageItem::new("oss", "bash.rpm", url, "bash.rpm").with_checksum(Checksum::from_bytes(&bytes));

        let pp = PackageProvider::new(&provider, &fx.ring, &reporter, None, &applier, &installed, &exceptions);
        let req = ProvideRequest {
            item: &item,
            deltas: &[],
            dest_dir: dest_dir.path(),
            keep_packages: false,
            allow_deltas: false,
            downloading_scheme: true,
            force_deltas: false,
            key_context: None,
            opts: &ProvideOptions::default(),
        };

        let dest_path = dest_dir.path().join("bash.rpm");
        {
            let result = pp.provide(&req).unwrap();
            assert!(result.file.path().is_file());
        }
        assert!(!dest_path.exists());
    }

    #[test]
    fn unknown_signing_key_is_accepted_via_package_key_prompt() {
        let fx = fixture();
        let foreign_key = SigningKey::from_bytes(&[20u8; 32]);
        let bytes = b"package signed by a foreign key".to_vec();
        let url = Url::parse("https://example.com/repo/bash.rpm").unwrap();
        let provider = MapProvider::new();
        provider.insert(url.clone(), bytes.clone());

        // Declines the repo-metadata-style unknown-key prompt, but accepts
        // the package-specific re-check.
        let reporter = ScriptedReporter::refuse_everything();
        reporter.set_accept_package_key(true);
        let applier = NullDeltaApplier;
        let installed = NoInstalledEditions;
        let exceptions = ChecksumExceptionCache::new();

        let dest_dir = tempdir().unwrap();
        let sig_path = dest_dir.path().join("bash.rpm.asc");
        std::fs::write(&sig_path, sidecar(&foreign_key, &"f".repeat(64), &bytes)).unwrap();

        let item = PackageItem::new("oss", "bash.rpm", url, "bash.rpm").with_checksum(Checksum::from_bytes(&bytes));

        let pp = PackageProvider::new(&provider, &fx.ring, &reporter, None, &applier, &installed, &exceptions);
        let req = ProvideRequest {
            item: &item,
            deltas: &[],
            dest_dir: dest_dir.path(),
            keep_packages: true,
            allow_deltas: false,
            downloading_scheme: true,
            force_deltas: false,
            key_context: None,
            opts: &ProvideOptions::default(),
        };

        let result = pp.provide(&req).unwrap();
        assert_eq!(result.source, PackageSource::Downloaded);
    }

    #[test]
    fn signature_problem_response_ignore_accepts_the_file() {
        let fx = fixture();
        let foreign_key = SigningKey::from_bytes(&[21u8; 32]);
        let bytes = b"package signed by a foreign key, ignored".to_vec();
        let url = Url::parse("https://example.com/repo/bash.rpm").unwrap();
        let provider = MapProvider::new();
        provider.insert(url.clone(), bytes.clone());

        let reporter = ScriptedReporter::refuse_everything();
        reporter.set_problem_response(ProblemResponse::Ignore);
        let applier = NullDeltaApplier;
        let installed = NoInstalledEditions;
        let exceptions = ChecksumExceptionCache::new();

        let dest_dir = tempdir().unwrap();
        let sig_path = dest_dir.path().join("bash.rpm.asc");
        std::fs::write(&sig_path, sidecar(&foreign_key, &"f".repeat(64), &bytes)).unwrap();

        let item = PackageItem::new("oss", "bash.rpm", url, "bash.rpm").with_checksum(Checksum::from_bytes(&bytes));

        let pp = PackageProvider::new(&provider, &fx.ring, &reporter, None, &applier, &installed, &exceptions);
        let req = ProvideRequest {
            item: &item,
            deltas: &[],
            dest_dir: dest_dir.path(),
            keep_packages: true,
            allow_deltas: false,
            downloading_scheme: true,
            force_deltas: false,
            key_context: None,
            opts: &ProvideOptions::default(),
        };

        let result = pp.provide(&req).unwrap();
        assert_eq!(result.source, PackageSource::Downloaded);
    }

    #[test]
    fn signature_problem_response_retry_surfaces_as_signature_retry_error() {
        let fx = fixture();
        let foreign_key = SigningKey::from_bytes(&[22u8; 32]);
        let bytes = b"package signed by a foreign key, retried".to_vec();
        let url = Url::parse("https://example.com/repo/bash.rpm").unwrap();
        let provider = MapProvider::new();
        provider.insert(url.clone(), bytes.clone());

        let reporter = ScriptedReporter::refuse_everything();
        reporter.set_problem_response(ProblemResponse::Retry);
        let applier = NullDeltaApplier;
        let installed = NoInstalledEditions;
        let exceptions = ChecksumExceptionCache::new();

        let dest_dir = tempdir().unwrap();
        let sig_path = dest_dir.path().join("bash.rpm.asc");
        std::fs::write(&sig_path, sidecar(&foreign_key, &"f".repeat(64), &bytes)).unwrap();

        let item = PackageItem::new("oss", "bash.rpm", url, "bash.rpm").with_checksum(Checksum::from_bytes(&bytes));

        let pp = PackageProvider::new(&provider, &fx.ring, &reporter, None, &applier, &installed, &exceptions)
            .with_max_retries(2);
        let req = ProvideRequest {
            item: &item,
            deltas: &[],
            dest_dir: dest_dir.path(),
            keep_packages: true,
            allow_deltas: false,
            downloading_scheme: true,
            force_deltas: false,
            key_context: None,
            opts: &ProvideOptions::default(),
        };

        let err = pp.provide(&req).unwrap_err();
        assert!(matches!(err, PackageError::SignatureRetry { .. }));
    }

    #[test]
    fn signature_problem_response_abort_is_distinguishable() {
        let fx = fixture();
        let foreign_key = SigningKey::from_bytes(&[23u8; 32]);
        let bytes = b"package signed by a foreign key, aborted".to_vec();
        let url = Url::parse("https://example.com/repo/bash.rpm").unwrap();
        let provider = MapProvider::new();
        provider.insert(url.clone(), bytes.clone());

        // Default ScriptedReporter policy aborts on `problem()`.
        let reporter = ScriptedReporter::refuse_everything();
        let applier = NullDeltaApplier;
        let installed = NoInstalledEditions;
        let exceptions = ChecksumExceptionCache::new();

        let dest_dir = tempdir().unwrap();
        let sig_path = dest_dir.path().join("bash.rpm.asc");
        std::fs::write(&sig_path, sidecar(&foreign_key, &"f".repeat(64), &bytes)).unwrap();

        let item = PackageItem::new("oss", "bash.rpm", url, "bash.rpm").with_checksum(Checksum::from_bytes(&bytes));

        let pp = PackageProvider::new(&provider, &fx.ring, &reporter, None, &applier, &installed, &exceptions);
        let req = ProvideRequest {
            item: &item,
            deltas: &[],
            dest_dir: dest_dir.path(),
            keep_packages: true,
            allow_deltas: false,
            downloading_scheme: true,
            force_deltas: false,
            key_context: None,
            opts: &ProvideOptions::default(),
        };

        let err = pp.provide(&req).unwrap_err();
        assert!(matches!(err, PackageError::UserAbort { .. }));
    }

    #[test]
    fn async_executor_drives_the_same_provide_pipeline() {
        let fx = fixture();
        let bytes = b"package payload over the async executor".to_vec();
        let url = Url::parse("https://example.com/repo/bash.rpm").unwrap();
        let provider = MapProvider::new();
        provider.insert(url.clone(), bytes.clone());

        let reporter = ScriptedReporter::refuse_everything();
        let applier = NullDeltaApplier;
        let installed = NoInstalledEditions;
        let exceptions = ChecksumExceptionCache::new();

        let dest_dir = tempdir().unwrap();
        let sig_path = dest_dir.path().join("bash.rpm.asc");
        std::fs::write(&sig_path, sidecar(&fx.signing_key, &fx.key_id, &bytes)).unwrap();

        let item = PackageItem::new("oss", "bash.rpm", url, "bash.rpm").with_checksum(Checksum::from_bytes(&bytes));

        let exec = pkgrepo_core::AsyncExecutor::new().unwrap();
        let pp = PackageProvider::new_with_executor(&exec, &provider, &fx.ring, &reporter, None, &applier, &installed, &exceptions);
        let req = ProvideRequest {
            item: &item,
            deltas: &[],
            dest_dir: dest_dir.path(),
            keep_packages: true,
            allow_deltas: false,
            downloading_scheme: true,
            force_deltas: false,
            key_context: None,
            opts: &ProvideOptions::default(),
        };

        let result = pp.provide(&req).unwrap();
        assert_eq!(result.source, PackageSource::Downloaded);
    }
}
