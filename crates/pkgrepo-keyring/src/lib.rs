//! Trusted/general key rings, signature verification, and the
//! user-interactive signature/trust workflow.
//!
//! The key material here is Ed25519 rather than OpenPGP — a deliberate
//! REDESIGN recorded in `DESIGN.md` — but the shape (two rings, safe-id
//! lookup, subkey-aware `providesKey`, an 8-step verification workflow
//! asking a `Reporter` at each judgment point) follows the original
//! `KeyRing`/`keyringwf.cc` design exactly.

mod error;
mod key;
mod keyring;
mod store;
mod verify_context;
mod workflow;

pub use error::{KeyringError, KeyringResult, SignatureErrorKind};
pub use key::{is_safe_id, DetachedSignature, KeyData, PublicKey, MIN_SAFE_ID_LEN};
pub use keyring::{KeyRing, Ring};
pub use verify_context::{TrustDecision, VerifyFileContext};
pub use workflow::{classify_failure, verify_file_signature, verify_file_signature_with, KeyContext};
