//! Media/file acquisition abstraction.
//!
//! This crate defines the `Provider` capability the rest of the repository
//! core consumes to fetch bytes for a URL or path. It
//! deliberately ships no real HTTP/FTP transport — that is an explicit
//! non-goal of the core — only the trait boundary, the primitives
//! that cross it (`Deadline`, `CancellationToken`), and test doubles.

mod cancellation;
mod deadline;
mod error;
mod fake;
mod provider;

pub use cancellation::CancellationToken;
pub use deadline::Deadline;
pub use error::{NetworkErrorKind, ProviderError, ProviderResult};
pub use fake::{MapProvider, NullProvider};
pub use provider::{AsyncProvider, AuthCallback, ProvideOptions, Provider, ProvidedFile};
