//! Individual package retrieval: cache-or-fetch, delta reconstruction, and
//! the signature/checksum-checked retry loop, wrapped as `PackageProvider`.
//!
//! This crate sits beside `pkgrepo-manager` rather than under it: both
//! depend on `pkgrepo-core`/`pkgrepo-provider`/`pkgrepo-keyring` but neither
//! depends on the other. A caller that needs both repository metadata
//! refresh and package retrieval (a full package manager front end) wires
//! them together itself, the way `RepoManager` wires `pkgrepo-mirrorlist`
//! into its own refresh path without `pkgrepo-mirrorlist` depending back.

mod cache;
mod checksum_exceptions;
mod delta;
mod disposer;
mod error;
mod item;
mod provider;

pub use cache::TopLevelCache;
pub use checksum_exceptions::ChecksumExceptionCache;
pub use delta::{DeltaApplier, InstalledEditions, NoInstalledEditions, NullDeltaApplier};
pub use disposer::ManagedPackageFile;
pub use error::{PackageError, PackageResult};
pub use item::{Checksum, DeltaCandidate, PackageItem};
pub use provider::{PackageProvider, PackageSource, ProvideRequest, ProvidedPackage};
