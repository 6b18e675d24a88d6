//! Repository backend type.

use std::fmt;
use std::str::FromStr;

/// The metadata format a repository's packages are described in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepoType {
    /// Type has not been probed/configured yet.
    #[default]
    None,
    /// `rpm-md` (createrepo) metadata.
    RpmMd,
    /// YaST2 legacy metadata.
    Yast2,
    /// A flat directory of packages with no metadata at all.
    PlainDir,
}

impl RepoType {
    /// The `.repo` file's `type=` value for this variant, or `None` for
    /// [`RepoType::None`] (omitted from the file).
    pub fn as_ini_value(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::RpmMd => Some("rpm-md"),
            Self::Yast2 => Some("yast2"),
            Self::PlainDir => Some("plaindir"),
        }
    }
}

impl fmt::Display for RepoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "NONE",
            Self::RpmMd => "rpm-md",
            Self::Yast2 => "yast2",
            Self::PlainDir => "plaindir",
        })
    }
}

/// Error returned by [`RepoType::from_str`] for an unrecognized value.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown repository type '{0}'")]
pub struct UnknownRepoType(pub String);

impl FromStr for RepoType {
    type Err = UnknownRepoType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(Self::None),
            "rpm-md" | "rpmmd" | "yum" => Ok(Self::RpmMd),
            "yast2" | "susetags" => Ok(Self::Yast2),
            "plaindir" => Ok(Self::PlainDir),
            other => Err(UnknownRepoType(other.to_string())),
        }
    }
}
