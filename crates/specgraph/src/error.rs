//! Error types for spec loading and resolution.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading or resolving specs.
#[derive(Debug, Error)]
pub enum Error {
    /// A spec definition file could not be read
    #[error("could not read spec file {path}: {source}")]
    Read {
        /// Path of the definition file
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// A spec definition file is not valid TOML for a spec
    #[error("invalid spec file {path}: {source}")]
    Parse {
        /// Path of the definition file
        path: PathBuf,
        /// Underlying TOML error
        source: toml::de::Error,
    },

    /// Walking a spec or source directory failed
    #[error("could not walk {path}: {source}")]
    Walk {
        /// Directory being walked
        path: PathBuf,
        /// Underlying walkdir error
        source: walkdir::Error,
    },

    /// The requirement graph loops back onto a spec already being resolved
    #[error("requirement cycle detected: {}", chain.join(" -> "))]
    Cycle {
        /// Spec names from the first occurrence to the repeated one
        chain: Vec<String>,
    },
}

/// Result type for spec operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_display() {
        let err = Error::Cycle {
            chain: vec!["web".into(), "base".into(), "web".into()],
        };
        assert_eq!(
            err.to_string(),
            "requirement cycle detected: web -> base -> web"
        );
    }
}
