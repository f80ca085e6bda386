//! Core types for specs and resolved manifests

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Content source value that enables the content mapping
pub const CONTENT_SOURCE_SPEC: &str = "spec";

/// A named, versioned configuration unit
///
/// Deserialized from a `*.spec` TOML file:
///
/// ```toml
/// name = "web"
/// version = "1.2"
/// requires = ["base"]
/// packages = ["nginx"]
///
/// [configs]
/// destination = "/etc/nginx"
///
/// [content]
/// source = "spec"
/// destination = "/var/www"
///
/// [commands]
/// pre = ["systemctl stop nginx"]
/// post = ["systemctl restart nginx"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spec {
    /// Unique name; definition files without one are ignored
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub version: String,

    /// Names of other specs applied along with this one
    #[serde(default)]
    pub requires: Vec<String>,

    /// OS packages to install
    #[serde(default)]
    pub packages: Vec<String>,

    #[serde(default)]
    pub configs: ConfigMapping,

    #[serde(default)]
    pub content: ContentMapping,

    #[serde(default)]
    pub commands: Commands,

    /// File this spec was loaded from
    #[serde(skip)]
    pub definition_path: PathBuf,

    /// Directory holding the definition file and its `configs/` and `content/` trees
    #[serde(skip)]
    pub definition_root: PathBuf,
}

impl Spec {
    /// Create an empty spec rooted at `root`
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            version: String::new(),
            requires: Vec::new(),
            packages: Vec::new(),
            configs: ConfigMapping::default(),
            content: ContentMapping::default(),
            commands: Commands::default(),
            definition_path: PathBuf::new(),
            definition_root: root.into(),
        }
    }

    /// Local directory holding config files
    pub fn configs_dir(&self) -> PathBuf {
        self.definition_root.join("configs")
    }

    /// Local directory holding content files
    pub fn content_dir(&self) -> PathBuf {
        self.definition_root.join("content")
    }

    /// Whether this spec ships its own content files
    pub fn ships_content(&self) -> bool {
        self.content.source == CONTENT_SOURCE_SPEC && !self.content.destination.is_empty()
    }
}

/// Maps `<spec-root>/configs/` onto a remote root
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigMapping {
    /// Remote destination root; empty disables the mapping
    #[serde(default)]
    pub destination: String,
}

/// Maps `<spec-root>/content/` onto a remote root
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentMapping {
    /// Where the content comes from; only `"spec"` is transferred
    #[serde(default)]
    pub source: String,

    /// Remote destination root
    #[serde(default)]
    pub destination: String,
}

/// Shell commands run around package installation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commands {
    #[serde(default)]
    pub pre: Vec<String>,

    #[serde(default)]
    pub post: Vec<String>,
}

/// One planned file move from this machine to a target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTransfer {
    /// Local file path
    pub source: PathBuf,
    /// Remote absolute path
    pub destination: String,
    /// Remote parent directory of `destination`
    pub folder: String,
}

impl FileTransfer {
    /// Plan a transfer, deriving the folder from the destination
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<String>) -> Self {
        let destination = destination.into();
        let folder = match destination.rfind('/') {
            Some(0) => "/".to_string(),
            Some(idx) => destination[..idx].to_string(),
            None => String::new(),
        };
        Self {
            source: source.into(),
            destination,
            folder,
        }
    }
}

/// Flattened output of resolving a spec's requirement graph
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedManifest {
    /// Spec the manifest was resolved from
    pub spec: String,
    pub packages: Vec<String>,
    pub pre_commands: Vec<String>,
    pub post_commands: Vec<String>,
    pub file_transfers: Vec<FileTransfer>,
}

impl ResolvedManifest {
    /// Check if applying this manifest would do nothing
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
            && self.pre_commands.is_empty()
            && self.post_commands.is_empty()
            && self.file_transfers.is_empty()
    }
}
