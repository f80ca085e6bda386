//! # specgraph
//!
//! Loads declarative host specs and resolves their requirement graph.
//!
//! A spec names packages to install, config and content trees to copy, and
//! shell commands to run before and after installation. Specs can require
//! other specs; resolving a spec walks those requirements and flattens
//! everything into a [`ResolvedManifest`].
//!
//! ## Example
//!
//! ```no_run
//! use specgraph::{SpecStore, resolve};
//! use std::path::PathBuf;
//!
//! let store = SpecStore::load(&[PathBuf::from("/etc/fleetform/specs")])?;
//! let manifest = resolve(&store, "web")?;
//! for package in &manifest.packages {
//!     println!("install {package}");
//! }
//! # Ok::<(), specgraph::Error>(())
//! ```

pub mod error;
pub mod resolver;
pub mod store;
pub mod types;

pub use error::{Error, Result};
pub use resolver::{
    Resolver, resolve, resolve_file_transfers, resolve_packages, resolve_post_commands,
    resolve_pre_commands,
};
pub use store::{SpecStore, load_spec_file};
pub use types::{
    CONTENT_SOURCE_SPEC, Commands, ConfigMapping, ContentMapping, FileTransfer,
    ResolvedManifest, Spec,
};
