//! Options controlling how an archive is opened and how thoroughly it is checked.
//!
//! Options can be built in code or loaded from TOML:
//!
//! ```
//! use zipdir::{IndexOptions, InitMethod};
//!
//! let options = IndexOptions::from_toml_str(r#"
//!     init_method = "validate"
//!     read_only = true
//! "#)?;
//! assert_eq!(options.init_method, InitMethod::Validate);
//! # Ok::<(), zipdir::ZipDirError>(())
//! ```

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How much work the builder does per entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitMethod {
    /// Parse the directory; resolve data offsets lazily (eagerly for encrypted archives)
    #[default]
    Default,
    /// Resolve and cross-check every entry against its local header
    Full,
    /// `Full`, then decompress every entry and verify its CRC32
    Validate,
}

/// Options for opening an archive index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexOptions {
    pub init_method: InitMethod,
    /// Open the file for reading only
    pub read_only: bool,
    /// Start a new, empty archive even if the file exists
    pub create_new: bool,
    /// Never compact the archive when rewriting its directory
    pub dont_compact: bool,
    /// Keep the archive's path on the index
    pub memorize_path: bool,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            init_method: InitMethod::Default,
            read_only: true,
            create_new: false,
            dont_compact: false,
            memorize_path: true,
        }
    }
}

impl IndexOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn init_method(mut self, init_method: InitMethod) -> Self {
        self.init_method = init_method;
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn create_new(mut self, create_new: bool) -> Self {
        self.create_new = create_new;
        self
    }

    pub fn dont_compact(mut self, dont_compact: bool) -> Self {
        self.dont_compact = dont_compact;
        self
    }

    pub fn memorize_path(mut self, memorize_path: bool) -> Self {
        self.memorize_path = memorize_path;
        self
    }

    /// Parse options from a TOML document; missing keys take their defaults
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Load options from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}
