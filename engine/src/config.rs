//! Batch file format and the settings a run is driven by.
//!
//! A batch file is RON:
//!
//! ```ron
//! (
//!     model: "gemini-3-pro-image-preview",
//!     output_dir: "images",
//!     delay_secs: 3,
//!     images: [
//!         (identifier: "hero.png", prompt: "A glowing digital brain"),
//!     ],
//! )
//! ```
//!
//! Everything except `images` is optional.

use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use color_eyre::{
    Result,
    eyre::{WrapErr as _, ensure},
};
use serde::{Deserialize, Serialize};

use crate::{
    batch::WorkItem,
    image_model::{DEFAULT_ENDPOINT_BASE, DEFAULT_MODEL},
};

pub const DEFAULT_TIMEOUT_SECS: u64 = 180;
pub const DEFAULT_DELAY_SECS: u64 = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchFile {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_endpoint_base")]
    pub endpoint_base: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_delay_secs")]
    pub delay_secs: u64,
    pub images: Vec<WorkItem>,
}

fn default_model() -> String {
    DEFAULT_MODEL.into()
}

fn default_endpoint_base() -> String {
    DEFAULT_ENDPOINT_BASE.into()
}

fn default_output_dir() -> PathBuf {
    "images".into()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_delay_secs() -> u64 {
    DEFAULT_DELAY_SECS
}

/// Everything `run` needs besides the work items.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub endpoint_base: String,
    pub model: String,
    /// `None` fails every item with `MissingCredential`, never the run itself.
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub delay: Duration,
    pub output_dir: PathBuf,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            endpoint_base: default_endpoint_base(),
            model: default_model(),
            api_key: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            delay: Duration::from_secs(DEFAULT_DELAY_SECS),
            output_dir: default_output_dir(),
        }
    }
}

impl BatchFile {
    pub fn load(path: &Path) -> Result<Self> {
        let src = fs::read_to_string(path)
            .wrap_err_with(|| format!("Couldn't read batch file {}", path.display()))?;
        let batch: BatchFile = ron::from_str(&src)
            .wrap_err_with(|| format!("Couldn't parse batch file {}", path.display()))?;
        batch.validate()?;
        Ok(batch)
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for item in &self.images {
            ensure!(
                is_plain_file_name(&item.identifier),
                "Image identifier must be a plain file name: {:?}",
                item.identifier
            );
            ensure!(
                seen.insert(item.identifier.as_str()),
                "Duplicate image identifier: {}",
                item.identifier
            );
        }
        Ok(())
    }

    /// Splits the file into work items and a config. A relative output dir is
    /// taken relative to `base_dir`, usually the batch file's directory.
    pub fn into_parts(
        self,
        base_dir: &Path,
        api_key: Option<String>,
    ) -> (Vec<WorkItem>, GeneratorConfig) {
        let config = GeneratorConfig {
            endpoint_base: self.endpoint_base,
            model: self.model,
            api_key,
            timeout: Duration::from_secs(self.timeout_secs),
            delay: Duration::from_secs(self.delay_secs),
            output_dir: base_dir.join(self.output_dir),
        };
        (self.images, config)
    }
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && Path::new(name).file_name().is_some()
}
