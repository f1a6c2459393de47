use std::{
    fmt,
    fs::File,
    io::{self, Write},
    path::{Path, PathBuf},
};

use log::{info, warn};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tokio_stream::{Stream, StreamExt};

use crate::{
    config::GeneratorConfig,
    image_model::{ErrorKind, Gemini, GenerationError, ImageModel},
};

pub mod scheduler;
pub use scheduler::{RateLimitedSequential, Scheduler, Sleeper, TokioSleeper};

/// One image to produce: the output file name and the prompt for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub identifier: String,
    pub prompt: String,
}

impl WorkItem {
    pub fn new(identifier: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            prompt: prompt.into(),
        }
    }

    pub fn output_path(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(&self.identifier)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedImage {
    pub path: PathBuf,
    pub size: usize,
}

#[derive(Debug)]
pub struct GenerationResult {
    pub identifier: String,
    pub outcome: Result<SavedImage, GenerationError>,
}

impl GenerationResult {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.outcome.as_ref().err().map(GenerationError::kind)
    }
}

/// Generates every item with Gemini, strictly in order, waiting `config.delay`
/// between items. Never fails; failures are recorded per item.
pub async fn run(items: &[WorkItem], config: &GeneratorConfig) -> Vec<GenerationResult> {
    let model = Gemini::new(config);
    let scheduler = RateLimitedSequential::new(config.delay);
    run_with(items, &model, &config.output_dir, &scheduler)
        .collect()
        .await
}

/// Like [`run`] but with the model and scheduling strategy supplied by the
/// caller. Results are yielded as they complete.
pub fn run_with<'a, S: Scheduler>(
    items: &'a [WorkItem],
    model: &'a dyn ImageModel,
    output_dir: &'a Path,
    scheduler: &'a S,
) -> impl Stream<Item = GenerationResult> + 'a {
    scheduler.schedule(items, move |item| generate_one(item, model, output_dir))
}

pub async fn generate_one(
    item: &WorkItem,
    model: &dyn ImageModel,
    output_dir: &Path,
) -> GenerationResult {
    info!("Generating {} with {}...", item.identifier, model.model());
    let outcome = try_generate(item, model, output_dir).await;
    match &outcome {
        Ok(saved) => info!(
            "{}: OK ({:.0} KB)",
            item.identifier,
            saved.size as f64 / 1024.0
        ),
        Err(e) => warn!("{}: FAILED ({e})", item.identifier),
    }

    GenerationResult {
        identifier: item.identifier.clone(),
        outcome,
    }
}

async fn try_generate(
    item: &WorkItem,
    model: &dyn ImageModel,
    output_dir: &Path,
) -> Result<SavedImage, GenerationError> {
    let image = model.get_image(&item.prompt).await?;
    let path = item.output_path(output_dir);
    let size = image.data.len();

    let target = path.clone();
    let written = tokio::task::spawn_blocking(move || {
        replace_file(&target, |file| file.write_all(&image.data))
    })
    .await
    .unwrap_or_else(|e| Err(io::Error::other(e)));

    match written {
        Ok(()) => Ok(SavedImage { path, size }),
        Err(source) => Err(GenerationError::Io { path, source }),
    }
}

/// Writes into a temp file next to `path` and renames it over `path` once
/// `write` succeeded. On failure the previous file is untouched and the temp
/// file is removed.
fn replace_file(path: &Path, write: impl FnOnce(&mut File) -> io::Result<()>) -> io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o644))?;
    }
    write(tmp.as_file_mut())?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Human readable summary of a finished batch.
pub struct Report<'a>(pub &'a [GenerationResult]);

impl Report<'_> {
    pub fn succeeded(&self) -> usize {
        self.0.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed_identifiers(&self) -> Vec<&str> {
        self.0
            .iter()
            .filter(|r| !r.is_success())
            .map(|r| r.identifier.as_str())
            .collect()
    }
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Generated: {}/{}", self.succeeded(), self.0.len())?;
        for result in self.0 {
            match &result.outcome {
                Ok(_) => writeln!(f, "  [OK] {}", result.identifier)?,
                Err(e) => writeln!(f, "  [FAILED] {} ({e})", result.identifier)?,
            }
        }
        Ok(())
    }
}
