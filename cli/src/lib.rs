use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use color_eyre::{
    Result,
    eyre::{WrapErr as _, bail, ensure, eyre},
};
use engine::{
    batch::{GenerationResult, RateLimitedSequential, Report, WorkItem, run_with},
    config::{BatchFile, GeneratorConfig},
    image_model::Gemini,
};
use log::debug;
use tokio::pin;
use tokio_stream::StreamExt;

use crate::cli::Cli;

pub mod cli;

pub const BATCH_FILE_NAME: &str = "images.ron";
pub const API_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "LLM_API_KEY"];

pub fn config_path() -> Result<PathBuf> {
    Ok(dirs::config_local_dir()
        .ok_or(eyre!("Couldn't get config dir"))?
        .join("site_images.ron"))
}

pub fn find_batch_file(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    let local = PathBuf::from(BATCH_FILE_NAME);
    if local.exists() {
        return Ok(local);
    }

    let path = config_path()?;
    ensure!(
        path.exists(),
        "No batch file given and neither ./{BATCH_FILE_NAME} nor {} exists",
        path.display()
    );
    Ok(path)
}

/// First non-empty of the flag and the known env vars.
pub fn resolve_api_key(
    flag: Option<String>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Option<String> {
    flag.into_iter()
        .chain(API_KEY_VARS.into_iter().filter_map(|var| lookup(var)))
        .find(|key| !key.trim().is_empty())
}

/// Keeps the items named in `only`, in batch order. Empty `only` keeps all.
pub fn select_items(items: Vec<WorkItem>, only: &[String]) -> Result<Vec<WorkItem>> {
    if only.is_empty() {
        return Ok(items);
    }

    let known: HashSet<&str> = items.iter().map(|i| i.identifier.as_str()).collect();
    if let Some(unknown) = only.iter().find(|id| !known.contains(id.as_str())) {
        bail!("Unknown image identifier: {unknown}");
    }

    Ok(items
        .into_iter()
        .filter(|item| only.contains(&item.identifier))
        .collect())
}

/// Loads the batch file and applies everything given on the command line.
pub fn prepare(
    cli: &Cli,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(Vec<WorkItem>, GeneratorConfig)> {
    let path = find_batch_file(cli.config.as_deref())?;
    debug!("Using batch file {}", path.display());
    let mut batch = BatchFile::load(&path)?;

    if let Some(model) = &cli.model {
        batch.model = model.clone();
    }
    if let Some(secs) = cli.timeout_secs {
        batch.timeout_secs = secs;
    }
    if let Some(secs) = cli.delay_secs {
        batch.delay_secs = secs;
    }

    let base_dir = path.parent().unwrap_or(Path::new("."));
    let api_key = resolve_api_key(cli.api_key.clone(), lookup);
    let (items, mut config) = batch.into_parts(base_dir, api_key);
    if let Some(dir) = &cli.output_dir {
        config.output_dir = dir.clone();
    }

    Ok((select_items(items, &cli.only)?, config))
}

pub async fn run_cli(cli: Cli) -> Result<()> {
    let (items, config) = prepare(&cli, |var| std::env::var(var).ok())?;
    fs::create_dir_all(&config.output_dir).wrap_err_with(|| {
        format!(
            "Couldn't create output dir {}",
            config.output_dir.display()
        )
    })?;

    println!(
        "Generating {} images with {} ({} between requests)...",
        items.len(),
        config.model,
        delay_label(config.delay)
    );
    println!("Output: {}\n", config.output_dir.display());
    if config.api_key.is_none() {
        println!("ERROR: No {} found", API_KEY_VARS.join(" or "));
    }

    let model = Gemini::new(&config);
    let scheduler = RateLimitedSequential::new(config.delay);
    let results = stream_with_progress(&items, &model, &config.output_dir, &scheduler).await;

    println!("\n--- Results ---");
    let report = Report(&results);
    print!("{report}");

    let failed = report.failed_identifiers();
    ensure!(
        failed.is_empty(),
        "{} image(s) failed, re-run with: {}",
        failed.len(),
        failed
            .iter()
            .map(|id| format!("--only {id}"))
            .collect::<Vec<_>>()
            .join(" ")
    );
    Ok(())
}

async fn stream_with_progress(
    items: &[WorkItem],
    model: &Gemini,
    output_dir: &Path,
    scheduler: &RateLimitedSequential,
) -> Vec<GenerationResult> {
    let stream = run_with(items, model, output_dir, scheduler);
    pin!(stream);

    let mut results = Vec::with_capacity(items.len());
    while let Some(result) = stream.next().await {
        match &result.outcome {
            Ok(saved) => println!(
                "  {} OK ({:.0} KB)",
                result.identifier,
                saved.size as f64 / 1024.0
            ),
            Err(e) => println!("  {} FAILED ({e})", result.identifier),
        }
        results.push(result);
    }
    results
}

pub fn delay_label(delay: Duration) -> String {
    format!("{}s", delay.as_secs_f64())
}
