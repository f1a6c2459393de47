use std::path::PathBuf;

use clap::Parser;
use color_eyre::Result;
use engine::{
    config::GeneratorConfig,
    image_model::{DEFAULT_MODEL, Gemini, ImageModel},
};

/// Generates a single image and writes it to disk
#[derive(clap::Parser)]
struct Arg {
    key: String,
    description: String,
    #[arg(short, long, default_value = "output.png")]
    output: PathBuf,
    #[arg(short, long, default_value = DEFAULT_MODEL)]
    model: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    pretty_env_logger::init();
    color_eyre::install()?;
    let Arg {
        key,
        description,
        output,
        model,
    } = Arg::parse();

    let config = GeneratorConfig {
        model,
        api_key: Some(key),
        ..Default::default()
    };
    let gemini = Gemini::new(&config);

    let image = gemini.get_image(&description).await?;
    std::fs::write(&output, &image.data)?;
    println!(
        "Saved image ({}), {} bytes",
        image.mime_type.as_deref().unwrap_or("unknown type"),
        image.data.len()
    );

    Ok(())
}
