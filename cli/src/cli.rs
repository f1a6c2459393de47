use std::path::PathBuf;

#[derive(Debug, clap::Parser)]
#[command(
    name = "site_images",
    about = "Generate the website's illustration images with Gemini",
    long_about = indoc::indoc! {"
        Generate the website's illustration images with Gemini.

        Reads a RON batch file listing (identifier, prompt) pairs and requests one
        image per entry, strictly one after another with a pause in between. Each
        image is written to the output directory under its identifier, replacing
        any previous version. Failed images are listed at the end; re-run just
        those with --only.

        The API key is taken from --api-key, GEMINI_API_KEY or LLM_API_KEY, in that
        order. A .env file in the working directory is honoured.
    "}
)]
pub struct Cli {
    /// Batch file, defaults to ./images.ron or the user config dir
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub api_key: Option<String>,

    /// Overrides the batch file's model
    #[arg(short, long)]
    pub model: Option<String>,

    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    #[arg(long)]
    pub delay_secs: Option<u64>,

    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Only generate these identifiers (repeatable)
    #[arg(long = "only", value_name = "IDENTIFIER")]
    pub only: Vec<String>,
}
