use std::path::PathBuf;

use clap::{ArgGroup, Parser};

#[derive(Parser, Debug, Clone)]
#[command(name = "khawarizmi", about = "Ask data questions and render the pipeline's report and charts", version)]
#[command(group(ArgGroup::new("md_switch").args(["md", "no_md"]).multiple(false)))]
pub struct Cli {
    /// The data question to ask.
    #[arg(value_name = "QUESTION")]
    pub question: Option<String>,

    /// Model identifier sent to the pipeline.
    #[arg(long)]
    pub model: Option<String>,

    /// Pipeline endpoint (overrides PIPELINE_URL).
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Response shape of the pipeline: split, gateway or flat.
    #[arg(long)]
    pub schema: Option<String>,

    /// Write the rendered page as standalone HTML.
    #[arg(long, value_name = "PATH")]
    pub out: Option<PathBuf>,

    /// Start the interactive terminal UI.
    #[arg(long)]
    pub tui: bool,

    /// Render the report as Markdown.
    #[arg(long)]
    pub md: bool,
    /// Print the report as plain text.
    #[arg(long = "no-md")]
    pub no_md: bool,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}
