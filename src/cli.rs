use clap::Parser;

/// Executes a tabular API test plan against a live target and writes the
/// results back into the plan file.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the plan file
    #[arg(short, long, default_value = "planproof.toml")]
    pub plan: String,

    /// Pause between rows in milliseconds, keeps the live stream readable
    #[arg(long, default_value_t = 500)]
    pub delay_ms: u64,

    /// Emit one JSON event per executed row instead of styled output
    #[arg(long)]
    pub json: bool,
}
