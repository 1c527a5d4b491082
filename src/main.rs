use anyhow::Result;
use clap::Parser;
use doc_translate::cli;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "doc-translate", version)]
#[command(
    about = "Translate Markdown documents changed by the latest commit",
    long_about = "Reads LANGS (comma-separated language codes) and an optional \
ZHIPUAI_API_KEY or OPENAI_API_KEY from the environment, translates the \
documents changed by the latest commit and writes them next to the source tree."
)]
struct Cli {
    /// Repository path (defaults to current directory)
    #[arg(long, default_value = ".")]
    repo: String,

    /// Path to config file
    /// (defaults to ./doc-translate.toml, then ~/.config/doc-translate/config.toml)
    #[arg(long)]
    config: Option<String>,

    /// Target languages, comma-separated (overrides LANGS)
    #[arg(long)]
    langs: Option<String>,

    /// What to do when a translation fails for good: fail-fast, collect
    #[arg(long)]
    failure_policy: Option<String>,

    /// Use the offline echo client instead of a real provider
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    cli::run::run(
        cli.repo,
        cli.config,
        cli.langs,
        cli.failure_policy,
        cli.dry_run,
    )
    .await
}
