use anyhow::{bail, Result};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{Config, FailurePolicy};
use crate::detector::GitHistory;
use crate::llm::factory;
use crate::pipeline::orchestrator::Orchestrator;
use crate::pipeline::translator::Translator;
use crate::util::split_list;

/// Build the run configuration: file, then environment, then CLI overrides
pub fn resolve_config(
    config_path: Option<String>,
    langs_override: Option<String>,
    failure_policy_override: Option<String>,
) -> Result<Config> {
    let mut config = Config::load_with_path(config_path)?;
    config.apply_env();

    if let Some(ref langs) = langs_override {
        info!("CLI override: languages = {}", langs);
        config.translate.languages = split_list(langs);
    }
    if let Some(ref policy) = failure_policy_override {
        info!("CLI override: failure_policy = {}", policy);
        config.translate.failure_policy = FailurePolicy::from_str(policy)?;
    }

    config.validate()?;
    Ok(config)
}

pub async fn run(
    repo: String,
    config_path: Option<String>,
    langs_override: Option<String>,
    failure_policy_override: Option<String>,
    dry_run: bool,
) -> Result<()> {
    let repo_path = Path::new(&repo);
    let config = resolve_config(config_path, langs_override, failure_policy_override)?;

    info!("Repository path: {}", repo_path.display());
    info!("Target languages: {}", config.translate.languages.join(", "));
    info!("Dry run: {}", dry_run);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("Interrupted, cancelling pending translations (Ctrl-C again to exit now)");
        on_interrupt.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted again, exiting");
            std::process::exit(130);
        }
    });

    let client = factory::create_client(&config, dry_run, cancel)?;
    let translator = Translator::new(client).with_labels(config.translate.labels.clone());
    let history = GitHistory::new(repo_path, Duration::from_secs(config.git.timeout_secs));
    let orchestrator = Orchestrator::new(translator, config.translate.clone(), repo_path);

    let report = orchestrator.run(&history).await?;

    if !report.is_success() {
        bail!(
            "{} of {} translation task(s) failed",
            report.failures.len(),
            report.failures.len() + report.written.len()
        );
    }

    if !report.written.is_empty() {
        info!("Wrote {} translated file(s)", report.written.len());
    }
    Ok(())
}
