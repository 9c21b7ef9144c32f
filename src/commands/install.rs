use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use pluginctl::{Config, DeployConfig, InstallStage, InstallStatus, Installer, LocalRegistryClient, PluginId};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

fn spinner() -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    bar.enable_steady_tick(std::time::Duration::from_millis(80));
    bar
}

fn stage_label(stage: InstallStage) -> &'static str {
    match stage {
        InstallStage::Resolving => "resolving",
        InstallStage::Verifying => "verifying",
        InstallStage::Extracting => "extracting",
        InstallStage::Complete => "done",
    }
}

pub fn run(
    plugins: Vec<String>,
    deploy_config: Option<PathBuf>,
    registry_root: PathBuf,
    os: Option<String>,
    arch: Option<String>,
    missing_only: bool,
) -> Result<()> {
    let mut roots: Vec<PluginId> = plugins
        .iter()
        .map(|s| PluginId::parse(s))
        .collect::<Result<_, _>>()
        .context("parsing plugin identifiers")?;

    if let Some(path) = deploy_config {
        let parsed = DeployConfig::load(&path)
            .with_context(|| format!("reading deploy config at {}", path.display()))?;
        roots.extend(parsed.dependencies);
    }

    if roots.is_empty() {
        anyhow::bail!("nothing to install: pass plugin identifiers or --deploy-config");
    }

    let config = Config::load().context("loading config")?;
    let registry = LocalRegistryClient::new(registry_root);
    let os = os.unwrap_or_else(|| std::env::consts::OS.to_string());
    let arch = arch.unwrap_or_else(|| std::env::consts::ARCH.to_string());
    let installer = Installer::new(Box::new(registry), &config.plugins_root, os, arch);

    let bar = spinner();
    let progress_bar = bar.clone();
    let download_progress = move |downloaded: u64, total: u64| {
        if total > 0 {
            progress_bar.set_message(format!("downloading ({downloaded}/{total} bytes)"));
        }
    };
    let stage_bar = bar.clone();
    let stage_cb = move |id: &PluginId, stage: InstallStage| {
        stage_bar.set_message(format!("{}: {}", id, stage_label(stage)));
    };

    let token = CancellationToken::new();
    let results = if missing_only {
        installer.install_missing(&roots, &download_progress, &stage_cb, &token)?
    } else {
        installer.install_batch(&roots, &download_progress, &stage_cb, &token)?
    };
    bar.finish_and_clear();

    let mut had_failure = false;
    for result in &results {
        match result.status {
            InstallStatus::Installed => println!(
                "installed {} @ {}",
                result.id.manifest_key(),
                result.resolved_version.as_deref().unwrap_or("?"),
            ),
            InstallStatus::Skipped => println!("skipped {} (already installed)", result.id.manifest_key()),
            InstallStatus::Failed => {
                had_failure = true;
                eprintln!(
                    "failed {}: {}",
                    result.id.manifest_key(),
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
        }
    }

    if had_failure {
        anyhow::bail!("one or more plugins failed to install");
    }

    Ok(())
}
