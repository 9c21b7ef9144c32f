use anyhow::{Context, Result};
use pluginctl::{Config, Installer, LocalRegistryClient, PluginId, UninstallStatus};
use std::path::PathBuf;

pub fn run(plugin: String, registry_root: PathBuf) -> Result<()> {
    let id = PluginId::parse(&plugin).context("parsing plugin identifier")?;
    let config = Config::load().context("loading config")?;
    let registry = LocalRegistryClient::new(registry_root);
    let installer = Installer::new(
        Box::new(registry),
        &config.plugins_root,
        std::env::consts::OS,
        std::env::consts::ARCH,
    );

    let result = installer.uninstall(&id)?;
    match result.status {
        UninstallStatus::Removed => println!("removed {}", id.manifest_key()),
        UninstallStatus::NotFound => println!("{} is not installed", id.manifest_key()),
    }
    Ok(())
}
