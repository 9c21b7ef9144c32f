use anyhow::{Context, Result};
use pluginctl::Config;
use pluginctl::ManifestStore;

pub fn run() -> Result<()> {
    let config = Config::load().context("loading config")?;
    let manifest = ManifestStore::new(&config.plugins_root);
    let records = manifest.list()?;

    if records.is_empty() {
        println!("no plugins installed");
        return Ok(());
    }

    for record in records {
        println!("{} @ {} ({})", record.id, record.version, record.shasum);
    }

    Ok(())
}
