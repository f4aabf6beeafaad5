//! `dfm config` – show where the configuration lives and what it says.

use anyhow::Result;
use dfm_core::config::{self, DfmConfig};

pub async fn run_config(cfg: &DfmConfig) -> Result<()> {
    let path = config::config_path()?;
    println!("# {}", path.display());
    print!("{}", toml::to_string_pretty(cfg)?);
    Ok(())
}
