use anyhow::{Context, Result};
use etcetera::app_strategy::{AppStrategy, AppStrategyArgs};
use std::fs;
use std::path::PathBuf;

// Windows -> AppData\Roaming\ytlog
#[cfg(target_os = "windows")]
use etcetera::app_strategy::Windows as Strategy;

// Mac & Linux -> ~/.config/ytlog, ~/.local/share/ytlog
#[cfg(not(target_os = "windows"))]
use etcetera::app_strategy::Xdg as Strategy;

pub struct AppPaths {
    pub config_file: PathBuf,
    pub quota_file: PathBuf,
    pub tables_dir: PathBuf,
    pub lock_file: PathBuf,
}

impl AppPaths {
    pub fn init() -> Result<Self> {
        let args = AppStrategyArgs {
            top_level_domain: "com".to_string(),
            author: "ytlog".to_string(),
            app_name: "ytlog".to_string(),
        };

        let strategy =
            Strategy::new(args).map_err(|_| anyhow::anyhow!("Could not determine system paths"))?;

        let config_dir = strategy.config_dir();
        let data_dir = strategy.data_dir();

        fs::create_dir_all(&config_dir)
            .with_context(|| format!("failed to create config dir: {}", config_dir.display()))?;

        let tables_dir = data_dir.join("tables");
        fs::create_dir_all(&tables_dir)
            .with_context(|| format!("failed to create tables dir: {}", tables_dir.display()))?;

        Ok(Self {
            config_file: config_dir.join("config.json"),
            quota_file: data_dir.join("quota.json"),
            lock_file: data_dir.join("tables.lock"),
            tables_dir,
        })
    }
}
