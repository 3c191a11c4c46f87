//! `forgeloop config`: Configuration management commands.

use anyhow::{Context, bail};
use forgeloop_config::AppConfig;
use std::path::PathBuf;

fn config_path() -> PathBuf {
    AppConfig::config_dir().join("config.toml")
}

pub fn init(force: bool) -> anyhow::Result<()> {
    let path = config_path();
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating {}", dir.display()))?;
    }
    std::fs::write(&path, AppConfig::default_toml())
        .with_context(|| format!("writing {}", path.display()))?;
    println!("✅ Wrote {}", path.display());
    if std::env::var_os("FORGELOOP_API_KEY").is_none()
        && std::env::var_os("OPENAI_API_KEY").is_none()
    {
        println!("   Set FORGELOOP_API_KEY or add api_key to the file before chatting.");
    }
    Ok(())
}

pub fn show() -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load config")?;
    println!("{}", render_redacted(&config)?);
    Ok(())
}

pub fn path() {
    println!("{}", config_path().display());
}

fn render_redacted(config: &AppConfig) -> anyhow::Result<String> {
    let mut shown = config.clone();
    if shown.api_key.is_some() {
        shown.api_key = Some("[REDACTED]".into());
    }
    Ok(toml::to_string_pretty(&shown)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_is_valid() {
        assert!(config_path().ends_with("config.toml"));
    }

    #[test]
    fn show_never_prints_the_key() {
        let config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        let rendered = render_redacted(&config).unwrap();
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
