//! Configuration command implementations

use crate::cli::{ConfigCommands, Output};
use crate::config::PixbatchConfig;
use anyhow::Result;

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum ConfigFormat {
    Toml,
    Json,
    Yaml,
}

/// Execute config commands
pub async fn execute(cmd: ConfigCommands, config_path: Option<&str>, output: &Output) -> Result<()> {
    match cmd {
        ConfigCommands::Show { format } => show(format, config_path),
        ConfigCommands::Validate => validate(config_path, output),
    }
}

fn show(format: ConfigFormat, config_path: Option<&str>) -> Result<()> {
    let config = PixbatchConfig::load(config_path, None)?;
    let rendered = match format {
        ConfigFormat::Toml => toml::to_string_pretty(&config)?,
        ConfigFormat::Json => serde_json::to_string_pretty(&config)?,
        ConfigFormat::Yaml => serde_yml::to_string(&config)?,
    };
    println!("{}", rendered.trim_end());
    Ok(())
}

fn validate(config_path: Option<&str>, output: &Output) -> Result<()> {
    output.header("✅ Validating Configuration");

    let config = PixbatchConfig::load(config_path, None)?;
    if let Err(err) = config.validate() {
        output.error("Configuration is invalid");
        output.error(&err.to_string());
        std::process::exit(1);
    }

    output.success("Configuration is valid");
    output.category("Effective settings");
    output.key_value("Input directory:", &config.batch.input_dir.display().to_string(), false);
    output.key_value("Output directory:", &config.batch.output_dir.display().to_string(), false);

    let concurrency = match config.batch.max_concurrency {
        Some(n) => n.to_string(),
        None => format!("{} (logical CPUs)", config.resolved_concurrency()),
    };
    output.key_value("Max concurrency:", &concurrency, true);

    let timeout = match config.batch.item_timeout_secs {
        0 => "none".to_string(),
        secs => format!("{secs}s"),
    };
    output.key_value("Item timeout:", &timeout, false);
    output.key_value("JPEG quality:", &config.output.jpeg_quality.to_string(), false);
    Ok(())
}
