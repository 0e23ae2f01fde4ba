use crate::cli::ConfigCommands;
use crate::cli_config::{default_config_path, resolve_client_config, CliConfig};
use crate::error::CliError;

pub fn run_config(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            api_url,
            debounce_ms,
            saved_display_ms,
        } => run_config_init(api_url.as_deref(), debounce_ms, saved_display_ms),
        ConfigCommands::Show => run_config_show(),
    }
}

pub fn run_config_init(
    api_url: Option<&str>,
    debounce_ms: Option<u64>,
    saved_display_ms: Option<u64>,
) -> Result<(), CliError> {
    let mut config = CliConfig::load().map_err(CliError::Config)?;
    apply_config_init(&mut config, api_url, debounce_ms, saved_display_ms)?;
    let path = config.save().map_err(CliError::Config)?;
    println!("Saved config to {}", path.display());
    Ok(())
}

/// Apply `config init` flags; omitted flags keep the stored value.
pub fn apply_config_init(
    config: &mut CliConfig,
    api_url: Option<&str>,
    debounce_ms: Option<u64>,
    saved_display_ms: Option<u64>,
) -> Result<(), CliError> {
    if let Some(url) = api_url {
        config.set_api_url(url).map_err(CliError::Config)?;
    }
    if config.api_url.is_none() {
        return Err(CliError::Config(
            "Missing backend URL. Pass --api-url <URL>.".to_string(),
        ));
    }
    if debounce_ms.is_some() {
        config.sync_debounce_ms = debounce_ms;
    }
    if saved_display_ms.is_some() {
        config.saved_display_ms = saved_display_ms;
    }
    Ok(())
}

pub fn run_config_show() -> Result<(), CliError> {
    let path = default_config_path().map_err(CliError::Config)?;
    let file = CliConfig::load_from_path(&path).map_err(CliError::Config)?;
    let effective = resolve_client_config(&file)?;
    let sync = effective.sync();

    println!("Config file: {}", path.display());
    println!(
        "Backend URL: {}",
        effective.api_url.as_deref().unwrap_or("(not set)")
    );
    println!("Sync debounce: {} ms", sync.debounce.as_millis());
    println!("Saved status shown for: {} ms", sync.saved_display.as_millis());
    Ok(())
}
