use std::path::Path;

use diarum_core::media::CheveretoClient;
use diarum_core::models::CheveretoSettings;

use crate::auth::SessionStore;
use crate::cli::ImageCommands;
use crate::commands::common::{backend_url, load_client_config, mask_secret, signed_in_service};
use crate::error::CliError;

pub async fn run_image(command: ImageCommands) -> Result<(), CliError> {
    let config = load_client_config()?;
    signed_in_service(&config).await?;
    let base_url = backend_url(&config)?;
    let client = CheveretoClient::new(&base_url, SessionStore::for_backend(&base_url))?;

    match command {
        ImageCommands::Settings => {
            let settings = client.fetch_settings().await?;
            for line in format_settings_lines(&settings) {
                println!("{line}");
            }
        }
        ImageCommands::Configure {
            domain,
            api_key,
            album_id,
            disable,
        } => {
            let current = client.fetch_settings().await?;
            let updated = merge_settings(current, domain, api_key, album_id, disable);
            let saved = client.save_settings(&updated).await?;
            println!(
                "Image hosting {}",
                if saved.enabled { "enabled" } else { "disabled" }
            );
        }
        ImageCommands::Test { domain, api_key } => {
            let result = client.test_connection(&domain, &api_key).await?;
            if !result.success {
                return Err(CliError::ConnectionTest(result.message));
            }
            println!("{}", result.message);
        }
        ImageCommands::Upload { path } => {
            let bytes = std::fs::read(&path)?;
            let url = client.upload(&upload_file_name(&path), bytes).await?;
            println!("{url}");
        }
    }
    Ok(())
}

/// Layer `image configure` flags over the stored settings.
pub fn merge_settings(
    current: CheveretoSettings,
    domain: Option<String>,
    api_key: Option<String>,
    album_id: Option<String>,
    disable: bool,
) -> CheveretoSettings {
    CheveretoSettings {
        enabled: !disable,
        domain: domain.unwrap_or(current.domain),
        api_key: api_key.unwrap_or(current.api_key),
        album_id: album_id.unwrap_or(current.album_id),
    }
}

pub fn format_settings_lines(settings: &CheveretoSettings) -> Vec<String> {
    let or_unset = |value: &str| {
        if value.is_empty() {
            "(not set)".to_string()
        } else {
            value.to_string()
        }
    };
    vec![
        format!("Enabled: {}", settings.enabled),
        format!("Domain: {}", or_unset(&settings.domain)),
        format!("API key: {}", mask_secret(&settings.api_key)),
        format!("Album: {}", or_unset(&settings.album_id)),
    ]
}

pub fn upload_file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| "image".to_string(), |name| name.to_string_lossy().into_owned())
}
