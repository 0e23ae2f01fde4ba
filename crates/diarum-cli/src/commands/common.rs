use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::Days;
use diarum_core::config::ClientConfig;
use diarum_core::models::InvalidDiaryDate;
use diarum_core::DiaryDate;

use crate::auth::{auth_service, AuthService};
use crate::cli_config::{resolve_client_config, CliConfig};
use crate::error::CliError;

/// Effective client configuration: config file, then environment.
pub fn load_client_config() -> Result<ClientConfig, CliError> {
    let file = CliConfig::load().map_err(CliError::Config)?;
    Ok(resolve_client_config(&file)?)
}

pub fn backend_url(config: &ClientConfig) -> Result<String, CliError> {
    config.api_base_url().map_err(|error| match error {
        diarum_core::Error::Config(message) => CliError::Config(format!(
            "{message}. Run `diarum config init --api-url <URL>` first."
        )),
        other => other.into(),
    })
}

/// Auth client for the configured backend with a live session restored.
pub async fn signed_in_service(config: &ClientConfig) -> Result<AuthService, CliError> {
    let service = auth_service(&backend_url(config)?)?;
    if service.restore_session().await?.is_none() {
        return Err(CliError::NotSignedIn);
    }
    Ok(service)
}

/// Parse a date argument; `None` means today.
pub fn parse_date_arg(raw: Option<&str>) -> Result<DiaryDate, CliError> {
    let today = DiaryDate::today();
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Ok(today);
    };
    match raw.to_ascii_lowercase().as_str() {
        "today" => Ok(today),
        "yesterday" => today
            .as_naive()
            .checked_sub_days(Days::new(1))
            .map(DiaryDate::new)
            .ok_or_else(|| CliError::InvalidDate(InvalidDiaryDate(raw.to_string()))),
        _ => Ok(raw.parse()?),
    }
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}

/// Open `$EDITOR` seeded with `initial_content`; `None` when nothing changed.
pub fn capture_editor_input_with_initial(
    initial_content: &str,
) -> Result<Option<String>, CliError> {
    let editor = preferred_editor();
    let temp_file = create_temp_diary_file_path();
    std::fs::write(&temp_file, initial_content)?;

    let launch_result = launch_editor(&editor, &temp_file);
    let content = std::fs::read_to_string(&temp_file)?;
    let _ = std::fs::remove_file(&temp_file);

    launch_result?;
    Ok(edited_content(initial_content, &content))
}

/// Text saved from the editor, minus the trailing newline editors append.
/// Cleared text is kept so an entry can be emptied.
pub fn edited_content(initial: &str, edited: &str) -> Option<String> {
    let edited = edited.trim_end_matches(['\r', '\n']);
    if edited == initial.trim_end_matches(['\r', '\n']) {
        None
    } else {
        Some(edited.to_string())
    }
}

pub fn launch_editor(editor: &str, file_path: &Path) -> Result<(), CliError> {
    match Command::new(editor).arg(file_path).status() {
        Ok(status) => {
            if status.success() {
                Ok(())
            } else {
                Err(CliError::EditorFailed(format!(
                    "`{editor}` exited with status {status}"
                )))
            }
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            let mut parts = editor.split_whitespace();
            let Some(program) = parts.next() else {
                return Err(CliError::EditorFailed("empty EDITOR command".into()));
            };

            let status = Command::new(program).args(parts).arg(file_path).status()?;
            if status.success() {
                Ok(())
            } else {
                Err(CliError::EditorFailed(format!(
                    "`{editor}` exited with status {status}"
                )))
            }
        }
        Err(err) => Err(CliError::Io(err)),
    }
}

pub fn preferred_editor() -> String {
    env::var("VISUAL")
        .or_else(|_| env::var("EDITOR"))
        .unwrap_or_else(|_| default_editor().to_string())
}

pub const fn default_editor() -> &'static str {
    if cfg!(windows) {
        "notepad"
    } else {
        "vi"
    }
}

fn create_temp_diary_file_path() -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    env::temp_dir().join(format!("diarum-entry-{}-{now}.md", std::process::id()))
}

/// Show only the first and last characters of a secret.
pub fn mask_secret(secret: &str) -> String {
    let chars = secret.chars().collect::<Vec<_>>();
    if chars.is_empty() {
        return "(not set)".to_string();
    }
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head = chars[..4].iter().collect::<String>();
    let tail = chars[chars.len() - 4..].iter().collect::<String>();
    format!("{head}...{tail}")
}
