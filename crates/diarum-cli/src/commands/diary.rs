use std::sync::Arc;

use diarum_core::config::ClientConfig;
use diarum_core::diary::PocketBaseDiaryGateway;
use diarum_core::{DiarySession, SyncState, SyncStatus};
use tokio::sync::watch;

use crate::auth::SessionStore;
use crate::commands::common::{
    backend_url, capture_editor_input_with_initial, load_client_config, normalize_content,
    parse_date_arg, read_piped_stdin, signed_in_service,
};
use crate::error::CliError;

async fn open_session(config: &ClientConfig) -> Result<DiarySession, CliError> {
    signed_in_service(config).await?;
    let base_url = backend_url(config)?;
    let gateway = PocketBaseDiaryGateway::new(&base_url, SessionStore::for_backend(&base_url))?;
    Ok(DiarySession::new(Arc::new(gateway), config.sync()))
}

pub async fn run_show(date: Option<&str>) -> Result<(), CliError> {
    let date = parse_date_arg(date)?;
    let config = load_client_config()?;
    let session = open_session(&config).await?;

    let content = session.refresh_from_server(date).await?;
    if content.is_empty() {
        eprintln!("No diary for {date}");
    } else {
        println!("{content}");
    }
    Ok(())
}

pub async fn run_write(date: Option<&str>, text: &[String]) -> Result<(), CliError> {
    let date = parse_date_arg(date)?;
    let config = load_client_config()?;
    let session = open_session(&config).await?;

    let content = match resolve_write_content(text)? {
        Some(content) => content,
        None => {
            let current = session.refresh_from_server(date).await?;
            let Some(edited) = capture_editor_input_with_initial(&current)? else {
                eprintln!("No changes for {date}");
                return Ok(());
            };
            edited
        }
    };

    let mut receiver = session.subscribe();
    session.update_local(date, content);
    let saved = {
        let flush = session.force_sync_now();
        tokio::pin!(flush);
        loop {
            tokio::select! {
                saved = &mut flush => break saved,
                Ok(()) = receiver.changed() => {
                    if let Some(line) = format_state_line(&receiver.borrow_and_update()) {
                        eprintln!("{line}");
                    }
                }
            }
        }
    };
    if let Some(line) = pending_state_line(&mut receiver) {
        eprintln!("{line}");
    }

    if saved {
        println!("Saved diary for {date}");
        Ok(())
    } else {
        let state = session.sync_state();
        tracing::error!(%date, message = %state.message, "Diary save failed");
        Err(CliError::SaveFailed(state.current_date.unwrap_or(date)))
    }
}

/// Text from arguments, else piped stdin. `None` asks for the editor.
pub fn resolve_write_content(text: &[String]) -> Result<Option<String>, CliError> {
    if let Some(content) = normalize_content(&text.join(" ")) {
        return Ok(Some(content));
    }
    read_piped_stdin()
}

/// Line for a state published but not yet printed.
pub fn pending_state_line(receiver: &mut watch::Receiver<SyncState>) -> Option<String> {
    if !receiver.has_changed().unwrap_or(false) {
        return None;
    }
    format_state_line(&receiver.borrow_and_update())
}

pub fn format_state_line(state: &SyncState) -> Option<String> {
    match (state.status, state.current_date) {
        (SyncStatus::Idle, _) => None,
        (SyncStatus::Saving, Some(date)) => Some(format!("{} {date}", state.message)),
        (SyncStatus::Error, Some(date)) => Some(format!("{}: {date}", state.message)),
        _ => Some(state.message.clone()),
    }
}
