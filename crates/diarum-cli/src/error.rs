use std::io;

use diarum_core::auth::AuthError;
use diarum_core::diary::GatewayError;
use diarum_core::media::MediaError;
use diarum_core::models::InvalidDiaryDate;
use diarum_core::DiaryDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] diarum_core::Error),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Media(#[from] MediaError),
    #[error(transparent)]
    InvalidDate(#[from] InvalidDiaryDate),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Editor command failed: {0}")]
    EditorFailed(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Not signed in. Run `diarum auth login` first.")]
    NotSignedIn,
    #[error("Failed to save diary for {0}")]
    SaveFailed(DiaryDate),
    #[error("Connection test failed: {0}")]
    ConnectionTest(String),
}
