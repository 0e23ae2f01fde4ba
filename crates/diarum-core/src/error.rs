//! Error types for diarum-core

use thiserror::Error;

use crate::auth::AuthError;
use crate::diary::GatewayError;
use crate::media::MediaError;
use crate::models::DiaryDate;

/// Result type alias using diarum-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in diarum-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Authentication or session storage failure
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Diary backend failure
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Image hosting failure
    #[error(transparent)]
    Media(#[from] MediaError),

    /// Fetched record breaks the backend's field limits
    #[error("Invalid diary for {date}: {reason}")]
    InvalidDiary { date: DiaryDate, reason: String },

    /// Missing or malformed client configuration
    #[error("{0}")]
    Config(String),
}
