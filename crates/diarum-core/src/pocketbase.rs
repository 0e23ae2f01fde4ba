//! Shared helpers for talking to the PocketBase REST API.

use reqwest::StatusCode;
use serde::Deserialize;

use crate::util::compact_text;

pub(crate) const USERS_COLLECTION: &str = "users";
pub(crate) const DIARIES_COLLECTION: &str = "diaries";

/// Paginated record listing returned by `/api/collections/{name}/records`.
#[derive(Debug, Deserialize)]
pub(crate) struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

pub(crate) fn records_url(base_url: &str, collection: &str) -> String {
    format!("{base_url}/api/collections/{collection}/records")
}

/// Render a human-readable message from a failed response.
pub(crate) fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(message) = payload
            .message
            .or(payload.error)
            .filter(|message| !message.trim().is_empty())
        {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

/// Quote a value for use inside a PocketBase filter expression.
pub(crate) fn filter_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}
