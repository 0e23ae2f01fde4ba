//! diarum-core - Core library for Diarum
//!
//! Shared models, the PocketBase clients, and the write-back diary cache with
//! its debounced background sync. Interfaces (CLI, editors) build on
//! [`DiarySession`].

pub mod auth;
pub mod config;
pub mod diary;
pub mod error;
pub mod media;
pub mod models;
mod pocketbase;
pub mod state;
pub mod sync;
pub mod util;

pub use diary::DiarySession;
pub use error::{Error, Result};
pub use models::{Diary, DiaryDate};
pub use state::{SyncState, SyncStatePublisher, SyncStatus};
