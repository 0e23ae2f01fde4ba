//! Diary write-back cache and the session that keeps it in sync.

mod cache;
mod gateway;
mod session;
#[cfg(test)]
pub(crate) mod testing;

pub use cache::{CacheEntry, DiaryCache, DirtyEntry};
pub use gateway::{DiaryGateway, GatewayError, GatewayResult, PocketBaseDiaryGateway};
pub use session::DiarySession;
