//! Data models for Diarum

mod diary;
mod settings;

pub use diary::{Diary, DiaryDate, InvalidDiaryDate, MAX_TAG_FIELD_CHARS};
pub use settings::CheveretoSettings;
