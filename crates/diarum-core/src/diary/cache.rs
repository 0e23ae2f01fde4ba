//! In-memory write-back cache of diary content keyed by date.
//!
//! Local edits always win: once an entry is dirty, server reads for that date
//! are dropped until the edit has been confirmed saved.

use std::collections::HashMap;

use crate::models::DiaryDate;
use crate::util::unix_millis_now;

/// Cached diary content for a single date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub content: String,
    /// Last local mutation (unix ms)
    pub local_updated_at: i64,
    /// Last known server timestamp, `None` until the date was read or saved
    pub server_updated_at: Option<String>,
    pub is_dirty: bool,
    /// Bumped on every mutation; ties a save to the content it carried
    pub revision: u64,
}

/// A pending edit captured for saving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirtyEntry {
    pub date: DiaryDate,
    pub content: String,
    pub revision: u64,
}

#[derive(Debug, Default)]
pub struct DiaryCache {
    entries: HashMap<DiaryDate, CacheEntry>,
    next_revision: u64,
}

impl DiaryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, date: DiaryDate) -> Option<&CacheEntry> {
        self.entries.get(&date)
    }

    /// Store a local edit and mark it dirty. Returns the new revision.
    pub fn update_local(&mut self, date: DiaryDate, content: impl Into<String>) -> u64 {
        let revision = self.bump_revision();
        let server_updated_at = self
            .entries
            .get(&date)
            .and_then(|entry| entry.server_updated_at.clone());

        self.entries.insert(
            date,
            CacheEntry {
                content: content.into(),
                local_updated_at: unix_millis_now(),
                server_updated_at,
                is_dirty: true,
                revision,
            },
        );
        revision
    }

    /// Apply content read from the server unless a local edit is pending.
    ///
    /// Returns `false` when the read was dropped because the entry is dirty.
    pub fn update_from_server(
        &mut self,
        date: DiaryDate,
        content: Option<&str>,
        server_updated_at: Option<&str>,
    ) -> bool {
        if self.has_dirty(date) {
            tracing::debug!(%date, "ignoring server copy, local edits pending");
            return false;
        }

        let revision = self.bump_revision();
        self.entries.insert(
            date,
            CacheEntry {
                content: content.unwrap_or_default().to_string(),
                local_updated_at: unix_millis_now(),
                server_updated_at: server_updated_at.map(ToString::to_string),
                is_dirty: false,
                revision,
            },
        );
        true
    }

    /// Content to render for `date`; empty when nothing is cached.
    pub fn display_content(&self, date: DiaryDate) -> String {
        self.entries
            .get(&date)
            .map(|entry| entry.content.clone())
            .unwrap_or_default()
    }

    pub fn has_dirty(&self, date: DiaryDate) -> bool {
        self.entries.get(&date).is_some_and(|entry| entry.is_dirty)
    }

    /// All dirty entries, oldest date first.
    pub fn list_dirty(&self) -> Vec<DirtyEntry> {
        let mut dirty = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_dirty)
            .map(|(date, entry)| DirtyEntry {
                date: *date,
                content: entry.content.clone(),
                revision: entry.revision,
            })
            .collect::<Vec<_>>();
        dirty.sort_by_key(|entry| entry.date);
        dirty
    }

    /// Record a confirmed save of `revision`.
    ///
    /// The dirty flag is only cleared when no newer edit landed while the save
    /// was in flight. A clean entry rebuilt from a server read in the meantime
    /// keeps its server timestamp. Missing entries are ignored. Returns whether
    /// the entry is now clean.
    pub fn mark_synced(
        &mut self,
        date: DiaryDate,
        revision: u64,
        server_updated_at: impl Into<String>,
    ) -> bool {
        let Some(entry) = self.entries.get_mut(&date) else {
            return false;
        };
        if entry.revision == revision {
            entry.is_dirty = false;
        } else if !entry.is_dirty {
            return true;
        }
        entry.server_updated_at = Some(server_updated_at.into());
        !entry.is_dirty
    }

    pub fn clear(&mut self, date: DiaryDate) -> bool {
        self.entries.remove(&date).is_some()
    }

    pub fn clear_all(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn bump_revision(&mut self) -> u64 {
        self.next_revision += 1;
        self.next_revision
    }
}
