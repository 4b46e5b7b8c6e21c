// Tab groups - named snapshots of a tab set, restorable as fresh live tabs.
// Persistence follows the settings file pattern: pretty JSON, tmp + rename.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ShellError};
use crate::settings::write_atomic;
use crate::state::{GroupId, Tab, TabGroup, TabSnapshot};

pub const GROUPS_FILE: &str = "tab_groups.json";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupFile {
    next_id: u64,
    groups: Vec<TabGroup>,
}

impl Default for GroupFile {
    fn default() -> Self {
        Self {
            next_id: 1,
            groups: Vec::new(),
        }
    }
}

pub struct GroupStore {
    path: Option<PathBuf>,
    file: GroupFile,
}

impl GroupStore {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            file: GroupFile::default(),
        }
    }

    /// Opens a file-backed store. Unreadable files start empty and are overwritten on the next save.
    pub fn load(path: &Path) -> Self {
        let mut store = Self {
            path: Some(path.to_path_buf()),
            file: GroupFile::default(),
        };

        if path.exists() {
            match fs::read_to_string(path) {
                Ok(json) => match serde_json::from_str(&json) {
                    Ok(file) => store.file = file,
                    Err(e) => log::warn!("[Groups] Failed to parse {}: {}", path.display(), e),
                },
                Err(e) => log::warn!("[Groups] Failed to read {}: {}", path.display(), e),
            }
        }

        store
    }

    pub fn save(&self) -> Result<()> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(&self.file)?;
        write_atomic(path, &json)
    }

    /// Snapshots `tabs` (builtin views excluded) under `name` and persists the store.
    pub fn create(&mut self, name: &str, tabs: &[Tab]) -> Result<GroupId> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ShellError::InvalidGroupName);
        }

        let snapshots: Vec<TabSnapshot> = tabs
            .iter()
            .filter(|t| !t.is_special)
            .map(TabSnapshot::from)
            .collect();

        let id = GroupId(self.file.next_id);
        self.file.next_id += 1;
        self.file.groups.push(TabGroup {
            id,
            name: name.to_string(),
            count: snapshots.len(),
            tabs: snapshots,
            created_at: Utc::now(),
        });

        log::info!("[Groups] New group created: {} ({})", name, id);
        self.save()?;
        Ok(id)
    }

    pub fn get(&self, id: GroupId) -> Option<&TabGroup> {
        self.file.groups.iter().find(|g| g.id == id)
    }

    pub fn groups(&self) -> &[TabGroup] {
        &self.file.groups
    }

    /// Snapshots across all groups whose title or address contains `query`, case-insensitively.
    pub fn filter_tabs(&self, query: &str) -> Vec<TabSnapshot> {
        let query = query.trim().to_lowercase();
        self.file
            .groups
            .iter()
            .flat_map(|g| g.tabs.iter())
            .filter(|t| {
                query.is_empty()
                    || t.title.to_lowercase().contains(&query)
                    || t.address.to_lowercase().contains(&query)
            })
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::tabs::TabStore;
    use crate::state::{BuiltinView, TabSpec};
    use tempfile::tempdir;

    fn live_tabs() -> TabStore {
        let mut store = TabStore::new("{host}");
        store.create_tab(Some("https://wikipedia.org/wiki/Rust"), Some("Rust - Wikipedia"));
        store.create(TabSpec::builtin(BuiltinView::History));
        store.create_tab(Some("https://docs.rs"), Some("Docs.rs"));
        store
    }

    #[test]
    fn test_create_snapshots_non_builtin_tabs() {
        let store = live_tabs();
        let mut groups = GroupStore::in_memory();
        let id = groups.create("  Research  ", store.tabs()).unwrap();

        let group = groups.get(id).unwrap();
        assert_eq!(group.name, "Research");
        assert_eq!(group.count, 2);
        assert_eq!(group.tabs[0].address, "https://wikipedia.org/wiki/Rust");
        assert_eq!(group.tabs[1].title, "Docs.rs");
    }

    #[test]
    fn test_snapshots_do_not_track_live_edits() {
        let mut store = live_tabs();
        let mut groups = GroupStore::in_memory();
        let id = groups.create("Research", store.tabs()).unwrap();

        let first = store.tabs()[0].id.clone();
        store.update_title(&first, "Edited").unwrap();
        assert_eq!(groups.get(id).unwrap().tabs[0].title, "Rust - Wikipedia");
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut groups = GroupStore::in_memory();
        assert!(matches!(groups.create("   ", &[]), Err(ShellError::InvalidGroupName)));
        assert!(groups.groups().is_empty());
    }

    #[test]
    fn test_ids_increase() {
        let mut groups = GroupStore::in_memory();
        let a = groups.create("A", &[]).unwrap();
        let b = groups.create("B", &[]).unwrap();
        assert!(b > a);
    }

    #[test]
    fn test_persisted_groups_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(GROUPS_FILE);
        let store = live_tabs();

        let id = {
            let mut groups = GroupStore::load(&path);
            groups.create("Research", store.tabs()).unwrap()
        };

        let mut reloaded = GroupStore::load(&path);
        assert_eq!(reloaded.groups().len(), 1);
        assert_eq!(reloaded.get(id).unwrap().count, 2);

        // Counter survives the round trip
        let next = reloaded.create("Later", &[]).unwrap();
        assert!(next > id);
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(GROUPS_FILE);
        fs::write(&path, "[[[").unwrap();
        assert!(GroupStore::load(&path).groups().is_empty());
    }

    #[test]
    fn test_filter_tabs() {
        let store = live_tabs();
        let mut groups = GroupStore::in_memory();
        groups.create("Research", store.tabs()).unwrap();

        assert_eq!(groups.filter_tabs("WIKI").len(), 1);
        assert_eq!(groups.filter_tabs("docs").len(), 1);
        assert_eq!(groups.filter_tabs("").len(), 2);
        assert!(groups.filter_tabs("netflix").is_empty());
    }
}
