// Tab store - ordered tab records and the single-active invariant.
// Pure logic, no host calls: the shell sequences rendering and panels around it.

use std::collections::HashMap;

use url::Url;

use crate::error::{Result, ShellError};
use crate::state::{is_blank_address, ContentKind, Tab, TabId, TabSpec, BLANK_ADDRESS, DEFAULT_TITLE};

/// Result of removing a tab from the store.
#[derive(Debug, Clone)]
pub struct ClosedOutcome {
    pub tab: Tab,
    /// Position the tab held before removal.
    pub index: usize,
    /// Tab that inherited activation, if the closed tab was active.
    pub activated: Option<TabId>,
    /// Default tab created because the store would have become empty.
    pub replacement: Option<TabId>,
}

pub struct TabStore {
    tabs: Vec<Tab>,
    next_id: u64,
    favicon_service: String,
}

impl TabStore {
    pub fn new(favicon_service: impl Into<String>) -> Self {
        Self {
            tabs: Vec::new(),
            next_id: 1,
            favicon_service: favicon_service.into(),
        }
    }

    pub fn set_favicon_service(&mut self, favicon_service: impl Into<String>) {
        self.favicon_service = favicon_service.into();
    }

    /// Keeps generated ids ahead of any `tab-<n>` id a caller supplied, so a
    /// closed id is never handed out again.
    fn reserve(&mut self, id: &TabId) {
        let n = id
            .as_str()
            .strip_prefix("tab-")
            .and_then(|n| n.parse::<u64>().ok());
        if let Some(n) = n {
            self.next_id = self.next_id.max(n.saturating_add(1));
        }
    }

    fn next_tab_id(&mut self) -> TabId {
        loop {
            let id = TabId::new(format!("tab-{}", self.next_id));
            self.next_id += 1;
            if self.position(&id).is_none() {
                return id;
            }
        }
    }

    /// Creates and activates a tab. A spec carrying an id that already exists
    /// activates the existing tab instead; the flag reports whether a tab was created.
    pub fn create(&mut self, spec: TabSpec) -> (TabId, bool) {
        if let Some(id) = spec.id.as_ref() {
            if self.position(id).is_some() {
                log::info!("[Tabs] Tab exists, activating: {}", id);
                self.set_active(id);
                return (id.clone(), false);
            }
        }

        let id = match spec.id {
            Some(id) => {
                self.reserve(&id);
                id
            }
            None => self.next_tab_id(),
        };
        let address = spec
            .address
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| BLANK_ADDRESS.to_string());
        let title = match spec.title.as_deref() {
            Some(title) if spec.title_escaped && !title.trim().is_empty() => title.to_string(),
            Some(title) => sanitize_title(title),
            None => DEFAULT_TITLE.to_string(),
        };
        let is_special = matches!(spec.content_kind, ContentKind::Builtin { .. });
        let icon = match spec.icon {
            Some(icon) => Some(icon),
            None if is_special => None,
            None => favicon_for(&address, &self.favicon_service),
        };

        self.tabs.push(Tab {
            id: id.clone(),
            title,
            address,
            icon,
            is_active: false,
            is_special,
            closable: spec.closable,
            content_kind: spec.content_kind,
        });
        self.set_active(&id);

        log::info!("[Tabs] Created new tab {} (total: {})", id, self.tabs.len());
        (id, true)
    }

    pub fn create_tab(&mut self, address: Option<&str>, title: Option<&str>) -> TabId {
        self.create(TabSpec::generic(address, title)).0
    }

    /// Removes a tab. The predecessor inherits activation so repeated closes sweep
    /// leftward; closing the last tab leaves a fresh default tab behind.
    pub fn close(&mut self, id: &TabId) -> Result<ClosedOutcome> {
        let index = self
            .position(id)
            .ok_or_else(|| ShellError::UnknownTabId(id.clone()))?;
        let tab = self.tabs.remove(index);

        let mut outcome = ClosedOutcome {
            index,
            activated: None,
            replacement: None,
            tab,
        };

        if self.tabs.is_empty() {
            outcome.replacement = Some(self.create_tab(None, None));
        } else if outcome.tab.is_active {
            let next = self.tabs[index.saturating_sub(1)].id.clone();
            self.set_active(&next);
            outcome.activated = Some(next);
        }

        log::info!("[Tabs] Closed tab {} (remaining: {})", id, self.tabs.len());
        Ok(outcome)
    }

    pub fn activate(&mut self, id: &TabId) -> Result<()> {
        if self.position(id).is_none() {
            return Err(ShellError::UnknownTabId(id.clone()));
        }
        self.set_active(id);
        Ok(())
    }

    pub fn activate_next(&mut self) -> Option<TabId> {
        self.cycle(1)
    }

    pub fn activate_prev(&mut self) -> Option<TabId> {
        self.cycle(-1)
    }

    fn cycle(&mut self, step: isize) -> Option<TabId> {
        let len = self.tabs.len() as isize;
        if len == 0 {
            return None;
        }
        let current = self.tabs.iter().position(|t| t.is_active).unwrap_or(0) as isize;
        let next = (current + step).rem_euclid(len) as usize;
        let id = self.tabs[next].id.clone();
        self.set_active(&id);
        Some(id)
    }

    fn set_active(&mut self, id: &TabId) {
        for tab in self.tabs.iter_mut() {
            tab.is_active = tab.id == *id;
        }
    }

    pub fn update_title(&mut self, id: &TabId, title: &str) -> Result<()> {
        let tab = self.get_mut(id)?;
        tab.title = sanitize_title(title);
        Ok(())
    }

    /// Re-targets a tab. The derived icon follows the address unless the tab is special.
    pub fn update_address(&mut self, id: &TabId, address: &str) -> Result<()> {
        let favicon_service = self.favicon_service.clone();
        let tab = self.get_mut(id)?;
        tab.address = if address.trim().is_empty() {
            BLANK_ADDRESS.to_string()
        } else {
            address.to_string()
        };
        if !tab.is_special {
            tab.icon = favicon_for(&tab.address, &favicon_service);
        }
        Ok(())
    }

    /// Moves a tab to `index`, clamped to the end of the strip.
    pub fn move_to(&mut self, id: &TabId, index: usize) -> Result<()> {
        let from = self
            .position(id)
            .ok_or_else(|| ShellError::UnknownTabId(id.clone()))?;
        let tab = self.tabs.remove(from);
        let to = index.min(self.tabs.len());
        self.tabs.insert(to, tab);
        Ok(())
    }

    pub fn reorder(&mut self, new_order: &[TabId]) -> bool {
        reorder_logic(&mut self.tabs, new_order)
    }

    /// Swaps the whole collection for fresh tabs built from `specs`. The first
    /// new tab ends up active; an empty list yields a default tab.
    pub fn replace_all(&mut self, specs: Vec<TabSpec>) -> (Vec<Tab>, Vec<TabId>) {
        let removed = std::mem::take(&mut self.tabs);
        let mut created = Vec::with_capacity(specs.len().max(1));
        for spec in specs {
            let (id, fresh) = self.create(spec);
            if fresh {
                created.push(id);
            }
        }
        match created.first().cloned() {
            Some(first) => self.set_active(&first),
            None => created.push(self.create_tab(None, None)),
        }
        (removed, created)
    }

    pub fn get(&self, id: &TabId) -> Option<&Tab> {
        self.tabs.iter().find(|t| t.id == *id)
    }

    fn get_mut(&mut self, id: &TabId) -> Result<&mut Tab> {
        self.tabs
            .iter_mut()
            .find(|t| t.id == *id)
            .ok_or_else(|| ShellError::UnknownTabId(id.clone()))
    }

    pub fn position(&self, id: &TabId) -> Option<usize> {
        self.tabs.iter().position(|t| t.id == *id)
    }

    pub fn active(&self) -> Option<&Tab> {
        self.tabs.iter().find(|t| t.is_active)
    }

    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    /// Owned copy for callers outside the store's lock.
    pub fn snapshot(&self) -> Vec<Tab> {
        self.tabs.clone()
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }
}

/// Pure logic for reordering tabs.
/// Returns true if the order changed, false otherwise.
///
/// Algorithm:
/// 1. Map existing tabs by ID for O(1) lookup
/// 2. Rebuild vector based on new_order
/// 3. Append any missing tabs in their previous order (no tab is ever dropped)
fn reorder_logic(tabs: &mut Vec<Tab>, new_order: &[TabId]) -> bool {
    if tabs.is_empty() || new_order.is_empty() {
        return false;
    }

    let old_order: Vec<TabId> = tabs.iter().map(|t| t.id.clone()).collect();
    let mut tab_map: HashMap<TabId, Tab> = tabs.drain(..).map(|t| (t.id.clone(), t)).collect();

    let mut reordered = Vec::with_capacity(old_order.len());
    for id in new_order {
        if let Some(tab) = tab_map.remove(id) {
            reordered.push(tab);
        }
    }

    for id in &old_order {
        if let Some(tab) = tab_map.remove(id) {
            reordered.push(tab);
        }
    }

    let changed = reordered.iter().map(|t| &t.id).ne(old_order.iter());
    *tabs = reordered;
    changed
}

/// HTML-escapes a title for storage. Empty titles fall back to `New Tab`.
pub fn sanitize_title(title: &str) -> String {
    let escaped = v_htmlescape::escape(title).to_string();
    if escaped.trim().is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        escaped
    }
}

/// Icon reference for an address via the favicon service template.
pub fn favicon_for(address: &str, service: &str) -> Option<String> {
    if is_blank_address(address) {
        return None;
    }
    let url = Url::parse(address).ok()?;
    let host = url.host_str().filter(|h| !h.is_empty())?;
    Some(service.replace("{host}", &urlencoding::encode(host)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{BuiltinView, TabSnapshot};
    use rstest::rstest;

    const FAVICONS: &str = "https://icons.test/?domain={host}";

    fn store_with(count: usize) -> (TabStore, Vec<TabId>) {
        let mut store = TabStore::new(FAVICONS);
        let ids = (0..count)
            .map(|i| store.create_tab(Some(&format!("https://site{}.test", i)), None))
            .collect();
        (store, ids)
    }

    fn active_count(store: &TabStore) -> usize {
        store.tabs().iter().filter(|t| t.is_active).count()
    }

    fn order(store: &TabStore) -> Vec<&str> {
        store.tabs().iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn test_create_activates_new_tab() {
        let mut store = TabStore::new(FAVICONS);
        let first = store.create_tab(None, None);
        let second = store.create_tab(Some("https://a"), None);

        assert_eq!(store.len(), 2);
        assert_eq!(store.active().unwrap().id, second);
        assert!(!store.get(&first).unwrap().is_active);
        assert_eq!(store.get(&first).unwrap().address, BLANK_ADDRESS);
        assert_eq!(store.get(&first).unwrap().title, DEFAULT_TITLE);
    }

    #[test]
    fn test_generated_ids_are_never_reused() {
        let mut store = TabStore::new(FAVICONS);
        let a = store.create_tab(None, None);
        store.close(&a).unwrap();
        let b = store.create_tab(None, None);
        assert_ne!(store.tabs()[0].id, a);
        assert_ne!(b, a);
    }

    #[test]
    fn test_supplied_ids_are_not_reissued() {
        let mut store = TabStore::new(FAVICONS);
        let fixed = TabId::from("tab-5");
        let spec = TabSpec {
            id: Some(fixed.clone()),
            ..TabSpec::generic(Some("https://pinned.test"), None)
        };
        assert_eq!(store.create(spec), (fixed.clone(), true));
        store.close(&fixed).unwrap();

        let issued: Vec<TabId> = (0..6).map(|_| store.create_tab(None, None)).collect();
        assert!(!issued.contains(&fixed));
        assert_eq!(issued[0], TabId::from("tab-6"));
    }

    #[test]
    fn test_close_active_selects_predecessor() {
        let (mut store, ids) = store_with(3);
        store.activate(&ids[2]).unwrap();

        let outcome = store.close(&ids[2]).unwrap();
        assert_eq!(outcome.activated, Some(ids[1].clone()));
        assert_eq!(store.active().unwrap().id, ids[1]);

        // Sweeps leftward
        let outcome = store.close(&ids[1]).unwrap();
        assert_eq!(outcome.activated, Some(ids[0].clone()));
    }

    #[test]
    fn test_close_first_active_selects_new_first() {
        let (mut store, ids) = store_with(3);
        store.activate(&ids[0]).unwrap();

        let outcome = store.close(&ids[0]).unwrap();
        assert_eq!(outcome.index, 0);
        assert_eq!(store.active().unwrap().id, ids[1]);
    }

    #[test]
    fn test_close_inactive_keeps_active() {
        let (mut store, ids) = store_with(2);
        let outcome = store.close(&ids[0]).unwrap();
        assert_eq!(outcome.activated, None);
        assert_eq!(store.active().unwrap().id, ids[1]);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_close_last_creates_default() {
        let (mut store, ids) = store_with(1);
        let outcome = store.close(&ids[0]).unwrap();

        let replacement = outcome.replacement.expect("default tab");
        assert_eq!(store.len(), 1);
        assert_eq!(store.active().unwrap().id, replacement);
        assert_eq!(store.active().unwrap().address, BLANK_ADDRESS);
    }

    #[test]
    fn test_unknown_ids_are_errors() {
        let (mut store, _) = store_with(1);
        let ghost = TabId::new("tab-404");
        assert!(matches!(store.close(&ghost), Err(ShellError::UnknownTabId(_))));
        assert!(matches!(store.activate(&ghost), Err(ShellError::UnknownTabId(_))));
        assert!(store.update_title(&ghost, "x").is_err());
        assert!(store.update_address(&ghost, "https://x").is_err());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_single_active_across_mutation_sequence() {
        let mut store = TabStore::new(FAVICONS);
        let mut ids = Vec::new();
        for step in 0..40usize {
            match step % 5 {
                0 | 1 => ids.push(store.create_tab(None, None)),
                2 => {
                    if let Some(id) = ids.get(step % ids.len().max(1)).cloned() {
                        let _ = store.activate(&id);
                    }
                }
                3 => {
                    if !ids.is_empty() {
                        let id = ids.remove(step % ids.len());
                        let _ = store.close(&id);
                    }
                }
                _ => {
                    store.activate_prev();
                }
            }
            assert!(!store.is_empty());
            assert_eq!(active_count(&store), 1, "step {}", step);
        }
    }

    #[test]
    fn test_builtin_creation_is_deduplicated() {
        let mut store = TabStore::new(FAVICONS);
        store.create_tab(None, None);

        let (first, created) = store.create(TabSpec::builtin(BuiltinView::Settings));
        assert!(created);
        store.create_tab(Some("https://a"), None);

        let (second, created) = store.create(TabSpec::builtin(BuiltinView::Settings));
        assert!(!created);
        assert_eq!(first, second);
        assert_eq!(first.as_str(), "tab-settings");
        assert_eq!(store.len(), 3);
        assert_eq!(store.active().unwrap().id, first);
    }

    #[test]
    fn test_special_tabs_have_no_derived_icon() {
        let mut store = TabStore::new(FAVICONS);
        let (id, _) = store.create(TabSpec::builtin(BuiltinView::History));
        store.update_address(&id, "https://elsewhere.test").unwrap();

        let tab = store.get(&id).unwrap();
        assert!(tab.is_special);
        assert_eq!(tab.icon, None);
    }

    #[test]
    fn test_update_address_refreshes_icon() {
        let mut store = TabStore::new(FAVICONS);
        let id = store.create_tab(None, None);
        assert_eq!(store.get(&id).unwrap().icon, None);

        store.update_address(&id, "https://docs.rs/tokio").unwrap();
        assert_eq!(
            store.get(&id).unwrap().icon.as_deref(),
            Some("https://icons.test/?domain=docs.rs")
        );
    }

    #[test]
    fn test_update_title_is_sanitized() {
        let mut store = TabStore::new(FAVICONS);
        let id = store.create_tab(None, None);
        store.update_title(&id, "<script>x</script>").unwrap();
        let title = &store.get(&id).unwrap().title;
        assert!(!title.contains('<'));
        assert!(title.starts_with("&lt;script&gt;"));
    }

    #[test]
    fn test_snapshot_titles_are_not_escaped_twice() {
        let mut store = TabStore::new(FAVICONS);
        let id = store.create_tab(Some("https://a.test"), Some("Fish & Chips"));
        let spec = TabSnapshot::from(store.get(&id).unwrap()).to_spec();

        let (copy, _) = store.create(spec);
        assert_eq!(store.get(&copy).unwrap().title, "Fish &amp; Chips");
    }

    #[rstest]
    #[case("Rust & Cargo", "Rust &amp; Cargo")]
    #[case("", DEFAULT_TITLE)]
    #[case("   ", DEFAULT_TITLE)]
    #[case("Plain", "Plain")]
    fn test_sanitize_title(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(sanitize_title(input), expected);
    }

    #[rstest]
    #[case("about:blank", None)]
    #[case("", None)]
    #[case("not a url", None)]
    #[case("data:text/html,hi", None)]
    #[case("https://example.com/page", Some("https://icons.test/?domain=example.com"))]
    #[case("http://localhost:3000", Some("https://icons.test/?domain=localhost"))]
    fn test_favicon_for(#[case] address: &str, #[case] expected: Option<&str>) {
        assert_eq!(favicon_for(address, FAVICONS).as_deref(), expected);
    }

    #[test]
    fn test_cycle_wraps_both_ways() {
        let (mut store, ids) = store_with(3);
        assert_eq!(store.activate_next(), Some(ids[0].clone()));
        assert_eq!(store.activate_prev(), Some(ids[2].clone()));
        assert_eq!(store.activate_prev(), Some(ids[1].clone()));
        assert_eq!(active_count(&store), 1);
    }

    #[test]
    fn test_move_to_clamps() {
        let (mut store, ids) = store_with(3);
        store.move_to(&ids[0], 99).unwrap();
        assert_eq!(order(&store), vec![ids[1].as_str(), ids[2].as_str(), ids[0].as_str()]);
    }

    #[test]
    fn test_replace_all_activates_first() {
        let (mut store, old) = store_with(2);
        let (removed, created) = store.replace_all(vec![
            TabSpec::generic(Some("https://x.test"), Some("X")),
            TabSpec::generic(Some("https://y.test"), Some("Y")),
        ]);

        assert_eq!(removed.len(), 2);
        assert_eq!(created.len(), 2);
        assert!(old.iter().all(|id| store.get(id).is_none()));
        assert_eq!(store.active().unwrap().id, created[0]);
        assert_eq!(active_count(&store), 1);
    }

    #[test]
    fn test_replace_all_with_nothing_keeps_store_non_empty() {
        let (mut store, _) = store_with(2);
        let (_, created) = store.replace_all(Vec::new());
        assert_eq!(created.len(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.active().unwrap().is_blank());
    }

    #[test]
    fn test_reorder_logic() {
        let (mut store, ids) = store_with(3);

        let new_order = vec![ids[2].clone(), ids[0].clone(), ids[1].clone()];
        assert!(store.reorder(&new_order));
        assert_eq!(order(&store), vec![ids[2].as_str(), ids[0].as_str(), ids[1].as_str()]);
    }

    #[test]
    fn test_reorder_with_missing_id() {
        let (mut store, ids) = store_with(3);

        // Only provide 2 IDs (missing the middle one)
        let new_order = vec![ids[2].clone(), ids[0].clone()];
        assert!(store.reorder(&new_order));
        assert_eq!(order(&store), vec![ids[2].as_str(), ids[0].as_str(), ids[1].as_str()]);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_reorder_no_change() {
        let (mut store, ids) = store_with(2);
        assert!(!store.reorder(&ids));
        assert!(!store.reorder(&[TabId::new("tab-404")]));
        assert_eq!(order(&store), vec![ids[0].as_str(), ids[1].as_str()]);
    }

    #[test]
    fn test_reorder_empty_new_order() {
        let (mut store, _) = store_with(1);
        assert!(!store.reorder(&[]));
        assert_eq!(store.len(), 1);
    }
}
