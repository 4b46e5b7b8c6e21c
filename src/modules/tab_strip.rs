// Tab strip projection - a pure function of the ordered tabs and the measured width.

use serde::{Deserialize, Serialize};

use crate::settings::TabStripSettings;
use crate::state::{BuiltinView, Tab, TabId};

/// Shown when a favicon fails to load.
pub const FAVICON_FALLBACK: &str = r#"data:image/svg+xml,<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 16 16"><rect width="16" height="16" fill="%23666"/></svg>"#;
pub const BLANK_PAGE_ICON: &str = r#"data:image/svg+xml,<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 16 16"><rect width="16" height="16" fill="%23444"/><text x="8" y="12" font-size="10" text-anchor="middle" fill="%23fff">📄</text></svg>"#;

const OVERFLOW_EPSILON: f64 = 1e-6;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TabIcon {
    /// Distinct icon set for builtin views, keyed by view.
    Builtin { view: BuiltinView },
    Favicon { src: String, fallback: String },
    Placeholder { src: String },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabStripItem {
    pub id: TabId,
    pub title: String,
    pub width: f64,
    pub icon: TabIcon,
    pub active: bool,
    /// Close affordance is drawn only when set.
    pub closable: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabStrip {
    pub items: Vec<TabStripItem>,
    pub tab_width: f64,
    /// Width the strip occupies on screen, never more than the space left for tabs.
    pub visible_width: f64,
    /// Tabs at minimum width do not fit; the host scrolls the strip.
    pub overflow: bool,
}

/// Per-tab width: available width minus reserved chrome, split evenly, clamped to [min, max].
pub fn tab_width(available: Option<f64>, count: usize, metrics: &TabStripSettings) -> f64 {
    let (min, max) = bounds(metrics);
    let Some(available) = available else {
        return metrics.fallback_tab_width.clamp(min, max);
    };
    if count == 0 {
        return max;
    }
    let usable = (available - metrics.reserved_chrome).max(0.0);
    (usable / count as f64).clamp(min, max)
}

fn bounds(metrics: &TabStripSettings) -> (f64, f64) {
    let min = metrics.min_tab_width.max(0.0);
    (min, metrics.max_tab_width.max(min))
}

pub fn icon_for(tab: &Tab) -> TabIcon {
    if let Some(view) = tab.content_kind.builtin_view() {
        return TabIcon::Builtin { view };
    }
    match &tab.icon {
        Some(src) => TabIcon::Favicon {
            src: src.clone(),
            fallback: FAVICON_FALLBACK.to_string(),
        },
        None if tab.is_blank() => TabIcon::Placeholder {
            src: BLANK_PAGE_ICON.to_string(),
        },
        None => TabIcon::Placeholder {
            src: FAVICON_FALLBACK.to_string(),
        },
    }
}

pub fn project(tabs: &[Tab], available: Option<f64>, metrics: &TabStripSettings) -> TabStrip {
    let width = tab_width(available, tabs.len(), metrics);
    let total = width * tabs.len() as f64;
    let room = available.map(|a| (a - metrics.reserved_chrome).max(0.0));

    // Even division can land a hair above the room; only real excess overflows.
    let (visible_width, overflow) = match room {
        Some(room) => (total.min(room), total - room > OVERFLOW_EPSILON),
        None => (total, false),
    };

    TabStrip {
        items: tabs
            .iter()
            .map(|tab| TabStripItem {
                id: tab.id.clone(),
                title: tab.title.clone(),
                width,
                icon: icon_for(tab),
                active: tab.is_active,
                closable: tab.closable,
            })
            .collect(),
        tab_width: width,
        visible_width,
        overflow,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::tabs::TabStore;
    use crate::state::TabSpec;
    use rstest::rstest;

    fn metrics() -> TabStripSettings {
        TabStripSettings::default()
    }

    #[rstest]
    #[case(Some(1000.0), 1, 240.0)]
    #[case(Some(1000.0), 5, 176.0)]
    #[case(Some(1000.0), 20, 100.0)]
    #[case(Some(100.0), 3, 100.0)]
    #[case(None, 4, 240.0)]
    fn test_tab_width(#[case] available: Option<f64>, #[case] count: usize, #[case] expected: f64) {
        assert_eq!(tab_width(available, count, &metrics()), expected);
    }

    #[test]
    fn test_width_clamp_property() {
        let m = metrics();
        let mut store = TabStore::new("{host}");
        for n in 1..=40usize {
            store.create_tab(None, None);
            for w in [0.0, 50.0, 120.0, 300.0, 640.0, 1024.0, 1920.0, 3840.0] {
                let strip = project(store.tabs(), Some(w), &m);
                assert_eq!(strip.items.len(), n);
                assert!(strip.tab_width >= m.min_tab_width && strip.tab_width <= m.max_tab_width);
                assert!(strip.visible_width <= (w - m.reserved_chrome).max(0.0));
                assert_eq!(strip.overflow, m.min_tab_width * n as f64 > w - m.reserved_chrome);
            }
        }
    }

    #[test]
    fn test_projection_flags() {
        let mut store = TabStore::new("https://icons.test/{host}");
        store.create_tab(Some("https://a.test"), Some("A"));
        store.create(TabSpec::builtin(BuiltinView::Settings));
        store.create(TabSpec {
            closable: false,
            ..TabSpec::generic(None, Some("Pinned"))
        });

        let strip = project(store.tabs(), Some(1000.0), &metrics());
        assert_eq!(strip.items.iter().filter(|i| i.active).count(), 1);
        assert!(strip.items[2].active);
        assert!(!strip.items[2].closable);

        assert_eq!(
            strip.items[0].icon,
            TabIcon::Favicon {
                src: "https://icons.test/a.test".into(),
                fallback: FAVICON_FALLBACK.into()
            }
        );
        assert_eq!(strip.items[1].icon, TabIcon::Builtin { view: BuiltinView::Settings });
        assert_eq!(strip.items[2].icon, TabIcon::Placeholder { src: BLANK_PAGE_ICON.into() });
    }

    #[test]
    fn test_inverted_metrics_do_not_panic() {
        let m = TabStripSettings {
            min_tab_width: 300.0,
            max_tab_width: 200.0,
            ..metrics()
        };
        assert_eq!(tab_width(Some(1000.0), 2, &m), 300.0);
    }
}
