//! Local cache of saved ads and known tags.
//!
//! The store mirrors the backend's view of which ads are saved and which
//! tags exist. It is refreshed wholesale (clear then repopulate, never a
//! merge) and mutated optimistically by the injected UI after successful
//! backend calls. Invariant: every tag on a saved ad is in `all_tags`;
//! `all_tags` may hold extra tags until `recompute_all_tags` runs.

use std::collections::{BTreeSet, HashMap};

use crate::ad_data::SavedAdEntry;

/// Minimum spacing between backend refreshes, in milliseconds.
pub const REFRESH_WINDOW_MS: f64 = 10_000.0;

/// Timestamp-gated rate limiter. `try_begin` consumes the window, so
/// callers that get `false` must not hit the backend.
#[derive(Debug)]
pub struct RefreshGate {
    window_ms: f64,
    last_attempt: Option<f64>,
}

impl RefreshGate {
    pub fn new(window_ms: f64) -> RefreshGate {
        RefreshGate {
            window_ms,
            last_attempt: None,
        }
    }

    pub fn try_begin(&mut self, now_ms: f64) -> bool {
        match self.last_attempt {
            Some(last) if now_ms - last < self.window_ms => false,
            _ => {
                self.last_attempt = Some(now_ms);
                true
            }
        }
    }

    /// Bypass the window, for explicit manual reinitialization.
    pub fn force(&mut self, now_ms: f64) {
        self.last_attempt = Some(now_ms);
    }
}

#[derive(Debug)]
pub struct LocalStateStore {
    saved: HashMap<String, BTreeSet<String>>,
    all_tags: BTreeSet<String>,
    gate: RefreshGate,
    last_refresh_ok: bool,
}

impl LocalStateStore {
    pub fn new() -> LocalStateStore {
        LocalStateStore {
            saved: HashMap::new(),
            all_tags: BTreeSet::new(),
            gate: RefreshGate::new(REFRESH_WINDOW_MS),
            last_refresh_ok: false,
        }
    }

    /// True when a refresh may proceed now; false means the caller should
    /// report `last_refresh_ok()` instead of calling the backend.
    pub fn begin_refresh(&mut self, now_ms: f64) -> bool {
        self.gate.try_begin(now_ms)
    }

    /// Like `begin_refresh` but ignores the rate limit (manual reinit).
    pub fn begin_refresh_forced(&mut self, now_ms: f64) {
        self.gate.force(now_ms);
    }

    pub fn finish_refresh(&mut self, ok: bool) {
        self.last_refresh_ok = ok;
    }

    pub fn last_refresh_ok(&self) -> bool {
        self.last_refresh_ok
    }

    /// Replace the whole snapshot from a backend listing. Ads without an
    /// explicit tag list get an empty set.
    pub fn apply_snapshot(&mut self, ads: Vec<SavedAdEntry>, tags: Vec<String>) {
        self.saved.clear();
        for entry in ads {
            self.saved
                .insert(entry.ad_archive_id, entry.tags.into_iter().collect());
        }
        self.all_tags = tags.into_iter().collect();
    }

    pub fn is_saved(&self, ad_id: &str) -> bool {
        self.saved.contains_key(ad_id)
    }

    pub fn tags_for(&self, ad_id: &str) -> Option<&BTreeSet<String>> {
        self.saved.get(ad_id)
    }

    pub fn all_tags(&self) -> &BTreeSet<String> {
        &self.all_tags
    }

    pub fn saved_count(&self) -> usize {
        self.saved.len()
    }

    /// Record a successful save or tag update: the ad's tag set is
    /// replaced and its tags are folded into the global set.
    pub fn mark_saved(&mut self, ad_id: &str, tags: &BTreeSet<String>) {
        self.saved.insert(ad_id.to_string(), tags.clone());
        self.all_tags.extend(tags.iter().cloned());
    }

    /// Record a successful unsave. The global tag set is recomputed from
    /// the remaining ads; this is the only mutation that shrinks it.
    pub fn mark_unsaved(&mut self, ad_id: &str) {
        self.saved.remove(ad_id);
        self.recompute_all_tags();
    }

    /// Make a tag known globally without attaching it to an ad.
    pub fn note_tag(&mut self, tag: &str) {
        self.all_tags.insert(tag.to_string());
    }

    /// Rebuild `all_tags` as the union of every saved ad's tags.
    pub fn recompute_all_tags(&mut self) {
        self.all_tags = self
            .saved
            .values()
            .flat_map(|tags| tags.iter().cloned())
            .collect();
    }

    /// Tags offered in a card's dropdown: every known tag that is not
    /// already assigned and contains `query` (case-insensitive).
    pub fn candidate_tags(&self, assigned: &BTreeSet<String>, query: &str) -> Vec<String> {
        let query = query.to_lowercase();
        self.all_tags
            .iter()
            .filter(|tag| !assigned.contains(*tag))
            .filter(|tag| tag.to_lowercase().contains(&query))
            .cloned()
            .collect()
    }

    /// The known tag equal to `input` ignoring case, if any.
    pub fn find_exact_tag(&self, input: &str) -> Option<String> {
        let input = input.trim().to_lowercase();
        self.all_tags
            .iter()
            .find(|tag| tag.to_lowercase() == input)
            .cloned()
    }

    /// Whether the "add new tag" affordance should show for `input`.
    pub fn can_add_new(&self, assigned: &BTreeSet<String>, input: &str) -> bool {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return false;
        }
        let lowered = trimmed.to_lowercase();
        self.find_exact_tag(trimmed).is_none()
            && !assigned.iter().any(|tag| tag.to_lowercase() == lowered)
    }
}

impl Default for LocalStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(ad_id: &str, tags: &[&str]) -> SavedAdEntry {
        SavedAdEntry {
            ad_archive_id: ad_id.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn tag_set(tags: &[&str]) -> BTreeSet<String> {
        tags.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn gate_allows_first_call_then_blocks_window() {
        let mut gate = RefreshGate::new(10_000.0);
        assert!(gate.try_begin(1_000.0));
        assert!(!gate.try_begin(5_000.0));
        assert!(!gate.try_begin(10_999.0));
        assert!(gate.try_begin(11_000.0));
    }

    #[test]
    fn rate_limited_refresh_reports_last_outcome() {
        let mut store = LocalStateStore::new();
        assert!(store.begin_refresh(0.0));
        store.finish_refresh(true);
        // Second call inside the window: no backend call, prior outcome.
        assert!(!store.begin_refresh(4_000.0));
        assert!(store.last_refresh_ok());
    }

    #[test]
    fn snapshot_replaces_rather_than_merges() {
        let mut store = LocalStateStore::new();
        store.apply_snapshot(
            vec![entry("123", &["promo"])],
            vec!["promo".to_string(), "sale".to_string()],
        );
        assert!(store.is_saved("123"));
        assert_eq!(store.tags_for("123"), Some(&tag_set(&["promo"])));
        assert_eq!(store.all_tags(), &tag_set(&["promo", "sale"]));

        store.apply_snapshot(vec![entry("456", &[])], vec![]);
        assert!(!store.is_saved("123"));
        assert!(store.is_saved("456"));
        assert_eq!(store.tags_for("456"), Some(&tag_set(&[])));
        assert!(store.all_tags().is_empty());
    }

    #[test]
    fn mark_saved_unions_tags_into_global_set() {
        let mut store = LocalStateStore::new();
        store.mark_saved("123", &tag_set(&["x", "y"]));
        assert!(store.is_saved("123"));
        assert_eq!(store.all_tags(), &tag_set(&["x", "y"]));
    }

    #[test]
    fn removing_last_tag_keeps_global_tag_until_recompute() {
        let mut store = LocalStateStore::new();
        store.mark_saved("123", &tag_set(&["promo"]));
        // The tag is removed from the ad but stays globally known.
        store.mark_saved("123", &tag_set(&[]));
        assert_eq!(store.all_tags(), &tag_set(&["promo"]));

        store.recompute_all_tags();
        assert!(store.all_tags().is_empty());
    }

    #[test]
    fn unsave_recomputes_global_tags() {
        let mut store = LocalStateStore::new();
        store.mark_saved("123", &tag_set(&["promo"]));
        store.mark_saved("456", &tag_set(&["sale"]));
        store.mark_unsaved("123");
        assert!(!store.is_saved("123"));
        assert_eq!(store.all_tags(), &tag_set(&["sale"]));
    }

    #[test]
    fn candidate_tags_filter_and_exclude_assigned() {
        let mut store = LocalStateStore::new();
        store.apply_snapshot(
            vec![],
            vec!["promo".to_string(), "sale".to_string(), "summer sale".to_string()],
        );
        let assigned = tag_set(&["sale"]);
        assert_eq!(
            store.candidate_tags(&assigned, ""),
            vec!["promo".to_string(), "summer sale".to_string()]
        );
        assert_eq!(
            store.candidate_tags(&assigned, "SALE"),
            vec!["summer sale".to_string()]
        );
        assert!(store.candidate_tags(&assigned, "winter").is_empty());
    }

    #[test]
    fn exact_match_is_case_insensitive() {
        let mut store = LocalStateStore::new();
        store.note_tag("Promo");
        assert_eq!(store.find_exact_tag("promo"), Some("Promo".to_string()));
        assert_eq!(store.find_exact_tag(" proMO "), Some("Promo".to_string()));
        assert_eq!(store.find_exact_tag("prom"), None);
    }

    #[test]
    fn add_new_only_for_unknown_unassigned_text() {
        let mut store = LocalStateStore::new();
        store.note_tag("promo");
        let assigned = tag_set(&["mine"]);
        assert!(store.can_add_new(&assigned, "fresh"));
        assert!(!store.can_add_new(&assigned, "promo"));
        assert!(!store.can_add_new(&assigned, "Mine"));
        assert!(!store.can_add_new(&assigned, "   "));
    }
}
