// src/aggregate.rs
//! Source aggregation: merging scan batches into the held collection and the
//! source-driven reordering used for the displayed view.
//!
//! All operations are pure over their inputs. `ingest` surfaces fresh items;
//! `filter` and `prioritize` pin sources. They are deliberately separate rules.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

use crate::item::{top_level, TrendingItem, KNOWN_SOURCES};

/// Stable partition: items matching `pred` first, then the rest, each side in
/// original order. Never drops an item.
pub fn reorder_by<T: Clone>(items: &[T], mut pred: impl FnMut(&T) -> bool) -> Vec<T> {
    let mut head = Vec::with_capacity(items.len());
    let mut tail = Vec::new();
    for it in items {
        if pred(it) {
            head.push(it.clone());
        } else {
            tail.push(it.clone());
        }
    }
    head.extend(tail);
    head
}

/// Merge `incoming` into `existing`, last write wins per URL.
///
/// Result order: batch members first (batch order, a repeated URL keeps its
/// first position but takes the later value), then existing items whose URL
/// is not in the batch, in their original order.
pub fn ingest(existing: &[TrendingItem], incoming: &[TrendingItem]) -> Vec<TrendingItem> {
    if incoming.is_empty() {
        return existing.to_vec();
    }

    let mut batch: Vec<TrendingItem> = Vec::with_capacity(incoming.len());
    let mut pos: HashMap<&str, usize> = HashMap::with_capacity(incoming.len());
    for it in incoming {
        match pos.get(it.url.as_str()) {
            Some(&i) => batch[i] = it.clone(),
            None => {
                pos.insert(it.url.as_str(), batch.len());
                batch.push(it.clone());
            }
        }
    }

    batch.extend(
        existing
            .iter()
            .filter(|it| !pos.contains_key(it.url.as_str()))
            .cloned(),
    );
    batch
}

fn matches_source(item: &TrendingItem, source: &str) -> bool {
    item.top_source().eq_ignore_ascii_case(top_level(source))
}

/// Demote (never hide) items outside `selection`.
///
/// Empty selection, or one covering every known source, is the identity.
pub fn filter<'a>(items: &'a [TrendingItem], selection: &[String]) -> Cow<'a, [TrendingItem]> {
    if selection.is_empty() || covers_all_known(selection) {
        return Cow::Borrowed(items);
    }
    Cow::Owned(reorder_by(items, |it| {
        selection.iter().any(|s| matches_source(it, s))
    }))
}

/// Pin one source to the top. `None` is the identity.
pub fn prioritize<'a>(items: &'a [TrendingItem], priority: Option<&str>) -> Cow<'a, [TrendingItem]> {
    match priority {
        None => Cow::Borrowed(items),
        Some(p) => Cow::Owned(reorder_by(items, |it| matches_source(it, p))),
    }
}

fn covers_all_known(selection: &[String]) -> bool {
    KNOWN_SOURCES
        .iter()
        .all(|k| selection.iter().any(|s| top_level(s).eq_ignore_ascii_case(k)))
}

/// Which sources the user cares about right now.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceSelection {
    preferences: Vec<String>,
    // Disjoint from `preferences`.
    manual: Vec<String>,
    priority: Option<String>,
}

impl SourceSelection {
    pub fn from_preferences(prefs: Vec<String>) -> Self {
        let mut s = Self::default();
        s.set_preferences(prefs);
        s
    }

    pub fn set_preferences(&mut self, prefs: Vec<String>) {
        let mut seen = HashSet::new();
        self.preferences = prefs
            .into_iter()
            .map(|p| p.trim().to_ascii_lowercase())
            .filter(|p| !p.is_empty() && seen.insert(p.clone()))
            .collect();
        let prefs = &self.preferences;
        self.manual.retain(|m| !prefs.contains(m));
    }

    /// Record a source that came back from a direct scan. Returns true when it
    /// was newly added to the manual set.
    pub fn note_scanned(&mut self, source: &str) -> bool {
        let top = top_level(source).to_ascii_lowercase();
        if top.is_empty() || self.preferences.contains(&top) || self.manual.contains(&top) {
            return false;
        }
        self.manual.push(top);
        true
    }

    pub fn set_priority(&mut self, source: Option<&str>) {
        self.priority = source
            .map(|s| top_level(s).to_ascii_lowercase())
            .filter(|s| !s.is_empty());
    }

    pub fn preferences(&self) -> &[String] {
        &self.preferences
    }

    pub fn manual(&self) -> &[String] {
        &self.manual
    }

    pub fn priority(&self) -> Option<&str> {
        self.priority.as_deref()
    }

    /// Preferences followed by manual sources.
    pub fn active(&self) -> Vec<String> {
        self.preferences.iter().chain(self.manual.iter()).cloned().collect()
    }
}

/// Per-scan merge: everything this scan has delivered so far, in arrival
/// order, ahead of what was held before the scan began.
#[derive(Debug, Clone, Default)]
pub struct ScanAccumulator {
    baseline: Vec<TrendingItem>,
    batch: Vec<TrendingItem>,
}

impl ScanAccumulator {
    pub fn begin(baseline: Vec<TrendingItem>) -> Self {
        Self {
            baseline,
            batch: Vec::new(),
        }
    }

    pub fn push(&mut self, item: TrendingItem) -> Vec<TrendingItem> {
        self.batch.push(item);
        ingest(&self.baseline, &self.batch)
    }

    pub fn delivered(&self) -> usize {
        self.batch.len()
    }
}

/// Identifies one `begin_scan` .. `end_scan` span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanTicket(u64);

/// In-memory collection for one page session.
#[derive(Debug, Clone, Default)]
pub struct AggregationState {
    items: Vec<TrendingItem>,
    pub selection: SourceSelection,
    pub is_from_cache: bool,
    pub is_loading: bool,
    // Only the latest scan owns the accumulator.
    scan: Option<(ScanTicket, ScanAccumulator)>,
    next_ticket: u64,
}

impl AggregationState {
    pub fn new(selection: SourceSelection) -> Self {
        Self {
            selection,
            ..Self::default()
        }
    }

    /// Seed from today's cached results before any scan runs.
    pub fn hydrate(&mut self, cached: Vec<TrendingItem>) {
        self.items = ingest(&[], &cached);
        self.is_from_cache = !self.items.is_empty();
        self.is_loading = false;
    }

    /// Merge an out-of-scan batch (e.g. assistant results).
    pub fn ingest_batch(&mut self, batch: &[TrendingItem]) {
        self.items = ingest(&self.items, batch);
    }

    /// Start a scan. A scan already in progress loses its accumulator and
    /// its later arrivals are ignored.
    pub fn begin_scan(&mut self) -> ScanTicket {
        let ticket = ScanTicket(self.next_ticket);
        self.next_ticket += 1;
        self.is_loading = true;
        self.scan = Some((ticket, ScanAccumulator::begin(self.items.clone())));
        ticket
    }

    fn owns_scan(&self, ticket: ScanTicket) -> bool {
        self.scan.as_ref().is_some_and(|(t, _)| *t == ticket)
    }

    /// One arrival during the scan `ticket`. Returns false (and changes
    /// nothing) when that scan has been superseded or ended.
    pub fn ingest_scanned(&mut self, ticket: ScanTicket, item: TrendingItem, cached: bool) -> bool {
        let Some((_, acc)) = self.scan.as_mut().filter(|(t, _)| *t == ticket) else {
            return false;
        };
        let source = item.source.clone();
        self.items = acc.push(item);
        self.selection.note_scanned(&source);
        if !cached {
            self.is_from_cache = false;
        }
        true
    }

    /// End the scan `ticket`. A superseded scan leaves the current one running.
    pub fn end_scan(&mut self, ticket: ScanTicket) {
        if self.owns_scan(ticket) {
            self.is_loading = false;
            self.scan = None;
        }
    }

    pub fn items(&self) -> &[TrendingItem] {
        &self.items
    }

    /// Displayed order: selection filter, then priority pin.
    pub fn view(&self) -> Vec<TrendingItem> {
        let active = self.selection.active();
        let filtered = filter(&self.items, &active);
        prioritize(&filtered, self.selection.priority()).into_owned()
    }
}
