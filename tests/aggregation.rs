// tests/aggregation.rs
//
// Merge, dedup and reordering rules over many synthetic batches.

mod common;

use std::collections::HashMap;

use rand::{rngs::StdRng, seq::IndexedRandom, Rng, SeedableRng};

use common::{item, urls};
use devpulse_client::aggregate::{filter, ingest, prioritize};
use devpulse_client::item::KNOWN_SOURCES;
use devpulse_client::{AggregationState, TrendingItem};

fn synthetic_batch(rng: &mut StdRng, round: usize) -> Vec<TrendingItem> {
    let len = rng.random_range(0..6);
    (0..len)
        .map(|i| {
            let url = format!("https://x.dev/{}", rng.random_range(0..12));
            let source = KNOWN_SOURCES.choose(&mut *rng).copied().unwrap_or("github");
            let mut it = item(source, &url);
            it.title = format!("round {round} #{i}");
            it
        })
        .collect()
}

#[test]
fn merge_order_pins_batch_first_then_untouched() {
    let a = item("github", "1");
    let b = item("reddit", "2");
    let mut b2 = item("reddit", "2");
    b2.title = "B prime".into();
    let c = item("devto", "3");

    let out = ingest(&[a, b], &[b2, c]);
    assert_eq!(urls(&out), vec!["2", "3", "1"]);
    assert_eq!(out[0].title, "B prime");
}

#[test]
fn empty_batch_does_not_duplicate() {
    let existing = vec![item("github", "1"), item("reddit", "2")];
    let out = ingest(&existing, &[]);
    assert_eq!(out.len(), 2);
    assert_eq!(out, existing);
}

#[test]
fn at_most_one_item_per_url_and_it_is_the_latest() {
    let mut rng = StdRng::seed_from_u64(0x5eed_cafe);
    for _run in 0..50 {
        let mut held: Vec<TrendingItem> = Vec::new();
        let mut latest: HashMap<String, String> = HashMap::new();
        for round in 0..20 {
            let batch = synthetic_batch(&mut rng, round);
            for it in &batch {
                latest.insert(it.url.clone(), it.title.clone());
            }
            held = ingest(&held, &batch);

            let mut seen = std::collections::HashSet::new();
            for it in &held {
                assert!(seen.insert(it.url.clone()), "duplicate url {}", it.url);
                assert_eq!(latest.get(&it.url), Some(&it.title), "stale value for {}", it.url);
            }
            assert_eq!(held.len(), latest.len());
        }
    }
}

#[test]
fn filter_never_changes_size() {
    let mut rng = StdRng::seed_from_u64(42);
    for round in 0..200 {
        let items = ingest(&[], &synthetic_batch(&mut rng, round));
        let pick = rng.random_range(0..=KNOWN_SOURCES.len());
        let selection: Vec<String> = KNOWN_SOURCES[..pick].iter().map(|s| s.to_string()).collect();
        let out = filter(&items, &selection);
        assert_eq!(out.len(), items.len());

        let mut before = urls(&items);
        let mut after = urls(&out);
        before.sort();
        after.sort();
        assert_eq!(before, after, "filter must be a permutation");
    }
}

#[test]
fn filter_then_priority_on_subsourced_items() {
    let items = vec![
        item("reddit/rust", "r1"),
        item("github", "g1"),
        item("hackernews", "h1"),
        item("reddit/programming", "r2"),
    ];
    let filtered = filter(&items, &["Reddit".to_string()]);
    assert_eq!(urls(&filtered), vec!["r1", "r2", "g1", "h1"]);
    let pinned = prioritize(&filtered, Some("hackernews"));
    assert_eq!(urls(&pinned), vec!["h1", "r1", "r2", "g1"]);
}

#[test]
fn scan_merge_puts_new_item_before_old() {
    let mut st = AggregationState::default();
    st.hydrate(vec![item("github", "a")]);
    let scan = st.begin_scan();
    st.ingest_scanned(scan, item("reddit", "b"), false);
    st.end_scan(scan);
    assert_eq!(urls(st.items()), vec!["b", "a"]);
    assert_eq!(st.selection.manual(), ["reddit".to_string()]);
}
