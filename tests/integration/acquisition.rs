//! EPS acquisition against a real CSV cache

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use intrinsic_value::cache::{CsvEpsCache, EpsStore};
use intrinsic_value::eps_collector::EpsCollector;
use intrinsic_value::error::ScreenerError;
use intrinsic_value::models::CompanyRecord;

use crate::common::logging::{init_test_logging, log_test_step};
use crate::common::{acme_and_beta, MissingUniverse, RecordingEpsSource, StaticUniverse};

fn source() -> RecordingEpsSource {
    RecordingEpsSource::default()
        .with("ACM", 2014, "$1.00")
        .with("ACM", 2019, "$1.40")
        .with("ACM", 2024, "$2.00")
        .with("BTA", 2019, "0.75")
        .with("BTA", 2024, "$3.00")
}

#[tokio::test]
async fn test_second_run_is_served_from_cache() {
    init_test_logging();
    let dir = TempDir::new().unwrap();
    let cache_path = dir.path().join("eps_cache.csv");

    log_test_step("First run fills the cache");
    let collector = EpsCollector::new(
        StaticUniverse(acme_and_beta()),
        CsvEpsCache::new(&cache_path),
        source(),
    );
    let first = collector.acquire(2025, 10).await.unwrap();
    assert_eq!(first.window.initial, 2014);
    assert_eq!(first.window.latest, 2024);
    assert_eq!(first.stats.fetch_calls, 4);
    assert_eq!(first.stats.fetched, 3);
    assert_eq!(first.stats.unresolved, 1);
    assert_eq!(first.pairs[0].eps_initial.as_deref(), Some("$1.00"));
    assert_eq!(first.pairs[0].eps_latest.as_deref(), Some("$2.00"));
    assert_eq!(first.pairs[1].eps_initial, None);
    assert_eq!(first.pairs[1].eps_latest.as_deref(), Some("$3.00"));

    log_test_step("Same window again only retries the unresolved year");
    collector.source().reset_calls();
    let second = collector.acquire(2025, 10).await.unwrap();
    assert_eq!(collector.source().calls(), vec![("BTA".to_string(), 2014)]);
    assert_eq!(second.stats.cache_hits, 3);
    assert_eq!(second.pairs, first.pairs);

    log_test_step("Overlapping window fetches only the new year");
    collector.source().reset_calls();
    let shorter = collector.acquire(2025, 5).await.unwrap();
    assert_eq!(shorter.window.initial, 2019);
    assert_eq!(
        collector.source().calls(),
        vec![("ACM".to_string(), 2019), ("BTA".to_string(), 2019)]
    );
    assert_eq!(shorter.pairs[0].eps_initial.as_deref(), Some("$1.40"));
    assert_eq!(shorter.pairs[1].eps_initial.as_deref(), Some("0.75"));

    collector.source().reset_calls();
    collector.acquire(2025, 5).await.unwrap();
    assert!(collector.source().calls().is_empty());
}

#[tokio::test]
async fn test_fetched_values_reach_the_cache_file() {
    init_test_logging();
    let dir = TempDir::new().unwrap();
    let cache_path = dir.path().join("eps_cache.csv");

    let collector = EpsCollector::new(
        StaticUniverse(acme_and_beta()),
        CsvEpsCache::new(&cache_path),
        source(),
    );
    collector.acquire(2025, 10).await.unwrap();

    // A fresh handle sees what the collector wrote
    let reopened = CsvEpsCache::new(&cache_path);
    assert_eq!(reopened.get("ACM", 2014).unwrap().as_deref(), Some("$1.00"));
    assert_eq!(reopened.get("BTA", 2024).unwrap().as_deref(), Some("$3.00"));
    assert_eq!(reopened.get("BTA", 2014).unwrap(), None);
}

#[tokio::test]
async fn test_prepopulated_cache_avoids_fetching() {
    init_test_logging();
    let dir = TempDir::new().unwrap();
    let cache = CsvEpsCache::new(dir.path().join("eps_cache.csv"));
    let acme = CompanyRecord::new("Acme", "ACM");
    cache.put(&acme, 2014, "$1.00").unwrap();
    cache.put(&acme, 2024, "$2.00").unwrap();

    let collector = EpsCollector::new(
        StaticUniverse(vec![acme]),
        cache,
        RecordingEpsSource::default(),
    );
    let acquisition = collector.acquire(2025, 10).await.unwrap();

    assert!(collector.source().calls().is_empty());
    assert_eq!(acquisition.stats.cache_hits, 2);
    assert_eq!(acquisition.pairs[0].eps_latest.as_deref(), Some("$2.00"));
}

#[tokio::test]
async fn test_limit_truncates_universe() {
    init_test_logging();
    let dir = TempDir::new().unwrap();
    let collector = EpsCollector::new(
        StaticUniverse(acme_and_beta()),
        CsvEpsCache::new(dir.path().join("eps_cache.csv")),
        source(),
    )
    .with_limit(Some(1));

    let acquisition = collector.acquire(2025, 10).await.unwrap();
    assert_eq!(acquisition.pairs.len(), 1);
    assert_eq!(acquisition.pairs[0].ticker, "ACM");
    assert!(collector.source().calls().iter().all(|(t, _)| t == "ACM"));
}

#[tokio::test]
async fn test_universe_failure_aborts_before_fetching() {
    init_test_logging();
    let dir = TempDir::new().unwrap();
    let collector = EpsCollector::new(
        MissingUniverse,
        CsvEpsCache::new(dir.path().join("eps_cache.csv")),
        source(),
    );

    let err = collector.acquire(2025, 10).await.unwrap_err();
    assert_matches!(err, ScreenerError::UniverseUnavailable(_));
    assert!(collector.source().calls().is_empty());
    assert!(!dir.path().join("eps_cache.csv").exists());
}

#[tokio::test]
async fn test_empty_universe_is_unavailable() {
    init_test_logging();
    let dir = TempDir::new().unwrap();
    let collector = EpsCollector::new(
        StaticUniverse(Vec::new()),
        CsvEpsCache::new(dir.path().join("eps_cache.csv")),
        source(),
    );

    assert_matches!(
        collector.acquire(2025, 10).await,
        Err(ScreenerError::UniverseUnavailable(_))
    );
}
