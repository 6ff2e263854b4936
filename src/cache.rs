//! Element-set acquisition with staleness and multi-source fallback.
//!
//! Acquisition walks a fixed chain and stops at the first usable result:
//! fresh cache entry, each network source in order, stale cache entry,
//! embedded element set. It never fails.

use std::fmt;
use std::sync::mpsc;
use std::thread;

use chrono::{DateTime, Duration, Utc};

use crate::config::TrackerConfig;
use crate::error::Result;
use crate::source::{CatalogSource, ElementSource, TelemetryApiSource};
use crate::store::{JsonFileStore, KeyValueStore};
use crate::tle::ElementSet;

pub const DATA_KEY: &str = "iss_tle_data";
pub const TIMESTAMP_KEY: &str = "iss_tle_timestamp";

pub const DEFAULT_MAX_AGE_SECS: i64 = 2 * 60 * 60;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Origin {
    FreshCache,
    Network(String),
    StaleCache,
    Embedded,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Acquisition {
    pub element_set: ElementSet,
    /// When the element set was fetched from the network, if known.
    pub acquired_at: Option<DateTime<Utc>>,
    pub origin: Origin,
}

impl Acquisition {
    pub fn is_offline(&self) -> bool {
        matches!(self.origin, Origin::StaleCache | Origin::Embedded)
    }
}

/// Advisory stage text for the UI. Never consulted by the chain itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AcquisitionStatus {
    Checking,
    Updating(String),
    OfflineCache,
    OfflineFallback,
    Resolved,
}

impl fmt::Display for AcquisitionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcquisitionStatus::Checking => write!(f, "Checking cached elements..."),
            AcquisitionStatus::Updating(source) => write!(f, "Updating ({})...", source),
            AcquisitionStatus::OfflineCache => write!(f, "Offline mode (cache)"),
            AcquisitionStatus::OfflineFallback => write!(f, "Offline mode (fallback)"),
            AcquisitionStatus::Resolved => Ok(()),
        }
    }
}

#[derive(Clone, Debug)]
struct CacheEntry {
    element_set: ElementSet,
    fetched_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    /// Entries without a timestamp are never fresh. Timestamps in the future count as fresh.
    fn is_fresh(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.fetched_at.is_some_and(|t| now - t < max_age)
    }
}

/// Receiving ends of a background acquisition.
pub struct AcquisitionHandle {
    pub result: mpsc::Receiver<Acquisition>,
    pub status: mpsc::Receiver<AcquisitionStatus>,
}

pub struct ElementSetCache {
    store: Box<dyn KeyValueStore>,
    sources: Vec<Box<dyn ElementSource>>,
    max_age: Duration,
    status_tx: Option<mpsc::Sender<AcquisitionStatus>>,
}

impl ElementSetCache {
    pub fn new(store: Box<dyn KeyValueStore>, sources: Vec<Box<dyn ElementSource>>) -> Self {
        Self {
            store,
            sources,
            max_age: Duration::seconds(DEFAULT_MAX_AGE_SECS),
            status_tx: None,
        }
    }

    pub fn from_config(config: &TrackerConfig) -> Self {
        let store = JsonFileStore::open(&config.store_path);
        let sources: Vec<Box<dyn ElementSource>> = vec![
            Box::new(TelemetryApiSource::from_config(config)),
            Box::new(CatalogSource::from_config(config)),
        ];
        Self::new(Box::new(store), sources).with_max_age(Duration::seconds(config.max_cache_age_secs))
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn with_status(mut self, tx: mpsc::Sender<AcquisitionStatus>) -> Self {
        self.status_tx = Some(tx);
        self
    }

    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    fn emit(&self, status: AcquisitionStatus) {
        log::debug!("acquisition status: {:?}", status);
        if let Some(tx) = &self.status_tx {
            let _ = tx.send(status);
        }
    }

    fn read_entry(&self) -> Option<CacheEntry> {
        let raw = self.store.get(DATA_KEY)?;
        let element_set = serde_json::from_str::<ElementSet>(&raw)
            .ok()
            .and_then(|set| ElementSet::new(set.line1(), set.line2()).ok());
        let Some(element_set) = element_set else {
            log::warn!("Cached element set is unreadable, ignoring it");
            return None;
        };
        let fetched_at = self
            .store
            .get(TIMESTAMP_KEY)
            .and_then(|s| s.trim().parse::<i64>().ok())
            .and_then(DateTime::from_timestamp_millis);
        Some(CacheEntry { element_set, fetched_at })
    }

    fn write_entry(&mut self, element_set: &ElementSet, fetched_at: DateTime<Utc>) -> Result<()> {
        let data = serde_json::to_string(element_set)?;
        self.store.set(DATA_KEY, &data)?;
        self.store.set(TIMESTAMP_KEY, &fetched_at.timestamp_millis().to_string())?;
        log::info!("Cached element set fetched at {}", fetched_at);
        Ok(())
    }

    /// Resolves an element set. Each stage is attempted only if the previous one yielded nothing.
    pub fn acquire(&mut self, now: DateTime<Utc>) -> Acquisition {
        self.emit(AcquisitionStatus::Checking);
        let cached = self.read_entry();

        if let Some(entry) = cached.as_ref().filter(|e| e.is_fresh(now, self.max_age)) {
            log::info!("Using cached element set from {:?}", entry.fetched_at);
            self.emit(AcquisitionStatus::Resolved);
            return Acquisition {
                element_set: entry.element_set.clone(),
                acquired_at: entry.fetched_at,
                origin: Origin::FreshCache,
            };
        }

        for index in 0..self.sources.len() {
            let name = self.sources[index].name().to_string();
            self.emit(AcquisitionStatus::Updating(name.clone()));
            match self.sources[index].fetch() {
                Ok(element_set) => {
                    log::info!("Fetched element set from {} source", name);
                    if let Err(e) = self.write_entry(&element_set, now) {
                        log::warn!("Failed to cache element set: {}", e);
                    }
                    self.emit(AcquisitionStatus::Resolved);
                    return Acquisition {
                        element_set,
                        acquired_at: Some(now),
                        origin: Origin::Network(name),
                    };
                }
                Err(e) => log::warn!("{} source failed: {}", name, e),
            }
        }

        if let Some(entry) = cached {
            log::warn!("All sources failed, using stale cached element set");
            self.emit(AcquisitionStatus::OfflineCache);
            return Acquisition {
                element_set: entry.element_set,
                acquired_at: entry.fetched_at,
                origin: Origin::StaleCache,
            };
        }

        log::warn!("All sources failed and nothing is cached, using embedded element set");
        self.emit(AcquisitionStatus::OfflineFallback);
        Acquisition {
            element_set: ElementSet::embedded(),
            acquired_at: None,
            origin: Origin::Embedded,
        }
    }

    /// Runs [`acquire`](Self::acquire) on a background thread.
    pub fn spawn(self) -> AcquisitionHandle {
        let (status_tx, status_rx) = mpsc::channel();
        let (result_tx, result_rx) = mpsc::channel();
        let mut cache = self.with_status(status_tx);
        thread::spawn(move || {
            let acquisition = cache.acquire(Utc::now());
            let _ = result_tx.send(acquisition);
        });
        AcquisitionHandle { result: result_rx, status: status_rx }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TrackerError;
    use crate::store::MemoryStore;
    use crate::tle::{EMBEDDED_LINE1, EMBEDDED_LINE2};
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const OTHER_LINE1: &str = "1 25544U 98067A   24061.50000000  .00016717  00000+0  10270-3 0  9992";
    const OTHER_LINE2: &str = "2 25544  51.6442 209.6558 0005013 100.1234 250.6789 15.49500000 12340";

    struct ScriptedSource {
        name: &'static str,
        reply: Option<ElementSet>,
        calls: Arc<AtomicUsize>,
    }

    impl ElementSource for ScriptedSource {
        fn name(&self) -> &str {
            self.name
        }

        fn fetch(&self) -> Result<ElementSet> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply
                .clone()
                .ok_or_else(|| TrackerError::network(self.name, "connection refused"))
        }
    }

    fn source(name: &'static str, reply: Option<ElementSet>) -> (Box<dyn ElementSource>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (Box::new(ScriptedSource { name, reply, calls: calls.clone() }), calls)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn other_set() -> ElementSet {
        ElementSet::new(OTHER_LINE1, OTHER_LINE2).unwrap()
    }

    fn store_with(set: &ElementSet, fetched_at: Option<DateTime<Utc>>) -> MemoryStore {
        let mut entries = vec![(DATA_KEY, serde_json::to_string(set).unwrap())];
        if let Some(t) = fetched_at {
            entries.push((TIMESTAMP_KEY, t.timestamp_millis().to_string()));
        }
        MemoryStore::with_entries(entries)
    }

    #[test]
    fn fresh_cache_skips_network() {
        let (primary, primary_calls) = source("primary", Some(ElementSet::embedded()));
        let (secondary, secondary_calls) = source("secondary", Some(ElementSet::embedded()));
        let store = store_with(&other_set(), Some(now() - Duration::hours(1)));
        let mut cache = ElementSetCache::new(Box::new(store), vec![primary, secondary]);

        let acquisition = cache.acquire(now());
        assert_eq!(acquisition.origin, Origin::FreshCache);
        assert_eq!(acquisition.element_set, other_set());
        assert_eq!(primary_calls.load(Ordering::SeqCst), 0);
        assert_eq!(secondary_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn stale_cache_wins_over_embedded_when_offline() {
        let (primary, primary_calls) = source("primary", None);
        let (secondary, secondary_calls) = source("secondary", None);
        let store = store_with(&other_set(), Some(now() - Duration::hours(3)));
        let mut cache = ElementSetCache::new(Box::new(store), vec![primary, secondary]);

        let acquisition = cache.acquire(now());
        assert_eq!(acquisition.origin, Origin::StaleCache);
        assert_eq!(acquisition.element_set, other_set());
        assert!(acquisition.is_offline());
        assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
        assert_eq!(secondary_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn network_result_is_persisted() {
        let (primary, _) = source("primary", Some(other_set()));
        let (secondary, secondary_calls) = source("secondary", None);
        let mut cache = ElementSetCache::new(Box::new(MemoryStore::new()), vec![primary, secondary]);

        let acquisition = cache.acquire(now());
        assert_eq!(acquisition.origin, Origin::Network("primary".into()));
        assert_eq!(acquisition.acquired_at, Some(now()));
        assert_eq!(secondary_calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            cache.store().get(TIMESTAMP_KEY),
            Some(now().timestamp_millis().to_string())
        );
        let stored: ElementSet = serde_json::from_str(&cache.store().get(DATA_KEY).unwrap()).unwrap();
        assert_eq!(stored, other_set());
    }

    #[test]
    fn secondary_used_after_primary_fails() {
        let (primary, _) = source("primary", None);
        let (secondary, _) = source("secondary", Some(other_set()));
        let mut cache = ElementSetCache::new(Box::new(MemoryStore::new()), vec![primary, secondary]);

        let acquisition = cache.acquire(now());
        assert_eq!(acquisition.origin, Origin::Network("secondary".into()));
        assert_eq!(acquisition.element_set, other_set());
    }

    #[test]
    fn embedded_when_nothing_available() {
        let (primary, _) = source("primary", None);
        let mut cache = ElementSetCache::new(Box::new(MemoryStore::new()), vec![primary]);

        let acquisition = cache.acquire(now());
        assert_eq!(acquisition.origin, Origin::Embedded);
        assert_eq!(acquisition.element_set.line1(), EMBEDDED_LINE1);
        assert_eq!(acquisition.element_set.line2(), EMBEDDED_LINE2);
        assert_eq!(acquisition.acquired_at, None);
    }

    #[test]
    fn untimed_entry_is_stale_but_usable() {
        let (primary, primary_calls) = source("primary", None);
        let store = store_with(&other_set(), None);
        let mut cache = ElementSetCache::new(Box::new(store), vec![primary]);

        let acquisition = cache.acquire(now());
        assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
        assert_eq!(acquisition.origin, Origin::StaleCache);
    }

    #[test]
    fn corrupt_entry_is_ignored() {
        let (primary, _) = source("primary", None);
        let store = MemoryStore::with_entries([(DATA_KEY, "{\"l1\":\"garbage\",\"l2\":\"\"}".to_string())]);
        let mut cache = ElementSetCache::new(Box::new(store), vec![primary]);
        assert_eq!(cache.acquire(now()).origin, Origin::Embedded);
    }

    #[test]
    fn status_stages_are_reported_in_order() {
        let (tx, rx) = mpsc::channel();
        let (primary, _) = source("primary", None);
        let (secondary, _) = source("secondary", None);
        let mut cache =
            ElementSetCache::new(Box::new(MemoryStore::new()), vec![primary, secondary]).with_status(tx);
        cache.acquire(now());
        drop(cache);
        let texts: Vec<String> = rx.iter().map(|s| s.to_string()).collect();
        assert_eq!(
            texts,
            vec![
                "Checking cached elements...",
                "Updating (primary)...",
                "Updating (secondary)...",
                "Offline mode (fallback)",
            ]
        );
    }

    #[test]
    fn spawned_acquisition_delivers_result() {
        let (primary, _) = source("primary", Some(other_set()));
        let handle = ElementSetCache::new(Box::new(MemoryStore::new()), vec![primary]).spawn();
        let acquisition = handle.result.recv().unwrap();
        assert_eq!(acquisition.element_set, other_set());
        let last = handle.status.iter().last().unwrap();
        assert_eq!(last, AcquisitionStatus::Resolved);
        assert_eq!(last.to_string(), "");
    }
}
