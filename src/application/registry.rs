//! Proxy Registry
//!
//! Single source of truth for proxy identity, dedup, and health state.
//! Backed by a DashMap keyed by canonical identity, so concurrent check
//! workers update disjoint entries without contending on a global lock,
//! and every cloned-out record is internally consistent.

use crate::domain::entities::{CheckRecord, ProxyRecord, ResolvedEntry};
use crate::domain::value_objects::ProxyKey;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::collections::HashSet;

/// Canonical, deduplicated store of proxy records and their check history.
pub struct Registry {
    proxies: DashMap<ProxyKey, ProxyRecord>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            proxies: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    /// Insert or update proxies reported by a source.
    ///
    /// New identities are created as unchecked; existing ones only gain the
    /// source id (and a fresher password). Check history is never touched.
    /// Returns the number of newly created records.
    pub fn upsert(&self, entries: Vec<ResolvedEntry>, source_id: &str, now: DateTime<Utc>) -> usize {
        let mut created = 0;
        for entry in entries {
            match self.proxies.entry(entry.key.clone()) {
                dashmap::mapref::entry::Entry::Occupied(mut occupied) => {
                    let record = occupied.get_mut();
                    record.sources.insert(source_id.to_string());
                    if entry.password.is_some() {
                        record.password = entry.password;
                    }
                }
                dashmap::mapref::entry::Entry::Vacant(vacant) => {
                    vacant.insert(ProxyRecord::new(entry, source_id, now));
                    created += 1;
                }
            }
        }
        created
    }

    /// Fold a check result into a proxy's record.
    ///
    /// Returns false if the proxy no longer exists (deleted concurrently by
    /// the sweeper) — an expected race, not an error.
    pub fn record_check(&self, key: &ProxyKey, check: CheckRecord) -> bool {
        match self.proxies.get_mut(key) {
            Some(mut record) => {
                record.apply_check(check);
                true
            }
            None => {
                tracing::debug!("check result for deleted proxy {}, dropped", key);
                false
            }
        }
    }

    /// Select up to `limit` proxies due for a check, without mutating state.
    ///
    /// Due: never checked (highest priority, oldest `created_at` first), or
    /// last checked more than `recheck_after` ago (oldest first). Keys in
    /// `exclude` (the scheduler's in-flight set) are skipped.
    pub fn select_due(
        &self,
        limit: usize,
        now: DateTime<Utc>,
        recheck_after: Duration,
        exclude: &HashSet<ProxyKey>,
    ) -> Vec<ProxyKey> {
        if limit == 0 {
            return Vec::new();
        }

        let mut unchecked: Vec<(DateTime<Utc>, ProxyKey)> = Vec::new();
        let mut stale: Vec<(DateTime<Utc>, ProxyKey)> = Vec::new();
        for entry in self.proxies.iter() {
            if exclude.contains(entry.key()) {
                continue;
            }
            match entry.last_checked_at {
                None => unchecked.push((entry.created_at, entry.key().clone())),
                Some(checked_at) if now - checked_at > recheck_after => {
                    stale.push((checked_at, entry.key().clone()));
                }
                Some(_) => {}
            }
        }

        unchecked.sort();
        stale.sort();

        unchecked
            .into_iter()
            .chain(stale)
            .take(limit)
            .map(|(_, key)| key)
            .collect()
    }

    /// Current record for one proxy, cloned under its entry lock.
    pub fn get(&self, key: &ProxyKey) -> Option<ProxyRecord> {
        self.proxies.get(key).map(|r| r.clone())
    }

    /// Point-in-time clones of all records. Each record is internally
    /// consistent; the set as a whole is eventually consistent with
    /// concurrent writers.
    pub fn snapshot(&self) -> Vec<ProxyRecord> {
        self.proxies.iter().map(|r| r.clone()).collect()
    }

    /// Remove a proxy and its history permanently.
    pub fn delete(&self, key: &ProxyKey) -> bool {
        self.proxies.remove(key).is_some()
    }

    /// Delete proxies that have failed persistently: at least one recorded
    /// check, and no success within `dead_after`. Returns the removed count.
    pub fn sweep(&self, now: DateTime<Utc>, dead_after: Duration) -> usize {
        let dead: Vec<ProxyKey> = self
            .proxies
            .iter()
            .filter(|entry| {
                if entry.history.is_empty() {
                    return false;
                }
                match entry.last_success_at {
                    None => true,
                    Some(ok_at) => now - ok_at >= dead_after,
                }
            })
            .map(|entry| entry.key().clone())
            .collect();

        let count = dead.len();
        for key in dead {
            self.proxies.remove(&key);
            tracing::info!("removed dead proxy {}", key);
        }
        count
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{CheckErrorKind, Protocol, ProxyStatus};

    fn entry(host: &str, port: u16) -> ResolvedEntry {
        ResolvedEntry::new(Protocol::Socks5, host, port, None, None)
    }

    fn key(host: &str, port: u16) -> ProxyKey {
        ProxyKey::new(Protocol::Socks5, host, port)
    }

    #[test]
    fn test_upsert_creates_unchecked() {
        let registry = Registry::new();
        let created = registry.upsert(vec![entry("1.2.3.4", 1080)], "s1", Utc::now());

        assert_eq!(created, 1);
        let record = registry.get(&key("1.2.3.4", 1080)).unwrap();
        assert_eq!(record.status, ProxyStatus::Unchecked);
    }

    #[test]
    fn test_upsert_same_identity_unions_sources() {
        let registry = Registry::new();
        let now = Utc::now();
        registry.upsert(vec![entry("1.2.3.4", 1080)], "s1", now);
        registry.upsert(vec![entry("1.2.3.4", 1080)], "s2", now);
        registry.upsert(vec![entry("1.2.3.4", 1080)], "s1", now);

        assert_eq!(registry.len(), 1);
        let record = registry.get(&key("1.2.3.4", 1080)).unwrap();
        let sources: Vec<&str> = record.sources.iter().map(|s| s.as_str()).collect();
        assert_eq!(sources, vec!["s1", "s2"]);
    }

    #[test]
    fn test_upsert_never_touches_history() {
        let registry = Registry::new();
        let now = Utc::now();
        registry.upsert(vec![entry("1.2.3.4", 1080)], "s1", now);
        registry.record_check(
            &key("1.2.3.4", 1080),
            CheckRecord::ok(now, "1.2.3.4".to_string(), 10),
        );

        registry.upsert(vec![entry("1.2.3.4", 1080)], "s2", now);

        let record = registry.get(&key("1.2.3.4", 1080)).unwrap();
        assert_eq!(record.history.len(), 1);
        assert_eq!(record.status, ProxyStatus::Ok);
    }

    #[test]
    fn test_record_check_on_deleted_proxy_is_noop() {
        let registry = Registry::new();
        let recorded = registry.record_check(
            &key("9.9.9.9", 1080),
            CheckRecord::ok(Utc::now(), "9.9.9.9".to_string(), 10),
        );
        assert!(!recorded);
    }

    #[test]
    fn test_select_due_unchecked_first() {
        let registry = Registry::new();
        let now = Utc::now();
        // Checked long ago.
        registry.upsert(vec![entry("1.1.1.1", 1080)], "s1", now - Duration::hours(2));
        registry.record_check(
            &key("1.1.1.1", 1080),
            CheckRecord::ok(now - Duration::minutes(30), "1.1.1.1".to_string(), 10),
        );
        // Never checked, created later.
        registry.upsert(vec![entry("2.2.2.2", 1080)], "s1", now);

        let due = registry.select_due(10, now, Duration::minutes(5), &HashSet::new());
        assert_eq!(due[0], key("2.2.2.2", 1080));
        assert_eq!(due[1], key("1.1.1.1", 1080));
    }

    #[test]
    fn test_select_due_unchecked_ordered_by_created_at() {
        let registry = Registry::new();
        let now = Utc::now();
        registry.upsert(vec![entry("2.2.2.2", 1080)], "s1", now - Duration::minutes(1));
        registry.upsert(vec![entry("1.1.1.1", 1080)], "s1", now - Duration::minutes(10));

        let due = registry.select_due(10, now, Duration::minutes(5), &HashSet::new());
        assert_eq!(due[0], key("1.1.1.1", 1080));
        assert_eq!(due[1], key("2.2.2.2", 1080));
    }

    #[test]
    fn test_select_due_skips_fresh_and_excluded() {
        let registry = Registry::new();
        let now = Utc::now();
        registry.upsert(vec![entry("1.1.1.1", 1080), entry("2.2.2.2", 1080)], "s1", now);
        registry.record_check(
            &key("1.1.1.1", 1080),
            CheckRecord::ok(now - Duration::minutes(1), "1.1.1.1".to_string(), 10),
        );

        let mut exclude = HashSet::new();
        exclude.insert(key("2.2.2.2", 1080));

        // 1.1.1.1 was checked a minute ago (fresh), 2.2.2.2 is in flight.
        let due = registry.select_due(10, now, Duration::minutes(5), &exclude);
        assert!(due.is_empty());
    }

    #[test]
    fn test_select_due_stale_oldest_first_and_limited() {
        let registry = Registry::new();
        let now = Utc::now();
        for (host, age_min) in [("1.1.1.1", 20), ("2.2.2.2", 40), ("3.3.3.3", 10)] {
            registry.upsert(vec![entry(host, 1080)], "s1", now - Duration::hours(1));
            registry.record_check(
                &key(host, 1080),
                CheckRecord::ok(now - Duration::minutes(age_min), host.to_string(), 10),
            );
        }

        let due = registry.select_due(2, now, Duration::minutes(5), &HashSet::new());
        assert_eq!(due, vec![key("2.2.2.2", 1080), key("1.1.1.1", 1080)]);
    }

    #[test]
    fn test_select_due_zero_limit() {
        let registry = Registry::new();
        registry.upsert(vec![entry("1.1.1.1", 1080)], "s1", Utc::now());
        assert!(registry
            .select_due(0, Utc::now(), Duration::minutes(5), &HashSet::new())
            .is_empty());
    }

    #[test]
    fn test_delete() {
        let registry = Registry::new();
        registry.upsert(vec![entry("1.2.3.4", 1080)], "s1", Utc::now());

        assert!(registry.delete(&key("1.2.3.4", 1080)));
        assert!(!registry.delete(&key("1.2.3.4", 1080)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_sweep_removes_never_succeeded_with_checks() {
        let registry = Registry::new();
        let now = Utc::now();
        registry.upsert(vec![entry("1.2.3.4", 1080)], "s1", now - Duration::hours(2));
        registry.record_check(
            &key("1.2.3.4", 1080),
            CheckRecord::failed(now, CheckErrorKind::Timeout, 5000),
        );

        assert_eq!(registry.sweep(now, Duration::hours(1)), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_sweep_keeps_unchecked() {
        let registry = Registry::new();
        let now = Utc::now();
        // Never given a chance to be checked: not eligible for deletion.
        registry.upsert(vec![entry("1.2.3.4", 1080)], "s1", now - Duration::hours(5));

        assert_eq!(registry.sweep(now, Duration::hours(1)), 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_sweep_removes_stale_success() {
        let registry = Registry::new();
        let now = Utc::now();
        registry.upsert(vec![entry("1.2.3.4", 1080)], "s1", now - Duration::hours(3));
        registry.record_check(
            &key("1.2.3.4", 1080),
            CheckRecord::ok(now - Duration::hours(1), "1.2.3.4".to_string(), 10),
        );

        // Exactly at the boundary: eligible (>= dead_after).
        assert_eq!(registry.sweep(now, Duration::hours(1)), 1);
    }

    #[test]
    fn test_sweep_keeps_recent_success() {
        let registry = Registry::new();
        let now = Utc::now();
        registry.upsert(vec![entry("1.2.3.4", 1080)], "s1", now - Duration::hours(3));
        registry.record_check(
            &key("1.2.3.4", 1080),
            CheckRecord::ok(now - Duration::minutes(30), "1.2.3.4".to_string(), 10),
        );

        assert_eq!(registry.sweep(now, Duration::hours(1)), 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_deleted_proxy_reingested_is_brand_new() {
        let registry = Registry::new();
        let now = Utc::now();
        registry.upsert(vec![entry("1.2.3.4", 1080)], "s1", now - Duration::hours(2));
        registry.record_check(
            &key("1.2.3.4", 1080),
            CheckRecord::failed(now, CheckErrorKind::ConnectFailed, 1),
        );
        registry.sweep(now, Duration::hours(1));

        registry.upsert(vec![entry("1.2.3.4", 1080)], "s1", now);
        let record = registry.get(&key("1.2.3.4", 1080)).unwrap();
        assert_eq!(record.status, ProxyStatus::Unchecked);
        assert!(record.history.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_record_check_on_distinct_proxies() {
        use std::sync::Arc;

        let registry = Arc::new(Registry::new());
        let now = Utc::now();
        let entries: Vec<ResolvedEntry> =
            (0..50).map(|i| entry(&format!("10.0.0.{}", i), 1080)).collect();
        registry.upsert(entries, "s1", now);

        let mut handles = Vec::new();
        for i in 0..50 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                let host = format!("10.0.0.{}", i);
                registry.record_check(
                    &key(&host, 1080),
                    CheckRecord::ok(Utc::now(), host.clone(), 5),
                );
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(registry
            .snapshot()
            .iter()
            .all(|r| r.status == ProxyStatus::Ok));
    }
}
