use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::domain::error::DomainError;
use crate::domain::user::User;

/// Request-scoped memoizing batch fetcher.
///
/// Each key is fetched at most once for the lifetime of the cache; keys the
/// backing store does not know are remembered as misses too. One
/// `load_many` call issues at most one fetch, covering all uncached keys.
pub(crate) struct BatchCache<K, V> {
    entries: Mutex<HashMap<K, Option<V>>>,
}

impl<K, V> BatchCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) async fn load_many<F, Fut>(
        &self,
        keys: &[K],
        fetch: F,
    ) -> Result<HashMap<K, V>, DomainError>
    where
        F: FnOnce(Vec<K>) -> Fut,
        Fut: Future<Output = Result<Vec<(K, V)>, DomainError>>,
    {
        let missing: Vec<K> = {
            let entries = self.lock();
            let mut seen = HashSet::new();
            keys.iter()
                .filter(|key| !entries.contains_key(*key) && seen.insert((*key).clone()))
                .cloned()
                .collect()
        };

        if !missing.is_empty() {
            let fetched: HashMap<K, V> = fetch(missing.clone()).await?.into_iter().collect();
            let mut entries = self.lock();
            for key in missing {
                let value = fetched.get(&key).cloned();
                entries.insert(key, value);
            }
        }

        let entries = self.lock();
        Ok(keys
            .iter()
            .filter_map(|key| {
                entries
                    .get(key)
                    .cloned()
                    .flatten()
                    .map(|value| (key.clone(), value))
            })
            .collect())
    }

    /// Records a value that is already known, e.g. right after a write.
    pub(crate) fn prime(&self, key: K, value: V) {
        self.lock().insert(key, Some(value));
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, Option<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Per-request state: who is acting, plus the request's loaders.
/// Built by the HTTP layer for every request and dropped with it.
pub(crate) struct RequestContext {
    acting_user_id: Option<i64>,
    pub(crate) users: BatchCache<i64, User>,
    /// Keyed by `(user_id, post_id)`, value is the stored vote magnitude.
    pub(crate) vote_types: BatchCache<(i64, i64), i16>,
}

impl RequestContext {
    fn new(acting_user_id: Option<i64>) -> Self {
        Self {
            acting_user_id,
            users: BatchCache::new(),
            vote_types: BatchCache::new(),
        }
    }

    pub(crate) fn anonymous() -> Self {
        Self::new(None)
    }

    pub(crate) fn for_user(user_id: i64) -> Self {
        Self::new(Some(user_id))
    }

    pub(crate) fn acting_user_id(&self) -> Option<i64> {
        self.acting_user_id
    }

    pub(crate) fn require_user(&self) -> Result<i64, DomainError> {
        self.acting_user_id.ok_or(DomainError::Unauthenticated)
    }
}
