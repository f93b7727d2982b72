//! Access-ordered, cell-budgeted registry of query tasks.
//!
//! Keys are (normalized query text, timeout); a registered task is joined by
//! every later caller of the same key while it is alive. Completed entries
//! contribute their cell cost to a running total; when the total exceeds the
//! budget, entries are evicted in oldest-access order until it fits again.
//! Entries whose cost has not been recorded yet (still running, or whose
//! creator never completed its wait) are exempt from the budget pass.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::query::task::QueryTask;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct CacheKey {
    pub query: Arc<str>,
    pub timeout: Duration,
}

#[derive(Debug)]
struct CacheSlot {
    task: Arc<QueryTask>,
    last_access: u64,
    cells: Option<usize>,
}

#[derive(Debug)]
pub(crate) struct QueryCache {
    entries: HashMap<CacheKey, CacheSlot>,
    clock: u64,
    budget: usize,
    total_cells: usize,
}

impl QueryCache {
    pub(crate) fn new(budget: usize) -> Self {
        Self {
            entries: HashMap::new(),
            clock: 0,
            budget,
            total_cells: 0,
        }
    }

    /// Look up a joinable task, refreshing its access stamp.
    ///
    /// Cancelled tasks are not joinable; they are dropped on sight so the
    /// caller registers a fresh computation instead.
    pub(crate) fn lookup(&mut self, key: &CacheKey) -> Option<Arc<QueryTask>> {
        let stamp = self.tick();
        match self.entries.get_mut(key) {
            Some(slot) if !slot.task.is_cancelled() => {
                slot.last_access = stamp;
                Some(Arc::clone(&slot.task))
            }
            Some(_) => {
                self.evict(key);
                None
            }
            None => None,
        }
    }

    /// Register a task before it completes, so concurrent callers can join it.
    pub(crate) fn insert(&mut self, key: CacheKey, task: Arc<QueryTask>) {
        let stamp = self.tick();
        self.entries.insert(
            key,
            CacheSlot {
                task,
                last_access: stamp,
                cells: None,
            },
        );
    }

    /// Record the cell cost of a completed entry and enforce the budget.
    pub(crate) fn record_cost(&mut self, key: &CacheKey, cells: usize) {
        if let Some(slot) = self.entries.get_mut(key) {
            if slot.cells.replace(cells).is_none() {
                self.total_cells += cells;
            }
        }
        self.enforce_budget();
    }

    /// Discard every entry (whole-cache invalidation on commit).
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.total_cells = 0;
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub(crate) fn total_cells(&self) -> usize {
        self.total_cells
    }

    #[cfg(test)]
    pub(crate) fn any_task(&self) -> Option<Arc<QueryTask>> {
        self.entries.values().next().map(|slot| Arc::clone(&slot.task))
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn evict(&mut self, key: &CacheKey) {
        if let Some(slot) = self.entries.remove(key) {
            self.total_cells -= slot.cells.unwrap_or(0);
        }
    }

    fn enforce_budget(&mut self) {
        while self.total_cells > self.budget {
            let oldest = self
                .entries
                .iter()
                .filter(|(_, slot)| slot.cells.is_some())
                .min_by_key(|(_, slot)| slot.last_access)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => self.evict(&key),
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryKind;

    fn key(query: &str) -> CacheKey {
        CacheKey {
            query: Arc::from(query),
            timeout: Duration::from_millis(100),
        }
    }

    fn task(query: &str) -> Arc<QueryTask> {
        Arc::new(QueryTask::new(Arc::from(query), QueryKind::Select, true))
    }

    fn fill(cache: &mut QueryCache, query: &str, cells: usize) {
        cache.insert(key(query), task(query));
        cache.record_cost(&key(query), cells);
    }

    #[test]
    fn least_recently_accessed_entry_is_evicted_first() {
        // Budget fits three 5-cell results; a fourth forces one eviction.
        let mut cache = QueryCache::new(15);
        fill(&mut cache, "q1", 5);
        fill(&mut cache, "q2", 5);
        fill(&mut cache, "q3", 5);

        // Access order is now q1, q2, q3, q1 — q2 is the oldest access.
        assert!(cache.lookup(&key("q1")).is_some());

        fill(&mut cache, "q4", 5);
        assert!(cache.lookup(&key("q2")).is_none());
        assert!(cache.lookup(&key("q1")).is_some());
        assert!(cache.lookup(&key("q3")).is_some());
        assert!(cache.lookup(&key("q4")).is_some());
        assert_eq!(cache.total_cells(), 15);
    }

    #[test]
    fn entries_without_recorded_cost_are_exempt() {
        let mut cache = QueryCache::new(4);
        cache.insert(key("pending"), task("pending"));
        fill(&mut cache, "done", 5);

        // "done" exceeds the budget on its own; "pending" has unknown cost
        // and must survive the eviction pass.
        assert!(cache.lookup(&key("done")).is_none());
        assert!(cache.lookup(&key("pending")).is_some());
        assert_eq!(cache.total_cells(), 0);
    }

    #[test]
    fn same_text_with_different_timeouts_are_distinct_entries() {
        let mut cache = QueryCache::new(100);
        let short = CacheKey {
            query: Arc::from("q"),
            timeout: Duration::from_millis(10),
        };
        let long = CacheKey {
            query: Arc::from("q"),
            timeout: Duration::from_millis(20),
        };
        cache.insert(short.clone(), task("q"));
        cache.insert(long.clone(), task("q"));
        assert_eq!(cache.len(), 2);
        assert!(cache.lookup(&short).is_some());
        assert!(cache.lookup(&long).is_some());
    }

    #[test]
    fn clear_resets_cost_accounting() {
        let mut cache = QueryCache::new(100);
        fill(&mut cache, "q1", 30);
        cache.clear();
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.total_cells(), 0);
    }
}
