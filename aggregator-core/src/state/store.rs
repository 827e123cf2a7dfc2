use super::*;

/// State store for one partition: an in-memory index backed by a changelog.
///
/// Mutation ordering is the crash-safety contract: `put` and `delete` append
/// to the changelog first and touch the index second, so the index never
/// holds an entry the changelog does not. The expiry index mirrors live keys
/// sorted by window end, keeping [`scan_expired`](StateStore::scan_expired)
/// proportional to the number of open windows.
pub struct PartitionStateStore<C: Changelog> {
    changelog: C,
    index: HashMap<AggregateKey, AggregateState>,
    /// window end -> keys expiring at that point.
    expiry: BTreeMap<EventTime, BTreeSet<AggregateKey>>,
}

impl<C: Changelog> PartitionStateStore<C> {
    /// Create an empty store on top of a fresh changelog.
    pub fn new(changelog: C) -> Self {
        Self {
            changelog,
            index: HashMap::new(),
            expiry: BTreeMap::new(),
        }
    }

    /// Rebuild a store by replaying `changelog` from the start.
    ///
    /// Replay compacts by key before the index is populated, so a key that
    /// was tombstoned does not reappear.
    pub fn recover(mut changelog: C) -> Result<Self> {
        let compacted = compact(changelog.replay()?);
        let mut store = Self::new(changelog);
        for (key, state) in compacted {
            store.index_insert(key, state);
        }
        Ok(store)
    }

    fn index_insert(&mut self, key: AggregateKey, state: AggregateState) {
        self.expiry
            .entry(key.window.end)
            .or_default()
            .insert(key.clone());
        self.index.insert(key, state);
    }

    fn index_remove(&mut self, key: &AggregateKey) {
        if let Some(keys) = self.expiry.get_mut(&key.window.end) {
            keys.remove(key);
            if keys.is_empty() {
                self.expiry.remove(&key.window.end);
            }
        }
        self.index.remove(key);
    }
}

impl<C: Changelog> StateStore for PartitionStateStore<C> {
    fn get(&self, key: &AggregateKey) -> Result<Option<AggregateState>> {
        Ok(self.index.get(key).cloned())
    }

    fn put(&mut self, key: AggregateKey, state: AggregateState) -> Result<()> {
        self.changelog
            .append(&ChangelogEntry::upsert(key.clone(), state.clone()))?;
        self.index_insert(key, state);
        Ok(())
    }

    fn delete(&mut self, key: &AggregateKey) -> Result<()> {
        self.changelog.append(&ChangelogEntry::tombstone(key.clone()))?;
        self.index_remove(key);
        Ok(())
    }

    fn scan_expired(&self, now: EventTime) -> Vec<AggregateKey> {
        self.expiry
            .range(..=now)
            .flat_map(|(_, keys)| keys.iter().cloned())
            .collect()
    }

    fn len(&self) -> usize {
        self.index.len()
    }
}
