use super::*;

use anyhow::{bail, Context, Result};

struct PartitionEntry {
    epoch: Epoch,
    phase: PartitionPhase,
    cancel: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

/// Owns the assignment of input partitions to worker threads.
///
/// Assignments and revocations are driven from outside (the group-membership
/// protocol is an external collaborator); the coordinator turns them into
/// worker lifecycles and tracks each partition's phase from the events the
/// workers send back. Call [`drain_events`](Self::drain_events) regularly to
/// apply those transitions.
pub struct PartitionCoordinator {
    factory: WorkerFactory,
    poll_batch_size: usize,
    partitions: HashMap<PartitionId, PartitionEntry>,
    /// Partition id -> message of the last partition-fatal error.
    failures: HashMap<PartitionId, String>,
    events_tx: Sender<PartitionEvent>,
    events_rx: Receiver<PartitionEvent>,
}

impl PartitionCoordinator {
    pub fn new(factory: WorkerFactory, poll_batch_size: usize) -> Self {
        let (events_tx, events_rx) = unbounded();
        Self {
            factory,
            poll_batch_size,
            partitions: HashMap::new(),
            failures: HashMap::new(),
            events_tx,
            events_rx,
        }
    }

    /// Take ownership of `partition` at `epoch` and start its Restoring
    /// cycle. Fails when the partition is already owned.
    pub fn assign(&mut self, partition: PartitionId, epoch: Epoch) -> Result<()> {
        if let Some(entry) = self.partitions.get(&partition) {
            bail!(
                "partition {partition} already owned at epoch {} (phase {:?})",
                entry.epoch,
                entry.phase
            );
        }
        tracing::info!(partition, epoch, "assigned, starting restore");
        self.failures.remove(&partition);
        let cancel = Arc::new(AtomicBool::new(false));
        let handle = spawn_worker(
            partition,
            epoch,
            Arc::clone(&self.factory),
            Arc::clone(&cancel),
            self.events_tx.clone(),
            self.poll_batch_size,
        )
        .with_context(|| format!("spawn worker thread for partition {partition}"))?;
        self.partitions.insert(
            partition,
            PartitionEntry {
                epoch,
                phase: PartitionPhase::Restoring,
                cancel,
                handle: Some(handle),
            },
        );
        Ok(())
    }

    /// Signal revocation to `partition`. The worker stops intake, drains
    /// in-flight punctuator work, and releases its resources; the partition
    /// reaches Unassigned once its [`PartitionEvent::Revoked`] is drained.
    pub fn revoke(&mut self, partition: PartitionId) {
        if let Some(entry) = self.partitions.get_mut(&partition) {
            tracing::info!(partition, epoch = entry.epoch, "revoking");
            entry.phase = PartitionPhase::Revoked;
            entry.cancel.store(true, Ordering::Relaxed);
        }
    }

    /// Apply all pending worker events and return them.
    ///
    /// Restored moves a partition to Active; Revoked and Failed release it
    /// back to Unassigned (Failed also records the error). Events from a
    /// stale epoch are ignored.
    pub fn drain_events(&mut self) -> Vec<PartitionEvent> {
        let mut drained = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            self.apply(&event);
            drained.push(event);
        }
        drained
    }

    fn apply(&mut self, event: &PartitionEvent) {
        match event {
            PartitionEvent::Restored { partition, epoch } => {
                if let Some(entry) = self.partitions.get_mut(partition) {
                    if entry.epoch == *epoch && entry.phase == PartitionPhase::Restoring {
                        entry.phase = PartitionPhase::Active;
                    }
                }
            }
            PartitionEvent::Revoked { partition, epoch } => {
                self.release(*partition, *epoch);
            }
            PartitionEvent::Failed {
                partition,
                epoch,
                error,
            } => {
                if self
                    .partitions
                    .get(partition)
                    .is_some_and(|entry| entry.epoch == *epoch)
                {
                    self.failures.insert(*partition, error.to_string());
                    self.release(*partition, *epoch);
                }
            }
        }
    }

    fn release(&mut self, partition: PartitionId, epoch: Epoch) {
        let owned = self
            .partitions
            .get(&partition)
            .is_some_and(|entry| entry.epoch == epoch);
        if !owned {
            return;
        }
        if let Some(mut entry) = self.partitions.remove(&partition) {
            if let Some(handle) = entry.handle.take() {
                // The worker sent its terminal event, so the join is
                // immediate.
                let _ = handle.join();
            }
        }
    }

    /// Current phase of `partition`. Unknown partitions are Unassigned.
    pub fn phase(&self, partition: PartitionId) -> PartitionPhase {
        self.partitions
            .get(&partition)
            .map_or(PartitionPhase::Unassigned, |entry| entry.phase)
    }

    /// Owned partitions with their ownership epochs.
    pub fn assignments(&self) -> HashMap<PartitionId, Epoch> {
        self.partitions
            .iter()
            .map(|(partition, entry)| (*partition, entry.epoch))
            .collect()
    }

    /// Error messages for partitions that failed, keyed by partition.
    pub fn failures(&self) -> &HashMap<PartitionId, String> {
        &self.failures
    }

    /// Block until `partition` reaches `phase` or the timeout elapses.
    /// Returns true when the phase was reached.
    pub fn wait_for_phase(
        &mut self,
        partition: PartitionId,
        phase: PartitionPhase,
        timeout: Duration,
    ) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            self.drain_events();
            if self.phase(partition) == phase {
                return true;
            }
            let Some(remaining) = deadline.checked_duration_since(std::time::Instant::now())
            else {
                return false;
            };
            match self
                .events_rx
                .recv_timeout(remaining.min(Duration::from_millis(10)))
            {
                Ok(event) => self.apply(&event),
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
                Err(crossbeam_channel::RecvTimeoutError::Disconnected) => return false,
            }
            if std::time::Instant::now() >= deadline {
                self.drain_events();
                return self.phase(partition) == phase;
            }
        }
    }

    /// Revoke every owned partition and wait for the workers to release.
    pub fn shutdown(&mut self, timeout: Duration) {
        let owned: Vec<PartitionId> = self.partitions.keys().copied().collect();
        for partition in owned {
            self.revoke(partition);
        }
        let deadline = std::time::Instant::now() + timeout;
        while !self.partitions.is_empty() && std::time::Instant::now() < deadline {
            match self.events_rx.recv_timeout(Duration::from_millis(10)) {
                Ok(event) => self.apply(&event),
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
                Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
            }
        }
    }
}
