use super::*;

/// Sleep between empty polls so an idle partition still fires its
/// wall-clock punctuator without spinning.
const IDLE_POLL_BACKOFF: Duration = Duration::from_millis(2);

/// Spawn the worker thread for one partition assignment.
///
/// The worker performs the Restoring step (the factory replays the
/// changelog), reports readiness, then runs a strict-order event loop:
/// poll, process record by record, commit after each durable mutation,
/// punctuate. The cancel flag is the revocation signal; once observed, the
/// worker stops intake, drains punctuator work, and releases everything by
/// returning.
pub(crate) fn spawn_worker(
    partition: PartitionId,
    epoch: Epoch,
    factory: WorkerFactory,
    cancel: Arc<AtomicBool>,
    events: Sender<PartitionEvent>,
    poll_batch_size: usize,
) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name(format!("partition-{partition}"))
        .spawn(move || {
            run(
                partition,
                epoch,
                factory,
                cancel,
                events,
                poll_batch_size,
            )
        })
}

fn run(
    partition: PartitionId,
    epoch: Epoch,
    factory: WorkerFactory,
    cancel: Arc<AtomicBool>,
    events: Sender<PartitionEvent>,
    poll_batch_size: usize,
) {
    // Restoring: build source and processor; the factory replays the
    // changelog into a fresh store.
    let (mut source, mut processor) = match factory(partition) {
        Ok(parts) => parts,
        Err(error) => {
            tracing::error!(partition, epoch, "restore failed: {error}");
            let _ = events.send(PartitionEvent::Failed {
                partition,
                epoch,
                error,
            });
            return;
        }
    };

    tracing::info!(partition, epoch, "restore complete, partition active");
    let _ = events.send(PartitionEvent::Restored { partition, epoch });

    loop {
        if cancel.load(Ordering::Relaxed) {
            revoke_drain(partition, epoch, processor.as_mut(), &events);
            return;
        }

        let records = match source.poll(poll_batch_size) {
            Ok(records) => records,
            Err(error) => {
                fail(partition, epoch, error, &events);
                return;
            }
        };

        if records.is_empty() {
            if let Err(error) = processor.maybe_flush() {
                fail(partition, epoch, error, &events);
                return;
            }
            std::thread::sleep(IDLE_POLL_BACKOFF);
            continue;
        }

        for record in records {
            if cancel.load(Ordering::Relaxed) {
                // Uncommitted records in this batch are redelivered to the
                // next owner; abandoning them here is consistent.
                revoke_drain(partition, epoch, processor.as_mut(), &events);
                return;
            }
            let offset = record.offset;
            if let Err(error) = processor.process(record) {
                fail(partition, epoch, error, &events);
                return;
            }
            // Commit progress only after the local mutation is durable.
            if let Err(error) = source.commit(offset) {
                fail(partition, epoch, error, &events);
                return;
            }
        }

        if let Err(error) = processor.maybe_flush() {
            fail(partition, epoch, error, &events);
            return;
        }
    }
}

/// Revocation drain: flush what the punctuator already owes, then release.
fn revoke_drain(
    partition: PartitionId,
    epoch: Epoch,
    processor: &mut dyn PartitionProcessor,
    events: &Sender<PartitionEvent>,
) {
    match processor.flush() {
        Ok(emitted) => {
            tracing::info!(partition, epoch, emitted, "revocation drain complete");
        }
        Err(error) => {
            // The partition is leaving either way; the next owner replays
            // unemitted state and re-emits it.
            tracing::warn!(partition, epoch, "revocation drain failed: {error}");
        }
    }
    let _ = events.send(PartitionEvent::Revoked { partition, epoch });
}

fn fail(
    partition: PartitionId,
    epoch: Epoch,
    error: AggregateError,
    events: &Sender<PartitionEvent>,
) {
    tracing::error!(partition, epoch, "partition failed: {error}");
    let _ = events.send(PartitionEvent::Failed {
        partition,
        epoch,
        error,
    });
}
