use std::future::Future;
use std::sync::Arc;

use quest_core::model::{ActivityId, PlayRecordId};
use storage::repository::{PlayCountRepository, PlayRecordRepository, PlayRecordUpdate};
use tokio::runtime::Handle;
use tokio::sync::oneshot;

/// Play record of the running session, as far as the session knows it.
#[derive(Debug, Default)]
pub(crate) enum RecordSlot {
    #[default]
    Unknown,
    /// `record_play_start` was sent and has not answered yet.
    Pending(oneshot::Receiver<PlayRecordId>),
    Known(PlayRecordId),
}

impl RecordSlot {
    /// Picks up an id that arrived since the last call.
    pub(crate) fn poll(&mut self) -> Option<PlayRecordId> {
        match self {
            RecordSlot::Unknown => None,
            RecordSlot::Known(id) => Some(*id),
            RecordSlot::Pending(rx) => match rx.try_recv() {
                Ok(id) => {
                    *self = RecordSlot::Known(id);
                    Some(id)
                }
                Err(oneshot::error::TryRecvError::Empty) => None,
                Err(oneshot::error::TryRecvError::Closed) => {
                    *self = RecordSlot::Unknown;
                    None
                }
            },
        }
    }
}

/// Fire-and-forget reporting of play counts and play records.
///
/// Nothing here is awaited by the session: every call is spawned on the
/// current tokio runtime and failures only show up in the logs.
#[derive(Clone)]
pub struct PlayTelemetry {
    records: Arc<dyn PlayRecordRepository>,
    counts: Arc<dyn PlayCountRepository>,
}

impl PlayTelemetry {
    #[must_use]
    pub fn new(
        records: Arc<dyn PlayRecordRepository>,
        counts: Arc<dyn PlayCountRepository>,
    ) -> Self {
        Self { records, counts }
    }

    /// Bumps the play counter and opens a play record for a new run.
    pub(crate) fn play_started(&self, activity_id: ActivityId) -> RecordSlot {
        let counts = Arc::clone(&self.counts);
        spawn_detached(async move {
            if let Err(err) = counts.increment_play_count(activity_id).await {
                tracing::warn!(activity = %activity_id, error = %err, "failed to count play");
            }
        });

        let (tx, rx) = oneshot::channel();
        let records = Arc::clone(&self.records);
        let spawned = spawn_detached(async move {
            match records.record_play_start(activity_id).await {
                Ok(id) => {
                    let _ = tx.send(id);
                }
                Err(err) => {
                    tracing::warn!(activity = %activity_id, error = %err, "failed to open play record");
                }
            }
        });

        if spawned {
            RecordSlot::Pending(rx)
        } else {
            RecordSlot::Unknown
        }
    }

    /// Closes the play record with final numbers, waiting for its id first
    /// when the start call is still in flight.
    pub(crate) fn play_finished(&self, record: RecordSlot, update: PlayRecordUpdate) {
        let records = Arc::clone(&self.records);
        spawn_detached(async move {
            let id = match record {
                RecordSlot::Unknown => return,
                RecordSlot::Known(id) => id,
                RecordSlot::Pending(rx) => match rx.await {
                    Ok(id) => id,
                    Err(_) => return,
                },
            };
            if let Err(err) = records.update_play_record(id, &update).await {
                tracing::warn!(record = %id, error = %err, "failed to close play record");
            }
        });
    }
}

fn spawn_detached(task: impl Future<Output = ()> + Send + 'static) -> bool {
    match Handle::try_current() {
        Ok(handle) => {
            handle.spawn(task);
            true
        }
        Err(_) => {
            tracing::warn!("no async runtime; play telemetry skipped");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::InMemoryRepository;
    use storage::repository::PlayRecord;
    use std::time::Duration;

    async fn wait_for_record(repo: &InMemoryRepository, id: PlayRecordId) -> PlayRecord {
        for _ in 0..100 {
            if let Ok(record) = repo.get_play_record(id).await {
                if record.completed {
                    return record;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("play record {id} was never closed");
    }

    #[tokio::test]
    async fn start_resolves_an_id_and_counts_the_play() {
        let repo = InMemoryRepository::new();
        let telemetry = PlayTelemetry::new(Arc::new(repo.clone()), Arc::new(repo.clone()));

        let mut slot = telemetry.play_started(ActivityId::new(1));
        let mut id = None;
        for _ in 0..100 {
            id = slot.poll();
            if id.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(id.is_some());
        assert_eq!(repo.play_count(ActivityId::new(1)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn finishing_before_the_id_arrives_still_closes_the_record() {
        let repo = InMemoryRepository::new();
        let telemetry = PlayTelemetry::new(Arc::new(repo.clone()), Arc::new(repo.clone()));

        let (tx, rx) = oneshot::channel();
        telemetry.play_finished(
            RecordSlot::Pending(rx),
            PlayRecordUpdate {
                score: 300,
                completed: true,
                duration_secs: 12,
            },
        );

        let id = repo.record_play_start(ActivityId::new(2)).await.unwrap();
        tx.send(id).unwrap();

        let record = wait_for_record(&repo, id).await;
        assert_eq!(record.score, Some(300));
        assert_eq!(record.duration_secs, Some(12));
    }

    #[test]
    fn without_a_runtime_nothing_is_spawned() {
        let repo = InMemoryRepository::new();
        let telemetry = PlayTelemetry::new(Arc::new(repo.clone()), Arc::new(repo));
        assert!(matches!(
            telemetry.play_started(ActivityId::new(1)),
            RecordSlot::Unknown
        ));
    }
}
