//! Concurrent aggregation of independent fight collections.
//!
//! Each job runs [`compute_stats`] on the blocking pool. Results stream back
//! through an mpsc channel in completion order, tagged with the job's index.

use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, warn};

use crate::calculate::compute_stats;
use crate::models::{AggregateOptions, AggregateResult, FightRecord};

/// One independent aggregation call.
#[derive(Debug, Clone, Default)]
pub struct BatchJob {
    pub records: Vec<FightRecord>,
    pub options: AggregateOptions,
}

/// Default number of jobs allowed on the blocking pool at once.
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Start every job and return the receiving end of the result stream.
///
/// Must be called from inside a Tokio runtime. The channel closes once every
/// job has finished; a job that panics is logged and sends nothing.
pub fn spawn_batch(jobs: Vec<BatchJob>, concurrency: usize) -> mpsc::Receiver<(usize, AggregateResult)> {
    let (tx, rx) = mpsc::channel(jobs.len().max(1));
    let permits = Arc::new(Semaphore::new(concurrency.max(1)));

    for (index, job) in jobs.into_iter().enumerate() {
        let tx = tx.clone();
        let permits = Arc::clone(&permits);
        tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            let handle = tokio::task::spawn_blocking(move || compute_stats(&job.records, &job.options));
            match handle.await {
                Ok(result) => {
                    debug!(index, fights = result.valid_fight_count, "Batch job finished");
                    if tx.send((index, result)).await.is_err() {
                        debug!(index, "Batch receiver dropped");
                    }
                }
                Err(e) => warn!(index, "Batch job failed: {}", e),
            }
        });
    }

    rx
}

/// Run every job and return the results in job order. Failed jobs are
/// missing from the output.
pub async fn run_batch(jobs: Vec<BatchJob>, concurrency: usize) -> Vec<(usize, AggregateResult)> {
    let mut rx = spawn_batch(jobs, concurrency);
    let mut results = Vec::new();
    while let Some(item) = rx.recv().await {
        results.push(item);
    }
    results.sort_by_key(|(index, _)| *index);
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn job(players: &[&str]) -> BatchJob {
        let players: Vec<_> = players
            .iter()
            .map(|account| json!({ "account": account, "profession": "Firebrand" }))
            .collect();
        let record: FightRecord = serde_json::from_value(json!({
            "details": { "durationMS": 60000, "players": players }
        }))
        .unwrap();
        BatchJob {
            records: vec![record],
            options: AggregateOptions::default(),
        }
    }

    #[tokio::test]
    async fn test_results_come_back_in_job_order() {
        let jobs = vec![job(&["a.1"]), job(&["a.1", "b.1", "c.1"]), BatchJob::default()];
        let results = run_batch(jobs, 2).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].0, 0);
        assert_eq!(results[1].1.stats.attendance.len(), 3);
        assert_eq!(results[2].1.valid_fight_count, 0);
    }

    #[tokio::test]
    async fn test_stream_closes_after_last_job() {
        let mut rx = spawn_batch(vec![job(&["a.1"]), job(&["b.1"])], 1);
        let mut seen = Vec::new();
        while let Some((index, result)) = rx.recv().await {
            assert_eq!(result.valid_fight_count, 1);
            seen.push(index);
        }
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        assert!(run_batch(Vec::new(), 4).await.is_empty());
    }
}
