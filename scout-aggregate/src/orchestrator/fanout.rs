//! Bounded concurrent fan-out with per-task failure isolation.
//!
//! Every [`SourceTask`] runs on its own tokio task under its own timeout.
//! At most `max_workers` tasks are in flight; the rest queue. The call
//! returns only after every task has finished, failed, or timed out.
//! A timed-out task is aborted so nothing outlives the call.

use std::any::Any;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio::task::JoinError;

use crate::adapter::{AdapterRequest, SourceAdapter};
use crate::error::AdapterError;
use crate::types::{ErrorEntry, RawRecord, SourceBatch, SourceKind};

/// One adapter call scheduled by the orchestrator.
#[derive(Clone)]
pub struct SourceTask {
    pub source: SourceKind,
    pub adapter: Arc<dyn SourceAdapter>,
    pub request: AdapterRequest,
}

impl std::fmt::Debug for SourceTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceTask")
            .field("source", &self.source)
            .field("top_k", &self.request.top_k)
            .field("timeout", &self.request.timeout)
            .finish()
    }
}

/// Results of one fan-out, in completion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FanOut {
    /// One batch per successful task, including empty ones.
    pub batches: Vec<SourceBatch>,
    /// One entry per failed task.
    pub errors: Vec<ErrorEntry>,
}

impl FanOut {
    /// Total raw records across all batches.
    pub fn record_count(&self) -> usize {
        self.batches.iter().map(|b| b.records.len()).sum()
    }
}

/// Run every task with at most `max_workers` in flight and wait for all.
pub async fn fan_out(tasks: Vec<SourceTask>, max_workers: usize) -> FanOut {
    let outcomes: Vec<(SourceKind, Result<Vec<RawRecord>, AdapterError>)> = stream::iter(tasks)
        .map(|task| async move {
            let source = task.source;
            (source, run_task(task).await)
        })
        .buffer_unordered(max_workers.max(1))
        .collect()
        .await;

    let mut out = FanOut::default();
    for (source, outcome) in outcomes {
        match outcome {
            Ok(mut records) => {
                tracing::debug!(%source, count = records.len(), "source returned records");
                for record in &mut records {
                    record.source = source;
                }
                out.batches.push(SourceBatch { source, records });
            }
            Err(err) => {
                tracing::warn!(%source, error = %err, "source failed");
                out.errors.push(ErrorEntry {
                    source,
                    kind: err.kind(),
                    message: err.to_string(),
                });
            }
        }
    }
    out
}

async fn run_task(task: SourceTask) -> Result<Vec<RawRecord>, AdapterError> {
    let SourceTask {
        source,
        adapter,
        request,
    } = task;
    let budget = request.timeout;
    tracing::trace!(%source, query = %request.query, top_k = request.top_k, "invoking source");

    let mut handle = tokio::spawn(async move { adapter.invoke(&request).await });
    match tokio::time::timeout(budget, &mut handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(AdapterError::Panicked(join_error_message(join_err))),
        Err(_) => {
            handle.abort();
            Err(AdapterError::Timeout(format!(
                "no response within {}ms",
                budget.as_millis()
            )))
        }
    }
}

fn join_error_message(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload: Box<dyn Any + Send> = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::{ConcurrencyProbe, FakeAdapter};
    use std::time::Duration;

    fn task(adapter: FakeAdapter, timeout: Duration) -> SourceTask {
        SourceTask {
            source: adapter.kind(),
            adapter: Arc::new(adapter),
            request: AdapterRequest::new("q", 5, timeout),
        }
    }

    #[tokio::test]
    async fn successful_records_are_stamped_with_source() {
        let adapter = FakeAdapter::records(SourceKind::Quotes, 2);
        let out = fan_out(vec![task(adapter, Duration::from_secs(1))], 4).await;
        assert!(out.errors.is_empty());
        assert_eq!(out.batches.len(), 1);
        assert!(out.batches[0]
            .records
            .iter()
            .all(|r| r.source == SourceKind::Quotes));
    }

    #[tokio::test]
    async fn failure_becomes_error_entry() {
        let failing = FakeAdapter::failing(
            SourceKind::WebSearch,
            AdapterError::CredentialMissing("TAVILY_API_KEY".into()),
        );
        let ok = FakeAdapter::records(SourceKind::Procurement, 3);
        let out = fan_out(
            vec![
                task(failing, Duration::from_secs(1)),
                task(ok, Duration::from_secs(1)),
            ],
            4,
        )
        .await;
        assert_eq!(out.record_count(), 3);
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.errors[0].source, SourceKind::WebSearch);
        assert_eq!(out.errors[0].kind, ErrorKind::AdapterCredentialMissing);
    }

    #[tokio::test]
    async fn panic_is_isolated() {
        let panicking = FakeAdapter::panicking(SourceKind::Profile, "boom");
        let ok = FakeAdapter::records(SourceKind::WebSearch, 1);
        let out = fan_out(
            vec![
                task(panicking, Duration::from_secs(1)),
                task(ok, Duration::from_secs(1)),
            ],
            2,
        )
        .await;
        assert_eq!(out.record_count(), 1);
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.errors[0].kind, ErrorKind::AdapterTransportError);
        assert!(out.errors[0].message.contains("boom"));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_becomes_error_entry() {
        let slow = FakeAdapter::records(SourceKind::WebSearch, 1).with_delay(Duration::from_secs(60));
        let out = fan_out(vec![task(slow, Duration::from_secs(2))], 4).await;
        assert!(out.batches.is_empty());
        assert_eq!(out.errors[0].kind, ErrorKind::AdapterTimeout);
        assert!(out.errors[0].message.contains("2000ms"));
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_calls_never_exceed_worker_cap() {
        let probe = ConcurrencyProbe::new();
        let tasks: Vec<_> = SourceKind::all()
            .iter()
            .map(|kind| {
                let adapter = FakeAdapter::records(*kind, 1)
                    .with_delay(Duration::from_millis(100))
                    .with_probe(probe.clone());
                task(adapter, Duration::from_secs(5))
            })
            .collect();
        let out = fan_out(tasks, 2).await;
        assert_eq!(out.batches.len(), SourceKind::all().len());
        assert_eq!(probe.calls(), SourceKind::all().len());
        assert!(probe.max_in_flight() <= 2);
        assert_eq!(probe.in_flight(), 0);
    }

    #[tokio::test]
    async fn empty_task_list_is_empty_result() {
        let out = fan_out(Vec::new(), 4).await;
        assert_eq!(out, FanOut::default());
    }
}
