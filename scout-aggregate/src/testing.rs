//! In-process test doubles for the adapter seam.
//!
//! [`FakeAdapter`] returns canned records, fails, panics or stalls on
//! demand; [`ConcurrencyProbe`] observes how many fakes run at once.
//! Used by this crate's tests and by downstream integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::adapter::{AdapterRequest, SourceAdapter};
use crate::error::AdapterError;
use crate::types::{RawRecord, SourceKind};

#[derive(Debug, Clone)]
enum Behaviour {
    Records(Vec<RawRecord>),
    Fail(AdapterError),
    Panic(String),
}

/// A scripted [`SourceAdapter`].
#[derive(Debug, Clone)]
pub struct FakeAdapter {
    kind: SourceKind,
    behaviour: Behaviour,
    delay: Option<Duration>,
    probe: Option<ConcurrencyProbe>,
    requests: Arc<Mutex<Vec<AdapterRequest>>>,
}

impl FakeAdapter {
    fn with_behaviour(kind: SourceKind, behaviour: Behaviour) -> Self {
        Self {
            kind,
            behaviour,
            delay: None,
            probe: None,
            requests: Arc::default(),
        }
    }

    /// Returns exactly these records.
    pub fn new(kind: SourceKind, records: Vec<RawRecord>) -> Self {
        Self::with_behaviour(kind, Behaviour::Records(records))
    }

    /// Returns `count` distinct records titled `"{source} record {i}"`.
    pub fn records(kind: SourceKind, count: usize) -> Self {
        let records = (0..count)
            .map(|i| {
                RawRecord::from_pairs(
                    kind,
                    [
                        ("title", format!("{kind} record {i}").as_str()),
                        ("url", format!("https://{kind}.test/{i}").as_str()),
                    ],
                )
            })
            .collect();
        Self::new(kind, records)
    }

    pub fn failing(kind: SourceKind, error: AdapterError) -> Self {
        Self::with_behaviour(kind, Behaviour::Fail(error))
    }

    pub fn panicking(kind: SourceKind, message: &str) -> Self {
        Self::with_behaviour(kind, Behaviour::Panic(message.to_owned()))
    }

    /// Never answers within any realistic budget.
    pub fn hanging(kind: SourceKind) -> Self {
        Self::records(kind, 0).with_delay(Duration::from_secs(24 * 3600))
    }

    /// Sleep (on the tokio clock) before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_probe(mut self, probe: ConcurrencyProbe) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Requests this adapter (and its clones) received, in call order.
    pub fn requests(&self) -> Vec<AdapterRequest> {
        self.requests
            .lock()
            .map(|seen| seen.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SourceAdapter for FakeAdapter {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn invoke(&self, request: &AdapterRequest) -> Result<Vec<RawRecord>, AdapterError> {
        if let Ok(mut seen) = self.requests.lock() {
            seen.push(request.clone());
        }
        let _guard = self.probe.as_ref().map(ConcurrencyProbe::enter);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.behaviour {
            Behaviour::Records(records) => Ok(records.clone()),
            Behaviour::Fail(err) => Err(err.clone()),
            Behaviour::Panic(message) => panic!("{message}"),
        }
    }
}

#[derive(Debug, Default)]
struct ProbeState {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

/// Counts concurrent and total adapter invocations across clones.
#[derive(Debug, Clone, Default)]
pub struct ConcurrencyProbe {
    state: Arc<ProbeState>,
}

impl ConcurrencyProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark one invocation as in flight until the guard drops.
    pub fn enter(&self) -> ProbeGuard {
        let state = &self.state;
        state.calls.fetch_add(1, Ordering::SeqCst);
        let now = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        state.max_in_flight.fetch_max(now, Ordering::SeqCst);
        ProbeGuard {
            state: Arc::clone(&self.state),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.state.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.state.calls.load(Ordering::SeqCst)
    }
}

/// Decrements the probe's in-flight gauge on drop, including on abort.
#[derive(Debug)]
pub struct ProbeGuard {
    state: Arc<ProbeState>,
}

impl Drop for ProbeGuard {
    fn drop(&mut self) {
        self.state.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
