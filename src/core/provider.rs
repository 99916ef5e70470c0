//! Thematic layer contract and the provider registry.
//!
//! A provider answers `has_data(year)` from an in-memory availability map and
//! performs `load(year)` as a fire-and-forget job on a [`LoadExecutor`].
//!
//! # Cancellation
//!
//! Every load gets a [`LoadTicket`] issued by the provider's [`LoadSequence`].
//! Issuing a new ticket makes all older tickets stale, so the most recently
//! requested year always wins regardless of completion order. Jobs check
//! `is_current()` before every mutation of provider state.

use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::core::error::{TimelineError, TimelineResult};
use crate::core::year::Year;

/// Stable identifier of a provider (e.g. `density`, `Percent-Black`).
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(String);

impl ProviderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// ============================================================================
// Tickets and handles
// ============================================================================

/// Per-provider generation counter.
#[derive(Clone, Debug, Default)]
pub struct LoadSequence {
    latest: Arc<AtomicU64>,
}

impl LoadSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a ticket for a new request. All previously issued tickets go stale.
    pub fn issue(&self) -> LoadTicket {
        let generation = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        LoadTicket {
            generation,
            latest: Arc::clone(&self.latest),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn latest(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }
}

/// Cancellation token for one load request.
#[derive(Clone, Debug)]
pub struct LoadTicket {
    generation: u64,
    latest: Arc<AtomicU64>,
    cancelled: Arc<AtomicBool>,
}

impl LoadTicket {
    /// True while neither cancelled nor superseded by a newer request.
    pub fn is_current(&self) -> bool {
        !self.cancelled.load(Ordering::SeqCst) && self.latest.load(Ordering::SeqCst) == self.generation
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Handle returned by [`DataProvider::load`].
#[derive(Clone, Debug)]
pub struct LoadHandle {
    provider: ProviderId,
    year: Year,
    ticket: LoadTicket,
    finished: Arc<AtomicBool>,
}

impl LoadHandle {
    pub fn new(provider: ProviderId, year: Year, ticket: LoadTicket) -> Self {
        Self {
            provider,
            year,
            ticket,
            finished: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle for a request that needed no work (already applied, no data).
    pub fn completed(provider: ProviderId, year: Year, ticket: LoadTicket) -> Self {
        let handle = Self::new(provider, year, ticket);
        handle.mark_finished();
        handle
    }

    pub fn provider(&self) -> &ProviderId {
        &self.provider
    }

    pub fn year(&self) -> Year {
        self.year
    }

    pub fn ticket(&self) -> &LoadTicket {
        &self.ticket
    }

    /// Abort: the job will discard its result instead of applying it.
    pub fn cancel(&self) {
        self.ticket.cancel();
    }

    pub fn is_current(&self) -> bool {
        self.ticket.is_current()
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    /// In flight and still the most recent request.
    pub fn is_pending(&self) -> bool {
        !self.is_finished() && self.is_current()
    }

    pub fn mark_finished(&self) {
        self.finished.store(true, Ordering::SeqCst);
    }
}

// ============================================================================
// Provider contract
// ============================================================================

/// A self-contained thematic layer.
pub trait DataProvider: Send + Sync {
    fn id(&self) -> &ProviderId;

    /// Pure, cheap availability check backed by an in-memory map.
    fn has_data(&self, year: Year) -> bool;

    /// Start loading `year`. Never blocks. Idempotent for the year in flight,
    /// and supersedes any in-flight load for a different year.
    fn load(&self, year: Year) -> LoadHandle;

    /// Year whose data is currently rendered, if any.
    fn rendered_year(&self) -> Option<Year> {
        None
    }

    /// True when the rendering artefacts for `year` vanished and nothing is
    /// in flight to restore them. Used by the watchdog.
    fn needs_repair(&self, _year: Year) -> bool {
        false
    }
}

// ============================================================================
// Executors
// ============================================================================

pub type LoadJob = Box<dyn FnOnce() + Send + 'static>;

/// Where provider load jobs run.
pub trait LoadExecutor: Send + Sync {
    fn spawn(&self, job: LoadJob);
}

impl<T: LoadExecutor + ?Sized> LoadExecutor for Arc<T> {
    fn spawn(&self, job: LoadJob) {
        (**self).spawn(job)
    }
}

/// Runs jobs synchronously on the calling thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct InlineExecutor;

impl LoadExecutor for InlineExecutor {
    fn spawn(&self, job: LoadJob) {
        job();
    }
}

/// Queues jobs until the host pumps them. Suits a single cooperative thread
/// and lets tests decide completion order.
#[derive(Default)]
pub struct DeferredExecutor {
    jobs: Mutex<VecDeque<LoadJob>>,
}

impl DeferredExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.jobs.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Run the oldest queued job. Returns false when the queue is empty.
    pub fn run_next(&self) -> bool {
        let job = self.jobs.lock().unwrap_or_else(|e| e.into_inner()).pop_front();
        match job {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Run the newest queued job first.
    pub fn run_last(&self) -> bool {
        let job = self.jobs.lock().unwrap_or_else(|e| e.into_inner()).pop_back();
        match job {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Run everything queued, including jobs queued while running.
    pub fn run_all(&self) -> usize {
        let mut count = 0;
        while self.run_next() {
            count += 1;
        }
        count
    }
}

impl LoadExecutor for DeferredExecutor {
    fn spawn(&self, job: LoadJob) {
        self.jobs.lock().unwrap_or_else(|e| e.into_inner()).push_back(job);
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Providers constructed once and looked up by id. Registration order is kept.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: IndexMap<ProviderId, Arc<dyn DataProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider, replacing any previous one with the same id.
    pub fn register(&mut self, provider: Arc<dyn DataProvider>) -> Option<Arc<dyn DataProvider>> {
        let id = provider.id().clone();
        debug!("Registering provider {}", id);
        self.providers.insert(id, provider)
    }

    pub fn get(&self, id: &ProviderId) -> TimelineResult<Arc<dyn DataProvider>> {
        self.providers
            .get(id)
            .cloned()
            .ok_or_else(|| TimelineError::UnknownProvider(id.clone()))
    }

    pub fn contains(&self, id: &ProviderId) -> bool {
        self.providers.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &ProviderId> {
        self.providers.keys()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.providers.keys()).finish()
    }
}
