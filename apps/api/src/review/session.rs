//! A polling session: one per mounted review view.
//!
//! The session owns the delay, the attempt counters, the pending timer and the liveness
//! flag. Nothing is global, so two views of the same record never share counters.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tempfile::NamedTempFile;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::previews::{materialize, PreviewFiles, PreviewKind};
use super::inspect;
use super::reconciler::{next, refresh, Action, Fetch, PollPolicy, PollState, ReviewState};
use crate::blob::BlobStore;
use crate::models::resume::ResumeRecord;
use crate::store::ResumeStore;

/// What the review screen renders.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewView {
    pub state: ReviewState,
    /// Local copy of the uploaded PDF, if it could be read.
    pub resume_file: Option<PathBuf>,
    /// Local copy of the rendered first page.
    pub preview_image: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The read was adopted into the view.
    Applied,
    /// Another refresh is still in flight.
    Busy,
    /// Nothing to adopt (missing record, transport error, terminal or unmounted view).
    Ignored,
}

struct Shared {
    id: String,
    store: ResumeStore,
    blobs: Arc<dyn BlobStore>,
    policy: PollPolicy,
    poll: Mutex<PollState>,
    previews: Mutex<PreviewFiles>,
    view_tx: watch::Sender<ReviewView>,
    /// Cancelled on unmount.
    teardown: CancellationToken,
    /// Child of `teardown`; also cancelled once the view is terminal.
    polling: CancellationToken,
    refreshing: AtomicBool,
}

pub struct ReviewSession {
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ReviewSession {
    /// A session that has not started polling. Manual refresh works on it.
    pub fn new(
        id: impl Into<String>,
        store: ResumeStore,
        blobs: Arc<dyn BlobStore>,
        policy: PollPolicy,
    ) -> Self {
        let state = PollState::initial(&policy);
        let (view_tx, _) = watch::channel(ReviewView {
            state: state.view.clone(),
            resume_file: None,
            preview_image: None,
        });
        let teardown = CancellationToken::new();
        let polling = teardown.child_token();
        Self {
            shared: Arc::new(Shared {
                id: id.into(),
                store,
                blobs,
                policy,
                poll: Mutex::new(state),
                previews: Mutex::new(PreviewFiles::default()),
                view_tx,
                teardown,
                polling,
                refreshing: AtomicBool::new(false),
            }),
            task: Mutex::new(None),
        }
    }

    /// Mounts the view: runs the first cycle right away, then keeps polling until a
    /// terminal state or `unmount`. Must be called inside a Tokio runtime.
    pub fn mount(
        id: impl Into<String>,
        store: ResumeStore,
        blobs: Arc<dyn BlobStore>,
        policy: PollPolicy,
    ) -> Self {
        let session = Self::new(id, store, blobs, policy);
        let shared = Arc::clone(&session.shared);
        info!("Review session mounted for {}", shared.id);
        *lock(&session.task) = Some(tokio::spawn(poll_loop(shared)));
        session
    }

    pub fn id(&self) -> &str {
        &self.shared.id
    }

    pub fn subscribe(&self) -> watch::Receiver<ReviewView> {
        self.shared.view_tx.subscribe()
    }

    pub fn view(&self) -> ReviewView {
        self.shared.view_tx.borrow().clone()
    }

    /// One on-demand read. Never schedules a cycle or touches the counters; overlapping
    /// calls are rejected with `Busy`.
    pub async fn refresh(&self) -> RefreshOutcome {
        let Some(_busy) = BusyGuard::acquire(&self.shared.refreshing) else {
            debug!("Refresh of {} already in flight", self.shared.id);
            return RefreshOutcome::Busy;
        };
        self.shared.refresh_once().await
    }

    /// Tears the view down: no scheduled cycle runs afterwards, the pending timer is
    /// cancelled and local preview files are deleted.
    pub fn unmount(&self) {
        if self.shared.teardown.is_cancelled() {
            return;
        }
        self.shared.teardown.cancel();
        if let Some(task) = lock(&self.task).take() {
            task.abort();
        }
        lock(&self.shared.previews).clear();
        info!("Review session unmounted for {}", self.shared.id);
    }
}

#[cfg(test)]
impl ReviewSession {
    fn poll_state(&self) -> PollState {
        lock(&self.shared.poll).clone()
    }

    fn is_mounted(&self) -> bool {
        self.shared.is_live()
    }
}

impl Drop for ReviewSession {
    fn drop(&mut self) {
        self.unmount();
    }
}

async fn poll_loop(shared: Arc<Shared>) {
    loop {
        let Action::ScheduleRetry(delay) = shared.cycle().await else {
            break;
        };
        debug!(
            "Polling {} again in {}ms",
            shared.id,
            delay.as_millis()
        );
        tokio::select! {
            _ = shared.polling.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }
    debug!("Polling stopped for {}", shared.id);
}

impl Shared {
    fn is_live(&self) -> bool {
        !self.teardown.is_cancelled()
    }

    async fn cycle(&self) -> Action {
        if !self.is_live() || lock(&self.poll).view.is_terminal() {
            return Action::Stop;
        }

        let fetch = inspect(&self.store, &self.id).await;
        match &fetch {
            Fetch::Record(record) => self.load_previews(record).await,
            Fetch::Corrupted(e) => warn!("Record {} is corrupted: {e}", self.id),
            Fetch::Missing => debug!("Record {} not visible yet", self.id),
            Fetch::Unavailable(e) => warn!("Failed to read record {}: {e}", self.id),
        }

        if !self.is_live() {
            return Action::Stop;
        }
        let (view, action) = {
            let mut poll = lock(&self.poll);
            let (state, action) = next(poll.clone(), fetch, &self.policy);
            *poll = state;
            (poll.view.clone(), action)
        };

        if action == Action::Stop {
            info!(
                "Review of {} settled as {}",
                self.id,
                view.status().as_str()
            );
            self.polling.cancel();
        }
        self.publish_state(view);
        action
    }

    async fn refresh_once(&self) -> RefreshOutcome {
        if !self.is_live() {
            return RefreshOutcome::Ignored;
        }

        let fetch = inspect(&self.store, &self.id).await;
        match &fetch {
            Fetch::Record(record) => self.load_previews(record).await,
            Fetch::Unavailable(e) => warn!("Refresh of {} skipped: {e}", self.id),
            _ => {}
        }

        if !self.is_live() {
            return RefreshOutcome::Ignored;
        }
        let view = {
            let mut poll = lock(&self.poll);
            let Some(view) = refresh(&poll, fetch) else {
                return RefreshOutcome::Ignored;
            };
            poll.view = view.clone();
            view
        };

        if view.is_terminal() {
            self.polling.cancel();
        }
        self.publish_state(view);
        RefreshOutcome::Applied
    }

    fn publish_state(&self, state: ReviewState) {
        self.view_tx.send_modify(|view| view.state = state);
    }

    /// Side read of the original file and its preview. Failures never affect the state.
    async fn load_previews(&self, record: &ResumeRecord) {
        let sources = [
            (PreviewKind::Resume, record.resume_path.as_str()),
            (PreviewKind::Image, record.image_path.as_str()),
        ];
        for (kind, path) in sources {
            if path.is_empty() {
                continue;
            }
            match self.read_preview(kind, path).await {
                Ok(Some(file)) => {
                    // Checked under the lock: `unmount` cancels before it clears.
                    let local = {
                        let mut previews = lock(&self.previews);
                        if !self.is_live() {
                            return;
                        }
                        previews.replace(kind, file)
                    };
                    self.view_tx.send_modify(|view| match kind {
                        PreviewKind::Resume => view.resume_file = Some(local),
                        PreviewKind::Image => view.preview_image = Some(local),
                    });
                }
                Ok(None) => debug!("Nothing stored at {path}"),
                Err(e) => error!("Error reading {kind:?} file {path}: {e}"),
            }
        }
    }

    async fn read_preview(&self, kind: PreviewKind, path: &str) -> Result<Option<NamedTempFile>> {
        let Some(bytes) = self.blobs.read(path).await? else {
            return Ok(None);
        };
        let file = tokio::task::spawn_blocking(move || materialize(kind, &bytes)).await??;
        Ok(Some(file))
    }
}

/// Holds the refresh busy flag; released on drop so a cancelled refresh cannot wedge it.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        if flag.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(Self(flag))
        }
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
