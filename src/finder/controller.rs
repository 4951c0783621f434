use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, Sleep, interval, sleep};
use tracing::{debug, error, trace, warn};

use super::input::{self, Intent};
use super::matcher::{Mode, find_all_until};
use super::render;
use super::state::{Layout, Phase, UiState};
use super::surface::Surface;
use super::{FinderOptions, ItemSource};
use crate::error::{FinderError, Result};

const FILTER_QUEUE_CAPACITY: usize = 30;
const HOT_RELOAD_INTERVAL: Duration = Duration::from_millis(30);
const INPUT_REDRAW_DELAY: Duration = Duration::from_millis(10);

type SharedState = Arc<RwLock<UiState>>;
type ErrorSlot = Arc<Mutex<Option<FinderError>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Notice {
    Filtered,
    Failed,
}

pub(crate) async fn run<S, I>(
    surface: &mut S,
    source: Arc<I>,
    options: &FinderOptions,
) -> Result<Vec<usize>>
where
    S: Surface,
    I: ItemSource,
{
    let mut events = surface.init()?;
    let result = drive(surface, &mut events, source, options).await;
    let restored = surface.finalise();

    match (result, restored) {
        (Err(error), Err(restore_error)) => {
            warn!("terminal restore error: {restore_error}");
            Err(error)
        }
        (Err(error), Ok(())) => Err(error),
        (Ok(_), Err(restore_error)) => Err(FinderError::TerminalIo(restore_error)),
        (Ok(picked), Ok(())) => Ok(picked),
    }
}

async fn drive<S, I>(
    surface: &mut S,
    events: &mut S::Events,
    source: Arc<I>,
    options: &FinderOptions,
) -> Result<Vec<usize>>
where
    S: Surface,
    I: ItemSource,
{
    let (width, height) = surface.size();
    let layout = Layout::new(
        width,
        height,
        options.preview.is_some(),
        options.header.is_some(),
    );
    let labels = source.labels();
    let known_items = labels.len();
    let state: SharedState = Arc::new(RwLock::new(UiState::new(
        labels,
        options.multi,
        layout,
        &options.prompt,
    )));
    let errors: ErrorSlot = Arc::default();

    let (filter_tx, filter_rx) = mpsc::channel::<()>(FILTER_QUEUE_CAPACITY);
    let (notice_tx, mut notice_rx) = mpsc::unbounded_channel::<Notice>();

    let mut tasks = TaskSet::default();
    let cancelled = tasks.cancelled();
    tasks.push(tokio::spawn(filter_worker(
        state.clone(),
        filter_rx,
        notice_tx.clone(),
        errors.clone(),
        options.mode,
        cancelled,
    )));
    if options.hot_reload {
        tasks.push(tokio::spawn(hot_reload(
            source,
            state.clone(),
            filter_tx.clone(),
            known_items,
        )));
    }

    let mut redraw = RedrawTimer::new();
    redraw.arm(Duration::ZERO);

    loop {
        tokio::select! {
            maybe_event = events.next() => {
                match maybe_event {
                    Some(Ok(event)) => {
                        if let Some(intent) = input::map_event(&event, options.multi) {
                            trace!(?intent, "input");
                            let changed = write_state(&state).apply(intent);
                            if changed {
                                request_filter(&filter_tx);
                            }
                            redraw.arm(INPUT_REDRAW_DELAY);
                        }
                    }
                    Some(Err(error)) => warn!("terminal event error: {error}"),
                    None => {
                        debug!("terminal event stream closed");
                        write_state(&state).apply(Intent::Abort);
                    }
                }
            }
            Some(notice) = notice_rx.recv() => {
                if notice == Notice::Filtered {
                    redraw.arm(Duration::ZERO);
                }
            }
            () = redraw.fired(), if redraw.is_armed() => {
                redraw.disarm();
                let view = read_state(&state).view();
                render::render(surface, &view, options);
                if let Err(error) = surface.present() {
                    warn!("failed to present frame: {error}");
                }
            }
        }

        if let Some(error) = errors.lock().unwrap_or_else(PoisonError::into_inner).take() {
            return Err(error);
        }
        match read_state(&state).phase() {
            Phase::Editing | Phase::ConfirmPending => {}
            Phase::AwaitingConfirm(picked) => {
                debug!(?picked, "selection confirmed");
                return Ok(picked.clone());
            }
            Phase::Aborted => return Err(FinderError::Abort),
        }
    }
}

/// Queues a filter pass. A full queue already holds a pass that will see this state.
fn request_filter(filter_tx: &mpsc::Sender<()>) -> bool {
    match filter_tx.try_send(()) {
        Ok(()) => true,
        Err(error) => {
            trace!("filter request dropped: {error}");
            false
        }
    }
}

async fn filter_worker(
    state: SharedState,
    mut requests: mpsc::Receiver<()>,
    notices: mpsc::UnboundedSender<Notice>,
    errors: ErrorSlot,
    mode: Mode,
    cancelled: Arc<AtomicBool>,
) {
    while requests.recv().await.is_some() {
        while requests.try_recv().is_ok() {}

        let (query, items, identity, generation) = {
            let state = read_state(&state);
            (
                state.query().to_vec(),
                state.items(),
                state.all_matches(),
                state.generation(),
            )
        };
        let outcome = if query.is_empty() {
            Ok(identity)
        } else {
            let cancelled = cancelled.clone();
            let pass = move || find_all_until(&query, &items, mode, &cancelled);
            match tokio::task::spawn_blocking(pass).await {
                Ok(Ok(Some(matches))) => Ok(Arc::new(matches)),
                Ok(Ok(None)) => break,
                Ok(Err(failure)) => Err(failure),
                Err(join_error) => Err(FinderError::Worker(join_error.to_string())),
            }
        };

        match outcome {
            Ok(matches) => {
                trace!(matches = matches.len(), generation, "filter pass finished");
                write_state(&state).apply_matches(matches, generation);
                if notices.send(Notice::Filtered).is_err() {
                    break;
                }
            }
            Err(failure) => {
                error!("filter pass failed: {failure}");
                *errors.lock().unwrap_or_else(PoisonError::into_inner) = Some(failure);
                let _ = notices.send(Notice::Failed);
                break;
            }
        }
    }
}

async fn hot_reload<I: ItemSource>(
    source: Arc<I>,
    state: SharedState,
    filter_tx: mpsc::Sender<()>,
    mut known: usize,
) {
    let mut ticker = interval(HOT_RELOAD_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        if source.len() == known {
            continue;
        }
        let labels = source.labels();
        known = labels.len();
        debug!(items = known, "candidate list changed");
        write_state(&state).replace_items(labels);
        request_filter(&filter_tx);
    }
}

fn read_state(state: &SharedState) -> RwLockReadGuard<'_, UiState> {
    state.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_state(state: &SharedState) -> RwLockWriteGuard<'_, UiState> {
    state.write().unwrap_or_else(PoisonError::into_inner)
}

/// Background tasks, aborted when the finder returns. Blocking filter passes
/// cannot be aborted, so they poll `cancelled` instead.
#[derive(Default)]
struct TaskSet {
    tasks: Vec<JoinHandle<()>>,
    cancelled: Arc<AtomicBool>,
}

impl TaskSet {
    fn push(&mut self, task: JoinHandle<()>) {
        self.tasks.push(task);
    }

    fn cancelled(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }
}

impl Drop for TaskSet {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::Relaxed);
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Single-shot redraw deadline; re-arming pushes it back.
struct RedrawTimer {
    sleep: Pin<Box<Sleep>>,
    armed: bool,
}

impl RedrawTimer {
    fn new() -> Self {
        Self {
            sleep: Box::pin(sleep(Duration::ZERO)),
            armed: false,
        }
    }

    fn arm(&mut self, delay: Duration) {
        self.sleep.as_mut().reset(Instant::now() + delay);
        self.armed = true;
    }

    fn disarm(&mut self) {
        self.armed = false;
    }

    fn is_armed(&self) -> bool {
        self.armed
    }

    async fn fired(&mut self) {
        self.sleep.as_mut().await;
    }
}
