//! Incremental loading of one direction of a row source.
//!
//! A [`SegmentLoader`] walks a queue of queries, pulling rows from one open
//! cursor at a time in bounded batches and appending them to an
//! append-only row list. Each batch runs as a local task; at most one is in
//! flight per loader, and a batch that completes after its loader was
//! cancelled has no effect at all.

use std::{
    cell::{Ref, RefCell},
    collections::VecDeque,
    rc::Rc,
};

use log::{debug, error, warn};
use rowscope_common::async_runtime::LocalScheduler;
use rowscope_document::{Document, estimate_size};
use rowscope_query::{Cursor, Driver, Query};

use crate::{
    cancel::CancellationToken,
    notify::{LoadSide, UpdateEvent, UpdateNotifier},
};

/// Terminal error recorded by [`SegmentLoader::cancel_pending_requests`].
pub const CANCELLED_MESSAGE: &str = "Loading cancelled";

/// Whether a loader can produce more rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndState {
    /// More rows may follow.
    NotYet,
    /// Every query is exhausted.
    Complete,
    /// Loading stopped with an error. Rows obtained before the failure are
    /// kept.
    Error(String),
}

impl EndState {
    /// `true` for both terminal states.
    pub fn is_end(&self) -> bool {
        !matches!(self, EndState::NotYet)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            EndState::Error(message) => Some(message),
            _ => None,
        }
    }
}

/// Everything a loader needs to run queries and report progress.
#[derive(Clone)]
pub struct LoadContext {
    pub driver: Rc<dyn Driver>,
    pub scheduler: LocalScheduler,
    pub notifier: UpdateNotifier,
    /// Maximum number of rows requested per load.
    pub batch_size: usize,
}

impl std::fmt::Debug for LoadContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadContext")
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MemBudget {
    Limited(i64),
    Unlimited,
}

impl MemBudget {
    fn new(limit: Option<usize>) -> MemBudget {
        match limit {
            Some(limit) => MemBudget::Limited(limit.min(i64::MAX as usize) as i64),
            None => MemBudget::Unlimited,
        }
    }

    fn exhausted(&self) -> bool {
        matches!(self, MemBudget::Limited(avail) if *avail <= 0)
    }

    fn charge(&mut self, size: usize) {
        if let MemBudget::Limited(avail) = self {
            *avail = avail.saturating_sub(size as i64);
        }
    }
}

enum CursorSlot {
    /// No cursor; the next load opens the next queued query.
    Closed,
    Open(Box<dyn Cursor>),
    /// The cursor is held by the in-flight load.
    InUse,
}

enum LoaderState {
    Loading {
        queries: VecDeque<Query>,
        cursor: CursorSlot,
    },
    /// `None` on success.
    Done(Option<String>),
}

struct LoaderInner {
    state: LoaderState,
    rows: Vec<Document>,
    budget: MemBudget,
    pending: Option<CancellationToken>,
}

/// Loads rows for one direction of a row source.
pub struct SegmentLoader {
    inner: Rc<RefCell<LoaderInner>>,
    ctx: Option<Rc<LoaderContext>>,
}

struct LoaderContext {
    load: LoadContext,
    side: LoadSide,
}

/// What a load task starts with.
enum Step {
    Open(Query),
    Read(Box<dyn Cursor>),
}

/// How a batch ended.
enum Outcome {
    /// The batch (or budget) is full; the cursor stays open.
    More,
    EndOfCursor,
    Failed(String),
}

impl SegmentLoader {
    /// Creates a loader that will run `queries` in order, concatenating
    /// their results.
    pub fn new(
        ctx: LoadContext,
        side: LoadSide,
        queries: Vec<Query>,
        mem_budget: Option<usize>,
    ) -> SegmentLoader {
        let state = if queries.is_empty() {
            LoaderState::Done(None)
        } else {
            LoaderState::Loading {
                queries: queries.into(),
                cursor: CursorSlot::Closed,
            }
        };
        SegmentLoader {
            inner: Rc::new(RefCell::new(LoaderInner {
                state,
                rows: Vec::new(),
                budget: MemBudget::new(mem_budget),
                pending: None,
            })),
            ctx: Some(Rc::new(LoaderContext { load: ctx, side })),
        }
    }

    /// A terminated loader over rows that are already materialized.
    pub fn fixed(rows: Vec<Document>) -> SegmentLoader {
        Self::terminated(rows, None)
    }

    /// A loader that failed before loading anything.
    pub fn failed(message: impl Into<String>) -> SegmentLoader {
        Self::terminated(Vec::new(), Some(message.into()))
    }

    fn terminated(rows: Vec<Document>, error: Option<String>) -> SegmentLoader {
        SegmentLoader {
            inner: Rc::new(RefCell::new(LoaderInner {
                state: LoaderState::Done(error),
                rows,
                budget: MemBudget::Unlimited,
                pending: None,
            })),
            ctx: None,
        }
    }

    /// Starts loading the next batch.
    ///
    /// Does nothing while a load is in flight, once the loader has
    /// terminated, or while the memory budget is exhausted. The batch runs
    /// on the local executor; its effects become visible, and an
    /// [`UpdateEvent::Loaded`] is posted, only after this call returns.
    pub fn trigger_load(&self) {
        let Some(ctx) = &self.ctx else {
            return;
        };

        let (token, step) = {
            let mut guard = self.inner.borrow_mut();
            let inner = &mut *guard;
            if inner.pending.is_some() || inner.budget.exhausted() {
                return;
            }
            let LoaderState::Loading { queries, cursor } = &mut inner.state else {
                return;
            };
            let step = match std::mem::replace(cursor, CursorSlot::InUse) {
                CursorSlot::Open(open) => Step::Read(open),
                CursorSlot::Closed => match queries.pop_front() {
                    Some(query) => Step::Open(query),
                    None => {
                        inner.state = LoaderState::Done(None);
                        return;
                    }
                },
                CursorSlot::InUse => {
                    error!(
                        "{} loader: cursor in use with no pending request",
                        ctx.side
                    );
                    inner.state = LoaderState::Done(Some(
                        "internal error: cursor in use with no pending request".to_string(),
                    ));
                    return;
                }
            };
            let token = CancellationToken::new();
            inner.pending = Some(token.clone());
            (token, step)
        };

        let task = load_batch(self.inner.clone(), ctx.clone(), token, step);
        if let Err(e) = ctx.load.scheduler.spawn(task) {
            error!("{} loader: failed to spawn load: {e}", ctx.side);
            let mut inner = self.inner.borrow_mut();
            inner.pending = None;
            inner.state = LoaderState::Done(Some(e.to_string()));
        }
    }

    /// Abandons the in-flight load, if any, and terminates the loader with
    /// [`CANCELLED_MESSAGE`].
    ///
    /// Takes effect immediately. The abandoned query may still complete in
    /// the background, but its result is discarded. A loader that already
    /// terminated keeps its terminal state.
    pub fn cancel_pending_requests(&self) {
        let mut inner = self.inner.borrow_mut();
        if let Some(token) = inner.pending.take() {
            token.cancel();
        }
        if let LoaderState::Loading { cursor, .. } = &mut inner.state {
            if let CursorSlot::Open(open) = cursor {
                open.close();
            }
            inner.state = LoaderState::Done(Some(CANCELLED_MESSAGE.to_string()));
        }
    }

    pub fn hit_end(&self) -> EndState {
        match &self.inner.borrow().state {
            LoaderState::Loading { .. } => EndState::NotYet,
            LoaderState::Done(None) => EndState::Complete,
            LoaderState::Done(Some(message)) => EndState::Error(message.clone()),
        }
    }

    pub fn hit_mem_usage_limit(&self) -> bool {
        self.inner.borrow().budget.exhausted()
    }

    /// Lifts the memory budget for the rest of the loader's life.
    pub fn unlimit_mem_usage(&self) {
        self.inner.borrow_mut().budget = MemBudget::Unlimited;
    }

    /// Whether a load is in flight.
    pub fn is_loading(&self) -> bool {
        self.inner.borrow().pending.is_some()
    }

    /// The rows loaded so far, in load order.
    pub fn rows(&self) -> Ref<'_, [Document]> {
        Ref::map(self.inner.borrow(), |inner| inner.rows.as_slice())
    }

    pub fn row_count(&self) -> usize {
        self.inner.borrow().rows.len()
    }
}

impl std::fmt::Debug for SegmentLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("SegmentLoader")
            .field("side", &self.ctx.as_ref().map(|ctx| ctx.side))
            .field("rows", &inner.rows.len())
            .field("budget", &inner.budget)
            .field("loading", &inner.pending.is_some())
            .finish_non_exhaustive()
    }
}

async fn load_batch(
    inner: Rc<RefCell<LoaderInner>>,
    ctx: Rc<LoaderContext>,
    token: CancellationToken,
    step: Step,
) {
    let side = ctx.side;
    let mut cursor = match step {
        Step::Read(cursor) => cursor,
        Step::Open(query) => {
            debug!("{side} loader: opening query on {}", query.table_id());
            let result = ctx.load.driver.run(&query).await;
            if token.is_cancelled() {
                if let Ok(result) = result {
                    result.into_cursor().close();
                }
                debug!("{side} loader: discarding cancelled query result");
                return;
            }
            match result {
                Ok(result) => result.into_cursor(),
                Err(e) => {
                    warn!("{side} loader: query failed: {e}");
                    let outcome = Outcome::Failed(e.to_string());
                    complete_batch(&inner, &ctx, &token, Vec::new(), outcome, None);
                    return;
                }
            }
        }
    };

    let mut budget = inner.borrow().budget;
    let mut rows = Vec::new();
    let outcome = loop {
        if rows.len() >= ctx.load.batch_size || budget.exhausted() {
            break Outcome::More;
        }
        let next = cursor.next().await;
        if token.is_cancelled() {
            cursor.close();
            debug!(
                "{side} loader: discarding cancelled batch of {} rows",
                rows.len()
            );
            return;
        }
        match next {
            Ok(Some(row)) => {
                budget.charge(estimate_size(&row));
                rows.push(row);
            }
            Ok(None) => break Outcome::EndOfCursor,
            Err(e) => {
                warn!("{side} loader: cursor failed after {} rows: {e}", rows.len());
                break Outcome::Failed(e.to_string());
            }
        }
    };
    complete_batch(&inner, &ctx, &token, rows, outcome, Some(cursor));
}

/// Applies a finished batch to its loader.
fn complete_batch(
    inner: &RefCell<LoaderInner>,
    ctx: &LoaderContext,
    token: &CancellationToken,
    rows: Vec<Document>,
    outcome: Outcome,
    cursor: Option<Box<dyn Cursor>>,
) {
    let side = ctx.side;
    let mut guard = inner.borrow_mut();
    let inner = &mut *guard;

    let consistent = inner.pending.as_ref() == Some(token)
        && matches!(
            inner.state,
            LoaderState::Loading {
                cursor: CursorSlot::InUse,
                ..
            }
        );
    if !consistent {
        error!("{side} loader: state changed underneath a pending load");
        if let Some(mut cursor) = cursor {
            cursor.close();
        }
        inner.pending = None;
        inner.state = LoaderState::Done(Some(
            "internal error: loader state changed underneath a pending load".to_string(),
        ));
        drop(guard);
        ctx.load.notifier.notify(UpdateEvent::Loaded(side));
        return;
    }
    inner.pending = None;

    let appended = rows.len();
    inner
        .budget
        .charge(rows.iter().map(estimate_size).sum::<usize>());
    inner.rows.extend(rows);

    let LoaderState::Loading { queries, cursor: slot } = &mut inner.state else {
        return;
    };
    let state_changed = match (outcome, cursor) {
        (Outcome::More, Some(cursor)) => {
            *slot = CursorSlot::Open(cursor);
            false
        }
        (Outcome::EndOfCursor, cursor) => {
            if let Some(mut cursor) = cursor {
                cursor.close();
            }
            *slot = CursorSlot::Closed;
            if queries.is_empty() {
                debug!("{side} loader: complete with {} rows", inner.rows.len());
                inner.state = LoaderState::Done(None);
            } else {
                debug!("{side} loader: query exhausted, {} queued", queries.len());
            }
            true
        }
        (Outcome::Failed(message), cursor) => {
            if let Some(mut cursor) = cursor {
                cursor.close();
            }
            inner.state = LoaderState::Done(Some(message));
            true
        }
        (Outcome::More, None) => {
            *slot = CursorSlot::Closed;
            false
        }
    };
    drop(guard);

    if appended > 0 || state_changed {
        ctx.load.notifier.notify(UpdateEvent::Loaded(side));
    }
}
