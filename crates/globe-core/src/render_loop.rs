//! Frame scheduling: one tick per display frame until cancelled.

use std::cell::{Cell, RefCell};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use instant::Instant;

use crate::error::GlobeError;

pub type FrameCallback = Box<dyn FnOnce(f64)>;

/// Handle for one pending frame request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameToken(pub u64);

/// Platform frame scheduler (`requestAnimationFrame`, an event-loop pump).
/// Callbacks receive a monotonic timestamp in milliseconds.
pub trait FrameSource {
    fn request_frame(&self, callback: FrameCallback) -> FrameToken;
    fn cancel_frame(&self, token: FrameToken);
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameTime {
    pub index: u64,
    pub now_ms: f64,
    /// Time since the previous tick, zero on the first.
    pub dt_ms: f64,
}

impl FrameTime {
    pub fn new(index: u64, now_ms: f64, dt_ms: f64) -> Self {
        Self {
            index,
            now_ms,
            dt_ms,
        }
    }
}

type TickFn = Box<dyn FnMut(FrameTime) -> Result<(), GlobeError>>;

struct LoopShared {
    source: Rc<dyn FrameSource>,
    tick: RefCell<TickFn>,
    pending: Cell<Option<FrameToken>>,
    running: Cell<bool>,
    frames: Cell<u64>,
    last_ms: Cell<Option<f64>>,
}

/// Running frame loop. Dropping it cancels the pending frame.
pub struct RenderLoop {
    shared: Rc<LoopShared>,
}

impl RenderLoop {
    pub fn start<F>(source: Rc<dyn FrameSource>, tick: F) -> Self
    where
        F: FnMut(FrameTime) -> Result<(), GlobeError> + 'static,
    {
        let shared = Rc::new(LoopShared {
            source,
            tick: RefCell::new(Box::new(tick)),
            pending: Cell::new(None),
            running: Cell::new(true),
            frames: Cell::new(0),
            last_ms: Cell::new(None),
        });
        schedule(&shared);
        log::info!("[loop] started");
        Self { shared }
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.get()
    }

    /// Ticks executed so far.
    pub fn frames(&self) -> u64 {
        self.shared.frames.get()
    }

    /// Stop scheduling and cancel the outstanding request. Safe to call twice.
    pub fn cancel(&self) {
        if !self.shared.running.replace(false) {
            return;
        }
        if let Some(token) = self.shared.pending.take() {
            self.shared.source.cancel_frame(token);
        }
        log::info!("[loop] cancelled after {} frames", self.shared.frames.get());
    }
}

impl Drop for RenderLoop {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn schedule(shared: &Rc<LoopShared>) {
    let weak: Weak<LoopShared> = Rc::downgrade(shared);
    let token = shared.source.request_frame(Box::new(move |now_ms| {
        if let Some(shared) = weak.upgrade() {
            run_frame(&shared, now_ms);
        }
    }));
    shared.pending.set(Some(token));
}

fn run_frame(shared: &Rc<LoopShared>, now_ms: f64) {
    shared.pending.set(None);
    if !shared.running.get() {
        return;
    }
    let index = shared.frames.get();
    let dt_ms = shared
        .last_ms
        .get()
        .map_or(0.0, |last| (now_ms - last).max(0.0));
    shared.last_ms.set(Some(now_ms));
    let time = FrameTime::new(index, now_ms, dt_ms);

    let outcome = match shared.tick.try_borrow_mut() {
        Ok(mut tick) => catch_unwind(AssertUnwindSafe(|| (*tick)(time))),
        Err(_) => {
            log::warn!("[loop] frame {} skipped: tick re-entered", index);
            Ok(Ok(()))
        }
    };
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(e)) => log::error!("[loop] frame {} failed: {}", index, e),
        Err(_) => log::error!("[loop] frame {} panicked", index),
    }
    shared.frames.set(index + 1);

    if shared.running.get() {
        schedule(shared);
    }
}

/// Frame source driven by explicit `pump` calls, for native event loops.
pub struct PumpFrameSource {
    next_token: Cell<u64>,
    pending: RefCell<Vec<(FrameToken, FrameCallback)>>,
    epoch: Instant,
}

impl Default for PumpFrameSource {
    fn default() -> Self {
        Self::new()
    }
}

impl PumpFrameSource {
    pub fn new() -> Self {
        Self {
            next_token: Cell::new(1),
            pending: RefCell::new(Vec::new()),
            epoch: Instant::now(),
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Run every callback requested before this call; requests made by the
    /// callbacks themselves wait for the next pump.
    pub fn pump(&self, now_ms: f64) -> usize {
        let due = std::mem::take(&mut *self.pending.borrow_mut());
        let count = due.len();
        for (_, callback) in due {
            callback(now_ms);
        }
        count
    }

    pub fn pump_now(&self) -> usize {
        self.pump(self.epoch.elapsed().as_secs_f64() * 1000.0)
    }
}

impl FrameSource for PumpFrameSource {
    fn request_frame(&self, callback: FrameCallback) -> FrameToken {
        let token = FrameToken(self.next_token.get());
        self.next_token.set(token.0 + 1);
        self.pending.borrow_mut().push((token, callback));
        token
    }

    fn cancel_frame(&self, token: FrameToken) {
        self.pending.borrow_mut().retain(|(t, _)| *t != token);
    }
}
