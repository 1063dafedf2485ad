//! Background volume ramps.
//!
//! Ramps run as jobs on a small fixed worker pool. Each tick goes back
//! through a [`FadeTarget`], which re-acquires the audio lock and checks that
//! the session being faded is still where the ramp expects it.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, warn};

/// Worker threads in the fade pool.
pub const FADE_WORKERS: usize = 2;

/// Linear gain interpolation over a fixed duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeRamp {
    pub from: f32,
    pub to: f32,
    pub duration: Duration,
}

impl FadeRamp {
    pub fn new(from: f32, to: f32, duration: Duration) -> Self {
        Self { from, to, duration }
    }

    /// Gain after `elapsed`; exactly `to` once the duration has passed.
    pub fn gain_at(&self, elapsed: Duration) -> f32 {
        if self.duration.is_zero() || elapsed >= self.duration {
            return self.to;
        }
        let progress = (elapsed.as_secs_f32() / self.duration.as_secs_f32()).clamp(0.0, 1.0);
        self.from + (self.to - self.from) * progress
    }
}

/// Cooperative cancellation flag shared between a ramp and its owner.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Which side of a transition a ramp is driving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSlot {
    Current,
    Previous,
}

/// Result of applying one ramp step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Gain was set.
    Applied,
    /// The session is no longer in the expected slot; stop quietly.
    Detached,
    /// The line closed, stopped or lost gain control; stop and clean up.
    Broken,
}

/// Access to sessions from ramp workers.
pub trait FadeTarget: Send + Sync {
    /// Set the gain of session `id` if it still occupies `slot`.
    fn apply(&self, slot: SessionSlot, id: u64, gain: f32) -> TickOutcome;
    /// Release session `id` if it still occupies `slot`.
    fn release(&self, slot: SessionSlot, id: u64);
}

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Keeps the live worker count in sync with worker lifetime.
struct WorkerGuard {
    alive: Arc<AtomicUsize>,
}

impl WorkerGuard {
    fn new(alive: Arc<AtomicUsize>) -> Self {
        alive.fetch_add(1, Ordering::SeqCst);
        Self { alive }
    }
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        self.alive.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Fixed pool running fade jobs; extra jobs queue.
pub struct FadeScheduler {
    sender: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    alive: Arc<AtomicUsize>,
}

impl FadeScheduler {
    pub fn new() -> Self {
        Self::with_workers(FADE_WORKERS)
    }

    pub fn with_workers(count: usize) -> Self {
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));
        let alive = Arc::new(AtomicUsize::new(0));

        let workers = (0..count.max(1))
            .filter_map(|index| {
                let receiver = receiver.clone();
                let guard = WorkerGuard::new(alive.clone());
                thread::Builder::new()
                    .name(format!("fade-worker-{}", index))
                    .spawn(move || {
                        let _guard = guard;
                        run_worker(receiver);
                    })
                    .map_err(|err| warn!("failed to spawn fade worker {}: {}", index, err))
                    .ok()
            })
            .collect();

        Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            alive,
        }
    }

    fn submit(&self, job: Job) -> bool {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match sender.as_ref() {
            Some(sender) => sender.send(job).is_ok(),
            None => false,
        }
    }

    /// Ramp the current session from `ramp.from` to `ramp.to`.
    ///
    /// The caller has already applied the start gain and started the line.
    /// `None` when the pool has been shut down and the job was not queued.
    pub fn fade_in(
        &self,
        target: Arc<dyn FadeTarget>,
        session_id: u64,
        ramp: FadeRamp,
        tick: Duration,
    ) -> Option<CancelToken> {
        let token = CancelToken::new();
        let job_token = token.clone();
        let submitted = self.submit(Box::new(move || {
            run_fade_in(target.as_ref(), session_id, ramp, tick, &job_token)
        }));
        if !submitted {
            warn!("fade scheduler stopped; fade-in for session {} dropped", session_id);
            return None;
        }
        Some(token)
    }

    /// Ramp the previous session from `from` to silence, then release it.
    ///
    /// `None` when the pool has been shut down; the caller keeps ownership of
    /// the cleanup in that case.
    pub fn fade_out(
        &self,
        target: Arc<dyn FadeTarget>,
        session_id: u64,
        from: f32,
        duration: Duration,
        tick: Duration,
    ) -> Option<CancelToken> {
        let token = CancelToken::new();
        let job_token = token.clone();
        let ramp = FadeRamp::new(from, 0.0, duration);
        let submitted = self.submit(Box::new(move || {
            run_fade_out(target.as_ref(), session_id, ramp, tick, &job_token)
        }));
        if !submitted {
            warn!("fade scheduler stopped; fade-out for session {} dropped", session_id);
            return None;
        }
        Some(token)
    }

    /// True while the queue is open and at least one worker runs.
    pub fn is_alive(&self) -> bool {
        let open = self
            .sender
            .lock()
            .map(|sender| sender.is_some())
            .unwrap_or(false);
        open && self.alive.load(Ordering::SeqCst) > 0
    }

    /// Close the queue and join the workers after queued jobs finish.
    pub fn shutdown(&self) {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        drop(sender);

        let workers: Vec<JoinHandle<()>> = self
            .workers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .drain(..)
            .collect();
        let current = thread::current().id();
        for worker in workers {
            if worker.thread().id() == current {
                continue;
            }
            if worker.join().is_err() {
                warn!("fade worker panicked");
            }
        }
    }
}

impl Default for FadeScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for FadeScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(receiver: Arc<Mutex<Receiver<Job>>>) {
    loop {
        let job = {
            let receiver = match receiver.lock() {
                Ok(receiver) => receiver,
                Err(_) => break,
            };
            receiver.recv()
        };
        match job {
            Ok(job) => job(),
            Err(_) => break,
        }
    }
    debug!("fade worker exiting");
}

fn run_fade_in(
    target: &dyn FadeTarget,
    id: u64,
    ramp: FadeRamp,
    tick: Duration,
    token: &CancelToken,
) {
    let start = Instant::now();
    loop {
        if token.is_cancelled() {
            return;
        }
        let elapsed = start.elapsed();
        if elapsed >= ramp.duration {
            break;
        }
        match target.apply(SessionSlot::Current, id, ramp.gain_at(elapsed)) {
            TickOutcome::Applied => {}
            TickOutcome::Detached => return,
            TickOutcome::Broken => {
                debug!("fade-in aborted: session {} line unavailable", id);
                target.release(SessionSlot::Current, id);
                return;
            }
        }
        thread::sleep(tick);
    }

    if !token.is_cancelled() {
        target.apply(SessionSlot::Current, id, ramp.to);
        debug!("fade-in complete for session {} at {:.3}", id, ramp.to);
    }
}

fn run_fade_out(
    target: &dyn FadeTarget,
    id: u64,
    ramp: FadeRamp,
    tick: Duration,
    token: &CancelToken,
) {
    let start = Instant::now();
    loop {
        if token.is_cancelled() {
            break;
        }
        let elapsed = start.elapsed();
        if elapsed >= ramp.duration {
            break;
        }
        if target.apply(SessionSlot::Previous, id, ramp.gain_at(elapsed)) != TickOutcome::Applied {
            break;
        }
        thread::sleep(tick);
    }

    target.apply(SessionSlot::Previous, id, 0.0);
    target.release(SessionSlot::Previous, id);
    debug!("fade-out finished for session {}", id);
}
