// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Async boundary manager — moves engine calls off the calling context and
// delivers exactly one reply back onto it.
//
// Engine calls run on tokio's blocking pool (`spawn_blocking`). Replies are
// posted through a `CallingContext`, which on iOS is the main dispatch queue
// and elsewhere a channel drained on the UI thread (`MainLoop`). On Android
// the channel carries a waker that signals the main Looper on every post.
//
// There is no cancellation and no timeout: once an engine call is dispatched
// it runs to completion or failure.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, mpsc};
use std::time::{Duration, Instant};

use tokio::runtime::{Builder, Handle, Runtime};
use tracing::{debug, error, info, warn};
use zkemail_core::BridgeConfig;
use zkemail_core::error::{BridgeError, Result};
use zkemail_core::types::{InvocationId, MethodResponse};

use crate::normalize::panic_to_engine_error;
use crate::traits::{CallingContext, EngineError, Job};

/// Callback that receives the single response of an invocation.
pub type Reply = Box<dyn FnOnce(MethodResponse) + Send + 'static>;

/// Build the multi-threaded runtime that owns the engine worker pool.
///
/// Hosts without their own tokio runtime (every mobile host) keep this alive
/// for the lifetime of the plugin registration.
pub fn build_runtime(config: &BridgeConfig) -> Result<Runtime> {
    let blocking = config.max_blocking_threads.max(1);
    let runtime = Builder::new_multi_thread()
        .worker_threads(1)
        .max_blocking_threads(blocking)
        .thread_name("zkemail-bridge")
        .enable_all()
        .build()
        .map_err(BridgeError::Io)?;
    info!(max_blocking_threads = blocking, "bridge runtime started");
    Ok(runtime)
}

#[derive(Debug, Default)]
struct Stats {
    dispatched: AtomicU64,
    in_flight: AtomicUsize,
}

/// Decrements the in-flight count when the engine call has finished.
struct InFlight(Arc<Stats>);

impl InFlight {
    fn enter(stats: &Arc<Stats>) -> Self {
        stats.dispatched.fetch_add(1, Ordering::SeqCst);
        stats.in_flight.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(stats))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Handle onto the worker pool. Cheap to clone.
#[derive(Clone)]
pub struct Boundary {
    handle: Handle,
    stats: Arc<Stats>,
}

impl Boundary {
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            stats: Arc::default(),
        }
    }

    /// Boundary on the runtime the caller is currently inside.
    ///
    /// Panics outside a tokio runtime, like [`Handle::current`].
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    /// Total engine calls ever handed to a worker.
    pub fn dispatched(&self) -> u64 {
        self.stats.dispatched.load(Ordering::SeqCst)
    }

    /// Engine calls currently running on a worker.
    pub fn in_flight(&self) -> usize {
        self.stats.in_flight.load(Ordering::SeqCst)
    }

    /// Run a blocking engine call on a worker thread and wait for it.
    ///
    /// A panic inside `work` is caught and returned as an [`EngineError`].
    pub async fn run_blocking<T, F>(&self, id: InvocationId, work: F) -> std::result::Result<T, EngineError>
    where
        F: FnOnce() -> std::result::Result<T, EngineError> + Send + 'static,
        T: Send + 'static,
    {
        let _guard = InFlight::enter(&self.stats);
        let started = Instant::now();
        debug!(invocation = %id, "engine call dispatched to worker");

        let joined = self.handle.spawn_blocking(work).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match joined {
            Ok(outcome) => {
                debug!(invocation = %id, elapsed_ms, ok = outcome.is_ok(), "engine call completed");
                outcome
            }
            Err(e) if e.is_panic() => {
                error!(invocation = %id, elapsed_ms, "engine call panicked");
                Err(panic_to_engine_error(e.into_panic()))
            }
            Err(e) => {
                error!(invocation = %id, elapsed_ms, error = %e, "engine worker cancelled");
                Err(EngineError(format!("engine worker was cancelled: {e}")))
            }
        }
    }

    /// Drive `task` to completion on the runtime without blocking the caller.
    pub fn spawn<F>(&self, task: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.handle.spawn(task);
    }
}

/// The not-yet-delivered reply of one invocation.
///
/// Delivering consumes it. If it is dropped undelivered (the runtime shut down
/// mid-call) a `BRIDGE_ERROR` is posted instead, so the host always receives
/// exactly one response.
pub struct PendingReply {
    id: InvocationId,
    method: String,
    reply: Option<Reply>,
    context: Arc<dyn CallingContext>,
}

impl PendingReply {
    pub fn new(
        id: InvocationId,
        method: impl Into<String>,
        reply: Reply,
        context: Arc<dyn CallingContext>,
    ) -> Self {
        Self {
            id,
            method: method.into(),
            reply: Some(reply),
            context,
        }
    }

    /// Post `response` to the calling context.
    pub fn send(mut self, response: MethodResponse) {
        self.deliver(response);
    }

    fn deliver(&mut self, response: MethodResponse) {
        if let Some(reply) = self.reply.take() {
            debug!(invocation = %self.id, method = %self.method, "posting reply to calling context");
            self.context.post(Box::new(move || reply(response)));
        }
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        if self.reply.is_some() {
            warn!(invocation = %self.id, method = %self.method, "invocation abandoned before completion");
            self.deliver(
                BridgeError::Bridge("invocation abandoned before the engine call completed".into())
                    .into(),
            );
        }
    }
}

/// Signals the thread owning a [`MainLoop`] that a reply is waiting.
pub type Waker = Arc<dyn Fn() + Send + Sync>;

/// Create a channel-backed calling context.
///
/// The [`MainQueue`] half is given to the bridge; the [`MainLoop`] half stays
/// on the UI thread, which runs delivered replies by draining it. Without a
/// waker the owner must poll (`run_next`).
pub fn main_queue() -> (MainQueue, MainLoop) {
    let (tx, rx) = mpsc::channel();
    (MainQueue { tx, waker: None }, MainLoop { rx })
}

/// Like [`main_queue`], but `waker` runs after every post so the owning
/// event loop can drain without polling.
pub fn main_queue_with_waker(waker: Waker) -> (MainQueue, MainLoop) {
    let (tx, rx) = mpsc::channel();
    (MainQueue { tx, waker: Some(waker) }, MainLoop { rx })
}

/// Posting side of [`main_queue`].
pub struct MainQueue {
    tx: mpsc::Sender<Job>,
    waker: Option<Waker>,
}

impl CallingContext for MainQueue {
    fn post(&self, job: Job) {
        if self.tx.send(job).is_err() {
            warn!("main loop has shut down; reply dropped");
            return;
        }
        if let Some(wake) = &self.waker {
            wake();
        }
    }
}

/// Draining side of [`main_queue`]; owned by the UI thread.
pub struct MainLoop {
    rx: mpsc::Receiver<Job>,
}

impl MainLoop {
    /// Run every reply already queued. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.rx.try_recv() {
            job();
            ran += 1;
        }
        ran
    }

    /// Wait up to `timeout` for the next reply and run it.
    pub fn run_next(&self, timeout: Duration) -> bool {
        match self.rx.recv_timeout(timeout) {
            Ok(job) => {
                job();
                true
            }
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::thread;

    use super::*;

    #[tokio::test]
    async fn work_runs_off_the_calling_thread() {
        let boundary = Boundary::current();
        let caller = thread::current().id();
        let worker = boundary
            .run_blocking(InvocationId::new(), || Ok(thread::current().id()))
            .await
            .unwrap();
        assert_ne!(caller, worker);
        assert_eq!(boundary.dispatched(), 1);
        assert_eq!(boundary.in_flight(), 0);
    }

    #[tokio::test]
    async fn panics_become_engine_errors() {
        let boundary = Boundary::current();
        let outcome: std::result::Result<(), _> = boundary
            .run_blocking(InvocationId::new(), || panic!("limb overflow"))
            .await;
        let err = outcome.unwrap_err();
        assert!(err.message().contains("limb overflow"));
        assert_eq!(boundary.in_flight(), 0);
    }

    #[test]
    fn main_loop_runs_replies_on_its_own_thread() {
        let (queue, main_loop) = main_queue();
        let ran_on = Arc::new(Mutex::new(None));

        let slot = Arc::clone(&ran_on);
        thread::spawn(move || {
            queue.post(Box::new(move || {
                *slot.lock().unwrap() = Some(thread::current().id());
            }));
        })
        .join()
        .unwrap();

        assert!(main_loop.run_next(Duration::from_secs(1)));
        assert_eq!(*ran_on.lock().unwrap(), Some(thread::current().id()));
        assert_eq!(main_loop.run_pending(), 0);
    }

    #[test]
    fn waker_fires_once_per_reply() {
        let (tx, rx) = mpsc::channel::<()>();
        let tx = Mutex::new(tx);
        let waker: Waker = Arc::new(move || {
            let _ = tx.lock().unwrap().send(());
        });
        let (queue, main_loop) = main_queue_with_waker(waker);

        let ran = Arc::new(AtomicUsize::new(0));
        let worker = {
            let ran = Arc::clone(&ran);
            thread::spawn(move || {
                for _ in 0..3 {
                    let ran = Arc::clone(&ran);
                    queue.post(Box::new(move || {
                        ran.fetch_add(1, Ordering::SeqCst);
                    }));
                }
            })
        };

        // Drain only when woken, the way an event loop would.
        for _ in 0..3 {
            rx.recv_timeout(Duration::from_secs(5)).unwrap();
            main_loop.run_pending();
        }
        worker.join().unwrap();
        assert_eq!(ran.load(Ordering::SeqCst), 3);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dropped_reply_still_answers() {
        let (queue, main_loop) = main_queue();
        let got = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&got);
        let pending = PendingReply::new(
            InvocationId::new(),
            "proveZkEmail",
            Box::new(move |resp| *slot.lock().unwrap() = Some(resp)),
            Arc::new(queue),
        );
        drop(pending);

        assert_eq!(main_loop.run_pending(), 1);
        let resp = got.lock().unwrap().take().unwrap();
        assert_eq!(resp.error_code(), Some("BRIDGE_ERROR"));
    }

    #[test]
    fn sent_reply_is_delivered_once() {
        let (queue, main_loop) = main_queue();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let pending = PendingReply::new(
            InvocationId::new(),
            "getPlatformVersion",
            Box::new(move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            }),
            Arc::new(queue),
        );
        pending.send(MethodResponse::NotImplemented);

        assert_eq!(main_loop.run_pending(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn owned_runtime_runs_blocking_work() {
        let runtime = build_runtime(&BridgeConfig::default()).unwrap();
        let boundary = Boundary::new(runtime.handle().clone());
        let value = runtime
            .block_on(boundary.run_blocking(InvocationId::new(), || Ok(7u8)))
            .unwrap();
        assert_eq!(value, 7);
    }
}
