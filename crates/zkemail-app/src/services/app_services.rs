// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Central service layer: prepares fixtures, registers the bridge and drives
// the session from its replies.
//
// Replies are posted to the main loop and applied to the session on the
// thread that drains it, so the session sits behind a plain `Mutex`. Update
// callbacks run only after that lock is released.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use zkemail_bridge::{Bridge, MainLoop, MethodCallHandler, ProvingEngine};
use zkemail_core::BridgeConfig;
use zkemail_core::error::{BridgeError, Result};
use zkemail_core::types::{Method, MethodCall, MethodResponse, ProofInputs};
use zkemail_core::value::Value;

use super::fixtures;
use crate::state::{Session, SessionSnapshot, Stage, UpdateFn};

const CONFIG_FILE: &str = "config.json";

/// Delivers queued session snapshots to the update callback.
///
/// A callback that re-enters the services (to read a snapshot or start the
/// next call) has its own updates delivered by the outer delivery loop.
struct Notifier {
    callback: Mutex<Option<UpdateFn>>,
    queue: Mutex<VecDeque<SessionSnapshot>>,
}

impl Notifier {
    fn new(callback: UpdateFn) -> Self {
        Self {
            callback: Mutex::new(Some(callback)),
            queue: Mutex::new(VecDeque::new()),
        }
    }

    fn publish(&self, updates: Vec<SessionSnapshot>) {
        self.queue.lock().expect("update queue poisoned").extend(updates);
        loop {
            // Whoever holds the callback is already delivering.
            let Some(mut callback) = self.callback.lock().expect("callback lock poisoned").take()
            else {
                return;
            };
            while let Some(snapshot) = self.next() {
                callback(&snapshot);
            }
            *self.callback.lock().expect("callback lock poisoned") = Some(callback);
            // Another thread may have queued while the callback was out.
            if self.queue.lock().expect("update queue poisoned").is_empty() {
                return;
            }
        }
    }

    fn next(&self) -> Option<SessionSnapshot> {
        self.queue.lock().expect("update queue poisoned").pop_front()
    }
}

/// Apply `f` to the session, then notify once the lock is released.
fn with_session<R>(
    session: &Mutex<Session>,
    notifier: &Notifier,
    f: impl FnOnce(&mut Session) -> R,
) -> R {
    let (out, updates) = {
        let mut guard = session.lock().expect("session lock poisoned");
        let out = f(&mut guard);
        (out, guard.take_updates())
    };
    notifier.publish(updates);
    out
}

pub struct AppServices {
    bridge: Bridge,
    main_loop: MainLoop,
    session: Arc<Mutex<Session>>,
    notifier: Arc<Notifier>,
    data_dir: PathBuf,
    config: BridgeConfig,
    srs_path: PathBuf,
    inputs: ProofInputs,
}

impl AppServices {
    /// Initialise all services.  Call once at startup.
    ///
    /// Loads the persisted config, mirrors the bundled fixtures from
    /// `assets_dir` into `<data_dir>/files` and registers the bridge.
    pub fn init(
        data_dir: &Path,
        assets_dir: &Path,
        engine: Arc<dyn ProvingEngine>,
        on_update: UpdateFn,
    ) -> Result<Self> {
        info!(path = %data_dir.display(), "initialising app services");

        let config = load_config(data_dir).unwrap_or_default();

        let files_dir = data_dir.join("files");
        let srs_path = fixtures::prepare_srs(assets_dir, &files_dir, &config)?;
        let inputs = fixtures::prepare_inputs(assets_dir, &files_dir, &config)?;

        let registration = zkemail_bridge::register(engine, &config)?;
        let main_loop = registration
            .main_loop
            .ok_or(BridgeError::PlatformUnavailable)?;

        info!(srs = %srs_path.display(), "app services initialised");

        Ok(Self {
            bridge: registration.bridge,
            main_loop,
            session: Arc::new(Mutex::new(Session::new())),
            notifier: Arc::new(Notifier::new(on_update)),
            data_dir: data_dir.to_path_buf(),
            config,
            srs_path,
            inputs,
        })
    }

    // -- Config --------------------------------------------------------------

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Update and persist the config. Takes effect on the next start.
    #[allow(dead_code)]
    pub fn save_config(&mut self, config: BridgeConfig) -> Result<()> {
        persist_config(&self.data_dir, &config)?;
        self.config = config;
        Ok(())
    }

    // -- Session -------------------------------------------------------------

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.lock().expect("session lock poisoned").snapshot()
    }

    /// Start proof generation over the prepared fixtures.
    ///
    /// Returns `false` if another invocation is already in flight.
    pub fn generate_proof(&self) -> bool {
        if !with_session(&self.session, &self.notifier, Session::begin_proof) {
            return false;
        }

        let inputs = self
            .inputs
            .iter()
            .map(|(key, elements)| {
                let list = elements.iter().map(|e| Value::from(e.as_str())).collect();
                (key.clone(), Value::List(list))
            })
            .collect();
        let arguments = Value::map([
            ("srsPath", Value::from(self.srs_path.display().to_string())),
            ("inputs", Value::Map(inputs)),
        ]);

        let session = Arc::clone(&self.session);
        let notifier = Arc::clone(&self.notifier);
        self.bridge.on_method_call(
            MethodCall::new(Method::Prove.name(), arguments),
            Box::new(move |resp| with_session(&session, &notifier, |s| s.finish_proof(&resp))),
        );
        true
    }

    /// Verify the proof held by the session.
    ///
    /// Returns `false` when busy or when no proof has been generated yet.
    pub fn verify_proof(&self) -> bool {
        let Some(proof) = with_session(&self.session, &self.notifier, Session::begin_verify)
        else {
            return false;
        };

        let arguments = Value::map([
            ("srsPath", Value::from(self.srs_path.display().to_string())),
            ("proof", Value::Bytes(proof)),
        ]);

        let session = Arc::clone(&self.session);
        let notifier = Arc::clone(&self.notifier);
        self.bridge.on_method_call(
            MethodCall::new(Method::Verify.name(), arguments),
            Box::new(move |resp| with_session(&session, &notifier, |s| s.finish_verify(&resp))),
        );
        true
    }

    /// Drain replies until the session is idle again.
    ///
    /// Returns `false` if `timeout` passed first.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.session.lock().expect("session lock poisoned").stage() == Stage::Idle {
                return true;
            }
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                warn!("timed out waiting for the bridge");
                return false;
            }
            self.main_loop.run_next(left);
        }
    }

    // -- Host queries --------------------------------------------------------

    /// Issue an argument-less call and wait for its reply.
    pub fn query(&self, method: Method, timeout: Duration) -> Option<MethodResponse> {
        let slot = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&slot);
        self.bridge.on_method_call(
            MethodCall::new(method.name(), Value::Null),
            Box::new(move |resp| *sink.lock().expect("reply slot poisoned") = Some(resp)),
        );

        let deadline = Instant::now() + timeout;
        loop {
            if let Some(resp) = slot.lock().expect("reply slot poisoned").take() {
                return Some(resp);
            }
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return None;
            }
            self.main_loop.run_next(left);
        }
    }
}

// -- Config persistence (JSON file in data dir) ---------------------------------

fn load_config(data_dir: &Path) -> Option<BridgeConfig> {
    let path = data_dir.join(CONFIG_FILE);
    let data = std::fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&data) {
        Ok(config) => Some(config),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring unreadable config");
            None
        }
    }
}

fn persist_config(data_dir: &Path, config: &BridgeConfig) -> Result<()> {
    let path = data_dir.join(CONFIG_FILE);
    let json = serde_json::to_string_pretty(config)?;
    std::fs::create_dir_all(data_dir)?;
    std::fs::write(&path, json)?;
    Ok(())
}
