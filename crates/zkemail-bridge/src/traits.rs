// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic trait definitions at the bridge seams.
//
// The proving engine, the host platform queries and the calling-context
// executor are each supplied from outside the bridge core. The dispatch loop
// and async boundary only ever see these traits.

use std::path::PathBuf;

use thiserror::Error;
use zkemail_core::error::Result;
use zkemail_core::types::ProofInputs;

/// Failure raised by the native proving engine.
///
/// Carries the engine's human-readable message verbatim; the normalizer copies
/// it into the `error` field of the response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct EngineError(pub String);

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

/// The external zero-knowledge proving engine.
///
/// Implementations are stateless per call and may block for seconds; the
/// bridge only ever calls them from a worker thread.
pub trait ProvingEngine: Send + Sync {
    /// Generate a proof from the setup reference string at `srs_path`.
    fn prove(&self, srs_path: &str, inputs: &ProofInputs) -> std::result::Result<Vec<u8>, EngineError>;

    /// Check `proof` against the setup reference string at `srs_path`.
    /// `Ok(false)` means the engine ran and rejected the proof.
    fn verify(&self, srs_path: &str, proof: &[u8]) -> std::result::Result<bool, EngineError>;
}

/// Host operating system queries answered without touching the engine.
pub trait HostPlatform: Send + Sync {
    /// Human-readable platform version (e.g. "iOS 17.4", "Android 14").
    fn platform_version(&self) -> String;

    /// The application's documents directory.
    ///
    /// `Ok(None)` when the platform has no such directory mounted;
    /// `Err(BridgeError::DirectoryResolution)` when the lookup itself failed.
    fn documents_directory(&self) -> Result<Option<PathBuf>>;
}

/// A unit of work to run on the calling context.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// The context a host call originated on (normally the UI thread).
///
/// The bridge posts every reply through this so results are delivered on the
/// same context that issued the request.
pub trait CallingContext: Send + Sync {
    /// Queue `job` to run on the calling context. Must not run it inline on a
    /// worker thread.
    fn post(&self, job: Job);
}
