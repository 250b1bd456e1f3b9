// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Result/error normalizer.
//
// Engine outcomes (including panics caught at the worker boundary) become a
// populated `ProofResult` / `VerifyResult`. Validation failures never come
// through here: they are returned as boundary-level errors by the dispatch
// loop before any engine call.

use std::any::Any;

use tracing::{info, warn};
use zkemail_core::types::{InvocationId, ProofResult, VerifyResult};

use crate::fingerprint::short_fingerprint;
use crate::traits::EngineError;

/// Message used when the engine reports success but hands back no bytes.
pub const EMPTY_PROOF: &str = "proving engine returned an empty proof";

/// Wrap a prove outcome.
///
/// An empty proof is reported as a failure so that a successful result always
/// carries non-empty bytes.
pub fn proof_result(id: InvocationId, outcome: Result<Vec<u8>, EngineError>) -> ProofResult {
    match outcome {
        Ok(bytes) if bytes.is_empty() => {
            warn!(invocation = %id, "{EMPTY_PROOF}");
            ProofResult::Failed(EMPTY_PROOF.into())
        }
        Ok(bytes) => {
            info!(
                invocation = %id,
                bytes = bytes.len(),
                fingerprint = %short_fingerprint(&bytes),
                "proof generated"
            );
            ProofResult::Generated(bytes)
        }
        Err(e) => {
            warn!(invocation = %id, error = %e, "proof generation failed");
            ProofResult::Failed(e.0)
        }
    }
}

/// Wrap a verify outcome.
pub fn verify_result(id: InvocationId, outcome: Result<bool, EngineError>) -> VerifyResult {
    match outcome {
        Ok(valid) => {
            info!(invocation = %id, valid, "proof verified");
            VerifyResult::Checked(valid)
        }
        Err(e) => {
            warn!(invocation = %id, error = %e, "proof verification failed to run");
            VerifyResult::Failed(e.0)
        }
    }
}

/// Turn a panic payload from the engine into an engine failure.
pub fn panic_to_engine_error(payload: Box<dyn Any + Send>) -> EngineError {
    let detail = if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_owned()
    };
    EngineError(format!("proving engine panicked: {detail}"))
}
