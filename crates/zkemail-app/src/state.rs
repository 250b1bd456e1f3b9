// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Proving session state, driven by bridge responses.

use chrono::{DateTime, TimeDelta, Utc};

use zkemail_bridge::fingerprint::short_fingerprint;
use zkemail_core::types::{MethodResponse, ProofResult, VerifyResult};

/// What the session is currently waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// No invocation in flight.
    Idle,
    /// A prove call has been dispatched.
    GeneratingProof,
    /// A verify call has been dispatched.
    VerifyingProof,
}

/// Point-in-time view handed to the update callback.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub stage: Stage,
    /// Human-readable status line.
    pub status: String,
    /// Outcome of the last prove call.
    pub proof_summary: Option<String>,
    /// Outcome of the last verify call.
    pub verification: Option<String>,
    pub proving_time: Option<TimeDelta>,
    pub verification_time: Option<TimeDelta>,
    pub has_proof: bool,
    pub updated_at: DateTime<Utc>,
}

/// Receives every status change of a [`Session`].
pub type UpdateFn = Box<dyn FnMut(&SessionSnapshot) + Send>;

/// One user's prove/verify session.
///
/// At most one invocation is in flight at a time; the proof from the last
/// successful prove is kept for verification. Status changes are queued as
/// snapshots and handed out by [`Session::take_updates`], so observers run
/// after whoever drives the session has let go of it.
pub struct Session {
    stage: Stage,
    status: String,
    proof: Option<Vec<u8>>,
    proof_summary: Option<String>,
    verification: Option<String>,
    proving_time: Option<TimeDelta>,
    verification_time: Option<TimeDelta>,
    started_at: Option<DateTime<Utc>>,
    updates: Vec<SessionSnapshot>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            stage: Stage::Idle,
            status: "Ready".into(),
            proof: None,
            proof_summary: None,
            verification: None,
            proving_time: None,
            verification_time: None,
            started_at: None,
            updates: Vec::new(),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Snapshots queued since the last call, oldest first.
    pub fn take_updates(&mut self) -> Vec<SessionSnapshot> {
        std::mem::take(&mut self.updates)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            stage: self.stage,
            status: self.status.clone(),
            proof_summary: self.proof_summary.clone(),
            verification: self.verification.clone(),
            proving_time: self.proving_time,
            verification_time: self.verification_time,
            has_proof: self.proof.is_some(),
            updated_at: Utc::now(),
        }
    }

    // -- Proof generation ----------------------------------------------------

    /// Enter `GeneratingProof`. Returns `false` if another call is in flight.
    pub fn begin_proof(&mut self) -> bool {
        if self.stage != Stage::Idle {
            return false;
        }
        self.stage = Stage::GeneratingProof;
        self.started_at = Some(Utc::now());
        self.proof_summary = None;
        self.proving_time = None;
        self.set_status("Generating proof... This may take some time");
        true
    }

    /// Apply the response to a prove call.
    pub fn finish_proof(&mut self, response: &MethodResponse) {
        if self.stage != Stage::GeneratingProof {
            tracing::warn!("prove response arrived outside GeneratingProof");
            return;
        }
        self.proving_time = self.elapsed();
        self.stage = Stage::Idle;

        match response.value().and_then(ProofResult::from_value) {
            Some(ProofResult::Generated(proof)) => {
                self.proof_summary = Some(format!(
                    "Proof generated: {} bytes ({})",
                    proof.len(),
                    short_fingerprint(&proof)
                ));
                self.proof = Some(proof);
                self.set_status("Proof generation completed");
            }
            Some(ProofResult::Failed(message)) => {
                self.proof_summary = Some(format!("Error: {message}"));
                self.set_status("Proof generation failed");
            }
            None => {
                self.proof_summary = Some(format!("Error: {}", describe(response)));
                self.set_status("Proof generation failed");
            }
        }
    }

    // -- Verification --------------------------------------------------------

    /// Enter `VerifyingProof` and hand back the proof to send.
    ///
    /// Returns `None` without changing stage when busy or when there is no
    /// proof to verify.
    pub fn begin_verify(&mut self) -> Option<Vec<u8>> {
        if self.stage != Stage::Idle {
            return None;
        }
        let Some(proof) = self.proof.clone() else {
            self.verification = Some("No proof available".into());
            self.set_status("Please generate a proof first");
            return None;
        };
        self.stage = Stage::VerifyingProof;
        self.started_at = Some(Utc::now());
        self.verification = None;
        self.verification_time = None;
        self.set_status("Verifying proof...");
        Some(proof)
    }

    /// Apply the response to a verify call.
    pub fn finish_verify(&mut self, response: &MethodResponse) {
        if self.stage != Stage::VerifyingProof {
            tracing::warn!("verify response arrived outside VerifyingProof");
            return;
        }
        self.verification_time = self.elapsed();
        self.stage = Stage::Idle;

        match response.value().and_then(VerifyResult::from_value) {
            Some(VerifyResult::Checked(true)) => {
                self.verification = Some("Valid".into());
                self.set_status("Proof verified successfully!");
            }
            Some(VerifyResult::Checked(false)) => {
                self.verification = Some("Invalid".into());
                self.set_status("Proof verification failed!");
            }
            Some(VerifyResult::Failed(message)) => {
                self.verification = Some(format!("Error: {message}"));
                self.set_status("Proof verification error");
            }
            None => {
                self.verification = Some(format!("Error: {}", describe(response)));
                self.set_status("Proof verification error");
            }
        }
    }

    fn elapsed(&mut self) -> Option<TimeDelta> {
        self.started_at.take().map(|t| Utc::now() - t)
    }

    fn set_status(&mut self, status: &str) {
        self.status = status.to_owned();
        let snapshot = self.snapshot();
        self.updates.push(snapshot);
    }
}

/// Text for a response that carried no result map.
fn describe(response: &MethodResponse) -> String {
    match response {
        MethodResponse::Error { code, message, .. } => format!("{code}: {message}"),
        MethodResponse::NotImplemented => "method not implemented".into(),
        MethodResponse::Success(_) => "unexpected reply shape".into(),
    }
}
