// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stub bridge for desktop/CI builds where native mobile APIs are unavailable.
//
// Platform queries are answered from the process environment. No proving
// engine ships with the bridge, so `UnlinkedEngine` fails every call; hosts
// inject their own `ProvingEngine`.

use std::path::PathBuf;

use zkemail_core::error::{BridgeError, Result};
use zkemail_core::types::ProofInputs;

use crate::traits::{EngineError, HostPlatform, ProvingEngine};

/// Host platform answered from the desktop environment.
pub struct StubPlatform;

impl HostPlatform for StubPlatform {
    fn platform_version(&self) -> String {
        format!(
            "Desktop {} {} (stub)",
            std::env::consts::OS,
            std::env::consts::ARCH
        )
    }

    fn documents_directory(&self) -> Result<Option<PathBuf>> {
        let home = std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .ok_or_else(|| {
                BridgeError::DirectoryResolution("neither HOME nor USERPROFILE is set".into())
            })?;
        let docs = PathBuf::from(home).join("Documents");
        Ok(docs.is_dir().then_some(docs))
    }
}

/// Engine placeholder used when no native prover is linked into the build.
pub struct UnlinkedEngine;

/// Message returned by every [`UnlinkedEngine`] call.
pub const UNLINKED: &str = "no native proving engine is linked into this build";

impl ProvingEngine for UnlinkedEngine {
    fn prove(&self, _srs_path: &str, _inputs: &ProofInputs) -> std::result::Result<Vec<u8>, EngineError> {
        tracing::warn!("ProvingEngine::prove called on unlinked engine");
        Err(EngineError::new(UNLINKED))
    }

    fn verify(&self, _srs_path: &str, _proof: &[u8]) -> std::result::Result<bool, EngineError> {
        tracing::warn!("ProvingEngine::verify called on unlinked engine");
        Err(EngineError::new(UNLINKED))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_version_names_os() {
        assert!(StubPlatform.platform_version().contains(std::env::consts::OS));
    }

    #[test]
    fn unlinked_engine_always_fails() {
        let err = UnlinkedEngine.verify("/tmp/srs.local", &[1]).unwrap_err();
        assert_eq!(err.message(), UNLINKED);
        assert!(UnlinkedEngine.prove("/tmp/srs.local", &ProofInputs::new()).is_err());
    }
}
