// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for the zkEmail bridge.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for all bridge operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    // -- Invocation errors --
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("proving engine failed: {0}")]
    EngineFailure(String),

    #[error("method not implemented: {0}")]
    UnsupportedMethod(String),

    // -- Host resources --
    #[error("could not resolve documents directory: {0}")]
    DirectoryResolution(String),

    #[error("fixture not found: {}", .0.display())]
    FixtureMissing(PathBuf),

    #[error("fixture {} is malformed: {reason}", path.display())]
    FixtureMalformed { path: PathBuf, reason: String },

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -- Platform bridge --
    #[error("platform bridge error: {0}")]
    Bridge(String),

    #[error("feature not available on this platform")]
    PlatformUnavailable,
}

impl BridgeError {
    /// Error code sent to the host alongside a boundary-level failure.
    ///
    /// Codes are stable; host code switches on them.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArguments(_) => "INVALID_ARGUMENTS",
            Self::EngineFailure(_) => "ENGINE_FAILURE",
            Self::UnsupportedMethod(_) => "NOT_IMPLEMENTED",
            Self::DirectoryResolution(_) => "DIR_ERROR",
            Self::FixtureMissing(_) | Self::FixtureMalformed { .. } => "FIXTURE_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Bridge(_) => "BRIDGE_ERROR",
            Self::PlatformUnavailable => "PLATFORM_UNAVAILABLE",
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BridgeError>;
