// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bridge configuration.

use serde::{Deserialize, Serialize};

/// Persistent bridge settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Name of the host method channel the bridge is registered under.
    pub channel_name: String,
    /// File name of the bundled setup reference string.
    pub srs_file_name: String,
    /// File name of the bundled example proof inputs.
    pub inputs_file_name: String,
    /// Upper bound on worker threads available for engine calls.
    pub max_blocking_threads: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            channel_name: "zkemail_flutter_package".into(),
            srs_file_name: "srs.local".into(),
            inputs_file_name: "zkemail_input.json".into(),
            max_blocking_threads: 4,
        }
    }
}
