// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// zkEmail bridge — core types, wire values and error definitions shared by
// the bridge and host crates.

pub mod config;
pub mod error;
pub mod types;
pub mod value;

pub use config::BridgeConfig;
pub use error::BridgeError;
pub use types::*;
pub use value::Value;
