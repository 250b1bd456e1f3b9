// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! zkEmail bridge — asynchronous proof invocation between a host UI and a
//! native proving engine.
//!
//! One dispatch loop ([`dispatch::Bridge`]) serves every host platform. The
//! platform modules only supply the host queries ([`traits::HostPlatform`])
//! and the context replies are posted to ([`traits::CallingContext`]).

pub mod boundary;
pub mod codec;
pub mod dispatch;
pub mod fingerprint;
pub mod normalize;
pub mod traits;

#[cfg(target_os = "ios")]
pub mod ios;

#[cfg(target_os = "android")]
pub mod android;

#[cfg(not(any(target_os = "ios", target_os = "android")))]
pub mod stub;

use std::sync::Arc;

use zkemail_core::BridgeConfig;
use zkemail_core::error::Result;

pub use boundary::{Boundary, MainLoop, Reply, Waker};
pub use dispatch::{Bridge, MethodCallHandler};
pub use traits::{CallingContext, EngineError, HostPlatform, ProvingEngine};

/// Retrieves the host platform implementation for the target operating system.
pub fn host_platform() -> Arc<dyn HostPlatform> {
    #[cfg(target_os = "ios")]
    {
        // iOS: UIDevice / NSFileManager through objc2.
        Arc::new(ios::IosPlatform::new())
    }
    #[cfg(target_os = "android")]
    {
        // Android: Build.VERSION / Context through jni-rs.
        Arc::new(android::AndroidPlatform::new())
    }
    #[cfg(not(any(target_os = "ios", target_os = "android")))]
    {
        // DESKTOP/CI: answered from the process environment.
        Arc::new(stub::StubPlatform)
    }
}

/// A bridge wired for the current platform.
pub struct Registration {
    pub bridge: Bridge,
    /// Present when the host's UI thread must drain replies itself (desktop).
    /// iOS posts to the main dispatch queue and Android drains on the main
    /// Looper, so both leave this empty.
    pub main_loop: Option<MainLoop>,
}

/// Build a bridge for the current platform around `engine`.
///
/// Starts the worker runtime sized by `config`. On Android this must run on
/// the main thread so replies can be attached to its Looper.
pub fn register(engine: Arc<dyn ProvingEngine>, config: &BridgeConfig) -> Result<Registration> {
    let runtime = boundary::build_runtime(config)?;
    let platform = host_platform();

    #[cfg(target_os = "ios")]
    let (context, main_loop): (Arc<dyn CallingContext>, Option<MainLoop>) =
        (Arc::new(ios::MainDispatchQueue), None);

    #[cfg(target_os = "android")]
    let (context, main_loop): (Arc<dyn CallingContext>, Option<MainLoop>) =
        (Arc::new(android::main_looper_context()?), None);

    #[cfg(not(any(target_os = "ios", target_os = "android")))]
    let (context, main_loop): (Arc<dyn CallingContext>, Option<MainLoop>) = {
        let (queue, main_loop) = boundary::main_queue();
        (Arc::new(queue), Some(main_loop))
    };

    tracing::info!(
        channel = %config.channel_name,
        platform = %platform.platform_version(),
        "zkEmail bridge registered"
    );

    Ok(Registration {
        bridge: Bridge::with_runtime(platform, engine, runtime, context),
        main_loop,
    })
}
