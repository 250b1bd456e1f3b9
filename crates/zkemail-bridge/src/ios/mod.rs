// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// iOS platform bridge via objc2 and libdispatch.
//
// Requires compilation with the iOS SDK (Xcode). This module is cfg-gated to
// `target_os = "ios"` and will not compile on other platforms.
//
// ## Threading
//
// The host plugin calls `Bridge::on_method_call` from the main thread.
// Replies are posted back with `dispatch_async_f` onto the main queue, the
// same hop `DispatchQueue.main.async` performs in Swift.
//
// ## Unsafe code
//
// 1. **libdispatch C FFI** (`dispatch_async_f`, `_dispatch_main_q`): the job
//    box is leaked into the dispatch context pointer and reclaimed exactly
//    once in `run_job`.
// 2. **Foundation message sends**: wrapped by objc2-foundation; the `unsafe`
//    blocks only cover methods objc2 marks unsafe.

#![cfg(target_os = "ios")]

use std::ffi::c_void;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;

use objc2::MainThreadMarker;
use objc2_foundation::{
    NSFileManager, NSProcessInfo, NSSearchPathDirectory, NSSearchPathDomainMask,
};
use objc2_ui_kit::UIDevice;

use zkemail_core::error::{BridgeError, Result};

use crate::traits::{CallingContext, HostPlatform, Job};

// ---------------------------------------------------------------------------
// libdispatch FFI
// ---------------------------------------------------------------------------

/// Opaque `dispatch_queue_s`.
#[repr(C)]
struct DispatchQueue {
    _private: [u8; 0],
}

unsafe extern "C" {
    /// The main queue object; `dispatch_get_main_queue()` is a macro over it.
    static _dispatch_main_q: DispatchQueue;

    fn dispatch_async_f(
        queue: *const DispatchQueue,
        context: *mut c_void,
        work: extern "C" fn(*mut c_void),
    );
}

/// Trampoline run by libdispatch on the main thread.
extern "C" fn run_job(context: *mut c_void) {
    // SAFETY: `context` was produced by `Box::into_raw` in
    // `MainDispatchQueue::post` and libdispatch invokes each work item once.
    let job = unsafe { Box::from_raw(context.cast::<Job>()) };
    if catch_unwind(AssertUnwindSafe(move || job())).is_err() {
        tracing::error!("reply callback panicked on the main queue");
    }
}

// ---------------------------------------------------------------------------
// Calling context
// ---------------------------------------------------------------------------

/// Posts replies onto the iOS main dispatch queue.
pub struct MainDispatchQueue;

impl CallingContext for MainDispatchQueue {
    fn post(&self, job: Job) {
        let context = Box::into_raw(Box::new(job)).cast::<c_void>();
        // SAFETY: `_dispatch_main_q` is a process-lifetime global owned by
        // libdispatch; `run_job` takes ownership of `context`.
        unsafe { dispatch_async_f(&raw const _dispatch_main_q, context, run_job) };
    }
}

// ---------------------------------------------------------------------------
// Host platform
// ---------------------------------------------------------------------------

/// iOS implementation of the host platform queries.
pub struct IosPlatform;

impl IosPlatform {
    pub fn new() -> Self {
        Self
    }
}

impl Default for IosPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl HostPlatform for IosPlatform {
    /// `"iOS " + UIDevice.current.systemVersion`.
    ///
    /// UIDevice is main-thread-only; off-main callers get the version from
    /// `NSProcessInfo` instead.
    fn platform_version(&self) -> String {
        if let Some(mtm) = MainThreadMarker::new() {
            let version = UIDevice::currentDevice(mtm).systemVersion();
            return format!("iOS {version}");
        }
        let v = NSProcessInfo::processInfo().operatingSystemVersion();
        format!("iOS {}.{}.{}", v.majorVersion, v.minorVersion, v.patchVersion)
    }

    /// `FileManager.default.url(for: .documentDirectory, in: .userDomainMask)`.
    fn documents_directory(&self) -> Result<Option<PathBuf>> {
        let manager = NSFileManager::defaultManager();
        // SAFETY: plain Foundation call with no borrowed arguments.
        let url = unsafe {
            manager.URLForDirectory_inDomain_appropriateForURL_create_error(
                NSSearchPathDirectory::DocumentDirectory,
                NSSearchPathDomainMask::UserDomainMask,
                None,
                false,
            )
        }
        .map_err(|e| BridgeError::DirectoryResolution(e.localizedDescription().to_string()))?;

        Ok(url.path().map(|p| PathBuf::from(p.to_string())))
    }
}
