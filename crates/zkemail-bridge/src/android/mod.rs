// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Android platform bridge via JNI.
//
// Requires the Android NDK and targets `aarch64-linux-android` or
// `armv7-linux-androideabi`. Platform queries call into the ART runtime
// through JNI.
//
// ## Architecture notes
//
// `MethodChannel.Result` must be completed on the main Looper. Replies go
// through the channel-backed calling context (`boundary::main_queue_with_waker`);
// the waker writes a byte to a socket pair whose read end is registered with
// the main thread's `ALooper`. The Looper callback drains the `MainLoop`, so
// replies are delivered as soon as they are posted, with no polling.
//
// `main_looper_context` must therefore be called on the main thread, which is
// where Flutter calls `onAttachedToEngine`.

#![cfg(target_os = "android")]

use std::io::{Read, Write};
use std::os::fd::{AsRawFd, BorrowedFd};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::sync::Arc;

use jni::JNIEnv;
use jni::objects::{JObject, JString, JValue};
use ndk::looper::{FdEvent, ForeignLooper};

use zkemail_core::error::{BridgeError, Result};

use crate::boundary::{self, MainQueue, Waker};
use crate::traits::HostPlatform;

// ---------------------------------------------------------------------------
// JNI bootstrap helpers
// ---------------------------------------------------------------------------

/// Run `f` with a [`JNIEnv`] attached to the current thread.
///
/// Calls `ndk_context::android_context()` to retrieve the `JavaVM*` pointer
/// set by the NDK glue code, then attaches the current thread for the
/// duration of `f`.
fn with_env<T>(f: impl FnOnce(&mut JNIEnv) -> Result<T>) -> Result<T> {
    let ctx = ndk_context::android_context();
    // SAFETY: `ctx.vm()` returns the `JavaVM*` set by the NDK glue code.
    // The pointer is guaranteed valid for the lifetime of the process.
    let vm = unsafe { jni::JavaVM::from_raw(ctx.vm().cast()) }
        .map_err(|e| BridgeError::Bridge(format!("failed to obtain JavaVM: {e}")))?;
    let mut guard = vm
        .attach_current_thread()
        .map_err(|e| BridgeError::Bridge(format!("failed to attach JNI thread: {e}")))?;
    f(&mut *guard)
}

/// Obtain the hosting Android `Context` as a [`JObject`].
fn context() -> Result<JObject<'static>> {
    let ptr = ndk_context::android_context().context();
    if ptr.is_null() {
        return Err(BridgeError::Bridge(
            "Android context is null; plugin not attached to an engine".into(),
        ));
    }
    // SAFETY: the NDK guarantees this pointer is a valid global jobject for
    // the hosting application context.
    Ok(unsafe { JObject::from_raw(ptr.cast()) })
}

/// Convenience: map any `jni::errors::Error` into `BridgeError::Bridge`.
fn jni_err(context: &str, e: jni::errors::Error) -> BridgeError {
    BridgeError::Bridge(format!("{context}: {e}"))
}

/// Read a `java.lang.String` object into a Rust string.
fn read_string(env: &mut JNIEnv, obj: JObject) -> Result<String> {
    let jstr = JString::from(obj);
    let s: String = env
        .get_string(&jstr)
        .map_err(|e| jni_err("get_string", e))?
        .into();
    Ok(s)
}

// ---------------------------------------------------------------------------
// Main Looper delivery
// ---------------------------------------------------------------------------

/// Calling context whose replies run on the current thread's Looper.
///
/// Must be called on the main thread. The Looper keeps the drain callback
/// (and with it the `MainLoop`) for the life of the process.
pub fn main_looper_context() -> Result<MainQueue> {
    let looper = ForeignLooper::for_thread().ok_or_else(|| {
        BridgeError::Bridge("no Looper on this thread; register from the main thread".into())
    })?;

    let (wake_tx, wake_rx) = UnixStream::pair()?;
    wake_tx.set_nonblocking(true)?;
    wake_rx.set_nonblocking(true)?;

    // A full socket buffer already holds a pending wake-up.
    let waker: Waker = Arc::new(move || {
        let _ = (&wake_tx).write(&[1]);
    });
    let (queue, main_loop) = boundary::main_queue_with_waker(waker);

    let raw = wake_rx.as_raw_fd();
    // SAFETY: `wake_rx` is moved into the callback below, which the Looper
    // holds for as long as the fd stays registered, so the fd outlives it.
    let fd = unsafe { BorrowedFd::borrow_raw(raw) };
    looper
        .add_fd_with_callback(fd, FdEvent::INPUT, move |_fd, _events| {
            let mut buf = [0u8; 64];
            while matches!((&wake_rx).read(&mut buf), Ok(n) if n > 0) {}
            let ran = main_loop.run_pending();
            tracing::trace!(ran, "drained replies on main Looper");
            true
        })
        .map_err(|e| BridgeError::Bridge(format!("ALooper_addFd: {e}")))?;

    tracing::debug!("reply delivery attached to main Looper");
    Ok(queue)
}

// ---------------------------------------------------------------------------
// Host platform
// ---------------------------------------------------------------------------

/// Android implementation of the host platform queries.
///
/// The struct is zero-sized; all state lives on the Java side.
pub struct AndroidPlatform;

impl AndroidPlatform {
    /// Create a new Android platform.
    ///
    /// This does **not** touch JNI; the first JNI call happens lazily when
    /// a query is made.
    pub fn new() -> Self {
        Self
    }

    fn release() -> Result<String> {
        with_env(|env| {
            let release = env
                .get_static_field("android/os/Build$VERSION", "RELEASE", "Ljava/lang/String;")
                .map_err(|e| jni_err("Build.VERSION.RELEASE", e))?
                .l()
                .map_err(|e| jni_err("RELEASE->l", e))?;
            read_string(env, release)
        })
    }
}

impl Default for AndroidPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl HostPlatform for AndroidPlatform {
    /// `"Android " + Build.VERSION.RELEASE`.
    fn platform_version(&self) -> String {
        match Self::release() {
            Ok(release) => format!("Android {release}"),
            Err(e) => {
                tracing::warn!(error = %e, "could not read Build.VERSION.RELEASE");
                "Android".into()
            }
        }
    }

    /// `context.getExternalFilesDir(null)?.absolutePath`.
    ///
    /// Returns `Ok(None)` when external storage is not currently mounted.
    fn documents_directory(&self) -> Result<Option<PathBuf>> {
        let context = context()?;
        with_env(|env| {
            let null = JObject::null();
            let dir = env
                .call_method(
                    &context,
                    "getExternalFilesDir",
                    "(Ljava/lang/String;)Ljava/io/File;",
                    &[JValue::Object(&null)],
                )
                .and_then(|v| v.l())
                .map_err(|e| {
                    BridgeError::DirectoryResolution(format!("getExternalFilesDir: {e}"))
                })?;

            if dir.is_null() {
                tracing::info!("Android: external files dir unavailable");
                return Ok(None);
            }

            let path = env
                .call_method(&dir, "getAbsolutePath", "()Ljava/lang/String;", &[])
                .and_then(|v| v.l())
                .map_err(|e| BridgeError::DirectoryResolution(format!("getAbsolutePath: {e}")))?;
            Ok(Some(PathBuf::from(read_string(env, path)?)))
        })
    }
}
