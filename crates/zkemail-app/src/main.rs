// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// zkemail-demo — drives one prove/verify round through the bridge.
//
// Usage: zkemail-demo [ASSETS_DIR] [DATA_DIR]
//
// ASSETS_DIR holds the bundled `srs.local` and `zkemail_input.json`
// (default: ./assets). DATA_DIR defaults to the platform data directory.

mod services;
mod state;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use zkemail_bridge::stub::UnlinkedEngine;
use zkemail_core::error::Result;
use zkemail_core::types::Method;
use zkemail_core::value::Value;

use services::app_services::AppServices;
use services::data_dir;
use state::SessionSnapshot;

/// Upper bound on a single engine round trip.
const ROUND_TRIP: Duration = Duration::from_secs(600);
const QUERY: Duration = Duration::from_secs(5);

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("zkemail-demo starting");

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(code = e.code(), error = %e, "demo failed");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let mut args = std::env::args_os().skip(1);
    let assets_dir = args.next().map_or_else(|| PathBuf::from("assets"), PathBuf::from);
    let data_dir = match args.next() {
        Some(dir) => PathBuf::from(dir),
        None => data_dir::data_dir()?,
    };

    let svc = AppServices::init(
        &data_dir,
        &assets_dir,
        Arc::new(UnlinkedEngine),
        Box::new(report),
    )?;

    tracing::info!(channel = %svc.config().channel_name, "bridge ready");

    for method in [Method::PlatformVersion, Method::DocumentsDirectory] {
        match svc.query(method, QUERY) {
            Some(resp) => {
                let shown = resp.value().map_or(serde_json::Value::Null, Value::to_json);
                tracing::info!(%method, success = resp.is_success(), value = %shown, "host query");
            }
            None => tracing::warn!(%method, "host query timed out"),
        }
    }

    svc.generate_proof();
    svc.wait_idle(ROUND_TRIP);

    // Refused with a status update when proving did not produce a proof.
    svc.verify_proof();
    svc.wait_idle(ROUND_TRIP);

    let done = svc.snapshot();
    tracing::info!(
        has_proof = done.has_proof,
        proof = done.proof_summary.as_deref().unwrap_or("-"),
        verification = done.verification.as_deref().unwrap_or("-"),
        "round complete"
    );
    Ok(())
}

fn report(snap: &SessionSnapshot) {
    tracing::info!(
        stage = ?snap.stage,
        proving_ms = snap.proving_time.map(|t| t.num_milliseconds()),
        verifying_ms = snap.verification_time.map(|t| t.num_milliseconds()),
        at = %snap.updated_at.format("%H:%M:%S%.3f"),
        "{}",
        snap.status
    );
}
