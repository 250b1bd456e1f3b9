// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Dispatch loop — routes a named-method call to exactly one handler.
//
// Per invocation:
//
//   Received -> Validating -> InvalidArguments (boundary error, terminal)
//                          -> Validated -> Dispatched (worker)
//                                       -> EngineSuccess | EngineFailure
//
// Platform and directory queries answer without touching the worker pool.
// Prove and verify are validated on the calling thread, then handed to the
// async boundary. Every path ends in exactly one response.

use std::sync::Arc;

use tokio::runtime::Runtime;
use tracing::{debug, info, warn};
use zkemail_core::error::BridgeError;
use zkemail_core::types::{
    InvocationId, Method, MethodCall, MethodResponse, ProofRequest, VerifyRequest,
};
use zkemail_core::value::Value;

use crate::boundary::{Boundary, PendingReply, Reply};
use crate::codec;
use crate::normalize;
use crate::traits::{CallingContext, HostPlatform, ProvingEngine};

/// Entry point a host method channel calls into.
pub trait MethodCallHandler: Send + Sync {
    /// Handle `call` and deliver its single response through `reply` on the
    /// calling context.
    fn on_method_call(&self, call: MethodCall, reply: Reply);
}

/// Work left to do after routing and validation.
enum Routed {
    /// Already answered on the calling thread.
    Ready(MethodResponse),
    Prove(ProofRequest),
    Verify(VerifyRequest),
}

/// The bridge: one dispatch loop shared by every host platform.
pub struct Bridge {
    platform: Arc<dyn HostPlatform>,
    engine: Arc<dyn ProvingEngine>,
    boundary: Boundary,
    context: Arc<dyn CallingContext>,
    runtime: Option<Runtime>,
}

impl Drop for Bridge {
    /// Tear down an owned runtime without waiting for engine calls still on
    /// a worker. Their tasks are dropped, so each pending invocation is
    /// answered with `BRIDGE_ERROR`; the engine call itself runs on detached.
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            info!(in_flight = self.boundary.in_flight(), "shutting down bridge runtime");
            runtime.shutdown_background();
        }
    }
}

impl Bridge {
    /// Bridge on an existing runtime (`boundary`).
    pub fn new(
        platform: Arc<dyn HostPlatform>,
        engine: Arc<dyn ProvingEngine>,
        boundary: Boundary,
        context: Arc<dyn CallingContext>,
    ) -> Self {
        Self {
            platform,
            engine,
            boundary,
            context,
            runtime: None,
        }
    }

    /// Bridge that owns its worker runtime.
    pub fn with_runtime(
        platform: Arc<dyn HostPlatform>,
        engine: Arc<dyn ProvingEngine>,
        runtime: Runtime,
        context: Arc<dyn CallingContext>,
    ) -> Self {
        let boundary = Boundary::new(runtime.handle().clone());
        Self {
            platform,
            engine,
            boundary,
            context,
            runtime: Some(runtime),
        }
    }

    pub fn boundary(&self) -> &Boundary {
        &self.boundary
    }

    /// Handle a call and await its response.
    ///
    /// For hosts that are themselves async; the awaiting task plays the role
    /// of the calling context.
    pub async fn invoke(&self, call: MethodCall) -> MethodResponse {
        let id = InvocationId::new();
        match self.route(id, &call) {
            Routed::Ready(resp) => resp,
            Routed::Prove(req) => prove(id, Arc::clone(&self.engine), &self.boundary, req).await,
            Routed::Verify(req) => verify(id, Arc::clone(&self.engine), &self.boundary, req).await,
        }
    }

    fn route(&self, id: InvocationId, call: &MethodCall) -> Routed {
        debug!(invocation = %id, method = %call.method, "method call received");
        let Some(method) = Method::from_name(&call.method) else {
            warn!(invocation = %id, method = %call.method, "method not implemented");
            return Routed::Ready(BridgeError::UnsupportedMethod(call.method.clone()).into());
        };

        match method {
            Method::PlatformVersion => {
                Routed::Ready(MethodResponse::Success(self.platform.platform_version().into()))
            }
            Method::DocumentsDirectory => Routed::Ready(self.documents_directory(id)),
            Method::Prove => match codec::decode_prove(&call.arguments) {
                Ok(req) => Routed::Prove(req),
                Err(e) => rejected(id, method, e),
            },
            Method::Verify => match codec::decode_verify(&call.arguments) {
                Ok(req) => Routed::Verify(req),
                Err(e) => rejected(id, method, e),
            },
        }
    }

    fn documents_directory(&self, id: InvocationId) -> MethodResponse {
        match self.platform.documents_directory() {
            Ok(Some(dir)) => MethodResponse::Success(Value::String(dir.display().to_string())),
            Ok(None) => MethodResponse::Success(Value::Null),
            // Any lookup failure is reported as DIR_ERROR; the cause goes in details.
            Err(e) => {
                warn!(invocation = %id, error = %e, "documents directory lookup failed");
                MethodResponse::Error {
                    code: "DIR_ERROR".into(),
                    message: "Could not get documents directory".into(),
                    details: Some(Value::String(e.to_string())),
                }
            }
        }
    }
}

impl MethodCallHandler for Bridge {
    fn on_method_call(&self, call: MethodCall, reply: Reply) {
        let id = InvocationId::new();
        let pending = PendingReply::new(id, call.method.clone(), reply, Arc::clone(&self.context));

        match self.route(id, &call) {
            Routed::Ready(resp) => pending.send(resp),
            Routed::Prove(req) => {
                let engine = Arc::clone(&self.engine);
                let boundary = self.boundary.clone();
                self.boundary.spawn(async move {
                    let resp = prove(id, engine, &boundary, req).await;
                    pending.send(resp);
                });
            }
            Routed::Verify(req) => {
                let engine = Arc::clone(&self.engine);
                let boundary = self.boundary.clone();
                self.boundary.spawn(async move {
                    let resp = verify(id, engine, &boundary, req).await;
                    pending.send(resp);
                });
            }
        }
    }
}

fn rejected(id: InvocationId, method: Method, err: BridgeError) -> Routed {
    warn!(invocation = %id, %method, error = %err, "rejected before dispatch");
    Routed::Ready(err.into())
}

async fn prove(
    id: InvocationId,
    engine: Arc<dyn ProvingEngine>,
    boundary: &Boundary,
    req: ProofRequest,
) -> MethodResponse {
    info!(
        invocation = %id,
        srs = req.srs_path(),
        header_bytes = req.inputs().get("header_storage").map_or(0, Vec::len),
        "generating proof"
    );
    let outcome = boundary
        .run_blocking(id, move || engine.prove(req.srs_path(), req.inputs()))
        .await;
    MethodResponse::Success(normalize::proof_result(id, outcome).into_value())
}

async fn verify(
    id: InvocationId,
    engine: Arc<dyn ProvingEngine>,
    boundary: &Boundary,
    req: VerifyRequest,
) -> MethodResponse {
    info!(invocation = %id, srs = req.srs_path(), proof_bytes = req.proof().len(), "verifying proof");
    let outcome = boundary
        .run_blocking(id, move || engine.verify(req.srs_path(), req.proof()))
        .await;
    MethodResponse::Success(normalize::verify_result(id, outcome).into_value())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::{Duration, Instant};

    use sha2::{Digest, Sha256};
    use zkemail_core::BridgeConfig;
    use zkemail_core::error::Result;
    use zkemail_core::types::{ProofInputs, ProofResult, VerifyResult};

    use super::*;
    use crate::boundary::{build_runtime, main_queue};
    use crate::traits::EngineError;

    const MAGIC: &[u8] = b"ZKP1";

    #[derive(Default)]
    enum Behaviour {
        #[default]
        Honest,
        Fail(&'static str),
        Panic,
        Slow(Duration),
    }

    /// Deterministic, stateless stand-in for the native engine.
    #[derive(Default)]
    struct FakeEngine {
        calls: AtomicUsize,
        behaviour: Behaviour,
    }

    impl FakeEngine {
        fn with(behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                behaviour,
                ..Default::default()
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn misbehave(&self) -> std::result::Result<(), EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behaviour {
                Behaviour::Honest => Ok(()),
                Behaviour::Fail(msg) => Err(EngineError::new(msg)),
                Behaviour::Panic => panic!("engine exploded"),
                Behaviour::Slow(delay) => {
                    thread::sleep(delay);
                    Ok(())
                }
            }
        }
    }

    impl ProvingEngine for FakeEngine {
        fn prove(&self, srs_path: &str, inputs: &ProofInputs) -> std::result::Result<Vec<u8>, EngineError> {
            self.misbehave()?;
            let mut hasher = Sha256::new();
            hasher.update(srs_path.as_bytes());
            for (key, values) in inputs {
                hasher.update(key.as_bytes());
                for v in values {
                    hasher.update(v.as_bytes());
                }
            }
            let mut proof = MAGIC.to_vec();
            proof.extend_from_slice(&hasher.finalize());
            Ok(proof)
        }

        fn verify(&self, _srs_path: &str, proof: &[u8]) -> std::result::Result<bool, EngineError> {
            self.misbehave()?;
            Ok(proof.len() == MAGIC.len() + 32 && proof.starts_with(MAGIC))
        }
    }

    enum Docs {
        At(&'static str),
        Unmounted,
        Broken,
    }

    struct FakePlatform(Docs);

    impl HostPlatform for FakePlatform {
        fn platform_version(&self) -> String {
            "TestOS 1.0".into()
        }

        fn documents_directory(&self) -> Result<Option<PathBuf>> {
            match self.0 {
                Docs::At(p) => Ok(Some(PathBuf::from(p))),
                Docs::Unmounted => Ok(None),
                Docs::Broken => Err(BridgeError::DirectoryResolution("sandbox denied".into())),
            }
        }
    }

    fn strings(items: &[&str]) -> Value {
        Value::List(items.iter().map(|s| Value::from(*s)).collect())
    }

    fn sample_inputs() -> Value {
        Value::map([
            ("header_storage", strings(&["72", "101"])),
            ("header_len", strings(&["2"])),
            ("pubkey_modulus", strings(&["1"])),
            ("pubkey_redc", strings(&["1"])),
            ("signature", strings(&["1"])),
            ("date_index", strings(&["0"])),
            ("subject_index", strings(&["0"])),
            ("subject_length", strings(&["1"])),
            ("from_header_index", strings(&["0"])),
            ("from_header_length", strings(&["1"])),
            ("from_address_index", strings(&["0"])),
            ("from_address_length", strings(&["1"])),
        ])
    }

    fn prove_call(srs: Value, inputs: Value) -> MethodCall {
        MethodCall::new("proveZkEmail", Value::map([("srsPath", srs), ("inputs", inputs)]))
    }

    fn verify_call(proof: Value) -> MethodCall {
        MethodCall::new(
            "verifyZkEmail",
            Value::map([("srsPath", Value::from("/data/srs.local")), ("proof", proof)]),
        )
    }

    fn make_bridge(engine: &Arc<FakeEngine>, docs: Docs) -> Bridge {
        let (queue, _loop) = main_queue();
        Bridge::new(
            Arc::new(FakePlatform(docs)),
            Arc::clone(engine) as Arc<dyn ProvingEngine>,
            Boundary::current(),
            Arc::new(queue),
        )
    }

    fn proof_of(resp: &MethodResponse) -> ProofResult {
        ProofResult::from_value(resp.value().expect("success response"))
            .expect("proof result shape")
    }

    fn verdict_of(resp: &MethodResponse) -> VerifyResult {
        VerifyResult::from_value(resp.value().expect("success response"))
            .expect("verify result shape")
    }

    #[tokio::test]
    async fn prove_returns_non_empty_proof() {
        let engine = Arc::new(FakeEngine::default());
        let bridge = make_bridge(&engine, Docs::Unmounted);

        let resp = bridge
            .invoke(prove_call("/data/srs.local".into(), sample_inputs()))
            .await;
        let result = proof_of(&resp);

        assert!(!result.proof().unwrap().is_empty());
        assert_eq!(result.error(), None);
        assert_eq!(engine.calls(), 1);
        assert_eq!(bridge.boundary().dispatched(), 1);
    }

    #[tokio::test]
    async fn generated_proof_verifies() {
        let engine = Arc::new(FakeEngine::default());
        let bridge = make_bridge(&engine, Docs::Unmounted);

        let resp = bridge
            .invoke(prove_call("/data/srs.local".into(), sample_inputs()))
            .await;
        let proof = proof_of(&resp).proof().unwrap().to_vec();

        let verdict = verdict_of(&bridge.invoke(verify_call(Value::Bytes(proof))).await);
        assert_eq!(verdict, VerifyResult::Checked(true));
    }

    #[tokio::test]
    async fn zeroed_proof_is_rejected_without_error() {
        let engine = Arc::new(FakeEngine::default());
        let bridge = make_bridge(&engine, Docs::Unmounted);

        let verdict = verdict_of(&bridge.invoke(verify_call(Value::Bytes(vec![0; 36]))).await);
        assert_eq!(verdict, VerifyResult::Checked(false));
        assert_eq!(verdict.error(), None);
    }

    #[tokio::test]
    async fn verify_is_idempotent() {
        let engine = Arc::new(FakeEngine::default());
        let bridge = make_bridge(&engine, Docs::Unmounted);
        let proof = Value::Bytes([MAGIC, &[7u8; 32][..]].concat());

        let first = verdict_of(&bridge.invoke(verify_call(proof.clone())).await);
        let second = verdict_of(&bridge.invoke(verify_call(proof)).await);
        assert_eq!(first, second);
        assert_eq!(engine.calls(), 2);
    }

    #[tokio::test]
    async fn null_srs_path_never_reaches_engine() {
        let engine = Arc::new(FakeEngine::default());
        let bridge = make_bridge(&engine, Docs::Unmounted);

        let resp = bridge.invoke(prove_call(Value::Null, sample_inputs())).await;

        assert_eq!(resp.error_code(), Some("INVALID_ARGUMENTS"));
        assert_eq!(engine.calls(), 0);
        assert_eq!(bridge.boundary().dispatched(), 0);
    }

    #[tokio::test]
    async fn missing_inputs_or_proof_never_reach_engine() {
        let engine = Arc::new(FakeEngine::default());
        let bridge = make_bridge(&engine, Docs::Unmounted);

        let resp = bridge
            .invoke(prove_call("/data/srs.local".into(), Value::Null))
            .await;
        assert_eq!(resp.error_code(), Some("INVALID_ARGUMENTS"));

        let resp = bridge.invoke(verify_call(Value::Null)).await;
        assert_eq!(resp.error_code(), Some("INVALID_ARGUMENTS"));

        let resp = bridge
            .invoke(MethodCall::new(
                "verifyZkEmail",
                Value::map([("proof", Value::Bytes(vec![1]))]),
            ))
            .await;
        assert_eq!(resp.error_code(), Some("INVALID_ARGUMENTS"));

        assert_eq!(engine.calls(), 0);
    }

    #[tokio::test]
    async fn engine_failure_is_wrapped_into_result() {
        let engine = FakeEngine::with(Behaviour::Fail("srs file truncated"));
        let bridge = make_bridge(&engine, Docs::Unmounted);

        let resp = bridge
            .invoke(prove_call("/data/srs.local".into(), sample_inputs()))
            .await;
        assert!(resp.is_success());
        assert_eq!(proof_of(&resp), ProofResult::Failed("srs file truncated".into()));

        let verdict = verdict_of(&bridge.invoke(verify_call(Value::Bytes(vec![1]))).await);
        assert_eq!(verdict, VerifyResult::Failed("srs file truncated".into()));
        assert!(!verdict.is_valid());
    }

    #[tokio::test]
    async fn engine_panic_is_wrapped_into_result() {
        let engine = FakeEngine::with(Behaviour::Panic);
        let bridge = make_bridge(&engine, Docs::Unmounted);

        let resp = bridge
            .invoke(prove_call("/data/srs.local".into(), sample_inputs()))
            .await;
        let error = proof_of(&resp).error().map(str::to_owned).unwrap();
        assert!(error.contains("engine exploded"));
        assert_eq!(bridge.boundary().in_flight(), 0);
    }

    #[tokio::test]
    async fn unknown_method_is_not_implemented() {
        let engine = Arc::new(FakeEngine::default());
        let bridge = make_bridge(&engine, Docs::Unmounted);

        let resp = bridge.invoke(MethodCall::new("proveRsa", Value::Null)).await;
        assert_eq!(resp, MethodResponse::NotImplemented);
        assert_eq!(engine.calls(), 0);
    }

    #[tokio::test]
    async fn platform_queries_answer_directly() {
        let engine = Arc::new(FakeEngine::default());

        let bridge = make_bridge(&engine, Docs::At("/var/mobile/Documents"));
        let resp = bridge.invoke(MethodCall::new("getPlatformVersion", Value::Null)).await;
        assert_eq!(resp, MethodResponse::Success("TestOS 1.0".into()));
        let resp = bridge
            .invoke(MethodCall::new("getApplicationDocumentsDirectory", Value::Null))
            .await;
        assert_eq!(resp, MethodResponse::Success("/var/mobile/Documents".into()));

        let bridge = make_bridge(&engine, Docs::Unmounted);
        let resp = bridge
            .invoke(MethodCall::new("getApplicationDocumentsDirectory", Value::Null))
            .await;
        assert_eq!(resp, MethodResponse::Success(Value::Null));

        let bridge = make_bridge(&engine, Docs::Broken);
        let resp = bridge
            .invoke(MethodCall::new("getApplicationDocumentsDirectory", Value::Null))
            .await;
        match &resp {
            MethodResponse::Error { code, message, details } => {
                assert_eq!(code, "DIR_ERROR");
                assert_eq!(message, "Could not get documents directory");
                let cause = details.as_ref().and_then(Value::as_str).unwrap();
                assert!(cause.contains("sandbox denied"));
            }
            other => panic!("expected DIR_ERROR, got {other:?}"),
        }
        assert_eq!(bridge.boundary().dispatched(), 0);
    }

    #[tokio::test]
    async fn concurrent_invocations_do_not_interfere() {
        let engine = Arc::new(FakeEngine::default());
        let bridge = make_bridge(&engine, Docs::Unmounted);

        let a = prove_call("/data/a.srs".into(), sample_inputs());
        let b = prove_call("/data/b.srs".into(), sample_inputs());
        let (ra, rb) = tokio::join!(bridge.invoke(a.clone()), bridge.invoke(b));
        let (pa, pb) = (proof_of(&ra), proof_of(&rb));

        assert_ne!(pa.proof(), pb.proof());
        assert_eq!(proof_of(&bridge.invoke(a).await), pa);
    }

    #[test]
    fn callback_reply_arrives_on_calling_thread() {
        let engine = Arc::new(FakeEngine::default());
        let (queue, main_loop) = main_queue();
        let bridge = Bridge::with_runtime(
            Arc::new(FakePlatform(Docs::Unmounted)),
            Arc::clone(&engine) as Arc<dyn ProvingEngine>,
            build_runtime(&BridgeConfig::default()).unwrap(),
            Arc::new(queue),
        );

        let replies = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&replies);
        bridge.on_method_call(
            prove_call("/data/srs.local".into(), sample_inputs()),
            Box::new(move |resp| sink.lock().unwrap().push((thread::current().id(), resp))),
        );

        assert!(main_loop.run_next(Duration::from_secs(10)));
        assert_eq!(main_loop.run_pending(), 0);

        let replies = replies.lock().unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].0, thread::current().id());
        assert!(proof_of(&replies[0].1).proof().is_some());
        assert_eq!(engine.calls(), 1);
    }

    #[test]
    fn callback_rejection_skips_worker() {
        let engine = Arc::new(FakeEngine::default());
        let (queue, main_loop) = main_queue();
        let bridge = Bridge::with_runtime(
            Arc::new(FakePlatform(Docs::Unmounted)),
            Arc::clone(&engine) as Arc<dyn ProvingEngine>,
            build_runtime(&BridgeConfig::default()).unwrap(),
            Arc::new(queue),
        );

        let got = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&got);
        bridge.on_method_call(
            prove_call(Value::Null, sample_inputs()),
            Box::new(move |resp| *slot.lock().unwrap() = Some(resp)),
        );

        assert_eq!(main_loop.run_pending(), 1);
        let resp = got.lock().unwrap().take().unwrap();
        assert_eq!(resp.error_code(), Some("INVALID_ARGUMENTS"));
        assert_eq!(bridge.boundary().dispatched(), 0);
        assert_eq!(engine.calls(), 0);
    }

    #[test]
    fn dropping_bridge_does_not_wait_for_engine() {
        let engine = FakeEngine::with(Behaviour::Slow(Duration::from_secs(3)));
        let (queue, main_loop) = main_queue();
        let bridge = Bridge::with_runtime(
            Arc::new(FakePlatform(Docs::Unmounted)),
            Arc::clone(&engine) as Arc<dyn ProvingEngine>,
            build_runtime(&BridgeConfig::default()).unwrap(),
            Arc::new(queue),
        );

        let got = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&got);
        bridge.on_method_call(
            verify_call(Value::Bytes(vec![1; 36])),
            Box::new(move |resp| *slot.lock().unwrap() = Some(resp)),
        );
        while engine.calls() == 0 {
            thread::sleep(Duration::from_millis(5));
        }

        let started = Instant::now();
        drop(bridge);
        assert!(started.elapsed() < Duration::from_secs(1), "drop waited for the engine");

        assert!(main_loop.run_next(Duration::from_secs(5)));
        let resp = got.lock().unwrap().take().unwrap();
        assert_eq!(resp.error_code(), Some("BRIDGE_ERROR"));
    }
}
