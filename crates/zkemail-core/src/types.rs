// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the zkEmail bridge.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::BridgeError;
use crate::value::Value;

/// Correlation id for a single bridge invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvocationId(pub Uuid);

impl InvocationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for InvocationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for InvocationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The closed set of methods the bridge answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    PlatformVersion,
    DocumentsDirectory,
    Prove,
    Verify,
}

impl Method {
    /// Every routable method.
    pub const ALL: [Method; 4] = [
        Self::PlatformVersion,
        Self::DocumentsDirectory,
        Self::Prove,
        Self::Verify,
    ];

    /// Channel method name as sent by the host.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PlatformVersion => "getPlatformVersion",
            Self::DocumentsDirectory => "getApplicationDocumentsDirectory",
            Self::Prove => "proveZkEmail",
            Self::Verify => "verifyZkEmail",
        }
    }

    /// Resolve a channel method name. Unknown names yield `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A named-method request with an untyped payload.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub method: String,
    pub arguments: Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }
}

/// The single response delivered for a [`MethodCall`].
#[derive(Debug, Clone, PartialEq)]
pub enum MethodResponse {
    /// The handler produced a value (which may itself carry an engine error).
    Success(Value),
    /// Boundary-level failure: the request never reached the engine.
    Error {
        code: String,
        message: String,
        details: Option<Value>,
    },
    /// The method name is outside the routable set.
    NotImplemented,
}

impl MethodResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Error code of a boundary failure, if this is one.
    pub fn error_code(&self) -> Option<&str> {
        match self {
            Self::Error { code, .. } => Some(code),
            _ => None,
        }
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Success(v) => Some(v),
            _ => None,
        }
    }
}

impl From<BridgeError> for MethodResponse {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::UnsupportedMethod(_) => Self::NotImplemented,
            other => Self::Error {
                code: other.code().to_owned(),
                message: other.to_string(),
                details: None,
            },
        }
    }
}

/// How many elements an input field carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly one element.
    Single,
    /// One or more elements; order is significant.
    Sequence,
}

/// Required keys of a prove request's `inputs` map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputKey {
    HeaderStorage,
    HeaderLen,
    PubkeyModulus,
    PubkeyRedc,
    Signature,
    DateIndex,
    SubjectIndex,
    SubjectLength,
    FromHeaderIndex,
    FromHeaderLength,
    FromAddressIndex,
    FromAddressLength,
}

impl InputKey {
    pub const ALL: [InputKey; 12] = [
        Self::HeaderStorage,
        Self::HeaderLen,
        Self::PubkeyModulus,
        Self::PubkeyRedc,
        Self::Signature,
        Self::DateIndex,
        Self::SubjectIndex,
        Self::SubjectLength,
        Self::FromHeaderIndex,
        Self::FromHeaderLength,
        Self::FromAddressIndex,
        Self::FromAddressLength,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HeaderStorage => "header_storage",
            Self::HeaderLen => "header_len",
            Self::PubkeyModulus => "pubkey_modulus",
            Self::PubkeyRedc => "pubkey_redc",
            Self::Signature => "signature",
            Self::DateIndex => "date_index",
            Self::SubjectIndex => "subject_index",
            Self::SubjectLength => "subject_length",
            Self::FromHeaderIndex => "from_header_index",
            Self::FromHeaderLength => "from_header_length",
            Self::FromAddressIndex => "from_address_index",
            Self::FromAddressLength => "from_address_length",
        }
    }

    pub fn arity(&self) -> Arity {
        match self {
            Self::HeaderStorage | Self::PubkeyModulus | Self::PubkeyRedc | Self::Signature => {
                Arity::Sequence
            }
            _ => Arity::Single,
        }
    }
}

impl std::fmt::Display for InputKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field name to ordered, string-encoded values, in the shape the engine takes.
pub type ProofInputs = BTreeMap<String, Vec<String>>;

/// A validated prove request. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofRequest {
    srs_path: String,
    inputs: ProofInputs,
}

impl ProofRequest {
    pub fn new(srs_path: impl Into<String>, inputs: ProofInputs) -> Self {
        Self {
            srs_path: srs_path.into(),
            inputs,
        }
    }

    pub fn srs_path(&self) -> &str {
        &self.srs_path
    }

    pub fn inputs(&self) -> &ProofInputs {
        &self.inputs
    }
}

/// A validated verify request. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyRequest {
    srs_path: String,
    proof: Vec<u8>,
}

impl VerifyRequest {
    pub fn new(srs_path: impl Into<String>, proof: Vec<u8>) -> Self {
        Self {
            srs_path: srs_path.into(),
            proof,
        }
    }

    pub fn srs_path(&self) -> &str {
        &self.srs_path
    }

    pub fn proof(&self) -> &[u8] {
        &self.proof
    }
}

/// Outcome of a prove invocation that reached the engine.
///
/// Exactly one of proof bytes or error message is ever present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProofResult {
    Generated(Vec<u8>),
    Failed(String),
}

impl ProofResult {
    pub fn proof(&self) -> Option<&[u8]> {
        match self {
            Self::Generated(bytes) => Some(bytes),
            Self::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Generated(_) => None,
            Self::Failed(msg) => Some(msg),
        }
    }

    /// Read back a `{proof, error}` map produced by [`ProofResult::into_value`].
    pub fn from_value(value: &Value) -> Option<Self> {
        match (value.get("proof")?, value.get("error")?) {
            (Value::Bytes(b), Value::Null) => Some(Self::Generated(b.clone())),
            (Value::Null, Value::String(msg)) => Some(Self::Failed(msg.clone())),
            _ => None,
        }
    }

    /// Wire shape: `{"proof": bytes | null, "error": null | string}`.
    pub fn into_value(self) -> Value {
        let (proof, error) = match self {
            Self::Generated(bytes) => (Value::Bytes(bytes), Value::Null),
            Self::Failed(msg) => (Value::Null, Value::String(msg)),
        };
        Value::map([("proof", proof), ("error", error)])
    }
}

/// Outcome of a verify invocation that reached the engine.
///
/// `Checked(false)` means the engine ran and rejected the proof; a failure to
/// run at all is `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    Checked(bool),
    Failed(String),
}

impl VerifyResult {
    /// Validity as reported on the wire; `false` whenever verification failed.
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Checked(true))
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Checked(_) => None,
            Self::Failed(msg) => Some(msg),
        }
    }

    /// Read back an `{isValid, error}` map produced by [`VerifyResult::into_value`].
    pub fn from_value(value: &Value) -> Option<Self> {
        match (value.get("isValid")?, value.get("error")?) {
            (Value::Bool(valid), Value::Null) => Some(Self::Checked(*valid)),
            (Value::Bool(false), Value::String(msg)) => Some(Self::Failed(msg.clone())),
            _ => None,
        }
    }

    /// Wire shape: `{"isValid": bool, "error": null | string}`.
    pub fn into_value(self) -> Value {
        let (valid, error) = match self {
            Self::Checked(valid) => (valid, Value::Null),
            Self::Failed(msg) => (false, Value::String(msg)),
        };
        Value::map([("isValid", Value::Bool(valid)), ("error", error)])
    }
}
