// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Argument codec — validates loosely-typed channel payloads and marshals them
// into the request types the proving engine takes.
//
// Validation is all-or-nothing: either every required field decodes and a
// request is returned, or `BridgeError::InvalidArguments` is returned and
// nothing reaches the engine. The payload is only borrowed.

use std::collections::BTreeMap;

use tracing::debug;
use zkemail_core::error::{BridgeError, Result};
use zkemail_core::types::{Arity, InputKey, ProofInputs, ProofRequest, VerifyRequest};
use zkemail_core::value::Value;

/// Payload key holding the setup reference string path.
pub const SRS_PATH: &str = "srsPath";
/// Payload key holding the prove inputs map.
pub const INPUTS: &str = "inputs";
/// Payload key holding the proof bytes for verification.
pub const PROOF: &str = "proof";

/// Decode a `proveZkEmail` payload.
pub fn decode_prove(args: &Value) -> Result<ProofRequest> {
    let fields = require_map(args)?;
    let srs_path = require_path(fields)?;
    let inputs = match fields.get(INPUTS) {
        None | Some(Value::Null) => return Err(invalid("inputs is missing or null")),
        Some(v) => decode_inputs(v)?,
    };
    Ok(ProofRequest::new(srs_path, inputs))
}

/// Decode a `verifyZkEmail` payload.
pub fn decode_verify(args: &Value) -> Result<VerifyRequest> {
    let fields = require_map(args)?;
    let srs_path = require_path(fields)?;
    let proof = match fields.get(PROOF) {
        None | Some(Value::Null) => return Err(invalid("proof is missing or null")),
        Some(v) => decode_bytes(PROOF, v)?,
    };
    if proof.is_empty() {
        return Err(invalid("proof is empty"));
    }
    Ok(VerifyRequest::new(srs_path, proof))
}

/// Decode and check the `inputs` map of a prove payload.
pub fn decode_inputs(value: &Value) -> Result<ProofInputs> {
    let Value::Map(entries) = value else {
        return Err(invalid(format!(
            "inputs must be a map of string lists, got {}",
            value.type_name()
        )));
    };
    if entries.is_empty() {
        return Err(invalid("inputs is empty"));
    }

    for extra in entries
        .keys()
        .filter(|k| !InputKey::ALL.iter().any(|key| key.as_str() == k.as_str()))
    {
        debug!(field = %extra, "ignoring unrecognised input field");
    }

    let mut inputs = BTreeMap::new();
    for key in InputKey::ALL {
        let raw = entries
            .get(key.as_str())
            .ok_or_else(|| invalid(format!("inputs is missing `{key}`")))?;
        let values = decode_sequence(key, raw)?;
        inputs.insert(key.as_str().to_owned(), values);
    }

    check_header_len(&inputs)?;
    Ok(inputs)
}

fn require_map(args: &Value) -> Result<&BTreeMap<String, Value>> {
    match args {
        Value::Map(m) => Ok(m),
        other => Err(invalid(format!(
            "arguments must be a map, got {}",
            other.type_name()
        ))),
    }
}

fn require_path(fields: &BTreeMap<String, Value>) -> Result<String> {
    match fields.get(SRS_PATH) {
        None | Some(Value::Null) => Err(invalid("srsPath is missing or null")),
        Some(Value::String(s)) if s.trim().is_empty() => Err(invalid("srsPath is empty")),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(invalid(format!(
            "srsPath must be a string, got {}",
            other.type_name()
        ))),
    }
}

/// Decode one input field into its string-encoded elements.
///
/// Accepts a list of strings or integers, or (for `header_storage`) a raw byte
/// buffer, which is expanded to one decimal string per byte.
fn decode_sequence(key: InputKey, value: &Value) -> Result<Vec<String>> {
    let values = match value {
        Value::List(items) => items
            .iter()
            .map(|item| encode_element(key, item))
            .collect::<Result<Vec<_>>>()?,
        Value::Bytes(bytes) if key == InputKey::HeaderStorage => {
            bytes.iter().map(u8::to_string).collect()
        }
        other => {
            return Err(invalid(format!(
                "`{key}` must be a list, got {}",
                other.type_name()
            )));
        }
    };

    match (key.arity(), values.len()) {
        (_, 0) => Err(invalid(format!("`{key}` is empty"))),
        (Arity::Single, n) if n > 1 => Err(invalid(format!(
            "`{key}` takes exactly one value, got {n}"
        ))),
        _ => Ok(values),
    }
}

fn encode_element(key: InputKey, item: &Value) -> Result<String> {
    let encoded = match item {
        Value::String(s) => {
            let s = s.trim();
            if !is_integer_literal(s) {
                return Err(invalid(format!(
                    "`{key}` element {s:?} is not a decimal or 0x-prefixed hex integer"
                )));
            }
            s.to_owned()
        }
        Value::Int(i) if *i >= 0 => i.to_string(),
        Value::Int(i) => {
            return Err(invalid(format!("`{key}` element {i} is negative")));
        }
        other => {
            return Err(invalid(format!(
                "`{key}` elements must be strings or integers, got {}",
                other.type_name()
            )));
        }
    };

    if key == InputKey::HeaderStorage {
        match parse_u64(&encoded) {
            Some(b) if b <= u64::from(u8::MAX) => {}
            _ => {
                return Err(invalid(format!(
                    "`{key}` element {encoded} is not a byte value"
                )));
            }
        }
    }
    Ok(encoded)
}

/// `header_len` may not point past the end of `header_storage`.
fn check_header_len(inputs: &ProofInputs) -> Result<()> {
    let storage = inputs
        .get(InputKey::HeaderStorage.as_str())
        .map_or(0, Vec::len);
    let Some(len) = inputs
        .get(InputKey::HeaderLen.as_str())
        .and_then(|v| v.first())
    else {
        return Ok(());
    };
    match parse_u64(len) {
        Some(n) if n <= storage as u64 => Ok(()),
        Some(n) => Err(invalid(format!(
            "header_len {n} exceeds header_storage length {storage}"
        ))),
        None => Err(invalid(format!("header_len {len} does not fit in 64 bits"))),
    }
}

/// Decode proof bytes from a byte buffer or a list of byte-valued integers.
fn decode_bytes(field: &str, value: &Value) -> Result<Vec<u8>> {
    match value {
        Value::Bytes(b) => Ok(b.clone()),
        Value::List(items) => items
            .iter()
            .map(|item| match item {
                Value::Int(i) => u8::try_from(*i)
                    .map_err(|_| invalid(format!("`{field}` element {i} is not a byte value"))),
                other => Err(invalid(format!(
                    "`{field}` elements must be integers, got {}",
                    other.type_name()
                ))),
            })
            .collect(),
        other => Err(invalid(format!(
            "`{field}` must be bytes, got {}",
            other.type_name()
        ))),
    }
}

/// Decimal digits, or `0x` followed by hex digits.
fn is_integer_literal(s: &str) -> bool {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => !hex.is_empty() && hex.bytes().all(|b| b.is_ascii_hexdigit()),
        None => !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()),
    }
}

fn parse_u64(s: &str) -> Option<u64> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

fn invalid(msg: impl Into<String>) -> BridgeError {
    BridgeError::InvalidArguments(msg.into())
}
