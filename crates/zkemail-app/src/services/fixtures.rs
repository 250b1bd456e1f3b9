// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bundled fixtures: the setup reference string and the example email inputs.
//
// Assets ship read-only with the application, while the proving engine wants
// plain file paths, so each asset is mirrored once into the writable files
// directory and never overwritten afterwards.

use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tempfile::NamedTempFile;

use zkemail_core::BridgeConfig;
use zkemail_core::error::{BridgeError, Result};
use zkemail_core::types::{InputKey, ProofInputs};

/// Copy `name` from `assets_dir` into `files_dir` unless it is already there.
///
/// The copy is written to a temporary file beside the destination and moved
/// into place with a no-clobber rename, so `dest` only ever appears complete.
/// Losing a race against another caller counts as success.
pub fn mirror_asset(assets_dir: &Path, files_dir: &Path, name: &str) -> Result<PathBuf> {
    let source = assets_dir.join(name);
    let dest = files_dir.join(name);

    if !source.is_file() {
        return Err(BridgeError::FixtureMissing(source));
    }
    if dest.exists() {
        tracing::debug!(path = %dest.display(), "asset already mirrored");
        return Ok(dest);
    }
    fs::create_dir_all(files_dir)?;

    let mut staged = NamedTempFile::new_in(files_dir)?;
    let bytes = io::copy(&mut fs::File::open(&source)?, staged.as_file_mut())?;
    staged.as_file().sync_all()?;

    match staged.persist_noclobber(&dest) {
        Ok(_) => {
            tracing::info!(path = %dest.display(), bytes, "asset mirrored");
            Ok(dest)
        }
        Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
            tracing::debug!(path = %dest.display(), "asset mirrored concurrently");
            Ok(dest)
        }
        Err(e) => Err(e.error.into()),
    }
}

/// Mirror the setup reference string and return its path.
pub fn prepare_srs(assets_dir: &Path, files_dir: &Path, config: &BridgeConfig) -> Result<PathBuf> {
    mirror_asset(assets_dir, files_dir, &config.srs_file_name)
}

/// Mirror the example inputs and parse them.
pub fn prepare_inputs(
    assets_dir: &Path,
    files_dir: &Path,
    config: &BridgeConfig,
) -> Result<ProofInputs> {
    let path = mirror_asset(assets_dir, files_dir, &config.inputs_file_name)?;
    load_inputs(&path)
}

// ---------------------------------------------------------------------------
// Input fixture format
// ---------------------------------------------------------------------------

/// Limbs may be written as strings (`"0x..."`) or bare integers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Limb {
    Text(String),
    Number(u64),
}

impl Limb {
    fn into_element(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Header {
    storage: Vec<u8>,
    len: u64,
}

#[derive(Debug, Deserialize)]
struct PubKey {
    modulus: Vec<Limb>,
    redc: Vec<Limb>,
}

#[derive(Debug, Deserialize)]
struct Sequence {
    index: u64,
    length: u64,
}

#[derive(Debug, Deserialize)]
struct InputFixture {
    header: Header,
    pubkey: PubKey,
    signature: Vec<Limb>,
    date_index: u64,
    subject_sequence: Sequence,
    from_header_sequence: Sequence,
    from_address_sequence: Sequence,
}

impl InputFixture {
    fn into_inputs(self) -> ProofInputs {
        let limbs = |v: Vec<Limb>| v.into_iter().map(Limb::into_element).collect::<Vec<_>>();
        let one = |n: u64| vec![n.to_string()];

        [
            (
                InputKey::HeaderStorage,
                self.header.storage.iter().map(u8::to_string).collect(),
            ),
            (InputKey::HeaderLen, one(self.header.len)),
            (InputKey::PubkeyModulus, limbs(self.pubkey.modulus)),
            (InputKey::PubkeyRedc, limbs(self.pubkey.redc)),
            (InputKey::Signature, limbs(self.signature)),
            (InputKey::DateIndex, one(self.date_index)),
            (InputKey::SubjectIndex, one(self.subject_sequence.index)),
            (InputKey::SubjectLength, one(self.subject_sequence.length)),
            (InputKey::FromHeaderIndex, one(self.from_header_sequence.index)),
            (InputKey::FromHeaderLength, one(self.from_header_sequence.length)),
            (InputKey::FromAddressIndex, one(self.from_address_sequence.index)),
            (InputKey::FromAddressLength, one(self.from_address_sequence.length)),
        ]
        .into_iter()
        .map(|(key, elements)| (key.as_str().to_owned(), elements))
        .collect()
    }
}

/// Read an example-inputs JSON file into the twelve named proof inputs.
pub fn load_inputs(path: &Path) -> Result<ProofInputs> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(BridgeError::FixtureMissing(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };
    let fixture: InputFixture =
        serde_json::from_str(&raw).map_err(|e| BridgeError::FixtureMalformed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    Ok(fixture.into_inputs())
}
