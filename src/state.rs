//! # Parameter State Blobs
//!
//! Saves the parameter set to bytes and restores it again. The blob is a
//! small JSON document:
//!
//! ```json
//! { "version": 1, "params": { "Delay Time": 0.5, "Delay Feedback": 0.5, ... } }
//! ```
//!
//! Keys are the parameter display names. Loading is all-or-nothing: the
//! whole blob is checked before any value is written, so a truncated,
//! corrupted or foreign blob leaves the current values exactly as they
//! were.
//!
//! ## Host sessions
//!
//! These blobs work on a [`ParameterStore`] alone, with no host involved;
//! presets, tests and tools use them. Inside a DAW the session is saved
//! and restored by nih-plug through the `FloatParam`s in
//! [`DubEchoParams`](crate::params::DubEchoParams), whose callbacks keep
//! the store in step. A blob loaded straight into the store of a running
//! plugin is heard on the next block, but the host's parameters keep
//! showing their old values until the host next sets them.

use std::collections::BTreeMap;

use nih_plug::nih_warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::params::ParamId;
use crate::store::ParameterStore;

/// Format version written by [`save_state()`].
pub const STATE_VERSION: u32 = 1;

/// Why a state blob was rejected.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("state blob is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unsupported state version {found} (expected {expected})", expected = STATE_VERSION)]
    UnsupportedVersion { found: u32 },

    #[error("state blob has no value for \"{0}\"")]
    MissingParameter(&'static str),

    #[error("state blob has a non-finite value for \"{0}\"")]
    NonFinite(&'static str),
}

#[derive(Debug, Serialize, Deserialize)]
struct StateBlob {
    version: u32,
    params: BTreeMap<String, f32>,
}

/// Serialize every parameter's current value.
pub fn save_state(store: &ParameterStore) -> Vec<u8> {
    let blob = StateBlob {
        version: STATE_VERSION,
        params: ParamId::ALL
            .into_iter()
            .map(|id| (id.name().to_owned(), store.get(id)))
            .collect(),
    };

    // A map of strings to finite floats always serializes.
    serde_json::to_vec(&blob).unwrap_or_default()
}

/// Validate `bytes` and, only if the whole blob is good, write its values
/// into `store` (clamped into range). Unknown keys are ignored.
pub fn load_state(store: &ParameterStore, bytes: &[u8]) -> Result<(), StateError> {
    let blob: StateBlob = serde_json::from_slice(bytes)?;
    if blob.version != STATE_VERSION {
        return Err(StateError::UnsupportedVersion {
            found: blob.version,
        });
    }

    let mut values = [0.0_f32; ParamId::COUNT];
    for id in ParamId::ALL {
        let value = *blob
            .params
            .get(id.name())
            .ok_or(StateError::MissingParameter(id.name()))?;
        if !value.is_finite() {
            return Err(StateError::NonFinite(id.name()));
        }
        values[id.index()] = value;
    }

    for id in ParamId::ALL {
        store.set(id, values[id.index()]);
    }
    Ok(())
}

/// [`load_state()`] for callers that cannot act on the error: a rejected
/// blob is logged and otherwise ignored. Returns whether it was applied.
pub fn restore_state(store: &ParameterStore, bytes: &[u8]) -> bool {
    match load_state(store, bytes) {
        Ok(()) => true,
        Err(err) => {
            nih_warn!("Ignoring saved state: {err}");
            false
        }
    }
}
