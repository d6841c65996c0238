use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::snapshot::{BITCODE_PREFIX, SNAPSHOT_FILENAMES, SNAPSHOT_RECORD_VERSION};
use crate::errors::SamplerError;
use crate::types::{ItemId, SplitName, ThresholdName, UserId};

/// Serialized dataset snapshot produced by offline preprocessing.
///
/// Stored either as JSON or as a prefix-tagged bitcode payload. Map keys are
/// ordered so that loading is deterministic regardless of the encoding.
#[derive(
    Clone, Debug, Default, PartialEq, Serialize, Deserialize, bitcode::Encode, bitcode::Decode,
)]
pub struct Snapshot {
    /// Number of users; user ids are dense in `[0, users)`.
    pub users: u32,
    /// Normalized popularity per item id.
    pub popularity: BTreeMap<ItemId, f32>,
    /// Popularity-bucket thresholds, passed through untouched.
    #[serde(default)]
    pub thresholds: BTreeMap<ThresholdName, f32>,
    /// `user -> split name -> item ids`.
    pub prefs: BTreeMap<UserId, BTreeMap<SplitName, Vec<ItemId>>>,
}

impl Snapshot {
    /// Read a snapshot from `path`.
    ///
    /// A directory is probed for `data.bin` then `data.json`.
    pub fn read(path: impl AsRef<Path>) -> Result<Self, SamplerError> {
        let resolved = resolve_snapshot_path(path.as_ref())?;
        let label = resolved.display().to_string();
        let bytes = fs::read(&resolved).map_err(|err| SamplerError::DataLoad {
            snapshot: label.clone(),
            reason: err.to_string(),
        })?;
        Self::decode(&bytes, &label)
    }

    /// Decode JSON or bitcode bytes; `label` names the origin in errors.
    pub fn decode(bytes: &[u8], label: &str) -> Result<Self, SamplerError> {
        let load_error = |reason: String| SamplerError::DataLoad {
            snapshot: label.to_string(),
            reason,
        };
        match bytes.split_first() {
            Some((&BITCODE_PREFIX, rest)) => {
                let Some((&version, payload)) = rest.split_first() else {
                    return Err(load_error("bitcode snapshot is truncated".into()));
                };
                if version != SNAPSHOT_RECORD_VERSION {
                    return Err(load_error(format!(
                        "unsupported snapshot version {version} (expected {SNAPSHOT_RECORD_VERSION})"
                    )));
                }
                bitcode::decode(payload)
                    .map_err(|err| load_error(format!("corrupt bitcode snapshot: {err}")))
            }
            Some(_) => serde_json::from_slice(bytes)
                .map_err(|err| load_error(format!("malformed json snapshot: {err}"))),
            None => Err(load_error("snapshot is empty".into())),
        }
    }

    pub fn to_json_vec(&self) -> Result<Vec<u8>, SamplerError> {
        serde_json::to_vec(self).map_err(|err| {
            SamplerError::Configuration(format!("snapshot is not representable as json: {err}"))
        })
    }

    pub fn to_bitcode_vec(&self) -> Vec<u8> {
        let payload = bitcode::encode(self);
        let mut buf = Vec::with_capacity(2 + payload.len());
        buf.push(BITCODE_PREFIX);
        buf.push(SNAPSHOT_RECORD_VERSION);
        buf.extend_from_slice(&payload);
        buf
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), SamplerError> {
        fs::write(path, self.to_json_vec()?)?;
        Ok(())
    }

    pub fn write_bitcode(&self, path: impl AsRef<Path>) -> Result<(), SamplerError> {
        fs::write(path, self.to_bitcode_vec())?;
        Ok(())
    }
}

fn resolve_snapshot_path(path: &Path) -> Result<PathBuf, SamplerError> {
    if !path.is_dir() {
        return Ok(path.to_path_buf());
    }
    SNAPSHOT_FILENAMES
        .iter()
        .map(|name| path.join(name))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| SamplerError::DataLoad {
            snapshot: path.display().to_string(),
            reason: format!(
                "directory contains none of: {}",
                SNAPSHOT_FILENAMES.join(", ")
            ),
        })
}
