//! `SafeTensors` reading and writing for F32 tensors.
//!
//! ```text
//! [8-byte header: u64 metadata length (little-endian)]
//! [JSON metadata: __metadata__ plus tensor names, dtypes, shapes, data_offsets]
//! [Raw tensor data: F32 values in little-endian]
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrafficError};

/// Metadata for a single tensor in `SafeTensors` format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorMetadata {
    /// Data type of the tensor. Only "F32" is written or read.
    pub dtype: String,
    pub shape: Vec<usize>,
    /// Data offsets `[start, end]` in the raw data section.
    pub data_offsets: [usize; 2],
}

/// Tensor metadata by name.
/// Uses `BTreeMap` for deterministic JSON serialization (sorted keys).
pub type SafeTensorsMetadata = BTreeMap<String, TensorMetadata>;

/// String→string metadata stored under the `__metadata__` header key.
pub type UserMetadata = BTreeMap<String, String>;

/// Named tensors as `(data, shape)` pairs.
pub type TensorMap = BTreeMap<String, (Vec<f32>, Vec<usize>)>;

/// Contents of a loaded `SafeTensors` file.
#[derive(Debug, Clone)]
pub struct LoadedSafeTensors {
    pub metadata: SafeTensorsMetadata,
    pub user_metadata: UserMetadata,
    raw_data: Vec<u8>,
}

impl LoadedSafeTensors {
    /// Decode one tensor by name.
    ///
    /// # Errors
    ///
    /// Returns [`TrafficError::Checkpoint`] when the tensor is absent or its
    /// byte range is invalid.
    pub fn tensor(&self, name: &str) -> Result<(Vec<f32>, Vec<usize>)> {
        let meta = self
            .metadata
            .get(name)
            .ok_or_else(|| TrafficError::Checkpoint(format!("missing tensor '{name}'")))?;
        let data = extract_tensor(&self.raw_data, meta)?;
        Ok((data, meta.shape.clone()))
    }

    /// Decode every tensor in the file.
    ///
    /// # Errors
    ///
    /// Fails on the first tensor that cannot be decoded.
    pub fn tensors(&self) -> Result<TensorMap> {
        self.metadata
            .keys()
            .map(|name| Ok((name.clone(), self.tensor(name)?)))
            .collect()
    }
}

/// Save tensors plus user metadata to a `SafeTensors` file.
///
/// # Errors
///
/// Returns an error if file writing or JSON serialization fails.
pub fn save_safetensors<P: AsRef<Path>>(
    path: P,
    tensors: &TensorMap,
    user_metadata: &UserMetadata,
) -> Result<()> {
    let mut header = serde_json::Map::new();

    if !user_metadata.is_empty() {
        let meta_obj: serde_json::Map<String, serde_json::Value> = user_metadata
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();
        header.insert(
            "__metadata__".to_string(),
            serde_json::Value::Object(meta_obj),
        );
    }

    let mut raw_data = Vec::new();
    let mut current_offset = 0;

    for (name, (data, shape)) in tensors {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(TrafficError::DimensionMismatch {
                expected: format!("{shape:?} ({expected} values) for '{name}'"),
                actual: format!("{} values", data.len()),
            });
        }

        let end_offset = current_offset + data.len() * 4;
        let tensor_meta = TensorMetadata {
            dtype: "F32".to_string(),
            shape: shape.clone(),
            data_offsets: [current_offset, end_offset],
        };
        let value = serde_json::to_value(&tensor_meta)
            .map_err(|e| TrafficError::Checkpoint(format!("JSON serialization failed: {e}")))?;
        header.insert(name.clone(), value);

        for &value in data {
            raw_data.extend_from_slice(&value.to_le_bytes());
        }
        current_offset = end_offset;
    }

    let metadata_json = serde_json::to_string(&header)
        .map_err(|e| TrafficError::Checkpoint(format!("JSON serialization failed: {e}")))?;
    let metadata_bytes = metadata_json.as_bytes();
    let metadata_len = metadata_bytes.len() as u64;

    let mut output = Vec::with_capacity(8 + metadata_bytes.len() + raw_data.len());
    output.extend_from_slice(&metadata_len.to_le_bytes());
    output.extend_from_slice(metadata_bytes);
    output.extend_from_slice(&raw_data);

    fs::write(path, output)?;
    Ok(())
}

/// Load a `SafeTensors` file.
///
/// # Errors
///
/// Returns an error if:
/// - File reading fails
/// - Header is invalid (< 8 bytes)
/// - JSON parsing fails
pub fn load_safetensors<P: AsRef<Path>>(path: P) -> Result<LoadedSafeTensors> {
    let bytes = fs::read(path)?;
    let metadata_len = validate_and_read_header(&bytes)?;
    let (metadata, user_metadata) = parse_metadata(&bytes, metadata_len)?;
    Ok(LoadedSafeTensors {
        metadata,
        user_metadata,
        raw_data: bytes[8 + metadata_len..].to_vec(),
    })
}

fn validate_and_read_header(bytes: &[u8]) -> Result<usize> {
    if bytes.len() < 8 {
        return Err(TrafficError::Checkpoint(format!(
            "file is {} bytes, need at least 8 bytes for header",
            bytes.len()
        )));
    }

    let mut header_bytes = [0u8; 8];
    header_bytes.copy_from_slice(&bytes[0..8]);
    let metadata_len = u64::from_le_bytes(header_bytes) as usize;

    if metadata_len == 0 {
        return Err(TrafficError::Checkpoint("metadata length is 0".to_string()));
    }

    if metadata_len > bytes.len() - 8 {
        return Err(TrafficError::Checkpoint(format!(
            "metadata length {metadata_len} exceeds file size"
        )));
    }

    Ok(metadata_len)
}

fn parse_metadata(
    bytes: &[u8],
    metadata_len: usize,
) -> Result<(SafeTensorsMetadata, UserMetadata)> {
    let metadata_str = std::str::from_utf8(&bytes[8..8 + metadata_len])
        .map_err(|e| TrafficError::Checkpoint(format!("metadata is not valid UTF-8: {e}")))?;

    let raw_metadata: serde_json::Value = serde_json::from_str(metadata_str)
        .map_err(|e| TrafficError::Checkpoint(format!("JSON parsing failed: {e}")))?;

    let serde_json::Value::Object(map) = raw_metadata else {
        return Err(TrafficError::Checkpoint(
            "header is not a JSON object".to_string(),
        ));
    };

    let mut metadata = SafeTensorsMetadata::new();
    let mut user_metadata = UserMetadata::new();

    for (key, value) in map {
        if key == "__metadata__" {
            if let serde_json::Value::Object(meta_map) = value {
                for (mk, mv) in meta_map {
                    if let serde_json::Value::String(s) = mv {
                        user_metadata.insert(mk, s);
                    }
                }
            }
            continue;
        }
        let tensor_meta: TensorMetadata = serde_json::from_value(value).map_err(|e| {
            TrafficError::Checkpoint(format!("bad metadata for tensor '{key}': {e}"))
        })?;
        metadata.insert(key, tensor_meta);
    }

    Ok((metadata, user_metadata))
}

fn extract_tensor(raw_data: &[u8], tensor_meta: &TensorMetadata) -> Result<Vec<f32>> {
    if tensor_meta.dtype != "F32" {
        return Err(TrafficError::Checkpoint(format!(
            "unsupported dtype: {}. Supported: F32",
            tensor_meta.dtype
        )));
    }

    let [start, end] = tensor_meta.data_offsets;
    if end > raw_data.len() || start > end {
        return Err(TrafficError::Checkpoint(format!(
            "invalid data offsets [{start}, {end}] for data size {}",
            raw_data.len()
        )));
    }

    let expected: usize = tensor_meta.shape.iter().product();
    if end - start != expected * 4 {
        return Err(TrafficError::Checkpoint(format!(
            "tensor byte length {} does not match shape {:?}",
            end - start,
            tensor_meta.shape
        )));
    }

    Ok(raw_data[start..end]
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_with_metadata() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("weights.safetensors");

        let mut tensors = TensorMap::new();
        tensors.insert("conv1.weight".into(), (vec![1.0, -2.0, 3.5, 4.0], vec![2, 2]));
        tensors.insert("conv1.bias".into(), (vec![0.25, 0.5], vec![2]));
        let mut meta = UserMetadata::new();
        meta.insert("hidden_channels".into(), "64".into());

        save_safetensors(&path, &tensors, &meta).expect("save");
        let loaded = load_safetensors(&path).expect("load");

        assert_eq!(loaded.user_metadata.get("hidden_channels").map(String::as_str), Some("64"));
        assert_eq!(loaded.tensors().expect("decode"), tensors);
    }

    #[test]
    fn test_load_rejects_short_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("short.safetensors");
        fs::write(&path, [1u8, 2, 3]).expect("write");

        let err = load_safetensors(&path).expect_err("short file");
        assert!(matches!(err, TrafficError::Checkpoint(_)));
    }

    #[test]
    fn test_load_rejects_oversized_header_length() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.safetensors");
        let mut bytes = 1000u64.to_le_bytes().to_vec();
        bytes.extend_from_slice(b"{}");
        fs::write(&path, bytes).expect("write");

        assert!(matches!(load_safetensors(&path), Err(TrafficError::Checkpoint(_))));
    }

    #[test]
    fn test_missing_tensor_is_checkpoint_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("one.safetensors");
        let mut tensors = TensorMap::new();
        tensors.insert("a".into(), (vec![1.0], vec![1]));
        save_safetensors(&path, &tensors, &UserMetadata::new()).expect("save");

        let loaded = load_safetensors(&path).expect("load");
        let err = loaded.tensor("b").expect_err("absent");
        assert!(err.to_string().contains("missing tensor 'b'"));
    }

    #[test]
    fn test_save_rejects_shape_mismatch() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut tensors = TensorMap::new();
        tensors.insert("w".into(), (vec![1.0, 2.0, 3.0], vec![2, 2]));
        let result = save_safetensors(dir.path().join("w.safetensors"), &tensors, &UserMetadata::new());
        assert!(matches!(result, Err(TrafficError::DimensionMismatch { .. })));
    }
}
