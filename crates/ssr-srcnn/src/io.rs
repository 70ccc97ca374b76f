// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralSR — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use crate::model::SrcnnModel;
use crate::{ConvKernel, PureResult, TensorError};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

#[derive(Clone, Debug, Serialize, Deserialize)]
struct StoredKernel {
    out_channels: usize,
    in_channels: usize,
    height: usize,
    width: usize,
    data: Vec<f32>,
}

impl StoredKernel {
    fn from_kernel(kernel: &ConvKernel) -> StoredKernel {
        let (out_channels, in_channels, height, width) = kernel.shape();
        StoredKernel {
            out_channels,
            in_channels,
            height,
            width,
            data: kernel.data().to_vec(),
        }
    }

    fn into_kernel(self) -> PureResult<ConvKernel> {
        ConvKernel::from_vec(
            self.out_channels,
            self.in_channels,
            self.height,
            self.width,
            self.data,
        )
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct StoredStage {
    weight: StoredKernel,
    bias: Vec<f32>,
}

/// On-disk form of the six parameter tensors.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct ModelSnapshot {
    conv1: StoredStage,
    conv2: StoredStage,
    conv3: StoredStage,
}

impl ModelSnapshot {
    fn from_model(model: &SrcnnModel) -> ModelSnapshot {
        let stage = |weight: &ConvKernel, bias: &[f32]| StoredStage {
            weight: StoredKernel::from_kernel(weight),
            bias: bias.to_vec(),
        };
        ModelSnapshot {
            conv1: stage(model.conv1().weight(), model.conv1().bias()),
            conv2: stage(model.conv2().weight(), model.conv2().bias()),
            conv3: stage(model.conv3().weight(), model.conv3().bias()),
        }
    }

    /// Restoring goes through [`SrcnnModel::new`], so a snapshot with foreign
    /// shapes or non-finite values is rejected rather than inferred around.
    fn into_model(self) -> PureResult<SrcnnModel> {
        SrcnnModel::new(
            self.conv1.weight.into_kernel()?,
            self.conv1.bias,
            self.conv2.weight.into_kernel()?,
            self.conv2.bias,
            self.conv3.weight.into_kernel()?,
            self.conv3.bias,
        )
    }
}

fn io_error(err: std::io::Error) -> TensorError {
    TensorError::IoError {
        message: err.to_string(),
    }
}

fn serde_error(err: impl ToString) -> TensorError {
    TensorError::SerializationError {
        message: err.to_string(),
    }
}

/// Persists the model parameters as pretty-printed JSON.
pub fn save_json<P: AsRef<Path>>(model: &SrcnnModel, path: P) -> PureResult<()> {
    let snapshot = ModelSnapshot::from_model(model);
    let file = File::create(path.as_ref()).map_err(io_error)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, &snapshot).map_err(serde_error)?;
    Ok(())
}

/// Restores model parameters from a JSON snapshot.
pub fn load_json<P: AsRef<Path>>(path: P) -> PureResult<SrcnnModel> {
    let file = File::open(path.as_ref()).map_err(io_error)?;
    let reader = BufReader::new(file);
    let snapshot: ModelSnapshot = serde_json::from_reader(reader).map_err(serde_error)?;
    snapshot.into_model()
}

/// Persists the model parameters in the compact bincode form.
pub fn save_bincode<P: AsRef<Path>>(model: &SrcnnModel, path: P) -> PureResult<()> {
    let snapshot = ModelSnapshot::from_model(model);
    let file = File::create(path.as_ref()).map_err(io_error)?;
    let writer = BufWriter::new(file);
    bincode::serialize_into(writer, &snapshot).map_err(serde_error)?;
    Ok(())
}

/// Restores model parameters from a bincode snapshot.
pub fn load_bincode<P: AsRef<Path>>(path: P) -> PureResult<SrcnnModel> {
    let file = File::open(path.as_ref()).map_err(io_error)?;
    let reader = BufReader::new(file);
    let snapshot: ModelSnapshot = bincode::deserialize_from(reader).map_err(serde_error)?;
    snapshot.into_model()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naive::tests_support::pseudo_random_model;
    use tempfile::tempdir;

    #[test]
    fn json_roundtrip_preserves_parameters() {
        let model = pseudo_random_model();
        let dir = tempdir().unwrap();
        let path = dir.path().join("srcnn.json");
        save_json(&model, &path).unwrap();
        let restored = load_json(&path).unwrap();
        assert_eq!(model, restored);
    }

    #[test]
    fn bincode_roundtrip_preserves_parameters() {
        let model = pseudo_random_model();
        let dir = tempdir().unwrap();
        let path = dir.path().join("srcnn.bin");
        save_bincode(&model, &path).unwrap();
        let restored = load_bincode(&path).unwrap();
        assert_eq!(model, restored);
    }

    #[test]
    fn missing_file_surfaces_io_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.json");
        assert!(matches!(
            load_json(&path),
            Err(TensorError::IoError { .. })
        ));
    }

    #[test]
    fn foreign_shape_snapshot_is_rejected() {
        // A 3x3 first stage deserialises fine but must fail model validation.
        let snapshot = ModelSnapshot {
            conv1: StoredStage {
                weight: StoredKernel {
                    out_channels: 64,
                    in_channels: 1,
                    height: 3,
                    width: 3,
                    data: vec![0.0; 64 * 9],
                },
                bias: vec![0.0; 64],
            },
            conv2: StoredStage {
                weight: StoredKernel {
                    out_channels: 32,
                    in_channels: 64,
                    height: 1,
                    width: 1,
                    data: vec![0.0; 32 * 64],
                },
                bias: vec![0.0; 32],
            },
            conv3: StoredStage {
                weight: StoredKernel {
                    out_channels: 1,
                    in_channels: 32,
                    height: 5,
                    width: 5,
                    data: vec![0.0; 32 * 25],
                },
                bias: vec![0.0],
            },
        };
        assert!(matches!(
            snapshot.into_model(),
            Err(TensorError::KernelShape {
                label: "conv1::weight",
                ..
            })
        ));
    }
}
