// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralSR — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use crate::arch::{
    CONV1_CHANNELS, CONV1_KERNEL, CONV2_CHANNELS, CONV2_KERNEL, CONV3_KERNEL, INPUT_CHANNELS,
    OUTPUT_CHANNELS,
};
use crate::{ConvKernel, PureResult, TensorError};

/// Weight block and bias vector of one convolution stage.
///
/// Validated once at construction and read-only afterwards; the engine never
/// mutates parameters during a forward pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvParams {
    weight: ConvKernel,
    bias: Vec<f32>,
}

impl ConvParams {
    /// Wraps a weight block and bias vector, checking the bias length against
    /// the kernel's output channels and rejecting non-finite values.
    pub fn new(label: &'static str, weight: ConvKernel, bias: Vec<f32>) -> PureResult<Self> {
        if bias.len() != weight.out_channels() {
            return Err(TensorError::DataLength {
                expected: weight.out_channels(),
                got: bias.len(),
            });
        }
        weight.validate_finite(label)?;
        for &value in &bias {
            if !value.is_finite() {
                return Err(TensorError::NonFiniteValue { label, value });
            }
        }
        Ok(Self { weight, bias })
    }

    /// Immutable view of the weight block.
    pub fn weight(&self) -> &ConvKernel {
        &self.weight
    }

    /// Immutable view of the per-output-channel biases.
    pub fn bias(&self) -> &[f32] {
        &self.bias
    }
}

/// The three SRCNN parameter stages, shape-checked against the fixed
/// architecture once at construction.
///
/// How the parameters were obtained is outside this crate; they arrive as
/// immutable constant tables and stay immutable for the duration of every
/// inference call.
#[derive(Debug, Clone, PartialEq)]
pub struct SrcnnModel {
    conv1: ConvParams,
    conv2: ConvParams,
    conv3: ConvParams,
}

impl SrcnnModel {
    /// Assembles a model from the six parameter tensors, failing fast on any
    /// shape that deviates from the fixed topology.
    pub fn new(
        conv1_weight: ConvKernel,
        conv1_bias: Vec<f32>,
        conv2_weight: ConvKernel,
        conv2_bias: Vec<f32>,
        conv3_weight: ConvKernel,
        conv3_bias: Vec<f32>,
    ) -> PureResult<Self> {
        Self::check_kernel(
            "conv1::weight",
            &conv1_weight,
            (CONV1_CHANNELS, INPUT_CHANNELS, CONV1_KERNEL, CONV1_KERNEL),
        )?;
        Self::check_kernel(
            "conv2::weight",
            &conv2_weight,
            (CONV2_CHANNELS, CONV1_CHANNELS, CONV2_KERNEL, CONV2_KERNEL),
        )?;
        Self::check_kernel(
            "conv3::weight",
            &conv3_weight,
            (OUTPUT_CHANNELS, CONV2_CHANNELS, CONV3_KERNEL, CONV3_KERNEL),
        )?;
        Ok(Self {
            conv1: ConvParams::new("conv1", conv1_weight, conv1_bias)?,
            conv2: ConvParams::new("conv2", conv2_weight, conv2_bias)?,
            conv3: ConvParams::new("conv3", conv3_weight, conv3_bias)?,
        })
    }

    /// Builds a model with every weight and bias set to zero. Mostly useful
    /// as a scaffold for tests and for callers that fill parameters stage by
    /// stage before wrapping them.
    pub fn zeroed() -> PureResult<Self> {
        Self::new(
            ConvKernel::zeros(CONV1_CHANNELS, INPUT_CHANNELS, CONV1_KERNEL, CONV1_KERNEL)?,
            vec![0.0; CONV1_CHANNELS],
            ConvKernel::zeros(CONV2_CHANNELS, CONV1_CHANNELS, CONV2_KERNEL, CONV2_KERNEL)?,
            vec![0.0; CONV2_CHANNELS],
            ConvKernel::zeros(OUTPUT_CHANNELS, CONV2_CHANNELS, CONV3_KERNEL, CONV3_KERNEL)?,
            vec![0.0; OUTPUT_CHANNELS],
        )
    }

    fn check_kernel(
        label: &'static str,
        kernel: &ConvKernel,
        expected: (usize, usize, usize, usize),
    ) -> PureResult<()> {
        if kernel.shape() != expected {
            return Err(TensorError::KernelShape {
                label,
                expected,
                got: kernel.shape(),
            });
        }
        Ok(())
    }

    /// Parameters of the first (9x9) convolution.
    pub fn conv1(&self) -> &ConvParams {
        &self.conv1
    }

    /// Parameters of the second (1x1) convolution.
    pub fn conv2(&self) -> &ConvParams {
        &self.conv2
    }

    /// Parameters of the final (5x5) convolution.
    pub fn conv3(&self) -> &ConvParams {
        &self.conv3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeroed_model_has_fixed_shapes() {
        let model = SrcnnModel::zeroed().unwrap();
        assert_eq!(model.conv1().weight().shape(), (64, 1, 9, 9));
        assert_eq!(model.conv2().weight().shape(), (32, 64, 1, 1));
        assert_eq!(model.conv3().weight().shape(), (1, 32, 5, 5));
        assert_eq!(model.conv2().bias().len(), 32);
    }

    #[test]
    fn wrong_kernel_shape_is_rejected() {
        let result = SrcnnModel::new(
            ConvKernel::zeros(64, 1, 5, 5).unwrap(),
            vec![0.0; 64],
            ConvKernel::zeros(32, 64, 1, 1).unwrap(),
            vec![0.0; 32],
            ConvKernel::zeros(1, 32, 5, 5).unwrap(),
            vec![0.0],
        );
        assert!(matches!(
            result,
            Err(TensorError::KernelShape {
                label: "conv1::weight",
                ..
            })
        ));
    }

    #[test]
    fn wrong_bias_length_is_rejected() {
        let result = SrcnnModel::new(
            ConvKernel::zeros(64, 1, 9, 9).unwrap(),
            vec![0.0; 63],
            ConvKernel::zeros(32, 64, 1, 1).unwrap(),
            vec![0.0; 32],
            ConvKernel::zeros(1, 32, 5, 5).unwrap(),
            vec![0.0],
        );
        assert_eq!(
            result,
            Err(TensorError::DataLength {
                expected: 64,
                got: 63
            })
        );
    }

    #[test]
    fn non_finite_weight_is_rejected() {
        let mut weight = ConvKernel::zeros(64, 1, 9, 9).unwrap();
        weight.set(3, 0, 4, 4, f32::INFINITY);
        let result = SrcnnModel::new(
            weight,
            vec![0.0; 64],
            ConvKernel::zeros(32, 64, 1, 1).unwrap(),
            vec![0.0; 32],
            ConvKernel::zeros(1, 32, 5, 5).unwrap(),
            vec![0.0],
        );
        assert!(matches!(
            result,
            Err(TensorError::NonFiniteValue { label: "conv1", .. })
        ));
    }
}
