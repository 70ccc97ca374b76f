// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralSR — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Whole-image, stage-at-a-time evaluation of the same three-layer math.
//!
//! The input is replicate-padded outward once by the cumulative halo, then
//! every stage runs as a plain valid convolution with all intermediate
//! feature maps materialised at full resolution. This path needs the working
//! set the tiled engine exists to avoid; it is the conformance reference for
//! the tiled path, which performs the identical operation sequence over
//! identical samples per output element and therefore agrees bitwise.

use crate::arch::FUSED_HALO;
use crate::model::{ConvParams, SrcnnModel};
use crate::{clamp_coordinate, FeatureMap, PureResult, TensorError};

/// Materialises an edge-replicated copy of the volume, `radius` samples wider
/// on every side. Only this reference path ever builds a padded copy; the
/// tiled engine resolves the same samples coordinate by coordinate.
pub fn replicate_pad(input: &FeatureMap, radius: usize) -> PureResult<FeatureMap> {
    let (channels, height, width) = input.shape();
    let max_h = (height - 1) as isize;
    let max_w = (width - 1) as isize;
    let offset = radius as isize;
    FeatureMap::from_fn(channels, height + 2 * radius, width + 2 * radius, |c, h, w| {
        let ih = clamp_coordinate(h as isize - offset, 0, max_h) as usize;
        let iw = clamp_coordinate(w as isize - offset, 0, max_w) as usize;
        input.at(c, ih, iw)
    })
}

/// Applies one convolution stage in valid-only mode, shrinking each spatial
/// axis by the kernel extent minus one.
///
/// Each output value starts at the stage bias and gathers taps input channel
/// by input channel, then kernel row, then kernel column, multiply first and
/// add second. `rectify` clamps negative sums to zero afterwards.
fn conv_valid(input: &FeatureMap, params: &ConvParams, rectify: bool) -> PureResult<FeatureMap> {
    let weight = params.weight();
    let (_, height, width) = input.shape();
    if input.channels() != weight.in_channels() {
        return Err(TensorError::ShapeMismatch {
            left: input.shape(),
            right: (weight.in_channels(), height, width),
        });
    }
    if height < weight.height() || width < weight.width() {
        return Err(TensorError::ShapeMismatch {
            left: input.shape(),
            right: (weight.in_channels(), weight.height(), weight.width()),
        });
    }
    let out_h = height - (weight.height() - 1);
    let out_w = width - (weight.width() - 1);
    let mut output = FeatureMap::zeros(weight.out_channels(), out_h, out_w)?;
    for oc in 0..weight.out_channels() {
        for h in 0..out_h {
            for w in 0..out_w {
                let mut sum = params.bias()[oc];
                for ic in 0..weight.in_channels() {
                    for kh in 0..weight.height() {
                        for kw in 0..weight.width() {
                            let product = weight.at(oc, ic, kh, kw) * input.at(ic, h + kh, w + kw);
                            sum += product;
                        }
                    }
                }
                if rectify {
                    sum = sum.max(0.0);
                }
                output.set(oc, h, w, sum);
            }
        }
    }
    Ok(output)
}

/// First stage over the pre-padded image: 9x9 valid convolution to 64
/// channels, rectified.
pub fn conv1(padded: &FeatureMap, model: &SrcnnModel) -> PureResult<FeatureMap> {
    conv_valid(padded, model.conv1(), true)
}

/// Second stage: 1x1 reduction to 32 channels, rectified.
pub fn conv2(layer1: &FeatureMap, model: &SrcnnModel) -> PureResult<FeatureMap> {
    conv_valid(layer1, model.conv2(), true)
}

/// Final stage: 5x5 valid convolution to the single output channel, no
/// rectifier.
pub fn conv3(layer2: &FeatureMap, model: &SrcnnModel) -> PureResult<FeatureMap> {
    conv_valid(layer2, model.conv3(), false)
}

/// Pads the input by the cumulative halo once and runs all three stages at
/// full resolution. Output spatial size equals the input's.
pub fn forward(model: &SrcnnModel, input: &FeatureMap) -> PureResult<FeatureMap> {
    let padded = replicate_pad(input, FUSED_HALO)?;
    let layer1 = conv1(&padded, model)?;
    let layer2 = conv2(&layer1, model)?;
    conv3(&layer2, model)
}

#[cfg(test)]
pub(crate) mod tests_support {
    use crate::model::SrcnnModel;
    use crate::ConvKernel;

    /// Deterministic mixed-sign parameters without pulling in an RNG.
    pub fn pseudo_random_model() -> SrcnnModel {
        let mut seed = 0.02f32;
        let mut next = move || {
            let value = seed;
            seed = (seed * 1.57 + 0.013).rem_euclid(0.15).max(5e-3);
            value - 0.07
        };
        let conv1 = ConvKernel::from_fn(64, 1, 9, 9, |_, _, _, _| next()).unwrap();
        let conv1_bias: Vec<f32> = (0..64).map(|_| next()).collect();
        let conv2 = ConvKernel::from_fn(32, 64, 1, 1, |_, _, _, _| next()).unwrap();
        let conv2_bias: Vec<f32> = (0..32).map(|_| next()).collect();
        let conv3 = ConvKernel::from_fn(1, 32, 5, 5, |_, _, _, _| next()).unwrap();
        let conv3_bias = vec![next()];
        SrcnnModel::new(conv1, conv1_bias, conv2, conv2_bias, conv3, conv3_bias).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padding_replicates_corners_and_edges() {
        let input = FeatureMap::from_fn(1, 3, 3, |_, h, w| (h * 3 + w) as f32).unwrap();
        let padded = replicate_pad(&input, 2).unwrap();
        assert_eq!(padded.shape(), (1, 7, 7));
        assert_eq!(padded.at(0, 0, 0), 0.0);
        assert_eq!(padded.at(0, 0, 6), 2.0);
        assert_eq!(padded.at(0, 6, 0), 6.0);
        assert_eq!(padded.at(0, 6, 6), 8.0);
        assert_eq!(padded.at(0, 3, 3), 4.0);
        assert_eq!(padded.at(0, 0, 3), 1.0);
    }

    #[test]
    fn stage_shapes_follow_topology() {
        let model = tests_support::pseudo_random_model();
        let input = FeatureMap::zeros(1, 12, 10).unwrap();
        let padded = replicate_pad(&input, FUSED_HALO).unwrap();
        assert_eq!(padded.shape(), (1, 24, 22));
        let layer1 = conv1(&padded, &model).unwrap();
        assert_eq!(layer1.shape(), (64, 16, 14));
        let layer2 = conv2(&layer1, &model).unwrap();
        assert_eq!(layer2.shape(), (32, 16, 14));
        let final_map = conv3(&layer2, &model).unwrap();
        assert_eq!(final_map.shape(), (1, 12, 10));
    }

    #[test]
    fn constant_image_stays_constant_under_replicate_padding() {
        // Replicate padding makes every window of a constant image identical,
        // so the border rows must match the interior exactly.
        let model = tests_support::pseudo_random_model();
        let input = FeatureMap::from_vec(1, 11, 11, vec![0.5; 121]).unwrap();
        let output = forward(&model, &input).unwrap();
        let reference = output.at(0, 5, 5);
        assert!(output.data().iter().all(|&v| v == reference));
    }

    #[test]
    fn bias_only_model_propagates_final_bias() {
        let model = SrcnnModel::new(
            crate::ConvKernel::zeros(64, 1, 9, 9).unwrap(),
            vec![0.0; 64],
            crate::ConvKernel::zeros(32, 64, 1, 1).unwrap(),
            vec![0.0; 32],
            crate::ConvKernel::zeros(1, 32, 5, 5).unwrap(),
            vec![5.0],
        )
        .unwrap();
        let input = FeatureMap::from_vec(1, 6, 6, vec![1.0; 36]).unwrap();
        let output = forward(&model, &input).unwrap();
        assert!(output.data().iter().all(|&v| v == 5.0));
    }

    #[test]
    fn undersized_input_is_rejected_by_valid_stage() {
        let model = tests_support::pseudo_random_model();
        let tiny = FeatureMap::zeros(1, 4, 4).unwrap();
        assert!(matches!(
            conv1(&tiny, &model),
            Err(TensorError::ShapeMismatch { .. })
        ));
    }
}
