// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralSR — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Fixed SRCNN topology.
//!
//! The channel counts and kernel sizes are compile-time constants rather than
//! runtime tensor ranks: the tiling geometry, the halo radii, and the fused
//! layer-1 stack buffer are all sized from them, which is what keeps the
//! working set bounded in the first place.

/// Channels in the input image.
pub const INPUT_CHANNELS: usize = 1;
/// Feature channels produced by the first convolution.
pub const CONV1_CHANNELS: usize = 64;
/// Kernel edge of the first convolution.
pub const CONV1_KERNEL: usize = 9;
/// Feature channels produced by the second convolution.
pub const CONV2_CHANNELS: usize = 32;
/// Kernel edge of the second convolution.
pub const CONV2_KERNEL: usize = 1;
/// Channels in the output image.
pub const OUTPUT_CHANNELS: usize = 1;
/// Kernel edge of the final convolution.
pub const CONV3_KERNEL: usize = 5;

/// Half-kernel receptive radius of the first convolution.
pub const CONV1_RADIUS: usize = CONV1_KERNEL / 2;
/// Half-kernel receptive radius of the second convolution (zero: 1x1).
pub const CONV2_RADIUS: usize = CONV2_KERNEL / 2;
/// Half-kernel receptive radius of the final convolution.
pub const CONV3_RADIUS: usize = CONV3_KERNEL / 2;

/// Border context the loaded input patch carries beyond the tile edge: the
/// sum of the radii of every layer still to be applied to it.
pub const FUSED_HALO: usize = CONV1_RADIUS + CONV2_RADIUS + CONV3_RADIUS;

/// Reference image edge from the original deployment target.
pub const IMAGE_EDGE: usize = 255;
/// Nominal tile edge used when the caller does not choose one.
pub const DEFAULT_TILE: usize = 17;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn halo_radii_follow_kernel_sizes() {
        assert_eq!(CONV1_RADIUS, 4);
        assert_eq!(CONV2_RADIUS, 0);
        assert_eq!(CONV3_RADIUS, 2);
        assert_eq!(FUSED_HALO, 6);
    }
}
