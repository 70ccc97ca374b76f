// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralSR — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! The tiled, halo-fused forward pass.
//!
//! Per tile the engine runs four stages in strict order: load a replicated
//! border patch, evaluate layers one and two fused per position, accumulate
//! the final 5x5 convolution, and write the tile back. The loaded patch
//! carries the cumulative halo of all three layers (4 + 0 + 2 samples per
//! side); the fused buffer carries only the final layer's halo (2). Layer
//! one's 64-channel vector lives in a stack array scoped to a single fused
//! position, so no tile-sized 64-channel intermediate ever exists.

use crate::arch::{
    CONV1_CHANNELS, CONV1_KERNEL, CONV2_CHANNELS, CONV3_KERNEL, CONV3_RADIUS, DEFAULT_TILE,
    FUSED_HALO, INPUT_CHANNELS, OUTPUT_CHANNELS,
};
use crate::model::SrcnnModel;
use crate::tile::{TileDescriptor, TileGrid};
use crate::{clamp_coordinate, FeatureMap, PureResult, TensorError};
use rayon::prelude::*;

/// Per-tile working memory, allocated once per walk and overwritten tile by
/// tile. Remainder tiles shrink the logical extents without releasing the
/// backing capacity.
#[derive(Debug, Default)]
struct TileScratch {
    patch: Vec<f32>,
    patch_h: usize,
    patch_w: usize,
    fused: Vec<f32>,
    fused_h: usize,
    fused_w: usize,
    tile_out: Vec<f32>,
}

impl TileScratch {
    fn reset(&mut self, tile: &TileDescriptor) {
        self.patch_h = tile.height + 2 * FUSED_HALO;
        self.patch_w = tile.width + 2 * FUSED_HALO;
        self.patch.clear();
        self.patch.resize(self.patch_h * self.patch_w, 0.0);
        self.fused_h = tile.height + 2 * CONV3_RADIUS;
        self.fused_w = tile.width + 2 * CONV3_RADIUS;
        self.fused.clear();
        self.fused
            .resize(CONV2_CHANNELS * self.fused_h * self.fused_w, 0.0);
        self.tile_out.clear();
        self.tile_out.resize(tile.height * tile.width, 0.0);
    }
}

/// Fixed-topology SRCNN engine driving the tile walk.
#[derive(Debug, Clone)]
pub struct TiledSrcnn {
    model: SrcnnModel,
    tile_h: usize,
    tile_w: usize,
}

impl TiledSrcnn {
    /// Creates an engine with the nominal 17x17 tile of the reference target.
    pub fn new(model: SrcnnModel) -> Self {
        Self {
            model,
            tile_h: DEFAULT_TILE,
            tile_w: DEFAULT_TILE,
        }
    }

    /// Creates an engine with custom nominal tile extents.
    pub fn with_tile(model: SrcnnModel, tile_h: usize, tile_w: usize) -> PureResult<Self> {
        if tile_h == 0 || tile_w == 0 {
            return Err(TensorError::InvalidValue { label: "tile_size" });
        }
        Ok(Self {
            model,
            tile_h,
            tile_w,
        })
    }

    /// Immutable view of the wrapped parameters.
    pub fn model(&self) -> &SrcnnModel {
        &self.model
    }

    /// Nominal `(tile_h, tile_w)` extents the walk advances by.
    pub fn tile_extents(&self) -> (usize, usize) {
        (self.tile_h, self.tile_w)
    }

    fn check_input(&self, input: &FeatureMap) -> PureResult<(usize, usize)> {
        let (channels, height, width) = input.shape();
        if channels != INPUT_CHANNELS {
            return Err(TensorError::ShapeMismatch {
                left: input.shape(),
                right: (INPUT_CHANNELS, height, width),
            });
        }
        Ok((height, width))
    }

    /// Runs the forward pass, processing tiles strictly sequentially.
    pub fn forward(&self, input: &FeatureMap) -> PureResult<FeatureMap> {
        let (height, width) = self.check_input(input)?;
        let mut output = FeatureMap::zeros(OUTPUT_CHANNELS, height, width)?;
        let mut scratch = TileScratch::default();
        for tile in TileGrid::new(height, width, self.tile_h, self.tile_w)? {
            self.process_tile(input, &tile, &mut scratch);
            write_tile(&mut output, &tile, &scratch.tile_out);
        }
        Ok(output)
    }

    /// Runs the forward pass with independent tiles processed concurrently.
    ///
    /// Tiles share no mutable state, so each worker owns a private scratch
    /// and the disjoint results are stitched afterwards. Per-tile accumulation
    /// order is unchanged, which keeps this path bitwise identical to
    /// [`TiledSrcnn::forward`].
    pub fn forward_parallel(&self, input: &FeatureMap) -> PureResult<FeatureMap> {
        let (height, width) = self.check_input(input)?;
        let tiles: Vec<TileDescriptor> =
            TileGrid::new(height, width, self.tile_h, self.tile_w)?.collect();
        let computed: Vec<(TileDescriptor, Vec<f32>)> = tiles
            .into_par_iter()
            .map(|tile| {
                let mut scratch = TileScratch::default();
                self.process_tile(input, &tile, &mut scratch);
                (tile, scratch.tile_out)
            })
            .collect();
        let mut output = FeatureMap::zeros(OUTPUT_CHANNELS, height, width)?;
        for (tile, rows) in computed {
            write_tile(&mut output, &tile, &rows);
        }
        Ok(output)
    }

    fn process_tile(&self, input: &FeatureMap, tile: &TileDescriptor, scratch: &mut TileScratch) {
        scratch.reset(tile);
        load_patch(input, tile, scratch);
        self.fuse_conv1_conv2(scratch);
        self.accumulate_conv3(tile, scratch);
    }

    /// Evaluates layers one and two for every position layer three will read:
    /// the tile extent plus layer three's own halo.
    fn fuse_conv1_conv2(&self, scratch: &mut TileScratch) {
        let conv1 = self.model.conv1();
        let conv2 = self.model.conv2();
        let w1 = conv1.weight();
        let w2 = conv2.weight();
        let fused_plane = scratch.fused_h * scratch.fused_w;
        for fh in 0..scratch.fused_h {
            for fw in 0..scratch.fused_w {
                // Full layer-1 feature vector for this position only.
                let mut features = [0.0f32; CONV1_CHANNELS];
                for (oc, slot) in features.iter_mut().enumerate() {
                    let mut sum = conv1.bias()[oc];
                    // Single input channel, so the innermost channel walk of
                    // the accumulation contract is trivial.
                    for kh in 0..CONV1_KERNEL {
                        let row = (fh + kh) * scratch.patch_w + fw;
                        for kw in 0..CONV1_KERNEL {
                            let product = w1.at(oc, 0, kh, kw) * scratch.patch[row + kw];
                            sum += product;
                        }
                    }
                    *slot = sum.max(0.0);
                }
                // Immediate 1x1 reduction; the vector above never outlives it.
                for oc in 0..CONV2_CHANNELS {
                    let mut sum = conv2.bias()[oc];
                    for (ic, &feature) in features.iter().enumerate() {
                        let product = w2.at(oc, ic, 0, 0) * feature;
                        sum += product;
                    }
                    scratch.fused[oc * fused_plane + fh * scratch.fused_w + fw] = sum.max(0.0);
                }
            }
        }
    }

    /// Final 5x5 convolution over the fused buffer. Accumulator rows start at
    /// the layer bias and gather input channel by input channel, then kernel
    /// tap by kernel tap, so accumulated rounding stays reproducible. No
    /// rectifier follows this layer.
    fn accumulate_conv3(&self, tile: &TileDescriptor, scratch: &mut TileScratch) {
        let conv3 = self.model.conv3();
        let w3 = conv3.weight();
        let fused_plane = scratch.fused_h * scratch.fused_w;
        let max_fh = (scratch.fused_h - 1) as isize;
        let max_fw = (scratch.fused_w - 1) as isize;
        for oc in 0..OUTPUT_CHANNELS {
            for th in 0..tile.height {
                let out_row = &mut scratch.tile_out[th * tile.width..(th + 1) * tile.width];
                for value in out_row.iter_mut() {
                    *value = conv3.bias()[oc];
                }
                for ic in 0..CONV2_CHANNELS {
                    let plane = &scratch.fused[ic * fused_plane..(ic + 1) * fused_plane];
                    for kh in 0..CONV3_KERNEL {
                        // Indices stay in range by construction; the clamp is
                        // a safety net at the tile's own boundary.
                        let fh = clamp_coordinate((th + kh) as isize, 0, max_fh) as usize;
                        let fused_row = &plane[fh * scratch.fused_w..(fh + 1) * scratch.fused_w];
                        for kw in 0..CONV3_KERNEL {
                            let weight = w3.at(oc, ic, kh, kw);
                            for (tw, value) in out_row.iter_mut().enumerate() {
                                let fw = clamp_coordinate((tw + kw) as isize, 0, max_fw) as usize;
                                let product = weight * fused_row[fw];
                                *value += product;
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Fills the patch with the tile plus its cumulative halo, resolving every
/// coordinate through the clamp. This is the only place where out-of-bounds
/// image coordinates occur; all later stages index patch-locally.
fn load_patch(input: &FeatureMap, tile: &TileDescriptor, scratch: &mut TileScratch) {
    let max_h = (input.height() - 1) as isize;
    let max_w = (input.width() - 1) as isize;
    let halo = FUSED_HALO as isize;
    for ph in 0..scratch.patch_h {
        let ih = clamp_coordinate(tile.origin_h as isize + ph as isize - halo, 0, max_h) as usize;
        for pw in 0..scratch.patch_w {
            let iw =
                clamp_coordinate(tile.origin_w as isize + pw as isize - halo, 0, max_w) as usize;
            scratch.patch[ph * scratch.patch_w + pw] = input.at(0, ih, iw);
        }
    }
}

/// Copies computed tile rows into the output at the tile origin. Pure
/// addressing, no computation.
fn write_tile(output: &mut FeatureMap, tile: &TileDescriptor, rows: &[f32]) {
    for th in 0..tile.height {
        for tw in 0..tile.width {
            output.set(
                0,
                tile.origin_h + th,
                tile.origin_w + tw,
                rows[th * tile.width + tw],
            );
        }
    }
}
