// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralSR — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Pure Rust tensor primitives for the SpiralSR inference stack.
//!
//! Everything here is written in safe Rust with only lightweight external
//! dependencies so the super-resolution engine can run inside sandboxed or
//! memory-bounded hosts without native bindings. Feature maps are dense
//! channel-major volumes; convolution kernels are dense four-axis parameter
//! blocks. Both validate their shape once at construction and stay immutable
//! in the hot path.

use core::fmt;
use serde::{Deserialize, Serialize};
use std::error::Error;

/// Result alias used throughout the SpiralSR crates.
pub type PureResult<T> = Result<T, TensorError>;

/// Error taxonomy shared by every SpiralSR crate.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorError {
    /// A constructor received a zero extent on some axis.
    InvalidDimensions {
        channels: usize,
        height: usize,
        width: usize,
    },
    /// Data provided to a constructor does not match the declared shape.
    DataLength { expected: usize, got: usize },
    /// An operator was asked to combine volumes of incompatible shapes.
    ShapeMismatch {
        left: (usize, usize, usize),
        right: (usize, usize, usize),
    },
    /// A convolution kernel does not match the shape the architecture fixes.
    KernelShape {
        label: &'static str,
        expected: (usize, usize, usize, usize),
        got: (usize, usize, usize, usize),
    },
    /// Generic configuration violation for pure helpers.
    InvalidValue { label: &'static str },
    /// Numeric guard detected a non-finite parameter that would otherwise
    /// propagate NaNs through the whole image.
    NonFiniteValue { label: &'static str, value: f32 },
    /// Wrapper around I/O failures when persisting or restoring tensors.
    IoError { message: String },
    /// Wrapper around serde failures when deserialising tensors.
    SerializationError { message: String },
}

impl fmt::Display for TensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TensorError::InvalidDimensions {
                channels,
                height,
                width,
            } => {
                write!(
                    f,
                    "invalid volume dimensions ({channels} x {height} x {width}); every axis must be non-zero"
                )
            }
            TensorError::DataLength { expected, got } => {
                write!(f, "data length mismatch: expected {expected}, got {got}")
            }
            TensorError::ShapeMismatch { left, right } => {
                write!(
                    f,
                    "shape mismatch: left={:?}, right={:?} cannot be combined",
                    left, right
                )
            }
            TensorError::KernelShape {
                label,
                expected,
                got,
            } => {
                write!(
                    f,
                    "kernel '{label}' has shape {:?} but the architecture fixes {:?}",
                    got, expected
                )
            }
            TensorError::InvalidValue { label } => {
                write!(f, "invalid value supplied for {label}")
            }
            TensorError::NonFiniteValue { label, value } => {
                write!(f, "non-finite value detected for {label}: {value}")
            }
            TensorError::IoError { message } => {
                write!(f, "i/o error while handling tensor data: {message}")
            }
            TensorError::SerializationError { message } => {
                write!(
                    f,
                    "serialization error while handling tensor data: {message}"
                )
            }
        }
    }
}

impl Error for TensorError {}

/// Clamps `coordinate` into the inclusive `[lower, upper]` range.
///
/// This is the edge-replicate padding rule used by every convolution stage:
/// an out-of-bounds sample resolves to the nearest valid one, so no padded
/// copy of the image ever needs to exist. Both axes and all layers share this
/// single resolver.
#[inline]
pub fn clamp_coordinate(coordinate: isize, lower: isize, upper: isize) -> isize {
    debug_assert!(lower <= upper);
    coordinate.max(lower).min(upper)
}

/// Dense channel-major volume indexed by `(channel, row, column)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMap {
    channels: usize,
    height: usize,
    width: usize,
    data: Vec<f32>,
}

impl FeatureMap {
    fn validate_shape(channels: usize, height: usize, width: usize) -> PureResult<()> {
        if channels == 0 || height == 0 || width == 0 {
            return Err(TensorError::InvalidDimensions {
                channels,
                height,
                width,
            });
        }
        Ok(())
    }

    /// Creates a zero-filled volume.
    pub fn zeros(channels: usize, height: usize, width: usize) -> PureResult<Self> {
        Self::validate_shape(channels, height, width)?;
        Ok(Self {
            channels,
            height,
            width,
            data: vec![0.0; channels * height * width],
        })
    }

    /// Creates a volume from raw data. The provided vector must hold exactly
    /// `channels * height * width` samples in channel-major order.
    pub fn from_vec(
        channels: usize,
        height: usize,
        width: usize,
        data: Vec<f32>,
    ) -> PureResult<Self> {
        Self::validate_shape(channels, height, width)?;
        let expected = channels * height * width;
        if data.len() != expected {
            return Err(TensorError::DataLength {
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            channels,
            height,
            width,
            data,
        })
    }

    /// Constructs a volume by applying a generator to each coordinate.
    pub fn from_fn<F>(channels: usize, height: usize, width: usize, mut f: F) -> PureResult<Self>
    where
        F: FnMut(usize, usize, usize) -> f32,
    {
        Self::validate_shape(channels, height, width)?;
        let mut data = Vec::with_capacity(channels * height * width);
        for c in 0..channels {
            for h in 0..height {
                for w in 0..width {
                    data.push(f(c, h, w));
                }
            }
        }
        Ok(Self {
            channels,
            height,
            width,
            data,
        })
    }

    /// Returns the `(channels, height, width)` triple of the volume.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.channels, self.height, self.width)
    }

    /// Number of channels stored in the volume.
    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Spatial height of every channel.
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Spatial width of every channel.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Total number of samples stored in the volume.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` when the volume stores no samples. Construction rejects
    /// zero extents, so this only holds for moved-out intermediates.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    fn index(&self, channel: usize, row: usize, col: usize) -> usize {
        (channel * self.height + row) * self.width + col
    }

    /// Reads one sample. Callers stay in bounds; the tiled engine resolves
    /// every border coordinate through [`clamp_coordinate`] first.
    #[inline]
    pub fn at(&self, channel: usize, row: usize, col: usize) -> f32 {
        debug_assert!(channel < self.channels && row < self.height && col < self.width);
        self.data[self.index(channel, row, col)]
    }

    /// Writes one sample.
    #[inline]
    pub fn set(&mut self, channel: usize, row: usize, col: usize, value: f32) {
        debug_assert!(channel < self.channels && row < self.height && col < self.width);
        let index = self.index(channel, row, col);
        self.data[index] = value;
    }

    /// Immutable view of the backing channel-major storage.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Mutable view of the backing channel-major storage.
    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Immutable view of a single channel's row-major plane.
    pub fn channel(&self, channel: usize) -> &[f32] {
        let plane = self.height * self.width;
        &self.data[channel * plane..(channel + 1) * plane]
    }

    /// Rejects volumes carrying NaN or infinite samples.
    pub fn validate_finite(&self, label: &'static str) -> PureResult<()> {
        for &value in &self.data {
            if !value.is_finite() {
                return Err(TensorError::NonFiniteValue { label, value });
            }
        }
        Ok(())
    }
}

/// Dense convolution parameter block indexed by
/// `(output channel, input channel, kernel row, kernel column)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvKernel {
    out_channels: usize,
    in_channels: usize,
    height: usize,
    width: usize,
    data: Vec<f32>,
}

impl ConvKernel {
    fn validate_shape(
        out_channels: usize,
        in_channels: usize,
        height: usize,
        width: usize,
    ) -> PureResult<()> {
        if out_channels == 0 || in_channels == 0 || height == 0 || width == 0 {
            return Err(TensorError::InvalidDimensions {
                channels: out_channels * in_channels,
                height,
                width,
            });
        }
        Ok(())
    }

    /// Creates a zero-filled kernel block.
    pub fn zeros(
        out_channels: usize,
        in_channels: usize,
        height: usize,
        width: usize,
    ) -> PureResult<Self> {
        Self::validate_shape(out_channels, in_channels, height, width)?;
        Ok(Self {
            out_channels,
            in_channels,
            height,
            width,
            data: vec![0.0; out_channels * in_channels * height * width],
        })
    }

    /// Creates a kernel block from raw data laid out with the kernel column
    /// fastest, then kernel row, then input channel, then output channel.
    pub fn from_vec(
        out_channels: usize,
        in_channels: usize,
        height: usize,
        width: usize,
        data: Vec<f32>,
    ) -> PureResult<Self> {
        Self::validate_shape(out_channels, in_channels, height, width)?;
        let expected = out_channels * in_channels * height * width;
        if data.len() != expected {
            return Err(TensorError::DataLength {
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            out_channels,
            in_channels,
            height,
            width,
            data,
        })
    }

    /// Constructs a kernel block by applying a generator to each coordinate.
    pub fn from_fn<F>(
        out_channels: usize,
        in_channels: usize,
        height: usize,
        width: usize,
        mut f: F,
    ) -> PureResult<Self>
    where
        F: FnMut(usize, usize, usize, usize) -> f32,
    {
        Self::validate_shape(out_channels, in_channels, height, width)?;
        let mut data = Vec::with_capacity(out_channels * in_channels * height * width);
        for oc in 0..out_channels {
            for ic in 0..in_channels {
                for kh in 0..height {
                    for kw in 0..width {
                        data.push(f(oc, ic, kh, kw));
                    }
                }
            }
        }
        Ok(Self {
            out_channels,
            in_channels,
            height,
            width,
            data,
        })
    }

    /// Returns the `(out_channels, in_channels, height, width)` quadruple.
    pub fn shape(&self) -> (usize, usize, usize, usize) {
        (self.out_channels, self.in_channels, self.height, self.width)
    }

    /// Number of output channels the kernel produces.
    #[inline]
    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    /// Number of input channels the kernel consumes.
    #[inline]
    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    /// Kernel height.
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Kernel width.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Reads one tap weight.
    #[inline]
    pub fn at(&self, out_channel: usize, in_channel: usize, row: usize, col: usize) -> f32 {
        debug_assert!(
            out_channel < self.out_channels
                && in_channel < self.in_channels
                && row < self.height
                && col < self.width
        );
        self.data[((out_channel * self.in_channels + in_channel) * self.height + row) * self.width
            + col]
    }

    /// Writes one tap weight.
    #[inline]
    pub fn set(&mut self, out_channel: usize, in_channel: usize, row: usize, col: usize, value: f32) {
        debug_assert!(
            out_channel < self.out_channels
                && in_channel < self.in_channels
                && row < self.height
                && col < self.width
        );
        let index = ((out_channel * self.in_channels + in_channel) * self.height + row)
            * self.width
            + col;
        self.data[index] = value;
    }

    /// Immutable view of the backing storage.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Rejects kernels carrying NaN or infinite weights.
    pub fn validate_finite(&self, label: &'static str) -> PureResult<()> {
        for &value in &self.data {
            if !value.is_finite() {
                return Err(TensorError::NonFiniteValue { label, value });
            }
        }
        Ok(())
    }
}
