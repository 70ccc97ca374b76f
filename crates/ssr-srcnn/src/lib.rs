//! Tiled, halo-fused SRCNN forward pass built on the SpiralSR primitives.
//!
//! The engine consumes one single-channel image and produces one
//! single-channel image of the same spatial size through three cascaded
//! convolutions (9x9, 1x1, 5x5) with a rectifier after the first two. It is
//! written for hosts with a strictly bounded working set: the image is walked
//! in tiles, each tile carries just enough replicated border context for the
//! layers still ahead of it, and the first two layers are fused so the
//! 64-channel intermediate never exists at tile granularity.

pub mod arch;
pub mod engine;
pub mod io;
pub mod model;
pub mod naive;
pub mod tile;

pub use engine::TiledSrcnn;
pub use io::{load_bincode, load_json, save_bincode, save_json};
pub use model::{ConvParams, SrcnnModel};
pub use tile::{TileDescriptor, TileGrid};

pub use ssr_tensor::{clamp_coordinate, ConvKernel, FeatureMap, PureResult, TensorError};
