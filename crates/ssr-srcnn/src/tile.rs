// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralSR — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use crate::{PureResult, TensorError};

/// One rectangular unit of work: an origin inside the image and the effective
/// extent of the tile at that origin.
///
/// The extent equals the nominal tile size except on the bottom and right
/// image edges, where it is clipped to the remainder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileDescriptor {
    pub origin_h: usize,
    pub origin_w: usize,
    pub height: usize,
    pub width: usize,
}

/// Row-major walk over tile origins covering the full image.
///
/// Every pixel belongs to exactly one yielded tile and no two tiles overlap,
/// whatever the nominal tile size.
#[derive(Debug, Clone)]
pub struct TileGrid {
    image_h: usize,
    image_w: usize,
    tile_h: usize,
    tile_w: usize,
    next_h: usize,
    next_w: usize,
}

impl TileGrid {
    /// Creates a grid over an `image_h x image_w` image with the given
    /// nominal tile extents. All four extents must be non-zero.
    pub fn new(image_h: usize, image_w: usize, tile_h: usize, tile_w: usize) -> PureResult<Self> {
        if image_h == 0 || image_w == 0 {
            return Err(TensorError::InvalidDimensions {
                channels: 1,
                height: image_h,
                width: image_w,
            });
        }
        if tile_h == 0 || tile_w == 0 {
            return Err(TensorError::InvalidValue { label: "tile_size" });
        }
        Ok(Self {
            image_h,
            image_w,
            tile_h,
            tile_w,
            next_h: 0,
            next_w: 0,
        })
    }

    /// Number of tiles the walk will yield.
    pub fn tile_count(&self) -> usize {
        self.image_h.div_ceil(self.tile_h) * self.image_w.div_ceil(self.tile_w)
    }
}

impl Iterator for TileGrid {
    type Item = TileDescriptor;

    fn next(&mut self) -> Option<TileDescriptor> {
        if self.next_h >= self.image_h {
            return None;
        }
        let tile = TileDescriptor {
            origin_h: self.next_h,
            origin_w: self.next_w,
            height: self.tile_h.min(self.image_h - self.next_h),
            width: self.tile_w.min(self.image_w - self.next_w),
        };
        self.next_w += self.tile_w;
        if self.next_w >= self.image_w {
            self.next_w = 0;
            self.next_h += self.tile_h;
        }
        Some(tile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coverage(image_h: usize, image_w: usize, tile_h: usize, tile_w: usize) -> Vec<u32> {
        let grid = TileGrid::new(image_h, image_w, tile_h, tile_w).unwrap();
        let mut hits = vec![0u32; image_h * image_w];
        for tile in grid {
            for h in tile.origin_h..tile.origin_h + tile.height {
                for w in tile.origin_w..tile.origin_w + tile.width {
                    hits[h * image_w + w] += 1;
                }
            }
        }
        hits
    }

    #[test]
    fn tiles_cover_exactly_once_when_divisible() {
        assert!(coverage(255, 255, 17, 17).iter().all(|&c| c == 1));
    }

    #[test]
    fn remainder_tiles_are_clipped() {
        let tiles: Vec<_> = TileGrid::new(10, 10, 4, 4).unwrap().collect();
        assert_eq!(tiles.len(), 9);
        let last = tiles.last().unwrap();
        assert_eq!((last.origin_h, last.origin_w), (8, 8));
        assert_eq!((last.height, last.width), (2, 2));
        assert!(coverage(10, 10, 4, 4).iter().all(|&c| c == 1));
    }

    #[test]
    fn oversized_tile_degenerates_to_whole_image() {
        let tiles: Vec<_> = TileGrid::new(6, 9, 32, 32).unwrap().collect();
        assert_eq!(tiles.len(), 1);
        assert_eq!(tiles[0].height, 6);
        assert_eq!(tiles[0].width, 9);
    }

    #[test]
    fn non_square_walk_is_row_major() {
        let tiles: Vec<_> = TileGrid::new(5, 7, 3, 4).unwrap().collect();
        let origins: Vec<_> = tiles.iter().map(|t| (t.origin_h, t.origin_w)).collect();
        assert_eq!(origins, vec![(0, 0), (0, 4), (3, 0), (3, 4)]);
        assert!(coverage(5, 7, 3, 4).iter().all(|&c| c == 1));
    }

    #[test]
    fn zero_tile_size_is_rejected() {
        assert!(matches!(
            TileGrid::new(8, 8, 0, 4),
            Err(TensorError::InvalidValue { label: "tile_size" })
        ));
    }

    #[test]
    fn tile_count_matches_walk() {
        let grid = TileGrid::new(255, 255, 16, 16).unwrap();
        assert_eq!(grid.tile_count(), grid.clone().count());
    }
}
