use std::ops::Range;

use crate::util::math::ceil_div;

/// Edge length, in pixels, of one kernel work-group.
pub const TILE_SIZE: u32 = 8;

/// Partition of a viewport into `TILE_SIZE`x`TILE_SIZE` work-groups.
///
/// Edge tiles are partial: the kernel runs a full group there and its
/// out-of-range invocations must do nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    width: u32,
    height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    pub x: Range<u32>,
    pub y: Range<u32>,
}

impl TileGrid {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Work-group counts to dispatch.
    pub fn groups(&self) -> (u32, u32, u32) {
        (
            ceil_div(self.width, TILE_SIZE),
            ceil_div(self.height, TILE_SIZE),
            1,
        )
    }

    pub fn len(&self) -> usize {
        let (x, y, _) = self.groups();
        (x * y) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pixel ranges of every tile, clipped to the viewport, row by row.
    pub fn tiles(&self) -> impl Iterator<Item = Tile> + '_ {
        let (groups_x, groups_y, _) = self.groups();

        (0..groups_y).flat_map(move |ty| {
            (0..groups_x).map(move |tx| Tile {
                x: tx * TILE_SIZE..((tx + 1) * TILE_SIZE).min(self.width),
                y: ty * TILE_SIZE..((ty + 1) * TILE_SIZE).min(self.height),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_counts() {
        assert_eq!((100, 75, 1), TileGrid::new(800, 600).groups());
        assert_eq!((240, 135, 1), TileGrid::new(1920, 1080).groups());
        assert_eq!((1, 1, 1), TileGrid::new(1, 1).groups());
        assert_eq!((2, 2, 1), TileGrid::new(9, 16).groups());
        assert_eq!((0, 0, 1), TileGrid::new(0, 0).groups());
        assert_eq!(
            (u32::MAX / 8 + 1, 1, 1),
            TileGrid::new(u32::MAX, 1).groups()
        );
    }

    #[test]
    fn tiles_cover_viewport_once() {
        for (width, height) in [(8, 8), (13, 5), (801, 599), (17, 64)] {
            let grid = TileGrid::new(width, height);
            let mut hits = vec![0u8; (width * height) as usize];

            for tile in grid.tiles() {
                assert!(!tile.x.is_empty() && !tile.y.is_empty());
                assert!(tile.x.end <= width && tile.y.end <= height);

                for y in tile.y.clone() {
                    for x in tile.x.clone() {
                        hits[(y * width + x) as usize] += 1;
                    }
                }
            }

            assert_eq!(grid.len(), grid.tiles().count());
            assert!(hits.iter().all(|&h| h == 1), "{width}x{height}");
        }
    }

    #[test]
    fn edge_tiles_are_clipped() {
        let grid = TileGrid::new(13, 5);
        let tiles: Vec<_> = grid.tiles().collect();

        assert_eq!(
            vec![Tile { x: 0..8, y: 0..5 }, Tile { x: 8..13, y: 0..5 }],
            tiles
        );
    }
}
