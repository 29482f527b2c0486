//! Decoded tile grids.
//!
//! A [`TileGrid`] is an independent copy of a layer's tiles, indexed
//! `[x][y]`. Nothing written to it reaches the layer until it is encoded
//! back with [`Layer::set_grid`](super::Layer::set_grid).

/// Bit 31 of a global tile id: horizontal flip.
pub const FLIPPED_HORIZONTALLY: u32 = 0x8000_0000;
/// Bit 30 of a global tile id: vertical flip.
pub const FLIPPED_VERTICALLY: u32 = 0x4000_0000;
/// Bit 29 of a global tile id: anti-diagonal flip.
pub const FLIPPED_DIAGONALLY: u32 = 0x2000_0000;

const FLIP_MASK: u32 = FLIPPED_HORIZONTALLY | FLIPPED_VERTICALLY | FLIPPED_DIAGONALLY;

/// Largest identifier a tile can carry next to its flip flags.
pub const MAX_TILE_ID: u32 = !FLIP_MASK;

/// One grid cell: a tile identifier (0 = empty) and three flip flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct GridTile {
    pub id: u32,
    pub flip_x: bool,
    pub flip_y: bool,
    pub flip_d: bool,
}

impl GridTile {
    /// Splits a packed global tile id into identifier and flags.
    pub fn from_gid(gid: u32) -> Self {
        Self {
            id: gid & !FLIP_MASK,
            flip_x: gid & FLIPPED_HORIZONTALLY != 0,
            flip_y: gid & FLIPPED_VERTICALLY != 0,
            flip_d: gid & FLIPPED_DIAGONALLY != 0,
        }
    }

    /// Packs identifier and flags into a global tile id.
    pub fn gid(&self) -> u32 {
        let mut gid = self.id & !FLIP_MASK;
        if self.flip_x {
            gid |= FLIPPED_HORIZONTALLY;
        }
        if self.flip_y {
            gid |= FLIPPED_VERTICALLY;
        }
        if self.flip_d {
            gid |= FLIPPED_DIAGONALLY;
        }
        gid
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileGrid {
    width: usize,
    height: usize,
    tiles: Vec<Vec<GridTile>>,
}

impl TileGrid {
    /// A `width` x `height` grid of empty, unflipped tiles.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            tiles: vec![vec![GridTile::default(); height]; width],
        }
    }

    /// Builds a grid from global tile ids in row-major order.
    ///
    /// Returns `None` when `gids.len()` is not `width * height`.
    pub fn from_gids(width: usize, height: usize, gids: &[u32]) -> Option<Self> {
        if gids.len() != width * height {
            return None;
        }
        let mut grid = Self::new(width, height);
        for (index, gid) in gids.iter().enumerate() {
            grid.tiles[index % width][index / width] = GridTile::from_gid(*gid);
        }
        Some(grid)
    }

    /// Global tile ids in row-major order (`y` outer, `x` inner).
    pub fn to_gids(&self) -> Vec<u32> {
        let mut gids = Vec::with_capacity(self.width * self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                gids.push(self.tiles[x][y].gid());
            }
        }
        gids
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn get(&self, x: usize, y: usize) -> Option<&GridTile> {
        self.tiles.get(x).and_then(|column| column.get(y))
    }

    pub fn get_mut(&mut self, x: usize, y: usize) -> Option<&mut GridTile> {
        self.tiles.get_mut(x).and_then(|column| column.get_mut(y))
    }
}
