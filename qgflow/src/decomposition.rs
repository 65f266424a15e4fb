use std::ops::Range;

use ndarray as nd;
use rayon::prelude::*;

use crate::{Field3, Float, QgError, Result};

/// Index ranges owned by one tile, in global coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tile {
    pub rank: usize,
    pub xs: usize,
    pub xe: usize,
    pub ys: usize,
    pub ye: usize,
    pub zs: usize,
    pub ze: usize,
    global_nx: usize,
    global_ny: usize,
}
impl Tile {
    pub fn x_range(&self) -> Range<usize> {
        self.xs..self.xe
    }
    pub fn y_range(&self) -> Range<usize> {
        self.ys..self.ye
    }
    pub fn z_range(&self) -> Range<usize> {
        self.zs..self.ze
    }

    pub fn local_shape(&self) -> (usize, usize, usize) {
        (self.xe - self.xs, self.ye - self.ys, self.ze - self.zs)
    }

    pub fn touches_west(&self) -> bool {
        self.xs == 0
    }
    pub fn touches_east(&self) -> bool {
        self.xe == self.global_nx
    }
    pub fn touches_south(&self) -> bool {
        self.ys == 0
    }
    pub fn touches_north(&self) -> bool {
        self.ye == self.global_ny
    }

    /// Whether `[i, j]` lies on the outermost lateral ring of the global domain.
    pub fn is_lateral_boundary(&self, i: usize, j: usize) -> bool {
        i == 0 || j == 0 || i + 1 == self.global_nx || j + 1 == self.global_ny
    }
}

/// A fixed `px × py` array of tiles, each spanning the full water column.
///
/// A tile plays the part of one process: its stencil loop runs sequentially while
/// tiles run side by side on the `rayon` pool.
#[derive(Clone, Debug)]
pub struct Decomposition {
    shape: [usize; 3],
    px: usize,
    py: usize,
    tiles: Vec<Tile>,
}
impl Decomposition {
    /// A single tile covering the whole grid.
    pub fn serial(shape: [usize; 3]) -> Self {
        let [nx, ny, nz] = shape;
        Self {
            shape,
            px: 1,
            py: 1,
            tiles: vec![Tile {
                rank: 0,
                xs: 0,
                xe: nx,
                ys: 0,
                ye: ny,
                zs: 0,
                ze: nz,
                global_nx: nx,
                global_ny: ny,
            }],
        }
    }

    pub fn new(shape: [usize; 3], px: usize, py: usize) -> Result<Self> {
        let [nx, ny, nz] = shape;
        if px == 0 || py == 0 || px > nx || py > ny {
            return Err(QgError::configuration(
                shape,
                format!("cannot split the horizontal grid into {px} x {py} tiles"),
            ));
        }
        let x_ranges = split(nx, px);
        let y_ranges = split(ny, py);
        let mut tiles = Vec::with_capacity(px * py);
        for (ty, y_range) in y_ranges.iter().enumerate() {
            for (tx, x_range) in x_ranges.iter().enumerate() {
                tiles.push(Tile {
                    rank: ty * px + tx,
                    xs: x_range.start,
                    xe: x_range.end,
                    ys: y_range.start,
                    ye: y_range.end,
                    zs: 0,
                    ze: nz,
                    global_nx: nx,
                    global_ny: ny,
                });
            }
        }
        Ok(Self {
            shape,
            px,
            py,
            tiles,
        })
    }

    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    pub fn layout(&self) -> (usize, usize) {
        (self.px, self.py)
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Runs `compute` on every tile in parallel and writes each returned block
    /// (of shape [`Tile::local_shape`]) into the tile's part of `output`.
    pub fn map_tiles<F>(&self, output: &mut Field3, compute: F)
    where
        F: Fn(&Tile) -> Field3 + Sync + Send,
    {
        let blocks: Vec<(Tile, Field3)> = self
            .tiles
            .par_iter()
            .map(|tile| (*tile, compute(tile)))
            .collect();
        for (tile, block) in blocks {
            output
                .slice_mut(nd::s![tile.x_range(), tile.y_range(), tile.z_range()])
                .assign(&block);
        }
    }
}

/// Splits `n` points into `parts` contiguous ranges, handing the remainder to the
/// leading ranges.
fn split(n: usize, parts: usize) -> Vec<Range<usize>> {
    let base = n / parts;
    let remainder = n % parts;
    let mut start = 0;
    (0..parts)
        .map(|part| {
            let len = base + usize::from(part < remainder);
            let range = start..start + len;
            start += len;
            range
        })
        .collect()
}

/// A tile's data plus a one-cell horizontal ghost ring, addressed with global indices.
///
/// Ghost cells outside the global domain hold zero.
pub struct LocalBlock {
    data: Field3,
    xs: usize,
    ys: usize,
}
impl LocalBlock {
    /// Value at global `[i, j, k]`, for `i` in `xs - 1..=xe` and `j` in `ys - 1..=ye`.
    #[inline]
    pub fn at(&self, i: usize, j: usize, k: usize) -> Float {
        self.data[[i + 1 - self.xs, j + 1 - self.ys, k]]
    }
}

pub trait HaloExchange: Sync {
    /// Gathers the tile's cells and its ghost ring from the global field.
    fn global_to_local(&self, field: &Field3, tile: &Tile) -> LocalBlock;

    /// Blocks until every tile has reached this point.
    fn barrier(&self);
}

/// Exchange for tiles sharing one address space.
///
/// Tile work is joined before [`Decomposition::map_tiles`] returns, so the
/// barrier has nothing left to wait for.
#[derive(Clone, Copy, Debug, Default)]
pub struct SharedMemoryExchange;

impl HaloExchange for SharedMemoryExchange {
    fn global_to_local(&self, field: &Field3, tile: &Tile) -> LocalBlock {
        let (nx, ny, nz) = field.dim();
        let (lx, ly, _) = tile.local_shape();
        let mut data = Field3::zeros((lx + 2, ly + 2, nz));
        let gx_start = tile.xs.saturating_sub(1);
        let gx_end = (tile.xe + 1).min(nx);
        let gy_start = tile.ys.saturating_sub(1);
        let gy_end = (tile.ye + 1).min(ny);
        let lx_start = gx_start + 1 - tile.xs;
        let ly_start = gy_start + 1 - tile.ys;
        data.slice_mut(nd::s![
            lx_start..lx_start + (gx_end - gx_start),
            ly_start..ly_start + (gy_end - gy_start),
            ..
        ])
        .assign(&field.slice(nd::s![gx_start..gx_end, gy_start..gy_end, ..]));
        LocalBlock {
            data,
            xs: tile.xs,
            ys: tile.ys,
        }
    }

    fn barrier(&self) {
        log::trace!("barrier reached");
    }
}
