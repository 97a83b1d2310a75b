//! Spatial hash grid for efficient neighbor search.
//!
//! Every step the grid is rebuilt from scratch in four passes, each finishing
//! before the next starts:
//!
//! 1. hash every particle position to its cell (parallel),
//! 2. sort `(hash, index)` pairs (parallel),
//! 3. scan the sorted hashes once to find each cell's `[start, end)` range,
//! 4. gather particle attributes into sorted order (parallel).
//!
//! Hashes are the Morton (z-order) interleave of the three clamped cell
//! coordinates, so the hash space is dense and cells that are close in space
//! tend to be close in memory.

use std::ops::Range;

use bevy::prelude::*;
use rayon::prelude::*;

use super::params::SphParams;

/// Marker for a cell that holds no particle in the current build.
pub const EMPTY_CELL: u32 = u32::MAX;

/// Largest supported number of hash bits per axis.
pub const MAX_BITS_PER_AXIS: u32 = 10;

/// Geometry of the uniform grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridConfig {
    /// Minimum corner of the grid.
    pub origin: Vec3,
    /// Size of each grid cell (must be >= the smoothing length).
    pub cell_size: f32,
    /// Hash bits per axis; the grid has `2^bits` cells along each axis.
    pub bits_per_axis: u32,
}

impl GridConfig {
    pub fn from_params(params: &SphParams) -> Self {
        Self {
            origin: params.grid_origin(),
            cell_size: params.cell_size(),
            bits_per_axis: params.bits_per_axis(),
        }
    }

    /// Cells along each axis.
    pub fn resolution(&self) -> u32 {
        1 << self.bits_per_axis
    }

    /// Total number of cells (size of the hash space).
    pub fn num_cells(&self) -> usize {
        1 << (3 * self.bits_per_axis)
    }

    /// Calculate the (unclamped) grid cell for a position.
    ///
    /// Uses `floor`, so a position exactly on a cell face belongs to the
    /// cell above it and to no other.
    pub fn position_to_cell(&self, position: Vec3) -> IVec3 {
        let relative = position - self.origin;
        (relative / self.cell_size).floor().as_ivec3()
    }

    /// Check if a cell coordinate is within the grid bounds.
    pub fn is_valid_cell(&self, cell: IVec3) -> bool {
        let max = self.resolution() as i32;
        cell.cmpge(IVec3::ZERO).all() && cell.cmplt(IVec3::splat(max)).all()
    }

    /// Clamp a cell coordinate to the nearest valid cell.
    pub fn clamp_cell(&self, cell: IVec3) -> UVec3 {
        let max = self.resolution() as i32 - 1;
        cell.clamp(IVec3::ZERO, IVec3::splat(max)).as_uvec3()
    }

    /// Hash of a valid cell coordinate.
    pub fn cell_to_hash(&self, cell: UVec3) -> u32 {
        spread_bits(cell.x) | (spread_bits(cell.y) << 1) | (spread_bits(cell.z) << 2)
    }

    /// Calculate hash directly from position, clamping out-of-grid positions.
    pub fn position_to_hash(&self, position: Vec3) -> u32 {
        self.cell_to_hash(self.clamp_cell(self.position_to_cell(position)))
    }

    /// Whether a position falls inside the grid without clamping.
    pub fn contains(&self, position: Vec3) -> bool {
        self.is_valid_cell(self.position_to_cell(position))
    }

    /// Get neighboring cell offsets for 3x3x3 neighborhood.
    pub fn neighbor_offsets() -> &'static [IVec3; 27] {
        static OFFSETS: [IVec3; 27] = [
            IVec3::new(-1, -1, -1),
            IVec3::new(-1, -1, 0),
            IVec3::new(-1, -1, 1),
            IVec3::new(-1, 0, -1),
            IVec3::new(-1, 0, 0),
            IVec3::new(-1, 0, 1),
            IVec3::new(-1, 1, -1),
            IVec3::new(-1, 1, 0),
            IVec3::new(-1, 1, 1),
            IVec3::new(0, -1, -1),
            IVec3::new(0, -1, 0),
            IVec3::new(0, -1, 1),
            IVec3::new(0, 0, -1),
            IVec3::new(0, 0, 0),
            IVec3::new(0, 0, 1),
            IVec3::new(0, 1, -1),
            IVec3::new(0, 1, 0),
            IVec3::new(0, 1, 1),
            IVec3::new(1, -1, -1),
            IVec3::new(1, -1, 0),
            IVec3::new(1, -1, 1),
            IVec3::new(1, 0, -1),
            IVec3::new(1, 0, 0),
            IVec3::new(1, 0, 1),
            IVec3::new(1, 1, -1),
            IVec3::new(1, 1, 0),
            IVec3::new(1, 1, 1),
        ];
        &OFFSETS
    }
}

/// Spread the low 10 bits of `v` so two zero bits follow each one.
#[inline]
fn spread_bits(v: u32) -> u32 {
    let mut v = v & 0x3ff;
    v = (v | (v << 16)) & 0x0300_00ff;
    v = (v | (v << 8)) & 0x0300_f00f;
    v = (v | (v << 4)) & 0x030c_30c3;
    v = (v | (v << 2)) & 0x0924_9249;
    v
}

/// Summary of one grid build.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GridBuildStats {
    /// Particles outside the grid that were clamped to a border cell.
    pub clamped: usize,
    /// Cells holding at least one particle.
    pub occupied_cells: usize,
}

/// Sorted particle-to-cell mapping with per-cell ranges.
#[derive(Debug)]
pub struct SpatialGrid {
    config: GridConfig,
    /// `(hash, unsorted index)` pairs in sorted order.
    sorted: Vec<(u32, u32)>,
    /// Sorted position of each unsorted particle (inverse permutation).
    rank: Vec<u32>,
    /// First sorted index of each cell, or `EMPTY_CELL`.
    cell_start: Vec<u32>,
    /// One past the last sorted index of each cell.
    cell_end: Vec<u32>,
    /// Cells written by the last build, reset lazily by the next one.
    occupied: Vec<u32>,
}

impl SpatialGrid {
    /// Allocate a grid for up to `capacity` particles.
    pub fn new(config: GridConfig, capacity: usize) -> Self {
        let num_cells = config.num_cells();
        Self {
            config,
            sorted: Vec::with_capacity(capacity),
            rank: Vec::with_capacity(capacity),
            cell_start: vec![EMPTY_CELL; num_cells],
            cell_end: vec![EMPTY_CELL; num_cells],
            occupied: Vec::new(),
        }
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    /// Replace the grid geometry. Invalidates the current mapping.
    pub fn reconfigure(&mut self, config: GridConfig) {
        if config.num_cells() != self.cell_start.len() {
            self.cell_start = vec![EMPTY_CELL; config.num_cells()];
            self.cell_end = vec![EMPTY_CELL; config.num_cells()];
            self.occupied.clear();
        } else {
            self.clear_ranges();
        }
        self.sorted.clear();
        self.rank.clear();
        self.config = config;
    }

    /// Number of particles in the current mapping.
    pub fn len(&self) -> usize {
        self.sorted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    fn clear_ranges(&mut self) {
        for &cell in &self.occupied {
            self.cell_start[cell as usize] = EMPTY_CELL;
            self.cell_end[cell as usize] = EMPTY_CELL;
        }
        self.occupied.clear();
    }

    /// Rebuild the mapping from unsorted `(x, y, z, w)` positions.
    pub fn build(&mut self, positions: &[[f32; 4]]) -> GridBuildStats {
        self.clear_ranges();
        self.sorted.clear();
        self.rank.clear();

        let n = positions.len();
        if n == 0 {
            return GridBuildStats::default();
        }

        let config = self.config;

        // Hash
        self.sorted.par_extend(
            positions
                .par_iter()
                .enumerate()
                .map(|(i, p)| (config.position_to_hash(Vec3::from_slice(p)), i as u32)),
        );
        let clamped = positions
            .par_iter()
            .filter(|p| !config.contains(Vec3::from_slice(p.as_slice())))
            .count();

        // Sort. The index breaks ties, so the order is fully deterministic.
        self.sorted.par_sort_unstable();

        // Cell ranges
        for k in 0..n {
            let hash = self.sorted[k].0;
            if k == 0 || self.sorted[k - 1].0 != hash {
                self.cell_start[hash as usize] = k as u32;
                self.occupied.push(hash);
            }
            if k + 1 == n || self.sorted[k + 1].0 != hash {
                self.cell_end[hash as usize] = k as u32 + 1;
            }
        }

        // Inverse permutation for scattering results back.
        self.rank.resize(n, 0);
        for (k, &(_, index)) in self.sorted.iter().enumerate() {
            self.rank[index as usize] = k as u32;
        }

        GridBuildStats {
            clamped,
            occupied_cells: self.occupied.len(),
        }
    }

    /// Sorted range of a cell, `None` when the cell is empty.
    pub fn cell_range(&self, hash: u32) -> Option<Range<usize>> {
        let start = *self.cell_start.get(hash as usize)?;
        if start == EMPTY_CELL {
            return None;
        }
        Some(start as usize..self.cell_end[hash as usize] as usize)
    }

    /// Hashes of the occupied cells, in the order they appear in sorted space.
    pub fn occupied_cells(&self) -> &[u32] {
        &self.occupied
    }

    /// Cell hash of the particle at `sorted_index`.
    pub fn sorted_hash(&self, sorted_index: usize) -> u32 {
        self.sorted[sorted_index].0
    }

    /// Unsorted (stable) index of the particle at `sorted_index`.
    pub fn unsorted_index(&self, sorted_index: usize) -> usize {
        self.sorted[sorted_index].1 as usize
    }

    /// Sorted index of the unsorted particle `index`.
    pub fn sorted_index(&self, index: usize) -> usize {
        self.rank[index] as usize
    }

    /// Copy unsorted attributes into sorted order.
    pub fn gather<T, U, F>(&self, unsorted: &[T], sorted: &mut [U], convert: F)
    where
        T: Sync,
        U: Send,
        F: Fn(&T) -> U + Sync,
    {
        debug_assert_eq!(sorted.len(), self.sorted.len());
        sorted
            .par_iter_mut()
            .zip(self.sorted.par_iter())
            .for_each(|(dst, &(_, index))| *dst = convert(&unsorted[index as usize]));
    }

    /// Copy sorted attributes back to their unsorted slots.
    pub fn scatter<T, U, F>(&self, sorted: &[T], unsorted: &mut [U], convert: F)
    where
        T: Sync,
        U: Send,
        F: Fn(&T) -> U + Sync,
    {
        debug_assert_eq!(unsorted.len(), self.rank.len());
        unsorted
            .par_iter_mut()
            .zip(self.rank.par_iter())
            .for_each(|(dst, &k)| *dst = convert(&sorted[k as usize]));
    }
}
