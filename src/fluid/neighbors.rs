//! Neighbor queries over the sorted grid.
//!
//! Neighbors are never stored. Each stage walks the 27 cells around a
//! particle and filters candidates by exact distance, calling back per
//! neighbor.

use bevy::prelude::*;

use super::spatial::{GridConfig, SpatialGrid};

/// Neighbor resolver for particles in sorted order.
#[derive(Clone, Copy)]
pub struct NeighborQuery<'a> {
    grid: &'a SpatialGrid,
    positions: &'a [Vec3],
    radius_sq: f32,
}

impl<'a> NeighborQuery<'a> {
    /// `positions` must be in the sorted order of the last `grid` build.
    pub fn new(grid: &'a SpatialGrid, positions: &'a [Vec3], radius: f32) -> Self {
        debug_assert_eq!(grid.len(), positions.len());
        Self {
            grid,
            positions,
            radius_sq: radius * radius,
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &'a [Vec3] {
        self.positions
    }

    /// Visit every particle `j` with `|x_i - x_j| <= radius`, `i` included.
    ///
    /// The callback receives `j`, the offset `x_i - x_j` and its squared length.
    #[inline]
    pub fn for_each<F>(&self, i: usize, mut visit: F)
    where
        F: FnMut(usize, Vec3, f32),
    {
        let config: &GridConfig = self.grid.config();
        let position = self.positions[i];
        let cell = config.clamp_cell(config.position_to_cell(position)).as_ivec3();

        for offset in GridConfig::neighbor_offsets() {
            let neighbor_cell = cell + *offset;
            if !config.is_valid_cell(neighbor_cell) {
                continue;
            }
            let hash = config.cell_to_hash(neighbor_cell.as_uvec3());
            let Some(range) = self.grid.cell_range(hash) else {
                continue;
            };
            for j in range {
                let r = position - self.positions[j];
                let r_sq = r.length_squared();
                if r_sq <= self.radius_sq {
                    visit(j, r, r_sq);
                }
            }
        }
    }

    /// Collect the neighbor set of `i` (sorted indices, `i` included).
    pub fn neighbors(&self, i: usize) -> Vec<usize> {
        let mut neighbors = Vec::with_capacity(64);
        self.for_each(i, |j, _, _| neighbors.push(j));
        neighbors
    }

    /// Number of neighbors of `i`, itself included.
    pub fn count(&self, i: usize) -> usize {
        let mut count = 0;
        self.for_each(i, |_, _, _| count += 1);
        count
    }
}

/// O(n²) reference enumeration, for validating the grid query.
pub fn brute_force_neighbors(positions: &[Vec3], i: usize, radius: f32) -> Vec<usize> {
    let radius_sq = radius * radius;
    let position = positions[i];
    positions
        .iter()
        .enumerate()
        .filter(|(_, p)| (position - **p).length_squared() <= radius_sq)
        .map(|(j, _)| j)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(positions: &[Vec3], cell_size: f32) -> SpatialGrid {
        let config = GridConfig {
            origin: Vec3::ZERO,
            cell_size,
            bits_per_axis: 4,
        };
        let mut grid = SpatialGrid::new(config, positions.len());
        let homogeneous: Vec<[f32; 4]> = positions.iter().map(|p| p.extend(1.0).to_array()).collect();
        grid.build(&homogeneous);
        grid
    }

    fn sorted_positions(grid: &SpatialGrid, positions: &[Vec3]) -> Vec<Vec3> {
        let mut sorted = vec![Vec3::ZERO; positions.len()];
        grid.gather(positions, &mut sorted, |p| *p);
        sorted
    }

    #[test]
    fn test_neighbors_include_self_and_close_particles() {
        let positions = vec![
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(1.05, 1.0, 1.0),
            Vec3::new(1.5, 1.0, 1.0),
            Vec3::new(3.0, 3.0, 3.0),
        ];
        let grid = build(&positions, 0.1);
        let sorted = sorted_positions(&grid, &positions);
        let query = NeighborQuery::new(&grid, &sorted, 0.1);

        let first = grid.sorted_index(0);
        let mut found: Vec<usize> = query
            .neighbors(first)
            .into_iter()
            .map(|k| grid.unsorted_index(k))
            .collect();
        found.sort_unstable();
        assert_eq!(found, vec![0, 1]);
        assert_eq!(query.count(grid.sorted_index(3)), 1);
    }

    #[test]
    fn test_neighbor_across_cell_face() {
        // Particles on either side of a cell face.
        let positions = vec![Vec3::new(0.95, 0.5, 0.5), Vec3::new(1.05, 0.5, 0.5)];
        let grid = build(&positions, 0.5);
        let sorted = sorted_positions(&grid, &positions);
        let query = NeighborQuery::new(&grid, &sorted, 0.5);
        assert_eq!(query.count(0), 2);
        assert_eq!(query.count(1), 2);
    }

    #[test]
    fn test_far_outside_grid_matches_brute_force() {
        // 16 cells of 0.1: everything past 1.6 or below 0 lands in border cells.
        let positions = vec![
            Vec3::new(1.55, 0.5, 0.5),
            Vec3::new(1.62, 0.5, 0.5),
            Vec3::new(5.0, 0.5, 0.5),
            Vec3::new(5.05, 0.5, 0.5),
            Vec3::new(9.0, 0.5, 0.5),
            Vec3::new(-3.0, -3.0, -3.0),
            Vec3::new(-3.05, -3.0, -3.0),
            Vec3::new(-0.02, 0.01, 0.0),
        ];
        let h = 0.1;
        let grid = build(&positions, h);
        let sorted = sorted_positions(&grid, &positions);
        let query = NeighborQuery::new(&grid, &sorted, h);

        for i in 0..sorted.len() {
            let mut from_grid = query.neighbors(i);
            from_grid.sort_unstable();
            assert_eq!(from_grid, brute_force_neighbors(&sorted, i, h));
        }
        assert_eq!(query.count(grid.sorted_index(2)), 2);
        assert_eq!(query.count(grid.sorted_index(4)), 1);
    }

    #[test]
    fn test_matches_brute_force_on_lattice() {
        let mut positions = Vec::new();
        for x in 0..6 {
            for y in 0..6 {
                for z in 0..6 {
                    positions.push(Vec3::new(x as f32, y as f32, z as f32) * 0.07 + Vec3::splat(0.3));
                }
            }
        }
        let h = 0.15;
        let grid = build(&positions, h);
        let sorted = sorted_positions(&grid, &positions);
        let query = NeighborQuery::new(&grid, &sorted, h);

        for i in 0..sorted.len() {
            let mut from_grid = query.neighbors(i);
            from_grid.sort_unstable();
            assert_eq!(from_grid, brute_force_neighbors(&sorted, i, h));
        }
    }
}
