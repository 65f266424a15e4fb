use crate::{grid::Grid, Field3, Float};

/// Geostrophic velocity `(u, v) = (-∂psi/∂y, ∂psi/∂x)` at an interior cell by
/// centred differences.
fn velocity(grid: &Grid, psi: &Field3, i: usize, j: usize, k: usize) -> (Float, Float) {
    let (dx, dy) = grid.spacing(i, j);
    let u = -(psi[[i, j + 1, k]] - psi[[i, j - 1, k]]) / (2. * dy);
    let v = (psi[[i + 1, j, k]] - psi[[i - 1, j, k]]) / (2. * dx);
    (u, v)
}

fn interior_cells(grid: &Grid) -> impl Iterator<Item = (usize, usize, usize)> {
    let [nx, ny, nz] = grid.shape();
    itertools::iproduct!(1..nx - 1, 1..ny - 1, 0..nz)
}

/// `½ Σ (u² + v²) · volume` over the interior columns.
pub fn kinetic_energy(grid: &Grid, psi: &Field3) -> Float {
    interior_cells(grid)
        .map(|(i, j, k)| {
            let (u, v) = velocity(grid, psi, i, j, k);
            0.5 * (u * u + v * v) * grid.cell_area(i, j) * grid.dzc()[k]
        })
        .sum()
}

/// Largest advective Courant number `(|u|/dx + |v|/dy) · dt` over the interior columns.
pub fn cfl(grid: &Grid, psi: &Field3, dt: Float) -> Float {
    interior_cells(grid)
        .map(|(i, j, k)| {
            let (u, v) = velocity(grid, psi, i, j, k);
            let (dx, dy) = grid.spacing(i, j);
            (u.abs() / dx + v.abs() / dy) * dt
        })
        .fold(0., Float::max)
}
