use crate::{
    config::{BoundarySpec, LateralBoundary, VerticalBoundary},
    grid::{Grid, Stratification},
    indexing::{iter_indices, CellIndex, CellIndexing, Indexing},
    Array1, Field3, Float, QgError, Result,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CellKind {
    Coupled,
    Dirichlet,
    Ghost,
}

struct Face {
    a: CellIndex,
    b: CellIndex,
    /// Face weight divided by the measure of `a`.
    coef_a: Float,
    /// Face weight divided by the measure of `b`.
    coef_b: Float,
}

/// Constant mode of the all-Neumann problem.
#[derive(Clone, Debug)]
struct NullSpace {
    /// 1 on coupled cells, 0 elsewhere.
    indicator: Array1,
    /// Cell volumes on coupled cells: the left null vector.
    weights: Array1,
    /// `indicator · weights`.
    total_weight: Float,
}

/// The PV-to-streamfunction operator `∂²/∂x² + ∂²/∂y² + ∂/∂z (f0²/N² ∂/∂z)`.
///
/// Assembled face by face: each active face between two cells carries a single
/// weight, applied with opposite signs to both of them and divided by each cell's
/// measure, so horizontal fluxes balance in every row whatever the metrics.
///
/// Ring cells that are neither Dirichlet nor coupled by any face (edges and
/// corners of the box) are ghosts: their row is an identity row and their value is
/// copied from the nearest interior cell after each solve.
#[derive(Clone, Debug)]
pub struct EllipticOperator {
    matrix: sprs::CsMat<Float>,
    indexing: CellIndexing,
    symmetric: bool,
    nullspace: Option<NullSpace>,
    /// `(ghost, source)` flat index pairs.
    ghosts: Vec<(usize, usize)>,
    /// Flat indices of the top, bottom and lateral boundary cells.
    boundary_cells: Vec<usize>,
}

impl EllipticOperator {
    pub fn build(
        grid: &Grid,
        stratification: &Stratification,
        f0: Float,
        boundary: BoundarySpec,
    ) -> Result<Self> {
        stratification.validate(grid)?;
        let shape = grid.shape();
        let [nx, ny, nz] = shape;
        if !f0.is_finite() {
            return Err(QgError::configuration(shape, format!("f0 must be finite, got {f0}")));
        }
        if f0 == 0. && boundary.lateral != LateralBoundary::Dirichlet {
            return Err(QgError::configuration(
                shape,
                "with f0 = 0 the vertical levels decouple, so Neumann lateral walls leave \
                 every level singular",
            ));
        }

        let indexing = CellIndexing::new(shape);
        let on_wall = |cell: CellIndex| {
            cell.i == 0 || cell.j == 0 || cell.i + 1 == nx || cell.j + 1 == ny
        };
        let is_dirichlet = |cell: CellIndex| {
            (boundary.lateral == LateralBoundary::Dirichlet && on_wall(cell))
                || (boundary.bottom == VerticalBoundary::Dirichlet && cell.k == 0)
                || (boundary.top == VerticalBoundary::Dirichlet && cell.k + 1 == nz)
        };

        let mut kinds: Vec<CellKind> = iter_indices(&indexing)
            .map(|cell| {
                if is_dirichlet(cell) {
                    CellKind::Dirichlet
                } else {
                    CellKind::Ghost
                }
            })
            .collect();

        let mut matrix = sprs::TriMat::new((indexing.len(), indexing.len()));
        for face in active_faces(grid, stratification, f0) {
            let a = indexing.flatten(face.a);
            let b = indexing.flatten(face.b);
            for (row, col, coef) in [(a, b, face.coef_a), (b, a, face.coef_b)] {
                if kinds[row] == CellKind::Dirichlet {
                    continue;
                }
                kinds[row] = CellKind::Coupled;
                matrix.add_triplet(row, row, -coef);
                if kinds[col] != CellKind::Dirichlet {
                    matrix.add_triplet(row, col, coef);
                }
            }
        }

        let mut ghosts = Vec::new();
        for (row, kind) in kinds.iter().enumerate() {
            if *kind == CellKind::Coupled {
                continue;
            }
            matrix.add_triplet(row, row, -1.);
            if *kind == CellKind::Ghost {
                let cell = indexing.unflatten(row);
                let source = indexing.flatten(CellIndex::new(
                    cell.i.clamp(1, nx - 2),
                    cell.j.clamp(1, ny - 2),
                    cell.k.clamp(1, nz - 2),
                ));
                if kinds[source] != CellKind::Coupled {
                    return Err(QgError::configuration(
                        shape,
                        format!("cell {:?} is isolated from the interior", cell.to_array_index()),
                    ));
                }
                ghosts.push((row, source));
            }
        }

        let boundary_cells = iter_indices(&indexing)
            .filter(|&cell| on_wall(cell) || cell.k == 0 || cell.k + 1 == nz)
            .map(|cell| indexing.flatten(cell))
            .collect();

        let nullspace = (!boundary.has_dirichlet()).then(|| {
            let indicator: Array1 = kinds
                .iter()
                .map(|&kind| if kind == CellKind::Coupled { 1. } else { 0. })
                .collect();
            let volumes: Array1 = iter_indices(&indexing)
                .map(|cell| grid.cell_area(cell.i, cell.j) * grid.dzc()[cell.k])
                .collect();
            let weights = &indicator * &volumes;
            let total_weight = indicator.dot(&weights);
            NullSpace {
                indicator,
                weights,
                total_weight,
            }
        });

        let matrix: sprs::CsMat<Float> = matrix.to_csr();
        let symmetric = grid.uniform_horizontal() && grid.uniform_vertical();
        log::info!(
            "Assembled elliptic operator on grid {shape:?}: {} non-zeros, boundary \
             top={} bottom={} lateral={}, symmetric={symmetric}, singular={}, {} ghost cells",
            matrix.nnz(),
            boundary.top,
            boundary.bottom,
            boundary.lateral,
            nullspace.is_some(),
            ghosts.len(),
        );

        Ok(Self {
            matrix,
            indexing,
            symmetric,
            nullspace,
            ghosts,
            boundary_cells,
        })
    }

    pub fn matrix(&self) -> sprs::CsMatView<Float> {
        self.matrix.view()
    }

    pub fn indexing(&self) -> &CellIndexing {
        &self.indexing
    }

    pub fn shape(&self) -> [usize; 3] {
        self.indexing.shape()
    }

    pub fn is_symmetric(&self) -> bool {
        self.symmetric
    }

    /// Whether the operator has a constant null mode (no Dirichlet wall anywhere).
    pub fn is_singular(&self) -> bool {
        self.nullspace.is_some()
    }

    /// Flat indices of every cell on the top, bottom or lateral walls.
    pub fn boundary_cells(&self) -> &[usize] {
        &self.boundary_cells
    }

    /// Removes the component along the null mode, `v -= (v·m)/(n·m) n`.
    ///
    /// Applied to a right-hand side this makes the singular system consistent;
    /// applied to a solution it fixes the free additive constant. No-op when the
    /// operator is regular.
    pub fn remove_null_component(&self, vector: &mut Array1) {
        if let Some(NullSpace {
            indicator,
            weights,
            total_weight,
        }) = &self.nullspace
        {
            let offset = vector.dot(weights) / total_weight;
            vector.scaled_add(-offset, indicator);
        }
    }

    /// Copies the nearest interior value into every ghost cell.
    pub fn fill_ghosts(&self, vector: &mut Array1) {
        for &(ghost, source) in &self.ghosts {
            vector[ghost] = vector[source];
        }
    }

    /// Evaluates `L · psi`.
    pub fn apply(&self, psi: &Field3) -> Field3 {
        let flattened = self.indexing.flatten_field(psi);
        let product: Array1 = &self.matrix * &flattened;
        self.indexing.unflatten_field(&product)
    }
}

/// Faces with a non-zero weight, in row-major order of their first cell.
fn active_faces(grid: &Grid, stratification: &Stratification, f0: Float) -> Vec<Face> {
    let [nx, ny, nz] = grid.shape();
    let interior = |index: usize, n: usize| 1 <= index && index + 1 < n;
    let dzc = grid.dzc();
    let dzw = grid.dzw();
    let n2 = stratification.n2();

    let mut faces = Vec::new();
    for i in 0..nx {
        for j in 0..ny {
            for k in 0..nz {
                let a = CellIndex::new(i, j, k);
                if interior(k, nz) {
                    if i + 1 < nx && interior(j, ny) {
                        let weight = grid.x_face_ratio(i, j);
                        faces.push(Face {
                            a,
                            b: CellIndex::new(i + 1, j, k),
                            coef_a: weight / grid.cell_area(i, j),
                            coef_b: weight / grid.cell_area(i + 1, j),
                        });
                    }
                    if j + 1 < ny && interior(i, nx) {
                        let weight = grid.y_face_ratio(i, j);
                        faces.push(Face {
                            a,
                            b: CellIndex::new(i, j + 1, k),
                            coef_a: weight / grid.cell_area(i, j),
                            coef_b: weight / grid.cell_area(i, j + 1),
                        });
                    }
                }
                if k + 1 < nz && interior(i, nx) && interior(j, ny) {
                    let weight = f0 * f0 / n2[k] / dzw[k];
                    if weight > 0. {
                        faces.push(Face {
                            a,
                            b: CellIndex::new(i, j, k + 1),
                            coef_a: weight / dzc[k],
                            coef_b: weight / dzc[k + 1],
                        });
                    }
                }
            }
        }
    }
    faces
}
