use ndarray as nd;

use crate::{Array1, Array2, Float, QgError, Result};

/// Horizontal metric terms on the T/U/V points of a curvilinear grid.
///
/// All arrays have shape `(Nx, Ny)`. U point `[i, j]` sits between T points `[i, j]` and
/// `[i + 1, j]`; V point `[i, j]` between `[i, j]` and `[i, j + 1]`.
#[derive(Clone, Debug, PartialEq)]
pub struct CurvilinearMetrics {
    pub dxt: Array2,
    pub dyt: Array2,
    pub dxu: Array2,
    pub dyu: Array2,
    pub dxv: Array2,
    pub dyv: Array2,
    /// Coriolis parameter at T points.
    pub f: Array2,
}

#[derive(Clone, Debug, PartialEq)]
pub enum HorizontalGrid {
    Uniform { dx: Float, dy: Float },
    Curvilinear(CurvilinearMetrics),
}

/// Vertical spacing.
#[derive(Clone, Debug, PartialEq)]
pub struct VerticalGrid {
    /// Thickness of each layer, length `Nz`.
    dzc: Array1,
    /// Distance between consecutive layer centres, length `Nz - 1`.
    dzw: Array1,
}
impl VerticalGrid {
    pub fn new(dzc: Array1, dzw: Array1) -> Self {
        Self { dzc, dzw }
    }

    pub fn uniform(nz: usize, dz: Float) -> Self {
        Self {
            dzc: Array1::from_elem(nz, dz),
            dzw: Array1::from_elem(nz.saturating_sub(1), dz),
        }
    }

    /// Builds the spacings from layer-centre depths `zc` (length `Nz`) and layer-face
    /// depths `zf` (length `Nz + 1`), both increasing upwards.
    pub fn from_levels(zc: &Array1, zf: &Array1) -> Result<Self> {
        if zc.is_empty() || zf.len() != zc.len() + 1 {
            return Err(QgError::configuration(
                [0, 0, zc.len()],
                format!(
                    "{} layer centres need {} layer faces, got {}",
                    zc.len(),
                    zc.len() + 1,
                    zf.len()
                ),
            ));
        }
        let dzc = &zf.slice(nd::s![1..]) - &zf.slice(nd::s![..-1]);
        let dzw = &zc.slice(nd::s![1..]) - &zc.slice(nd::s![..-1]);
        Ok(Self { dzc, dzw })
    }

    pub fn nz(&self) -> usize {
        self.dzc.len()
    }

    pub fn dzc(&self) -> &Array1 {
        &self.dzc
    }

    pub fn dzw(&self) -> &Array1 {
        &self.dzw
    }
}

/// Structured ocean grid. Read-only after construction.
#[derive(Clone, Debug)]
pub struct Grid {
    nx: usize,
    ny: usize,
    horizontal: HorizontalGrid,
    vertical: VerticalGrid,
    uniform_vertical: bool,
    k_down: usize,
    k_up: usize,
}
impl Grid {
    pub fn uniform(nx: usize, ny: usize, dx: Float, dy: Float, vertical: VerticalGrid) -> Result<Self> {
        Self::new(nx, ny, HorizontalGrid::Uniform { dx, dy }, vertical)
    }

    pub fn curvilinear(metrics: CurvilinearMetrics, vertical: VerticalGrid) -> Result<Self> {
        let (nx, ny) = metrics.dxt.dim();
        Self::new(nx, ny, HorizontalGrid::Curvilinear(metrics), vertical)
    }

    fn new(nx: usize, ny: usize, horizontal: HorizontalGrid, vertical: VerticalGrid) -> Result<Self> {
        let nz = vertical.nz();
        let shape = [nx, ny, nz];
        let fail = |reason: String| QgError::configuration(shape, reason);

        if nx < 3 || ny < 3 {
            return Err(fail("at least 3 points are needed in each horizontal direction".into()));
        }
        if nz < 4 {
            return Err(fail("at least 4 vertical levels are needed".into()));
        }
        if vertical.dzw.len() + 1 != nz {
            return Err(fail(format!(
                "dzw has {} entries, expected {}",
                vertical.dzw.len(),
                nz - 1
            )));
        }
        for (name, spacing) in [("dzc", &vertical.dzc), ("dzw", &vertical.dzw)] {
            check_positive(name, spacing.iter().copied()).map_err(fail)?;
        }

        match &horizontal {
            HorizontalGrid::Uniform { dx, dy } => {
                check_positive("dx/dy", [*dx, *dy].into_iter()).map_err(fail)?;
            }
            HorizontalGrid::Curvilinear(metrics) => {
                for (name, metric) in [
                    ("dxt", &metrics.dxt),
                    ("dyt", &metrics.dyt),
                    ("dxu", &metrics.dxu),
                    ("dyu", &metrics.dyu),
                    ("dxv", &metrics.dxv),
                    ("dyv", &metrics.dyv),
                ] {
                    if metric.dim() != (nx, ny) {
                        return Err(fail(format!(
                            "metric {name} has shape {:?}, expected {:?}",
                            metric.dim(),
                            (nx, ny)
                        )));
                    }
                    check_positive(name, metric.iter().copied()).map_err(fail)?;
                }
                if metrics.f.dim() != (nx, ny) {
                    return Err(fail(format!(
                        "Coriolis field has shape {:?}, expected {:?}",
                        metrics.f.dim(),
                        (nx, ny)
                    )));
                }
                if metrics.f.iter().any(|f| !f.is_finite()) {
                    return Err(fail("Coriolis field contains non-finite values".into()));
                }
            }
        }

        let uniform_vertical = is_constant(&vertical.dzc) && is_constant(&vertical.dzw);
        Ok(Self {
            nx,
            ny,
            horizontal,
            vertical,
            uniform_vertical,
            k_down: 1,
            k_up: nz - 2,
        })
    }

    /// Overrides the near-bottom/near-surface density layer markers.
    pub fn with_markers(self, k_down: usize, k_up: usize) -> Result<Self> {
        if !(1 <= k_down && k_down < k_up && k_up + 2 <= self.nz()) {
            return Err(QgError::configuration(
                self.shape(),
                format!(
                    "markers k_down={k_down}, k_up={k_up} must satisfy 1 <= k_down < k_up <= {}",
                    self.nz() - 2
                ),
            ));
        }
        Ok(Self {
            k_down,
            k_up,
            ..self
        })
    }

    pub fn nx(&self) -> usize {
        self.nx
    }
    pub fn ny(&self) -> usize {
        self.ny
    }
    pub fn nz(&self) -> usize {
        self.vertical.nz()
    }
    pub fn shape(&self) -> [usize; 3] {
        [self.nx, self.ny, self.nz()]
    }

    pub fn horizontal(&self) -> &HorizontalGrid {
        &self.horizontal
    }
    pub fn vertical(&self) -> &VerticalGrid {
        &self.vertical
    }
    pub fn dzc(&self) -> &Array1 {
        &self.vertical.dzc
    }
    pub fn dzw(&self) -> &Array1 {
        &self.vertical.dzw
    }

    pub fn k_down(&self) -> usize {
        self.k_down
    }
    pub fn k_up(&self) -> usize {
        self.k_up
    }

    pub fn uniform_horizontal(&self) -> bool {
        matches!(self.horizontal, HorizontalGrid::Uniform { .. })
    }
    pub fn uniform_vertical(&self) -> bool {
        self.uniform_vertical
    }

    /// Horizontal area of the T cell at `[i, j]`.
    pub fn cell_area(&self, i: usize, j: usize) -> Float {
        match &self.horizontal {
            HorizontalGrid::Uniform { dx, dy } => dx * dy,
            HorizontalGrid::Curvilinear(metrics) => metrics.dxt[[i, j]] * metrics.dyt[[i, j]],
        }
    }

    /// Face length over centre distance for the face between `[i, j]` and `[i + 1, j]`.
    pub fn x_face_ratio(&self, i: usize, j: usize) -> Float {
        match &self.horizontal {
            HorizontalGrid::Uniform { dx, dy } => dy / dx,
            HorizontalGrid::Curvilinear(metrics) => metrics.dyu[[i, j]] / metrics.dxu[[i, j]],
        }
    }

    /// Face length over centre distance for the face between `[i, j]` and `[i, j + 1]`.
    pub fn y_face_ratio(&self, i: usize, j: usize) -> Float {
        match &self.horizontal {
            HorizontalGrid::Uniform { dx, dy } => dx / dy,
            HorizontalGrid::Curvilinear(metrics) => metrics.dxv[[i, j]] / metrics.dyv[[i, j]],
        }
    }

    /// Local T-point spacings `(dx, dy)` at `[i, j]`.
    pub fn spacing(&self, i: usize, j: usize) -> (Float, Float) {
        match &self.horizontal {
            HorizontalGrid::Uniform { dx, dy } => (*dx, *dy),
            HorizontalGrid::Curvilinear(metrics) => (metrics.dxt[[i, j]], metrics.dyt[[i, j]]),
        }
    }
}

/// Squared buoyancy frequency `N²` on the `Nz - 1` faces between layers.
#[derive(Clone, Debug, PartialEq)]
pub struct Stratification {
    n2: Array1,
}
impl Stratification {
    pub fn new(n2: Array1) -> Self {
        Self { n2 }
    }

    pub fn constant(nz: usize, n2: Float) -> Self {
        Self {
            n2: Array1::from_elem(nz.saturating_sub(1), n2),
        }
    }

    pub fn n2(&self) -> &Array1 {
        &self.n2
    }

    pub fn validate(&self, grid: &Grid) -> Result<()> {
        if self.n2.len() + 1 != grid.nz() {
            return Err(QgError::configuration(
                grid.shape(),
                format!(
                    "N² profile has {} entries, expected {}",
                    self.n2.len(),
                    grid.nz() - 1
                ),
            ));
        }
        check_positive("N²", self.n2.iter().copied())
            .map_err(|reason| QgError::configuration(grid.shape(), reason))
    }
}

fn check_positive(name: &str, mut values: impl Iterator<Item = Float>) -> std::result::Result<(), String> {
    match values.position(|value| !(value.is_finite() && value > 0.)) {
        Some(position) => Err(format!(
            "{name} must be strictly positive (entry {position} is not)"
        )),
        None => Ok(()),
    }
}

fn is_constant(values: &Array1) -> bool {
    values.first().map_or(true, |&first| {
        values
            .iter()
            .all(|&value| (value - first).abs() <= 1e-12 * first.abs())
    })
}
