use crate::{config::SolverConfig, Array1, Float};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LinearSolveError {
    MaxItersReached {
        iters: usize,
        residual: Float,
        target: Float,
    },
    /// An inner product that must be non-zero vanished.
    Breakdown {
        iters: usize,
        residual: Float,
        target: Float,
    },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolveStats {
    pub iters: usize,
    pub residual: Float,
    pub target: Float,
}

pub type SolveFn = fn(
    sprs::CsMatView<Float>,
    &mut Array1,
    &Array1,
    &SolverConfig,
    &mut Workspace,
) -> Result<SolveStats, LinearSolveError>;

/// Scratch vectors reused across solves.
#[derive(Clone, Debug)]
pub struct Workspace {
    inv_diag: Array1,
    r: Array1,
    r0: Array1,
    z: Array1,
    p: Array1,
    v: Array1,
    s: Array1,
    t: Array1,
}
impl Workspace {
    pub fn new(matrix: sprs::CsMatView<Float>) -> Self {
        let n = matrix.rows();
        let mut inv_diag = Array1::ones(n);
        for (row_index, vec) in matrix.outer_iterator().enumerate() {
            if let Some(&diag) = vec.get(row_index) {
                if diag != 0. {
                    inv_diag[row_index] = 1. / diag;
                }
            }
        }
        let zeros = Array1::zeros(n);
        Self {
            inv_diag,
            r: zeros.clone(),
            r0: zeros.clone(),
            z: zeros.clone(),
            p: zeros.clone(),
            v: zeros.clone(),
            s: zeros.clone(),
            t: zeros,
        }
    }
}

/// `out = matrix · x`.
fn mat_vec(matrix: sprs::CsMatView<Float>, x: &Array1, out: &mut Array1) {
    for (row_index, vec) in matrix.outer_iterator().enumerate() {
        out[row_index] = vec.iter().map(|(col_index, &val)| val * x[col_index]).sum();
    }
}

fn norm(x: &Array1) -> Float {
    x.dot(x).sqrt()
}

fn check_system(matrix: sprs::CsMatView<Float>, x: &Array1, rhs: &Array1) {
    assert!(matrix.rows() == matrix.cols());
    assert!(matrix.rows() == x.len());
    assert!(matrix.rows() == rhs.len());
    assert!(matrix.is_csr());
}

/// Solves `matrix · x = rhs` with preconditioned conjugate gradients, starting from `x`.
///
/// `matrix` must be symmetric and definite (of either sign) on the subspace the
/// right-hand side lives in.
pub fn solve_cg(
    matrix: sprs::CsMatView<Float>,
    x: &mut Array1,
    rhs: &Array1,
    config: &SolverConfig,
    workspace: &mut Workspace,
) -> Result<SolveStats, LinearSolveError> {
    check_system(matrix, x, rhs);
    let Workspace {
        inv_diag, r, z, p, v, ..
    } = workspace;
    let target = (config.rel_tol * norm(rhs)).max(config.abs_tol);

    mat_vec(matrix, x, v);
    r.assign(&(rhs - &*v));
    let mut residual = norm(r);
    if residual <= target {
        return Ok(SolveStats {
            iters: 0,
            residual,
            target,
        });
    }
    z.assign(&(&*inv_diag * &*r));
    p.assign(&*z);
    let mut rz = r.dot(&*z);

    for iter in 1..=config.max_iters {
        mat_vec(matrix, p, v);
        let p_v = p.dot(&*v);
        if p_v == 0. || !p_v.is_finite() {
            return Err(LinearSolveError::Breakdown {
                iters: iter,
                residual,
                target,
            });
        }
        let alpha = rz / p_v;
        x.scaled_add(alpha, &*p);
        r.scaled_add(-alpha, &*v);
        residual = norm(r);
        log::trace!("CG iteration {iter}: residual {residual:e}");
        if residual <= target {
            return Ok(SolveStats {
                iters: iter,
                residual,
                target,
            });
        }
        z.assign(&(&*inv_diag * &*r));
        let rz_next = r.dot(&*z);
        let beta = rz_next / rz;
        rz = rz_next;
        p.zip_mut_with(&*z, |p, &z| *p = z + beta * *p);
    }
    Err(LinearSolveError::MaxItersReached {
        iters: config.max_iters,
        residual,
        target,
    })
}

/// Solves `matrix · x = rhs` with right-preconditioned BiCGSTAB, starting from `x`.
pub fn solve_bicgstab(
    matrix: sprs::CsMatView<Float>,
    x: &mut Array1,
    rhs: &Array1,
    config: &SolverConfig,
    workspace: &mut Workspace,
) -> Result<SolveStats, LinearSolveError> {
    check_system(matrix, x, rhs);
    let Workspace {
        inv_diag,
        r,
        r0,
        z,
        p,
        v,
        s,
        t,
    } = workspace;
    let target = (config.rel_tol * norm(rhs)).max(config.abs_tol);

    mat_vec(matrix, x, v);
    r.assign(&(rhs - &*v));
    let mut residual = norm(r);
    if residual <= target {
        return Ok(SolveStats {
            iters: 0,
            residual,
            target,
        });
    }
    r0.assign(&*r);
    p.fill(0.);
    v.fill(0.);
    let (mut rho, mut alpha, mut omega) = (1., 1., 1.);

    for iter in 1..=config.max_iters {
        let breakdown = LinearSolveError::Breakdown {
            iters: iter,
            residual,
            target,
        };
        let rho_next = r0.dot(&*r);
        if rho_next == 0. || omega == 0. {
            return Err(breakdown);
        }
        let beta = (rho_next / rho) * (alpha / omega);
        rho = rho_next;
        // p = r + beta (p - omega v)
        p.zip_mut_with(&*v, |p, &v| *p -= omega * v);
        p.zip_mut_with(&*r, |p, &r| *p = r + beta * *p);

        // z = M⁻¹ p, v = A z
        z.assign(&(&*inv_diag * &*p));
        mat_vec(matrix, z, v);
        let r0_v = r0.dot(&*v);
        if r0_v == 0. || !r0_v.is_finite() {
            return Err(breakdown);
        }
        alpha = rho / r0_v;
        x.scaled_add(alpha, &*z);
        s.assign(&*r);
        s.scaled_add(-alpha, &*v);
        residual = norm(s);
        if residual <= target {
            log::trace!("BiCGSTAB iteration {iter}: residual {residual:e} (half step)");
            return Ok(SolveStats {
                iters: iter,
                residual,
                target,
            });
        }

        // z = M⁻¹ s, t = A z
        z.assign(&(&*inv_diag * &*s));
        mat_vec(matrix, z, t);
        let t_t = t.dot(&*t);
        if t_t == 0. {
            return Err(breakdown);
        }
        omega = t.dot(&*s) / t_t;
        x.scaled_add(omega, &*z);
        r.assign(&*s);
        r.scaled_add(-omega, &*t);
        residual = norm(r);
        log::trace!("BiCGSTAB iteration {iter}: residual {residual:e}");
        if residual <= target {
            return Ok(SolveStats {
                iters: iter,
                residual,
                target,
            });
        }
        if !residual.is_finite() {
            return Err(LinearSolveError::Breakdown {
                iters: iter,
                residual,
                target,
            });
        }
    }
    Err(LinearSolveError::MaxItersReached {
        iters: config.max_iters,
        residual,
        target,
    })
}
