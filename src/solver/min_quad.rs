//! Quadratic minimisation with fixed values and linear equality constraints.
//!
//! Solves
//!
//! ```text
//! minimise   ½ xᵀ Q x + xᵀ B
//! subject to C x = beq,   x[known] = Y
//! ```
//!
//! by eliminating the known unknowns and factorizing the KKT system of the
//! remaining ones once. The factorization is an SVD, so redundant constraint
//! rows (e.g. the dependent continuity rows around a closed face loop) are
//! tolerated; what is rejected is a system whose unknowns are not uniquely
//! determined, and right-hand sides that violate the constraints.

use nalgebra::{DMatrix, DVector, SVD};
use nalgebra_sparse::CsrMatrix;
use serde::{Deserialize, Serialize};

use crate::mesh_error::PolyMeshError;

/// Backend contract for the one-time factorization / repeated solve split.
pub trait FixedQuadraticSolver: Sized {
    /// Factorize for a quadratic term `Q`, fixed indices `known` and
    /// constraint matrix `C`.
    fn precompute(
        quadratic: &CsrMatrix<f64>,
        known: &[usize],
        constraints: &CsrMatrix<f64>,
        params: &MinQuadParams,
    ) -> Result<Self, PolyMeshError>;

    /// Solve for a linear term, fixed values (ordered like `known`) and
    /// constraint right-hand side. Returns the full unknown vector.
    fn solve(
        &self,
        linear: &DVector<f64>,
        known_values: &DVector<f64>,
        constraint_rhs: &DVector<f64>,
    ) -> Result<DVector<f64>, PolyMeshError>;
}

/// Tuning shared by [`FixedQuadraticSolver`] backends.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinQuadParams {
    /// Singular values below `rank_tolerance * max_singular_value` count as zero.
    pub rank_tolerance: f64,
    /// A solve is inconsistent when `‖K s − r‖ > residual_tolerance (1 + ‖r‖)`.
    pub residual_tolerance: f64,
}

impl Default for MinQuadParams {
    fn default() -> Self {
        Self {
            rank_tolerance: 1e-10,
            residual_tolerance: 1e-8,
        }
    }
}

#[derive(Copy, Clone, Debug)]
enum Column {
    Known(usize),
    Unknown(usize),
}

/// Dense KKT reference implementation of [`FixedQuadraticSolver`].
///
/// `Q` and `C` stay sparse; only the KKT blocks over the free unknowns are
/// densified, and the SVD of that `(free + constraints)²` matrix bounds the
/// practical problem size to a few thousand unknowns.
#[derive(Clone, Debug)]
pub struct MinQuadWithFixed {
    size: usize,
    known: Vec<usize>,
    unknown: Vec<usize>,
    /// `Q[unknown, known]`
    q_uk: DMatrix<f64>,
    /// `C[:, known]`
    c_k: DMatrix<f64>,
    kkt: DMatrix<f64>,
    kkt_svd: SVD<f64, nalgebra::Dyn, nalgebra::Dyn>,
    cutoff: f64,
    residual_tolerance: f64,
}

impl MinQuadWithFixed {
    /// Total number of unknowns, known ones included.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn known(&self) -> &[usize] {
        &self.known
    }
}

impl FixedQuadraticSolver for MinQuadWithFixed {
    fn precompute(
        quadratic: &CsrMatrix<f64>,
        known: &[usize],
        constraints: &CsrMatrix<f64>,
        params: &MinQuadParams,
    ) -> Result<Self, PolyMeshError> {
        let n = quadratic.nrows();
        if quadratic.ncols() != n {
            return Err(PolyMeshError::DimensionMismatch {
                what: "quadratic term columns",
                expected: n,
                found: quadratic.ncols(),
            });
        }
        if constraints.ncols() != n {
            return Err(PolyMeshError::DimensionMismatch {
                what: "constraint matrix columns",
                expected: n,
                found: constraints.ncols(),
            });
        }

        let mut columns = vec![None; n];
        for (slot, &k) in known.iter().enumerate() {
            if k >= n {
                return Err(PolyMeshError::DimensionMismatch {
                    what: "known index bound",
                    expected: n,
                    found: k,
                });
            }
            columns[k] = Some(Column::Known(slot));
        }
        let mut unknown = Vec::with_capacity(n.saturating_sub(known.len()));
        for (i, column) in columns.iter_mut().enumerate() {
            if column.is_none() {
                *column = Some(Column::Unknown(unknown.len()));
                unknown.push(i);
            }
        }
        let columns: Vec<Column> = columns.into_iter().flatten().collect();
        let nu = unknown.len();
        let nk = known.len();
        let m = constraints.nrows();

        // [ Q_uu  C_uᵀ ]
        // [ C_u   0    ]
        let mut kkt: DMatrix<f64> = DMatrix::zeros(nu + m, nu + m);
        let mut q_uk = DMatrix::zeros(nu, nk);
        for (i, j, &v) in quadratic.triplet_iter() {
            if let Column::Unknown(r) = columns[i] {
                match columns[j] {
                    Column::Unknown(c) => kkt[(r, c)] += v,
                    Column::Known(c) => q_uk[(r, c)] += v,
                }
            }
        }
        let mut c_u = DMatrix::zeros(m, nu);
        let mut c_k = DMatrix::zeros(m, nk);
        for (r, j, &v) in constraints.triplet_iter() {
            match columns[j] {
                Column::Unknown(c) => c_u[(r, c)] += v,
                Column::Known(c) => c_k[(r, c)] += v,
            }
        }
        kkt.view_mut((0, nu), (nu, m)).copy_from(&c_u.transpose());
        kkt.view_mut((nu, 0), (m, nu)).copy_from(&c_u);

        let kkt_svd = kkt.clone().svd(true, true);
        let cutoff = params.rank_tolerance * kkt_svd.singular_values.max().max(1.0);
        let kkt_rank = kkt_svd.rank(cutoff);
        let constraint_rank = if m == 0 || nu == 0 {
            0
        } else {
            c_u.svd(false, false).rank(cutoff)
        };
        let required = nu + constraint_rank;
        log::debug!(
            "min_quad precompute: {n} unknowns ({nu} free), {m} constraints, kkt rank {kkt_rank}/{required}"
        );
        if kkt_rank != required {
            return Err(PolyMeshError::RankDeficientSystem {
                rank: kkt_rank,
                required,
            });
        }

        Ok(Self {
            size: n,
            known: known.to_vec(),
            unknown,
            q_uk,
            c_k,
            kkt,
            kkt_svd,
            cutoff,
            residual_tolerance: params.residual_tolerance,
        })
    }

    fn solve(
        &self,
        linear: &DVector<f64>,
        known_values: &DVector<f64>,
        constraint_rhs: &DVector<f64>,
    ) -> Result<DVector<f64>, PolyMeshError> {
        let nu = self.unknown.len();
        let m = self.c_k.nrows();
        for (what, expected, found) in [
            ("linear term", self.size, linear.len()),
            ("known values", self.known.len(), known_values.len()),
            ("constraint right-hand side", m, constraint_rhs.len()),
        ] {
            if expected != found {
                return Err(PolyMeshError::DimensionMismatch {
                    what,
                    expected,
                    found,
                });
            }
        }

        let b_u = DVector::from_iterator(nu, self.unknown.iter().map(|&i| linear[i]));
        let top = -(b_u + &self.q_uk * known_values);
        let bottom = constraint_rhs - &self.c_k * known_values;
        let rhs = DVector::from_iterator(nu + m, top.iter().chain(bottom.iter()).copied());

        let sol = self
            .kkt_svd
            .solve(&rhs, self.cutoff)
            .map_err(|e| PolyMeshError::SolverFailure(e.to_string()))?;

        let residual = (&self.kkt * &sol - &rhs).norm();
        if residual > self.residual_tolerance * (1.0 + rhs.norm()) {
            return Err(PolyMeshError::InconsistentSystem { residual });
        }

        let mut x = DVector::zeros(self.size);
        for (slot, &i) in self.unknown.iter().enumerate() {
            x[i] = sol[slot];
        }
        for (slot, &i) in self.known.iter().enumerate() {
            x[i] = known_values[slot];
        }
        Ok(x)
    }
}
