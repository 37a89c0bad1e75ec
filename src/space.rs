//! Finite element types, degree of freedom maps and prolongation between mesh levels.
use crate::element::{BasisKind, CellKind};
use crate::mesh::refinement::{child_map, parent_basis_at};
use crate::mesh::{Mesh, ParentInfo};
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeFamily {
    Lagrange,
    Discontinuous,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeOrder {
    Zero,
    First,
    Second,
}

/// Supported finite element types.
///
/// The discriminants follow the conventional numbering `0..=4`, where `1` (serendipity
/// Lagrange) is not supported.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeType {
    LagrangeFirst = 0,
    LagrangeSecond = 2,
    DiscontinuousZero = 3,
    DiscontinuousFirst = 4,
}

impl FeType {
    pub fn new(family: FeFamily, order: FeOrder) -> Option<Self> {
        match (family, order) {
            (FeFamily::Lagrange, FeOrder::First) => Some(Self::LagrangeFirst),
            (FeFamily::Lagrange, FeOrder::Second) => Some(Self::LagrangeSecond),
            (FeFamily::Discontinuous, FeOrder::Zero) => Some(Self::DiscontinuousZero),
            (FeFamily::Discontinuous, FeOrder::First) => Some(Self::DiscontinuousFirst),
            _ => None,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::LagrangeFirst),
            2 => Some(Self::LagrangeSecond),
            3 => Some(Self::DiscontinuousZero),
            4 => Some(Self::DiscontinuousFirst),
            _ => None,
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn family(&self) -> FeFamily {
        match self {
            Self::LagrangeFirst | Self::LagrangeSecond => FeFamily::Lagrange,
            Self::DiscontinuousZero | Self::DiscontinuousFirst => FeFamily::Discontinuous,
        }
    }

    pub fn is_lagrange(&self) -> bool {
        self.family() == FeFamily::Lagrange
    }

    pub fn requires_quadratic_mesh(&self) -> bool {
        *self == Self::LagrangeSecond
    }
}

pub fn basis_kind(_cell: CellKind, fe: FeType) -> BasisKind {
    match fe {
        FeType::LagrangeFirst => BasisKind::LagrangeLinear,
        FeType::LagrangeSecond => BasisKind::LagrangeQuadratic,
        FeType::DiscontinuousZero => BasisKind::DiscontinuousConstant,
        FeType::DiscontinuousFirst => BasisKind::DiscontinuousLinear,
    }
}

/// Number of degrees of freedom of a field on the mesh.
///
/// Lagrange dofs coincide with mesh nodes: vertices for first order, all nodes for second
/// order (which requires a quadratic mesh).
pub fn num_dofs(mesh: &Mesh, fe: FeType) -> usize {
    match fe {
        FeType::LagrangeFirst => mesh.num_vertices(),
        FeType::LagrangeSecond => {
            assert!(mesh.is_quadratic(), "second order Lagrange fields require a quadratic mesh");
            mesh.num_nodes()
        }
        FeType::DiscontinuousZero => mesh.num_cells(),
        FeType::DiscontinuousFirst => 3 * mesh.num_cells(),
    }
}

/// Global dofs of a cell, in the order of the local basis functions.
pub fn element_dofs(mesh: &Mesh, cell: usize, fe: FeType) -> Vec<usize> {
    let c = &mesh.cells()[cell];
    match fe {
        FeType::LagrangeFirst => c.vertices().to_vec(),
        FeType::LagrangeSecond => c.nodes.clone(),
        FeType::DiscontinuousZero => vec![cell],
        FeType::DiscontinuousFirst => vec![3 * cell, 3 * cell + 1, 3 * cell + 2],
    }
}

/// Prolongation of a field from `coarse` to `fine`, where `fine` is the uniform refinement of
/// `coarse` with the given parent information.
///
/// Lagrange fields are interpolated at the fine nodes, piecewise constants are copied to the
/// children, and the monomial coefficients of piecewise linear fields are transformed with the
/// affine child-to-parent map.
pub fn prolongation(coarse: &Mesh, fine: &Mesh, parents: &[ParentInfo], fe: FeType) -> CsrMatrix<f64> {
    assert_eq!(parents.len(), fine.num_cells());
    let mut coo = CooMatrix::new(num_dofs(fine, fe), num_dofs(coarse, fe));

    match fe {
        FeType::LagrangeFirst | FeType::LagrangeSecond => {
            let mut visited = vec![false; coo.nrows()];
            for (fine_cell, info) in parents.iter().enumerate() {
                let kind = fine.cells()[fine_cell].kind;
                let fine_dofs = element_dofs(fine, fine_cell, fe);
                let coarse_dofs = element_dofs(coarse, info.parent, fe);
                let reference = kind.reference_nodes(fe == FeType::LagrangeSecond);
                for (&fine_dof, xi) in fine_dofs.iter().zip(&reference) {
                    if visited[fine_dof] {
                        continue;
                    }
                    visited[fine_dof] = true;
                    let weights = parent_basis_at(kind, basis_kind(kind, fe), info.child, xi);
                    for (&coarse_dof, w) in coarse_dofs.iter().zip(weights) {
                        if w.abs() > 1e-12 {
                            coo.push(fine_dof, coarse_dof, w);
                        }
                    }
                }
            }
        }
        FeType::DiscontinuousZero => {
            for (fine_cell, info) in parents.iter().enumerate() {
                coo.push(fine_cell, info.parent, 1.0);
            }
        }
        FeType::DiscontinuousFirst => {
            for (fine_cell, info) in parents.iter().enumerate() {
                let kind = fine.cells()[fine_cell].kind;
                let (offset, m) = child_map(kind, info.child);
                let (f, p) = (3 * fine_cell, 3 * info.parent);
                coo.push(f, p, 1.0);
                coo.push(f, p + 1, offset.x);
                coo.push(f, p + 2, offset.y);
                coo.push(f + 1, p + 1, m[(0, 0)]);
                coo.push(f + 1, p + 2, m[(1, 0)]);
                coo.push(f + 2, p + 1, m[(0, 1)]);
                coo.push(f + 2, p + 2, m[(1, 1)]);
            }
        }
    }
    CsrMatrix::from(&coo)
}
