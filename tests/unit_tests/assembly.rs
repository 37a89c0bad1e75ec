use super::ScalarDiffusion;
use femflow::assembly::{
    assemble_scalar, assemble_system, element_jacobian, element_residual, AssemblyError, ElementData,
    ElementFunctional, LocalLayout, ShapeTables,
};
use femflow::boundary::{BdcKind, BoundaryCondition};
use femflow::element::{map_gradients, CellKind};
use femflow::mesh::procedural::{create_rectangle_mesh, rectangle_faces};
use femflow::mesh::MultiLevelMesh;
use femflow::optimize::calculus::approximate_jacobian_fd;
use femflow::solution::MultiLevelSolution;
use femflow::space::{FeFamily, FeOrder, FeType};
use femflow::system::SystemLayout;
use matrixcompare::assert_matrix_eq;
use nalgebra::{DMatrix, DVector, DVectorView, DVectorViewMut};
use std::sync::Arc;
use util::assert_scalar_eq;

fn unit_square_solution(kind: CellKind, levels: usize) -> MultiLevelSolution {
    let coarse = create_rectangle_mesh([0.0, 1.0], [0.0, 1.0], 2, 2, kind, true);
    let mesh = Arc::new(MultiLevelMesh::new(coarse, levels));
    let mut solution = MultiLevelSolution::new(mesh);
    solution
        .add_solution("u", FeFamily::Lagrange, FeOrder::Second, 0)
        .unwrap();
    solution
}

#[test]
fn element_jacobian_matches_finite_differences() {
    for kind in [CellKind::Triangle, CellKind::Quadrilateral] {
        let solution = unit_square_solution(kind, 1);
        let u = solution.index("u").unwrap();
        let assembler = ScalarDiffusion {
            u,
            fe: FeType::LagrangeSecond,
            k: 0.7,
            c: 2.0,
            source: 1.5,
        };
        let layout = SystemLayout::new(&solution, vec![u], 0);
        let tables = ShapeTables::new(5);
        let element = ElementData::new(
            &solution,
            &tables,
            LocalLayout::new(&layout, solution.mesh(), &solution, 1),
            1,
            0.0,
            0.0,
        );

        let n = element.layout().len();
        let x: Vec<f64> = (0..n).map(|i| (0.3 * i as f64).sin()).collect();
        let (f, jacobian) = element_jacobian(&assembler, &element, &x);

        let f_plain = element_residual(&assembler, &element, &x);
        assert_matrix_eq!(f, f_plain, comp = abs, tol = 1e-14);

        let mut x_fd = DVector::from_vec(x.clone());
        let jacobian_fd = approximate_jacobian_fd(
            n,
            |x: DVectorView<f64>, mut f: DVectorViewMut<f64>| {
                f.copy_from(&element_residual(&assembler, &element, x.as_slice()));
            },
            &mut x_fd,
            1e-6,
        );
        assert_matrix_eq!(jacobian, jacobian_fd, comp = abs, tol = 1e-6);
    }
}

#[test]
fn jacobian_of_linear_problem_is_symmetric() {
    let solution = unit_square_solution(CellKind::Quadrilateral, 1);
    let u = solution.index("u").unwrap();
    let assembler = ScalarDiffusion {
        u,
        fe: FeType::LagrangeSecond,
        k: 0.0,
        c: 0.0,
        source: 1.0,
    };
    let layout = SystemLayout::new(&solution, vec![u], 0);
    let x = DVector::zeros(layout.num_dofs());
    let assembled = assemble_system(&layout, &solution, &assembler, &x, 0.0, 0.0, true).unwrap();
    let jacobian = DMatrix::from(&assembled.jacobian.unwrap());

    assert_matrix_eq!(jacobian, jacobian.transpose(), comp = abs, tol = 1e-12);
    // Constants are in the kernel of the stiffness matrix without boundary conditions
    let ones = DVector::from_element(layout.num_dofs(), 1.0);
    assert!((&jacobian * ones).norm() < 1e-12);
    // The load vector integrates the source over the unit square
    assert!((assembled.residual.sum() + 1.0).abs() < 1e-12);
}

#[test]
fn dirichlet_rows_and_columns_are_eliminated() {
    let mut solution = unit_square_solution(CellKind::Triangle, 1);
    solution.attach_boundary_condition(Arc::new(|query| {
        if query.facename == rectangle_faces::LEFT {
            BoundaryCondition::Dirichlet(2.0)
        } else {
            BoundaryCondition::Neumann(0.0)
        }
    }));
    solution.generate_bdc("All", BdcKind::Steady).unwrap();
    let u = solution.index("u").unwrap();
    let flags = solution.dirichlet_flags(u).to_vec();
    // Two cells along the left side with quadratic edges
    assert_eq!(flags.iter().filter(|&&f| f).count(), 5);

    let assembler = ScalarDiffusion {
        u,
        fe: FeType::LagrangeSecond,
        k: 0.0,
        c: 0.0,
        source: 1.0,
    };
    let layout = SystemLayout::new(&solution, vec![u], 0);
    let x = solution.values(u).clone();
    let assembled = assemble_system(&layout, &solution, &assembler, &x, 0.0, 0.0, true).unwrap();
    let jacobian = DMatrix::from(&assembled.jacobian.unwrap());

    for (i, &dirichlet) in flags.iter().enumerate() {
        if dirichlet {
            assert_eq!(solution.values(u)[i], 2.0);
            assert_eq!(assembled.residual[i], 0.0);
            for j in 0..flags.len() {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_eq!(jacobian[(i, j)], expected);
                assert_eq!(jacobian[(j, i)], expected);
            }
        }
    }
}

#[test]
fn assembly_rejects_wrong_dimension() {
    let solution = unit_square_solution(CellKind::Triangle, 1);
    let u = solution.index("u").unwrap();
    let assembler = ScalarDiffusion {
        u,
        fe: FeType::LagrangeSecond,
        k: 0.0,
        c: 0.0,
        source: 1.0,
    };
    let layout = SystemLayout::new(&solution, vec![u], 0);
    let x = DVector::zeros(3);
    let result = assemble_system(&layout, &solution, &assembler, &x, 0.0, 0.0, false);
    assert_eq!(
        result.unwrap_err(),
        AssemblyError::DimensionMismatch {
            expected: layout.num_dofs(),
            actual: 3
        }
    );
}

struct Area;

impl ElementFunctional for Area {
    fn evaluate(&self, element: &ElementData) -> f64 {
        let table = element.geometry_table();
        let coords = element.planar_coordinates();
        (0..table.num_points())
            .map(|q| map_gradients(&coords, table, table, q).weight)
            .sum()
    }
}

#[test]
fn scalar_assembly_sums_over_cells() {
    let solution = unit_square_solution(CellKind::Quadrilateral, 2);
    let area = assemble_scalar(&solution, &Area, 0.0);
    assert_scalar_eq!(area, 1.0, abstol = 1e-13);
}
