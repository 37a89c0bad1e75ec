use femflow::element::{evaluate_basis, BasisKind, CellKind};
use femflow::mesh::procedural::create_rectangle_mesh;
use femflow::mesh::refinement::map_to_parent;
use femflow::mesh::{refine_uniformly, Mesh};
use femflow::space::{element_dofs, num_dofs, prolongation, FeFamily, FeOrder, FeType};
use nalgebra::{DVector, Point2, Point3};
use util::assert_approx_matrix_eq;

fn nodal_values(mesh: &Mesh, fe: FeType, f: impl Fn(&Point3<f64>) -> f64) -> DVector<f64> {
    DVector::from_iterator(num_dofs(mesh, fe), mesh.nodes()[..num_dofs(mesh, fe)].iter().map(f))
}

#[test]
fn fe_type_numbering() {
    let second = FeType::new(FeFamily::Lagrange, FeOrder::Second).unwrap();
    assert_eq!(second, FeType::LagrangeSecond);
    assert_eq!(second.index(), 2);
    assert_eq!(FeType::from_index(4), Some(FeType::DiscontinuousFirst));
    assert_eq!(FeType::from_index(1), None);
    assert_eq!(FeType::new(FeFamily::Lagrange, FeOrder::Zero), None);
    assert!(FeType::LagrangeSecond.requires_quadratic_mesh());
    assert!(!FeType::DiscontinuousZero.is_lagrange());
}

#[test]
fn dof_counts() {
    let mesh = create_rectangle_mesh([0.0, 1.0], [0.0, 1.0], 2, 2, CellKind::Quadrilateral, true);
    assert_eq!(num_dofs(&mesh, FeType::LagrangeFirst), 9);
    assert_eq!(num_dofs(&mesh, FeType::LagrangeSecond), 25);
    assert_eq!(num_dofs(&mesh, FeType::DiscontinuousZero), 4);
    assert_eq!(num_dofs(&mesh, FeType::DiscontinuousFirst), 12);
    assert_eq!(element_dofs(&mesh, 3, FeType::DiscontinuousFirst), vec![9, 10, 11]);
    assert_eq!(element_dofs(&mesh, 1, FeType::LagrangeSecond).len(), 9);
}

#[test]
fn lagrange_prolongation_reproduces_polynomials() {
    for kind in [CellKind::Triangle, CellKind::Quadrilateral] {
        let coarse = create_rectangle_mesh([0.0, 2.0], [0.0, 1.0], 2, 3, kind, true);
        let (fine, parents) = refine_uniformly(&coarse);

        let linear = |x: &Point3<f64>| 1.0 + 2.0 * x.x - 3.0 * x.y;
        let p = prolongation(&coarse, &fine, &parents, FeType::LagrangeFirst);
        let fine_values = &p * &nodal_values(&coarse, FeType::LagrangeFirst, linear);
        assert_approx_matrix_eq!(
            &fine_values,
            &nodal_values(&fine, FeType::LagrangeFirst, linear),
            abstol = 1e-13
        );

        let quadratic = |x: &Point3<f64>| x.x * x.x - x.x * x.y + 0.5 * x.y * x.y + x.y;
        let p = prolongation(&coarse, &fine, &parents, FeType::LagrangeSecond);
        let fine_values = &p * &nodal_values(&coarse, FeType::LagrangeSecond, quadratic);
        assert_approx_matrix_eq!(
            &fine_values,
            &nodal_values(&fine, FeType::LagrangeSecond, quadratic),
            abstol = 1e-13
        );
    }
}

#[test]
fn discontinuous_prolongation_preserves_functions() {
    for kind in [CellKind::Triangle, CellKind::Quadrilateral] {
        let coarse = create_rectangle_mesh([0.0, 1.0], [0.0, 1.0], 1, 1, kind, false);
        let (fine, parents) = refine_uniformly(&coarse);

        let p0 = prolongation(&coarse, &fine, &parents, FeType::DiscontinuousZero);
        let coarse_values = DVector::from_fn(coarse.num_cells(), |i, _| i as f64 + 1.0);
        let fine_values = &p0 * &coarse_values;
        for (c, info) in parents.iter().enumerate() {
            assert_eq!(fine_values[c], coarse_values[info.parent]);
        }

        let p1 = prolongation(&coarse, &fine, &parents, FeType::DiscontinuousFirst);
        let coarse_values = DVector::from_fn(3 * coarse.num_cells(), |i, _| 0.5 + i as f64);
        let fine_values = &p1 * &coarse_values;
        let xi = Point2::new(0.2, 0.1);
        for (c, info) in parents.iter().enumerate() {
            let (phi_fine, _) = evaluate_basis(kind, BasisKind::DiscontinuousLinear, &xi);
            let xi_parent = map_to_parent(kind, info.child, &xi);
            let (phi_parent, _) = evaluate_basis(kind, BasisKind::DiscontinuousLinear, &xi_parent);
            let fine_value: f64 = (0..3).map(|i| fine_values[3 * c + i] * phi_fine[i]).sum();
            let coarse_value: f64 = (0..3)
                .map(|i| coarse_values[3 * info.parent + i] * phi_parent[i])
                .sum();
            assert!((fine_value - coarse_value).abs() < 1e-13);
        }
    }
}
