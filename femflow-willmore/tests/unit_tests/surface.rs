use femflow::element::{BasisKind, CellKind, ShapeTable};
use femflow_willmore::surface::{parametric_gradient, SurfaceGaussPoint, NORMAL_SIGN};
use matrixcompare::assert_scalar_eq;

fn linear_triangle_table() -> ShapeTable {
    ShapeTable::for_order(CellKind::Triangle, BasisKind::LagrangeLinear, 2)
}

#[test]
fn flat_unit_triangle() {
    let table = linear_triangle_table();
    let positions = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];

    let mut area = 0.0;
    for q in 0..table.num_points() {
        let point = SurfaceGaussPoint::<f64>::new(&positions, &table, q);
        assert_scalar_eq!(point.det_g, 1.0, comp = abs, tol = 1e-14);
        assert_scalar_eq!(point.g[0][1], 0.0, comp = abs, tol = 1e-14);
        assert_scalar_eq!(point.normal[2], NORMAL_SIGN, comp = abs, tol = 1e-14);
        assert_scalar_eq!(point.jir[0][0], 1.0, comp = abs, tol = 1e-14);
        assert_scalar_eq!(point.jir[1][1], 1.0, comp = abs, tol = 1e-14);

        let gradients = point.basis_gradients(&table, q);
        let expected = [[-1.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        for (gradient, expected) in gradients.iter().zip(&expected) {
            for k in 0..3 {
                assert_scalar_eq!(gradient[k], expected[k], comp = abs, tol = 1e-14);
            }
        }
        area += point.area;
    }
    assert_scalar_eq!(area, 0.5, comp = abs, tol = 1e-14);
}

#[test]
fn tangential_gradient_of_position_is_tangent_projection() {
    let table = linear_triangle_table();
    let positions = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
    let n = 1.0 / 3.0_f64.sqrt();

    let mut area = 0.0;
    for q in 0..table.num_points() {
        let point = SurfaceGaussPoint::<f64>::new(&positions, &table, q);
        for k in 0..3 {
            assert_scalar_eq!(point.normal[k], NORMAL_SIGN * n, comp = abs, tol = 1e-14);
        }

        let x_tan = point.tangential_gradient(&parametric_gradient(&positions, &table, q));
        for i in 0..3 {
            for j in 0..3 {
                let identity = if i == j { 1.0 } else { 0.0 };
                let projection = identity - point.normal[i] * point.normal[j];
                assert_scalar_eq!(x_tan[i][j], projection, comp = abs, tol = 1e-13);
            }
        }
        area += point.area;
    }
    assert_scalar_eq!(area, 3.0_f64.sqrt() / 2.0, comp = abs, tol = 1e-14);
}

#[test]
fn basis_gradients_sum_to_zero() {
    let table = linear_triangle_table();
    let positions = [[0.3, -0.2, 0.1], [1.4, 0.5, -0.3], [0.2, 1.1, 0.8]];
    for q in 0..table.num_points() {
        let point = SurfaceGaussPoint::<f64>::new(&positions, &table, q);
        let gradients = point.basis_gradients(&table, q);
        for k in 0..3 {
            let sum: f64 = gradients.iter().map(|gradient| gradient[k]).sum();
            assert_scalar_eq!(sum, 0.0, comp = abs, tol = 1e-13);
        }
        // Gradients are tangent to the surface
        for gradient in &gradients {
            let normal_component: f64 = (0..3).map(|k| gradient[k] * point.normal[k]).sum();
            assert_scalar_eq!(normal_component, 0.0, comp = abs, tol = 1e-13);
        }
    }
}
