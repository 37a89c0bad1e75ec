//! Basic procedural mesh generation routines.
use crate::element::CellKind;
use crate::mesh::{refine_uniformly, Cell, Mesh};
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Face markers of [`create_rectangle_mesh`].
pub mod rectangle_faces {
    pub const BOTTOM: i32 = 1;
    pub const RIGHT: i32 = 2;
    pub const TOP: i32 = 3;
    pub const LEFT: i32 = 4;
}

/// Structured grid over the tensor product of two axes. Boundary edges are marked by side
/// as in [`rectangle_faces`], and `material` is evaluated at cell centres.
fn structured_mesh(xs: &[f64], ys: &[f64], kind: CellKind, material: impl Fn(f64, f64) -> u32) -> Mesh {
    use rectangle_faces::*;
    let (nx, ny) = (xs.len() - 1, ys.len() - 1);
    let vertex = |i: usize, j: usize| j * (nx + 1) + i;
    let vertices = ys
        .iter()
        .flat_map(|&y| xs.iter().map(move |&x| Point3::new(x, y, 0.0)))
        .collect();

    let mut cells = Vec::new();
    for j in 0..ny {
        for i in 0..nx {
            let m = material(0.5 * (xs[i] + xs[i + 1]), 0.5 * (ys[j] + ys[j + 1]));
            let bottom = (j == 0).then_some(BOTTOM);
            let right = (i + 1 == nx).then_some(RIGHT);
            let top = (j + 1 == ny).then_some(TOP);
            let left = (i == 0).then_some(LEFT);
            let [v00, v10, v11, v01] = [vertex(i, j), vertex(i + 1, j), vertex(i + 1, j + 1), vertex(i, j + 1)];
            match kind {
                CellKind::Quadrilateral => {
                    let mut cell = Cell::new(kind, vec![v00, v10, v11, v01], m);
                    cell.face_markers = vec![bottom, right, top, left];
                    cells.push(cell);
                }
                _ => {
                    let mut lower = Cell::new(CellKind::Triangle, vec![v00, v10, v11], m);
                    lower.face_markers = vec![bottom, right, None];
                    let mut upper = Cell::new(CellKind::Triangle, vec![v00, v11, v01], m);
                    upper.face_markers = vec![None, top, left];
                    cells.push(lower);
                    cells.push(upper);
                }
            }
        }
    }
    let num_vertices = (nx + 1) * (ny + 1);
    Mesh {
        nodes: vertices,
        cells,
        num_vertices,
        quadratic: false,
    }
}

/// Piecewise uniform axis from `(start, end, cells)` segments that join end to start.
fn graded_axis(segments: &[(f64, f64, usize)]) -> Vec<f64> {
    let mut axis = Vec::new();
    for (index, &(start, end, n)) in segments.iter().enumerate() {
        let first = if index == 0 { 0 } else { 1 };
        axis.extend((first..=n).map(|k| start + (end - start) * k as f64 / n as f64));
    }
    axis
}

/// Uniform mesh of the rectangle `[x0, x1] x [y0, y1]` with `nx` by `ny` squares, each split
/// into two triangles when `kind` is [`CellKind::Triangle`].
pub fn create_rectangle_mesh(
    x_range: [f64; 2],
    y_range: [f64; 2],
    nx: usize,
    ny: usize,
    kind: CellKind,
    quadratic: bool,
) -> Mesh {
    assert!(nx > 0 && ny > 0, "rectangle must have at least one cell per direction");
    let xs = graded_axis(&[(x_range[0], x_range[1], nx)]);
    let ys = graded_axis(&[(y_range[0], y_range[1], ny)]);
    let mesh = structured_mesh(&xs, &ys, kind, |_, _| 0);
    if quadratic {
        mesh.to_quadratic()
    } else {
        mesh
    }
}

/// Materials of [`create_valve_mesh`].
pub mod valve_materials {
    pub const FLUID: u32 = 2;
    pub const LEAFLET: u32 = 3;
    pub const VEIN: u32 = 4;
}

/// Face markers of [`create_valve_mesh`].
pub mod valve_faces {
    pub const INLET: i32 = 1;
    pub const OUTLET: i32 = 2;
    pub const OUTER_WALL: i32 = 5;
    pub const VEIN_ENDS: i32 = 6;
}

/// A straight vein segment of length `2 * half_length` around the x axis with a pair of
/// leaflets attached to the inner wall at `x = 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValveGeometry {
    pub half_length: f64,
    pub lumen_radius: f64,
    pub wall_thickness: f64,
    pub leaflet_length: f64,
    pub leaflet_thickness: f64,
    /// Cells along each half of the channel.
    pub cells_half_length: usize,
    pub cells_wall: usize,
    pub cells_leaflet: usize,
    /// Cells across the gap between the leaflet tips.
    pub cells_gap: usize,
}

impl Default for ValveGeometry {
    fn default() -> Self {
        Self {
            half_length: 0.03,
            lumen_radius: 0.005,
            wall_thickness: 0.001,
            leaflet_length: 0.004,
            leaflet_thickness: 0.0005,
            cells_half_length: 6,
            cells_wall: 1,
            cells_leaflet: 2,
            cells_gap: 2,
        }
    }
}

/// Quadratic quadrilateral mesh of a vein with two leaflets.
///
/// Fluid inlet and outlet are marked 1 and 2, the outer vein wall 5 and the vein ends 6.
pub fn create_valve_mesh(geometry: &ValveGeometry) -> Mesh {
    use valve_faces::*;
    use valve_materials::*;
    let g = geometry;
    let (r, w, l, t) = (g.lumen_radius, g.wall_thickness, g.leaflet_length, g.leaflet_thickness);
    assert!(l < r, "leaflets must leave a gap between them");

    let xs = graded_axis(&[
        (-g.half_length, 0.0, g.cells_half_length),
        (0.0, t, 1),
        (t, g.half_length, g.cells_half_length),
    ]);
    let ys = graded_axis(&[
        (-r - w, -r, g.cells_wall),
        (-r, -r + l, g.cells_leaflet),
        (-r + l, r - l, g.cells_gap),
        (r - l, r, g.cells_leaflet),
        (r, r + w, g.cells_wall),
    ]);

    let material = |x: f64, y: f64| {
        if y.abs() > r {
            VEIN
        } else if x > 0.0 && x < t && y.abs() > r - l {
            LEAFLET
        } else {
            FLUID
        }
    };
    let mut mesh = structured_mesh(&xs, &ys, CellKind::Quadrilateral, material);
    for cell in &mut mesh.cells {
        let fluid = cell.material == FLUID;
        for marker in &mut cell.face_markers {
            *marker = match *marker {
                Some(rectangle_faces::LEFT) if fluid => Some(INLET),
                Some(rectangle_faces::RIGHT) if fluid => Some(OUTLET),
                Some(rectangle_faces::LEFT) | Some(rectangle_faces::RIGHT) => Some(VEIN_ENDS),
                Some(_) => Some(OUTER_WALL),
                None => None,
            };
        }
    }
    mesh.to_quadratic()
}

fn icosahedron() -> Mesh {
    let phi = 0.5 * (1.0 + 5f64.sqrt());
    let raw = [
        [-1.0, phi, 0.0],
        [1.0, phi, 0.0],
        [-1.0, -phi, 0.0],
        [1.0, -phi, 0.0],
        [0.0, -1.0, phi],
        [0.0, 1.0, phi],
        [0.0, -1.0, -phi],
        [0.0, 1.0, -phi],
        [phi, 0.0, -1.0],
        [phi, 0.0, 1.0],
        [-phi, 0.0, -1.0],
        [-phi, 0.0, 1.0],
    ];
    let faces: [[usize; 3]; 20] = [
        [0, 11, 5],
        [0, 5, 1],
        [0, 1, 7],
        [0, 7, 10],
        [0, 10, 11],
        [1, 5, 9],
        [5, 11, 4],
        [11, 10, 2],
        [10, 7, 6],
        [7, 1, 8],
        [3, 9, 4],
        [3, 4, 2],
        [3, 2, 6],
        [3, 6, 8],
        [3, 8, 9],
        [4, 9, 5],
        [2, 4, 11],
        [6, 2, 10],
        [8, 6, 7],
        [9, 8, 1],
    ];
    let vertices: Vec<Point3<f64>> = raw
        .iter()
        .map(|&[x, y, z]| Point3::from(Vector3::new(x, y, z).normalize()))
        .collect();
    let cells = faces
        .iter()
        .map(|&[a, b, c]| {
            let normal = (vertices[b] - vertices[a]).cross(&(vertices[c] - vertices[a]));
            let outward = normal.dot(&vertices[a].coords) > 0.0;
            let nodes = if outward { vec![a, b, c] } else { vec![a, c, b] };
            Cell::new(CellKind::Triangle, nodes, 0)
        })
        .collect();
    Mesh {
        nodes: vertices,
        cells,
        num_vertices: 12,
        quadratic: false,
    }
}

/// Triangulated sphere obtained by `subdivisions` uniform refinements of an icosahedron with
/// the vertices projected onto the sphere. Cells are oriented with outward normals.
pub fn create_icosphere(radius: f64, subdivisions: usize) -> Mesh {
    let mut mesh = icosahedron();
    for _ in 0..subdivisions {
        mesh = refine_uniformly(&mesh).0;
        for node in &mut mesh.nodes {
            *node = Point3::from(node.coords.normalize());
        }
    }
    for node in &mut mesh.nodes {
        node.coords *= radius;
    }
    mesh
}

/// Ellipsoid with the given semi-axes, obtained by scaling a unit icosphere.
pub fn create_ellipsoid(semi_axes: [f64; 3], subdivisions: usize) -> Mesh {
    let mut mesh = create_icosphere(1.0, subdivisions);
    for node in &mut mesh.nodes {
        node.coords.component_mul_assign(&Vector3::from(semi_axes));
    }
    mesh
}
