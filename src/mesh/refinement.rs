//! Uniform refinement of triangles and quadrilaterals into four children each.
use crate::element::{evaluate_basis, BasisKind, CellKind};
use crate::mesh::{Cell, EdgeTable, Mesh};
use nalgebra::{Matrix2, Point2, Point3, Vector2};
use serde::{Deserialize, Serialize};

/// Relates a refined cell to the cell it was created from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentInfo {
    pub parent: usize,
    pub child: usize,
}

/// Children of a cell as local node indices of the (quadratic) parent.
pub fn child_nodes(kind: CellKind) -> &'static [&'static [usize]] {
    static TRIANGLE: [&[usize]; 4] = [&[0, 3, 5], &[3, 1, 4], &[5, 4, 2], &[3, 4, 5]];
    static QUADRILATERAL: [&[usize]; 4] = [&[0, 4, 8, 7], &[4, 1, 5, 8], &[8, 5, 2, 6], &[7, 8, 6, 3]];
    static SEGMENT: [&[usize]; 2] = [&[0, 2], &[2, 1]];
    match kind {
        CellKind::Triangle => &TRIANGLE,
        CellKind::Quadrilateral => &QUADRILATERAL,
        CellKind::Segment => &SEGMENT,
    }
}

/// The parent edge that contains each edge of a child, if any.
pub fn child_edge_parents(kind: CellKind, child: usize) -> &'static [Option<usize>] {
    static TRIANGLE: [[Option<usize>; 3]; 4] = [
        [Some(0), None, Some(2)],
        [Some(0), Some(1), None],
        [None, Some(1), Some(2)],
        [None, None, None],
    ];
    static QUADRILATERAL: [[Option<usize>; 4]; 4] = [
        [Some(0), None, None, Some(3)],
        [Some(0), Some(1), None, None],
        [None, Some(1), Some(2), None],
        [None, None, Some(2), Some(3)],
    ];
    match kind {
        CellKind::Triangle => &TRIANGLE[child],
        CellKind::Quadrilateral => &QUADRILATERAL[child],
        CellKind::Segment => &[Some(0)],
    }
}

/// Affine map `ξ_parent = offset + matrix * ξ_child` from child to parent reference coordinates.
pub fn child_map(kind: CellKind, child: usize) -> (Vector2<f64>, Matrix2<f64>) {
    let reference = kind.reference_nodes(true);
    let nodes: Vec<Point2<f64>> = child_nodes(kind)[child].iter().map(|&n| reference[n]).collect();
    match kind {
        CellKind::Triangle => {
            let matrix = Matrix2::from_columns(&[nodes[1] - nodes[0], nodes[2] - nodes[0]]);
            (nodes[0].coords, matrix)
        }
        CellKind::Quadrilateral => {
            let centre = (nodes[0].coords + nodes[2].coords) * 0.5;
            let matrix = Matrix2::from_columns(&[(nodes[1] - nodes[0]) * 0.5, (nodes[3] - nodes[0]) * 0.5]);
            (centre, matrix)
        }
        CellKind::Segment => {
            let centre = (nodes[0].coords + nodes[1].coords) * 0.5;
            let matrix = Matrix2::new((nodes[1].x - nodes[0].x) * 0.5, 0.0, 0.0, 0.0);
            (centre, matrix)
        }
    }
}

pub fn map_to_parent(kind: CellKind, child: usize, xi: &Point2<f64>) -> Point2<f64> {
    let (offset, matrix) = child_map(kind, child);
    Point2::from(offset + matrix * xi.coords)
}

/// Refines every cell into four children.
///
/// Children inherit the material of their parent and the markers of the parent edges they
/// lie on. For quadratic meshes, the new edge and centre nodes are placed on the quadratic
/// geometry of the parent.
pub fn refine_uniformly(mesh: &Mesh) -> (Mesh, Vec<ParentInfo>) {
    let num_vertices = mesh.num_vertices();
    let table = EdgeTable::new(mesh.cells());
    let num_edges = table.edges.len();

    let first_adjacent = first_adjacent_cells(&table);
    let mut vertices: Vec<Point3<f64>> = mesh.nodes()[..num_vertices].to_vec();
    vertices.extend(table.edges.iter().enumerate().map(|(e, &[a, b])| {
        if mesh.is_quadratic() {
            // The coarse midpoint node is shared by every cell adjacent to the edge
            let (c, k) = first_adjacent[e];
            let cell = &mesh.cells()[c];
            mesh.nodes()[cell.nodes[cell.kind.num_vertices() + k]]
        } else {
            Point3::from((mesh.nodes()[a].coords + mesh.nodes()[b].coords) * 0.5)
        }
    }));

    let mut centre_index = vec![usize::MAX; mesh.num_cells()];
    for (c, cell) in mesh.cells().iter().enumerate() {
        if cell.kind == CellKind::Quadrilateral {
            centre_index[c] = vertices.len();
            vertices.push(mesh.map_reference_point(c, &cell.kind.reference_centre()));
        }
    }

    let mut cells = Vec::with_capacity(4 * mesh.num_cells());
    let mut parents = Vec::with_capacity(4 * mesh.num_cells());
    for (c, parent) in mesh.cells().iter().enumerate() {
        let nv = parent.kind.num_vertices();
        let fine_node = |local: usize| {
            if local < nv {
                parent.nodes[local]
            } else if local < 2 * nv {
                num_vertices + table.cell_edges[c][local - nv]
            } else {
                centre_index[c]
            }
        };
        for (k, local_nodes) in child_nodes(parent.kind).iter().enumerate() {
            let nodes = local_nodes.iter().map(|&l| fine_node(l)).collect();
            let mut child = Cell::new(parent.kind, nodes, parent.material);
            for (edge, parent_edge) in child_edge_parents(parent.kind, k).iter().enumerate() {
                child.face_markers[edge] = parent_edge.and_then(|p| parent.face_markers[p]);
            }
            cells.push(child);
            parents.push(ParentInfo { parent: c, child: k });
        }
    }
    debug_assert_eq!(vertices.len(), num_vertices + num_edges + centre_index.iter().filter(|&&i| i != usize::MAX).count());

    let refined = if mesh.is_quadratic() {
        Mesh::quadratic_from_linear(vertices, cells, |fine_cell, xi| {
            let info = parents[fine_cell];
            let kind = mesh.cells()[info.parent].kind;
            mesh.map_reference_point(info.parent, &map_to_parent(kind, info.child, xi))
        })
    } else {
        let num_vertices = vertices.len();
        Mesh {
            nodes: vertices,
            cells,
            num_vertices,
            quadratic: false,
        }
    };
    (refined, parents)
}

/// `(cell, local edge)` of the first cell adjacent to every edge.
fn first_adjacent_cells(table: &EdgeTable) -> Vec<(usize, usize)> {
    let mut first = vec![(usize::MAX, 0); table.edges.len()];
    for (c, edges) in table.cell_edges.iter().enumerate() {
        for (k, &e) in edges.iter().enumerate() {
            if first[e].0 == usize::MAX {
                first[e] = (c, k);
            }
        }
    }
    first
}

/// Evaluates the basis of a parent cell at the reference position of a child point.
pub(crate) fn parent_basis_at(
    kind: CellKind,
    basis: BasisKind,
    child: usize,
    xi_child: &Point2<f64>,
) -> Vec<f64> {
    evaluate_basis(kind, basis, &map_to_parent(kind, child, xi_child)).0
}
