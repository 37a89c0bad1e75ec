//! Unstructured meshes of triangles and quadrilaterals in the plane or embedded in 3D.
//!
//! Vertex nodes are numbered first. Quadratic meshes additionally store one node per edge and,
//! for quadrilaterals, one node per cell centre, after all vertices. Within a cell, local nodes
//! are ordered as vertices, edge midpoints (edge `i` joins vertex `i` and `i + 1`), centre.
use crate::element::{evaluate_basis, BasisKind, CellKind};
use nalgebra::{Point2, Point3};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error::Error;
use std::fmt;

pub mod procedural;
pub mod refinement;

pub use refinement::{refine_uniformly, ParentInfo};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub kind: CellKind,
    pub nodes: Vec<usize>,
    /// Boundary marker ("facename") of each edge. Interior edges carry `None`.
    pub face_markers: Vec<Option<i32>>,
    pub material: u32,
}

impl Cell {
    pub fn new(kind: CellKind, nodes: Vec<usize>, material: u32) -> Self {
        Self {
            kind,
            nodes,
            face_markers: vec![None; kind.num_edges()],
            material,
        }
    }

    pub fn vertices(&self) -> &[usize] {
        &self.nodes[..self.kind.num_vertices()]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeshError {
    WrongNodeCount { cell: usize, expected: usize, actual: usize },
    NodeOutOfBounds { cell: usize, node: usize },
    UnsupportedCell { cell: usize },
}

impl fmt::Display for MeshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WrongNodeCount { cell, expected, actual } => {
                write!(f, "Cell {} has {} nodes, expected {}.", cell, actual, expected)
            }
            Self::NodeOutOfBounds { cell, node } => write!(f, "Cell {} references invalid node {}.", cell, node),
            Self::UnsupportedCell { cell } => write!(f, "Cell {} is not a triangle or quadrilateral.", cell),
        }
    }
}

impl Error for MeshError {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    nodes: Vec<Point3<f64>>,
    cells: Vec<Cell>,
    num_vertices: usize,
    quadratic: bool,
}

/// Unique edges of a set of cells, keyed by their sorted end points.
#[derive(Debug, Clone)]
pub(crate) struct EdgeTable {
    pub edges: Vec<[usize; 2]>,
    /// Global edge index of every local edge of every cell.
    pub cell_edges: Vec<Vec<usize>>,
    /// Number of cells adjacent to every edge.
    pub multiplicity: Vec<usize>,
}

impl EdgeTable {
    pub fn new(cells: &[Cell]) -> Self {
        let mut lookup = HashMap::new();
        let mut edges = Vec::new();
        let mut multiplicity = Vec::new();
        let cell_edges = cells
            .iter()
            .map(|cell| {
                (0..cell.kind.num_edges())
                    .map(|k| {
                        let [a, b] = cell.kind.edge_vertices(k);
                        let (a, b) = (cell.nodes[a], cell.nodes[b]);
                        let key = (a.min(b), a.max(b));
                        let index = *lookup.entry(key).or_insert_with(|| {
                            edges.push([a, b]);
                            multiplicity.push(0);
                            edges.len() - 1
                        });
                        multiplicity[index] += 1;
                        index
                    })
                    .collect()
            })
            .collect();
        Self {
            edges,
            cell_edges,
            multiplicity,
        }
    }
}

impl Mesh {
    /// Constructs a mesh, checking that every cell has the expected number of valid nodes.
    pub fn from_cells(
        nodes: Vec<Point3<f64>>,
        cells: Vec<Cell>,
        num_vertices: usize,
        quadratic: bool,
    ) -> Result<Self, MeshError> {
        for (index, cell) in cells.iter().enumerate() {
            if cell.kind == CellKind::Segment {
                return Err(MeshError::UnsupportedCell { cell: index });
            }
            let expected = cell.kind.num_nodes(quadratic);
            if cell.nodes.len() != expected || cell.face_markers.len() != cell.kind.num_edges() {
                return Err(MeshError::WrongNodeCount {
                    cell: index,
                    expected,
                    actual: cell.nodes.len(),
                });
            }
            let num_cell_vertices = cell.kind.num_vertices();
            for (local, &node) in cell.nodes.iter().enumerate() {
                let in_range = if local < num_cell_vertices {
                    node < num_vertices
                } else {
                    num_vertices <= node && node < nodes.len()
                };
                if !in_range {
                    return Err(MeshError::NodeOutOfBounds { cell: index, node });
                }
            }
        }
        Ok(Self {
            nodes,
            cells,
            num_vertices,
            quadratic,
        })
    }

    /// Constructs a linear mesh where every node is a vertex.
    pub fn from_linear_cells(vertices: Vec<Point3<f64>>, cells: Vec<Cell>) -> Result<Self, MeshError> {
        let num_vertices = vertices.len();
        Self::from_cells(vertices, cells, num_vertices, false)
    }

    /// Builds the quadratic counterpart of a set of linear cells, placing the new nodes with
    /// `place(cell, ξ)` at reference coordinates of the given cell.
    pub(crate) fn quadratic_from_linear(
        vertices: Vec<Point3<f64>>,
        mut cells: Vec<Cell>,
        place: impl Fn(usize, &Point2<f64>) -> Point3<f64>,
    ) -> Self {
        let num_vertices = vertices.len();
        let table = EdgeTable::new(&cells);
        let mut nodes = vertices;
        nodes.resize(num_vertices + table.edges.len(), Point3::origin());
        let mut placed = vec![false; table.edges.len()];

        for (c, cell) in cells.iter().enumerate() {
            for (k, &e) in table.cell_edges[c].iter().enumerate() {
                if !placed[e] {
                    nodes[num_vertices + e] = place(c, &cell.kind.edge_point(k, 0.0));
                    placed[e] = true;
                }
            }
        }

        for (c, cell) in cells.iter_mut().enumerate() {
            let edge_nodes = table.cell_edges[c].iter().map(|e| num_vertices + e);
            cell.nodes.extend(edge_nodes);
        }
        for c in 0..cells.len() {
            if cells[c].kind == CellKind::Quadrilateral {
                nodes.push(place(c, &cells[c].kind.reference_centre()));
                let centre = nodes.len() - 1;
                cells[c].nodes.push(centre);
            }
        }

        Self {
            nodes,
            cells,
            num_vertices,
            quadratic: true,
        }
    }

    /// Returns the quadratic mesh obtained by placing new nodes on straight edges.
    ///
    /// Quadratic meshes are returned unchanged.
    pub fn to_quadratic(&self) -> Self {
        if self.quadratic {
            return self.clone();
        }
        let linear_cells = self.cells.clone();
        Self::quadratic_from_linear(self.nodes.clone(), linear_cells, |c, xi| {
            self.map_reference_point(c, xi)
        })
    }

    pub fn nodes(&self) -> &[Point3<f64>] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut [Point3<f64>] {
        &mut self.nodes
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_vertices(&self) -> usize {
        self.num_vertices
    }

    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn is_quadratic(&self) -> bool {
        self.quadratic
    }

    pub fn cell_coordinates(&self, cell: usize) -> Vec<Point3<f64>> {
        self.cells[cell].nodes.iter().map(|&n| self.nodes[n]).collect()
    }

    /// Maps reference coordinates of a cell to physical coordinates, using the quadratic
    /// geometry for quadratic meshes.
    pub fn map_reference_point(&self, cell: usize, xi: &Point2<f64>) -> Point3<f64> {
        let c = &self.cells[cell];
        let basis = if self.quadratic {
            BasisKind::LagrangeQuadratic
        } else {
            BasisKind::LagrangeLinear
        };
        let (values, _) = evaluate_basis(c.kind, basis, xi);
        let mut x = Point3::origin();
        for (&n, phi) in c.nodes.iter().zip(values) {
            x.coords += self.nodes[n].coords * phi;
        }
        x
    }

    /// Pairs `(cell, local edge)` of all edges adjacent to exactly one cell.
    pub fn boundary_faces(&self) -> Vec<(usize, usize)> {
        let table = EdgeTable::new(&self.cells);
        let mut faces = Vec::new();
        for (c, edges) in table.cell_edges.iter().enumerate() {
            for (k, &e) in edges.iter().enumerate() {
                if table.multiplicity[e] == 1 {
                    faces.push((c, k));
                }
            }
        }
        faces
    }

    /// Global nodes of a cell edge: its end points followed by the midpoint for quadratic meshes.
    pub fn face_nodes(&self, cell: usize, face: usize) -> Vec<usize> {
        let c = &self.cells[cell];
        let [a, b] = c.kind.edge_vertices(face);
        let mut nodes = vec![c.nodes[a], c.nodes[b]];
        if self.quadratic {
            nodes.push(c.nodes[c.kind.num_vertices() + face]);
        }
        nodes
    }

    /// Local node indices of a cell edge, in the same order as [`Mesh::face_nodes`].
    pub fn face_local_nodes(&self, cell: usize, face: usize) -> Vec<usize> {
        let kind = self.cells[cell].kind;
        let [a, b] = kind.edge_vertices(face);
        let mut local = vec![a, b];
        if self.quadratic {
            local.push(kind.num_vertices() + face);
        }
        local
    }

    /// Cells adjacent to every vertex.
    pub fn vertex_cells(&self) -> Vec<Vec<usize>> {
        let mut adjacency = vec![Vec::new(); self.num_vertices];
        for (c, cell) in self.cells.iter().enumerate() {
            for &v in cell.vertices() {
                adjacency[v].push(c);
            }
        }
        adjacency
    }
}

/// A hierarchy of uniformly refined meshes, from coarsest to finest.
#[derive(Debug, Clone)]
pub struct MultiLevelMesh {
    levels: Vec<Mesh>,
    /// `parents[l]` relates the cells of level `l + 1` to those of level `l`.
    parents: Vec<Vec<ParentInfo>>,
}

impl MultiLevelMesh {
    /// Refines `coarse` uniformly until the hierarchy has `uniform_levels` levels in total.
    pub fn new(coarse: Mesh, uniform_levels: usize) -> Self {
        let mut levels = vec![coarse];
        let mut parents = Vec::new();
        while levels.len() < uniform_levels.max(1) {
            let (fine, info) = refine_uniformly(&levels[levels.len() - 1]);
            levels.push(fine);
            parents.push(info);
        }
        Self { levels, parents }
    }

    pub fn levels(&self) -> &[Mesh] {
        &self.levels
    }

    pub fn level(&self, level: usize) -> &Mesh {
        &self.levels[level]
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn finest(&self) -> &Mesh {
        &self.levels[self.levels.len() - 1]
    }

    pub fn finest_mut(&mut self) -> &mut Mesh {
        let last = self.levels.len() - 1;
        &mut self.levels[last]
    }

    /// Parent information of the cells on `level`, which must be at least 1.
    pub fn parents(&self, level: usize) -> &[ParentInfo] {
        assert!(level >= 1, "the coarsest level has no parents");
        &self.parents[level - 1]
    }

    /// Removes the `n` coarsest levels, always keeping at least the finest level.
    pub fn erase_coarse_levels(&mut self, n: usize) {
        let n = n.min(self.levels.len() - 1);
        self.levels.drain(..n);
        self.parents.drain(..n);
    }
}
