//! Export of solutions to legacy VTK unstructured grids.
use crate::element::{evaluate_basis, BasisKind, CellKind};
use crate::mesh::refinement::{child_nodes, map_to_parent};
use crate::mesh::Mesh;
use crate::solution::{FieldId, MultiLevelSolution, SolutionError};
use crate::space::{element_dofs, FeType};
use eyre::{eyre, WrapErr};
use log::info;
use nalgebra::Point2;
use std::path::{Path, PathBuf};
use vtkio::model::{
    Attribute, Attributes, ByteOrder, CellType, Cells, DataArray, DataSet, ElementType, IOBuffer, Piece,
    UnstructuredGridPiece, Version, VertexNumbers,
};
use vtkio::Vtk;

/// How cells are written.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OutputOrder {
    /// Vertices only, as linear cells.
    Linear,
    /// All nodes except quadrilateral centres, as VTK quadratic cells.
    Quadratic,
    /// All nodes, with every quadratic cell split into four linear cells.
    Biquadratic,
}

impl OutputOrder {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "linear" => Some(Self::Linear),
            "quadratic" => Some(Self::Quadratic),
            "biquadratic" => Some(Self::Biquadratic),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Quadratic => "quadratic",
            Self::Biquadratic => "biquadratic",
        }
    }
}

/// An output cell: a mesh cell, or one of its children for biquadratic output.
struct OutputCell {
    cell: usize,
    child: Option<usize>,
    nodes: Vec<usize>,
    cell_type: CellType,
}

#[derive(Debug, Clone)]
pub struct VtkWriter<'a> {
    solution: &'a MultiLevelSolution,
    displacements: Vec<FieldId>,
}

impl<'a> VtkWriter<'a> {
    pub fn new(solution: &'a MultiLevelSolution) -> Self {
        Self {
            solution,
            displacements: Vec::new(),
        }
    }

    /// Displaces the written points by the given Lagrange fields, one per coordinate.
    pub fn set_moving_mesh(&mut self, fields: &[&str]) -> Result<(), SolutionError> {
        self.displacements = fields
            .iter()
            .map(|name| self.solution.index(name))
            .collect::<Result<_, _>>()?;
        Ok(())
    }

    /// Writes the given variables (or `["All"]`) to `dir/sol.level{L}.{step}.{order}.vtk`.
    pub fn write(&self, dir: impl AsRef<Path>, order: &str, variables: &[&str], step: usize) -> eyre::Result<PathBuf> {
        let dir = dir.as_ref();
        let order = OutputOrder::from_name(order).ok_or_else(|| eyre!("unknown output order \"{}\"", order))?;
        let fields: Vec<FieldId> = if variables.iter().any(|&v| v == "All") {
            self.solution.field_ids().collect()
        } else {
            variables
                .iter()
                .map(|name| self.solution.index(name))
                .collect::<Result<_, _>>()?
        };

        std::fs::create_dir_all(dir).wrap_err_with(|| format!("failed to create output directory {}", dir.display()))?;
        let path = dir.join(format!(
            "sol.level{}.{}.{}.vtk",
            self.solution.multilevel_mesh().num_levels(),
            step,
            order.name()
        ));

        let vtk = Vtk {
            version: Version { major: 4, minor: 1 },
            title: format!("Solution at time {}", self.solution.time()),
            byte_order: ByteOrder::BigEndian,
            data: self.build_dataset(order, &fields),
            file_path: None,
        };
        vtk.export(&path)
            .map_err(|err| eyre!("failed to write VTK file {}: {}", path.display(), err))?;
        info!("Wrote {}", path.display());
        Ok(path)
    }

    pub fn build_dataset(&self, order: OutputOrder, fields: &[FieldId]) -> DataSet {
        let mesh = self.solution.mesh();
        // Linear meshes have no other nodes to write
        let order = if mesh.is_quadratic() { order } else { OutputOrder::Linear };
        let num_points = match order {
            OutputOrder::Linear => mesh.num_vertices(),
            OutputOrder::Quadratic | OutputOrder::Biquadratic => mesh.num_nodes(),
        };
        let cells = output_cells(mesh, order);
        let nodal = NodalInterpolation::new(mesh);

        let mut points = Vec::with_capacity(3 * num_points);
        let displacements: Vec<Vec<f64>> = self
            .displacements
            .iter()
            .map(|&field| nodal.values(self.solution, field, num_points))
            .collect();
        for (p, x) in mesh.nodes()[..num_points].iter().enumerate() {
            for i in 0..3 {
                let u = displacements.get(i).map(|d| d[p]).unwrap_or(0.0);
                points.push(x[i] + u);
            }
        }

        let mut vertices = Vec::with_capacity(cells.iter().map(|c| c.nodes.len() + 1).sum());
        for cell in &cells {
            vertices.push(cell.nodes.len() as u32);
            vertices.extend(cell.nodes.iter().map(|&n| n as u32));
        }

        let mut data = Attributes::new();
        for &field in fields {
            let fe = self.solution.fe_type(field);
            let name = self.solution.name(field).to_string();
            if fe.is_lagrange() {
                let values = nodal.values(self.solution, field, num_points);
                data.point.push(scalar_array(name, values));
            } else {
                let values = cells
                    .iter()
                    .map(|c| cell_value(self.solution, field, mesh, c))
                    .collect();
                data.cell.push(scalar_array(name, values));
            }
        }
        let materials = cells
            .iter()
            .map(|c| mesh.cells()[c.cell].material as f64)
            .collect();
        data.cell.push(scalar_array("Material".to_string(), materials));

        let piece = UnstructuredGridPiece {
            points: IOBuffer::F64(points),
            cells: Cells {
                cell_verts: VertexNumbers::Legacy {
                    num_cells: cells.len() as u32,
                    vertices,
                },
                types: cells.iter().map(|c| c.cell_type).collect(),
            },
            data,
        };
        DataSet::UnstructuredGrid {
            meta: None,
            pieces: vec![Piece::Inline(Box::new(piece))],
        }
    }
}

fn scalar_array(name: String, values: Vec<f64>) -> Attribute {
    Attribute::DataArray(DataArray {
        name,
        elem: ElementType::Scalars {
            num_comp: 1,
            lookup_table: None,
        },
        data: IOBuffer::F64(values),
    })
}

fn output_cells(mesh: &Mesh, order: OutputOrder) -> Vec<OutputCell> {
    let mut cells = Vec::new();
    for (c, cell) in mesh.cells().iter().enumerate() {
        match order {
            OutputOrder::Linear => cells.push(OutputCell {
                cell: c,
                child: None,
                nodes: cell.vertices().to_vec(),
                cell_type: linear_cell_type(cell.kind),
            }),
            OutputOrder::Quadratic => {
                let n = 2 * cell.kind.num_vertices();
                cells.push(OutputCell {
                    cell: c,
                    child: None,
                    nodes: cell.nodes[..n].to_vec(),
                    cell_type: match cell.kind {
                        CellKind::Triangle => CellType::QuadraticTriangle,
                        CellKind::Quadrilateral => CellType::QuadraticQuad,
                        CellKind::Segment => CellType::QuadraticEdge,
                    },
                })
            }
            OutputOrder::Biquadratic => {
                for (child, local) in child_nodes(cell.kind).iter().enumerate() {
                    cells.push(OutputCell {
                        cell: c,
                        child: Some(child),
                        nodes: local.iter().map(|&l| cell.nodes[l]).collect(),
                        cell_type: linear_cell_type(cell.kind),
                    });
                }
            }
        }
    }
    cells
}

fn linear_cell_type(kind: CellKind) -> CellType {
    match kind {
        CellKind::Segment => CellType::Line,
        CellKind::Triangle => CellType::Triangle,
        CellKind::Quadrilateral => CellType::Quad,
    }
}

/// Value of a discontinuous field at the centre of an output cell.
fn cell_value(solution: &MultiLevelSolution, field: FieldId, mesh: &Mesh, output: &OutputCell) -> f64 {
    let kind = mesh.cells()[output.cell].kind;
    let centre = kind.reference_centre();
    let xi: Point2<f64> = match output.child {
        Some(child) => map_to_parent(kind, child, &centre),
        None => centre,
    };
    let fe = solution.fe_type(field);
    let basis = match fe {
        FeType::DiscontinuousFirst => BasisKind::DiscontinuousLinear,
        _ => BasisKind::DiscontinuousConstant,
    };
    let (phi, _) = evaluate_basis(kind, basis, &xi);
    let values = solution.values(field);
    element_dofs(mesh, output.cell, fe)
        .into_iter()
        .zip(phi)
        .map(|(dof, phi)| values[dof] * phi)
        .sum()
}

/// Evaluates Lagrange fields at all mesh nodes. First order fields are interpolated linearly
/// at edge midpoints and cell centres.
struct NodalInterpolation {
    /// Vertices whose average gives the value at every non-vertex node.
    node_vertices: Vec<Vec<usize>>,
    num_vertices: usize,
}

impl NodalInterpolation {
    fn new(mesh: &Mesh) -> Self {
        let num_vertices = mesh.num_vertices();
        let mut node_vertices = vec![Vec::new(); mesh.num_nodes() - num_vertices];
        for cell in mesh.cells() {
            let nv = cell.kind.num_vertices();
            for (local, &node) in cell.nodes.iter().enumerate().skip(nv) {
                let entry = &mut node_vertices[node - num_vertices];
                if !entry.is_empty() {
                    continue;
                }
                if local < nv + cell.kind.num_edges() {
                    let [a, b] = cell.kind.edge_vertices(local - nv);
                    *entry = vec![cell.nodes[a], cell.nodes[b]];
                } else {
                    *entry = cell.vertices().to_vec();
                }
            }
        }
        Self {
            node_vertices,
            num_vertices,
        }
    }

    fn values(&self, solution: &MultiLevelSolution, field: FieldId, num_points: usize) -> Vec<f64> {
        let values = solution.values(field);
        match solution.fe_type(field) {
            FeType::LagrangeSecond => values.as_slice()[..num_points].to_vec(),
            FeType::LagrangeFirst => (0..num_points)
                .map(|p| {
                    if p < self.num_vertices {
                        values[p]
                    } else {
                        let vertices = &self.node_vertices[p - self.num_vertices];
                        vertices.iter().map(|&v| values[v]).sum::<f64>() / vertices.len().max(1) as f64
                    }
                })
                .collect(),
            FeType::DiscontinuousZero | FeType::DiscontinuousFirst => vec![0.0; num_points],
        }
    }
}
