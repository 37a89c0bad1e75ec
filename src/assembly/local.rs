use crate::boundary::BoundaryCondition;
use crate::element::{BasisKind, CellKind, ShapeTable};
use crate::mesh::{Cell, Mesh};
use crate::quadrature::{rule_for_cell, segment};
use crate::solution::{FieldId, MultiLevelSolution};
use crate::space::{basis_kind, element_dofs, FeType};
use crate::system::SystemLayout;
use nalgebra::Point3;
use std::collections::HashMap;
use std::ops::Range;

const BASES: [BasisKind; 4] = [
    BasisKind::LagrangeLinear,
    BasisKind::LagrangeQuadratic,
    BasisKind::DiscontinuousConstant,
    BasisKind::DiscontinuousLinear,
];

/// Shape tables of every basis on every cell kind for a fixed quadrature order.
#[derive(Debug, Clone)]
pub struct ShapeTables {
    order: usize,
    tables: HashMap<(CellKind, BasisKind), ShapeTable>,
}

impl ShapeTables {
    pub fn new(order: usize) -> Self {
        let mut tables = HashMap::new();
        for cell in [CellKind::Triangle, CellKind::Quadrilateral] {
            let rule = rule_for_cell(cell, order);
            for basis in BASES {
                tables.insert((cell, basis), ShapeTable::new(cell, basis, &rule));
            }
        }
        let rule = segment(order);
        for basis in [BasisKind::LagrangeLinear, BasisKind::LagrangeQuadratic] {
            tables.insert((CellKind::Segment, basis), ShapeTable::new(CellKind::Segment, basis, &rule));
        }
        Self { order, tables }
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn get(&self, cell: CellKind, basis: BasisKind) -> &ShapeTable {
        &self.tables[&(cell, basis)]
    }
}

/// Position of the dofs of one cell in the local unknown vector.
#[derive(Debug, Clone, Default)]
pub struct LocalLayout {
    fields: Vec<(FieldId, Range<usize>)>,
    global: Range<usize>,
    /// System dof of every local unknown.
    system_dofs: Vec<usize>,
}

impl LocalLayout {
    pub fn new(layout: &SystemLayout, mesh: &Mesh, solution: &MultiLevelSolution, cell: usize) -> Self {
        let mut fields = Vec::with_capacity(layout.fields().len());
        let mut system_dofs = Vec::new();
        for (index, &field) in layout.fields().iter().enumerate() {
            let start = system_dofs.len();
            let dofs = element_dofs(mesh, cell, solution.fe_type(field));
            system_dofs.extend(dofs.iter().map(|&dof| layout.system_dof(index, dof)));
            fields.push((field, start..system_dofs.len()));
        }
        let start = system_dofs.len();
        system_dofs.extend((0..layout.num_global_variables()).map(|k| layout.global_dof(k)));
        Self {
            fields,
            global: start..system_dofs.len(),
            system_dofs,
        }
    }

    pub fn len(&self) -> usize {
        self.system_dofs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.system_dofs.is_empty()
    }

    pub fn range(&self, field: FieldId) -> Option<Range<usize>> {
        self.fields
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, range)| range.clone())
    }

    pub fn global_range(&self) -> Range<usize> {
        self.global.clone()
    }

    pub fn system_dofs(&self) -> &[usize] {
        &self.system_dofs
    }
}

/// Everything an element residual may read about the cell being assembled.
#[derive(Debug)]
pub struct ElementData<'a> {
    pub cell_index: usize,
    pub cell: &'a Cell,
    /// Coordinates of all cell nodes.
    pub coordinates: Vec<Point3<f64>>,
    pub time: f64,
    pub dt: f64,
    mesh: &'a Mesh,
    solution: &'a MultiLevelSolution,
    tables: &'a ShapeTables,
    layout: LocalLayout,
}

impl<'a> ElementData<'a> {
    pub fn new(
        solution: &'a MultiLevelSolution,
        tables: &'a ShapeTables,
        layout: LocalLayout,
        cell_index: usize,
        time: f64,
        dt: f64,
    ) -> Self {
        let mesh = solution.mesh();
        Self {
            cell_index,
            cell: &mesh.cells()[cell_index],
            coordinates: mesh.cell_coordinates(cell_index),
            time,
            dt,
            mesh,
            solution,
            tables,
            layout,
        }
    }

    pub fn kind(&self) -> CellKind {
        self.cell.kind
    }

    pub fn material(&self) -> u32 {
        self.cell.material
    }

    pub fn solution(&self) -> &MultiLevelSolution {
        self.solution
    }

    pub fn layout(&self) -> &LocalLayout {
        &self.layout
    }

    /// Local unknowns of a field of the assembled system.
    ///
    /// # Panics
    /// Panics if the field is not an unknown of the system.
    pub fn range(&self, field: FieldId) -> Range<usize> {
        self.layout
            .range(field)
            .unwrap_or_else(|| panic!("field {} is not an unknown of the assembled system", self.solution.name(field)))
    }

    pub fn global_range(&self) -> Range<usize> {
        self.layout.global_range()
    }

    /// Planar coordinates of the cell nodes.
    pub fn planar_coordinates(&self) -> Vec<[f64; 2]> {
        self.coordinates.iter().map(|x| [x.x, x.y]).collect()
    }

    pub fn table(&self, basis: BasisKind) -> &ShapeTable {
        self.tables.get(self.cell.kind, basis)
    }

    pub fn table_for(&self, fe: FeType) -> &ShapeTable {
        self.table(basis_kind(self.cell.kind, fe))
    }

    /// Table of the basis of the geometry map of the cell.
    pub fn geometry_table(&self) -> &ShapeTable {
        self.table(self.geometry_basis())
    }

    /// Segment table of the geometry map restricted to an edge.
    pub fn face_geometry_table(&self) -> &ShapeTable {
        self.tables.get(CellKind::Segment, self.geometry_basis())
    }

    /// Segment table of a Lagrange field restricted to an edge.
    pub fn face_table_for(&self, fe: FeType) -> &ShapeTable {
        self.tables.get(CellKind::Segment, basis_kind(CellKind::Segment, fe))
    }

    fn geometry_basis(&self) -> BasisKind {
        if self.mesh.is_quadratic() {
            BasisKind::LagrangeQuadratic
        } else {
            BasisKind::LagrangeLinear
        }
    }

    /// Local node indices of edge `face` in segment order.
    pub fn face_local_nodes(&self, face: usize) -> Vec<usize> {
        self.mesh.face_local_nodes(self.cell_index, face)
    }

    /// Marked edges of the cell as `(local edge, facename)`.
    pub fn marked_faces(&self) -> impl Iterator<Item = (usize, i32)> + '_ {
        self.cell
            .face_markers
            .iter()
            .enumerate()
            .filter_map(|(k, marker)| marker.map(|m| (k, m)))
    }

    /// Current values of the dofs of any solution field on this cell.
    pub fn values(&self, field: FieldId) -> Vec<f64> {
        let values = self.solution.values(field);
        element_dofs(self.mesh, self.cell_index, self.solution.fe_type(field))
            .into_iter()
            .map(|dof| values[dof])
            .collect()
    }

    pub fn old_values(&self, field: FieldId) -> Vec<f64> {
        let values = self.solution.old_values(field);
        element_dofs(self.mesh, self.cell_index, self.solution.fe_type(field))
            .into_iter()
            .map(|dof| values[dof])
            .collect()
    }

    pub fn boundary_condition(&self, field: FieldId, x: &Point3<f64>, facename: i32) -> Option<BoundaryCondition> {
        self.solution.boundary_condition(field, x, facename)
    }
}
