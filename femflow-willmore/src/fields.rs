//! Solution fields and systems of the surface flow.
use femflow::solution::{FieldId, MultiLevelSolution, SolutionError};
use femflow::space::{FeFamily, FeOrder};
use log::debug;

pub const INIT_Y_SYSTEM: &str = "InitY";
pub const MCF_SYSTEM: &str = "MCF";
pub const CONFORMAL_SYSTEM: &str = "nProj";

pub const DISPLACEMENT_FIELDS: [&str; 3] = ["Dx1", "Dx2", "Dx3"];
pub const CURVATURE_FIELDS: [&str; 3] = ["Y1", "Y2", "Y3"];
pub const CONFORMAL_DISPLACEMENT_FIELDS: [&str; 3] = ["nDx1", "nDx2", "nDx3"];

/// Unknowns of the flow system, in system order.
pub const MCF_FIELDS: [&str; 6] = ["Dx1", "Dx2", "Dx3", "Y1", "Y2", "Y3"];
pub const INIT_Y_FIELDS: [&str; 3] = CURVATURE_FIELDS;
pub const CONFORMAL_FIELDS: [&str; 4] = ["nDx1", "nDx2", "nDx3", "Lambda1"];

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct WillmoreFields {
    /// Displacement of the surface from the mesh.
    pub dx: [FieldId; 3],
    /// Mean curvature vector.
    pub y: [FieldId; 3],
    /// Displacement after conformal reparametrization.
    pub ndx: [FieldId; 3],
    /// Multiplier of the normal constraint of the reparametrization, one per cell.
    pub lambda1: FieldId,
    /// Number of cells around each vertex.
    pub envn: FieldId,
}

impl WillmoreFields {
    /// Adds all fields to a solution on a linear triangle mesh.
    pub fn add_to(solution: &mut MultiLevelSolution) -> Result<Self, SolutionError> {
        use FeFamily::*;
        use FeOrder::*;
        let mut add = |names: [&str; 3], time_order: usize| -> Result<[FieldId; 3], SolutionError> {
            Ok([
                solution.add_solution(names[0], Lagrange, First, time_order)?,
                solution.add_solution(names[1], Lagrange, First, time_order)?,
                solution.add_solution(names[2], Lagrange, First, time_order)?,
            ])
        };
        let dx = add(DISPLACEMENT_FIELDS, 2)?;
        let y = add(CURVATURE_FIELDS, 2)?;
        let ndx = add(CONFORMAL_DISPLACEMENT_FIELDS, 0)?;
        let lambda1 = solution.add_solution("Lambda1", Discontinuous, Zero, 0)?;
        let envn = solution.add_solution("ENVN", Lagrange, First, 0)?;
        Ok(Self {
            dx,
            y,
            ndx,
            lambda1,
            envn,
        })
    }

    pub fn from_solution(solution: &MultiLevelSolution) -> Result<Self, SolutionError> {
        let lookup = |names: [&str; 3]| -> Result<[FieldId; 3], SolutionError> {
            Ok([
                solution.index(names[0])?,
                solution.index(names[1])?,
                solution.index(names[2])?,
            ])
        };
        Ok(Self {
            dx: lookup(DISPLACEMENT_FIELDS)?,
            y: lookup(CURVATURE_FIELDS)?,
            ndx: lookup(CONFORMAL_DISPLACEMENT_FIELDS)?,
            lambda1: solution.index("Lambda1")?,
            envn: solution.index("ENVN")?,
        })
    }
}

/// Copies `Dx` into `nDx` if `forward`, and `nDx` back into `Dx` otherwise.
pub fn copy_displacement(solution: &mut MultiLevelSolution, fields: &WillmoreFields, forward: bool) {
    for (&dx, &ndx) in fields.dx.iter().zip(&fields.ndx) {
        let (source, target) = if forward { (dx, ndx) } else { (ndx, dx) };
        let values = solution.values(source).clone();
        solution.values_mut(target).copy_from(&values);
    }
    debug!("Copied displacement {}", if forward { "Dx -> nDx" } else { "nDx -> Dx" });
}

/// Stores the number of cells sharing each vertex in `ENVN`.
pub fn element_near_vertex_number(solution: &mut MultiLevelSolution, fields: &WillmoreFields) {
    let counts: Vec<f64> = solution
        .mesh()
        .vertex_cells()
        .iter()
        .map(|cells| cells.len() as f64)
        .collect();
    let envn = solution.values_mut(fields.envn);
    for (value, count) in envn.iter_mut().zip(counts) {
        *value = count;
    }
}
