//! Named solution fields on a multilevel mesh.
//!
//! Values are stored on the finest level only. Coarser levels enter the solvers through the
//! prolongation operators of the systems.
use crate::boundary::{BdcKind, BoundaryCondition, BoundaryConditionFn, BoundaryQuery};
use crate::mesh::{Mesh, MultiLevelMesh};
use crate::space::{element_dofs, num_dofs, FeFamily, FeOrder, FeType};
use eyre::WrapErr;
use log::{debug, info};
use nalgebra::{DVector, Point3};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldId(pub usize);

#[derive(Debug, Clone, PartialEq)]
pub enum SolutionError {
    UnknownField(String),
    DuplicateField(String),
    UnsupportedFiniteElement { name: String, family: FeFamily, order: FeOrder },
    /// Second order Lagrange fields need a quadratic mesh.
    IncompatibleMesh(String),
    Restart(String),
}

impl fmt::Display for SolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownField(name) => write!(f, "Unknown solution field \"{}\".", name),
            Self::DuplicateField(name) => write!(f, "Solution field \"{}\" already exists.", name),
            Self::UnsupportedFiniteElement { name, family, order } => {
                write!(f, "Field \"{}\": {:?} elements of order {:?} are not supported.", name, family, order)
            }
            Self::IncompatibleMesh(name) => {
                write!(f, "Field \"{}\" requires a quadratic mesh.", name)
            }
            Self::Restart(msg) => write!(f, "Invalid restart file: {}", msg),
        }
    }
}

impl Error for SolutionError {}

#[derive(Debug, Clone)]
struct Field {
    name: String,
    fe: FeType,
    time_order: usize,
    values: DVector<f64>,
    old_values: DVector<f64>,
    dirichlet: Vec<bool>,
    bdc: Option<BdcKind>,
    paired: Option<FieldId>,
    pressure: bool,
}

#[derive(Clone)]
pub struct MultiLevelSolution {
    mesh: Arc<MultiLevelMesh>,
    fields: Vec<Field>,
    boundary: Option<BoundaryConditionFn>,
    time: f64,
}

impl fmt::Debug for MultiLevelSolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiLevelSolution")
            .field("fields", &self.fields.iter().map(|field| &field.name).collect::<Vec<_>>())
            .field("time", &self.time)
            .finish()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RestartField {
    name: String,
    values: Vec<f64>,
    old_values: Vec<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RestartFile {
    time: f64,
    fields: Vec<RestartField>,
}

impl MultiLevelSolution {
    pub fn new(mesh: Arc<MultiLevelMesh>) -> Self {
        Self {
            mesh,
            fields: Vec::new(),
            boundary: None,
            time: 0.0,
        }
    }

    pub fn multilevel_mesh(&self) -> &MultiLevelMesh {
        &self.mesh
    }

    pub fn mesh(&self) -> &Mesh {
        self.mesh.finest()
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    /// Adds a field, initialized to zero. Fields with `time_order == 2` keep old values.
    pub fn add_solution(
        &mut self,
        name: &str,
        family: FeFamily,
        order: FeOrder,
        time_order: usize,
    ) -> Result<FieldId, SolutionError> {
        if self.index(name).is_ok() {
            return Err(SolutionError::DuplicateField(name.to_string()));
        }
        let fe = FeType::new(family, order).ok_or_else(|| SolutionError::UnsupportedFiniteElement {
            name: name.to_string(),
            family,
            order,
        })?;
        if fe.requires_quadratic_mesh() && !self.mesh.levels().iter().all(Mesh::is_quadratic) {
            return Err(SolutionError::IncompatibleMesh(name.to_string()));
        }
        let n = num_dofs(self.mesh(), fe);
        self.fields.push(Field {
            name: name.to_string(),
            fe,
            time_order,
            values: DVector::zeros(n),
            old_values: DVector::zeros(n),
            dirichlet: vec![false; n],
            bdc: None,
            paired: None,
            pressure: false,
        });
        Ok(FieldId(self.fields.len() - 1))
    }

    pub fn index(&self, name: &str) -> Result<FieldId, SolutionError> {
        self.fields
            .iter()
            .position(|field| field.name == name)
            .map(FieldId)
            .ok_or_else(|| SolutionError::UnknownField(name.to_string()))
    }

    pub fn field_ids(&self) -> impl Iterator<Item = FieldId> {
        (0..self.fields.len()).map(FieldId)
    }

    pub fn name(&self, field: FieldId) -> &str {
        &self.fields[field.0].name
    }

    pub fn fe_type(&self, field: FieldId) -> FeType {
        self.fields[field.0].fe
    }

    pub fn time_order(&self, field: FieldId) -> usize {
        self.fields[field.0].time_order
    }

    /// Pairs two fields, such as a velocity and the displacement it advects.
    pub fn pair_solution(&mut self, a: &str, b: &str) -> Result<(), SolutionError> {
        let (a, b) = (self.index(a)?, self.index(b)?);
        self.fields[a.0].paired = Some(b);
        self.fields[b.0].paired = Some(a);
        Ok(())
    }

    pub fn paired(&self, field: FieldId) -> Option<FieldId> {
        self.fields[field.0].paired
    }

    pub fn associate_pressure(&mut self, name: &str) -> Result<(), SolutionError> {
        let id = self.index(name)?;
        self.fields[id.0].pressure = true;
        Ok(())
    }

    pub fn is_pressure(&self, field: FieldId) -> bool {
        self.fields[field.0].pressure
    }

    /// Sets the values of a field from a function of position, or to zero.
    ///
    /// Lagrange fields are interpolated at their nodes. Piecewise constant fields take the
    /// value at the cell centre, and piecewise linear fields become constant with that value.
    pub fn initialize(&mut self, name: &str, function: Option<&dyn Fn(&Point3<f64>) -> f64>) -> Result<(), SolutionError> {
        let id = self.index(name)?;
        let mesh = self.mesh.clone();
        let mesh = mesh.finest();
        let field = &mut self.fields[id.0];
        field.values.fill(0.0);
        if let Some(f) = function {
            match field.fe {
                FeType::LagrangeFirst | FeType::LagrangeSecond => {
                    for (dof, value) in field.values.iter_mut().enumerate() {
                        *value = f(&mesh.nodes()[dof]);
                    }
                }
                FeType::DiscontinuousZero | FeType::DiscontinuousFirst => {
                    for c in 0..mesh.num_cells() {
                        let centre = mesh.map_reference_point(c, &mesh.cells()[c].kind.reference_centre());
                        let dofs = element_dofs(mesh, c, field.fe);
                        field.values[dofs[0]] = f(&centre);
                    }
                }
            }
        }
        field.old_values.copy_from(&field.values);
        Ok(())
    }

    pub fn initialize_all(&mut self) {
        for field in &mut self.fields {
            field.values.fill(0.0);
            field.old_values.fill(0.0);
        }
    }

    pub fn attach_boundary_condition(&mut self, condition: BoundaryConditionFn) {
        self.boundary = Some(condition);
    }

    /// Evaluates the attached boundary condition callback at the current time.
    pub fn boundary_condition(&self, field: FieldId, x: &Point3<f64>, facename: i32) -> Option<BoundaryCondition> {
        self.boundary.as_ref().map(|bc| {
            bc(&BoundaryQuery {
                x,
                field: &self.fields[field.0].name,
                facename,
                time: self.time,
            })
        })
    }

    /// Determines the Dirichlet dofs of a field, or of all fields for `"All"`.
    pub fn generate_bdc(&mut self, name: &str, kind: BdcKind) -> Result<(), SolutionError> {
        let ids: Vec<FieldId> = if name == "All" {
            self.field_ids().collect()
        } else {
            vec![self.index(name)?]
        };
        for &id in &ids {
            self.fields[id.0].bdc = Some(kind);
        }
        self.compute_dirichlet(&ids);
        Ok(())
    }

    /// Advances the time and recomputes the Dirichlet values of time dependent fields.
    pub fn update_time_dependent_bdc(&mut self, time: f64) {
        self.time = time;
        let ids: Vec<FieldId> = self
            .field_ids()
            .filter(|id| self.fields[id.0].bdc == Some(BdcKind::TimeDependent))
            .collect();
        self.compute_dirichlet(&ids);
    }

    fn compute_dirichlet(&mut self, ids: &[FieldId]) {
        let mesh = self.mesh.clone();
        let mesh = mesh.finest();
        let faces = mesh.boundary_faces();
        for &id in ids {
            let fe = self.fields[id.0].fe;
            let mut flags = vec![false; self.fields[id.0].values.len()];
            let mut prescribed = Vec::new();
            if fe.is_lagrange() {
                for &(c, k) in &faces {
                    let Some(marker) = mesh.cells()[c].face_markers[k] else {
                        continue;
                    };
                    let mut nodes = mesh.face_nodes(c, k);
                    if fe == FeType::LagrangeFirst {
                        nodes.truncate(2);
                    }
                    for node in nodes {
                        if let Some(BoundaryCondition::Dirichlet(value)) =
                            self.boundary_condition(id, &mesh.nodes()[node], marker)
                        {
                            flags[node] = true;
                            prescribed.push((node, value));
                        }
                    }
                }
            }
            let field = &mut self.fields[id.0];
            for (dof, value) in prescribed {
                field.values[dof] = value;
            }
            debug!(
                "Field {}: {} Dirichlet dofs at time {}",
                field.name,
                flags.iter().filter(|&&f| f).count(),
                self.time
            );
            field.dirichlet = flags;
        }
    }

    pub fn dirichlet_flags(&self, field: FieldId) -> &[bool] {
        &self.fields[field.0].dirichlet
    }

    /// Stores the current values of all fields with time order 2 as old values.
    pub fn copy_solution_to_old(&mut self) {
        for field in self.fields.iter_mut().filter(|field| field.time_order == 2) {
            field.old_values.copy_from(&field.values);
        }
    }

    pub fn values(&self, field: FieldId) -> &DVector<f64> {
        &self.fields[field.0].values
    }

    pub fn values_mut(&mut self, field: FieldId) -> &mut DVector<f64> {
        &mut self.fields[field.0].values
    }

    pub fn old_values(&self, field: FieldId) -> &DVector<f64> {
        &self.fields[field.0].old_values
    }

    /// Writes the time and all field values to a JSON restart file.
    pub fn save(&self, path: impl AsRef<Path>) -> eyre::Result<()> {
        let path = path.as_ref();
        let restart = RestartFile {
            time: self.time,
            fields: self
                .fields
                .iter()
                .map(|field| RestartField {
                    name: field.name.clone(),
                    values: field.values.as_slice().to_vec(),
                    old_values: field.old_values.as_slice().to_vec(),
                })
                .collect(),
        };
        let file = File::create(path).wrap_err_with(|| format!("failed to create restart file {}", path.display()))?;
        serde_json::to_writer(BufWriter::new(file), &restart)
            .wrap_err_with(|| format!("failed to write restart file {}", path.display()))?;
        info!("Saved solution at time {} to {}", self.time, path.display());
        Ok(())
    }

    /// Reads field values written by [`MultiLevelSolution::save`].
    ///
    /// Every stored field must exist in this solution with the same number of dofs.
    pub fn load(&mut self, path: impl AsRef<Path>) -> eyre::Result<()> {
        let path = path.as_ref();
        let file = File::open(path).wrap_err_with(|| format!("failed to open restart file {}", path.display()))?;
        let restart: RestartFile = serde_json::from_reader(BufReader::new(file))
            .wrap_err_with(|| format!("failed to parse restart file {}", path.display()))?;

        for stored in &restart.fields {
            let id = self
                .index(&stored.name)
                .map_err(|_| SolutionError::Restart(format!("unknown field \"{}\"", stored.name)))?;
            let field = &self.fields[id.0];
            if stored.values.len() != field.values.len() || stored.old_values.len() != field.old_values.len() {
                return Err(SolutionError::Restart(format!(
                    "field \"{}\" has {} values, expected {}",
                    stored.name,
                    stored.values.len(),
                    field.values.len()
                ))
                .into());
            }
        }
        for stored in restart.fields {
            let id = self.index(&stored.name)?;
            let field = &mut self.fields[id.0];
            field.values = DVector::from_vec(stored.values);
            field.old_values = DVector::from_vec(stored.old_values);
        }
        self.time = restart.time;
        info!("Loaded solution at time {} from {}", self.time, path.display());
        Ok(())
    }
}
