//! Energies and measures of the current surface.
use crate::curvature::current_positions;
use crate::fields::WillmoreFields;
use crate::surface::{dot, interpolate_vector, SurfaceGaussPoint, NORMAL_SIGN};
use femflow::assembly::{assemble_scalar, ElementData, ElementFunctional};
use femflow::solution::MultiLevelSolution;
use femflow::space::FeType;
use eyre::WrapErr;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// The integrand $\sum_p s_p a_p |\vec Y|^{P_p}$ of a p-Willmore energy, where the sign $s_p$ is
/// the sign of $\vec Y \cdot \vec N$ for odd powers and one otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyPolynomial {
    pub powers: Vec<u32>,
    pub coefficients: Vec<f64>,
}

impl Default for EnergyPolynomial {
    fn default() -> Self {
        Self {
            powers: vec![0, 3, 4],
            coefficients: vec![1.0, 0.0, 0.0],
        }
    }
}

impl EnergyPolynomial {
    /// The classical Willmore energy density $|\vec Y|^2$.
    pub fn willmore() -> Self {
        Self {
            powers: vec![2],
            coefficients: vec![1.0],
        }
    }

    pub fn density(&self, y_dot_y: f64, y_dot_n: f64) -> f64 {
        let sign = if y_dot_n >= 0.0 { 1.0 } else { -1.0 };
        self.powers
            .iter()
            .zip(&self.coefficients)
            .map(|(&p, &a)| {
                let sign_p = if p % 2 == 0 { 1.0 } else { sign };
                sign_p * a * y_dot_y.powf(f64::from(p) / 2.0)
            })
            .sum()
    }
}

pub struct WillmoreEnergy<'a> {
    pub fields: &'a WillmoreFields,
    pub polynomial: &'a EnergyPolynomial,
}

impl ElementFunctional for WillmoreEnergy<'_> {
    fn quadrature_order(&self) -> usize {
        3
    }

    fn evaluate(&self, element: &ElementData) -> f64 {
        let table = element.table_for(FeType::LagrangeFirst);
        let positions = current_positions(element, self.fields);
        let y = self.fields.y.map(|y| element.values(y));
        let y_nodal: Vec<[f64; 3]> = (0..table.num_functions())
            .map(|i| [y[0][i], y[1][i], y[2][i]])
            .collect();
        (0..table.num_points())
            .map(|q| {
                let point = SurfaceGaussPoint::<f64>::new(&positions, table, q);
                let y_g = interpolate_vector(&y_nodal, table, q);
                self.polynomial
                    .density(dot(&y_g, &y_g), dot(&y_g, &point.normal))
                    * point.area
            })
            .sum()
    }
}

pub struct SurfaceArea<'a> {
    pub fields: &'a WillmoreFields,
}

impl ElementFunctional for SurfaceArea<'_> {
    fn quadrature_order(&self) -> usize {
        1
    }

    fn evaluate(&self, element: &ElementData) -> f64 {
        let table = element.table_for(FeType::LagrangeFirst);
        let positions = current_positions(element, self.fields);
        (0..table.num_points())
            .map(|q| SurfaceGaussPoint::<f64>::new(&positions, table, q).area)
            .sum()
    }
}

/// The volume $\frac{1}{3} \int \vec x \cdot \vec n \, dA$ enclosed by a closed surface, with
/// the outward normal $\vec n$.
pub struct EnclosedVolume<'a> {
    pub fields: &'a WillmoreFields,
}

impl ElementFunctional for EnclosedVolume<'_> {
    fn quadrature_order(&self) -> usize {
        1
    }

    fn evaluate(&self, element: &ElementData) -> f64 {
        let table = element.table_for(FeType::LagrangeFirst);
        let positions = current_positions(element, self.fields);
        (0..table.num_points())
            .map(|q| {
                let point = SurfaceGaussPoint::<f64>::new(&positions, table, q);
                let x = interpolate_vector(&positions, table, q);
                NORMAL_SIGN * dot(&x, &point.normal) * point.area / 3.0
            })
            .sum()
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SurfaceMeasures {
    pub area: f64,
    pub volume: f64,
}

/// Area and enclosed volume of the displaced surface.
pub fn surface_measures(solution: &MultiLevelSolution, fields: &WillmoreFields) -> SurfaceMeasures {
    let time = solution.time();
    SurfaceMeasures {
        area: assemble_scalar(solution, &SurfaceArea { fields }, time),
        volume: assemble_scalar(solution, &EnclosedVolume { fields }, time),
    }
}

pub fn p_willmore_energy(solution: &MultiLevelSolution, fields: &WillmoreFields, polynomial: &EnergyPolynomial) -> f64 {
    assemble_scalar(solution, &WillmoreEnergy { fields, polynomial }, solution.time())
}

/// Energy file with one line `dt time energy` per time step.
#[derive(Debug)]
pub struct EnergyHistory {
    writer: BufWriter<File>,
}

impl EnergyHistory {
    pub fn create(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        let file = File::create(path).wrap_err_with(|| format!("failed to open energy file {}", path.display()))?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    pub fn record(&mut self, dt: f64, time: f64, energy: f64) -> eyre::Result<()> {
        writeln!(self.writer, "{} {} {}", dt, time, energy)?;
        self.writer.flush()?;
        Ok(())
    }
}
