//! Volume fluxes through the inlet and outlet.
use crate::assembler::FsiFields;
use eyre::WrapErr;
use femflow::assembly::ShapeTables;
use femflow::element::{face_geometry, BasisKind, CellKind};
use femflow::solution::MultiLevelSolution;
use rayon::prelude::*;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Computes $\int u \cdot n \, ds$ over the deformed boundary edges marked with each of `faces`.
///
/// The velocity is interpolated with the same segment basis as the geometry.
pub fn solution_fluxes(solution: &MultiLevelSolution, fields: &FsiFields, faces: &[i32]) -> Vec<f64> {
    let mesh = solution.mesh();
    let tables = ShapeTables::new(4);
    let basis = if mesh.is_quadratic() {
        BasisKind::LagrangeQuadratic
    } else {
        BasisKind::LagrangeLinear
    };
    let segment = tables.get(CellKind::Segment, basis);
    let (dx, dy) = (solution.values(fields.dx), solution.values(fields.dy));
    let (u, v) = (solution.values(fields.u), solution.values(fields.v));

    let zeros = || vec![0.0; faces.len()];
    (0..mesh.num_cells())
        .into_par_iter()
        .fold(zeros, |mut fluxes, c| {
            let cell = &mesh.cells()[c];
            for (k, marker) in cell.face_markers.iter().enumerate() {
                let Some(i) = marker.and_then(|m| faces.iter().position(|&f| f == m)) else {
                    continue;
                };
                let nodes = mesh.face_nodes(c, k);
                let coords: Vec<[f64; 2]> = nodes
                    .iter()
                    .map(|&n| {
                        let x = mesh.nodes()[n];
                        [x.x + dx[n], x.y + dy[n]]
                    })
                    .collect();
                let u_face: Vec<f64> = nodes.iter().map(|&n| u[n]).collect();
                let v_face: Vec<f64> = nodes.iter().map(|&n| v[n]).collect();
                for q in 0..segment.num_points() {
                    let (ds, normal) = face_geometry(&coords, segment, q);
                    let u_q = segment.interpolate(q, &u_face);
                    let v_q = segment.interpolate(q, &v_face);
                    fluxes[i] += (u_q * normal[0] + v_q * normal[1]) * ds;
                }
            }
            fluxes
        })
        .reduce(zeros, |mut a, b| {
            a.iter_mut().zip(b).for_each(|(a, b)| *a += b);
            a
        })
}

/// Name of the flux history file of a run.
pub fn file_name(young_leaflet: f64, levels: usize, dt: f64) -> String {
    format!(
        "fluxes_E1={}_level={}_incomp_dt{}.txt",
        young_leaflet,
        levels,
        (1.0 / dt).round()
    )
}

/// Reads `Q0, Q1` from a record line.
fn parse_volumes(line: &str) -> Option<[f64; 2]> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() != 7 {
        return None;
    }
    Some([fields[4].parse().ok()?, fields[5].parse().ok()?])
}

/// Time history of the inlet and outlet fluxes and the volumes they have transported.
///
/// Each record is a line `step,time,f0,f1,Q0,Q1,Qtot`. The volumes are accumulated with the
/// trapezoidal rule.
#[derive(Debug)]
pub struct FluxHistory {
    writer: BufWriter<File>,
    path: PathBuf,
    previous: [f64; 2],
    volumes: [f64; 2],
}

impl FluxHistory {
    pub fn create(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        let file =
            File::create(path).wrap_err_with(|| format!("failed to open flux history file {}", path.display()))?;
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_owned(),
            previous: [0.0; 2],
            volumes: [0.0; 2],
        })
    }

    /// Continues the history of a run restarted after `step`.
    ///
    /// Lines of later steps are dropped and the volumes are read back from the last kept line.
    /// `fluxes` are the fluxes of the restart state, the start of the next trapezoid.
    pub fn resume(path: impl AsRef<Path>, step: usize, fluxes: [f64; 2]) -> eyre::Result<Self> {
        let path = path.as_ref();
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(err) => {
                return Err(err).wrap_err_with(|| format!("failed to read flux history file {}", path.display()))
            }
        };
        let kept: Vec<&str> = text
            .lines()
            .take_while(|line| {
                line.split(',')
                    .next()
                    .and_then(|s| s.parse::<usize>().ok())
                    .map_or(false, |s| s <= step)
            })
            .collect();
        let volumes = match kept.last() {
            Some(line) => parse_volumes(line)
                .ok_or_else(|| eyre::eyre!("malformed line in {}: {}", path.display(), line))?,
            None => [0.0; 2],
        };

        let mut history = Self::create(path)?;
        for line in &kept {
            writeln!(history.writer, "{}", line)?;
        }
        history.writer.flush()?;
        history.previous = fluxes;
        history.volumes = volumes;
        Ok(history)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Transported volumes through both faces.
    pub fn volumes(&self) -> [f64; 2] {
        self.volumes
    }

    /// Net transported volume.
    pub fn total_volume(&self) -> f64 {
        self.volumes[0] + self.volumes[1]
    }

    pub fn record(&mut self, step: usize, time: f64, dt: f64, fluxes: [f64; 2]) -> eyre::Result<()> {
        for i in 0..2 {
            self.volumes[i] += 0.5 * dt * (self.previous[i] + fluxes[i]);
        }
        self.previous = fluxes;
        let [q0, q1] = self.volumes;
        writeln!(
            self.writer,
            "{},{},{},{},{},{},{}",
            step,
            time,
            fluxes[0],
            fluxes[1],
            q0,
            q1,
            self.total_volume()
        )?;
        self.writer.flush()?;
        Ok(())
    }
}
