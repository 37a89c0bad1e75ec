//! Log of the linear solver convergence over a simulation.
use eyre::WrapErr;
use femflow::system::NonlinearOutcome;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Average reduction factor per iteration, `(norm_n / norm_0)^(1 / n)`.
///
/// Returns `None` if no iteration was performed or the initial residual vanishes.
pub fn convergence_rate(norm_0: f64, norm_n: f64, iterations: usize) -> Option<f64> {
    if iterations == 0 || norm_0 <= 0.0 {
        None
    } else {
        Some((norm_n / norm_0).powf(1.0 / iterations as f64))
    }
}

/// One linear solve inside a Newton iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvergenceRecord {
    pub time: f64,
    /// Newton iteration, starting at 1.
    pub nonlinear_iteration: usize,
    pub resid_norm0: f64,
    pub resid_norm_n: f64,
    pub iterations: usize,
}

impl ConvergenceRecord {
    pub fn convergence(&self) -> Option<f64> {
        convergence_rate(self.resid_norm0, self.resid_norm_n, self.iterations)
    }
}

/// Streams the convergence table to a writer, one flushed batch of rows per time step.
#[derive(Debug)]
pub struct ConvergenceLog<W: Write = BufWriter<File>> {
    writer: W,
    records: Vec<ConvergenceRecord>,
}

fn write_header<W: Write>(writer: &mut W, levels: usize) -> std::io::Result<()> {
    writeln!(writer, "Number_of_refinements={}", levels)?;
    writeln!(
        writer,
        "Simulation_Time,Nonlinear_Iteration,resid_norm0,resid_normN,N,convergence"
    )?;
    writer.flush()
}

impl ConvergenceLog<BufWriter<File>> {
    /// Creates the log file, replacing any previous content.
    pub fn create(path: impl AsRef<Path>, levels: usize) -> eyre::Result<Self> {
        let path = path.as_ref();
        let file = File::create(path).wrap_err_with(|| format!("failed to create {}", path.display()))?;
        Ok(Self::new(BufWriter::new(file), levels)?)
    }

    /// Continues an existing log file. The header is only written if the file is empty.
    pub fn append(path: impl AsRef<Path>, levels: usize) -> eyre::Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .wrap_err_with(|| format!("failed to open {}", path.display()))?;
        let is_empty = file.metadata()?.len() == 0;
        let mut writer = BufWriter::new(file);
        if is_empty {
            write_header(&mut writer, levels)?;
        }
        Ok(Self {
            writer,
            records: Vec::new(),
        })
    }
}

impl<W: Write> ConvergenceLog<W> {
    /// Writes the header and returns a log appending to `writer`.
    pub fn new(mut writer: W, levels: usize) -> std::io::Result<Self> {
        write_header(&mut writer, levels)?;
        Ok(Self {
            writer,
            records: Vec::new(),
        })
    }

    /// Records written since the log was opened.
    pub fn records(&self) -> &[ConvergenceRecord] {
        &self.records
    }

    /// Appends the linear solves of one time step and flushes them.
    pub fn record(&mut self, time: f64, outcome: &NonlinearOutcome) -> std::io::Result<()> {
        let start = self.records.len();
        self.records
            .extend(outcome.linear.iter().enumerate().map(|(i, stats)| ConvergenceRecord {
                time,
                nonlinear_iteration: i + 1,
                resid_norm0: stats.initial_residual,
                resid_norm_n: stats.final_residual,
                iterations: stats.iterations,
            }));
        for r in &self.records[start..] {
            let rate = r
                .convergence()
                .map(|rate| rate.to_string())
                .unwrap_or_default();
            writeln!(
                self.writer,
                "{},{},{},{},{},{}",
                r.time, r.nonlinear_iteration, r.resid_norm0, r.resid_norm_n, r.iterations, rate
            )?;
        }
        self.writer.flush()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
