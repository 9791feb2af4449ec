use crate::numerics::transient::StepReport;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Write columns of equal or ragged length under a header row.
pub fn write_csv<P: AsRef<Path>>(path: P, headers: &[&str], data: &[Vec<f64>]) -> io::Result<()> {
    if !headers.is_empty() && !data.is_empty() && headers.len() != data.len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "Headers count ({}) doesn't match data columns ({})",
                headers.len(),
                data.len()
            ),
        ));
    }

    let mut file = BufWriter::new(File::create(path)?);

    writeln!(file, "{}", headers.join(","))?;

    let n_rows = data.iter().map(|col| col.len()).max().unwrap_or(0);

    for i in 0..n_rows {
        let row: Vec<String> = data
            .iter()
            .map(|col| col.get(i).map(|v| format!("{v:.15e}")).unwrap_or_default())
            .collect();
        writeln!(file, "{}", row.join(","))?;
    }

    file.flush()
}

/// Write x-y data pairs
pub fn write_xy<P: AsRef<Path>>(
    path: P,
    x_header: &str,
    y_header: &str,
    x_data: &[f64],
    y_data: &[f64],
) -> io::Result<()> {
    if x_data.len() != y_data.len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "X and Y data lengths don't match ({} vs {})",
                x_data.len(),
                y_data.len()
            ),
        ));
    }
    write_csv(
        path,
        &[x_header, y_header],
        &[x_data.to_vec(), y_data.to_vec()],
    )
}

/// One row per timestep: time, solver effort and the temperature/power maxima.
pub fn write_step_log<P: AsRef<Path>>(path: P, reports: &[StepReport]) -> io::Result<()> {
    let column = |f: fn(&StepReport) -> f64| reports.iter().map(f).collect::<Vec<f64>>();
    write_csv(
        path,
        &[
            "step",
            "time",
            "current_iterations",
            "current_residual",
            "heat_iterations",
            "heat_residual",
            "max_temperature",
            "max_heating_power",
        ],
        &[
            column(|r| r.step as f64),
            column(|r| r.time),
            column(|r| r.current.iterations as f64),
            column(|r| r.current.final_residual),
            column(|r| r.heat.iterations as f64),
            column(|r| r.heat.final_residual),
            column(|r| r.max_temperature),
            column(|r| r.max_heating_power),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numerics::solver::SolverResult;
    use std::fs;

    #[test]
    fn test_write_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let headers = &["x", "y", "z"];
        let data = vec![
            vec![1.0, 2.0, 3.0],
            vec![4.0, 5.0, 6.0],
            vec![7.0, 8.0],
        ];

        write_csv(&path, headers, &data).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "x,y,z");
        assert_eq!(lines.len(), 4);
        assert!(lines[3].ends_with(','));
    }

    #[test]
    fn mismatched_headers_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = write_csv(dir.path().join("bad.csv"), &["x"], &[vec![1.0], vec![2.0]])
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        let err = write_xy(dir.path().join("bad.csv"), "x", "y", &[1.0], &[]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn step_log_has_one_row_per_report() {
        let solve = SolverResult {
            iterations: 7,
            final_residual: 1e-12,
            converged: true,
        };
        let reports: Vec<StepReport> = (1..=3)
            .map(|step| StepReport {
                step,
                time: step as f64 * 1e-13,
                current: solve,
                heat: solve,
                max_temperature: 300.0 + step as f64,
                max_heating_power: 0.0,
            })
            .collect();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("steps.csv");
        write_step_log(&path, &reports).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("step,time,"));
        assert!(lines[3].contains("3.030000000000000e2"));
    }
}
