//! Lookup tables for material data: 1-D piecewise-linear tables and
//! uniformly sampled 2-D grids.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Inward nudge applied at table edges so lookups stay inside the last interval.
const EDGE_EPS: f64 = 1e-10;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}:{line}: cannot parse `{content}`")]
    Parse {
        path: PathBuf,
        line: usize,
        content: String,
    },
    #[error("malformed grid: {0}")]
    Shape(String),
    #[error("a table needs at least two points, got {0}")]
    TooFewPoints(usize),
    #[error("table abscissae must be strictly increasing (entry {0})")]
    NotIncreasing(usize),
}

/// A uniformly sampled 2-D table, stored row-major as `values[ix * ynum + iy]`.
#[derive(Clone, Debug, PartialEq)]
pub struct InterpolationGrid {
    pub xmin: f64,
    pub xmax: f64,
    pub xnum: usize,
    pub ymin: f64,
    pub ymax: f64,
    pub ynum: usize,
    values: Vec<f64>,
}

impl InterpolationGrid {
    pub fn new(
        (xmin, xmax, xnum): (f64, f64, usize),
        (ymin, ymax, ynum): (f64, f64, usize),
        values: Vec<f64>,
    ) -> Result<Self, TableError> {
        if xnum < 2 || ynum < 2 {
            return Err(TableError::Shape(format!(
                "each axis needs two samples, got {xnum}x{ynum}"
            )));
        }
        if !(xmax > xmin) || !(ymax > ymin) {
            return Err(TableError::Shape(format!(
                "empty axis range x=[{xmin}, {xmax}] y=[{ymin}, {ymax}]"
            )));
        }
        if values.len() != xnum * ynum {
            return Err(TableError::Shape(format!(
                "expected {} values for a {xnum}x{ynum} grid, found {}",
                xnum * ynum,
                values.len()
            )));
        }
        Ok(Self {
            xmin,
            xmax,
            xnum,
            ymin,
            ymax,
            ynum,
            values,
        })
    }

    /// Sample the grid from `f(x, y)` at its nodes.
    pub fn from_fn(
        x_axis: (f64, f64, usize),
        y_axis: (f64, f64, usize),
        f: impl Fn(f64, f64) -> f64,
    ) -> Result<Self, TableError> {
        let (xmin, xmax, xnum) = x_axis;
        let (ymin, ymax, ynum) = y_axis;
        let dx = (xmax - xmin) / (xnum.max(2) - 1) as f64;
        let dy = (ymax - ymin) / (ynum.max(2) - 1) as f64;
        let values = (0..xnum)
            .flat_map(|ix| (0..ynum).map(move |iy| (ix, iy)))
            .map(|(ix, iy)| f(xmin + ix as f64 * dx, ymin + iy as f64 * dy))
            .collect();
        Self::new(x_axis, y_axis, values)
    }

    pub fn dx(&self) -> f64 {
        (self.xmax - self.xmin) / (self.xnum - 1) as f64
    }

    pub fn dy(&self) -> f64 {
        (self.ymax - self.ymin) / (self.ynum - 1) as f64
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn node(&self, ix: usize, iy: usize) -> f64 {
        self.values[ix * self.ynum + iy]
    }

    pub fn interpolate(&self, x: f64, y: f64) -> f64 {
        bilinear_interp(x, y, self)
    }

    /// Load the compact format: `xmin xmax xnum`, `ymin ymax ynum`, then one
    /// value per line. Blank lines, `%` comments and lines without digits are skipped.
    pub fn load_compact(path: impl AsRef<Path>) -> Result<Self, TableError> {
        let path = path.as_ref();
        let text = read_table(path)?;
        Self::parse_compact(&text, path)
    }

    pub fn parse_compact(text: &str, origin: &Path) -> Result<Self, TableError> {
        let mut header: Vec<(f64, f64, usize)> = Vec::with_capacity(2);
        let mut values = Vec::new();

        for (line_no, line) in data_lines(text) {
            let mut tokens = line.split_whitespace();
            if header.len() < 2 {
                let axis = (
                    parse_token(tokens.next(), origin, line_no, line)?,
                    parse_token(tokens.next(), origin, line_no, line)?,
                    parse_token(tokens.next(), origin, line_no, line)?,
                );
                expect_end(tokens, origin, line_no, line)?;
                header.push(axis);
            } else {
                values.push(parse_token(tokens.next(), origin, line_no, line)?);
                expect_end(tokens, origin, line_no, line)?;
            }
        }

        match header.as_slice() {
            [x_axis, y_axis] => Self::new(*x_axis, *y_axis, values),
            _ => Err(TableError::Shape(format!(
                "{} is missing its axis header",
                origin.display()
            ))),
        }
    }

    /// Load rows of `x y z` with `y` varying fastest. Axis bounds come from the
    /// first and last rows, `ynum` from the length of the first `x` block.
    pub fn load_spreadsheet(path: impl AsRef<Path>) -> Result<Self, TableError> {
        let path = path.as_ref();
        let text = read_table(path)?;

        let mut rows: Vec<(f64, f64, f64)> = Vec::new();
        for (line_no, line) in data_lines(&text) {
            let mut tokens = line.split_whitespace();
            rows.push((
                parse_token(tokens.next(), path, line_no, line)?,
                parse_token(tokens.next(), path, line_no, line)?,
                parse_token(tokens.next(), path, line_no, line)?,
            ));
            expect_end(tokens, path, line_no, line)?;
        }

        let (Some(first), Some(last)) = (rows.first().copied(), rows.last().copied()) else {
            return Err(TableError::Shape(format!("{} holds no rows", path.display())));
        };
        let ynum = rows
            .iter()
            .position(|r| r.0 != first.0)
            .unwrap_or(rows.len());
        if rows.len() % ynum != 0 {
            return Err(TableError::Shape(format!(
                "{}: {} rows do not split into blocks of {ynum}",
                path.display(),
                rows.len()
            )));
        }
        let xnum = rows.len() / ynum;
        let values = rows.into_iter().map(|r| r.2).collect();
        Self::new((first.0, last.0, xnum), (first.1, last.1, ynum), values)
    }

    /// Write the grid in the compact format read by [`Self::load_compact`].
    pub fn write_compact(&self, path: impl AsRef<Path>) -> Result<(), TableError> {
        let path = path.as_ref();
        let mut out = String::with_capacity(self.values.len() * 24 + 64);
        // Writing into a String cannot fail.
        let _ = writeln!(out, "{:e} {:e} {}", self.xmin, self.xmax, self.xnum);
        let _ = writeln!(out, "{:e} {:e} {}", self.ymin, self.ymax, self.ynum);
        for v in &self.values {
            let _ = writeln!(out, "{v:e}");
        }
        fs::write(path, out).map_err(|source| TableError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Piecewise-linear `(x, y)` table with strictly increasing `x`.
#[derive(Clone, Debug, PartialEq)]
pub struct ScalarTable {
    points: Vec<(f64, f64)>,
}

impl ScalarTable {
    pub fn new(points: Vec<(f64, f64)>) -> Result<Self, TableError> {
        if points.len() < 2 {
            return Err(TableError::TooFewPoints(points.len()));
        }
        if let Some(i) = points.windows(2).position(|w| !(w[1].0 > w[0].0)) {
            return Err(TableError::NotIncreasing(i + 1));
        }
        Ok(Self { points })
    }

    /// Load exactly two whitespace-separated columns per line.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TableError> {
        let path = path.as_ref();
        let text = read_table(path)?;
        let mut points = Vec::new();
        for (line_no, line) in data_lines(&text) {
            let mut tokens = line.split_whitespace();
            points.push((
                parse_token(tokens.next(), path, line_no, line)?,
                parse_token(tokens.next(), path, line_no, line)?,
            ));
            expect_end(tokens, path, line_no, line)?;
        }
        Self::new(points)
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    pub fn linear_interp(&self, x: f64) -> f64 {
        linear_interp(x, &self.points)
    }

    pub fn deriv_linear_interp(&self, x: f64) -> f64 {
        deriv_linear_interp(x, &self.points)
    }
}

/// Bilinear interpolation on a uniform grid.
///
/// Points outside the grid are clamped onto it; coordinates at or past the
/// upper bound are pulled just inside so they fall in the last cell.
pub fn bilinear_interp(x: f64, y: f64, grid: &InterpolationGrid) -> f64 {
    let x = if x <= grid.xmin {
        grid.xmin
    } else if x >= grid.xmax {
        grid.xmax - EDGE_EPS
    } else {
        x
    };
    let y = if y <= grid.ymin {
        grid.ymin
    } else if y >= grid.ymax {
        grid.ymax - EDGE_EPS
    } else {
        y
    };

    let sx = (x - grid.xmin) / grid.dx();
    let sy = (y - grid.ymin) / grid.dy();
    let xi = (sx.floor() as usize).min(grid.xnum - 2);
    let yi = (sy.floor() as usize).min(grid.ynum - 2);
    let xc = sx - xi as f64;
    let yc = sy - yi as f64;

    grid.node(xi, yi) * (1.0 - xc) * (1.0 - yc)
        + grid.node(xi + 1, yi) * xc * (1.0 - yc)
        + grid.node(xi, yi + 1) * (1.0 - xc) * yc
        + grid.node(xi + 1, yi + 1) * xc * yc
}

/// Linear interpolation in `data`, sorted by `x`, with flat extrapolation.
/// A NaN abscissa gives NaN.
///
/// # Panics
/// If `data` is empty.
pub fn linear_interp(x: f64, data: &[(f64, f64)]) -> f64 {
    if x.is_nan() {
        return f64::NAN;
    }
    let (first, last) = (data[0], data[data.len() - 1]);
    if x <= first.0 {
        return first.1;
    }
    if x >= last.0 {
        return last.1;
    }
    let hi = data.partition_point(|p| p.0 < x);
    let (x0, y0) = data[hi - 1];
    let (x1, y1) = data[hi];
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}

/// Derivative estimate of the tabulated function: nodal derivatives
/// (central inside, one-sided at the ends) interpolated linearly.
///
/// Beyond the table the boundary estimate is returned rather than zero, so
/// callers should not read much into values outside the tabulated range.
///
/// # Panics
/// If `data` has fewer than two points.
pub fn deriv_linear_interp(x: f64, data: &[(f64, f64)]) -> f64 {
    let n = data.len();
    let (first, last) = (data[0].0, data[n - 1].0);
    let x = if x <= first {
        first + EDGE_EPS
    } else if x >= last {
        last
    } else {
        x
    };

    let hi = data.partition_point(|p| p.0 < x).clamp(1, n - 1);
    let lo = hi - 1;
    let d_hi = nodal_derivative(data, hi);
    let d_lo = nodal_derivative(data, lo);
    d_lo + (d_hi - d_lo) * (x - data[lo].0) / (data[hi].0 - data[lo].0)
}

fn nodal_derivative(data: &[(f64, f64)], i: usize) -> f64 {
    let (a, b) = if i == 0 {
        (0, 1)
    } else if i == data.len() - 1 {
        (i - 1, i)
    } else {
        (i - 1, i + 1)
    };
    (data[b].1 - data[a].1) / (data[b].0 - data[a].0)
}

fn read_table(path: &Path) -> Result<String, TableError> {
    fs::read_to_string(path).map_err(|source| TableError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Non-comment lines that carry at least one digit, with 1-based line numbers.
fn data_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.starts_with('%') && l.chars().any(|c| c.is_ascii_digit()))
}

fn parse_token<T: std::str::FromStr>(
    token: Option<&str>,
    path: &Path,
    line: usize,
    content: &str,
) -> Result<T, TableError> {
    token
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| TableError::Parse {
            path: path.to_path_buf(),
            line,
            content: content.to_string(),
        })
}

/// Fail on trailing tokens after a complete row.
fn expect_end<'a>(
    mut tokens: impl Iterator<Item = &'a str>,
    path: &Path,
    line: usize,
    content: &str,
) -> Result<(), TableError> {
    match tokens.next() {
        None => Ok(()),
        Some(_) => Err(TableError::Parse {
            path: path.to_path_buf(),
            line,
            content: content.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;

    fn quadratic() -> Vec<(f64, f64)> {
        vec![(0.0, 0.0), (1.0, 1.0), (2.0, 4.0)]
    }

    #[test]
    fn linear_interp_extrapolates_flat() {
        let data = quadratic();
        for x in [-1e6, -3.0, 0.0] {
            assert_eq!(linear_interp(x, &data), 0.0);
        }
        for x in [2.0, 2.5, 1e9] {
            assert_eq!(linear_interp(x, &data), 4.0);
        }
        assert_relative_eq!(linear_interp(1.5, &data), 2.5);
        assert_relative_eq!(linear_interp(1.0, &data), 1.0);
        assert!(linear_interp(f64::NAN, &data).is_nan());
        assert!(deriv_linear_interp(f64::NAN, &data).is_nan());
    }

    #[test]
    fn derivative_blends_nodal_estimates() {
        let data = quadratic();
        // Nodal estimates are 1, 2 and 3.
        assert_relative_eq!(deriv_linear_interp(0.5, &data), 1.5, epsilon = 1e-12);
        assert_relative_eq!(deriv_linear_interp(1.0, &data), 2.0, epsilon = 1e-12);
        assert_relative_eq!(deriv_linear_interp(1.75, &data), 2.75, epsilon = 1e-12);
    }

    #[test]
    fn derivative_keeps_boundary_estimate_outside_table() {
        let data = quadratic();
        assert_relative_eq!(deriv_linear_interp(0.0, &data), 1.0, epsilon = 1e-9);
        assert_relative_eq!(deriv_linear_interp(-10.0, &data), 1.0, epsilon = 1e-9);
        assert_eq!(deriv_linear_interp(2.0, &data), 3.0);
        assert_eq!(deriv_linear_interp(50.0, &data), 3.0);
    }

    #[test]
    fn bilinear_is_exact_at_nodes() {
        let grid = InterpolationGrid::from_fn((0.0, 3.0, 4), (10.0, 20.0, 3), |x, y| {
            x * x + 0.1 * y * y
        })
        .unwrap();
        // Interior node.
        assert_relative_eq!(grid.interpolate(1.0, 15.0), grid.node(1, 1), epsilon = 1e-12);
        // Lower corner and the clamped upper corner.
        assert_eq!(grid.interpolate(0.0, 10.0), grid.node(0, 0));
        assert_relative_eq!(grid.interpolate(3.0, 20.0), grid.node(3, 2), epsilon = 1e-7);
    }

    #[test]
    fn bilinear_center_of_unit_cell_is_the_mean() {
        let grid =
            InterpolationGrid::new((0.0, 1.0, 2), (0.0, 1.0, 2), vec![0.0, 1.0, 2.0, 3.0]).unwrap();
        assert_relative_eq!(grid.interpolate(0.5, 0.5), 1.5);
    }

    #[test]
    fn bilinear_clamps_outside_points() {
        let grid =
            InterpolationGrid::new((0.0, 1.0, 2), (0.0, 1.0, 2), vec![0.0, 1.0, 2.0, 3.0]).unwrap();
        assert_eq!(grid.interpolate(-5.0, -5.0), 0.0);
        assert_relative_eq!(grid.interpolate(5.0, 0.5), grid.interpolate(1.0, 0.5), epsilon = 1e-9);
    }

    #[test]
    fn grid_rejects_wrong_value_count() {
        let err = InterpolationGrid::new((0.0, 1.0, 2), (0.0, 1.0, 3), vec![0.0; 5]);
        assert!(matches!(err, Err(TableError::Shape(_))));
    }

    #[test]
    fn compact_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.dat");
        let grid = InterpolationGrid::from_fn((-1.0, 2.5, 8), (100.0, 1500.0, 5), |x, y| {
            (x * 3.0).sin() * y.ln()
        })
        .unwrap();
        grid.write_compact(&path).unwrap();
        let reloaded = InterpolationGrid::load_compact(&path).unwrap();
        assert_eq!(reloaded, grid);
    }

    #[test]
    fn compact_parser_skips_comments_and_blanks() {
        let text = "% emission grid\n\n0 1 2\n% second axis\n0 2 2\n1.0\n\n2.0\n3.0\n4.0\n";
        let grid = InterpolationGrid::parse_compact(text, Path::new("inline")).unwrap();
        assert_eq!(grid.ymax, 2.0);
        assert_eq!(grid.values(), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn compact_parser_reports_bad_lines() {
        let text = "0 1 2\n0 1 2\n1.0\n2.x0\n";
        let err = InterpolationGrid::parse_compact(text, Path::new("inline")).unwrap_err();
        match err {
            TableError::Parse { line, .. } => assert_eq!(line, 4),
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn compact_parser_rejects_extra_tokens() {
        for (text, bad_line) in [
            ("0 1 2 7\n0 1 2\n1\n2\n3\n4\n", 1),
            ("0 1 2\n0 1 2\n1\n2 9\n3\n4\n", 4),
        ] {
            match InterpolationGrid::parse_compact(text, Path::new("inline")) {
                Err(TableError::Parse { line, .. }) => assert_eq!(line, bad_line),
                other => panic!("expected a parse error, got {other:?}"),
            }
        }
    }

    #[test]
    fn spreadsheet_rejects_extra_columns() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "0 10 1\n0 20 2 5\n1 10 3\n1 20 4").unwrap();
        let err = InterpolationGrid::load_spreadsheet(file.path()).unwrap_err();
        assert!(matches!(err, TableError::Parse { line: 2, .. }), "{err}");
    }

    #[test]
    fn spreadsheet_infers_axes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "% x y z").unwrap();
        for x in [0.0, 1.0, 2.0] {
            for y in [10.0, 20.0] {
                writeln!(file, "{x} {y} {}", x + y).unwrap();
            }
        }
        let grid = InterpolationGrid::load_spreadsheet(file.path()).unwrap();
        assert_eq!((grid.xmin, grid.xmax, grid.xnum), (0.0, 2.0, 3));
        assert_eq!((grid.ymin, grid.ymax, grid.ynum), (10.0, 20.0, 2));
        assert_eq!(grid.node(2, 1), 22.0);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = ScalarTable::load("/definitely/not/here.dat").unwrap_err();
        assert!(matches!(err, TableError::Io { .. }));
    }

    #[test]
    fn scalar_table_validation() {
        assert!(matches!(
            ScalarTable::new(vec![(1.0, 1.0)]),
            Err(TableError::TooFewPoints(1))
        ));
        assert!(matches!(
            ScalarTable::new(vec![(1.0, 1.0), (1.0, 2.0)]),
            Err(TableError::NotIncreasing(1))
        ));
    }

    #[test]
    fn scalar_table_loads_two_columns() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "% T rho\n200 1.0\n\n1400 2.0").unwrap();
        let table = ScalarTable::load(file.path()).unwrap();
        assert_eq!(table.points(), &[(200.0, 1.0), (1400.0, 2.0)]);
        assert_relative_eq!(table.linear_interp(800.0), 1.5);
        assert_relative_eq!(table.deriv_linear_interp(800.0), 1.0 / 1200.0, epsilon = 1e-15);
    }

    #[test]
    fn three_column_resistivity_file_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "200 1.0 0.5\n1400 2.0 0.7").unwrap();
        let err = ScalarTable::load(file.path()).unwrap_err();
        assert!(matches!(err, TableError::Parse { line: 1, .. }), "{err}");
    }
}
