//! Galactic reddening from a gridded E(B-V) reference map.
//!
//! The map is a CSV file with an `ra,dec,ebv` header and one row per node of a regular
//! equatorial grid (every ra node paired with every dec node, in any order). Lookups
//! interpolate bilinearly between the four surrounding nodes, wrapping in right ascension
//! and clamping in declination at the outermost grid rows.

use crate::domain::ports::ReddeningMap;
use crate::utils::error::{ClassifyError, Result};
use serde::Deserialize;
use std::io::Read;
use std::path::Path;

/// Schlafly & Finkbeiner (2011) recalibration of the SFD98 map.
pub const DEFAULT_SCALING: f64 = 0.86;

#[derive(Debug, Deserialize)]
struct GridRow {
    ra: f64,
    dec: f64,
    ebv: f64,
}

#[derive(Debug, Clone)]
pub struct SfdGrid {
    ras: Vec<f64>,
    decs: Vec<f64>,
    /// Indexed `[dec_index * ras.len() + ra_index]`
    values: Vec<f64>,
    scaling: f64,
}

impl SfdGrid {
    pub fn load<P: AsRef<Path>>(path: P, scaling: f64) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| ClassifyError::DustMapError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let grid = Self::from_reader(file, scaling).map_err(|e| match e {
            ClassifyError::DustMapError { message, .. } => ClassifyError::DustMapError {
                path: path.display().to_string(),
                message,
            },
            other => ClassifyError::DustMapError {
                path: path.display().to_string(),
                message: other.to_string(),
            },
        })?;

        tracing::info!(
            "Loaded dust map {} ({} x {} nodes, scaling {})",
            path.display(),
            grid.ras.len(),
            grid.decs.len(),
            scaling
        );
        Ok(grid)
    }

    pub fn from_reader<R: Read>(reader: R, scaling: f64) -> Result<Self> {
        let invalid = |message: String| ClassifyError::DustMapError {
            path: "<reader>".to_string(),
            message,
        };

        let mut rows = Vec::new();
        for row in csv::Reader::from_reader(reader).deserialize::<GridRow>() {
            let row = row?;
            if !row.ra.is_finite() || !row.dec.is_finite() || !row.ebv.is_finite() {
                return Err(invalid(format!(
                    "non-finite value in row ra={}, dec={}",
                    row.ra, row.dec
                )));
            }
            if !(0.0..360.0).contains(&row.ra) || !(-90.0..=90.0).contains(&row.dec) {
                return Err(invalid(format!(
                    "node outside the sky: ra={}, dec={}",
                    row.ra, row.dec
                )));
            }
            rows.push(row);
        }

        if rows.is_empty() {
            return Err(invalid("map contains no nodes".to_string()));
        }

        let ras = sorted_nodes(rows.iter().map(|r| r.ra));
        let decs = sorted_nodes(rows.iter().map(|r| r.dec));

        if ras.len() * decs.len() != rows.len() {
            return Err(invalid(format!(
                "{} rows do not form a {} x {} grid",
                rows.len(),
                ras.len(),
                decs.len()
            )));
        }

        let mut values = vec![None; rows.len()];
        for row in &rows {
            let i = node_index(&ras, row.ra);
            let j = node_index(&decs, row.dec);
            let slot = &mut values[j * ras.len() + i];
            if slot.is_some() {
                return Err(invalid(format!(
                    "duplicate node ra={}, dec={}",
                    row.ra, row.dec
                )));
            }
            *slot = Some(row.ebv);
        }

        let values = values
            .into_iter()
            .collect::<Option<Vec<f64>>>()
            .ok_or_else(|| invalid("grid has missing nodes".to_string()))?;

        Ok(Self {
            ras,
            decs,
            values,
            scaling,
        })
    }

    pub fn scaling(&self) -> f64 {
        self.scaling
    }

    fn node(&self, ra_index: usize, dec_index: usize) -> f64 {
        self.values[dec_index * self.ras.len() + ra_index]
    }

    /// Lower node, upper node and fractional offset along right ascension, wrapping at 360.
    fn ra_bracket(&self, ra: f64) -> (usize, usize, f64) {
        let n = self.ras.len();
        if n == 1 {
            return (0, 0, 0.0);
        }

        let first = self.ras[0];
        let last = self.ras[n - 1];
        if ra < first || ra >= last {
            let span = first + 360.0 - last;
            let offset = if ra < first { ra + 360.0 - last } else { ra - last };
            return (n - 1, 0, offset / span);
        }

        let upper = self.ras.partition_point(|x| *x <= ra);
        let lower = upper - 1;
        let t = (ra - self.ras[lower]) / (self.ras[upper] - self.ras[lower]);
        (lower, upper, t)
    }

    /// Lower node, upper node and fractional offset along declination, clamped at the edges.
    fn dec_bracket(&self, dec: f64) -> (usize, usize, f64) {
        let n = self.decs.len();
        if dec <= self.decs[0] {
            return (0, 0, 0.0);
        }
        if dec >= self.decs[n - 1] {
            return (n - 1, n - 1, 0.0);
        }

        let upper = self.decs.partition_point(|x| *x <= dec);
        let lower = upper - 1;
        let t = (dec - self.decs[lower]) / (self.decs[upper] - self.decs[lower]);
        (lower, upper, t)
    }
}

impl ReddeningMap for SfdGrid {
    fn ebv(&self, ra: f64, dec: f64) -> Result<f64> {
        if !ra.is_finite() || !(0.0..=360.0).contains(&ra) {
            return Err(ClassifyError::OutOfRange {
                field: "ra".to_string(),
                value: ra,
                expected: "0 <= ra <= 360 degrees".to_string(),
            });
        }
        if !dec.is_finite() || !(-90.0..=90.0).contains(&dec) {
            return Err(ClassifyError::OutOfRange {
                field: "dec".to_string(),
                value: dec,
                expected: "-90 <= dec <= 90 degrees".to_string(),
            });
        }

        let ra = ra % 360.0;
        let (i0, i1, u) = self.ra_bracket(ra);
        let (j0, j1, t) = self.dec_bracket(dec);

        let ebv = (1.0 - u) * (1.0 - t) * self.node(i0, j0)
            + u * (1.0 - t) * self.node(i1, j0)
            + (1.0 - u) * t * self.node(i0, j1)
            + u * t * self.node(i1, j1);

        Ok(ebv * self.scaling)
    }
}

fn sorted_nodes(values: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut nodes: Vec<f64> = values.collect();
    nodes.sort_by(f64::total_cmp);
    nodes.dedup();
    nodes
}

fn node_index(nodes: &[f64], value: f64) -> usize {
    nodes.partition_point(|x| *x < value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// 4 x 3 grid where ebv = ra / 100 + (dec + 90) / 1000.
    fn linear_grid_csv() -> String {
        let mut csv = String::from("ra,dec,ebv\n");
        for dec in [-30.0, 0.0, 30.0] {
            for ra in [0.0, 90.0, 180.0, 270.0] {
                csv.push_str(&format!("{},{},{}\n", ra, dec, ra / 100.0 + (dec + 90.0) / 1000.0));
            }
        }
        csv
    }

    fn grid(scaling: f64) -> SfdGrid {
        SfdGrid::from_reader(linear_grid_csv().as_bytes(), scaling).unwrap()
    }

    #[test]
    fn test_exact_node() {
        let map = grid(1.0);
        let ebv = map.ebv(90.0, 0.0).unwrap();
        assert!((ebv - (0.9 + 0.09)).abs() < 1e-12);
    }

    #[test]
    fn test_bilinear_between_nodes() {
        let map = grid(1.0);
        let ebv = map.ebv(45.0, 15.0).unwrap();
        assert!((ebv - (0.45 + 0.105)).abs() < 1e-12);
    }

    #[test]
    fn test_wraps_in_right_ascension() {
        let map = grid(1.0);
        // Halfway between ra=270 (2.7) and ra=360≡0 (0.0) at dec=0.
        let ebv = map.ebv(315.0, 0.0).unwrap();
        assert!((ebv - (1.35 + 0.09)).abs() < 1e-12);
        assert_eq!(map.ebv(360.0, 0.0).unwrap(), map.ebv(0.0, 0.0).unwrap());
    }

    #[test]
    fn test_clamps_in_declination() {
        let map = grid(1.0);
        assert_eq!(map.ebv(90.0, 80.0).unwrap(), map.ebv(90.0, 30.0).unwrap());
        assert_eq!(map.ebv(90.0, -90.0).unwrap(), map.ebv(90.0, -30.0).unwrap());
    }

    #[test]
    fn test_scaling_is_applied() {
        let raw = grid(1.0).ebv(180.0, 30.0).unwrap();
        let scaled = grid(DEFAULT_SCALING).ebv(180.0, 30.0).unwrap();
        assert!((scaled - raw * DEFAULT_SCALING).abs() < 1e-12);
    }

    #[test]
    fn test_out_of_range_coordinates() {
        let map = grid(1.0);
        for (ra, dec) in [(-1.0, 0.0), (360.5, 0.0), (10.0, 90.5), (10.0, -91.0), (f64::NAN, 0.0)] {
            assert!(
                matches!(map.ebv(ra, dec), Err(ClassifyError::OutOfRange { .. })),
                "({ra}, {dec}) should be rejected"
            );
        }
    }

    #[test]
    fn test_rejects_incomplete_grid() {
        let csv = "ra,dec,ebv\n0,0,0.1\n90,0,0.2\n0,10,0.3\n";
        let result = SfdGrid::from_reader(csv.as_bytes(), 1.0);
        assert!(matches!(result, Err(ClassifyError::DustMapError { .. })));
    }

    #[test]
    fn test_rejects_duplicate_node() {
        let csv = "ra,dec,ebv\n0,0,0.1\n0,0,0.2\n90,10,0.3\n90,0,0.4\n";
        let result = SfdGrid::from_reader(csv.as_bytes(), 1.0);
        assert!(matches!(result, Err(ClassifyError::DustMapError { .. })));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(linear_grid_csv().as_bytes()).unwrap();

        let map = SfdGrid::load(file.path(), DEFAULT_SCALING).unwrap();
        assert_eq!(map.scaling(), DEFAULT_SCALING);
        assert!(map.ebv(10.0, 20.0).is_ok());
    }

    #[test]
    fn test_missing_file_is_a_load_error() {
        let result = SfdGrid::load("/nonexistent/sfd_ebv.csv", DEFAULT_SCALING);
        match result {
            Err(ClassifyError::DustMapError { path, .. }) => {
                assert_eq!(path, "/nonexistent/sfd_ebv.csv")
            }
            other => panic!("expected dust map error, got {:?}", other),
        }
    }
}
