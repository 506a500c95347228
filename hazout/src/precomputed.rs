//! File-backed hazard curves.
//!
//! A curve table is a JSON document of precomputed curves:
//!
//! ```json
//! {"curves": [{"model": "NSHMP_WUS_2008", "imt": "PGA", "lat": 34.05, "lon": -118.25,
//!              "xs": [0.005, 0.1], "ys": [0.02, 0.0004]}]}
//! ```
//!
//! A request is served by the closest curve of the same model and IMT whose
//! site lies within [`SITE_TOLERANCE_DEG`] of the requested location on both axes.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use hazout_core::curve::{HazardCalculator, HazardCurve, ModelId, Site};
use hazout_core::domain::Imt;
use hazout_core::StoreError;
use serde::Deserialize;
use tracing::{debug, info};

pub const SITE_TOLERANCE_DEG: f64 = 0.05;

#[derive(Debug, Deserialize)]
struct CurveTable {
    curves: Vec<TableEntry>,
}

#[derive(Debug, Deserialize)]
struct TableEntry {
    model: ModelId,
    imt: Imt,
    lat: f64,
    lon: f64,
    xs: Vec<f64>,
    ys: Vec<f64>,
}

#[derive(Debug)]
pub struct PrecomputedCurves {
    entries: Vec<(ModelId, Imt, f64, f64, HazardCurve)>,
}

impl PrecomputedCurves {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read curve table {:?}", path))?;
        let table = Self::from_json(&content)
            .with_context(|| format!("Failed to parse curve table {:?}", path))?;
        info!(path = ?path, curves = table.entries.len(), "Loaded curve table");
        Ok(table)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let table: CurveTable = serde_json::from_str(json)?;
        let entries = table
            .curves
            .into_iter()
            .map(|e| {
                let curve = HazardCurve::new(e.xs, e.ys)?;
                Ok((e.model, e.imt, e.lat, e.lon, curve))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl HazardCalculator for PrecomputedCurves {
    fn calc(&self, model: ModelId, imt: Imt, site: &Site) -> std::result::Result<HazardCurve, StoreError> {
        let target = site.location;
        let nearest = self
            .entries
            .iter()
            .filter(|(m, i, ..)| *m == model && *i == imt)
            .map(|(_, _, lat, lon, curve)| {
                let distance = (lat - target.lat).abs().max((lon - target.lon).abs());
                (distance, curve)
            })
            .filter(|(distance, _)| *distance <= SITE_TOLERANCE_DEG)
            .min_by(|a, b| a.0.total_cmp(&b.0));

        match nearest {
            Some((distance, curve)) => {
                debug!(%model, %imt, distance, "Serving precomputed curve");
                Ok(curve.clone())
            }
            None => Err(format!(
                "no precomputed {model} {imt} curve within {SITE_TOLERANCE_DEG} degrees of ({}, {})",
                target.lon, target.lat
            )
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hazout_core::curve::{Location, DEFAULT_VS30};

    const TABLE: &str = r#"{"curves": [
        {"model": "NSHMP_WUS_2008", "imt": "PGA", "lat": 34.05, "lon": -118.25,
         "xs": [0.005, 0.1], "ys": [0.02, 0.0004]},
        {"model": "NSHMP_WUS_2008", "imt": "PGA", "lat": 34.0, "lon": -118.2,
         "xs": [0.005, 0.1], "ys": [0.03, 0.0005]},
        {"model": "NSHMP_CEUS_2014", "imt": "SA1P0", "lat": 35.0, "lon": -90.0,
         "xs": [0.1], "ys": [0.01]}
    ]}"#;

    fn site(lat: f64, lon: f64) -> Site {
        Site {
            location: Location { lat, lon },
            vs30: DEFAULT_VS30,
        }
    }

    #[test]
    fn serves_the_nearest_curve() {
        let table = PrecomputedCurves::from_json(TABLE).unwrap();
        assert_eq!(table.len(), 3);
        let curve = table
            .calc(ModelId::NSHMP_WUS_2008, Imt::PGA, &site(34.04, -118.24))
            .unwrap();
        assert_eq!(curve.ys(), &[0.02, 0.0004]);
    }

    #[test]
    fn distant_sites_are_not_served() {
        let table = PrecomputedCurves::from_json(TABLE).unwrap();
        let err = table
            .calc(ModelId::NSHMP_WUS_2008, Imt::PGA, &site(40.0, -118.25))
            .unwrap_err();
        assert!(err.to_string().contains("no precomputed"));
    }

    #[test]
    fn model_and_imt_must_match() {
        let table = PrecomputedCurves::from_json(TABLE).unwrap();
        assert!(table
            .calc(ModelId::NSHMP_CEUS_2014, Imt::PGA, &site(35.0, -90.0))
            .is_err());
    }

    #[test]
    fn mismatched_curves_are_rejected_on_load() {
        let json = r#"{"curves": [{"model": "NSHMP_WUS_2008", "imt": "PGA",
            "lat": 0, "lon": 0, "xs": [1, 2], "ys": [1]}]}"#;
        assert!(PrecomputedCurves::from_json(json).is_err());
    }
}
