//! Hazard-curve requests.
//!
//! A curve is requested with a slash-delimited path
//! `/<year>/<region>/<imt>/<lon>/<lat>`, e.g. `/2008/WUS/PGA/-118.25/34.05`.
//! The model is resolved as `NSHMP_<region>_<year>`; the numerical work is
//! delegated to a [`HazardCalculator`]. The rendered curve is two lines of
//! comma-separated values: ground motions, then annual rates.

use std::fmt;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;
use tracing::{info, warn};

use crate::domain::{closed_enum, Imt};
use crate::error::StoreError;

/// Vs30 (m/s) of every site computed through this surface.
pub const DEFAULT_VS30: f64 = 760.0;

pub const MIN_LAT: f64 = -90.0;
pub const MAX_LAT: f64 = 90.0;
pub const MIN_LON: f64 = -180.0;
pub const MAX_LON: f64 = 180.0;

/// IMTs offered by the curve service.
pub const CURVE_IMTS: &[Imt] = &[
    Imt::PGA,
    Imt::SA0P1,
    Imt::SA0P2,
    Imt::SA0P3,
    Imt::SA0P5,
    Imt::SA1P0,
    Imt::SA2P0,
    Imt::SA3P0,
];

pub const USAGE: &str = "\
HazardCurve usage:

A USGS hazard curve may be computed by supplying a slash-delimited
query consisting of year, model, intensity measure type (imt), longitude,
and latitude. For example:

  /2008/WUS/PGA/-118.25/34.05

where:
  year  = [2008, 2014]
  model = [WUS, CEUS]
  imt   = [PGA, SA0P1, SA0P2, SA0P3, SA0P5, SA1P0, SA2P0, SA3P0]
";

closed_enum! {
    /// National seismic hazard model, by region and release year.
    ModelId {
        NSHMP_WUS_2008, NSHMP_CEUS_2008, NSHMP_WUS_2014, NSHMP_CEUS_2014,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CurveError {
    #[error("expected /<year>/<region>/<imt>/<lon>/<lat>")]
    Usage,

    #[error("Model {0} not currently supported")]
    UnsupportedModel(String),

    #[error("IMT {0} not currently supported")]
    UnsupportedImt(String),

    #[error("invalid {name} [{value}]: expected a number in [{min}, {max}]")]
    InvalidCoordinate {
        name: &'static str,
        value: String,
        min: f64,
        max: f64,
    },

    #[error("curve has {xs} x values but {ys} y values")]
    MismatchedCurve { xs: usize, ys: usize },

    #[error("hazard calculation failed: {0}")]
    Calculation(#[source] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Site {
    pub location: Location,
    pub vs30: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveRequest {
    pub model: ModelId,
    pub imt: Imt,
    pub site: Site,
}

impl CurveRequest {
    /// Parses `/<year>/<region>/<imt>/<lon>/<lat>`. Empty segments are
    /// skipped, so leading and doubled slashes are accepted.
    pub fn parse(path: &str) -> Result<Self, CurveError> {
        let args: Vec<&str> = path
            .split('/')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        let [year, region, imt, lon, lat] = args.as_slice() else {
            return Err(CurveError::Usage);
        };

        let model_name = format!("NSHMP_{region}_{year}");
        let model = ModelId::lookup(&model_name)
            .ok_or(CurveError::UnsupportedModel(model_name))?;
        let imt = Imt::lookup(imt)
            .filter(|imt| CURVE_IMTS.contains(imt))
            .ok_or_else(|| CurveError::UnsupportedImt(imt.to_string()))?;
        let lon = parse_coordinate("longitude", lon, MIN_LON, MAX_LON)?;
        let lat = parse_coordinate("latitude", lat, MIN_LAT, MAX_LAT)?;

        Ok(CurveRequest {
            model,
            imt,
            site: Site {
                location: Location { lat, lon },
                vs30: DEFAULT_VS30,
            },
        })
    }
}

fn parse_coordinate(name: &'static str, raw: &str, min: f64, max: f64) -> Result<f64, CurveError> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| (min..=max).contains(v))
        .ok_or_else(|| CurveError::InvalidCoordinate {
            name,
            value: raw.to_string(),
            min,
            max,
        })
}

/// A hazard curve: annual rate of exceedance (`ys`) per ground motion (`xs`).
#[derive(Debug, Clone, PartialEq)]
pub struct HazardCurve {
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl HazardCurve {
    pub fn new(xs: Vec<f64>, ys: Vec<f64>) -> Result<Self, CurveError> {
        if xs.len() != ys.len() {
            return Err(CurveError::MismatchedCurve {
                xs: xs.len(),
                ys: ys.len(),
            });
        }
        Ok(Self { xs, ys })
    }

    pub fn xs(&self) -> &[f64] {
        &self.xs
    }

    pub fn ys(&self) -> &[f64] {
        &self.ys
    }
}

impl fmt::Display for HazardCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_joined(f, &self.xs)?;
        writeln!(f)?;
        write_joined(f, &self.ys)
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, values: &[f64]) -> fmt::Result {
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        write!(f, "{v}")?;
    }
    Ok(())
}

/// The hazard engine. Opaque to this crate.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait HazardCalculator: Send + Sync {
    fn calc(&self, model: ModelId, imt: Imt, site: &Site) -> Result<HazardCurve, StoreError>;
}

/// Outcome of a curve request, ready to render.
#[derive(Debug, Clone, PartialEq)]
pub enum CurveOutcome {
    /// The request path was missing or had the wrong shape.
    Usage,
    Curve(String),
    /// The request was understood but cannot be served.
    Rejected(String),
}

impl CurveOutcome {
    pub fn body(&self) -> &str {
        match self {
            CurveOutcome::Usage => USAGE,
            CurveOutcome::Curve(body) | CurveOutcome::Rejected(body) => body,
        }
    }
}

/// Resolves and computes the curve named by `path`.
pub fn compute_curve<C>(calculator: &C, path: &str) -> Result<HazardCurve, CurveError>
where
    C: HazardCalculator + ?Sized,
{
    let request = CurveRequest::parse(path)?;
    info!(
        model = %request.model,
        imt = %request.imt,
        lat = request.site.location.lat,
        lon = request.site.location.lon,
        "[CURVE] Computing hazard curve"
    );
    calculator
        .calc(request.model, request.imt, &request.site)
        .map_err(CurveError::Calculation)
}

/// Request handler: usage text, rendered curve, or a rejection message.
pub fn handle_curve_request<C>(calculator: &C, path: Option<&str>) -> CurveOutcome
where
    C: HazardCalculator + ?Sized,
{
    let Some(path) = path else {
        return CurveOutcome::Usage;
    };
    match compute_curve(calculator, path) {
        Ok(curve) => CurveOutcome::Curve(curve.to_string()),
        Err(CurveError::Usage) => CurveOutcome::Usage,
        Err(e) => {
            warn!(path, error = %e, "[CURVE] Request rejected");
            CurveOutcome::Rejected(e.to_string())
        }
    }
}
