use crate::core::photometry::{jd_to_mjd, median, to_flux};
use crate::domain::model::{fields, ClassificationRequest};
use crate::domain::ports::{LightCurve, ReddeningMap};
use crate::utils::error::{ClassifyError, Result};
use std::collections::BTreeMap;

/// Band index → band name sent to the classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct BandTable(BTreeMap<i64, String>);

impl BandTable {
    pub fn new(bands: BTreeMap<i64, String>) -> Self {
        Self(bands)
    }

    pub fn name(&self, index: f64) -> Result<&str> {
        let unknown = || ClassifyError::UnknownBand {
            index: index as i64,
        };
        if !index.is_finite() || index.fract() != 0.0 {
            return Err(unknown());
        }
        self.0
            .get(&(index as i64))
            .map(String::as_str)
            .ok_or_else(unknown)
    }
}

impl Default for BandTable {
    /// ZTF filters: 1 = g, 2 = r, 3 = i.
    fn default() -> Self {
        Self(BTreeMap::from([
            (1, "g".to_string()),
            (2, "r".to_string()),
            (3, "i".to_string()),
        ]))
    }
}

fn required<'a>(light_curve: &'a dyn LightCurve, field: &str) -> Result<&'a [f64]> {
    light_curve
        .values(field)
        .ok_or_else(|| ClassifyError::MissingField {
            field: field.to_string(),
        })
}

/// Turn a raw light curve into the record the classifier expects.
///
/// Every required column is checked for presence and length before any conversion. The
/// object position is the median of the per-observation coordinates, and the reddening map is
/// queried once at that position.
pub fn build_request(
    light_curve: &dyn LightCurve,
    bands: &BandTable,
    dust_map: &dyn ReddeningMap,
) -> Result<ClassificationRequest> {
    for field in fields::REQUIRED {
        required(light_curve, field)?;
    }

    let jd = required(light_curve, fields::JD)?;
    for field in fields::REQUIRED {
        let len = required(light_curve, field)?.len();
        if len != jd.len() {
            return Err(ClassifyError::ShapeMismatch {
                message: format!(
                    "field '{}' has {} values but '{}' has {}",
                    field,
                    len,
                    fields::JD,
                    jd.len()
                ),
            });
        }
    }

    let (Some(ra), Some(dec)) = (
        median(required(light_curve, fields::RA)?),
        median(required(light_curve, fields::DEC)?),
    ) else {
        return Err(ClassifyError::EmptyLightCurve {
            object_id: light_curve.id().to_string(),
        });
    };

    let (flux, flux_err) = to_flux(
        required(light_curve, fields::MAGPSF)?,
        required(light_curve, fields::SIGMAPSF)?,
        required(light_curve, fields::MAGZPSCI)?,
    )?;

    let band = required(light_curve, fields::FID)?
        .iter()
        .map(|fid| bands.name(*fid).map(str::to_string))
        .collect::<Result<Vec<_>>>()?;

    let mwebv = dust_map.ebv(ra, dec)?;

    Ok(ClassificationRequest {
        mjd: jd_to_mjd(jd),
        flux,
        flux_err,
        band,
        ra,
        dec,
        object_id: light_curve.id().to_string(),
        // No redshift source is wired in.
        redshift: None,
        mwebv,
    })
}
