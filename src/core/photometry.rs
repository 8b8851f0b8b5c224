use crate::utils::error::{ClassifyError, Result};

/// Offset between Julian Date and Modified Julian Date.
pub const JD_TO_MJD: f64 = 2_400_000.5;

/// Convert PSF magnitudes to fluxes in zero-point units.
///
/// `flux = 10^(-0.4 (mag - zp))` and the error is propagated to first order,
/// `flux_err = flux * ln(10) * 0.4 * mag_err`.
///
/// All three slices must have the same length, otherwise nothing is computed and
/// [`ClassifyError::ShapeMismatch`] is returned.
pub fn to_flux(
    magnitudes: &[f64],
    magnitude_errors: &[f64],
    zero_points: &[f64],
) -> Result<(Vec<f64>, Vec<f64>)> {
    if magnitudes.len() != magnitude_errors.len() || magnitudes.len() != zero_points.len() {
        return Err(ClassifyError::ShapeMismatch {
            message: format!(
                "magnitude ({}), magnitude error ({}) and zero-point ({}) lengths differ",
                magnitudes.len(),
                magnitude_errors.len(),
                zero_points.len()
            ),
        });
    }

    let error_factor = std::f64::consts::LN_10 * 0.4;
    let (fluxes, flux_errors) = magnitudes
        .iter()
        .zip(magnitude_errors)
        .zip(zero_points)
        .map(|((mag, mag_err), zp)| {
            let flux = 10f64.powf(-0.4 * (mag - zp));
            (flux, flux * error_factor * mag_err)
        })
        .unzip();

    Ok((fluxes, flux_errors))
}

pub fn jd_to_mjd(jd: &[f64]) -> Vec<f64> {
    jd.iter().map(|x| x - JD_TO_MJD).collect()
}

pub fn mjd_to_jd(mjd: &[f64]) -> Vec<f64> {
    mjd.iter().map(|x| x + JD_TO_MJD).collect()
}

/// Median with the even-length convention of averaging the two middle values.
/// Returns `None` for an empty slice.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}
