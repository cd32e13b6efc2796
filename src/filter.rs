//! Biquad IIR coefficient generation.
//!
//! Coefficients follow the RBJ Audio-EQ Cookbook and are normalized so that
//! `a0 == 1`:
//!
//! ```text
//!         b0 + b1·z⁻¹ + b2·z⁻²
//! H(z) = ----------------------
//!          1 + a1·z⁻¹ + a2·z⁻²
//! ```

use std::f64::consts::PI;

use crate::error::FilterError;

/// Sample rate used by [`response`].
pub const RESPONSE_SAMPLE_RATE: f64 = 48_000.0;

/// Shape of a biquad filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterType {
    /// Bell-shaped boost or cut around the center frequency.
    Peak,
    /// Second-order low-pass.
    LowPass,
    /// Second-order high-pass.
    HighPass,
    /// Boost or cut below the corner frequency.
    LowShelf,
    /// Boost or cut above the corner frequency.
    HighShelf,
    /// Placeholder for an unset filter; cannot be computed.
    #[default]
    Invalid,
}

/// Parameters of one filter band.
///
/// # Example
///
/// ```
/// use stream_playback::{compute, Filter};
///
/// let coeffs = compute(48_000.0, &Filter::peak(1_000.0, 0.707, 6.0)).unwrap();
/// assert!(coeffs.b0 > 1.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Filter {
    /// Filter shape.
    pub filter_type: FilterType,
    /// Center or corner frequency in Hz.
    pub freq: f64,
    /// Quality factor.
    pub q: f64,
    /// Gain in dB. Ignored by the pass filters.
    pub gain: f64,
}

impl Filter {
    /// Peaking filter.
    pub fn peak(freq: f64, q: f64, gain: f64) -> Self {
        Self::new(FilterType::Peak, freq, q, gain)
    }

    /// Low-pass filter.
    pub fn low_pass(freq: f64, q: f64) -> Self {
        Self::new(FilterType::LowPass, freq, q, 0.0)
    }

    /// High-pass filter.
    pub fn high_pass(freq: f64, q: f64) -> Self {
        Self::new(FilterType::HighPass, freq, q, 0.0)
    }

    /// Low-shelf filter.
    pub fn low_shelf(freq: f64, q: f64, gain: f64) -> Self {
        Self::new(FilterType::LowShelf, freq, q, gain)
    }

    /// High-shelf filter.
    pub fn high_shelf(freq: f64, q: f64, gain: f64) -> Self {
        Self::new(FilterType::HighShelf, freq, q, gain)
    }

    /// Filter with explicit type.
    pub fn new(filter_type: FilterType, freq: f64, q: f64, gain: f64) -> Self {
        Self {
            filter_type,
            freq,
            q,
            gain,
        }
    }
}

/// Normalized biquad coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BiquadCoeffs {
    /// Feed-forward coefficient for x[n].
    pub b0: f64,
    /// Feed-forward coefficient for x[n-1].
    pub b1: f64,
    /// Feed-forward coefficient for x[n-2].
    pub b2: f64,
    /// Feedback coefficient for y[n-1].
    pub a1: f64,
    /// Feedback coefficient for y[n-2].
    pub a2: f64,
}

impl BiquadCoeffs {
    /// Evaluates H(e^{jω}) at `freq` Hz, returning `(re, im)`.
    pub fn evaluate(&self, freq: f64, sample_rate: f64) -> (f64, f64) {
        let w = 2.0 * PI * freq / sample_rate;
        // z⁻¹ = e^{-jω}, z⁻² = e^{-2jω}
        let (z1_re, z1_im) = (w.cos(), -w.sin());
        let (z2_re, z2_im) = ((2.0 * w).cos(), -(2.0 * w).sin());

        let num_re = self.b0 + self.b1 * z1_re + self.b2 * z2_re;
        let num_im = self.b1 * z1_im + self.b2 * z2_im;
        let den_re = 1.0 + self.a1 * z1_re + self.a2 * z2_re;
        let den_im = self.a1 * z1_im + self.a2 * z2_im;

        let den_norm = den_re * den_re + den_im * den_im;
        (
            (num_re * den_re + num_im * den_im) / den_norm,
            (num_im * den_re - num_re * den_im) / den_norm,
        )
    }

    fn is_finite(&self) -> bool {
        [self.b0, self.b1, self.b2, self.a1, self.a2]
            .iter()
            .all(|c| c.is_finite())
    }
}

/// Magnitude and phase of a filter at a list of frequencies.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrequencyResponse {
    /// Magnitude in dB, one per requested frequency.
    pub magnitudes_db: Vec<f64>,
    /// Phase in degrees, one per requested frequency.
    pub phases_deg: Vec<f64>,
}

/// Computes biquad coefficients for `filter` at `sample_rate` Hz.
pub fn compute(sample_rate: f64, filter: &Filter) -> Result<BiquadCoeffs, FilterError> {
    if filter.filter_type == FilterType::Invalid {
        return Err(FilterError::InvalidFilter);
    }
    if !(sample_rate > 0.0) {
        return Err(FilterError::invalid_argument(format!(
            "sample rate {sample_rate} must be positive"
        )));
    }

    let w0 = 2.0 * PI * filter.freq / sample_rate;
    let cos_w0 = w0.cos();
    let alpha = w0.sin() * 0.5 / filter.q;
    let a = 10f64.powf(filter.gain / 40.0);

    let coeffs = match filter.filter_type {
        FilterType::Peak => {
            let a0 = 1.0 + alpha / a;
            let b1 = -2.0 * cos_w0 / a0;
            BiquadCoeffs {
                b0: (1.0 + alpha * a) / a0,
                b1,
                b2: (1.0 - alpha * a) / a0,
                a1: b1,
                a2: (1.0 - alpha / a) / a0,
            }
        }
        FilterType::LowPass => {
            let a0 = 1.0 + alpha;
            let b1 = (1.0 - cos_w0) / a0;
            BiquadCoeffs {
                b0: b1 * 0.5,
                b1,
                b2: b1 * 0.5,
                a1: -2.0 * cos_w0 / a0,
                a2: (1.0 - alpha) / a0,
            }
        }
        FilterType::HighPass => {
            let a0 = 1.0 + alpha;
            let b1 = -(1.0 + cos_w0) / a0;
            BiquadCoeffs {
                b0: b1 * -0.5,
                b1,
                b2: b1 * -0.5,
                a1: -2.0 * cos_w0 / a0,
                a2: (1.0 - alpha) / a0,
            }
        }
        FilterType::LowShelf => {
            let sqrt_a_alpha2 = 2.0 * a.sqrt() * alpha;
            let a0 = (a + 1.0) + (a - 1.0) * cos_w0 + sqrt_a_alpha2;
            BiquadCoeffs {
                b0: a * ((a + 1.0) - (a - 1.0) * cos_w0 + sqrt_a_alpha2) / a0,
                b1: 2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0) / a0,
                b2: a * ((a + 1.0) - (a - 1.0) * cos_w0 - sqrt_a_alpha2) / a0,
                a1: -2.0 * ((a - 1.0) + (a + 1.0) * cos_w0) / a0,
                a2: ((a + 1.0) + (a - 1.0) * cos_w0 - sqrt_a_alpha2) / a0,
            }
        }
        FilterType::HighShelf => {
            let sqrt_a_alpha2 = 2.0 * a.sqrt() * alpha;
            let a0 = (a + 1.0) - (a - 1.0) * cos_w0 + sqrt_a_alpha2;
            BiquadCoeffs {
                b0: a * ((a + 1.0) + (a - 1.0) * cos_w0 + sqrt_a_alpha2) / a0,
                b1: -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0) / a0,
                b2: a * ((a + 1.0) + (a - 1.0) * cos_w0 - sqrt_a_alpha2) / a0,
                a1: 2.0 * ((a - 1.0) - (a + 1.0) * cos_w0) / a0,
                a2: ((a + 1.0) - (a - 1.0) * cos_w0 - sqrt_a_alpha2) / a0,
            }
        }
        FilterType::Invalid => return Err(FilterError::InvalidFilter),
    };

    if !coeffs.is_finite() {
        return Err(FilterError::invalid_argument(format!(
            "{filter:?} produced non-finite coefficients at {sample_rate} Hz"
        )));
    }
    Ok(coeffs)
}

/// Evaluates `filter` at each of `freqs`, designed at [`RESPONSE_SAMPLE_RATE`].
pub fn response(filter: &Filter, freqs: &[f64]) -> Result<FrequencyResponse, FilterError> {
    let coeffs = compute(RESPONSE_SAMPLE_RATE, filter)?;
    let mut result = FrequencyResponse {
        magnitudes_db: Vec::with_capacity(freqs.len()),
        phases_deg: Vec::with_capacity(freqs.len()),
    };
    for &freq in freqs {
        let (re, im) = coeffs.evaluate(freq, RESPONSE_SAMPLE_RATE);
        result.magnitudes_db.push(20.0 * re.hypot(im).log10());
        result.phases_deg.push(im.atan2(re).to_degrees());
    }
    Ok(result)
}
