use crate::error::{ensure_positive, Error, Result};
use crate::filters::Butterworth;
use rand::Rng;
use rand_distr::{Distribution, Uniform};
use uom::si::electric_potential::volt;
use uom::si::f64::{ElectricPotential, Frequency};
use uom::si::frequency::hertz;

/// Order of the anti-aliasing filter.
const ANTI_ALIASING_ORDER: usize = 4;

/// How the finite resolution of the ADC is modelled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Quantization {
    /// Round every sample to the nearest code.
    #[default]
    Rounding,
    /// Add uniform noise of one code width instead of rounding.
    Dither,
}

/// Round every sample to the nearest multiple of `step`.
///
/// # Examples
///
/// ```
/// use scint::digitizer::quantize;
///
/// assert_eq!(quantize(&[0.26, -0.74], 0.5), vec![0.5, -0.5]);
/// ```
pub fn quantize(input: &[f64], step: f64) -> Vec<f64> {
    input
        .iter()
        .map(|x| (x / step).round_ties_even() * step)
        .collect()
}

/// Add noise uniformly distributed in `[-step / 2, step / 2)` to every sample.
pub fn dither<R>(input: &[f64], step: f64, rng: &mut R) -> Result<Vec<f64>>
where
    R: Rng + ?Sized,
{
    let uniform = Uniform::new(-0.5, 0.5).map_err(|e| Error::Distribution(e.to_string()))?;
    Ok(input
        .iter()
        .map(|x| x + uniform.sample(rng) * step)
        .collect())
}

/// Clip every sample to `[-full_scale_range / 2, full_scale_range / 2]`.
pub fn saturate(input: &[f64], full_scale_range: f64) -> Vec<f64> {
    let limit = full_scale_range / 2.0;
    input.iter().map(|x| x.clamp(-limit, limit)).collect()
}

/// Analog-to-digital converter at the end of the chain.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Digitizer {
    /// Cut-off frequency of the anti-aliasing filter.
    pub cutoff: Frequency,
    /// Resolution in bits.
    pub bits: u32,
    /// Peak-to-peak input range, centred on zero.
    pub full_scale_range: ElectricPotential,
    pub quantization: Quantization,
}

impl Digitizer {
    /// Width of one code in volts.
    pub fn code_width(&self) -> f64 {
        self.full_scale_range.get::<volt>() / 2f64.powi(self.bits as i32)
    }

    /// Check the parameters against a sampling interval of `time_step`
    /// seconds.
    pub(crate) fn validate(&self, time_step: f64) -> Result<()> {
        ensure_positive("full_scale_range", self.full_scale_range.get::<volt>())?;
        if self.bits == 0 || self.bits > 52 {
            return Err(Error::degenerate(
                "bits",
                format!("must lie in 1..=52 (got {})", self.bits),
            ));
        }
        ensure_positive("cutoff", self.cutoff.get::<hertz>())?;
        Butterworth::lowpass(ANTI_ALIASING_ORDER, self.normalized_cutoff(time_step))?;

        Ok(())
    }

    fn normalized_cutoff(&self, time_step: f64) -> f64 {
        let nyquist = 0.5 / time_step;
        self.cutoff.get::<hertz>() / nyquist
    }

    /// Anti-alias, quantize and saturate a waveform sampled every
    /// `time_step` seconds.
    pub fn digitize<R>(&self, input: &[f64], time_step: f64, rng: &mut R) -> Result<Vec<f64>>
    where
        R: Rng + ?Sized,
    {
        let filter = Butterworth::lowpass(ANTI_ALIASING_ORDER, self.normalized_cutoff(time_step))?;
        let filtered = filter.filtfilt(input);
        let quantized = match self.quantization {
            Quantization::Rounding => quantize(&filtered, self.code_width()),
            Quantization::Dither => dither(&filtered, self.code_width(), rng)?,
        };

        Ok(saturate(&quantized, self.full_scale_range.get::<volt>()))
    }
}
