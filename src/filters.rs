use crate::error::{Error, Result};
use num_traits::Float;
use std::f64::consts::PI;

/// Single-pole RC low-pass filter with time constant `tau`, for samples taken
/// every `dt`.
///
/// The output starts at the first input sample and then follows
/// `y[i] = alpha * x[i] + (1 - alpha) * y[i - 1]` with
/// `alpha = dt / (tau + dt)`.
///
/// # Examples
///
/// ```
/// use scint::filters::rc_filter;
///
/// let output = rc_filter(&[0.0, 1.0, 1.0], 1.0, 1.0);
/// assert_eq!(output, vec![0.0, 0.5, 0.75]);
/// ```
pub fn rc_filter<T: Float>(input: &[T], tau: T, dt: T) -> Vec<T> {
    let alpha = dt / (tau + dt);
    let mut output = Vec::with_capacity(input.len());
    let Some((&first, rest)) = input.split_first() else {
        return output;
    };

    let mut previous = first;
    output.push(previous);
    for &x in rest {
        previous = alpha * x + (T::one() - alpha) * previous;
        output.push(previous);
    }

    output
}

/// Single-pole CR high-pass filter with time constant `tau`, for samples
/// taken every `dt`.
///
/// The output starts at the first input sample and then follows
/// `y[i] = alpha * (y[i - 1] + x[i] - x[i - 1])` with
/// `alpha = tau / (tau + dt)`.
pub fn cr_filter<T: Float>(input: &[T], tau: T, dt: T) -> Vec<T> {
    let alpha = tau / (tau + dt);
    let mut output = Vec::with_capacity(input.len());
    let Some(&first) = input.first() else {
        return output;
    };

    let mut previous = first;
    output.push(previous);
    for window in input.windows(2) {
        previous = alpha * (previous + window[1] - window[0]);
        output.push(previous);
    }

    output
}

/// Apply [`cr_filter`] once per entry of `gains`, scaling the output of each
/// stage by its gain.
pub fn cr_cascade<T: Float>(input: &[T], tau: T, dt: T, gains: &[T]) -> Vec<T> {
    gains.iter().fold(input.to_vec(), |signal, &gain| {
        cr_filter(&signal, tau, dt)
            .into_iter()
            .map(|y| y * gain)
            .collect()
    })
}

/// Convolve with a normalized Gaussian of standard deviation `sigma`
/// (in samples), truncated at four standard deviations.
///
/// Samples past either end are mirrored about the boundary (`c b a | a b c`).
pub fn gaussian_smooth(input: &[f64], sigma: f64) -> Vec<f64> {
    let radius = (4.0 * sigma + 0.5) as usize;
    if radius == 0 || input.is_empty() {
        return input.to_vec();
    }

    let mut weights: Vec<f64> = (0..=2 * radius)
        .map(|k| {
            let x = k as f64 - radius as f64;
            (-0.5 / (sigma * sigma) * x * x).exp()
        })
        .collect();
    let total: f64 = weights.iter().sum();
    weights.iter_mut().for_each(|w| *w /= total);

    let n = input.len() as isize;
    let reflect = |k: isize| -> usize {
        let m = k.rem_euclid(2 * n);
        (if m >= n { 2 * n - m - 1 } else { m }) as usize
    };

    (0..n)
        .map(|i| {
            weights
                .iter()
                .enumerate()
                .map(|(k, w)| w * input[reflect(i + k as isize - radius as isize)])
                .sum()
        })
        .collect()
}

/// Second-order section in transposed direct form II.
///
/// `H(z) = (b0 + b1 z^-1 + b2 z^-2) / (1 + a1 z^-1 + a2 z^-2)`
#[derive(Clone, Copy, Debug, PartialEq)]
struct Biquad {
    b: [f64; 3],
    a: [f64; 2],
}

impl Biquad {
    fn dc_gain(&self) -> f64 {
        self.b.iter().sum::<f64>() / (1.0 + self.a[0] + self.a[1])
    }

    /// State reached after a unit step has been fed for ever, scaled by the
    /// level of the step at the input of this section.
    fn steady_state(&self, level: f64) -> [f64; 2] {
        let g = self.dc_gain();
        let s1 = self.b[2] - self.a[1] * g;
        let s0 = self.b[1] - self.a[0] * g + s1;
        [s0 * level, s1 * level]
    }

    fn process(&self, state: &mut [f64; 2], x: f64) -> f64 {
        let y = self.b[0] * x + state[0];
        state[0] = self.b[1] * x - self.a[0] * y + state[1];
        state[1] = self.b[2] * x - self.a[1] * y;
        y
    }
}

/// Digital Butterworth low-pass filter designed by bilinear transform and
/// stored as a cascade of second-order sections.
#[derive(Clone, Debug, PartialEq)]
pub struct Butterworth {
    order: usize,
    sections: Vec<Biquad>,
}

impl Butterworth {
    /// Design a low-pass filter of the given `order`. The `cutoff` is
    /// normalized to the Nyquist frequency and must lie in `(0, 1)`.
    pub fn lowpass(order: usize, cutoff: f64) -> Result<Self> {
        if order == 0 {
            return Err(Error::degenerate("order", "must be at least 1"));
        }
        if !(cutoff > 0.0 && cutoff < 1.0) {
            return Err(Error::degenerate(
                "cutoff",
                format!("must lie strictly between 0 and the Nyquist frequency (got {cutoff} of Nyquist)"),
            ));
        }

        // Normalized sampling frequency of 2, so that Nyquist is 1.
        let k = 4.0;
        let wc = k * (PI * cutoff / 2.0).tan();
        let mut sections = Vec::with_capacity(order.div_ceil(2));

        for i in 0..order / 2 {
            let theta = PI * (2 * i + order + 1) as f64 / (2 * order) as f64;
            let re = wc * theta.cos();
            let mag_sq = wc * wc;
            let d = k * k - 2.0 * k * re + mag_sq;
            sections.push(Biquad {
                b: [mag_sq / d, 2.0 * mag_sq / d, mag_sq / d],
                a: [2.0 * (mag_sq - k * k) / d, (k * k + 2.0 * k * re + mag_sq) / d],
            });
        }
        if order % 2 == 1 {
            let d = k + wc;
            sections.push(Biquad {
                b: [wc / d, wc / d, 0.0],
                a: [(wc - k) / d, 0.0],
            });
        }

        Ok(Self { order, sections })
    }

    /// Run the cascade over `input` once, starting from the given section
    /// states.
    fn filter(&self, input: &[f64], mut states: Vec<[f64; 2]>) -> Vec<f64> {
        input
            .iter()
            .map(|&x| {
                self.sections
                    .iter()
                    .zip(states.iter_mut())
                    .fold(x, |x, (section, state)| section.process(state, x))
            })
            .collect()
    }

    /// Section states for a cascade sitting at a constant input `level`.
    fn initial_states(&self, level: f64) -> Vec<[f64; 2]> {
        let mut level = level;
        self.sections
            .iter()
            .map(|section| {
                let state = section.steady_state(level);
                level *= section.dc_gain();
                state
            })
            .collect()
    }

    /// Filter forwards then backwards, which cancels the phase response.
    ///
    /// The input is extended at both ends by its odd reflection about the
    /// end samples, and every pass starts from the steady state of its first
    /// sample, to keep edge transients small.
    pub fn filtfilt(&self, input: &[f64]) -> Vec<f64> {
        let n = input.len();
        if n == 0 {
            return Vec::new();
        }
        let pad = (3 * (self.order + 1)).min(n - 1);
        let (first, last) = (input[0], input[n - 1]);

        let mut extended = Vec::with_capacity(n + 2 * pad);
        extended.extend((1..=pad).rev().map(|i| 2.0 * first - input[i]));
        extended.extend_from_slice(input);
        extended.extend((1..=pad).map(|i| 2.0 * last - input[n - 1 - i]));

        let mut forward = self.filter(&extended, self.initial_states(extended[0]));
        forward.reverse();
        let mut backward = self.filter(&forward, self.initial_states(forward[0]));
        backward.reverse();

        backward[pad..pad + n].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    #[test]
    fn rc_filter_converges_to_constant() {
        let input = vec![3.0; 2000];
        let output = rc_filter(&input, 10.0, 1.0);
        assert!(output.iter().all(|y| (*y - 3.0).abs() < 1e-12));

        let mut step = vec![0.0; 1];
        step.extend(vec![2.0; 2000]);
        let output = rc_filter(&step, 10.0, 1.0);
        assert_abs_diff_eq!(*output.last().unwrap(), 2.0, epsilon = 1e-12);
        assert!(output[..50].windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn rc_filter_empty() {
        assert!(rc_filter::<f64>(&[], 1.0, 1.0).is_empty());
    }

    #[test]
    fn cr_filter_blocks_dc() {
        let input = vec![5.0; 5000];
        let output = cr_filter(&input, 100.0, 1.0);
        assert_eq!(output[0], 5.0);
        assert_abs_diff_eq!(*output.last().unwrap(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn cr_filter_recursion() {
        let output = cr_filter(&[1.0, 2.0, 2.0], 1.0, 1.0);
        assert_eq!(output, vec![1.0, 1.0, 0.5]);
    }

    #[test]
    fn cr_cascade_applies_gains() {
        let input = [1.0, 2.0, 2.0, 0.0];
        let once = cr_filter(&input, 3.0, 1.0);
        let twice = cr_filter(&once, 3.0, 1.0);

        let cascade = cr_cascade(&input, 3.0, 1.0, &[1.0, 1.0]);
        assert_eq!(cascade, twice);

        let scaled = cr_cascade(&input, 3.0, 1.0, &[2.0]);
        for (s, o) in scaled.iter().zip(&once) {
            assert_relative_eq!(*s, 2.0 * o);
        }

        assert_eq!(cr_cascade(&input, 3.0, 1.0, &[]), input.to_vec());
    }

    #[test]
    fn gaussian_smooth_preserves_area() {
        let mut input = vec![0.0; 200];
        input[100] = 1.0;
        let output = gaussian_smooth(&input, 5.0);

        assert_relative_eq!(output.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(output[95], output[105], epsilon = 1e-15);
        assert!(output[100] > output[101]);
        assert_eq!(output[0], 0.0);
    }

    #[test]
    fn gaussian_smooth_keeps_constants() {
        let output = gaussian_smooth(&[2.0; 10], 3.0);
        for y in output {
            assert_relative_eq!(y, 2.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn gaussian_smooth_narrow_kernel_is_identity() {
        let input = [1.0, 0.0, 4.0];
        assert_eq!(gaussian_smooth(&input, 0.1), input.to_vec());
    }

    #[test]
    fn butterworth_rejects_bad_cutoff() {
        assert!(Butterworth::lowpass(4, 0.0).is_err());
        assert!(Butterworth::lowpass(4, 1.0).is_err());
        assert!(Butterworth::lowpass(0, 0.5).is_err());
    }

    #[test]
    fn butterworth_unit_dc_gain() {
        for order in [1, 2, 3, 4] {
            let filter = Butterworth::lowpass(order, 0.2).unwrap();
            let gain: f64 = filter.sections.iter().map(Biquad::dc_gain).product();
            assert_relative_eq!(gain, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn filtfilt_keeps_constants() {
        let filter = Butterworth::lowpass(4, 0.1).unwrap();
        for y in filter.filtfilt(&[0.7; 100]) {
            assert_relative_eq!(y, 0.7, epsilon = 1e-9);
        }
    }

    #[test]
    fn filtfilt_has_no_delay() {
        let filter = Butterworth::lowpass(4, 0.1).unwrap();
        let mut input = vec![0.0; 301];
        input[150] = 1.0;
        let output = filter.filtfilt(&input);

        let peak = output
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, 150);
        assert_abs_diff_eq!(output[140], output[160], epsilon = 1e-6);
    }

    #[test]
    fn filtfilt_removes_nyquist() {
        let filter = Butterworth::lowpass(4, 0.2).unwrap();
        let input: Vec<f64> = (0..400)
            .map(|i| if i % 2 == 0 { 1.0 } else { -1.0 })
            .collect();
        let output = filter.filtfilt(&input);
        assert!(output[100..300].iter().all(|y| y.abs() < 1e-6));
    }

    #[test]
    fn filtfilt_short_inputs() {
        let filter = Butterworth::lowpass(4, 0.5).unwrap();
        assert!(filter.filtfilt(&[]).is_empty());
        assert_relative_eq!(filter.filtfilt(&[1.5])[0], 1.5, epsilon = 1e-12);
    }
}
