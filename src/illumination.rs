use crate::signals::TimeGrid;
use uom::si::f64::Time;
use uom::si::time::second;

/// Two-component exponential decay of a scintillator.
///
/// A fraction `1 - delayed_fraction` of the light is emitted with the prompt
/// decay constant and the rest with the delayed one.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DecayLaw {
    /// Prompt decay constant in seconds.
    pub prompt: f64,
    /// Delayed decay constant in seconds.
    pub delayed: f64,
    pub delayed_fraction: f64,
}

impl DecayLaw {
    /// Mean carrier density (per second) at `time` after an event that
    /// produces `mean_count` carriers on average.
    pub fn density(&self, mean_count: f64, time: f64) -> f64 {
        (1.0 - self.delayed_fraction) * (mean_count / self.prompt) * (-time / self.prompt).exp()
            + self.delayed_fraction * (mean_count / self.delayed) * (-time / self.delayed).exp()
    }

    /// Density sampled every `step` seconds for `len` samples and multiplied
    /// by `step`, so that the samples sum to roughly `mean_count`.
    ///
    /// # Examples
    ///
    /// ```
    /// use scint::illumination::DecayLaw;
    ///
    /// let law = DecayLaw { prompt: 100e-9, delayed: 2e-6, delayed_fraction: 0.0 };
    /// let kernel = law.kernel(1000.0, 10_000, 1e-9);
    /// let total: f64 = kernel.iter().sum();
    /// assert!((total - 1000.0).abs() < 10.0);
    /// ```
    pub fn kernel(&self, mean_count: f64, len: usize, step: f64) -> Vec<f64> {
        (0..len)
            .map(|j| self.density(mean_count, j as f64 * step) * step)
            .collect()
    }
}

/// Illumination function of a frame and the deposits that produced it.
#[derive(Clone, Debug, PartialEq)]
pub struct Illumination {
    /// Mean number of carriers per sample.
    pub waveform: Vec<f64>,
    /// Energy deposited at each sample, in keV.
    pub energy_comb: Vec<f64>,
    /// Expected number of carriers deposited at each sample.
    pub charge_comb: Vec<f64>,
}

impl Illumination {
    fn zeros(len: usize) -> Self {
        Self {
            waveform: vec![0.0; len],
            energy_comb: vec![0.0; len],
            charge_comb: vec![0.0; len],
        }
    }
}

/// Sum the decay kernels of every event into the illumination function.
///
/// Each event `i` arrives at `arrivals[i]`, deposits `energies[i]` keV and
/// produces on average `energies[i] * light_yield` carriers. Kernels are
/// truncated at the end of the grid and overlapping kernels pile up.
/// Events past the end of the grid are dropped.
pub fn illuminate(
    law: &DecayLaw,
    arrivals: &[Time],
    energies: &[f64],
    light_yield: f64,
    grid: &TimeGrid,
) -> Illumination {
    let n = grid.len();
    let mut illumination = Illumination::zeros(n);

    for (arrival, energy) in arrivals.iter().zip(energies) {
        let Some(index) = grid.index_of(arrival.get::<second>()) else {
            log::trace!("dropping event past the end of the frame at {arrival:?}");
            continue;
        };
        let mean_count = energy * light_yield;
        illumination.energy_comb[index] += energy;
        illumination.charge_comb[index] += mean_count;
        if mean_count == 0.0 {
            continue;
        }

        let kernel = law.kernel(mean_count, n - index, grid.step());
        for (sample, k) in illumination.waveform[index..].iter_mut().zip(kernel) {
            *sample += k;
        }
    }

    illumination
}

/// Kernel of the first event with a non-zero expected carrier count, laid
/// out on the symmetric grid `[-T, T)` derived from `grid`.
///
/// The pulse starts at `t = 0` (index `grid.len()`), preceded by as many
/// zeros as the pulse is long. Returns `None` if every event has a zero
/// expected count.
pub fn single_pulse(
    law: &DecayLaw,
    energies: &[f64],
    light_yield: f64,
    grid: &TimeGrid,
) -> Option<(TimeGrid, Illumination)> {
    let energy = energies
        .iter()
        .copied()
        .find(|energy| energy * light_yield > 0.0)?;
    let mean_count = energy * light_yield;

    let n = grid.len();
    let symmetric = grid.symmetric();
    let mut illumination = Illumination::zeros(symmetric.len());
    illumination.waveform[n..].copy_from_slice(&law.kernel(mean_count, n, grid.step()));
    illumination.energy_comb[n] = energy;
    illumination.charge_comb[n] = mean_count;

    Some((symmetric, illumination))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use uom::si::time::nanosecond;

    fn grid(ns: f64) -> TimeGrid {
        TimeGrid::new(Time::new::<nanosecond>(ns), Time::new::<nanosecond>(1.0)).unwrap()
    }

    const PROMPT: DecayLaw = DecayLaw {
        prompt: 100e-9,
        delayed: 2000e-9,
        delayed_fraction: 0.0,
    };

    #[test]
    fn kernel_integrates_to_mean_count() {
        let kernel = PROMPT.kernel(500.0, 10_000, 1e-9);
        let total: f64 = kernel.iter().sum();
        // Euler sum overshoots by about step / (2 tau).
        assert_relative_eq!(total, 500.0, max_relative = 1e-2);
    }

    #[test]
    fn kernel_mixes_components() {
        let law = DecayLaw {
            delayed_fraction: 0.25,
            ..PROMPT
        };
        let kernel = law.kernel(100.0, 1, 1e-9);
        let expected = (0.75 * 100.0 / 100e-9 + 0.25 * 100.0 / 2000e-9) * 1e-9;
        assert_relative_eq!(kernel[0], expected);
    }

    #[test]
    fn illuminate_shifts_and_truncates() {
        let grid = grid(100.0);
        let arrivals = [Time::new::<nanosecond>(60.5)];
        let illumination = illuminate(&PROMPT, &arrivals, &[2.0], 10.0, &grid);

        assert!(illumination.waveform[..60].iter().all(|v| *v == 0.0));
        assert_relative_eq!(illumination.waveform[60], PROMPT.density(20.0, 0.0) * 1e-9);
        assert!(illumination.waveform[60..].windows(2).all(|w| w[0] > w[1]));
        assert_eq!(illumination.energy_comb[60], 2.0);
        assert_eq!(illumination.charge_comb[60], 20.0);
    }

    #[test]
    fn illuminate_piles_up() {
        let grid = grid(1000.0);
        let arrivals = [Time::new::<nanosecond>(10.3), Time::new::<nanosecond>(10.6)];
        let both = illuminate(&PROMPT, &arrivals, &[1.0, 1.0], 1.0, &grid);
        let one = illuminate(&PROMPT, &arrivals[..1], &[1.0], 1.0, &grid);

        for (b, o) in both.waveform.iter().zip(&one.waveform) {
            assert_relative_eq!(*b, 2.0 * o);
        }
        assert_eq!(both.energy_comb[10], 2.0);
    }

    #[test]
    fn illuminate_zero_energy_only_marks_comb() {
        let grid = grid(100.0);
        let arrivals = [Time::new::<nanosecond>(5.0)];
        let illumination = illuminate(&PROMPT, &arrivals, &[0.0], 1.0, &grid);

        assert!(illumination.waveform.iter().all(|v| *v == 0.0));
        assert_eq!(illumination.energy_comb[5], 0.0);
        assert!(illumination.charge_comb.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn illuminate_no_events() {
        let illumination = illuminate(&PROMPT, &[], &[], 1.0, &grid(10.0));
        assert_eq!(illumination.waveform, vec![0.0; 10]);
    }

    #[test]
    fn illumination_is_non_negative() {
        let law = DecayLaw {
            delayed_fraction: 0.3,
            ..PROMPT
        };
        let arrivals: Vec<_> = (0..20)
            .map(|i| Time::new::<nanosecond>(7.0 * i as f64))
            .collect();
        let illumination = illuminate(&law, &arrivals, &[3.0; 20], 2.0, &grid(200.0));
        assert!(illumination.waveform.iter().all(|v| *v >= 0.0));
    }

    #[test]
    fn single_pulse_layout() {
        let grid = grid(50.0);
        let (symmetric, pulse) = single_pulse(&PROMPT, &[0.0, 3.0, 5.0], 2.0, &grid).unwrap();

        assert_eq!(symmetric.len(), 100);
        assert!(pulse.waveform[..50].iter().all(|v| *v == 0.0));
        assert_eq!(pulse.waveform[50..], PROMPT.kernel(6.0, 50, grid.step())[..]);
        assert_eq!(pulse.energy_comb[50], 3.0);
        assert_eq!(pulse.charge_comb[50], 6.0);
    }

    #[test]
    fn single_pulse_needs_a_non_zero_event() {
        assert_eq!(single_pulse(&PROMPT, &[0.0, 0.0], 1.0, &grid(10.0)), None);
    }
}
