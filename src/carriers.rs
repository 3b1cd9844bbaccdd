use crate::error::{Error, Result};
use crate::signals::TimeGrid;
use crate::statistics::{arrival_times, truncated_normal};
use rand::Rng;
use rand_distr::{Binomial, Distribution, Poisson};
use uom::si::f64::{Frequency, Time};
use uom::si::time::second;

/// Discretize the illumination function into integer carrier counts.
///
/// Every sample is an independent Poisson draw whose mean is the illumination
/// at that sample.
pub fn shot_noise<R>(illumination: &[f64], rng: &mut R) -> Result<Vec<u64>>
where
    R: Rng + ?Sized,
{
    illumination
        .iter()
        .map(|&mean| -> Result<u64> {
            if mean <= 0.0 {
                return Ok(0);
            }
            let poisson = Poisson::new(mean).map_err(|e| Error::Distribution(e.to_string()))?;
            let count: f64 = poisson.sample(&mut *rng);
            Ok(count as u64)
        })
        .collect()
}

/// Parameters of the after-pulse mechanism, in SI units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct AfterPulseLaw {
    pub probability: f64,
    pub mean_delay: f64,
    pub delay_spread: f64,
}

/// Add after-pulses to a carrier-count waveform.
///
/// The `l` carriers of every sample produce `Binomial(l, probability)`
/// secondary carriers, all delayed by one draw of a Gaussian truncated to the
/// remaining frame time. After-pulses are only seeded by the input carriers,
/// never by other after-pulses. Delays that land past the grid are dropped.
pub(crate) fn after_pulses<R>(
    carriers: &[u64],
    grid: &TimeGrid,
    law: &AfterPulseLaw,
    rng: &mut R,
) -> Result<Vec<u64>>
where
    R: Rng + ?Sized,
{
    let step = grid.step();
    let mut output = carriers.to_vec();
    let mut added = 0;

    for (i, &count) in carriers.iter().enumerate() {
        if count == 0 {
            continue;
        }
        let remaining = grid.duration() - i as f64 * step;
        let delay = truncated_normal(law.mean_delay, law.delay_spread, 0.0, remaining, rng)?;
        let j = i + (delay / step) as usize;
        if j >= output.len() {
            log::trace!("dropping after-pulse of sample {i} past the end of the frame");
            continue;
        }
        let binomial =
            Binomial::new(count, law.probability).map_err(|e| Error::Distribution(e.to_string()))?;
        let secondary = binomial.sample(rng);
        output[j] += secondary;
        added += secondary;
    }
    log::debug!("added {added} after-pulse carriers");

    Ok(output)
}

/// Add one carrier at every arrival of a Poisson process of the given `rate`
/// over `duration`, measured from the start of the grid.
pub(crate) fn dark_noise<R>(
    carriers: &[u64],
    grid: &TimeGrid,
    duration: Time,
    rate: Frequency,
    rng: &mut R,
) -> Result<Vec<u64>>
where
    R: Rng + ?Sized,
{
    let mut output = carriers.to_vec();
    let arrivals = arrival_times(rate, duration, rng)?;
    log::debug!("generated {} dark-noise pulses", arrivals.len());

    for arrival in arrivals {
        if let Some(index) = grid.index_of(arrival.get::<second>()) {
            output[index] += 1;
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use uom::si::frequency::hertz;
    use uom::si::time::{microsecond, nanosecond};

    fn grid(ns: f64) -> TimeGrid {
        TimeGrid::new(Time::new::<nanosecond>(ns), Time::new::<nanosecond>(1.0)).unwrap()
    }

    #[test]
    fn shot_noise_zero_mean_is_zero() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(shot_noise(&[0.0; 5], &mut rng).unwrap(), vec![0; 5]);
    }

    #[test]
    fn shot_noise_mean() {
        let mut rng = StdRng::seed_from_u64(2);
        let counts = shot_noise(&vec![4.0; 10_000], &mut rng).unwrap();
        let mean = counts.iter().sum::<u64>() as f64 / counts.len() as f64;
        // Standard error is 0.02.
        assert!((mean - 4.0).abs() < 0.1);
    }

    #[test]
    fn after_pulses_full_probability_doubles_charge() {
        let mut rng = StdRng::seed_from_u64(3);
        let grid = grid(1000.0);
        let mut carriers = vec![0; grid.len()];
        carriers[10] = 7;
        let law = AfterPulseLaw {
            probability: 1.0,
            mean_delay: 200e-9,
            delay_spread: 10e-9,
        };

        let output = after_pulses(&carriers, &grid, &law, &mut rng).unwrap();
        assert_eq!(output[10], 7);
        assert_eq!(output.iter().sum::<u64>(), 14);
        let delayed = output.iter().rposition(|c| *c > 0).unwrap();
        assert!((150..=250).contains(&delayed));
    }

    #[test]
    fn after_pulses_zero_probability_is_identity() {
        let mut rng = StdRng::seed_from_u64(4);
        let grid = grid(100.0);
        let carriers: Vec<u64> = (0..100).map(|i| i % 3).collect();
        let law = AfterPulseLaw {
            probability: 0.0,
            mean_delay: 20e-9,
            delay_spread: 5e-9,
        };
        assert_eq!(after_pulses(&carriers, &grid, &law, &mut rng).unwrap(), carriers);
    }

    #[test]
    fn after_pulses_stay_inside_frame() {
        let mut rng = StdRng::seed_from_u64(5);
        let grid = grid(100.0);
        let mut carriers = vec![0; grid.len()];
        carriers[99] = 50;
        let law = AfterPulseLaw {
            probability: 1.0,
            mean_delay: 1e-6,
            delay_spread: 1e-9,
        };

        let output = after_pulses(&carriers, &grid, &law, &mut rng).unwrap();
        assert_eq!(output.len(), 100);
        assert!(output.iter().sum::<u64>() <= 100);
    }

    #[test]
    fn dark_noise_adds_single_carriers() {
        let mut rng = StdRng::seed_from_u64(6);
        let grid = TimeGrid::new(Time::new::<microsecond>(100.0), Time::new::<nanosecond>(1.0))
            .unwrap();
        let carriers = vec![0; grid.len()];

        let output = dark_noise(
            &carriers,
            &grid,
            Time::new::<microsecond>(100.0),
            Frequency::new::<hertz>(1e6),
            &mut rng,
        )
        .unwrap();
        let total = output.iter().sum::<u64>();
        // Poisson(100) over the frame.
        assert!((50..150).contains(&total));
    }

    #[test]
    fn dark_noise_stays_inside_duration() {
        let mut rng = StdRng::seed_from_u64(7);
        let grid = grid(100.0);
        let carriers = vec![0; grid.len()];

        let output = dark_noise(
            &carriers,
            &grid,
            Time::new::<nanosecond>(40.0),
            Frequency::new::<hertz>(1e10),
            &mut rng,
        )
        .unwrap();
        assert!(output[..40].iter().sum::<u64>() > 0);
        assert!(output[40..].iter().all(|c| *c == 0));
    }
}
