use crate::error::{Error, Result};
use rand::Rng;
use rand_distr::{Distribution, Exp};
use statrs::distribution::{ContinuousCDF, Normal};
use uom::si::f64::{Frequency, Time};
use uom::si::frequency::hertz;
use uom::si::time::second;

#[derive(Debug)]
/// An iterator over a Poisson process.
///
/// The iterator yields [`Time`]s at which events occur in a Poisson process.
/// Times are guaranteed to be in increasing order and their inter-arrival time
/// follows an exponential distribution with the specified rate parameter.
pub struct PoissonProcess<R> {
    time: Time,
    // [`Time`] doesn't implement the `num_traits::Float` trait, so we can't
    // directly sample [`Times`] from the exponential distribution. Instead,
    // we'll sample `f64`s in seconds and convert them before returning to the
    // user.
    exp: Exp<f64>,
    rng: R,
}

impl<R> PoissonProcess<R>
where
    R: Rng,
{
    /// Create a new Poisson process with the specified rate parameter.
    ///
    /// The rate must be finite and strictly positive.
    pub fn new(rate: Frequency, rng: R) -> Result<Self> {
        let lambda = crate::error::ensure_positive("rate", rate.get::<hertz>())?;

        Ok(Self {
            time: Time::new::<second>(0.0),
            exp: Exp::new(lambda).map_err(|e| Error::Distribution(e.to_string()))?,
            rng,
        })
    }
}

impl<R> Iterator for PoissonProcess<R>
where
    R: Rng,
{
    type Item = Time;

    fn next(&mut self) -> Option<Self::Item> {
        let delta_t = self.exp.sample(&mut self.rng);
        self.time += Time::new::<second>(delta_t);

        Some(self.time)
    }
}

/// Generate the arrival times of a Poisson process of the given `rate` inside
/// the window `[0, duration)`.
///
/// The first arrival that falls at or past `duration` terminates the process
/// and is discarded. A low rate can yield an empty sequence.
///
/// # Examples
///
/// ```
/// use rand::{rngs::StdRng, SeedableRng};
/// use scint::statistics::arrival_times;
/// use uom::si::f64::{Frequency, Time};
/// use uom::si::{frequency::hertz, time::second};
///
/// let mut rng = StdRng::seed_from_u64(7);
/// let duration = Time::new::<second>(1e-3);
/// let times = arrival_times(Frequency::new::<hertz>(1e5), duration, &mut rng)?;
///
/// assert!(times.windows(2).all(|w| w[0] < w[1]));
/// assert!(times.iter().all(|t| *t < duration));
/// # Ok::<(), scint::Error>(())
/// ```
pub fn arrival_times<R>(rate: Frequency, duration: Time, rng: &mut R) -> Result<Vec<Time>>
where
    R: Rng + ?Sized,
{
    crate::error::ensure_positive("duration", duration.get::<second>())?;
    let process = PoissonProcess::new(rate, rng)?;

    Ok(process.take_while(|t| *t < duration).collect())
}

/// Draw a sample from a Gaussian with the given `mean` and `std_dev`
/// truncated to the interval `[low, high]`.
///
/// Sampling goes through the inverse CDF, so it never loops regardless of how
/// far in the tails the interval lies. When the interval carries no
/// representable probability mass, the bound closest to the mean is returned.
pub fn truncated_normal<R>(mean: f64, std_dev: f64, low: f64, high: f64, rng: &mut R) -> Result<f64>
where
    R: Rng + ?Sized,
{
    if high <= low {
        return Ok(low);
    }
    if std_dev == 0.0 {
        return Ok(mean.clamp(low, high));
    }
    let normal = Normal::new(mean, std_dev).map_err(|e| Error::Distribution(e.to_string()))?;
    let u: f64 = rng.random();

    // Invert whichever tail the interval sits in; `1 - cdf` loses all
    // precision far above the mean.
    let x = if low >= mean {
        let (upper, lower) = (normal.sf(low), normal.sf(high));
        if upper - lower <= 0.0 {
            return Ok(low);
        }
        let s = lower + u * (upper - lower);
        2.0 * mean - normal.inverse_cdf(s)
    } else {
        let (lower, upper) = (normal.cdf(low), normal.cdf(high));
        if upper - lower <= 0.0 {
            return Ok(high);
        }
        normal.inverse_cdf(lower + u * (upper - lower))
    };

    Ok(x.clamp(low, high))
}

/// Report of a resampling with replacement of the energy vector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bootstrap {
    /// Length of the energy vector provided by the caller.
    pub supplied: usize,
    /// Number of decay events that needed an energy.
    pub required: usize,
}

impl Bootstrap {
    /// Share of the required energies that were available in the input, in
    /// percent.
    pub fn percentage(&self) -> f64 {
        100.0 * self.supplied as f64 / self.required as f64
    }
}

/// Pick one energy per event.
///
/// Energies are taken in order while the input is long enough. Otherwise all
/// `count` energies are drawn uniformly with replacement from the input, and
/// the returned [`Bootstrap`] describes the shortfall.
pub fn assign_energies<R>(
    energies: &[f64],
    count: usize,
    rng: &mut R,
) -> Result<(Vec<f64>, Option<Bootstrap>)>
where
    R: Rng + ?Sized,
{
    if energies.is_empty() {
        return Err(Error::degenerate(
            "energies",
            "is empty; there is nothing to draw deposits from",
        ));
    }
    if count <= energies.len() {
        return Ok((energies[..count].to_vec(), None));
    }

    let bootstrap = Bootstrap {
        supplied: energies.len(),
        required: count,
    };
    log::info!(
        "bootstrapping energies: {:.2} % of the {} required deposits were supplied",
        bootstrap.percentage(),
        count
    );
    let resampled = (0..count)
        .map(|_| energies[rng.random_range(0..energies.len())])
        .collect();

    Ok((resampled, Some(bootstrap)))
}
