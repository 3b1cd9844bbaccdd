use crate::carriers::AfterPulseLaw;
use crate::error::{ensure_fraction, ensure_non_negative, ensure_positive};
use crate::filters::{cr_cascade, gaussian_smooth, rc_filter};
use crate::illumination::{DecayLaw, Illumination};
use crate::statistics::{assign_energies, Bootstrap};
use bon::bon;
use rand::Rng;
use rand_distr::{Distribution, Normal, StandardNormal};
use uom::si::capacitance::{farad, picofarad};
use uom::si::electric_potential::volt;
use uom::si::f64::{Capacitance, ElectricPotential, Frequency, Time};
use uom::si::frequency::hertz;
use uom::si::time::{microsecond, nanosecond, second};

pub use digitizer::{Digitizer, Quantization};
pub use error::{Error, Result};
pub use signals::{Signals, TimeGrid};

/// Integer carrier counts: shot noise, after-pulses and dark noise.
pub mod carriers;
/// Analog-to-digital conversion.
pub mod digitizer;
pub mod error;
/// Analog and digital filters applied along the chain.
pub mod filters;
/// Mean carrier density produced by scintillation events.
pub mod illumination;
pub mod signals;
/// Random processes shared by the stages.
pub mod statistics;

/// Elementary charge in coulombs.
const ELEMENTARY_CHARGE: f64 = 1.602_176_634e-19;

/// Sign of the voltage produced by a carrier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Polarity {
    Positive,
    /// Photomultipliers deliver negative pulses.
    #[default]
    Negative,
}

impl Polarity {
    pub fn sign(&self) -> f64 {
        match self {
            Polarity::Positive => 1.0,
            Polarity::Negative => -1.0,
        }
    }
}

/// Secondary carriers released by ionization of residual gas.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AfterPulses {
    /// Probability that a carrier produces an after-pulse.
    pub probability: f64,
    pub mean_delay: Time,
    pub delay_spread: Time,
}

/// Spontaneous single carriers (thermionic emission).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DarkNoise {
    pub rate: Frequency,
}

/// Additive white Gaussian noise on the voltage.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ElectronicNoise {
    pub rms: ElectricPotential,
}

/// RC integrating preamplifier.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Preamplifier {
    pub gain: f64,
    pub time_constant: Time,
}

/// CR differentiating amplifier of the given order.
///
/// The gain is applied once, after the first stage.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Amplifier {
    pub gain: f64,
    pub time_constant: Time,
    pub order: u32,
}

impl Amplifier {
    fn stage_gains(&self) -> Vec<f64> {
        (0..self.order)
            .map(|stage| if stage == 0 { self.gain } else { 1.0 })
            .collect()
    }
}

/// Simulated scintillation detector and its readout chain.
///
/// A frame is produced by [`Simulation::run`]. Optional stages that are left
/// unset pass their input through unchanged.
#[derive(Clone, Debug)]
pub struct Simulation {
    frame_duration: Time,
    grid: TimeGrid,
    law: DecayLaw,
    rate: Frequency,
    light_yield: f64,
    // Volts per carrier, before the frame-wide fluctuation.
    carrier_voltage: f64,
    capacitance_spread: f64,
    single_carrier_spread: f64,
    polarity: Polarity,
    // Width of a single-carrier pulse, in samples.
    pulse_width: f64,
    baseline: f64,
    after_pulses: Option<AfterPulseLaw>,
    dark_noise: Option<DarkNoise>,
    electronic_noise: Option<f64>,
    preamplifier: Option<Preamplifier>,
    amplifier: Option<Amplifier>,
    digitizer: Option<Digitizer>,
}

#[bon]
impl Simulation {
    #[builder]
    pub fn new(
        #[builder(default = Time::new::<microsecond>(100.0))] frame_duration: Time,
        #[builder(default = Time::new::<nanosecond>(1.0))] time_step: Time,
        #[builder(default = Time::new::<nanosecond>(250.0))] prompt_decay: Time,
        #[builder(default = Time::new::<nanosecond>(2000.0))] delayed_decay: Time,
        #[builder(default)] delayed_fraction: f64,
        #[builder(default = Frequency::new::<hertz>(1e5))] rate: Frequency,
        /// Mean number of carriers per keV deposited.
        #[builder(default = 1.0)]
        light_yield: f64,
        #[builder(default = Capacitance::new::<picofarad>(1.0))] capacitance: Capacitance,
        /// Relative standard deviation of the capacitance from frame to frame.
        #[builder(default)]
        capacitance_spread: f64,
        /// Relative standard deviation of the charge of a single carrier.
        #[builder(default)]
        single_carrier_spread: f64,
        #[builder(default)] polarity: Polarity,
        /// Width of the pulse produced by a single carrier.
        #[builder(default = Time::new::<nanosecond>(10.0))]
        pulse_width: Time,
        #[builder(default = ElectricPotential::new::<volt>(0.0))] baseline: ElectricPotential,
        after_pulses: Option<AfterPulses>,
        dark_noise: Option<DarkNoise>,
        electronic_noise: Option<ElectronicNoise>,
        preamplifier: Option<Preamplifier>,
        amplifier: Option<Amplifier>,
        digitizer: Option<Digitizer>,
    ) -> Result<Self> {
        let grid = TimeGrid::new(frame_duration, time_step)?;
        let step = grid.step();
        let law = DecayLaw {
            prompt: ensure_positive("prompt_decay", prompt_decay.get::<second>())?,
            delayed: ensure_positive("delayed_decay", delayed_decay.get::<second>())?,
            delayed_fraction: ensure_fraction("delayed_fraction", delayed_fraction)?,
        };
        ensure_positive("rate", rate.get::<hertz>())?;
        ensure_non_negative("light_yield", light_yield)?;
        let capacitance = ensure_positive("capacitance", capacitance.get::<farad>())?;
        ensure_non_negative("capacitance_spread", capacitance_spread)?;
        ensure_non_negative("single_carrier_spread", single_carrier_spread)?;
        let pulse_width = ensure_positive("pulse_width", pulse_width.get::<second>())? / step;
        let baseline = baseline.get::<volt>();
        if !baseline.is_finite() {
            return Err(Error::degenerate("baseline", "must be finite"));
        }

        let after_pulses = after_pulses
            .map(|a| -> Result<AfterPulseLaw> {
                Ok(AfterPulseLaw {
                    probability: ensure_fraction("after_pulses.probability", a.probability)?,
                    mean_delay: ensure_positive(
                        "after_pulses.mean_delay",
                        a.mean_delay.get::<second>(),
                    )?,
                    delay_spread: ensure_non_negative(
                        "after_pulses.delay_spread",
                        a.delay_spread.get::<second>(),
                    )?,
                })
            })
            .transpose()?;
        if let Some(dark_noise) = &dark_noise {
            ensure_positive("dark_noise.rate", dark_noise.rate.get::<hertz>())?;
        }
        let electronic_noise = electronic_noise
            .map(|noise| ensure_non_negative("electronic_noise.rms", noise.rms.get::<volt>()))
            .transpose()?;
        if let Some(preamplifier) = &preamplifier {
            ensure_positive(
                "preamplifier.time_constant",
                preamplifier.time_constant.get::<second>(),
            )?;
            if !preamplifier.gain.is_finite() {
                return Err(Error::degenerate("preamplifier.gain", "must be finite"));
            }
        }
        if let Some(amplifier) = &amplifier {
            ensure_positive(
                "amplifier.time_constant",
                amplifier.time_constant.get::<second>(),
            )?;
            if !amplifier.gain.is_finite() {
                return Err(Error::degenerate("amplifier.gain", "must be finite"));
            }
            if amplifier.order == 0 {
                return Err(Error::degenerate("amplifier.order", "must be at least 1"));
            }
        }
        if let Some(digitizer) = &digitizer {
            digitizer.validate(step)?;
        }

        Ok(Self {
            frame_duration,
            grid,
            law,
            rate,
            light_yield,
            carrier_voltage: ELEMENTARY_CHARGE / capacitance,
            capacitance_spread,
            single_carrier_spread,
            polarity,
            pulse_width,
            baseline,
            after_pulses,
            dark_noise,
            electronic_noise,
            preamplifier,
            amplifier,
            digitizer,
        })
    }
}

impl Simulation {
    /// Sampling grid of a frame.
    pub fn grid(&self) -> &TimeGrid {
        &self.grid
    }

    /// Simulate one frame.
    ///
    /// Decays arrive as a Poisson process over the frame and deposit the
    /// `energies` (keV) in order. If there are more decays than energies, the
    /// energies are resampled with replacement and [`Signals::bootstrap`]
    /// reports it.
    pub fn run<R>(&self, energies: &[f64], rng: &mut R) -> Result<Signals>
    where
        R: Rng + ?Sized,
    {
        validate_energies(energies)?;
        let arrivals = statistics::arrival_times(self.rate, self.frame_duration, rng)?;
        log::debug!("generated {} decay events", arrivals.len());

        let (energies, bootstrap) = assign_energies(energies, arrivals.len(), rng)?;
        let illumination = illumination::illuminate(
            &self.law,
            &arrivals,
            &energies,
            self.light_yield,
            &self.grid,
        );

        self.readout(self.grid, self.frame_duration, illumination, bootstrap, rng)
    }

    /// Simulate the response to the first deposit of `energies` that
    /// produces carriers, in isolation.
    ///
    /// The returned signals live on the grid `[-T, T)`; the pulse starts at
    /// `t = 0`.
    pub fn pulse_preview<R>(&self, energies: &[f64], rng: &mut R) -> Result<Signals>
    where
        R: Rng + ?Sized,
    {
        validate_energies(energies)?;
        let (grid, illumination) =
            illumination::single_pulse(&self.law, energies, self.light_yield, &self.grid)
                .ok_or_else(|| {
                    Error::degenerate("energies", "contains no deposit that produces carriers")
                })?;

        self.readout(grid, self.frame_duration * 2.0, illumination, None, rng)
    }

    /// Run every stage after the illumination function. Dark noise is drawn
    /// over `duration` from the start of `grid`.
    fn readout<R>(
        &self,
        grid: TimeGrid,
        duration: Time,
        illumination: Illumination,
        bootstrap: Option<Bootstrap>,
        rng: &mut R,
    ) -> Result<Signals>
    where
        R: Rng + ?Sized,
    {
        let step = grid.step();
        let Illumination {
            waveform: v0,
            energy_comb: y0,
            charge_comb: y1,
        } = illumination;

        let v1 = carriers::shot_noise(&v0, rng)?;
        log::debug!("shot noise produced {} carriers", v1.iter().sum::<u64>());

        let v2 = match &self.after_pulses {
            Some(law) => carriers::after_pulses(&v1, &grid, law, rng)?,
            None => v1.clone(),
        };
        let v3 = match &self.dark_noise {
            Some(dark_noise) => carriers::dark_noise(&v2, &grid, duration, dark_noise.rate, rng)?,
            None => v2.clone(),
        };

        let v4 = self.to_voltage(&v3, rng)?;
        let v5 = match self.electronic_noise {
            Some(rms) => v4
                .iter()
                .map(|v| v + rms * rng.sample::<f64, _>(StandardNormal))
                .collect(),
            None => v4.clone(),
        };
        let v6 = match &self.preamplifier {
            Some(preamplifier) => {
                rc_filter(&v5, preamplifier.time_constant.get::<second>(), step)
                    .into_iter()
                    .map(|v| v * preamplifier.gain)
                    .collect()
            }
            None => v5.clone(),
        };
        let v7 = match &self.amplifier {
            Some(amplifier) => cr_cascade(
                &v6,
                amplifier.time_constant.get::<second>(),
                step,
                &amplifier.stage_gains(),
            ),
            None => v6.clone(),
        };
        let v8 = match &self.digitizer {
            Some(digitizer) => digitizer.digitize(&v7, step, rng)?,
            None => v7.clone(),
        };

        Ok(Signals {
            grid,
            v0,
            v1,
            v2,
            v3,
            v4,
            v5,
            v6,
            v7,
            v8,
            y0,
            y1,
            bootstrap,
        })
    }

    /// Convert carriers to volts and spread every carrier over the
    /// single-carrier pulse shape.
    ///
    /// The nominal `q_e / C` per carrier is multiplied by one frame-wide
    /// draw of `N(1, capacitance_spread)`. With a non-zero
    /// `single_carrier_spread`, every carrier also carries its own
    /// `N(1, single_carrier_spread)` share of charge.
    fn to_voltage<R>(&self, carriers: &[u64], rng: &mut R) -> Result<Vec<f64>>
    where
        R: Rng + ?Sized,
    {
        let fluctuation = Normal::new(1.0, self.capacitance_spread)
            .map_err(|e| Error::Distribution(e.to_string()))?
            .sample(rng);
        let volts_per_carrier = self.polarity.sign() * self.carrier_voltage * fluctuation;

        let charge: Vec<f64> = if self.single_carrier_spread > 0.0 {
            let gain = Normal::new(1.0, self.single_carrier_spread)
                .map_err(|e| Error::Distribution(e.to_string()))?;
            carriers
                .iter()
                .map(|&count| {
                    let total: f64 = (0..count).map(|_| gain.sample(&mut *rng)).sum();
                    total * volts_per_carrier
                })
                .collect()
        } else {
            carriers
                .iter()
                .map(|&count| count as f64 * volts_per_carrier)
                .collect()
        };
        Ok(gaussian_smooth(&charge, self.pulse_width)
            .into_iter()
            .map(|v| v + self.baseline)
            .collect())
    }
}

fn validate_energies(energies: &[f64]) -> Result<()> {
    if energies.is_empty() {
        return Err(Error::degenerate(
            "energies",
            "is empty; there is nothing to draw deposits from",
        ));
    }
    if let Some(energy) = energies.iter().find(|e| !(e.is_finite() && **e >= 0.0)) {
        return Err(Error::degenerate(
            "energies",
            format!("must be finite and non-negative (found {energy})"),
        ));
    }

    Ok(())
}
