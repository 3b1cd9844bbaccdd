use crate::error::{ensure_positive, Error, Result};
use crate::statistics::Bootstrap;
use uom::si::f64::Time;
use uom::si::time::second;

/// Uniform sampling grid shared by every waveform of a frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeGrid {
    start: f64,
    step: f64,
    len: usize,
}

impl TimeGrid {
    /// Grid spanning `[0, duration)` with the given `step`.
    ///
    /// # Examples
    ///
    /// ```
    /// use scint::signals::TimeGrid;
    /// use uom::si::f64::Time;
    /// use uom::si::time::{nanosecond, microsecond};
    ///
    /// let grid = TimeGrid::new(Time::new::<microsecond>(100.0), Time::new::<nanosecond>(1.0))?;
    /// assert_eq!(grid.len(), 100_000);
    /// # Ok::<(), scint::Error>(())
    /// ```
    pub fn new(duration: Time, step: Time) -> Result<Self> {
        let duration = ensure_positive("frame_duration", duration.get::<second>())?;
        let step = ensure_positive("time_step", step.get::<second>())?;
        // Ratios like 1e-4 / 1e-9 land a hair above the exact integer.
        let ratio = duration / step;
        let len = (ratio - 1e-9 * ratio).ceil() as usize;
        if len == 0 {
            return Err(Error::degenerate(
                "time_step",
                format!("is longer than the frame ({step} s > {duration} s)"),
            ));
        }

        Ok(Self {
            start: 0.0,
            step,
            len,
        })
    }

    /// Grid twice as long, spanning `[-duration, duration)`.
    pub fn symmetric(&self) -> Self {
        Self {
            start: self.start - self.len as f64 * self.step,
            step: self.step,
            len: 2 * self.len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Sampling step in seconds.
    pub fn step(&self) -> f64 {
        self.step
    }

    /// First sample time in seconds.
    pub fn start(&self) -> f64 {
        self.start
    }

    /// Time covered by the grid, in seconds.
    pub fn duration(&self) -> f64 {
        self.len as f64 * self.step
    }

    /// Sample times in seconds.
    pub fn times(&self) -> Vec<f64> {
        (0..self.len)
            .map(|i| self.start + i as f64 * self.step)
            .collect()
    }

    /// Index of the sample containing `time` (seconds from the grid start),
    /// or `None` if it falls past the end of the grid.
    pub fn index_of(&self, time: f64) -> Option<usize> {
        if time < 0.0 {
            return None;
        }
        let index = (time / self.step) as usize;
        (index < self.len).then_some(index)
    }
}

/// Every intermediate waveform of a simulated frame.
///
/// Carrier counts (`v1`..`v3`) are integers; voltages (`v4`..`v8`) are in
/// volts. All waveforms share [`Signals::grid`].
#[derive(Clone, Debug, PartialEq)]
pub struct Signals {
    pub grid: TimeGrid,
    /// Illumination function: mean number of carriers per sample.
    pub v0: Vec<f64>,
    /// Carriers after shot noise.
    pub v1: Vec<u64>,
    /// Carriers after after-pulses.
    pub v2: Vec<u64>,
    /// Carriers after dark noise.
    pub v3: Vec<u64>,
    /// Shaped voltage.
    pub v4: Vec<f64>,
    /// Voltage after electronic noise.
    pub v5: Vec<f64>,
    /// Preamplifier output.
    pub v6: Vec<f64>,
    /// Amplifier output.
    pub v7: Vec<f64>,
    /// Digitized signal.
    pub v8: Vec<f64>,
    /// Energy deposited per sample, in keV.
    pub y0: Vec<f64>,
    /// Expected number of carriers deposited per sample.
    pub y1: Vec<f64>,
    /// Set when the energy vector was shorter than the number of events.
    pub bootstrap: Option<Bootstrap>,
}
