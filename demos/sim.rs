/// This is a general example of how you would typically set up a detector
/// simulation.
use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use scint::{
    Amplifier, DarkNoise, Digitizer, ElectronicNoise, Preamplifier, Quantization, Simulation,
};
use uom::si::f64::{ElectricPotential, Frequency, Time};
use uom::si::{
    electric_potential::{millivolt, volt},
    frequency::{hertz, kilohertz, megahertz},
    time::{microsecond, nanosecond},
};

fn main() -> Result<()> {
    env_logger::init();

    // ===========================================
    // These are most likely your free parameters:
    let frame_duration = Time::new::<microsecond>(100.0);
    let rate = Frequency::new::<hertz>(1e5);
    // Deposited energies in keV, e.g. from a transport code.
    let energies: Vec<f64> = (1..=50).map(|i| 10.0 * i as f64).collect();
    // ===========================================

    // ===========================================
    // Then, these are properties of the scintillator and photodetector:
    let prompt_decay = Time::new::<nanosecond>(250.0);
    let delayed_decay = Time::new::<nanosecond>(2000.0);
    let delayed_fraction = 0.1;
    let light_yield = 2.0;
    // ===========================================

    // ===========================================
    // Then, this is your readout chain:
    let preamplifier = Preamplifier {
        gain: 1e4,
        time_constant: Time::new::<microsecond>(10.0),
    };
    let amplifier = Amplifier {
        gain: 10.0,
        time_constant: Time::new::<microsecond>(2.0),
        order: 2,
    };
    let digitizer = Digitizer {
        cutoff: Frequency::new::<megahertz>(200.0),
        bits: 14,
        full_scale_range: ElectricPotential::new::<volt>(2.0),
        quantization: Quantization::Rounding,
    };
    // ===========================================

    let simulation = Simulation::builder()
        .frame_duration(frame_duration)
        .rate(rate)
        .prompt_decay(prompt_decay)
        .delayed_decay(delayed_decay)
        .delayed_fraction(delayed_fraction)
        .light_yield(light_yield)
        .dark_noise(DarkNoise {
            rate: Frequency::new::<kilohertz>(10.0),
        })
        .electronic_noise(ElectronicNoise {
            rms: ElectricPotential::new::<millivolt>(1e-4),
        })
        .preamplifier(preamplifier)
        .amplifier(amplifier)
        .digitizer(digitizer)
        .build()?;

    let mut rng = StdRng::seed_from_u64(42);
    let signals = simulation.run(&energies, &mut rng)?;

    let deposited: f64 = signals.y0.iter().sum();
    let carriers: u64 = signals.v3.iter().sum();
    let (min, max) = signals
        .v8
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(*v), hi.max(*v))
        });
    println!("samples:   {}", signals.grid.len());
    println!("deposited: {deposited} keV");
    println!("carriers:  {carriers}");
    println!("output:    [{min:.6}, {max:.6}] V");
    if let Some(bootstrap) = signals.bootstrap {
        println!("bootstrap: {:.1} %", bootstrap.percentage());
    }

    Ok(())
}
