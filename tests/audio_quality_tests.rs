//! Audio Quality Tests
//!
//! Long-running checks on every reverb topology: stability across the
//! parameter range under an impulse train, and reported decay times
//! against the measured impulse response.

use fxcore::analysis::{calculate_peak, calculate_rms, estimate_rt60, impulse, impulse_train};
use fxcore::reverb::{TankParams, TankReverb, TankType};
use fxcore::Processor;
use test_case::test_case;

const SAMPLE_RATE: f32 = 48000.0;
const SECONDS: usize = 10;

fn render(params: &TankParams) -> (Vec<f32>, Vec<f32>) {
    let mut reverb = TankReverb::new().unwrap();
    reverb.init(SAMPLE_RATE).unwrap();
    reverb.set(params).unwrap();

    let len = SECONDS * SAMPLE_RATE as usize;
    let mut driven = impulse_train(len, 9601);
    reverb.process_block(&mut driven);

    let mut tail = vec![0.0; len];
    reverb.process_block(&mut tail);
    (driven, tail)
}

#[test_case(TankType::Schroeder ; "schroeder")]
#[test_case(TankType::Moorer ; "moorer")]
#[test_case(TankType::Griesinger ; "griesinger")]
#[test_case(TankType::Zazz ; "zazz")]
fn test_tank_stays_stable(tank: TankType) {
    for size in [0.0, 0.5, 1.0] {
        for damping in [0.0, 1.0] {
            let params = TankParams {
                tank,
                size,
                damping,
                mix: 1.0,
            };
            let (driven, tail) = render(&params);

            assert!(
                driven.iter().chain(&tail).all(|y| y.is_finite()),
                "{} size {} damping {}: non-finite output",
                tank,
                size,
                damping
            );
            let peak = calculate_peak(&driven);
            assert!(peak < 50.0, "{} size {} damping {}: peak {}", tank, size, damping, peak);

            let last = &tail[tail.len() - SAMPLE_RATE as usize / 2..];
            let rms = calculate_rms(last);
            assert!(rms < 1e-3, "{} size {} damping {}: tail rms {}", tank, size, damping, rms);
        }
    }
}

#[test_case(TankType::Schroeder ; "schroeder")]
#[test_case(TankType::Moorer ; "moorer")]
#[test_case(TankType::Griesinger ; "griesinger")]
#[test_case(TankType::Zazz ; "zazz")]
fn test_larger_rooms_ring_longer(tank: TankType) {
    let small = render(&TankParams {
        tank,
        size: 0.1,
        ..Default::default()
    });
    let large = render(&TankParams {
        tank,
        size: 0.9,
        ..Default::default()
    });

    // Energy in the first half second after the input stops
    let window = SAMPLE_RATE as usize / 2;
    let small_tail = calculate_rms(&small.1[..window]);
    let large_tail = calculate_rms(&large.1[..window]);
    assert!(
        large_tail > small_tail,
        "{}: small {} vs large {}",
        tank,
        small_tail,
        large_tail
    );
}

#[test_case(TankType::Schroeder ; "schroeder")]
#[test_case(TankType::Moorer ; "moorer")]
#[test_case(TankType::Griesinger ; "griesinger")]
#[test_case(TankType::Zazz ; "zazz")]
fn test_decay_estimate_matches_measured(tank: TankType) {
    for size in [0.3, 0.6, 1.0] {
        let mut reverb = TankReverb::new().unwrap();
        reverb.init(SAMPLE_RATE).unwrap();
        reverb
            .set(&TankParams {
                tank,
                size,
                damping: 0.0,
                mix: 1.0,
            })
            .unwrap();

        let mut response = impulse(12 * SAMPLE_RATE as usize);
        reverb.process_block(&mut response);
        let measured = estimate_rt60(&response, SAMPLE_RATE).unwrap();
        let ratio = reverb.decay_estimate_seconds() / measured;
        assert!(
            (0.75..=1.25).contains(&ratio),
            "{} size {}: estimate {} s, measured {} s",
            tank,
            size,
            reverb.decay_estimate_seconds(),
            measured
        );
    }
}
