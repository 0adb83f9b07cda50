//! Window generators

use std::f32::consts::PI;

/// Periodic Hann window of `size` points
///
/// Periodic (denominator `size`, not `size - 1`) so that overlapping
/// copies sum to a constant.
pub fn hann(size: usize) -> Vec<f32> {
    let mut window = vec![0.0; size];
    fill_hann(&mut window);
    window
}

/// Write a periodic Hann window into `window`
pub fn fill_hann(window: &mut [f32]) {
    let size = window.len() as f32;
    for (i, w) in window.iter_mut().enumerate() {
        *w = 0.5 - 0.5 * (2.0 * PI * i as f32 / size).cos();
    }
}

/// Overlap-add gain of a squared window at the given hop
pub fn squared_overlap_gain(window: &[f32], hop: usize) -> f32 {
    let energy: f32 = window.iter().map(|w| w * w).sum();
    energy / hop as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_hann_shape() {
        let w = hann(8);
        assert_eq!(w[0], 0.0);
        assert_abs_diff_eq!(w[4], 1.0, epsilon = 1e-7);
        assert_abs_diff_eq!(w[2], w[6], epsilon = 1e-7);
    }

    #[test]
    fn test_squared_hann_overlap_gain() {
        // 3/8 * overlap for a periodic Hann
        let w = hann(1024);
        assert_abs_diff_eq!(squared_overlap_gain(&w, 256), 1.5, epsilon = 1e-4);
        assert_abs_diff_eq!(squared_overlap_gain(&w, 128), 3.0, epsilon = 1e-4);
    }

    #[test]
    fn test_squared_hann_sums_flat() {
        let w = hann(64);
        let hop = 16;
        for n in 0..hop {
            let sum: f32 = (0..4).map(|k| w[n + k * hop].powi(2)).sum();
            assert_abs_diff_eq!(sum, 1.5, epsilon = 1e-5);
        }
    }
}
