//! Removing keys that can be recovered by interpolating their neighbors.
//!
//! Predictions interpolate the quantized values of the kept keys,
//! so the error bound holds for the values actually stored in the database.
use glam::{Quat, Vec3};

use crate::clip::{Interpolate, Key, interpolation_factor};

/// How much error is allowed when removing keys.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum ReduceMode {
    /// Keep every key.
    KeepAll,
    /// The maximum error in degrees for rotations or world units for positions.
    Tolerance(f32),
}

impl From<Option<f32>> for ReduceMode {
    fn from(value: Option<f32>) -> Self {
        value.map(ReduceMode::Tolerance).unwrap_or(ReduceMode::KeepAll)
    }
}

/// Reduce rotation keys using `quantize` to predict the stored values.
pub fn reduce_rotations(
    keys: &[Key<Quat>],
    mode: ReduceMode,
    quantize: impl Fn(Quat) -> Quat,
) -> Vec<Key<Quat>> {
    match mode {
        ReduceMode::KeepAll => keys.to_vec(),
        ReduceMode::Tolerance(degrees) => {
            let min_dot = (degrees.to_radians() * 0.5).cos();
            let kept = reduce_indices(keys, quantize, |a, b| rotation_within(a, b, min_dot));
            kept.into_iter().map(|i| keys[i]).collect()
        }
    }
}

pub fn reduce_positions(keys: &[Key<Vec3>], mode: ReduceMode) -> Vec<Key<Vec3>> {
    match mode {
        ReduceMode::KeepAll => keys.to_vec(),
        ReduceMode::Tolerance(tolerance) => {
            let kept = reduce_indices(keys, |v| v, |a, b| a.distance(b) <= tolerance);
            kept.into_iter().map(|i| keys[i]).collect()
        }
    }
}

/// Check if the angle between `a` and `b` is small enough
/// using the cosine of the half angle.
pub fn rotation_within(a: Quat, b: Quat, min_dot: f32) -> bool {
    // q and -q represent the same rotation.
    a.dot(b).abs() >= min_dot
}

/// The indices of the keys to keep in increasing order.
///
/// Each removed key is predicted within tolerance by interpolating
/// the quantized values of the kept keys on either side.
fn reduce_indices<T: Interpolate>(
    keys: &[Key<T>],
    quantize: impl Fn(T) -> T,
    within_tolerance: impl Fn(T, T) -> bool,
) -> Vec<usize> {
    if keys.is_empty() {
        return Vec::new();
    }

    let fits = |first: usize, last: usize| {
        let start = quantize(keys[first].value);
        let end = quantize(keys[last].value);
        keys[first + 1..last].iter().all(|key| {
            let factor =
                interpolation_factor(keys[first].time, keys[last].time, key.time as f32);
            within_tolerance(start.interpolate(end, factor), key.value)
        })
    };

    let mut kept = vec![0];
    let mut first = 0;
    while keys.len() - first > 2 {
        // Grow the window until a removed key is no longer predicted accurately.
        let mut last = first + 2;
        while last < keys.len() && fits(first, last) {
            last += 1;
        }
        let next = last - 1;
        kept.push(next);
        first = next;
    }
    kept.extend(first + 1..keys.len());

    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{clip::Track, quantize::quantize_rotation};
    use dba_lib::format::RotationFormat;
    use glam::vec3;
    use strum::IntoEnumIterator;

    fn position_keys(values: &[Vec3]) -> Vec<Key<Vec3>> {
        Track::from_samples(values.to_vec(), 0, 1).keys
    }

    #[test]
    fn reduce_linear_positions() {
        let keys = position_keys(&(0..10).map(|i| vec3(i as f32, 0.0, 0.0)).collect::<Vec<_>>());
        let reduced = reduce_positions(&keys, ReduceMode::Tolerance(0.001));
        assert_eq!(vec![keys[0], keys[9]], reduced);
    }

    #[test]
    fn reduce_position_corner() {
        let keys = position_keys(&[
            vec3(0.0, 0.0, 0.0),
            vec3(1.0, 0.0, 0.0),
            vec3(2.0, 0.0, 0.0),
            vec3(2.0, 1.0, 0.0),
            vec3(2.0, 2.0, 0.0),
        ]);
        let reduced = reduce_positions(&keys, ReduceMode::Tolerance(0.01));
        assert_eq!(vec![keys[0], keys[2], keys[4]], reduced);
    }

    #[test]
    fn reduce_keep_all() {
        let keys = position_keys(&[Vec3::ZERO; 5]);
        assert_eq!(keys, reduce_positions(&keys, ReduceMode::KeepAll));
        assert_eq!(
            vec![keys[0], keys[4]],
            reduce_positions(&keys, ReduceMode::Tolerance(0.0))
        );
    }

    #[test]
    fn reduce_short_tracks() {
        assert!(reduce_positions(&[], ReduceMode::Tolerance(1.0)).is_empty());

        let keys = position_keys(&[Vec3::ONE]);
        assert_eq!(keys, reduce_positions(&keys, ReduceMode::Tolerance(1.0)));

        let keys = position_keys(&[Vec3::ONE, Vec3::ONE]);
        assert_eq!(keys, reduce_positions(&keys, ReduceMode::Tolerance(1.0)));
    }

    #[test]
    fn reduce_positions_within_tolerance() {
        let values: Vec<_> = (0..60)
            .map(|i| {
                let t = i as f32 / 10.0;
                vec3(t.sin(), (2.0 * t).cos(), t * 0.1)
            })
            .collect();
        let keys = position_keys(&values);

        let reduced = reduce_positions(&keys, ReduceMode::Tolerance(0.01));
        assert!(reduced.len() < keys.len());

        let track = Track::new(reduced);
        for key in &keys {
            let value = track.sample(key.time as f32).unwrap();
            assert!(value.distance(key.value) <= 0.01 + 1e-6);
        }
    }

    #[test]
    fn reduce_linear_rotations() {
        let keys = Track::from_samples(
            (0..31)
                .map(|i| Quat::from_rotation_z(i as f32 / 30.0 * std::f32::consts::FRAC_PI_2))
                .collect(),
            0,
            1,
        )
        .keys;
        let reduced = reduce_rotations(&keys, ReduceMode::Tolerance(1.0), |q| q);
        assert_eq!(vec![keys[0], keys[30]], reduced);
    }

    #[test]
    fn reduce_rotations_with_quantization() {
        // Quantizing to a coarse grid makes every prediction miss.
        let keys = Track::from_samples(
            (0..4)
                .map(|i| Quat::from_rotation_x(i as f32 * 0.1))
                .collect(),
            0,
            1,
        )
        .keys;
        let reduced = reduce_rotations(&keys, ReduceMode::Tolerance(0.1), |_| Quat::IDENTITY);
        assert_eq!(keys, reduced);
    }

    #[test]
    fn reduce_curved_rotations_each_format() {
        let keys = Track::from_samples(
            (0..60)
                .map(|i| {
                    let t = i as f32 * 0.1;
                    Quat::from_rotation_z(t.sin()) * Quat::from_rotation_x(t * t * 0.05)
                })
                .collect(),
            0,
            2,
        )
        .keys;

        for format in RotationFormat::iter() {
            let quantize = |q| quantize_rotation(q, format);
            let reduced = reduce_rotations(&keys, ReduceMode::Tolerance(1.0), quantize);
            assert!(reduced.len() < keys.len(), "{format:?}");

            let track = Track::new(
                reduced
                    .iter()
                    .map(|k| Key {
                        time: k.time,
                        value: quantize(k.value),
                    })
                    .collect(),
            );
            for key in &keys {
                let actual = track.sample(key.time as f32).unwrap();
                let degrees = (2.0 * actual.dot(key.value).abs().min(1.0).acos()).to_degrees();
                assert!(degrees <= 1.1, "{format:?} {}: {degrees}", key.time);
            }
        }
    }

    #[test]
    fn rotation_within_either_sign() {
        let min_dot = (1.0f32.to_radians() * 0.5).cos();
        let q = Quat::from_rotation_y(0.3);
        assert!(rotation_within(q, -q, min_dot));
        assert!(!rotation_within(q, Quat::IDENTITY, min_dot));
    }
}
