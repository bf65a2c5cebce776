//! Packing rotations into fixed size keys.
//!
//! The compressed formats use smallest three encoding.
//! The largest component is dropped and recovered from the unit length,
//! so the remaining components always lie in the range `[-1/sqrt(2), 1/sqrt(2)]`.
use dba_lib::format::{RotationFormat, RotationTrack};
use glam::Quat;

const RANGE: f32 = std::f32::consts::FRAC_1_SQRT_2;

/// Bits for each of the three stored components.
const fn component_bits(format: RotationFormat) -> [u32; 3] {
    match format {
        RotationFormat::NoCompress => [32, 32, 32],
        RotationFormat::SmallTree48Bit => [15, 15, 15],
        RotationFormat::SmallTree64Bit => [20, 20, 20],
        RotationFormat::SmallTree64BitExt => [21, 21, 20],
    }
}

/// The rotation after encoding and decoding with `format`.
pub fn quantize_rotation(value: Quat, format: RotationFormat) -> Quat {
    match format {
        RotationFormat::NoCompress => value.normalize(),
        _ => {
            let (index, components) = encode_small_tree(value, component_bits(format));
            decode_small_tree(index, components, component_bits(format))
        }
    }
}

/// Pack `values` into a track using `format`.
pub fn encode_rotations(values: &[Quat], format: RotationFormat) -> RotationTrack {
    let bits = component_bits(format);
    match format {
        RotationFormat::NoCompress => {
            RotationTrack::NoCompress(values.iter().map(|v| v.normalize().to_array()).collect())
        }
        RotationFormat::SmallTree48Bit => RotationTrack::SmallTree48Bit(
            values
                .iter()
                .map(|v| {
                    let (index, [c0, c1, c2]) = encode_small_tree(*v, bits);
                    // The index bits are stored in the unused high bit of the first two words.
                    [
                        c0 as u16 | ((index as u16 & 0x1) << 15),
                        c1 as u16 | ((index as u16 >> 1) << 15),
                        c2 as u16,
                    ]
                })
                .collect(),
        ),
        RotationFormat::SmallTree64Bit | RotationFormat::SmallTree64BitExt => {
            let packed = values
                .iter()
                .map(|v| {
                    let (index, c) = encode_small_tree(*v, bits);
                    c[0] as u64
                        | ((c[1] as u64) << bits[0])
                        | ((c[2] as u64) << (bits[0] + bits[1]))
                        | ((index as u64) << 62)
                })
                .collect();
            if format == RotationFormat::SmallTree64Bit {
                RotationTrack::SmallTree64Bit(packed)
            } else {
                RotationTrack::SmallTree64BitExt(packed)
            }
        }
    }
}

/// Unpack the values for each key in `track`.
pub fn decode_rotations(track: &RotationTrack) -> Vec<Quat> {
    let bits = component_bits(track.format());
    match track {
        RotationTrack::NoCompress(values) => values.iter().map(|v| Quat::from_array(*v)).collect(),
        RotationTrack::SmallTree48Bit(values) => values
            .iter()
            .map(|[w0, w1, w2]| {
                let index = ((w0 >> 15) | ((w1 >> 15) << 1)) as usize;
                let c = [(w0 & 0x7fff) as u32, (w1 & 0x7fff) as u32, *w2 as u32];
                decode_small_tree(index, c, bits)
            })
            .collect(),
        RotationTrack::SmallTree64Bit(values) | RotationTrack::SmallTree64BitExt(values) => values
            .iter()
            .map(|v| {
                let index = (v >> 62) as usize;
                let c = [
                    (v & mask(bits[0])) as u32,
                    ((v >> bits[0]) & mask(bits[1])) as u32,
                    ((v >> (bits[0] + bits[1])) & mask(bits[2])) as u32,
                ];
                decode_small_tree(index, c, bits)
            })
            .collect(),
    }
}

const fn mask(bits: u32) -> u64 {
    (1u64 << bits) - 1
}

fn encode_small_tree(value: Quat, bits: [u32; 3]) -> (usize, [u32; 3]) {
    let q = value.normalize().to_array();

    let mut index = 0;
    for i in 1..4 {
        if q[i].abs() > q[index].abs() {
            index = i;
        }
    }

    // q and -q are the same rotation, so make the dropped component positive.
    let sign = if q[index] < 0.0 { -1.0 } else { 1.0 };

    let mut components = [0; 3];
    for (c, i) in (0..4).filter(|i| *i != index).enumerate() {
        let max = mask(bits[c]) as f32;
        let normalized = ((q[i] * sign + RANGE) / (2.0 * RANGE)).clamp(0.0, 1.0);
        components[c] = (normalized * max).round() as u32;
    }
    (index, components)
}

fn decode_small_tree(index: usize, components: [u32; 3], bits: [u32; 3]) -> Quat {
    let mut q = [0.0f32; 4];
    let mut sum = 0.0;
    for (c, i) in (0..4).filter(|i| *i != index).enumerate() {
        let max = mask(bits[c]) as f32;
        let value = components[c] as f32 / max * 2.0 * RANGE - RANGE;
        q[i] = value;
        sum += value * value;
    }
    q[index] = (1.0 - sum).max(0.0).sqrt();
    Quat::from_array(q).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    use strum::IntoEnumIterator;

    // acos is too imprecise near 1.0 for small errors.
    fn distance(a: Quat, b: Quat) -> f32 {
        (a - b).length().min((a + b).length())
    }

    #[test]
    fn quantize_precision() {
        let values = [
            Quat::IDENTITY,
            Quat::from_rotation_z(1.0),
            Quat::from_euler(glam::EulerRot::XYZ, 0.3, -1.2, 2.5),
            Quat::from_xyzw(0.5, -0.5, 0.5, -0.5),
        ];
        let expected = [1e-6, 3e-4, 1e-5, 1e-5];
        for (format, epsilon) in RotationFormat::iter().zip(expected) {
            for value in values {
                let quantized = quantize_rotation(value, format);
                assert!(
                    distance(value, quantized) < epsilon,
                    "{format:?} {value:?} {quantized:?}"
                );
            }
        }
    }

    #[test]
    fn decode_matches_quantize() {
        let values: Vec<_> = (0..16)
            .map(|i| Quat::from_euler(glam::EulerRot::ZYX, i as f32 * 0.4, 0.2, -0.7))
            .collect();
        for format in RotationFormat::iter() {
            let track = encode_rotations(&values, format);
            assert_eq!(format, track.format());

            let expected: Vec<_> = values
                .iter()
                .map(|v| quantize_rotation(*v, format))
                .collect();
            assert_eq!(expected, decode_rotations(&track));
        }
    }

    #[test]
    fn encode_identity_small_tree_48() {
        // w is dropped and each remaining component is the middle of the range.
        let track = encode_rotations(&[Quat::IDENTITY], RotationFormat::SmallTree48Bit);
        assert_eq!(
            RotationTrack::SmallTree48Bit(vec![[0x4000 | 0x8000, 0x4000 | 0x8000, 0x4000]]),
            track
        );
    }

    #[test]
    fn encode_negative_largest_component() {
        let value = Quat::from_xyzw(0.0, 0.0, 0.0, -1.0);
        let quantized = quantize_rotation(value, RotationFormat::SmallTree64Bit);
        assert!(quantized.w > 0.0);
        assert!(distance(Quat::IDENTITY, quantized) < 1e-5);
    }
}
