//! Stable identifiers for bones.

/// The CRC32 of the ASCII lowercase bone name.
///
/// Controllers identify their bone by this value instead of an index,
/// so the same database works for skeletons with different bone orderings.
pub fn bone_id(name: &str) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(name.to_ascii_lowercase().as_bytes());
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bone_id_ignores_case() {
        assert_eq!(bone_id("Bip01 Pelvis"), bone_id("bip01 pelvis"));
        assert_ne!(bone_id("Bip01 Pelvis"), bone_id("Bip01 Spine"));
    }

    #[test]
    fn bone_id_empty() {
        assert_eq!(0, bone_id(""));
    }
}
