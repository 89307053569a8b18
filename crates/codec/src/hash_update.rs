use basalt_common::{Account, Digest};
use basalt_crypto::Hasher;

/// Feeds `self`'s canonical bytes into a running [`Hasher`].
///
/// Structural digest derivation (`id(block)`, `id(tx)`, merkle leaves) calls
/// `hash_update` on each field in the order the specification's digest
/// formulas name, rather than concatenating a full canonical encoding and
/// hashing it in one shot — the two coincide for most types, but digest
/// derivation over a struct is generally a strict *subset* of its wire
/// fields (e.g. a block's `signature` is not part of `id(block)`), so this
/// is a separate trait rather than reusing `Encode`.
pub trait HashUpdate {
    fn hash_update(&self, hasher: &mut Hasher);
}

impl HashUpdate for Digest {
    fn hash_update(&self, hasher: &mut Hasher) {
        hasher.update(self.as_bytes());
    }
}

impl HashUpdate for Account {
    fn hash_update(&self, hasher: &mut Hasher) {
        hasher.update(&[self.tag as u8]);
        hasher.update(&self.address);
    }
}

impl HashUpdate for u64 {
    fn hash_update(&self, hasher: &mut Hasher) {
        hasher.update_u64(*self);
    }
}

impl HashUpdate for [u8] {
    fn hash_update(&self, hasher: &mut Hasher) {
        hasher.update(self);
    }
}

impl<T: HashUpdate> HashUpdate for [T] {
    fn hash_update(&self, hasher: &mut Hasher) {
        for item in self {
            item.hash_update(hasher);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_hash_update_matches_its_bytes() {
        let d = Digest::from_bytes([7u8; 32]);
        let mut h = Hasher::new();
        d.hash_update(&mut h);
        let mut h2 = Hasher::new();
        h2.update(d.as_bytes());
        assert_eq!(h.finalize(), h2.finalize());
    }

    #[test]
    fn slice_of_digests_hashes_in_order() {
        let a = Digest::from_bytes([1u8; 32]);
        let b = Digest::from_bytes([2u8; 32]);
        let mut forward = Hasher::new();
        [a, b].hash_update(&mut forward);
        let mut backward = Hasher::new();
        [b, a].hash_update(&mut backward);
        assert_ne!(forward.finalize(), backward.finalize());
    }
}
