use serde::{Deserialize, Serialize};

/// A namespace inside the state store, either system-owned (`address` is
/// all-zero) or owned by a program's account address.
///
/// Object spaces partition the flat key space a [`basalt_state_db`][sdb]
/// node exposes so that unrelated programs (and the system itself) never
/// collide on keys.
///
/// [sdb]: https://docs.rs/basalt-state-db
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectSpace {
    pub system: bool,
    pub address: [u8; 32],
    pub id: u32,
}

impl ObjectSpace {
    /// Compound-key prefix length: `system(1) + pad(3) + address(32) + id(4)`.
    pub const PREFIX_LEN: usize = 1 + 3 + 32 + 4;

    pub const fn system(id: u32) -> Self {
        ObjectSpace {
            system: true,
            address: [0u8; 32],
            id,
        }
    }

    pub const fn program(address: [u8; 32], id: u32) -> Self {
        ObjectSpace {
            system: false,
            address,
            id,
        }
    }

    /// Encodes the compound-key prefix per §6:
    /// `[system_flag(1B) || padding(3B zero) || address(32B) || id(u32 LE)]`.
    pub fn encode_prefix(&self) -> [u8; Self::PREFIX_LEN] {
        let mut out = [0u8; Self::PREFIX_LEN];
        out[0] = self.system as u8;
        // bytes 1..4 stay zero (padding)
        out[4..36].copy_from_slice(&self.address);
        out[36..40].copy_from_slice(&self.id.to_le_bytes());
        out
    }

    /// Builds the full compound key for a user-supplied key within this space.
    pub fn compound_key(&self, user_key: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::PREFIX_LEN + user_key.len());
        out.extend_from_slice(&self.encode_prefix());
        out.extend_from_slice(user_key);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_space_has_zero_address() {
        let s = ObjectSpace::system(7);
        assert!(s.system);
        assert_eq!(s.address, [0u8; 32]);
        let prefix = s.encode_prefix();
        assert_eq!(prefix[0], 1);
        assert_eq!(&prefix[1..4], &[0, 0, 0]);
        assert_eq!(&prefix[36..40], &7u32.to_le_bytes());
    }

    #[test]
    fn distinct_spaces_produce_distinct_compound_keys() {
        let a = ObjectSpace::program([1u8; 32], 0);
        let b = ObjectSpace::program([2u8; 32], 0);
        assert_ne!(a.compound_key(b"k"), b.compound_key(b"k"));
    }

    #[test]
    fn compound_key_preserves_user_key_suffix() {
        let s = ObjectSpace::system(0);
        let key = s.compound_key(b"hello");
        assert_eq!(&key[ObjectSpace::PREFIX_LEN..], b"hello");
    }
}
