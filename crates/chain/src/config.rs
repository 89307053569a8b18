use basalt_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

use basalt_common::constants::{DEFAULT_MODULE_CACHE_CAPACITY, DEFAULT_STACK_LIMIT};

/// The three metered resource categories (§4.5), as a budget or a running
/// total depending on context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub disk_storage: u64,
    pub network_bandwidth: u64,
    pub compute_bandwidth: u64,
}

impl ResourceLimits {
    pub const fn new(disk_storage: u64, network_bandwidth: u64, compute_bandwidth: u64) -> Self {
        ResourceLimits {
            disk_storage,
            network_bandwidth,
            compute_bandwidth,
        }
    }
}

impl Default for ResourceLimits {
    /// Generous defaults for a reference/test network; genesis configuration
    /// overrides these via the `resource_limits` system object space (§3.3).
    fn default() -> Self {
        ResourceLimits {
            disk_storage: 64 * 1024 * 1024,
            network_bandwidth: 16 * 1024 * 1024,
            compute_bandwidth: 50_000_000,
        }
    }
}

/// Canonical encoding for the `resource_limits` system object space (§3.3):
/// three little-endian `u64`s, same field order as the struct.
impl Encode for ResourceLimits {
    fn encode(&self, out: &mut Vec<u8>) {
        self.disk_storage.encode(out);
        self.network_bandwidth.encode(out);
        self.compute_bandwidth.encode(out);
    }
}

impl Decode for ResourceLimits {
    fn decode(buf: &[u8]) -> Result<(Self, &[u8]), basalt_codec::CodecError> {
        let (disk_storage, rest) = u64::decode(buf)?;
        let (network_bandwidth, rest) = u64::decode(rest)?;
        let (compute_bandwidth, rest) = u64::decode(rest)?;
        Ok((
            ResourceLimits {
                disk_storage,
                network_bandwidth,
                compute_bandwidth,
            },
            rest,
        ))
    }
}

/// Per-opcode-class compute weights (§4.5's "light=100, medium=1000,
/// heavy=10000 as design defaults"), re-exported here from `basalt-vm` so a
/// single config struct can carry both the resource budget and the cost
/// table genesis might someday override.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeWeights {
    pub light: u64,
    pub medium: u64,
    pub heavy: u64,
}

impl Default for ComputeWeights {
    fn default() -> Self {
        ComputeWeights {
            light: basalt_vm::WEIGHT_LIGHT,
            medium: basalt_vm::WEIGHT_MEDIUM,
            heavy: basalt_vm::WEIGHT_HEAVY,
        }
    }
}

/// Controller-wide configuration: call-stack bound, module-cache capacity,
/// and the block-timestamp clock-skew allowance (§4.10, step 2).
///
/// Plain `serde`-deserializable struct with a sane `Default`, matching the
/// teacher's `BlockchainOptions` pattern rather than a bespoke config DSL.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Bound on nested `call_program` depth (§4.7). Spec §8 Scenario E
    /// fixes this at 32; see `DESIGN.md` for why this takes precedence
    /// over `original_source`'s unrelated 256 default.
    pub stack_limit: usize,
    /// Module cache capacity (§4.8).
    pub module_cache_capacity: usize,
    /// How far into the future (seconds) a block's timestamp may sit ahead
    /// of the applying node's clock (§4.10, step 2).
    pub clock_skew_secs: u64,
    pub compute_weights: ComputeWeights,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            stack_limit: DEFAULT_STACK_LIMIT,
            module_cache_capacity: DEFAULT_MODULE_CACHE_CAPACITY,
            clock_skew_secs: 5,
            compute_weights: ComputeWeights::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_controller_config_matches_spec_defaults() {
        let cfg = ControllerConfig::default();
        assert_eq!(cfg.stack_limit, 32);
        assert_eq!(cfg.module_cache_capacity, 32);
    }

    #[test]
    fn resource_limits_round_trip_through_encoding() {
        let limits = ResourceLimits::new(1, 2, 3);
        let mut buf = Vec::new();
        limits.encode(&mut buf);
        let (decoded, rest) = ResourceLimits::decode(&buf).unwrap();
        assert_eq!(decoded, limits);
        assert!(rest.is_empty());
    }
}
