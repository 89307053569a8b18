//! Resource metering & sessions (§4.5).
//!
//! [`ResourceMeter`] tracks the three independently-limited categories
//! (disk/network/compute) and reports *which* category a charge overran.
//! [`Session`] is the "session sharing between meter and frame recorder"
//! design note (§9) realized as a small plain struct bundling a meter with
//! a payer-facing `initial_resources`/`remaining_resources` credit (§3's
//! "Resource session" entity) rather than multiple inheritance - callers
//! hold a `&mut Session` and never reach for a global.

use serde::{Deserialize, Serialize};

use crate::chronicler::Chronicler;
use crate::config::ResourceLimits;

/// Which of the three metered categories a charge overran.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceCategory {
    DiskStorage,
    NetworkBandwidth,
    ComputeBandwidth,
}

/// A charge would exceed the limit for the named category.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResourceLimitExceeded(pub ResourceCategory);

/// Per-category running totals (§3's "Resource state" entity).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceState {
    pub disk_storage: u64,
    pub network_bandwidth: u64,
    pub compute_bandwidth: u64,
}

/// Tracks usage against [`ResourceLimits`] for one run (one block, or one
/// transaction within it), independently per category.
#[derive(Clone, Debug)]
pub struct ResourceMeter {
    limits: ResourceLimits,
    used: ResourceState,
}

impl ResourceMeter {
    pub fn new(limits: ResourceLimits) -> Self {
        ResourceMeter {
            limits,
            used: ResourceState::default(),
        }
    }

    pub fn limits(&self) -> ResourceLimits {
        self.limits
    }

    pub fn used(&self) -> ResourceState {
        self.used
    }

    /// Charges a signed byte-delta (positive = bytes written) against the
    /// disk-storage budget. Negative deltas (shrinking removes/overwrites)
    /// are never refunded - they simply charge nothing (§4.5).
    pub fn charge_disk_storage(&mut self, signed_delta: i64) -> Result<u64, ResourceLimitExceeded> {
        if signed_delta <= 0 {
            return Ok(0);
        }
        let amount = signed_delta as u64;
        let projected = self.used.disk_storage.saturating_add(amount);
        if projected > self.limits.disk_storage {
            return Err(ResourceLimitExceeded(ResourceCategory::DiskStorage));
        }
        self.used.disk_storage = projected;
        Ok(amount)
    }

    /// Charges `amount` bytes (serialized block/transaction/operation size
    /// at admission) against the network-bandwidth budget.
    pub fn charge_network_bandwidth(&mut self, amount: u64) -> Result<u64, ResourceLimitExceeded> {
        let projected = self.used.network_bandwidth.saturating_add(amount);
        if projected > self.limits.network_bandwidth {
            return Err(ResourceLimitExceeded(ResourceCategory::NetworkBandwidth));
        }
        self.used.network_bandwidth = projected;
        Ok(amount)
    }

    /// Charges `ticks` compute-bandwidth units (VM fuel consumed, weighted
    /// by the per-opcode-class table) against the compute budget.
    pub fn charge_compute_bandwidth(&mut self, ticks: u64) -> Result<u64, ResourceLimitExceeded> {
        let projected = self.used.compute_bandwidth.saturating_add(ticks);
        if projected > self.limits.compute_bandwidth {
            return Err(ResourceLimitExceeded(ResourceCategory::ComputeBandwidth));
        }
        self.used.compute_bandwidth = projected;
        Ok(ticks)
    }
}

/// The per-run budget + recorder bundle (§4.5/§4.6/§9). `initial_resources`
/// is the payer's reserved credit for this run (`min(tx.resource_limit,
/// account_resources(payer))` at the transaction level, or the block's own
/// network-bandwidth allotment at the block level); every charge against
/// `meter` also debits `remaining_resources` by the same amount, since both
/// represent the same underlying budget measured in two ways (§8 property
/// 7: `session.used + session.remaining = session.initial`).
pub struct Session {
    pub meter: ResourceMeter,
    pub recorder: Chronicler,
    initial_resources: u64,
    remaining_resources: u64,
}

impl Session {
    pub fn new(limits: ResourceLimits, budget: u64, event_seq_start: u64) -> Self {
        Session {
            meter: ResourceMeter::new(limits),
            recorder: Chronicler::new(event_seq_start),
            initial_resources: budget,
            remaining_resources: budget,
        }
    }

    pub fn initial_resources(&self) -> u64 {
        self.initial_resources
    }

    pub fn remaining_resources(&self) -> u64 {
        self.remaining_resources
    }

    pub fn used_resources(&self) -> u64 {
        self.initial_resources - self.remaining_resources
    }

    /// Debits the coarse payer credit by `amount`, independent of which
    /// category caused it. Exhausting this is always `InsufficientResources`
    /// even when the triggering category had its own headroom left - the
    /// coarse credit is the payer's actual admission bound.
    fn debit(&mut self, amount: u64) -> Result<(), ResourceLimitExceeded> {
        if amount > self.remaining_resources {
            self.remaining_resources = 0;
            // category is not meaningful here; callers map this case
            // themselves since the coarse credit is category-agnostic.
            return Err(ResourceLimitExceeded(ResourceCategory::ComputeBandwidth));
        }
        self.remaining_resources -= amount;
        Ok(())
    }

    pub fn charge_disk_storage(&mut self, signed_delta: i64) -> Result<(), ResourceLimitExceeded> {
        let amount = self.meter.charge_disk_storage(signed_delta)?;
        self.debit(amount)
            .map_err(|_| ResourceLimitExceeded(ResourceCategory::DiskStorage))
    }

    pub fn charge_network_bandwidth(&mut self, amount: u64) -> Result<(), ResourceLimitExceeded> {
        let charged = self.meter.charge_network_bandwidth(amount)?;
        self.debit(charged)
            .map_err(|_| ResourceLimitExceeded(ResourceCategory::NetworkBandwidth))
    }

    pub fn charge_compute_bandwidth(&mut self, ticks: u64) -> Result<(), ResourceLimitExceeded> {
        let charged = self.meter.charge_compute_bandwidth(ticks)?;
        self.debit(charged)
            .map_err(|_| ResourceLimitExceeded(ResourceCategory::ComputeBandwidth))
    }
}
