//! Partition metadata reported by the device
//!
//! The orchestrator never chooses a slot itself; it only checks that the
//! running image has OTA bookkeeping before it touches the network.

use serde::{Deserialize, Serialize};

/// Application slot identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Slot {
    /// Factory image, outside the OTA rotation
    Factory,
    /// OTA slot `ota_<n>`
    Ota(u8),
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Slot::Factory => write!(f, "factory"),
            Slot::Ota(n) => write!(f, "ota_{n}"),
        }
    }
}

/// Active partition as read from the partition table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionInfo {
    /// Partition label from the table
    pub label: String,

    /// Slot the running image was booted from
    pub slot: Slot,

    /// Slot the next update would be written to, if the table has one
    pub next_update: Option<Slot>,

    /// Size of the running partition in bytes
    pub size_bytes: u64,
}

impl PartitionInfo {
    /// Create partition info for an OTA slot
    pub fn ota(label: impl Into<String>, slot: u8, size_bytes: u64) -> Self {
        Self {
            label: label.into(),
            slot: Slot::Ota(slot),
            next_update: Some(Slot::Ota(if slot == 0 { 1 } else { 0 })),
            size_bytes,
        }
    }

    /// Whether an update target exists for this table
    pub fn can_update(&self) -> bool {
        self.next_update.is_some_and(|next| next != self.slot)
    }
}

impl std::fmt::Display for PartitionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.next_update {
            Some(next) => write!(f, "{} ({} -> {})", self.label, self.slot, next),
            None => write!(f, "{} ({})", self.label, self.slot),
        }
    }
}
