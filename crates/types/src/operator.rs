use serde::{Deserialize, Serialize};

/// Registry metadata for one node operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorInfo {
    pub id: u64,
    pub active: bool,
    pub name: String,
    /// Checksummed hex address.
    pub reward_address: String,
    pub staking_limit: u64,
    pub stopped_validators: u64,
    pub total_signing_keys: u64,
    pub used_signing_keys: u64,
}

impl OperatorInfo {
    /// Number of keys whose signing data is deposited, bounded by the total.
    pub fn used_keys(&self) -> u64 {
        self.used_signing_keys.min(self.total_signing_keys)
    }

    pub fn unused_keys(&self) -> u64 {
        self.total_signing_keys - self.used_keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn operator(total: u64, used: u64) -> OperatorInfo {
        OperatorInfo {
            id: 0,
            active: true,
            name: "Staking Facilities".into(),
            reward_address: "0x0000000000000000000000000000000000000001".into(),
            staking_limit: total,
            stopped_validators: 0,
            total_signing_keys: total,
            used_signing_keys: used,
        }
    }

    #[test]
    fn used_keys_never_exceed_total() {
        assert_eq!(operator(10, 4).used_keys(), 4);
        assert_eq!(operator(10, 4).unused_keys(), 6);
        assert_eq!(operator(3, 7).used_keys(), 3);
        assert_eq!(operator(3, 7).unused_keys(), 0);
    }
}
