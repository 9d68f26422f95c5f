//! Contract bindings and per-network deployment addresses.

use alloy_primitives::{address, Address};
use alloy_sol_types::sol;
use keycheck_types::Network;

sol! {
    interface INodeOperatorsRegistry {
        function getNodeOperatorsCount() external view returns (uint256);

        function getNodeOperator(uint256 id, bool fullInfo)
            external
            view
            returns (
                bool active,
                string name,
                address rewardAddress,
                uint64 stakingLimit,
                uint64 stoppedValidators,
                uint64 totalSigningKeys,
                uint64 usedSigningKeys
            );

        function getSigningKey(uint256 operatorId, uint256 index)
            external
            view
            returns (bytes key, bytes depositSignature, bool used);
    }

    interface ILido {
        function getWithdrawalCredentials() external view returns (bytes32);
    }
}

/// Staking pool and node operator registry contracts of one deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryAddresses {
    pub lido: Address,
    pub registry: Address,
}

impl RegistryAddresses {
    pub fn new(lido: Address, registry: Address) -> Self {
        Self { lido, registry }
    }

    /// Known deployments. Other networks need explicit addresses.
    pub fn for_network(network: Network) -> Option<Self> {
        match network {
            Network::Mainnet => Some(Self::new(
                address!("ae7ab96520DE3A18E5e111B5EaAb095312D7fE84"),
                address!("55032650b14df07b85bF18A3a3eC8E0Af2e028d5"),
            )),
            Network::Goerli => Some(Self::new(
                address!("1643E812aE58766192Cf1D2Cf9567dF2C37e9B7F"),
                address!("9D4AF1Ee19Dad8857db3a45B0374c81c8A1C6320"),
            )),
            Network::Holesky => Some(Self::new(
                address!("3F1c547b21f65e10480dE3ad8E19fAAC46C95034"),
                address!("595F64Ddc3856a3b5Ff4f4CC1d1fb4B46cFd2bAC"),
            )),
            Network::Sepolia | Network::Hoodi => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_sol_types::SolCall;

    #[test]
    fn selectors_match_deployed_abi() {
        assert_eq!(
            INodeOperatorsRegistry::getNodeOperatorsCountCall::SELECTOR,
            [0xa7, 0x0c, 0x70, 0xe4]
        );
        assert_eq!(
            INodeOperatorsRegistry::getSigningKeyCall::SELECTOR,
            [0xb4, 0x49, 0x40, 0x2a]
        );
        assert_eq!(
            ILido::getWithdrawalCredentialsCall::SELECTOR,
            [0x56, 0x39, 0x67, 0x15]
        );
    }

    #[test]
    fn built_in_deployments() {
        assert!(RegistryAddresses::for_network(Network::Mainnet).is_some());
        assert!(RegistryAddresses::for_network(Network::Holesky).is_some());
        assert!(RegistryAddresses::for_network(Network::Hoodi).is_none());
    }
}
