use keycheck_crypto::DepositDomain;
use keycheck_registry::RegistryAddresses;
use keycheck_rpc::BatchConfig;
use keycheck_types::Network;

/// Everything a run needs besides the provider and the cache. Resolved once
/// by the caller and handed over by value.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub network: Network,
    pub addresses: RegistryAddresses,
    pub batch: BatchConfig,
    pub domain: DepositDomain,
}

impl RunConfig {
    /// Default batching and the standard deposit domain of `network`.
    pub fn new(network: Network, addresses: RegistryAddresses) -> Self {
        Self {
            network,
            addresses,
            batch: BatchConfig::default(),
            domain: DepositDomain::for_network(network),
        }
    }

    pub fn with_batch(mut self, batch: BatchConfig) -> Self {
        self.batch = batch;
        self
    }
}
