//! Pulls operators and their signing keys out of the registry.
//!
//! A fetch runs in three rounds through the [`CallBatcher`]: operator count
//! and withdrawal credentials, then one metadata call per operator, then
//! one call per `(operator, index)` key slot. A failure in the first two
//! rounds aborts the fetch. A key slot that cannot be read becomes a
//! corrupt record that the validator rejects as malformed.

use crate::contracts::{ILido, INodeOperatorsRegistry, RegistryAddresses};
use crate::error::{RegistryError, Result};
use alloy_primitives::U256;
use alloy_sol_types::SolCall;
use keycheck_rpc::{BatchError, CallBatcher, CallOutcome, CallSpec, CancellationToken};
use keycheck_types::{KeyLocator, KeyRecord, OperatorInfo, WithdrawalCredentials};
use tracing::{debug, info, warn};

/// Most operators a registry may report before its metadata is treated as bogus.
pub const MAX_OPERATORS: u64 = 100_000;
/// Most signing key slots a single fetch will read.
pub const MAX_KEY_SLOTS: u64 = 10_000_000;

/// Everything one fetch read from the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySnapshot {
    pub withdrawal_credentials: WithdrawalCredentials,
    pub operators: Vec<OperatorInfo>,
    /// Ordered by operator, then index.
    pub keys: Vec<KeyRecord>,
}

impl RegistrySnapshot {
    pub fn operator(&self, id: u64) -> Option<&OperatorInfo> {
        self.operators.iter().find(|op| op.id == id)
    }

    /// Key slots that could not be read.
    pub fn corrupt_keys(&self) -> usize {
        self.keys.iter().filter(|k| k.public_key.is_empty()).count()
    }
}

pub struct RegistryReader {
    batcher: CallBatcher,
    addresses: RegistryAddresses,
}

impl RegistryReader {
    pub fn new(batcher: CallBatcher, addresses: RegistryAddresses) -> Self {
        Self { batcher, addresses }
    }

    pub fn addresses(&self) -> &RegistryAddresses {
        &self.addresses
    }

    /// Read withdrawal credentials and every operator's metadata.
    pub async fn fetch_operators(
        &self,
        cancel: &CancellationToken,
    ) -> Result<(WithdrawalCredentials, Vec<OperatorInfo>)> {
        let header = vec![
            CallSpec::new(
                self.addresses.registry,
                INodeOperatorsRegistry::getNodeOperatorsCountCall {}.abi_encode(),
            ),
            CallSpec::new(
                self.addresses.lido,
                ILido::getWithdrawalCredentialsCall {}.abi_encode(),
            ),
        ];
        let mut header = self.batcher.submit(header, cancel).await.into_iter();
        let count = decode_metadata::<INodeOperatorsRegistry::getNodeOperatorsCountCall>(
            "operator count",
            header.next().map(|(_, outcome)| outcome),
        )?
        ._0;
        let withdrawal_credentials = decode_metadata::<ILido::getWithdrawalCredentialsCall>(
            "withdrawal credentials",
            header.next().map(|(_, outcome)| outcome),
        )?
        ._0;

        let count = u64::try_from(count)
            .ok()
            .filter(|count| *count <= MAX_OPERATORS)
            .ok_or_else(|| {
                RegistryError::metadata("operator count", format!("{count} out of range"))
            })?;
        debug!(operators = count, "reading operator metadata");

        let calls: Vec<CallSpec> = (0..count)
            .map(|id| {
                CallSpec::new(
                    self.addresses.registry,
                    INodeOperatorsRegistry::getNodeOperatorCall {
                        id: U256::from(id),
                        fullInfo: true,
                    }
                    .abi_encode(),
                )
            })
            .collect();
        let mut operators = Vec::with_capacity(calls.len());
        for (id, (_, outcome)) in (0..count).zip(self.batcher.submit(calls, cancel).await) {
            let op = decode_metadata::<INodeOperatorsRegistry::getNodeOperatorCall>(
                &format!("operator #{id}"),
                Some(outcome),
            )?;
            operators.push(OperatorInfo {
                id,
                active: op.active,
                name: op.name,
                reward_address: op.rewardAddress.to_string(),
                staking_limit: op.stakingLimit,
                stopped_validators: op.stoppedValidators,
                total_signing_keys: op.totalSigningKeys,
                used_signing_keys: op.usedSigningKeys,
            });
        }

        Ok((withdrawal_credentials.0, operators))
    }

    /// Read every signing key of every operator.
    ///
    /// Each call re-reads the chain; nothing is cached here.
    pub async fn fetch_all_keys(&self, cancel: &CancellationToken) -> Result<RegistrySnapshot> {
        let (withdrawal_credentials, operators) = self.fetch_operators(cancel).await?;
        let total = operators
            .iter()
            .try_fold(0u64, |sum, op| sum.checked_add(op.total_signing_keys))
            .filter(|total| *total <= MAX_KEY_SLOTS)
            .ok_or_else(|| {
                RegistryError::metadata(
                    "signing key count",
                    format!("operators report more than {MAX_KEY_SLOTS} keys"),
                )
            })?;

        let mut slots: Vec<(KeyLocator, bool)> = Vec::with_capacity(total as usize);
        for op in &operators {
            let used = op.used_keys();
            slots.extend(
                (0..op.total_signing_keys)
                    .map(|index| (KeyLocator::operator(op.id, index), index < used)),
            );
        }
        info!(
            operators = operators.len(),
            keys = slots.len(),
            "fetching signing keys"
        );

        let calls = slots
            .iter()
            .map(|(locator, _)| {
                CallSpec::new(
                    self.addresses.registry,
                    INodeOperatorsRegistry::getSigningKeyCall {
                        operatorId: U256::from(locator.operator_id.unwrap_or_default()),
                        index: U256::from(locator.index),
                    }
                    .abi_encode(),
                )
            })
            .collect();
        let results = self.batcher.submit(calls, cancel).await;

        let mut keys = Vec::with_capacity(slots.len());
        for ((locator, used), (_, outcome)) in slots.into_iter().zip(results) {
            let record = match outcome {
                Ok(raw) => match INodeOperatorsRegistry::getSigningKeyCall::abi_decode_returns(&raw, true) {
                    Ok(key) => KeyRecord::new(
                        locator,
                        key.key.to_vec(),
                        key.depositSignature.to_vec(),
                        withdrawal_credentials,
                        used,
                    ),
                    Err(err) => {
                        warn!(%locator, error = %err, "undecodable signing key");
                        KeyRecord::corrupt(locator, withdrawal_credentials, used)
                    }
                },
                Err(BatchError::Cancelled) => return Err(RegistryError::Cancelled),
                Err(err) => {
                    warn!(%locator, error = %err, "signing key unavailable");
                    KeyRecord::corrupt(locator, withdrawal_credentials, used)
                }
            };
            keys.push(record);
        }

        let snapshot = RegistrySnapshot {
            withdrawal_credentials,
            operators,
            keys,
        };
        info!(
            keys = snapshot.keys.len(),
            corrupt = snapshot.corrupt_keys(),
            "registry fetch complete"
        );
        Ok(snapshot)
    }
}

fn decode_metadata<C: SolCall>(what: &str, outcome: Option<CallOutcome>) -> Result<C::Return> {
    match outcome {
        Some(Ok(raw)) => C::abi_decode_returns(&raw, true).map_err(|e| RegistryError::metadata(what, e)),
        Some(Err(BatchError::Cancelled)) => Err(RegistryError::Cancelled),
        Some(Err(err)) => Err(RegistryError::metadata(what, err)),
        None => Err(RegistryError::metadata(what, "no result")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRegistry;
    use keycheck_rpc::{BatchConfig, RetryPolicy};
    use std::sync::Arc;
    use std::time::Duration;

    fn reader(registry: Arc<FakeRegistry>) -> RegistryReader {
        let config = BatchConfig {
            batch_size: 3,
            max_workers: 2,
            retry: RetryPolicy {
                max_retries: 1,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(2),
            },
            call_timeout: Duration::from_secs(5),
        };
        let addresses = registry.addresses();
        RegistryReader::new(CallBatcher::new(registry, config), addresses)
    }

    #[tokio::test]
    async fn used_flag_follows_used_key_count() {
        let registry = Arc::new(FakeRegistry::new([0x01; 32]));
        registry.add_operator("A", 2, vec![(vec![1; 48], vec![1; 96]); 3]);

        let snapshot = reader(registry)
            .fetch_all_keys(&CancellationToken::new())
            .await
            .unwrap();

        let used: Vec<bool> = snapshot.keys.iter().map(|k| k.used).collect();
        assert_eq!(used, vec![true, true, false]);
    }

    #[tokio::test]
    async fn metadata_failure_aborts() {
        let registry = Arc::new(FakeRegistry::new([0x01; 32]));
        registry.add_operator("A", 0, vec![(vec![1; 48], vec![1; 96])]);
        registry.fail_metadata(true);

        let err = reader(registry)
            .fetch_all_keys(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Metadata { .. }), "{err}");
    }
}
