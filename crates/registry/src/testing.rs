//! In-memory registry deployment answering contract calls, for tests.

use crate::contracts::{ILido, INodeOperatorsRegistry, RegistryAddresses};
use alloy_primitives::{address, Address, Bytes, FixedBytes, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use keycheck_rpc::{CallProvider, CallSpec, ProviderError};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

struct FakeOperator {
    name: String,
    used: u64,
    keys: Vec<(Vec<u8>, Vec<u8>)>,
}

pub struct FakeRegistry {
    withdrawal_credentials: RwLock<[u8; 32]>,
    operators: RwLock<Vec<FakeOperator>>,
    broken_keys: RwLock<HashSet<(u64, u64)>>,
    unreachable_keys: RwLock<HashSet<(u64, u64)>>,
    reported_operator_count: RwLock<Option<U256>>,
    reported_key_totals: RwLock<HashMap<u64, u64>>,
    fail_metadata: AtomicBool,
    key_reads: AtomicUsize,
}

impl FakeRegistry {
    pub const LIDO: Address = address!("1111111111111111111111111111111111111111");
    pub const REGISTRY: Address = address!("2222222222222222222222222222222222222222");

    pub fn new(withdrawal_credentials: [u8; 32]) -> Self {
        Self {
            withdrawal_credentials: RwLock::new(withdrawal_credentials),
            operators: RwLock::new(Vec::new()),
            broken_keys: RwLock::new(HashSet::new()),
            unreachable_keys: RwLock::new(HashSet::new()),
            reported_operator_count: RwLock::new(None),
            reported_key_totals: RwLock::new(HashMap::new()),
            fail_metadata: AtomicBool::new(false),
            key_reads: AtomicUsize::new(0),
        }
    }

    pub fn addresses(&self) -> RegistryAddresses {
        RegistryAddresses::new(Self::LIDO, Self::REGISTRY)
    }

    /// Register an operator; returns its id.
    pub fn add_operator(&self, name: &str, used: u64, keys: Vec<(Vec<u8>, Vec<u8>)>) -> u64 {
        let mut operators = self.operators.write();
        operators.push(FakeOperator {
            name: name.to_string(),
            used,
            keys,
        });
        operators.len() as u64 - 1
    }

    pub fn set_used(&self, operator: u64, used: u64) {
        if let Some(op) = self.operators.write().get_mut(operator as usize) {
            op.used = used;
        }
    }

    /// Replace the signing data stored at `(operator, index)`.
    pub fn set_key(&self, operator: u64, index: u64, key: Vec<u8>, signature: Vec<u8>) {
        if let Some(slot) = self
            .operators
            .write()
            .get_mut(operator as usize)
            .and_then(|op| op.keys.get_mut(index as usize))
        {
            *slot = (key, signature);
        }
    }

    pub fn set_withdrawal_credentials(&self, credentials: [u8; 32]) {
        *self.withdrawal_credentials.write() = credentials;
    }

    /// Make `getSigningKey(operator, index)` revert.
    pub fn break_key(&self, operator: u64, index: u64) {
        self.broken_keys.write().insert((operator, index));
    }

    /// Make `getSigningKey(operator, index)` fail with a gateway error on
    /// every attempt.
    pub fn make_key_unreachable(&self, operator: u64, index: u64) {
        self.unreachable_keys.write().insert((operator, index));
    }

    /// Answer `getNodeOperatorsCount` with `count` regardless of the operators held.
    pub fn report_operator_count(&self, count: U256) {
        *self.reported_operator_count.write() = Some(count);
    }

    /// Answer `totalSigningKeys` for `operator` with `total`.
    pub fn report_total_keys(&self, operator: u64, total: u64) {
        self.reported_key_totals.write().insert(operator, total);
    }

    /// Make the operator count call revert.
    pub fn fail_metadata(&self, fail: bool) {
        self.fail_metadata.store(fail, Ordering::SeqCst);
    }

    /// Number of `getSigningKey` calls answered so far.
    pub fn key_reads(&self) -> usize {
        self.key_reads.load(Ordering::SeqCst)
    }

    fn answer(&self, call: &CallSpec) -> Result<Vec<u8>, ProviderError> {
        let data = &call.data[..];
        let selector = data.get(..4).unwrap_or_default();
        let revert = |what: &str| ProviderError::Reverted(what.to_string());

        if call.target == Self::LIDO && selector == ILido::getWithdrawalCredentialsCall::SELECTOR {
            let credentials = FixedBytes(*self.withdrawal_credentials.read());
            return Ok(ILido::getWithdrawalCredentialsCall::abi_encode_returns(&(credentials,)));
        }
        if call.target != Self::REGISTRY {
            return Err(revert("unknown contract"));
        }

        let operators = self.operators.read();
        if selector == INodeOperatorsRegistry::getNodeOperatorsCountCall::SELECTOR {
            if self.fail_metadata.load(Ordering::SeqCst) {
                return Err(revert("operator count"));
            }
            let count =
                (*self.reported_operator_count.read()).unwrap_or(U256::from(operators.len()));
            return Ok(INodeOperatorsRegistry::getNodeOperatorsCountCall::abi_encode_returns(&(count,)));
        }
        if selector == INodeOperatorsRegistry::getNodeOperatorCall::SELECTOR {
            let args = INodeOperatorsRegistry::getNodeOperatorCall::abi_decode(data, true)
                .map_err(|_| revert("bad arguments"))?;
            let op = operators
                .get(args.id.to::<usize>())
                .ok_or_else(|| revert("no such operator"))?;
            let total = op.keys.len() as u64;
            let reported = self
                .reported_key_totals
                .read()
                .get(&args.id.to::<u64>())
                .copied()
                .unwrap_or(total);
            return Ok(INodeOperatorsRegistry::getNodeOperatorCall::abi_encode_returns(&(
                true,
                op.name.clone(),
                address!("3333333333333333333333333333333333333333"),
                total,
                0u64,
                reported,
                op.used,
            )));
        }
        if selector == INodeOperatorsRegistry::getSigningKeyCall::SELECTOR {
            self.key_reads.fetch_add(1, Ordering::SeqCst);
            let args = INodeOperatorsRegistry::getSigningKeyCall::abi_decode(data, true)
                .map_err(|_| revert("bad arguments"))?;
            let (operator, index) = (args.operatorId.to::<u64>(), args.index.to::<u64>());
            if self.broken_keys.read().contains(&(operator, index)) {
                return Err(revert("broken key"));
            }
            if self.unreachable_keys.read().contains(&(operator, index)) {
                return Err(ProviderError::Status(503));
            }
            let op = operators
                .get(operator as usize)
                .ok_or_else(|| revert("no such operator"))?;
            let (key, signature) = op
                .keys
                .get(index as usize)
                .ok_or_else(|| revert("no such key"))?;
            return Ok(INodeOperatorsRegistry::getSigningKeyCall::abi_encode_returns(&(
                Bytes::from(key.clone()),
                Bytes::from(signature.clone()),
                index < op.used,
            )));
        }
        Err(revert("unknown selector"))
    }
}

#[async_trait]
impl CallProvider for FakeRegistry {
    async fn call(&self, call: &CallSpec) -> Result<Bytes, ProviderError> {
        self.answer(call).map(Bytes::from)
    }
}
