//! Multicall3 `aggregate3` encoding.

use crate::error::ProviderError;
use crate::provider::{CallResults, CallSpec};
use alloy_primitives::{address, Address, Bytes};
use alloy_sol_types::{sol, SolCall};

/// Multicall3 is deployed at the same address on every major network.
pub const MULTICALL3_ADDRESS: Address = address!("cA11bde05977b3631167028862bE2a173976CA11");

sol! {
    struct Call3 {
        address target;
        bool allowFailure;
        bytes callData;
    }

    struct Result3 {
        bool success;
        bytes returnData;
    }

    function aggregate3(Call3[] calldata calls)
        external
        payable
        returns (Result3[] memory returnData);
}

/// Encode `calls` as one `aggregate3` call. Every inner call may fail on its
/// own without reverting the batch.
pub fn encode_aggregate3(calls: &[CallSpec]) -> Bytes {
    let calls = calls
        .iter()
        .map(|call| Call3 {
            target: call.target,
            allowFailure: true,
            callData: call.data.clone(),
        })
        .collect::<Vec<_>>();
    aggregate3Call { calls }.abi_encode().into()
}

pub fn decode_aggregate3(raw: &[u8], expected: usize) -> Result<CallResults, ProviderError> {
    let decoded = aggregate3Call::abi_decode_returns(raw, true)
        .map_err(|e| ProviderError::malformed(format!("aggregate3 return data: {e}")))?;
    if decoded.returnData.len() != expected {
        return Err(ProviderError::malformed(format!(
            "aggregate3 returned {} results for {expected} calls",
            decoded.returnData.len()
        )));
    }
    Ok(decoded
        .returnData
        .into_iter()
        .map(|result| {
            if result.success {
                Ok(result.returnData)
            } else {
                Err(ProviderError::Reverted(format!(
                    "0x{}",
                    alloy_primitives::hex::encode(&result.returnData)
                )))
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_with_aggregate3_selector() {
        let call = CallSpec::new(Address::repeat_byte(0x11), vec![0xde, 0xad]);
        let encoded = encode_aggregate3(&[call]);
        assert_eq!(&encoded[..4], &aggregate3Call::SELECTOR);
        // aggregate3((address,bool,bytes)[])
        assert_eq!(aggregate3Call::SELECTOR, [0x82, 0xad, 0x56, 0xcb]);
    }

    #[test]
    fn decodes_mixed_success_and_failure() {
        let results = vec![
            Result3 {
                success: true,
                returnData: Bytes::from(vec![1, 2, 3]),
            },
            Result3 {
                success: false,
                returnData: Bytes::new(),
            },
        ];
        let raw = aggregate3Call::abi_encode_returns(&(results,));

        let decoded = decode_aggregate3(&raw, 2).unwrap();
        assert_eq!(&decoded[0].as_ref().unwrap()[..], &[1u8, 2, 3]);
        assert!(matches!(decoded[1], Err(ProviderError::Reverted(_))));
    }

    #[test]
    fn result_count_mismatch_is_malformed() {
        let raw = aggregate3Call::abi_encode_returns(&(Vec::<Result3>::new(),));
        assert!(matches!(
            decode_aggregate3(&raw, 1),
            Err(ProviderError::Malformed(_))
        ));
    }
}
