// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.
use alloy_primitives::Address;

/// Key layout for everything persisted through the data store
pub struct StoreKeys;

impl StoreKeys {
    /// Authorizations are keyed by the sorted, deduplicated contract set
    pub fn authorization(user: &Address, chain_id: u64, contracts: &[Address]) -> String {
        let mut contracts = contracts.to_vec();
        contracts.sort();
        contracts.dedup();
        let set = contracts
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(",");
        format!("//auth/{user}/{chain_id}/{set}")
    }

    /// Market state is scoped to the contract, so a redeployment starts from scratch
    pub fn wagers(chain_id: u64, contract: &Address, market_id: u64) -> String {
        format!("//market/{chain_id}/{contract}/{market_id}/wagers")
    }

    pub fn resolution(chain_id: u64, contract: &Address, market_id: u64) -> String {
        format!("//market/{chain_id}/{contract}/{market_id}/resolution")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization_key_is_order_independent() {
        let user = Address::repeat_byte(1);
        let a = Address::repeat_byte(0xaa);
        let b = Address::repeat_byte(0x0b);
        assert_eq!(
            StoreKeys::authorization(&user, 1, &[a, b]),
            StoreKeys::authorization(&user, 1, &[b, a, b])
        );
        assert_ne!(
            StoreKeys::authorization(&user, 1, &[a]),
            StoreKeys::authorization(&user, 2, &[a])
        );
    }

    #[test]
    fn test_market_keys_include_contract() {
        let old = Address::repeat_byte(0xcc);
        let new = Address::repeat_byte(0xdd);
        assert_ne!(StoreKeys::wagers(1, &old, 4), StoreKeys::wagers(1, &new, 4));
        assert_ne!(
            StoreKeys::resolution(1, &old, 4),
            StoreKeys::resolution(1, &new, 4)
        );
        assert_ne!(StoreKeys::wagers(1, &old, 4), StoreKeys::resolution(1, &old, 4));
    }
}
