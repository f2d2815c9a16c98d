// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.
use crate::FailureReason;
use alloy::primitives::U256;
use cm_config::MarketRule;
use cm_evm::Market;

/// Scale a USD quote to the integer units the contract stores target prices in
pub fn scale_price(price: f64, decimals: u8) -> Option<U256> {
    let scaled = (price * 10f64.powi(decimals as i32)).floor();
    if !scaled.is_finite() || scaled < 0.0 || scaled > u128::MAX as f64 {
        return None;
    }
    Some(U256::from(scaled as u128))
}

/// Winning side for `market`. `true` means yes.
///
/// Pure: the same aggregate, price and market always give the same side.
pub fn decide(
    rule: &MarketRule,
    aggregate: U256,
    price: Option<f64>,
    market: &Market,
) -> Result<bool, FailureReason> {
    match rule {
        MarketRule::AggregateThreshold { threshold } => Ok(aggregate >= U256::from(*threshold)),
        MarketRule::PriceTarget { coin_id, decimals } => {
            let price = price.ok_or_else(|| {
                FailureReason::ReferenceUnavailable(format!("no price for {coin_id}"))
            })?;
            let scaled = scale_price(price, *decimals).ok_or_else(|| {
                FailureReason::ReferenceUnavailable(format!("price {price} for {coin_id}"))
            })?;
            Ok(scaled >= market.target_price)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cm_test_helpers::test_market;

    fn price_rule(decimals: u8) -> MarketRule {
        MarketRule::PriceTarget {
            coin_id: "bitcoin".to_string(),
            decimals,
        }
    }

    #[test]
    fn test_threshold_rule() {
        let market = test_market(0, 0, 0);
        let rule = MarketRule::AggregateThreshold { threshold: 10 };
        assert!(decide(&rule, U256::from(10), None, &market).unwrap());
        assert!(decide(&rule, U256::from(11), None, &market).unwrap());
        assert!(!decide(&rule, U256::from(9), None, &market).unwrap());
        assert!(!decide(&rule, U256::ZERO, None, &market).unwrap());
    }

    #[test]
    fn test_price_rule_compares_scaled_price() {
        let market = test_market(0, 0, 6_500_000);
        assert!(decide(&price_rule(2), U256::ZERO, Some(65_000.0), &market).unwrap());
        assert!(decide(&price_rule(2), U256::ZERO, Some(65_000.019), &market).unwrap());
        assert!(!decide(&price_rule(2), U256::ZERO, Some(64_999.99), &market).unwrap());
        assert!(!decide(&price_rule(0), U256::ZERO, Some(65_000.0), &market).unwrap());
    }

    #[test]
    fn test_price_rule_without_price_fails() {
        let market = test_market(0, 0, 1);
        assert!(matches!(
            decide(&price_rule(0), U256::ZERO, None, &market),
            Err(FailureReason::ReferenceUnavailable(_))
        ));
        assert!(matches!(
            decide(&price_rule(0), U256::ZERO, Some(f64::NAN), &market),
            Err(FailureReason::ReferenceUnavailable(_))
        ));
        assert!(matches!(
            decide(&price_rule(0), U256::ZERO, Some(-1.0), &market),
            Err(FailureReason::ReferenceUnavailable(_))
        ));
    }
}
