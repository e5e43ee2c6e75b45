use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How an order total divides between the platform and the shop
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeeSplit {
    pub total: Decimal,
    pub platform_fee: Decimal,
    pub shop_amount: Decimal,
}

impl FeeSplit {
    /// The fee is rounded to cents and the shop receives the remainder,
    /// so the two parts always sum to the total.
    pub fn from_total(total: Decimal, fee_rate: Decimal) -> Self {
        let platform_fee = (total * fee_rate).round_dp(2);
        Self {
            total,
            platform_fee,
            shop_amount: total - platform_fee,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_five_percent_fee() {
        let split = FeeSplit::from_total(Decimal::new(10000, 2), Decimal::new(5, 2));
        assert_eq!(split.platform_fee, Decimal::new(500, 2));
        assert_eq!(split.shop_amount, Decimal::new(9500, 2));
    }

    #[test]
    fn test_parts_sum_to_total_when_rounding() {
        let total = Decimal::new(1999, 2);
        let split = FeeSplit::from_total(total, Decimal::new(5, 2));
        // 19.99 * 0.05 = 0.9995 -> 1.00
        assert_eq!(split.platform_fee, Decimal::new(100, 2));
        assert_eq!(split.platform_fee + split.shop_amount, total);
    }

    #[test]
    fn test_zero_fee_rate() {
        let split = FeeSplit::from_total(Decimal::new(4200, 2), Decimal::ZERO);
        assert_eq!(split.platform_fee, Decimal::ZERO);
        assert_eq!(split.shop_amount, Decimal::new(4200, 2));
    }
}
