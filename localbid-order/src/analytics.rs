use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Dashboard numbers for one shop
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShopAnalytics {
    pub bids_submitted: i32,
    pub bids_won: i32,
    pub total_revenue: Decimal,
    pub average_rating: Decimal,
    pub total_reviews: i32,
    /// Percentage of submitted bids that were accepted
    pub win_rate: Decimal,
}

impl ShopAnalytics {
    pub fn new(
        bids_submitted: i32,
        bids_won: i32,
        total_revenue: Decimal,
        average_rating: Decimal,
        total_reviews: i32,
    ) -> Self {
        let win_rate = if bids_submitted > 0 {
            (Decimal::from(bids_won) * Decimal::ONE_HUNDRED / Decimal::from(bids_submitted)).round_dp(2)
        } else {
            Decimal::ZERO
        };

        Self {
            bids_submitted,
            bids_won,
            total_revenue,
            average_rating,
            total_reviews,
            win_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_win_rate() {
        let analytics = ShopAnalytics::new(3, 1, Decimal::new(9500, 2), Decimal::ZERO, 0);
        assert_eq!(analytics.win_rate, Decimal::new(3333, 2));
    }

    #[test]
    fn test_no_bids_means_zero_win_rate() {
        let analytics = ShopAnalytics::new(0, 0, Decimal::ZERO, Decimal::ZERO, 0);
        assert_eq!(analytics.win_rate, Decimal::ZERO);
    }
}
