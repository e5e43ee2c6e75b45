use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{Bid, BidStatus};

/// Aggregates denormalized onto a request row
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BidStats {
    pub count: i32,
    pub lowest: Option<Decimal>,
    pub average: Option<Decimal>,
}

impl BidStats {
    /// Count, minimum and mean (rounded to cents) of the given prices
    pub fn from_prices<I>(prices: I) -> Self
    where
        I: IntoIterator<Item = Decimal>,
    {
        let mut count: i32 = 0;
        let mut sum = Decimal::ZERO;
        let mut lowest: Option<Decimal> = None;

        for price in prices {
            count += 1;
            sum += price;
            lowest = Some(match lowest {
                Some(current) if current <= price => current,
                _ => price,
            });
        }

        let average = if count > 0 {
            Some((sum / Decimal::from(count)).round_dp(2))
        } else {
            None
        };

        Self { count, lowest, average }
    }

    /// Withdrawn bids are no longer offers and drop out of the aggregates
    pub fn from_bids<'a, I>(bids: I) -> Self
    where
        I: IntoIterator<Item = &'a Bid>,
    {
        Self::from_prices(
            bids.into_iter()
                .filter(|b| b.status != BidStatus::Withdrawn)
                .map(|b| b.price),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_prices() {
        let stats = BidStats::from_prices(Vec::new());
        assert_eq!(stats.count, 0);
        assert_eq!(stats.lowest, None);
        assert_eq!(stats.average, None);
    }

    #[test]
    fn test_lowest_and_average() {
        let stats = BidStats::from_prices(vec![
            Decimal::new(12000, 2),
            Decimal::new(9950, 2),
            Decimal::new(10500, 2),
        ]);

        assert_eq!(stats.count, 3);
        assert_eq!(stats.lowest, Some(Decimal::new(9950, 2)));
        // (120.00 + 99.50 + 105.00) / 3 = 108.1666..
        assert_eq!(stats.average, Some(Decimal::new(10817, 2)));
    }

    #[test]
    fn test_single_bid() {
        let stats = BidStats::from_prices(vec![Decimal::new(500, 2)]);
        assert_eq!(stats.count, 1);
        assert_eq!(stats.lowest, stats.average);
    }
}
