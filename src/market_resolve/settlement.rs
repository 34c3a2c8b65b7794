use rust_decimal::{Decimal, RoundingStrategy};

use crate::models::{Bet, BetStatus};

/// Outcome of settling one pending bet
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub bet_id: String,
    pub user_id: String,
    pub status: BetStatus,
    pub payout: Decimal,
}

/// Winner gets their stake back plus a share of the losing side
/// proportional to their stake on the winning side.
///
/// Truncated to whole cents, so the sum over all winners never exceeds
/// the pool. Leftover fractions of a cent stay unpaid.
pub fn parimutuel_payout(stake: Decimal, winning_volume: Decimal, losing_volume: Decimal) -> Decimal {
    if winning_volume <= Decimal::ZERO {
        return stake;
    }
    (stake + stake / winning_volume * losing_volume).round_dp_with_strategy(2, RoundingStrategy::ToZero)
}

/// Settle every pending bet of a market against `result`.
///
/// Volumes are summed from the bets themselves so a payout never depends
/// on stale market totals.
pub fn settle_bets<'a>(bets: impl IntoIterator<Item = &'a Bet>, result: bool) -> Vec<Settlement> {
    let pending: Vec<&Bet> = bets
        .into_iter()
        .filter(|b| b.status == BetStatus::Pending)
        .collect();

    let (winning_volume, losing_volume) = pending.iter().fold(
        (Decimal::ZERO, Decimal::ZERO),
        |(win, lose), bet| {
            if bet.prediction == result {
                (win + bet.amount, lose)
            } else {
                (win, lose + bet.amount)
            }
        },
    );

    pending
        .into_iter()
        .map(|bet| {
            if bet.prediction == result {
                Settlement {
                    bet_id: bet.id.clone(),
                    user_id: bet.user_id.clone(),
                    status: BetStatus::Won,
                    payout: parimutuel_payout(bet.amount, winning_volume, losing_volume),
                }
            } else {
                Settlement {
                    bet_id: bet.id.clone(),
                    user_id: bet.user_id.clone(),
                    status: BetStatus::Lost,
                    payout: Decimal::ZERO,
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn bet(id: &str, user: &str, prediction: bool, amount: Decimal) -> Bet {
        Bet {
            id: id.into(),
            user_id: user.into(),
            market_id: "m1".into(),
            amount,
            prediction,
            status: BetStatus::Pending,
            payout: None,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    #[test]
    fn test_payout_splits_losing_pool() {
        assert_eq!(parimutuel_payout(dec!(30), dec!(40), dec!(60)), dec!(75));
        assert_eq!(parimutuel_payout(dec!(10), dec!(40), dec!(60)), dec!(25));
        assert_eq!(parimutuel_payout(dec!(10), dec!(10), dec!(0)), dec!(10));
    }

    #[test]
    fn test_settle_pays_whole_pool() {
        let bets = vec![
            bet("b1", "alice", true, dec!(30)),
            bet("b2", "bob", true, dec!(10)),
            bet("b3", "carol", false, dec!(60)),
        ];
        let settled = settle_bets(&bets, true);

        assert_eq!(settled.len(), 3);
        let paid: Decimal = settled.iter().map(|s| s.payout).sum();
        assert_eq!(paid, dec!(100));
        assert_eq!(settled[2].status, BetStatus::Lost);
        assert_eq!(settled[0].payout, dec!(75));
    }

    #[test]
    fn test_uneven_split_never_exceeds_pool() {
        let bets = vec![
            bet("b1", "alice", true, dec!(1)),
            bet("b2", "bob", true, dec!(1)),
            bet("b3", "carol", true, dec!(1)),
            bet("b4", "dave", false, dec!(2)),
        ];
        let settled = settle_bets(&bets, true);

        assert_eq!(settled[0].payout, dec!(1.66));
        let paid: Decimal = settled.iter().map(|s| s.payout).sum();
        assert!(paid <= dec!(5));
        assert_eq!(paid, dec!(4.98));
    }

    #[test]
    fn test_no_winning_stake_pays_nobody() {
        let bets = vec![bet("b1", "alice", false, dec!(20)), bet("b2", "bob", false, dec!(5))];
        let settled = settle_bets(&bets, true);

        assert!(settled.iter().all(|s| s.status == BetStatus::Lost));
        assert!(settled.iter().all(|s| s.payout.is_zero()));
    }

    #[test]
    fn test_settle_skips_settled_bets() {
        let mut settled_already = bet("b1", "alice", true, dec!(50));
        settled_already.status = BetStatus::Won;
        let bets = vec![settled_already, bet("b2", "bob", false, dec!(20))];

        let settled = settle_bets(&bets, false);
        assert_eq!(settled.len(), 1);
        assert_eq!(settled[0].payout, dec!(20));
    }
}
