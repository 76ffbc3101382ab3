//! Distribution calculator
//!
//! Pure functions from (outcome, terms, committed) to the payout split. Every
//! split conserves value: `sender_share + receiver_share == committed`.

use escrowkit_types::{Amount, Outcome, Settlement, Status, Terms};

/// Split `committed` according to `terms` as `(sender_share, receiver_share)`
///
/// `HalfHalf` gives the odd unit to the receiver.
pub fn distribute(committed: Amount, terms: Terms) -> (Amount, Amount) {
    match terms {
        Terms::BackToSender => (committed, Amount::zero()),
        Terms::BackToReceiver => (Amount::zero(), committed),
        Terms::HalfHalf => committed.halve(),
    }
}

/// Settlement for a terminal transition reached through `outcome`
///
/// - `Agreed`: terms split, `Fulfilled`
/// - `Withdrawn`: full refund to the sender, `Cancelled`
/// - `Arbitrated`: terms split, `Fulfilled` iff the receiver gets anything
pub fn settle(outcome: Outcome, terms: Terms, committed: Amount) -> Settlement {
    let (sender_share, receiver_share, status) = match outcome {
        Outcome::Agreed => {
            let (s, r) = distribute(committed, terms);
            (s, r, Status::Fulfilled)
        }
        Outcome::Withdrawn => (committed, Amount::zero(), Status::Cancelled),
        Outcome::Arbitrated => {
            let (s, r) = distribute(committed, terms);
            let status = if r.is_zero() {
                Status::Cancelled
            } else {
                Status::Fulfilled
            };
            (s, r, status)
        }
    };

    Settlement {
        outcome,
        status,
        sender_share,
        receiver_share,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_TERMS: [Terms; 3] = [Terms::BackToSender, Terms::BackToReceiver, Terms::HalfHalf];
    const ALL_OUTCOMES: [Outcome; 3] = [Outcome::Agreed, Outcome::Withdrawn, Outcome::Arbitrated];

    #[test]
    fn test_distribute() {
        let c = Amount::new(1000);
        assert_eq!(distribute(c, Terms::BackToSender), (c, Amount::zero()));
        assert_eq!(distribute(c, Terms::BackToReceiver), (Amount::zero(), c));
        assert_eq!(
            distribute(Amount::new(1001), Terms::HalfHalf),
            (Amount::new(500), Amount::new(501))
        );
    }

    #[test]
    fn test_every_settlement_conserves_value() {
        for committed in [0, 1, 2, 999, 1000, 1001, u64::MAX - 1, u64::MAX] {
            for terms in ALL_TERMS {
                for outcome in ALL_OUTCOMES {
                    let s = settle(outcome, terms, Amount::new(committed));
                    assert_eq!(
                        s.sender_share.checked_add(s.receiver_share),
                        Some(Amount::new(committed)),
                        "{outcome:?} {terms:?} {committed}"
                    );
                    assert!(s.status.is_terminal());
                }
            }
        }
    }

    #[test]
    fn test_agreed_uses_terms() {
        let s = settle(Outcome::Agreed, Terms::BackToSender, Amount::new(1000));
        assert_eq!(s.status, Status::Fulfilled);
        assert_eq!(s.sender_share, Amount::new(1000));
        assert_eq!(s.receiver_share, Amount::zero());
    }

    #[test]
    fn test_withdrawn_refunds_sender_regardless_of_terms() {
        for terms in ALL_TERMS {
            let s = settle(Outcome::Withdrawn, terms, Amount::new(700));
            assert_eq!(s.status, Status::Cancelled);
            assert_eq!(s.sender_share, Amount::new(700));
        }
    }

    #[test]
    fn test_arbitrated_status_follows_receiver_share() {
        let s = settle(Outcome::Arbitrated, Terms::HalfHalf, Amount::new(1001));
        assert_eq!(s.status, Status::Fulfilled);
        assert_eq!((s.sender_share, s.receiver_share), (Amount::new(500), Amount::new(501)));

        let s = settle(Outcome::Arbitrated, Terms::BackToSender, Amount::new(1001));
        assert_eq!(s.status, Status::Cancelled);

        let s = settle(Outcome::Arbitrated, Terms::BackToReceiver, Amount::zero());
        assert_eq!(s.status, Status::Cancelled);
    }
}
