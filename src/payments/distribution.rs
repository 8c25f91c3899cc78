use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::lifecycle::PaymentState;

use super::{PERCENT_TOLERANCE, PaymentError, check_percentage, round2, share_of};

/// One active worker's share of a task budget.
#[derive(Debug, Clone, PartialEq)]
pub struct Share {
    /// `None` until the assignment row is inserted.
    pub assignment_id: Option<u64>,
    pub worker_id: u64,
    pub percentage: f64,
    pub is_paid: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize, ToSchema)]
pub struct ProposedShare {
    #[schema(example = 12)]
    pub worker_id: u64,

    #[schema(example = 60.0)]
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SharePayment {
    pub worker_id: u64,
    pub percentage: f64,
    pub worker_payment: f64,
    pub state: PaymentState,
}

/// Active shares of one task. Paid shares are frozen: they are never
/// rebalanced, adjusted or removed.
#[derive(Debug, Clone)]
pub struct Distribution {
    budget: f64,
    shares: Vec<Share>,
}

impl Distribution {
    pub fn new(budget: f64, shares: Vec<Share>) -> Self {
        Self { budget, shares }
    }

    pub fn shares(&self) -> &[Share] {
        &self.shares
    }

    pub fn total_percentage(&self) -> f64 {
        self.shares.iter().map(|s| s.percentage).sum()
    }

    pub fn is_balanced(&self) -> bool {
        (self.total_percentage() - 100.0).abs() <= PERCENT_TOLERANCE
    }

    pub fn payments(&self) -> Vec<SharePayment> {
        self.shares
            .iter()
            .map(|s| SharePayment {
                worker_id: s.worker_id,
                percentage: s.percentage,
                worker_payment: share_of(self.budget, s.percentage),
                state: PaymentState::from(s.is_paid),
            })
            .collect()
    }

    pub fn payment_for(&self, worker_id: u64) -> Option<f64> {
        self.find(worker_id)
            .map(|s| share_of(self.budget, s.percentage))
    }

    /// Adds `worker_id` and splits whatever paid shares leave over equally
    /// across the unpaid shares and the newcomer.
    pub fn assign(&mut self, worker_id: u64) -> Result<(), PaymentError> {
        if self.find(worker_id).is_some() {
            return Err(PaymentError::AlreadyAssigned(worker_id));
        }

        let paid: f64 = self.shares.iter().filter(|s| s.is_paid).map(|s| s.percentage).sum();
        let remaining = 100.0 - paid;
        if remaining <= PERCENT_TOLERANCE {
            return Err(PaymentError::NoShareLeft);
        }

        self.shares.push(Share {
            assignment_id: None,
            worker_id,
            percentage: 0.0,
            is_paid: false,
        });

        let unpaid = self.shares.iter().filter(|s| !s.is_paid).count();
        let mut parts = split_equally(remaining, unpaid).into_iter();
        for share in self.shares.iter_mut().filter(|s| !s.is_paid) {
            share.percentage = parts.next().unwrap_or_default();
        }

        Ok(())
    }

    /// Replaces the distribution with `proposal`. The proposal must list every
    /// active worker exactly once, keep paid shares unchanged and add up to
    /// 100. Nothing changes unless every check passes.
    pub fn adjust(&mut self, proposal: &[ProposedShare]) -> Result<(), PaymentError> {
        validate_proposal(proposal)?;

        for p in proposal {
            let current = self
                .find(p.worker_id)
                .ok_or(PaymentError::NotAssigned(p.worker_id))?;
            if current.is_paid && (current.percentage - p.percentage).abs() > PERCENT_TOLERANCE {
                return Err(PaymentError::PaidShareLocked(p.worker_id));
            }
        }

        if let Some(missing) = self
            .shares
            .iter()
            .find(|s| !proposal.iter().any(|p| p.worker_id == s.worker_id))
        {
            return Err(PaymentError::MissingWorker(missing.worker_id));
        }

        for share in self.shares.iter_mut().filter(|s| !s.is_paid) {
            if let Some(p) = proposal.iter().find(|p| p.worker_id == share.worker_id) {
                share.percentage = p.percentage;
            }
        }

        Ok(())
    }

    /// Drops `worker_id` from the active set. The remaining shares are left
    /// as they are and must be fixed through `adjust`.
    pub fn remove(&mut self, worker_id: u64) -> Result<Share, PaymentError> {
        let index = self
            .shares
            .iter()
            .position(|s| s.worker_id == worker_id)
            .ok_or(PaymentError::NotAssigned(worker_id))?;

        if self.shares[index].is_paid {
            return Err(PaymentError::PaidShareLocked(worker_id));
        }

        Ok(self.shares.remove(index))
    }

    fn find(&self, worker_id: u64) -> Option<&Share> {
        self.shares.iter().find(|s| s.worker_id == worker_id)
    }
}

/// Checks a proposed distribution on its own: each share within 0-100, no
/// worker twice, sum 100 within tolerance.
pub fn validate_proposal(proposal: &[ProposedShare]) -> Result<(), PaymentError> {
    let mut seen = HashSet::new();
    for p in proposal {
        check_percentage(p.percentage)?;
        if !seen.insert(p.worker_id) {
            return Err(PaymentError::DuplicateWorker(p.worker_id));
        }
    }

    let total: f64 = proposal.iter().map(|p| p.percentage).sum();
    if (total - 100.0).abs() > PERCENT_TOLERANCE {
        return Err(PaymentError::InvalidTotal(total));
    }

    Ok(())
}

/// Splits `total` into `parts` two-decimal shares; the last one absorbs the
/// rounding so the parts add up to `total`.
fn split_equally(total: f64, parts: usize) -> Vec<f64> {
    if parts == 0 {
        return Vec::new();
    }
    let base = round2(total / parts as f64);
    let mut out = vec![base; parts];
    out[parts - 1] = round2(total - base * (parts - 1) as f64);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn share(worker_id: u64, percentage: f64, is_paid: bool) -> Share {
        Share {
            assignment_id: Some(worker_id * 10),
            worker_id,
            percentage,
            is_paid,
        }
    }

    fn pct(d: &Distribution, worker_id: u64) -> f64 {
        d.shares().iter().find(|s| s.worker_id == worker_id).unwrap().percentage
    }

    #[test]
    fn first_worker_takes_everything() {
        let mut d = Distribution::new(100000.0, vec![]);
        d.assign(1).unwrap();
        assert_eq!(pct(&d, 1), 100.0);
        assert_eq!(d.payment_for(1), Some(100000.0));
    }

    #[test]
    fn second_worker_halves_the_budget() {
        let mut d = Distribution::new(100000.0, vec![share(1, 100.0, false)]);
        d.assign(2).unwrap();

        assert_eq!(pct(&d, 1), 50.0);
        assert_eq!(pct(&d, 2), 50.0);
        assert_eq!(d.payment_for(1), Some(50000.0));
        assert_eq!(d.payment_for(2), Some(50000.0));
        assert!(d.is_balanced());
    }

    #[test]
    fn third_worker_rounding_still_sums_to_100() {
        let mut d = Distribution::new(90000.0, vec![share(1, 50.0, false), share(2, 50.0, false)]);
        d.assign(3).unwrap();

        assert_eq!(pct(&d, 1), 33.33);
        assert_eq!(pct(&d, 3), 33.34);
        assert!(d.is_balanced());
    }

    #[test]
    fn assign_leaves_paid_shares_alone() {
        let mut d = Distribution::new(100000.0, vec![share(1, 40.0, true), share(2, 60.0, false)]);
        d.assign(3).unwrap();

        assert_eq!(pct(&d, 1), 40.0);
        assert_eq!(pct(&d, 2), 30.0);
        assert_eq!(pct(&d, 3), 30.0);
        assert!(d.is_balanced());
    }

    #[test]
    fn assign_rejects_duplicates_and_full_paid_budget() {
        let mut d = Distribution::new(100000.0, vec![share(1, 100.0, true)]);
        assert_eq!(d.assign(1), Err(PaymentError::AlreadyAssigned(1)));
        assert_eq!(d.assign(2), Err(PaymentError::NoShareLeft));
        assert_eq!(d.shares().len(), 1);
    }

    #[test]
    fn assign_after_removal_restores_balance() {
        let mut d = Distribution::new(100000.0, vec![share(1, 40.0, false), share(2, 30.0, false)]);
        d.assign(3).unwrap();
        assert!(d.is_balanced());
    }

    #[test]
    fn adjust_applies_valid_distribution() {
        let mut d = Distribution::new(100000.0, vec![share(1, 50.0, false), share(2, 50.0, false)]);
        d.adjust(&[
            ProposedShare { worker_id: 1, percentage: 60.0 },
            ProposedShare { worker_id: 2, percentage: 40.0 },
        ])
        .unwrap();

        assert_eq!(d.payment_for(1), Some(60000.0));
        assert_eq!(d.payment_for(2), Some(40000.0));
    }

    #[test]
    fn adjust_rejects_sum_of_90_without_changes() {
        let mut d = Distribution::new(100000.0, vec![share(1, 60.0, false), share(2, 40.0, false)]);
        let err = d
            .adjust(&[
                ProposedShare { worker_id: 1, percentage: 60.0 },
                ProposedShare { worker_id: 2, percentage: 30.0 },
            ])
            .unwrap_err();

        assert_eq!(err, PaymentError::InvalidTotal(90.0));
        assert_eq!(pct(&d, 1), 60.0);
        assert_eq!(pct(&d, 2), 40.0);
    }

    #[test]
    fn adjust_accepts_sum_within_tolerance() {
        let mut d = Distribution::new(300.0, vec![share(1, 50.0, false), share(2, 50.0, false), share(3, 0.0, false)]);
        d.adjust(&[
            ProposedShare { worker_id: 1, percentage: 50.004 },
            ProposedShare { worker_id: 2, percentage: 49.999 },
            ProposedShare { worker_id: 3, percentage: 0.0 },
        ])
        .unwrap();
        assert!(d.is_balanced());
    }

    #[test]
    fn adjust_requires_every_active_worker() {
        let mut d = Distribution::new(100.0, vec![share(1, 50.0, false), share(2, 50.0, false)]);
        let err = d
            .adjust(&[ProposedShare { worker_id: 1, percentage: 100.0 }])
            .unwrap_err();
        assert_eq!(err, PaymentError::MissingWorker(2));
        assert_eq!(pct(&d, 1), 50.0);
    }

    #[test]
    fn adjust_rejects_unknown_worker_and_paid_change() {
        let mut d = Distribution::new(100.0, vec![share(1, 50.0, true), share(2, 50.0, false)]);

        let unknown = d.adjust(&[
            ProposedShare { worker_id: 1, percentage: 50.0 },
            ProposedShare { worker_id: 9, percentage: 50.0 },
        ]);
        assert_eq!(unknown, Err(PaymentError::NotAssigned(9)));

        let paid = d.adjust(&[
            ProposedShare { worker_id: 1, percentage: 40.0 },
            ProposedShare { worker_id: 2, percentage: 60.0 },
        ]);
        assert_eq!(paid, Err(PaymentError::PaidShareLocked(1)));
        assert_eq!(pct(&d, 2), 50.0);
    }

    #[test]
    fn proposal_validation() {
        assert_eq!(
            validate_proposal(&[
                ProposedShare { worker_id: 1, percentage: 120.0 },
                ProposedShare { worker_id: 2, percentage: -20.0 },
            ]),
            Err(PaymentError::PercentageOutOfRange(120.0))
        );
        assert_eq!(
            validate_proposal(&[
                ProposedShare { worker_id: 1, percentage: 50.0 },
                ProposedShare { worker_id: 1, percentage: 50.0 },
            ]),
            Err(PaymentError::DuplicateWorker(1))
        );
        assert_eq!(validate_proposal(&[]), Err(PaymentError::InvalidTotal(0.0)));
    }

    #[test]
    fn remove_does_not_rebalance() {
        let mut d = Distribution::new(
            100000.0,
            vec![share(1, 40.0, false), share(2, 30.0, false), share(3, 30.0, false)],
        );
        let removed = d.remove(3).unwrap();

        assert_eq!(removed.assignment_id, Some(30));
        assert_eq!(pct(&d, 1), 40.0);
        assert_eq!(pct(&d, 2), 30.0);
        assert_eq!(d.total_percentage(), 70.0);
        assert!(!d.is_balanced());
    }

    #[test]
    fn remove_rejects_paid_and_unknown() {
        let mut d = Distribution::new(100.0, vec![share(1, 100.0, true)]);
        assert_eq!(d.remove(1), Err(PaymentError::PaidShareLocked(1)));
        assert_eq!(d.remove(2), Err(PaymentError::NotAssigned(2)));
    }

    #[test]
    fn split_gives_remainder_to_last() {
        assert_eq!(split_equally(100.0, 3), vec![33.33, 33.33, 33.34]);
        assert_eq!(split_equally(60.0, 2), vec![30.0, 30.0]);
        assert!(split_equally(100.0, 0).is_empty());
    }
}
