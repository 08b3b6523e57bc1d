use super::LedgerError;
use crate::model::leave_balance::LeaveBalance;

impl LeaveBalance {
    /// Fresh balance for a user, leave type and year.
    pub fn allocated(user_email: &str, leave_type_id: u64, year: i32, total_allocated: f64) -> Self {
        let mut balance = LeaveBalance {
            id: 0,
            user_email: user_email.to_string(),
            leave_type_id,
            year,
            total_allocated,
            used: 0.0,
            pending: 0.0,
            available: 0.0,
        };
        balance.recompute();
        balance
    }

    fn recompute(&mut self) {
        self.available = self.total_allocated - self.used - self.pending;
    }

    pub fn is_consistent(&self) -> bool {
        self.used >= 0.0
            && self.pending >= 0.0
            && (self.available - (self.total_allocated - self.used - self.pending)).abs() < 1e-9
    }

    /// Holds days for a newly submitted request.
    pub fn reserve(&mut self, days: f64) -> Result<(), LedgerError> {
        check_days(days)?;
        if days > self.available {
            return Err(LedgerError::InsufficientBalance {
                requested: days,
                available: self.available,
            });
        }
        self.pending += days;
        self.recompute();
        Ok(())
    }

    /// Moves held days to used when the request is approved.
    pub fn approve(&mut self, days: f64) -> Result<(), LedgerError> {
        self.take_pending(days)?;
        self.used += days;
        self.recompute();
        Ok(())
    }

    /// Gives held days back when the request is rejected.
    pub fn release(&mut self, days: f64) -> Result<(), LedgerError> {
        self.take_pending(days)?;
        self.recompute();
        Ok(())
    }

    pub fn set_allocation(&mut self, total_allocated: f64) -> Result<(), LedgerError> {
        check_days(total_allocated)?;
        let committed = self.used + self.pending;
        if total_allocated < committed {
            return Err(LedgerError::AllocationTooSmall {
                allocated: total_allocated,
                committed,
            });
        }
        self.total_allocated = total_allocated;
        self.recompute();
        Ok(())
    }

    fn take_pending(&mut self, days: f64) -> Result<(), LedgerError> {
        check_days(days)?;
        if days > self.pending {
            return Err(LedgerError::BalanceUnderflow {
                requested: days,
                pending: self.pending,
            });
        }
        self.pending -= days;
        Ok(())
    }
}

fn check_days(days: f64) -> Result<(), LedgerError> {
    if days.is_finite() && days >= 0.0 {
        Ok(())
    } else {
        Err(LedgerError::InvalidDayCount)
    }
}
