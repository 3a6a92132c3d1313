//! Daily risk limits.
//!
//! The risk manager is a pure day-scoped accumulator. It must be re-armed
//! with [`RiskManager::reset_daily_tracking`] once per trading day before
//! first use; querying an un-armed manager is a programming-contract
//! violation and asserts rather than being silently handled.

#[derive(Debug, Clone)]
pub struct RiskManager {
    /// Stored as a positive magnitude.
    daily_max_loss: f64,
    daily_pnl: f64,
    armed: bool,
}

impl RiskManager {
    pub fn new(daily_max_loss: f64) -> Self {
        Self {
            daily_max_loss: daily_max_loss.abs(),
            daily_pnl: 0.0,
            armed: false,
        }
    }

    pub fn daily_max_loss(&self) -> f64 {
        self.daily_max_loss
    }

    /// Arm the manager for a new trading day.
    pub fn reset_daily_tracking(&mut self) {
        self.daily_pnl = 0.0;
        self.armed = true;
    }

    /// True iff the day's total P&L has breached the loss ceiling.
    pub fn check_daily_limit(&self, current_pnl: f64) -> bool {
        assert!(
            self.armed,
            "RiskManager used before reset_daily_tracking(); daily reset is required"
        );
        current_pnl <= -self.daily_max_loss
    }

    /// True iff every open position should be unwound for the day.
    pub fn should_close_all_positions(&self, total_pnl: f64) -> bool {
        self.check_daily_limit(total_pnl)
    }

    pub fn update_daily_pnl(&mut self, pnl: f64) {
        assert!(
            self.armed,
            "RiskManager used before reset_daily_tracking(); daily reset is required"
        );
        self.daily_pnl = pnl;
    }

    /// Loss budget still available today, never negative.
    pub fn remaining_risk_capacity(&self) -> f64 {
        (self.daily_max_loss + self.daily_pnl).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_is_stored_as_magnitude() {
        let risk = RiskManager::new(-1000.0);
        assert_eq!(risk.daily_max_loss(), 1000.0);
    }

    #[test]
    fn breach_at_and_past_the_ceiling() {
        let mut risk = RiskManager::new(1000.0);
        risk.reset_daily_tracking();
        assert!(!risk.should_close_all_positions(-999.99));
        assert!(risk.should_close_all_positions(-1000.0));
        assert!(risk.should_close_all_positions(-1001.0));
    }

    #[test]
    fn remaining_capacity_clamps_at_zero() {
        let mut risk = RiskManager::new(1000.0);
        risk.reset_daily_tracking();
        risk.update_daily_pnl(-400.0);
        assert_eq!(risk.remaining_risk_capacity(), 600.0);
        risk.update_daily_pnl(-1500.0);
        assert_eq!(risk.remaining_risk_capacity(), 0.0);
    }

    #[test]
    #[should_panic(expected = "reset_daily_tracking")]
    fn use_before_reset_asserts() {
        let risk = RiskManager::new(1000.0);
        let _ = risk.should_close_all_positions(-1.0);
    }
}
