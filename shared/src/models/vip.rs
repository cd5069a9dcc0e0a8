//! VIP Membership Models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Purchasable VIP duration plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VipPlan {
    pub id: i64,
    pub name: String,
    /// Granted membership days per purchase
    pub days: i64,
    /// Price in currency units
    pub price: Decimal,
}

/// Per-user membership window
///
/// `total_days` accumulates across all purchases; the window stacks onto
/// an unexpired end or restarts from now when lapsed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VipMembership {
    pub user_id: i64,
    pub total_days: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl VipMembership {
    /// Whether the membership window covers `now`
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.end_time > now
    }
}
