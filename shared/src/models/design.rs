//! Design and License Models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Design lifecycle state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DesignState {
    Draft,
    Pending,
    Approved,
    Rejected,
    /// Exclusively sold; no further licenses may be issued
    BoughtOut,
}

/// User-authored design listed on the marketplace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Design {
    pub id: i64,
    /// Author
    pub user_id: i64,
    pub title: String,
    /// Soft link to the storefront product selling this design
    pub product_id: Option<i64>,
    pub state: DesignState,
}

/// License kind sold for a design
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LicenseKind {
    Normal,
    Buyout,
    Commercial,
}

impl LicenseKind {
    /// Buyout and commercial licenses take the design off the market
    #[inline]
    pub const fn is_exclusive(self) -> bool {
        matches!(self, LicenseKind::Buyout | LicenseKind::Commercial)
    }
}

/// Purchasable license plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicensePlan {
    pub id: i64,
    pub kind: LicenseKind,
    /// Base price in currency units
    pub base_price: Decimal,
}

/// License granted to a buyer after settlement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesignLicense {
    pub id: i64,
    /// Buyer
    pub user_id: i64,
    pub design_id: i64,
    pub plan_id: i64,
    pub kind: LicenseKind,
    pub is_buyout: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exclusive_kinds() {
        assert!(!LicenseKind::Normal.is_exclusive());
        assert!(LicenseKind::Buyout.is_exclusive());
        assert!(LicenseKind::Commercial.is_exclusive());
    }

    #[test]
    fn test_design_state_serde() {
        assert_eq!(
            serde_json::to_string(&DesignState::BoughtOut).unwrap(),
            "\"bought_out\""
        );
    }
}
