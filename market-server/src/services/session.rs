//! Session-facing cached views
//!
//! The order engine mutates memberships and licenses; the session layer
//! serves them. This service owns the two views settlement touches: the
//! membership summary (refreshed eagerly after a VIP grant) and the
//! purchased-design list (invalidated after a license grant, rebuilt on
//! next read).

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::TtlCache;
use crate::store::MarketStore;

const VIEW_TTL: Duration = Duration::from_secs(600);

/// What the session layer shows about a user's membership
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembershipView {
    pub user_id: i64,
    pub is_active: bool,
    pub end_time: Option<DateTime<Utc>>,
    pub total_days: i64,
}

pub struct SessionCache {
    store: Arc<MarketStore>,
    memberships: TtlCache<i64, MembershipView>,
    purchases: TtlCache<i64, Vec<i64>>,
}

impl SessionCache {
    pub fn new(store: Arc<MarketStore>) -> Self {
        Self {
            store,
            memberships: TtlCache::new(),
            purchases: TtlCache::new(),
        }
    }

    /// Cached membership summary, built from the store on miss
    pub fn membership_view(&self, user_id: i64) -> MembershipView {
        if let Some(view) = self.memberships.get(&user_id) {
            return view;
        }
        self.refresh_membership(user_id)
    }

    /// Recompute the membership view and replace the cached copy
    pub fn refresh_membership(&self, user_id: i64) -> MembershipView {
        let now = Utc::now();
        let view = match self.store.get_membership(user_id) {
            Some(m) => MembershipView {
                user_id,
                is_active: m.is_active(now),
                end_time: Some(m.end_time),
                total_days: m.total_days,
            },
            None => MembershipView {
                user_id,
                is_active: false,
                end_time: None,
                total_days: 0,
            },
        };
        self.memberships.insert(user_id, view.clone(), VIEW_TTL);
        view
    }

    /// Design ids the user holds a license for
    pub fn purchased_designs(&self, user_id: i64) -> Vec<i64> {
        if let Some(ids) = self.purchases.get(&user_id) {
            return ids;
        }
        let mut ids: Vec<i64> = self
            .store
            .list_licenses(user_id)
            .into_iter()
            .map(|l| l.design_id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        self.purchases.insert(user_id, ids.clone(), VIEW_TTL);
        ids
    }

    /// Drop the cached purchase list; the next read rebuilds it
    pub fn invalidate_purchases(&self, user_id: i64) {
        self.purchases.invalidate(&user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::{DesignLicense, LicenseKind, VipMembership};

    #[test]
    fn test_membership_view_refresh() {
        let store = Arc::new(MarketStore::new());
        let cache = SessionCache::new(Arc::clone(&store));

        let view = cache.membership_view(7);
        assert!(!view.is_active);
        assert_eq!(view.total_days, 0);

        let now = Utc::now();
        store.apply_membership(7, |_| VipMembership {
            user_id: 7,
            total_days: 30,
            start_time: now,
            end_time: now + chrono::Duration::days(30),
        });

        // Stale until refreshed
        assert!(!cache.membership_view(7).is_active);
        let view = cache.refresh_membership(7);
        assert!(view.is_active);
        assert_eq!(view.total_days, 30);
    }

    #[test]
    fn test_purchase_list_invalidation() {
        let store = Arc::new(MarketStore::new());
        let cache = SessionCache::new(Arc::clone(&store));
        store.insert_design(shared::models::Design {
            id: 5,
            user_id: 9,
            title: "poster".into(),
            product_id: None,
            state: shared::models::DesignState::Approved,
        });

        assert!(cache.purchased_designs(7).is_empty());

        store
            .record_license(
                DesignLicense {
                    id: 1,
                    user_id: 7,
                    design_id: 5,
                    plan_id: 1,
                    kind: LicenseKind::Normal,
                    is_buyout: false,
                    created_at: Utc::now(),
                },
                false,
            )
            .unwrap();

        // Cached miss until invalidated
        assert!(cache.purchased_designs(7).is_empty());
        cache.invalidate_purchases(7);
        assert_eq!(cache.purchased_designs(7), vec![5]);
    }
}
