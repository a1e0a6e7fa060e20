//! Frequency-cap evaluation: is a campaign still eligible to display?
//!
//! Every limit in a campaign's when-limits array must pass (AND); an empty
//! array trivially passes. Count-based limits consult impression history;
//! `OnEvery`/`OnExactly` consult the trigger-fire counters instead.

use crate::campaign::{LimitDef, LimitType};
use crate::impressions::ImpressionManager;

pub struct LimitsMatcher;

impl LimitsMatcher {
    pub fn match_limits(
        limits: &[LimitDef],
        campaign_id: &str,
        manager: &ImpressionManager,
    ) -> bool {
        limits
            .iter()
            .all(|limit| Self::match_limit(limit, campaign_id, manager))
    }

    fn match_limit(limit: &LimitDef, campaign_id: &str, manager: &ImpressionManager) -> bool {
        match limit.limit_type {
            LimitType::Session => manager.per_session(campaign_id) < limit.limit as usize,
            LimitType::Ever => manager.total(campaign_id) < limit.limit as usize,
            LimitType::Seconds
            | LimitType::Minutes
            | LimitType::Hours
            | LimitType::Days
            | LimitType::Weeks => Self::within_window(limit, campaign_id, manager),
            LimitType::OnEvery => {
                let fires = manager.trigger_fires(campaign_id);
                limit.frequency > 0 && fires > 0 && fires % u64::from(limit.frequency) == 0
            }
            LimitType::OnExactly => {
                manager.trigger_fires(campaign_id) == u64::from(limit.frequency)
            }
        }
    }

    fn within_window(limit: &LimitDef, campaign_id: &str, manager: &ImpressionManager) -> bool {
        let Some(unit) = limit.limit_type.unit_millis() else {
            return true;
        };
        // A missing frequency means a single-unit window.
        let window = unit * i64::from(limit.frequency.max(1));
        let since = crate::now_ms() - window;
        manager.impressions_since(campaign_id, since) < limit.limit as usize
    }
}
