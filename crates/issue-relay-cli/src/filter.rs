use chrono::{DateTime, Utc};

use crate::config::{Config, CriteriaField};
use crate::model::{Item, ItemList};

/// Keeps the items whose criteria timestamp is strictly newer than
/// `now - 60 * window_minutes`, preserving input order.
pub fn filter_recent(list: ItemList, config: &Config, now: DateTime<Utc>) -> Vec<Item> {
    let Some(items) = list.list else {
        return Vec::new();
    };

    let limit = window_start(now, config.window_minutes);

    items
        .into_iter()
        .filter(|item| matches_criteria(item, &config.criteria, limit))
        .collect()
}

pub fn window_start(now: DateTime<Utc>, window_minutes: f64) -> f64 {
    let now_secs = now.timestamp_millis() as f64 / 1000.0;
    now_secs - 60.0 * window_minutes
}

fn matches_criteria(item: &Item, criteria: &CriteriaField, limit: f64) -> bool {
    let timestamp = match criteria {
        CriteriaField::Created => item.created_secs(),
        CriteriaField::Changed => item.changed_secs(),
        CriteriaField::Other(_) => None,
    };

    timestamp.is_some_and(|secs| secs > limit)
}
