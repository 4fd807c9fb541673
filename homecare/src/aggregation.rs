//! In-process aggregation for the analytics and patient pages.
//!
//! Grouping is a single linear scan with lookup-or-append, so groups come out in the order their
//! key was first seen. Everything here is recomputed on every request from freshly fetched rows.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::models::{care_plans::GoalStatus, medications::MedicationLogStatus};

/// Messages considered when bucketing message volume.
pub const MESSAGE_VOLUME_SAMPLE: usize = 100;
/// Days kept in the message volume chart.
pub const MESSAGE_VOLUME_DAYS: usize = 7;
/// Adherence at or above this percentage is labelled good.
pub const GOOD_ADHERENCE_THRESHOLD: i64 = 80;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupCount<K> {
    pub key: K,
    pub count: usize,
}

/// A group with its bar width as a percentage of the largest group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bar<K> {
    pub key: K,
    pub count: usize,
    pub width: f64,
}

pub fn group_counts<T, K, F>(rows: &[T], key: F) -> Vec<GroupCount<K>>
where
    K: PartialEq,
    F: Fn(&T) -> K,
{
    let mut groups: Vec<GroupCount<K>> = Vec::new();
    for row in rows {
        let k = key(row);
        match groups.iter_mut().find(|g| g.key == k) {
            Some(group) => group.count += 1,
            None => groups.push(GroupCount { key: k, count: 1 }),
        }
    }
    groups
}

/// Width of a bar as a percentage of `max`, capped at 100.
pub fn bar_width(count: usize, max: usize) -> f64 {
    if max == 0 {
        return 0.0;
    }
    (count as f64 / max as f64 * 100.0).min(100.0)
}

pub fn bars<K>(groups: Vec<GroupCount<K>>) -> Vec<Bar<K>> {
    let max = groups.iter().map(|g| g.count).max().unwrap_or(0);
    groups
        .into_iter()
        .map(|g| Bar {
            width: bar_width(g.count, max),
            key: g.key,
            count: g.count,
        })
        .collect()
}

/// `part / total` as a whole percentage.
pub fn percentage(part: i64, total: i64) -> i64 {
    if total == 0 {
        return 0;
    }
    (part as f64 / total as f64 * 100.0).round() as i64
}

/// Active care plans per patient as a percentage. An empty agency divides by one.
pub fn engagement_rate(active_care_plans: i64, total_patients: i64) -> i64 {
    percentage(active_care_plans, total_patients.max(1))
}

/// Message counts per calendar day for the most recent days, oldest first.
///
/// `newest_first` must be sorted newest to oldest; only the first [`MESSAGE_VOLUME_SAMPLE`] are
/// looked at.
pub fn message_volume(newest_first: &[DateTime<Utc>]) -> Vec<GroupCount<NaiveDate>> {
    let sample = &newest_first[..newest_first.len().min(MESSAGE_VOLUME_SAMPLE)];
    let mut days = group_counts(sample, |ts| ts.date_naive());
    days.truncate(MESSAGE_VOLUME_DAYS);
    days.reverse();
    days
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub enum AdherenceLabel {
    Good,
    #[serde(rename = "Needs Improvement")]
    NeedsImprovement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct Adherence {
    pub rate: i64,
    pub label: AdherenceLabel,
    pub taken: i64,
    pub total: i64,
}

/// Share of logged doses marked taken. Every logged status counts toward the total.
pub fn adherence_rate<'a>(statuses: impl IntoIterator<Item = &'a MedicationLogStatus>) -> Adherence {
    let (taken, total) = statuses.into_iter().fold((0i64, 0i64), |(taken, total), status| {
        (taken + i64::from(*status == MedicationLogStatus::Taken), total + 1)
    });
    let rate = percentage(taken, total);
    let label = if rate >= GOOD_ADHERENCE_THRESHOLD {
        AdherenceLabel::Good
    } else {
        AdherenceLabel::NeedsImprovement
    };
    Adherence { rate, label, taken, total }
}

/// Completed goals as a percentage of all goals; 0 for a plan with no goals.
pub fn care_plan_progress<'a>(goals: impl IntoIterator<Item = &'a GoalStatus>) -> i64 {
    let (completed, total) = goals.into_iter().fold((0i64, 0i64), |(completed, total), status| {
        (completed + i64::from(*status == GoalStatus::Completed), total + 1)
    });
    percentage(completed, total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn groups_keep_first_seen_order_and_sum_to_row_count() {
        let rows = ["nursing", "aide", "nursing", "physical_therapy", "aide", "nursing"];
        let groups = group_counts(&rows, |r| *r);
        assert_eq!(
            groups,
            vec![
                GroupCount { key: "nursing", count: 3 },
                GroupCount { key: "aide", count: 2 },
                GroupCount { key: "physical_therapy", count: 1 },
            ]
        );
        assert_eq!(groups.iter().map(|g| g.count).sum::<usize>(), rows.len());
        assert!(group_counts::<&str, &str, _>(&[], |r| *r).is_empty());
    }

    #[test]
    fn bar_width_is_relative_to_max_and_capped() {
        assert_eq!(bar_width(5, 10), 50.0);
        assert_eq!(bar_width(10, 10), 100.0);
        assert_eq!(bar_width(12, 10), 100.0);
        assert_eq!(bar_width(3, 0), 0.0);

        let widths: Vec<f64> = bars(group_counts(&[1, 1, 2, 1], |x| *x)).into_iter().map(|b| b.width).collect();
        assert_eq!(widths[0], 100.0);
        assert!((widths[1] - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn percentage_rounds_and_handles_empty_total() {
        assert_eq!(percentage(6, 8), 75);
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(5, 0), 0);
    }

    #[test]
    fn engagement_rate_divides_by_one_when_no_patients() {
        assert_eq!(engagement_rate(0, 0), 0);
        assert_eq!(engagement_rate(3, 0), 300);
        assert_eq!(engagement_rate(3, 4), 75);
    }

    #[test]
    fn message_volume_keeps_last_seven_days_oldest_first() {
        let base = Utc.with_ymd_and_hms(2025, 3, 20, 12, 0, 0).unwrap();
        // Two messages a day for ten days, newest first
        let timestamps: Vec<_> = (0..20).map(|i| base - Duration::hours(12 * i)).collect();

        let volume = message_volume(&timestamps);
        assert_eq!(volume.len(), 7);
        assert_eq!(volume.first().unwrap().key, NaiveDate::from_ymd_opt(2025, 3, 14).unwrap());
        assert_eq!(volume.last().unwrap().key, NaiveDate::from_ymd_opt(2025, 3, 20).unwrap());
        assert!(volume.windows(2).all(|w| w[0].key < w[1].key));
    }

    #[test]
    fn message_volume_only_samples_newest_hundred() {
        let base = Utc.with_ymd_and_hms(2025, 3, 20, 12, 0, 0).unwrap();
        let mut timestamps = vec![base; 100];
        timestamps.push(base - Duration::days(1));

        let volume = message_volume(&timestamps);
        assert_eq!(volume, vec![GroupCount { key: base.date_naive(), count: 100 }]);
    }

    #[test]
    fn adherence_labels_at_eighty_percent() {
        use MedicationLogStatus::*;
        let good = adherence_rate(&[Taken, Taken, Taken, Taken, Missed]);
        assert_eq!(good.rate, 80);
        assert_eq!(good.label, AdherenceLabel::Good);

        let poor = adherence_rate(&[Taken, Missed, Pending]);
        assert_eq!(poor.rate, 33);
        assert_eq!(poor.label, AdherenceLabel::NeedsImprovement);

        let none = adherence_rate(&[]);
        assert_eq!((none.rate, none.total), (0, 0));
        assert_eq!(serde_json::to_value(none.label).unwrap(), "Needs Improvement");
    }

    #[test]
    fn care_plan_progress_counts_completed_goals() {
        use GoalStatus::*;
        assert_eq!(care_plan_progress(&[Completed, InProgress, NotStarted, Completed]), 50);
        assert_eq!(care_plan_progress(&[]), 0);
    }
}
