//! Dashboard figures derived from a snapshot. Everything here is a pure
//! function recomputed on every read; nothing is cached between changes.

use crate::{
    model::{ActivityEntry, App, Employee, OnboardingRecord, RecordId, Timestamp},
    store::Snapshot,
};
use chrono::{Days, NaiveDate};
use serde::Serialize;
use std::collections::HashMap;

/// Length of the trailing trend window, today included.
pub const TREND_DAYS: u64 = 7;
/// Activity entries shown in the recent feed.
pub const RECENT_ACTIVITY: usize = 10;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub employees: usize,
    pub apps: usize,
    /// Onboarding records whose `completed` flag is not set.
    pub active_onboardings: usize,
}

#[must_use]
pub fn counts(snapshot: &Snapshot) -> Counts {
    Counts {
        employees: snapshot.employees.len(),
        apps: snapshot.apps.len(),
        active_onboardings: snapshot
            .onboarding
            .iter()
            .filter(|record| record.is_active())
            .count(),
    }
}

/// Mean progress across all records, rounded half-up. Zero when empty.
#[must_use]
pub fn average_adoption(records: &[OnboardingRecord]) -> u32 {
    if records.is_empty() {
        return 0;
    }
    let total: f64 = records.iter().map(|record| record.progress).sum();
    let mean = total / records.len() as f64;
    mean.round().max(0.0) as u32
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AppUsage {
    pub app_id: RecordId,
    pub name: String,
    pub onboardings: usize,
}

/// Onboarding count per app, in app order. Records without an app id count
/// toward no app.
#[must_use]
pub fn app_usage(apps: &[App], onboarding: &[OnboardingRecord]) -> Vec<AppUsage> {
    let mut per_app: HashMap<RecordId, usize> = HashMap::new();
    for app_id in onboarding.iter().filter_map(OnboardingRecord::app_id) {
        *per_app.entry(app_id).or_default() += 1;
    }

    apps.iter()
        .map(|app| AppUsage {
            app_id: app.id.clone(),
            name: app.name.clone(),
            onboardings: per_app.get(&app.id).copied().unwrap_or(0),
        })
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct DayCount {
    pub date: NaiveDate,
    pub employees: usize,
    pub onboardings: usize,
}

/// Per-day counts of employees created and onboardings started over the
/// `days` days ending `today`, oldest first. Days without records report
/// zero. Buckets use the date portion of each timestamp as the backend sent
/// it.
#[must_use]
pub fn daily_counts(
    employees: &[Employee],
    onboarding: &[OnboardingRecord],
    today: NaiveDate,
    days: u64,
) -> Vec<DayCount> {
    let employee_days = tally(employees.iter().filter_map(|employee| employee.created_at));
    let onboarding_days = tally(onboarding.iter().filter_map(|record| record.started_at));

    (0..days)
        .rev()
        .filter_map(|offset| today.checked_sub_days(Days::new(offset)))
        .map(|date| DayCount {
            date,
            employees: employee_days.get(&date).copied().unwrap_or(0),
            onboardings: onboarding_days.get(&date).copied().unwrap_or(0),
        })
        .collect()
}

fn tally(timestamps: impl Iterator<Item = Timestamp>) -> HashMap<NaiveDate, usize> {
    let mut per_day = HashMap::new();
    for timestamp in timestamps {
        *per_day.entry(timestamp.date_naive()).or_default() += 1;
    }
    per_day
}

/// Everything the dashboard panels show.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Summary {
    pub counts: Counts,
    pub average_adoption: u32,
    pub app_usage: Vec<AppUsage>,
    pub daily: Vec<DayCount>,
    #[serde(skip)]
    pub recent_activity: Vec<ActivityEntry>,
}

impl Summary {
    #[must_use]
    pub fn compute(snapshot: &Snapshot, today: NaiveDate) -> Self {
        Self {
            counts: counts(snapshot),
            average_adoption: average_adoption(snapshot.onboarding.as_slice()),
            app_usage: app_usage(snapshot.apps.as_slice(), snapshot.onboarding.as_slice()),
            daily: daily_counts(
                snapshot.employees.as_slice(),
                snapshot.onboarding.as_slice(),
                today,
                TREND_DAYS,
            ),
            recent_activity: snapshot
                .activity
                .iter()
                .take(RECENT_ACTIVITY)
                .cloned()
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::parse_timestamp;
    use serde_json::json;

    fn onboarding(progress: &[f64]) -> Vec<OnboardingRecord> {
        progress
            .iter()
            .enumerate()
            .map(|(index, progress)| {
                serde_json::from_value(json!({"id": index, "progress": progress})).unwrap()
            })
            .collect()
    }

    fn employee_on(id: &str, date: NaiveDate) -> Employee {
        Employee {
            id: RecordId::from(id),
            full_name: None,
            email: None,
            created_at: parse_timestamp(&format!("{date}T12:00:00Z")),
            row: None,
        }
    }

    fn day(text: &str) -> NaiveDate {
        NaiveDate::parse_from_str(text, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn average_adoption_of_nothing_is_zero() {
        assert_eq!(average_adoption(&[]), 0);
    }

    #[test]
    fn average_adoption_is_the_rounded_mean() {
        assert_eq!(average_adoption(&onboarding(&[20.0, 50.0, 80.0])), 50);
        assert_eq!(average_adoption(&onboarding(&[100.0])), 100);
    }

    #[test]
    fn average_adoption_rounds_half_up() {
        assert_eq!(average_adoption(&onboarding(&[33.0, 34.0])), 34);
        assert_eq!(average_adoption(&onboarding(&[10.0, 11.0, 11.0])), 11);
    }

    #[test]
    fn app_usage_counts_direct_and_nested_app_ids() {
        let apps: Vec<App> = vec![
            serde_json::from_value(json!({"id": "a1", "name": "CRM"})).unwrap(),
            serde_json::from_value(json!({"id": "a2", "name": "Wiki"})).unwrap(),
            serde_json::from_value(json!({"id": "a3", "name": "Chat"})).unwrap(),
        ];
        let records: Vec<OnboardingRecord> = vec![
            serde_json::from_value(json!({"id": 1, "app_id": "a1"})).unwrap(),
            serde_json::from_value(json!({"id": 2, "payload": {"app_id": "a1"}})).unwrap(),
            serde_json::from_value(json!({"id": 3, "app_id": "a2"})).unwrap(),
            serde_json::from_value(json!({"id": 4})).unwrap(),
        ];

        let usage = app_usage(&apps, &records);

        let counts: Vec<(&str, usize)> = usage
            .iter()
            .map(|usage| (usage.name.as_str(), usage.onboardings))
            .collect();
        assert_eq!(counts, vec![("CRM", 2), ("Wiki", 1), ("Chat", 0)]);
    }

    #[test]
    fn daily_counts_fill_empty_days_with_zero() {
        let today = day("2024-03-10");
        let employees = vec![
            employee_on("e1", day("2024-03-09")),
            employee_on("e2", day("2024-03-09")),
            employee_on("e3", day("2024-03-07")),
            employee_on("old", day("2024-02-01")),
        ];

        let buckets = daily_counts(&employees, &[], today, TREND_DAYS);

        assert_eq!(buckets.len(), 7);
        assert_eq!(buckets[0].date, day("2024-03-04"));
        assert_eq!(buckets[6].date, today);
        for bucket in &buckets {
            let expected = match bucket.date.to_string().as_str() {
                "2024-03-09" => 2,
                "2024-03-07" => 1,
                _ => 0,
            };
            assert_eq!(bucket.employees, expected, "{}", bucket.date);
            assert_eq!(bucket.onboardings, 0);
        }
    }

    #[test]
    fn daily_counts_bucket_onboardings_by_start_date() {
        let records: Vec<OnboardingRecord> = vec![
            serde_json::from_value(json!({"id": 1, "started_at": "2024-03-10T01:00:00+05:00"}))
                .unwrap(),
            serde_json::from_value(json!({"id": 2, "started_at": null})).unwrap(),
        ];

        let buckets = daily_counts(&[], &records, day("2024-03-10"), TREND_DAYS);

        assert_eq!(buckets[6].onboardings, 1);
        assert_eq!(buckets.iter().map(|bucket| bucket.onboardings).sum::<usize>(), 1);
    }

    #[test]
    fn summary_counts_active_onboardings_and_recent_activity() {
        let mut snapshot = Snapshot::new(100);
        snapshot.onboarding.reset(vec![
            serde_json::from_value(json!({"id": 1, "progress": 100, "completed": true})).unwrap(),
            serde_json::from_value(json!({"id": 2, "progress": 20, "completed": false})).unwrap(),
            serde_json::from_value(json!({"id": 3, "progress": 30})).unwrap(),
        ]);
        snapshot.activity.reset(
            (0..15)
                .map(|index| {
                    serde_json::from_value(json!({"id": index, "message": "x"})).unwrap()
                })
                .collect(),
        );

        let summary = Summary::compute(&snapshot, day("2024-03-10"));

        assert_eq!(summary.counts.active_onboardings, 2);
        assert_eq!(summary.average_adoption, 50);
        assert_eq!(summary.recent_activity.len(), RECENT_ACTIVITY);
        assert_eq!(summary.daily.len(), 7);
    }
}
