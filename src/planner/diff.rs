//! Change reports between two deployment records.
//!
//! A [`DeploymentReport`] is plain data; rendering lives in the CLI output
//! formatter so the same report can be printed as text or JSON.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::config::{Schedule, ScheduleRule};
use crate::prefect::RemoteDeployment;

use super::cron;

/// How an entry differs between the old and new record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Change {
    /// Only in the new record.
    Added,
    /// Only in the old record.
    Removed,
    /// In both, with different values.
    Modified,
    /// In both, equal.
    Unchanged,
}

/// Report of the changes made to one deployment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeploymentReport {
    /// Deployment name.
    pub name: String,
    /// Entrypoint change.
    pub entrypoint: EntrypointChange,
    /// Tag changes.
    pub tags: TagDiff,
    /// Schedules: added, then removed, then unchanged.
    pub schedules: Vec<ScheduleRow>,
    /// Parameter changes.
    pub parameters: ParameterDiff,
}

/// Current entrypoint and, when it changed, the previous one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntrypointChange {
    /// Entrypoint in the new record.
    pub current: String,
    /// Entrypoint it replaced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<String>,
}

/// Tag set differences, each list sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TagDiff {
    /// Tags only in the new record.
    pub added: Vec<String>,
    /// Tags only in the old record.
    pub removed: Vec<String>,
    /// Tags in both.
    pub unchanged: Vec<String>,
}

/// One schedule line of a report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleRow {
    /// Whether the schedule is active.
    pub active: bool,
    /// The schedule rule.
    pub rule: ScheduleRule,
    /// Added, removed, or unchanged.
    pub change: Change,
    /// English description of cron rules.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Parameter rows plus whether anything changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParameterDiff {
    /// Added rows, removed rows, then common rows; each group sorted by key.
    pub rows: Vec<ParameterRow>,
    /// True if any key was added, removed, or modified.
    pub changed: bool,
}

/// One parameter line of a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParameterRow {
    /// Parameter name.
    pub key: String,
    /// Kind of change.
    pub change: Change,
    /// New value, or the old value for removed keys.
    pub value: String,
    /// Previous value of modified keys.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_value: Option<String>,
}

impl DeploymentReport {
    /// Returns true if nothing differs between the two records.
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.entrypoint.previous.is_none()
            && self.tags.added.is_empty()
            && self.tags.removed.is_empty()
            && self.schedules.iter().all(|s| s.change == Change::Unchanged)
            && !self.parameters.changed
    }
}

/// Builds the change report between a freshly fetched record and its
/// pre-push snapshot.
///
/// Returns `None` if there is no new record.
#[must_use]
pub fn render_diff(
    new: Option<&RemoteDeployment>,
    old: Option<&RemoteDeployment>,
) -> Option<DeploymentReport> {
    let new = new?;

    Some(DeploymentReport {
        name: new.name.clone(),
        entrypoint: diff_entrypoint(new.entrypoint.as_deref(), old.and_then(|o| o.entrypoint.as_deref())),
        tags: diff_tags(&new.tags, old.map_or(&[][..], |o| o.tags.as_slice())),
        schedules: diff_schedules(&new.schedules, old.map_or(&[][..], |o| o.schedules.as_slice())),
        parameters: diff_parameters(&new.parameters, old.map(|o| &o.parameters)),
    })
}

fn diff_entrypoint(new: Option<&str>, old: Option<&str>) -> EntrypointChange {
    let current = new.unwrap_or_default().to_string();
    let previous = old
        .filter(|old| !old.is_empty() && *old != current)
        .map(String::from);
    EntrypointChange { current, previous }
}

/// Compares tags as sets.
#[must_use]
pub fn diff_tags(new: &[String], old: &[String]) -> TagDiff {
    let new: BTreeSet<&String> = new.iter().collect();
    let old: BTreeSet<&String> = old.iter().collect();

    TagDiff {
        added: new.difference(&old).map(|t| (*t).clone()).collect(),
        removed: old.difference(&new).map(|t| (*t).clone()).collect(),
        unchanged: new.intersection(&old).map(|t| (*t).clone()).collect(),
    }
}

/// Compares schedules as multisets of `(active, rule)` pairs.
#[must_use]
pub fn diff_schedules(new: &[Schedule], old: &[Schedule]) -> Vec<ScheduleRow> {
    let mut unmatched_old: Vec<Option<&Schedule>> = old.iter().map(Some).collect();
    let mut added = Vec::new();
    let mut unchanged = Vec::new();

    for schedule in new {
        let matched = unmatched_old
            .iter_mut()
            .find(|slot| slot.is_some_and(|o| o == schedule))
            .and_then(Option::take);
        if matched.is_some() {
            unchanged.push(row(schedule, Change::Unchanged));
        } else {
            added.push(row(schedule, Change::Added));
        }
    }

    let removed = unmatched_old
        .into_iter()
        .flatten()
        .map(|s| row(s, Change::Removed));

    added.into_iter().chain(removed).chain(unchanged).collect()
}

fn row(schedule: &Schedule, change: Change) -> ScheduleRow {
    ScheduleRow {
        active: schedule.active,
        rule: schedule.rule.clone(),
        change,
        description: schedule.rule.cron_expression().and_then(cron::describe),
    }
}

/// Compares parameters key by key.
#[must_use]
pub fn diff_parameters(
    new: &BTreeMap<String, serde_json::Value>,
    old: Option<&BTreeMap<String, serde_json::Value>>,
) -> ParameterDiff {
    let empty = BTreeMap::new();
    let old = old.unwrap_or(&empty);

    let added = new
        .iter()
        .filter(|(k, _)| !old.contains_key(*k))
        .map(|(k, v)| ParameterRow {
            key: k.clone(),
            change: Change::Added,
            value: render_value(v),
            old_value: None,
        });
    let removed = old
        .iter()
        .filter(|(k, _)| !new.contains_key(*k))
        .map(|(k, v)| ParameterRow {
            key: k.clone(),
            change: Change::Removed,
            value: render_value(v),
            old_value: None,
        });
    let common = new.iter().filter_map(|(k, v)| {
        let previous = old.get(k)?;
        Some(if previous == v {
            ParameterRow {
                key: k.clone(),
                change: Change::Unchanged,
                value: render_value(v),
                old_value: None,
            }
        } else {
            ParameterRow {
                key: k.clone(),
                change: Change::Modified,
                value: render_value(v),
                old_value: Some(render_value(previous)),
            }
        })
    });

    let rows: Vec<ParameterRow> = added.chain(removed).chain(common).collect();
    let changed = rows.iter().any(|r| r.change != Change::Unchanged);
    ParameterDiff { rows, changed }
}

/// Renders a parameter value; strings are shown bare, nested values pretty.
#[must_use]
pub fn render_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DeploymentSpec, ValueMap};
    use serde_json::json;

    fn tags(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| (*s).to_string()).collect()
    }

    fn record(entrypoint: &str) -> RemoteDeployment {
        DeploymentSpec {
            name: String::from("nightly"),
            version: String::from("1"),
            work_queue_name: String::from("default"),
            job_variables: None,
            parameters: ValueMap::from([(String::from("x"), json!(1))]),
            description: None,
            description_file: None,
            schedules: vec![Schedule::active(ScheduleRule::cron("0 2 * * *", None))],
            tags: tags(&["a", "b"]),
        }
        .to_record(entrypoint, "pool")
    }

    #[test]
    fn test_tag_partition() {
        let diff = diff_tags(&tags(&["a", "b", "c"]), &tags(&["a", "b"]));
        assert_eq!(diff.added, tags(&["c"]));
        assert!(diff.removed.is_empty());
        assert_eq!(diff.unchanged, tags(&["a", "b"]));
    }

    #[test]
    fn test_tags_sorted_and_deduplicated() {
        let diff = diff_tags(&tags(&["z", "m", "z"]), &tags(&["b"]));
        assert_eq!(diff.added, tags(&["m", "z"]));
        assert_eq!(diff.removed, tags(&["b"]));
    }

    #[test]
    fn test_active_flag_distinguishes_schedules() {
        let rule = ScheduleRule::cron("0 2 * * *", None);
        let rows = diff_schedules(
            &[Schedule::active(rule.clone())],
            &[Schedule::inactive(rule)],
        );
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].change, Change::Added);
        assert!(rows[0].active);
        assert_eq!(rows[1].change, Change::Removed);
        assert!(!rows[1].active);
        assert_eq!(rows[0].description.as_deref(), Some("At 02:00 AM"));
    }

    #[test]
    fn test_schedule_rows_order_and_multiset() {
        let hourly = Schedule::active(ScheduleRule::cron("0 * * * *", None));
        let interval = Schedule::active(ScheduleRule::interval(600.0));
        let rrule = Schedule::active(ScheduleRule::rrule("FREQ=DAILY"));

        let rows = diff_schedules(
            &[hourly.clone(), hourly.clone(), rrule],
            &[hourly, interval],
        );
        let changes: Vec<Change> = rows.iter().map(|r| r.change).collect();
        assert_eq!(
            changes,
            vec![Change::Added, Change::Added, Change::Removed, Change::Unchanged]
        );
        assert!(rows[2].description.is_none());
    }

    #[test]
    fn test_parameter_modified_and_unchanged() {
        let new = ValueMap::from([(String::from("x"), json!(1)), (String::from("y"), json!(2))]);
        let old = ValueMap::from([(String::from("x"), json!(1)), (String::from("y"), json!(3))]);
        let diff = diff_parameters(&new, Some(&old));

        assert!(diff.changed);
        assert_eq!(diff.rows[0].key, "x");
        assert_eq!(diff.rows[0].change, Change::Unchanged);
        assert!(diff.rows[0].old_value.is_none());
        assert_eq!(diff.rows[1].key, "y");
        assert_eq!(diff.rows[1].change, Change::Modified);
        assert_eq!(diff.rows[1].value, "2");
        assert_eq!(diff.rows[1].old_value.as_deref(), Some("3"));
    }

    #[test]
    fn test_parameter_groups_are_ordered() {
        let new = ValueMap::from([
            (String::from("keep"), json!("same")),
            (String::from("zeta"), json!([1, 2])),
            (String::from("alpha"), json!({"k": "v"})),
        ]);
        let old = ValueMap::from([
            (String::from("keep"), json!("same")),
            (String::from("gone"), json!(true)),
        ]);
        let diff = diff_parameters(&new, Some(&old));
        let keys: Vec<&str> = diff.rows.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["alpha", "zeta", "gone", "keep"]);
        assert_eq!(diff.rows[3].value, "same");
        assert!(diff.rows[0].value.contains("\"k\": \"v\""));
    }

    #[test]
    fn test_entrypoint_change() {
        let new = record("flows/etl/flow.py:main");
        let report = render_diff(Some(&new), Some(&record("old/flow.py:main"))).unwrap();
        assert_eq!(report.entrypoint.previous.as_deref(), Some("old/flow.py:main"));

        let report = render_diff(Some(&new), Some(&record(""))).unwrap();
        assert!(report.entrypoint.previous.is_none());
    }

    #[test]
    fn test_identical_records_are_unchanged() {
        let report = render_diff(Some(&record("flow.py:main")), Some(&record("flow.py:main"))).unwrap();
        assert!(report.is_unchanged());
        assert!(report.tags.added.is_empty() && report.tags.removed.is_empty());
        assert!(!report.parameters.changed);
    }

    #[test]
    fn test_first_deployment_reports_everything_added() {
        let report = render_diff(Some(&record("flow.py:main")), None).unwrap();
        assert_eq!(report.tags.added, tags(&["a", "b"]));
        assert_eq!(report.schedules[0].change, Change::Added);
        assert!(report.parameters.changed);
        assert!(!report.is_unchanged());
    }

    #[test]
    fn test_missing_new_record() {
        assert!(render_diff(None, Some(&record("flow.py:main"))).is_none());
    }
}
