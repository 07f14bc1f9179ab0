//! Cron expression parsing and English descriptions.
//!
//! The five-field form is supported (minute, hour, day of month, month, day of
//! week), including ranges with steps and the `@daily`-style macros. Syntax
//! the scheduler accepts but this module cannot describe, such as `L`, `W` or
//! `#`, is reported as [`CronError::Unsupported`].

use std::fmt::Write;
use thiserror::Error;

const MONTH_NAMES: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

const DAY_NAMES: [&str; 7] = [
    "Sunday", "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday",
];

/// Reasons a cron expression could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CronError {
    /// The expression is malformed or a value is out of range.
    #[error("{0}")]
    Invalid(String),

    /// The expression uses syntax that has no English description here.
    #[error("{0}")]
    Unsupported(String),
}

/// A parsed five-field cron expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpression {
    minute: Field,
    hour: Field,
    day_of_month: Field,
    month: Field,
    day_of_week: Field,
}

/// One cron field.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Field {
    /// `*` or `?`.
    Any,
    /// `*/n` or `start/n`.
    Step { start: u32, step: u32 },
    /// `low-high/n`.
    RangeStep { low: u32, high: u32, step: u32 },
    /// Comma separated values and ranges.
    List(Vec<Part>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Part {
    Value(u32),
    Range(u32, u32),
}

#[derive(Clone, Copy)]
struct Bounds {
    name: &'static str,
    min: u32,
    max: u32,
    names: Option<&'static [&'static str]>,
}

const MINUTE: Bounds = Bounds { name: "minute", min: 0, max: 59, names: None };
const HOUR: Bounds = Bounds { name: "hour", min: 0, max: 23, names: None };
const DAY_OF_MONTH: Bounds = Bounds { name: "day of month", min: 1, max: 31, names: None };
const MONTH: Bounds = Bounds { name: "month", min: 1, max: 12, names: Some(MONTH_NAMES.as_slice()) };
const DAY_OF_WEEK: Bounds = Bounds { name: "day of week", min: 0, max: 7, names: Some(DAY_NAMES.as_slice()) };

impl CronExpression {
    /// Parses a five-field cron expression or an `@` macro.
    ///
    /// # Errors
    ///
    /// Returns [`CronError::Invalid`] for malformed fields and out-of-range
    /// values, and [`CronError::Unsupported`] for syntax outside the described
    /// subset.
    pub fn parse(expression: &str) -> Result<Self, CronError> {
        let expression = expression.trim();
        let expanded = if expression.starts_with('@') {
            expand_macro(expression)?
        } else {
            expression
        };

        let fields: Vec<&str> = expanded.split_whitespace().collect();
        match fields.len() {
            5 => {}
            found if found < 5 => {
                return Err(CronError::Invalid(format!(
                    "Invalid cron expression '{expression}': expected 5 fields, found {found}"
                )));
            }
            found => {
                return Err(CronError::Unsupported(format!(
                    "Cron expression '{expression}' has {found} fields; only five-field expressions are described"
                )));
            }
        }

        Ok(Self {
            minute: Field::parse(fields[0], MINUTE)?,
            hour: Field::parse(fields[1], HOUR)?,
            day_of_month: Field::parse(fields[2], DAY_OF_MONTH)?,
            month: Field::parse(fields[3], MONTH)?,
            day_of_week: Field::parse(fields[4], DAY_OF_WEEK)?,
        })
    }

    /// Returns an English description, e.g. `At 02:00 AM, only on Monday`.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut out = self.describe_time();

        if let Some(days) = describe_day_of_month(&self.day_of_month) {
            let _ = write!(out, ", {days}");
        }
        if let Some(weekdays) = describe_named(&self.day_of_week, &DAY_NAMES, 0, "only on", "days of the week") {
            let _ = write!(out, ", {weekdays}");
        }
        if let Some(months) = describe_named(&self.month, &MONTH_NAMES, 1, "only in", "months") {
            let _ = write!(out, ", {months}");
        }

        out
    }

    fn describe_time(&self) -> String {
        match (&self.minute, &self.hour) {
            (Field::Any, Field::Any) => String::from("Every minute"),
            (Field::Any, hour) => format!("Every minute, {}", describe_hours(hour)),
            (Field::List(minutes), Field::List(hours))
                if all_values(minutes) && all_values(hours) && minutes.len() == 1 =>
            {
                let minute = single_value(minutes);
                let times: Vec<String> = values(hours)
                    .into_iter()
                    .map(|hour| format_clock(hour, minute))
                    .collect();
                format!("At {}", join_english(&times))
            }
            (Field::List(minutes), Field::Any | Field::Step { start: 0, step: 1 })
                if minutes == &[Part::Value(0)] =>
            {
                String::from("Every hour")
            }
            (minute, Field::Any) => describe_minute_field(minute),
            (minute, hour) => format!("{}, {}", describe_minute_field(minute), describe_hours(hour)),
        }
    }
}

fn expand_macro(expression: &str) -> Result<&'static str, CronError> {
    match expression.to_ascii_lowercase().as_str() {
        "@yearly" | "@annually" => Ok("0 0 1 1 *"),
        "@monthly" => Ok("0 0 1 * *"),
        "@weekly" => Ok("0 0 * * 0"),
        "@daily" | "@midnight" => Ok("0 0 * * *"),
        "@hourly" => Ok("0 * * * *"),
        _ => Err(CronError::Unsupported(format!(
            "Unsupported cron macro '{expression}'"
        ))),
    }
}

impl Field {
    fn parse(raw: &str, bounds: Bounds) -> Result<Self, CronError> {
        if raw == "*" || raw == "?" {
            return Ok(Self::Any);
        }

        if let Some((base, step)) = raw.split_once('/') {
            let step: u32 = step.parse().map_err(|_| {
                CronError::Invalid(format!("Invalid step '{step}' in {} field", bounds.name))
            })?;
            if step == 0 {
                return Err(CronError::Invalid(format!(
                    "Step cannot be zero in {} field",
                    bounds.name
                )));
            }
            if base == "*" {
                return Ok(Self::Step { start: bounds.min, step });
            }
            if let Some((low, high)) = base.split_once('-') {
                let (low, high) = parse_range(base, low, high, bounds)?;
                return Ok(Self::RangeStep { low, high, step });
            }
            return Ok(Self::Step { start: parse_value(base, bounds)?, step });
        }

        let mut parts = Vec::new();
        for item in raw.split(',') {
            if let Some((low, high)) = item.split_once('-') {
                let (low, high) = parse_range(item, low, high, bounds)?;
                parts.push(Part::Range(low, high));
            } else {
                parts.push(Part::Value(parse_value(item, bounds)?));
            }
        }

        Ok(Self::List(parts))
    }
}

fn parse_range(item: &str, low: &str, high: &str, bounds: Bounds) -> Result<(u32, u32), CronError> {
    let low = parse_value(low, bounds)?;
    let high = parse_value(high, bounds)?;
    if low > high {
        return Err(CronError::Invalid(format!(
            "Invalid range '{item}' in {} field",
            bounds.name
        )));
    }
    Ok((low, high))
}

fn parse_value(raw: &str, bounds: Bounds) -> Result<u32, CronError> {
    let out_of_range = || {
        CronError::Invalid(format!(
            "Invalid value '{raw}' in {} field (expected {}-{})",
            bounds.name, bounds.min, bounds.max
        ))
    };

    if raw.is_empty() || raw.bytes().all(|b| b.is_ascii_digit()) {
        return raw
            .parse::<u32>()
            .ok()
            .filter(|v| (bounds.min..=bounds.max).contains(v))
            .ok_or_else(out_of_range);
    }

    bounds
        .names
        .and_then(|names| {
            names
                .iter()
                .position(|name| name[..3].eq_ignore_ascii_case(raw))
                .and_then(|index| u32::try_from(index).ok())
                .map(|index| index + bounds.min)
        })
        .ok_or_else(|| {
            CronError::Unsupported(format!(
                "Unsupported value '{raw}' in {} field",
                bounds.name
            ))
        })
}

fn all_values(parts: &[Part]) -> bool {
    parts.iter().all(|p| matches!(p, Part::Value(_)))
}

fn values(parts: &[Part]) -> Vec<u32> {
    parts
        .iter()
        .filter_map(|p| match p {
            Part::Value(v) => Some(*v),
            Part::Range(..) => None,
        })
        .collect()
}

fn single_value(parts: &[Part]) -> u32 {
    values(parts).first().copied().unwrap_or_default()
}

fn format_clock(hour: u32, minute: u32) -> String {
    let (display_hour, suffix) = match hour {
        0 => (12, "AM"),
        1..=11 => (hour, "AM"),
        12 => (12, "PM"),
        _ => (hour - 12, "PM"),
    };
    format!("{display_hour:02}:{minute:02} {suffix}")
}

fn describe_minutes(parts: &[Part]) -> String {
    let items: Vec<String> = parts
        .iter()
        .map(|p| match p {
            Part::Value(v) => format!("{v}"),
            Part::Range(a, b) => format!("{a} through {b}"),
        })
        .collect();
    let noun = if parts == [Part::Value(1)] { "minute" } else { "minutes" };
    format!("{} {noun}", join_english(&items))
}

fn describe_minute_field(minute: &Field) -> String {
    match minute {
        Field::Any | Field::Step { start: 0, step: 1 } => String::from("Every minute"),
        Field::Step { start: 0, step } => format!("Every {step} minutes"),
        Field::Step { start, step } => {
            format!("Every {step} minutes, starting at {start} minutes past the hour")
        }
        Field::RangeStep { low, high, step } => {
            format!("Every {step} minutes, minutes {low} through {high} past the hour")
        }
        Field::List(parts) => format!("At {} past the hour", describe_minutes(parts)),
    }
}

fn describe_hours(hour: &Field) -> String {
    match hour {
        Field::Any | Field::Step { start: 0, step: 1 } => String::from("every hour"),
        Field::Step { start: 0, step } => format!("every {step} hours"),
        Field::Step { start, step } => format!("every {step} hours, starting at {}", format_clock(*start, 0)),
        Field::RangeStep { low, high, step } => format!(
            "every {step} hours, between {} and {}",
            format_clock(*low, 0),
            format_clock(*high, 59)
        ),
        Field::List(parts) => {
            let items: Vec<String> = parts
                .iter()
                .map(|p| match p {
                    Part::Value(v) => format_clock(*v, 0),
                    Part::Range(a, b) => format!("between {} and {}", format_clock(*a, 0), format_clock(*b, 59)),
                })
                .collect();
            format!("during {}", join_english(&items))
        }
    }
}

fn describe_day_of_month(field: &Field) -> Option<String> {
    match field {
        Field::Any | Field::Step { start: 1, step: 1 } => None,
        Field::Step { start, step } => Some(format!("every {step} days, starting on day {start} of the month")),
        Field::RangeStep { low, high, step } => {
            Some(format!("every {step} days, between day {low} and {high} of the month"))
        }
        Field::List(parts) => {
            let items: Vec<String> = parts
                .iter()
                .map(|p| match p {
                    Part::Value(v) => format!("{v}"),
                    Part::Range(a, b) => format!("{a} through {b}"),
                })
                .collect();
            Some(format!("on day {} of the month", join_english(&items)))
        }
    }
}

/// Describes a month or weekday field; `first` is the number of the first name.
fn describe_named(field: &Field, names: &[&str], first: u32, prefix: &str, plural: &str) -> Option<String> {
    // Day of week 7 wraps around to Sunday.
    let name = |v: u32| {
        let index = usize::try_from(v.saturating_sub(first)).unwrap_or_default() % names.len();
        names[index].to_string()
    };

    match field {
        Field::Any | Field::Step { step: 1, .. } => None,
        Field::Step { step, .. } => Some(format!("every {step} {plural}")),
        Field::RangeStep { low, high, step } => Some(format!(
            "every {step} {plural}, {} through {}",
            name(*low),
            name(*high)
        )),
        Field::List(parts) => {
            let items: Vec<String> = parts
                .iter()
                .map(|p| match p {
                    Part::Value(v) => name(*v),
                    Part::Range(a, b) => format!("{} through {}", name(*a), name(*b)),
                })
                .collect();
            Some(format!("{prefix} {}", join_english(&items)))
        }
    }
}

fn join_english(items: &[String]) -> String {
    match items {
        [] => String::new(),
        [only] => only.clone(),
        [init @ .., last] => format!("{} and {last}", init.join(", ")),
    }
}

/// Describes a cron expression, returning `None` when it cannot be parsed.
#[must_use]
pub fn describe(expression: &str) -> Option<String> {
    CronExpression::parse(expression).ok().map(|c| c.describe())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hourly() {
        assert_eq!(describe("0 */1 * * *").as_deref(), Some("Every hour"));
        assert_eq!(describe("0 * * * *").as_deref(), Some("Every hour"));
    }

    #[test]
    fn test_fixed_times() {
        assert_eq!(describe("0 2 * * *").as_deref(), Some("At 02:00 AM"));
        assert_eq!(
            describe("0 9,17,20 * * *").as_deref(),
            Some("At 09:00 AM, 05:00 PM and 08:00 PM")
        );
        assert_eq!(describe("30 0 * * *").as_deref(), Some("At 12:30 AM"));
    }

    #[test]
    fn test_weekday_and_month_qualifiers() {
        assert_eq!(
            describe("0 8 * * 1-5").as_deref(),
            Some("At 08:00 AM, only on Monday through Friday")
        );
        assert_eq!(
            describe("15 6 1 jan *").as_deref(),
            Some("At 06:15 AM, on day 1 of the month, only in January")
        );
    }

    #[test]
    fn test_minute_steps() {
        assert_eq!(describe("*/15 * * * *").as_deref(), Some("Every 15 minutes"));
        assert_eq!(describe("* * * * *").as_deref(), Some("Every minute"));
    }

    #[test]
    fn test_invalid_expressions() {
        assert!(matches!(CronExpression::parse("0 2 * *"), Err(CronError::Invalid(_))));
        assert!(matches!(CronExpression::parse("61 * * * *"), Err(CronError::Invalid(_))));
        assert!(matches!(CronExpression::parse("*/0 * * * *"), Err(CronError::Invalid(_))));
        assert!(matches!(CronExpression::parse("0 17-9 * * *"), Err(CronError::Invalid(_))));
        assert!(describe("not a cron").is_none());
    }

    #[test]
    fn test_step_on_range() {
        assert_eq!(
            describe("0 9-17/2 * * *").as_deref(),
            Some("At 0 minutes past the hour, every 2 hours, between 09:00 AM and 05:59 PM")
        );
        assert_eq!(
            describe("0-30/10 * * * *").as_deref(),
            Some("Every 10 minutes, minutes 0 through 30 past the hour")
        );
    }

    #[test]
    fn test_macros() {
        assert_eq!(describe("@daily").as_deref(), Some("At 12:00 AM"));
        assert_eq!(describe("@hourly").as_deref(), Some("Every hour"));
        assert_eq!(describe("@weekly").as_deref(), Some("At 12:00 AM, only on Sunday"));
        assert_eq!(
            describe("@yearly").as_deref(),
            Some("At 12:00 AM, on day 1 of the month, only in January")
        );
        assert!(matches!(CronExpression::parse("@reboot"), Err(CronError::Unsupported(_))));
    }

    #[test]
    fn test_unsupported_syntax_has_no_description() {
        for expression in ["0 0 L * *", "0 0 15W * *", "0 0 * * 1#2", "0 0 0 * * *"] {
            assert!(
                matches!(CronExpression::parse(expression), Err(CronError::Unsupported(_))),
                "{expression}"
            );
            assert!(describe(expression).is_none());
        }
    }

    #[test]
    fn test_stepped_weekdays_and_months() {
        assert_eq!(
            describe("0 0 * * */2").as_deref(),
            Some("At 12:00 AM, every 2 days of the week")
        );
        assert_eq!(
            describe("0 0 1 */3 *").as_deref(),
            Some("At 12:00 AM, on day 1 of the month, every 3 months")
        );
        assert_eq!(
            describe("0 0 * * 1-5/2").as_deref(),
            Some("At 12:00 AM, every 2 days of the week, Monday through Friday")
        );
    }

    #[test]
    fn test_sunday_as_seven() {
        assert_eq!(describe("0 6 * * 7").as_deref(), Some("At 06:00 AM, only on Sunday"));
    }
}
