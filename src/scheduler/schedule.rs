//! Schedule configuration parsing
//!
//! Turns a task's `scheduleType` plus `scheduleConfig` map into a [`Schedule`].
//! Every problem is reported here, at schedule time, never when a timer fires.

use std::str::FromStr;
use std::time::Duration;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use serde_json::Value;

use super::error::{SchedulerError, SchedulerResult};
use super::task::{ScheduleType, TaskDefinition};

/// A parsed trigger strategy
#[derive(Debug, Clone)]
pub enum Schedule {
    /// Fire now and then every period
    Interval(Duration),
    Cron(CronSchedule),
    Event { event_type: String },
    Once(DateTime<Local>),
}

impl Schedule {
    /// Parse the schedule of `task`, judging once-schedules against `now`
    pub fn parse(task: &TaskDefinition, now: DateTime<Local>) -> SchedulerResult<Schedule> {
        match task.schedule_type {
            ScheduleType::Simple => interval_period(task).map(Schedule::Interval),
            ScheduleType::Cron => {
                let expression = task
                    .config_str("cronExpression")
                    .ok_or_else(|| SchedulerError::invalid_schedule(task.id, "cron schedule requires cronExpression"))?;
                CronSchedule::parse(expression)
                    .map(Schedule::Cron)
                    .map_err(|message| SchedulerError::invalid_schedule(task.id, message))
            }
            ScheduleType::Event => {
                let event_type = task
                    .event_type()
                    .filter(|event| !event.trim().is_empty())
                    .ok_or_else(|| SchedulerError::invalid_schedule(task.id, "event schedule requires eventType"))?;
                Ok(Schedule::Event { event_type: event_type.to_string() })
            }
            ScheduleType::Once => once_time(task, now).map(Schedule::Once),
        }
    }

    pub fn schedule_type(&self) -> ScheduleType {
        match self {
            Schedule::Interval(_) => ScheduleType::Simple,
            Schedule::Cron(_) => ScheduleType::Cron,
            Schedule::Event { .. } => ScheduleType::Event,
            Schedule::Once(_) => ScheduleType::Once,
        }
    }

    /// First execution time as seen at `now`; event schedules have none
    pub fn first_execution(&self, now: DateTime<Local>) -> Option<DateTime<Local>> {
        match self {
            Schedule::Interval(_) => Some(now),
            Schedule::Cron(cron) => cron.next_after(now),
            Schedule::Event { .. } => None,
            Schedule::Once(at) => Some(*at),
        }
    }
}

/// Integer from a JSON number or a numeric string
fn integer_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn unit_seconds(unit: &str) -> Option<u64> {
    match unit.to_ascii_lowercase().as_str() {
        "seconds" => Some(1),
        "minutes" => Some(60),
        "hours" => Some(3600),
        "days" => Some(86_400),
        _ => None,
    }
}

/// Longest simple-schedule period, keeping timer deadlines representable
pub const MAX_INTERVAL_SECS: u64 = 10 * 366 * 86_400;

/// Period of a simple schedule.
///
/// `intervalUnit` + `intervalValue` win over the legacy `frequency` +
/// `interval` pair when both are complete.
pub fn interval_period(task: &TaskDefinition) -> SchedulerResult<Duration> {
    let invalid = |message: String| SchedulerError::invalid_schedule(task.id, message);

    let preferred_value = match task.schedule_config.get("intervalValue") {
        Some(value) => Some(integer_value(value).ok_or_else(|| invalid(format!("intervalValue must be a number: {}", value)))?),
        None => None,
    };
    let (unit, value) = match (task.config_str("intervalUnit"), preferred_value) {
        (Some(unit), Some(value)) => (unit, value),
        _ => {
            let legacy_value = task.schedule_config.get("interval").and_then(integer_value);
            match (task.config_str("frequency"), legacy_value) {
                (Some(unit), Some(value)) => (unit, value),
                _ => {
                    return Err(invalid(
                        "simple schedule requires intervalUnit+intervalValue or frequency+interval".to_string(),
                    ))
                }
            }
        }
    };

    let seconds = unit_seconds(unit).ok_or_else(|| invalid(format!("unsupported interval unit: {}", unit)))?;
    if value <= 0 {
        return Err(invalid(format!("interval must be positive, got {}", value)));
    }
    let period = (value as u64)
        .checked_mul(seconds)
        .filter(|secs| *secs <= MAX_INTERVAL_SECS)
        .ok_or_else(|| invalid(format!("interval of {} {} exceeds the supported maximum", value, unit)))?;
    Ok(Duration::from_secs(period))
}

/// Accepted layouts for once-schedule timestamps, after ' ' → 'T'
const LOCAL_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];

/// Parse an ISO-like local timestamp (`2026-03-01 08:30:00` or `2026-03-01T08:30:00`)
pub fn parse_local_time(text: &str) -> Option<DateTime<Local>> {
    let normalized = text.trim().replace(' ', "T");
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(with_offset.with_timezone(&Local));
    }
    LOCAL_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(&normalized, format).ok())
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
}

/// Execution time of a once-schedule; times before `now` are rejected
pub fn once_time(task: &TaskDefinition, now: DateTime<Local>) -> SchedulerResult<DateTime<Local>> {
    let text = task
        .config_str("executionTime")
        .or_else(|| task.config_str("startTime"))
        .ok_or_else(|| SchedulerError::invalid_schedule(task.id, "once schedule requires executionTime or startTime"))?;
    let at = parse_local_time(text)
        .ok_or_else(|| SchedulerError::invalid_schedule(task.id, format!("cannot parse execution time: {}", text)))?;
    if at < now {
        return Err(SchedulerError::execution_time_in_past(task.id, text));
    }
    Ok(at)
}

/// A cron expression with seconds; `?` is read as `*` and five-field
/// expressions get a leading `0` seconds field.
#[derive(Debug, Clone)]
pub struct CronSchedule {
    expression: String,
    schedule: cron::Schedule,
}

impl CronSchedule {
    pub fn parse(expression: &str) -> Result<Self, String> {
        let normalized = expression.trim().replace('?', "*");
        let normalized = match normalized.split_whitespace().count() {
            5 => format!("0 {}", normalized),
            6 | 7 => normalized,
            n => return Err(format!("cron expression must have 5 to 7 fields, got {}: {}", n, expression)),
        };
        let schedule = cron::Schedule::from_str(&normalized)
            .map_err(|e| format!("invalid cron expression {}: {}", expression, e))?;
        Ok(Self { expression: expression.to_string(), schedule })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// The first fire time strictly after `after`
    pub fn next_after(&self, after: DateTime<Local>) -> Option<DateTime<Local>> {
        self.schedule.after(&after).next()
    }
}
