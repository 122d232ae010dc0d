//! Date and time utilities exposed to the model as tools.
//!
//! Month and year arithmetic is calendar-aware: the month index is shifted
//! with Euclidean division so negative durations wrap across year boundaries,
//! and the day of month is clamped to the last valid day of the target month.
//! A year shift is a shift of twelve months, so Feb 29 plus one year lands on
//! Feb 28.
//!
//! Clamping makes month arithmetic non-invertible: Jan 31 + 1 month − 1 month
//! is Jan 28/29, not Jan 31.

use std::fmt::Write as _;
use std::str::FromStr;
use std::sync::Arc;

use chrono::format::{Item, ParseResult, Parsed, StrftimeItems};
use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, TimeDelta, Timelike};
use serde_json::{Map, Value, json};

use crate::tools::error::{ToolError, ToolsResult};
use crate::tools::registry::{Tool, ToolSchema, integer_arg, string_arg};

/// Default pattern for `get_current_datetime`.
pub const DEFAULT_CURRENT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Default input pattern for `add_duration_to_datetime`.
pub const DEFAULT_INPUT_FORMAT: &str = "%Y-%m-%d";
/// Fixed output pattern for `add_duration_to_datetime`.
pub const OUTPUT_FORMAT: &str = "%A, %B %d, %Y %I:%M:%S %p";

/// Tool name of the current-time capability.
pub const CURRENT_DATETIME_TOOL: &str = "get_current_datetime";
/// Tool name of the duration arithmetic capability.
pub const ADD_DURATION_TOOL: &str = "add_duration_to_datetime";

const DAYS_IN_MONTH: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// Source of the current local instant.
pub type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

/// Clock reading the host's local time.
#[must_use]
pub fn system_clock() -> Clock {
    Arc::new(|| Local::now().naive_local())
}

/// Unit accepted by `add_duration_to_datetime`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DurationUnit {
    /// Seconds.
    Seconds,
    /// Minutes.
    Minutes,
    /// Hours.
    Hours,
    /// Days.
    Days,
    /// Weeks.
    Weeks,
    /// Calendar months.
    Months,
    /// Calendar years.
    Years,
}

impl DurationUnit {
    /// Every supported unit.
    pub const ALL: [Self; 7] = [
        Self::Seconds,
        Self::Minutes,
        Self::Hours,
        Self::Days,
        Self::Weeks,
        Self::Months,
        Self::Years,
    ];

    /// Name used in tool arguments.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Seconds => "seconds",
            Self::Minutes => "minutes",
            Self::Hours => "hours",
            Self::Days => "days",
            Self::Weeks => "weeks",
            Self::Months => "months",
            Self::Years => "years",
        }
    }
}

impl FromStr for DurationUnit {
    type Err = ToolError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|unit| unit.as_str() == value)
            .ok_or_else(|| ToolError::UnsupportedUnit(value.to_string()))
    }
}

/// Proleptic Gregorian leap-year rule.
#[must_use]
pub const fn is_leap_year(year: i32) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

/// Number of days in `month` (1-based) of `year`.
#[must_use]
pub const fn days_in_month(year: i32, month: u32) -> u32 {
    if month == 2 && is_leap_year(year) {
        29
    } else {
        DAYS_IN_MONTH[month.saturating_sub(1) as usize % 12]
    }
}

/// Render an instant with a strftime pattern.
///
/// # Errors
/// Returns `InvalidFormat` if the pattern is empty or contains an unknown specifier.
pub fn format_datetime(instant: &NaiveDateTime, format: &str) -> ToolsResult<String> {
    if format.is_empty() {
        return Err(ToolError::InvalidFormat(
            "format string cannot be empty".to_string(),
        ));
    }

    let items: Vec<Item<'_>> = StrftimeItems::new(format).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(ToolError::InvalidFormat(format.to_string()));
    }

    let mut out = String::new();
    write!(out, "{}", instant.format_with_items(items.iter()))
        .map_err(|_| ToolError::InvalidFormat(format.to_string()))?;
    Ok(out)
}

/// Current local time rendered with `format`.
///
/// # Errors
/// Returns `InvalidFormat` if the pattern is empty or malformed.
pub fn get_current_datetime(format: &str) -> ToolsResult<String> {
    format_datetime(&Local::now().naive_local(), format)
}

/// Parse `input` against `format`.
///
/// Fields the pattern leaves out take strptime's defaults: year 1900,
/// January, day 1, midnight. So `2024-01` parsed with `%Y-%m` is
/// 2024-01-01 00:00:00.
///
/// # Errors
/// Returns `Parse` when the input does not match the pattern.
pub fn parse_datetime(input: &str, format: &str) -> ToolsResult<NaiveDateTime> {
    if format.is_empty() {
        return Err(ToolError::InvalidFormat(
            "input format cannot be empty".to_string(),
        ));
    }

    let parse_error = |source| ToolError::Parse {
        input: input.to_string(),
        format: format.to_string(),
        source,
    };

    let mut parsed = Parsed::new();
    chrono::format::parse(&mut parsed, input, StrftimeItems::new(format)).map_err(parse_error)?;
    fill_missing_fields(&mut parsed).map_err(parse_error)?;

    let date = parsed.to_naive_date().map_err(parse_error)?;
    let time = parsed.to_naive_time().map_err(parse_error)?;
    Ok(date.and_time(time))
}

fn fill_missing_fields(parsed: &mut Parsed) -> ParseResult<()> {
    let week_dated = parsed.ordinal().is_some()
        || parsed.isoweek().is_some()
        || parsed.week_from_sun().is_some()
        || parsed.week_from_mon().is_some();
    let has_year = parsed.year().is_some()
        || parsed.year_div_100().is_some()
        || parsed.year_mod_100().is_some()
        || parsed.isoyear().is_some()
        || parsed.isoyear_mod_100().is_some();

    if !has_year {
        parsed.set_year(1900)?;
    }
    if !week_dated {
        if parsed.month().is_none() {
            parsed.set_month(1)?;
        }
        if parsed.day().is_none() {
            parsed.set_day(1)?;
        }
    }

    match (parsed.hour_div_12(), parsed.hour_mod_12()) {
        (None, None) => parsed.set_hour(0)?,
        // %I without %p reads as AM.
        (None, Some(_)) => parsed.set_ampm(false)?,
        _ => {}
    }
    if parsed.minute().is_none() {
        parsed.set_minute(0)?;
    }
    if parsed.second().is_none() {
        parsed.set_second(0)?;
    }
    Ok(())
}

/// Shift `start` by a signed amount of `unit`.
///
/// # Errors
/// Returns `OutOfRange` if the result cannot be represented.
pub fn add_duration(
    start: NaiveDateTime,
    duration: i64,
    unit: DurationUnit,
) -> ToolsResult<NaiveDateTime> {
    match unit {
        DurationUnit::Seconds => shift(start, TimeDelta::try_seconds(duration)),
        DurationUnit::Minutes => shift(start, TimeDelta::try_minutes(duration)),
        DurationUnit::Hours => shift(start, TimeDelta::try_hours(duration)),
        DurationUnit::Days => shift(start, TimeDelta::try_days(duration)),
        DurationUnit::Weeks => shift(start, TimeDelta::try_weeks(duration)),
        DurationUnit::Months => add_months(start, duration),
        DurationUnit::Years => {
            let months = duration.checked_mul(12).ok_or(ToolError::OutOfRange)?;
            add_months(start, months)
        }
    }
}

fn shift(start: NaiveDateTime, delta: Option<TimeDelta>) -> ToolsResult<NaiveDateTime> {
    delta
        .and_then(|delta| start.checked_add_signed(delta))
        .ok_or(ToolError::OutOfRange)
}

fn add_months(start: NaiveDateTime, months: i64) -> ToolsResult<NaiveDateTime> {
    let total = i64::from(start.month0())
        .checked_add(months)
        .ok_or(ToolError::OutOfRange)?;
    let year = i64::from(start.year())
        .checked_add(total.div_euclid(12))
        .and_then(|year| i32::try_from(year).ok())
        .ok_or(ToolError::OutOfRange)?;
    let month = u32::try_from(total.rem_euclid(12)).map_err(|_| ToolError::OutOfRange)? + 1;
    let day = start.day().min(days_in_month(year, month));

    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| {
            date.and_hms_opt(start.hour(), start.minute(), start.second())
        })
        .ok_or(ToolError::OutOfRange)
}

/// Parse a timestamp, shift it, and render it with [`OUTPUT_FORMAT`].
///
/// # Errors
/// Returns `UnsupportedUnit` for an unknown unit, `Parse` for a mismatched
/// input, or `OutOfRange` when the result cannot be represented.
pub fn add_duration_to_datetime(
    datetime_str: &str,
    duration: i64,
    unit: &str,
    input_format: &str,
) -> ToolsResult<String> {
    let unit = DurationUnit::from_str(unit)?;
    let start = parse_datetime(datetime_str, input_format)?;
    let shifted = add_duration(start, duration, unit)?;
    format_datetime(&shifted, OUTPUT_FORMAT)
}

/// `get_current_datetime` tool bound to a clock.
pub struct CurrentDateTimeTool {
    clock: Clock,
}

impl CurrentDateTimeTool {
    /// Build the tool around `clock`.
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self { clock }
    }
}

impl Tool for CurrentDateTimeTool {
    fn name(&self) -> &str {
        CURRENT_DATETIME_TOOL
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            CURRENT_DATETIME_TOOL,
            "Get the current date and time in a specified format",
            json!({
                "type": "object",
                "properties": {
                    "format": {
                        "type": "string",
                        "description": "strftime format string (e.g., '%Y-%m-%d %H:%M:%S', '%B %d, %Y')",
                        "default": DEFAULT_CURRENT_FORMAT
                    }
                },
                "additionalProperties": false
            }),
        )
    }

    fn call(&self, arguments: &Map<String, Value>) -> ToolsResult<String> {
        let format = string_arg(CURRENT_DATETIME_TOOL, arguments, "format", Some(DEFAULT_CURRENT_FORMAT))?;
        format_datetime(&(self.clock)(), &format)
    }
}

/// `add_duration_to_datetime` tool.
pub struct AddDurationTool;

impl Tool for AddDurationTool {
    fn name(&self) -> &str {
        ADD_DURATION_TOOL
    }

    fn schema(&self) -> ToolSchema {
        let units: Vec<&str> = DurationUnit::ALL.iter().map(|unit| unit.as_str()).collect();
        ToolSchema::new(
            ADD_DURATION_TOOL,
            "Add a signed duration to a date/time and return the result as a readable date",
            json!({
                "type": "object",
                "properties": {
                    "datetime_str": {
                        "type": "string",
                        "description": "The starting date/time, matching input_format"
                    },
                    "duration": {
                        "type": "integer",
                        "description": "Amount to add; negative values subtract",
                        "default": 0
                    },
                    "unit": {
                        "type": "string",
                        "enum": units,
                        "description": "Unit of the duration",
                        "default": "days"
                    },
                    "input_format": {
                        "type": "string",
                        "description": "strftime format of datetime_str",
                        "default": DEFAULT_INPUT_FORMAT
                    }
                },
                "required": ["datetime_str"],
                "additionalProperties": false
            }),
        )
    }

    fn call(&self, arguments: &Map<String, Value>) -> ToolsResult<String> {
        let datetime_str = string_arg(ADD_DURATION_TOOL, arguments, "datetime_str", None)?;
        let duration = integer_arg(ADD_DURATION_TOOL, arguments, "duration", 0)?;
        let unit = string_arg(ADD_DURATION_TOOL, arguments, "unit", Some("days"))?;
        let input_format =
            string_arg(ADD_DURATION_TOOL, arguments, "input_format", Some(DEFAULT_INPUT_FORMAT))?;
        add_duration_to_datetime(&datetime_str, duration, &unit, &input_format)
    }
}
