//! Cron expressions for job schedules.
//!
//! Accepts the standard five-field form (`minute hour day-of-month month
//! day-of-week`) and the six-field form with a leading seconds field.
//! Day-of-week numbers run 0-7 with both 0 and 7 meaning Sunday, and
//! three-letter names are accepted. When day-of-month and day-of-week are
//! both restricted, a time matches if either one matches.
//!
//! Matching is delegated to the `cron` crate. Expressions are normalised
//! first: five-field forms gain a `0` seconds field, numeric weekdays are
//! rewritten as names, and an OR of the two day fields is expressed as two
//! schedules whose earliest next instant wins.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule;
use thiserror::Error;

const DAY_NAMES: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

/// A cron expression that failed to parse or can never fire.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Cron: {0}")]
pub struct CronError(pub String);

/// A parsed cron expression.
#[derive(Clone)]
pub struct CronSpec {
    expr: String,
    schedules: Vec<Schedule>,
}

impl fmt::Debug for CronSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CronSpec").field("expr", &self.expr).finish()
    }
}

impl CronSpec {
    /// Parse a five- or six-field expression.
    ///
    /// # Errors
    ///
    /// Returns [`CronError`] for malformed fields, out-of-range values, and
    /// expressions without any future match.
    pub fn parse(expr: &str) -> Result<Self, CronError> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        let mut fields: Vec<String> = match fields.len() {
            5 => std::iter::once("0")
                .chain(fields.iter().copied())
                .map(str::to_string)
                .collect(),
            6 => fields.iter().map(|f| f.to_string()).collect(),
            n => {
                return Err(CronError(format!(
                    "Expected 5 or 6 fields, found {}: {}",
                    n,
                    expr.trim()
                )));
            }
        };

        for field in &fields {
            check_atoms(field)?;
        }

        // A day field written with a leading `*` (including `*/N`) makes the
        // two day fields combine with AND; its own step still applies.
        let dom_restricted = is_restricted(&fields[3]);
        let dow_restricted = is_restricted(&fields[5]);
        let dow = normalize_day_of_week(&fields[5])?;
        if fields[3] == "?" {
            fields[3] = "*".to_string();
        }

        let schedules = if dom_restricted && dow_restricted {
            let by_month_day = build_schedule(&fields, &fields[3], "*")?;
            let by_week_day = build_schedule(&fields, "*", &dow)?;
            vec![by_month_day, by_week_day]
        } else {
            vec![build_schedule(&fields, &fields[3], &dow)?]
        };

        let spec = Self {
            expr: expr.trim().to_string(),
            schedules,
        };
        if spec.next_after(Utc::now()).is_none() {
            return Err(CronError(format!(
                "Expression never fires: {}",
                spec.expr
            )));
        }
        Ok(spec)
    }

    /// The expression as it was written.
    pub fn expr(&self) -> &str {
        &self.expr
    }

    /// The first matching instant strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedules
            .iter()
            .filter_map(|schedule| schedule.after(&after).next())
            .min()
    }
}

impl FromStr for CronSpec {
    type Err = CronError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn is_restricted(field: &str) -> bool {
    !(field.starts_with('*') || field == "?")
}

fn build_schedule(fields: &[String], dom: &str, dow: &str) -> Result<Schedule, CronError> {
    let normalized = format!(
        "{} {} {} {} {} {}",
        fields[0], fields[1], fields[2], dom, fields[4], dow
    );
    Schedule::from_str(&normalized).map_err(|e| CronError(e.to_string()))
}

/// Reject atoms that are neither wildcards, numbers nor names.
fn check_atoms(field: &str) -> Result<(), CronError> {
    for item in field.split(',') {
        let (base, step) = match item.split_once('/') {
            Some((base, step)) => (base, Some(step)),
            None => (item, None),
        };
        if let Some(step) = step {
            parse_int(step)?;
        }
        if base == "*" || base == "?" {
            continue;
        }
        for atom in base.split('-') {
            if atom.is_empty() || !atom.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(parse_int_error(atom));
            }
            if atom.chars().next().is_some_and(|c| c.is_ascii_digit()) {
                parse_int(atom)?;
            }
        }
    }
    Ok(())
}

fn parse_int(atom: &str) -> Result<u32, CronError> {
    atom.parse::<u32>().map_err(|_| parse_int_error(atom))
}

fn parse_int_error(atom: &str) -> CronError {
    CronError(format!("Failed to parse int from {}", atom))
}

fn day_number(atom: &str) -> Result<u32, CronError> {
    if atom.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        let day = parse_int(atom)?;
        if day > 7 {
            return Err(CronError(format!("Day of week out of range: {}", day)));
        }
        return Ok(day);
    }
    let upper = atom.to_ascii_uppercase();
    DAY_NAMES
        .iter()
        .position(|name| upper.starts_with(name))
        .map(|pos| pos as u32)
        .ok_or_else(|| CronError(format!("Invalid day of week: {}", atom)))
}

/// Rewrite a day-of-week field so Sunday is 0 or 7 and every day is a name.
pub(crate) fn normalize_day_of_week(field: &str) -> Result<String, CronError> {
    if field == "*" || field == "?" {
        return Ok("*".to_string());
    }

    let mut days = BTreeSet::new();
    for item in field.split(',') {
        let (base, step) = match item.split_once('/') {
            Some((base, step)) => (base, parse_int(step)?),
            None => (item, 1),
        };
        if step == 0 {
            return Err(CronError(format!("Step must be positive: {}", item)));
        }

        let (start, end) = if base == "*" || base == "?" {
            (0, 6)
        } else if let Some((lo, hi)) = base.split_once('-') {
            (day_number(lo)?, day_number(hi)?)
        } else {
            let day = day_number(base)?;
            if item.contains('/') { (day, 6) } else { (day, day) }
        };
        if start > end {
            return Err(CronError(format!("Invalid day of week range: {}", base)));
        }

        let mut day = start;
        while day <= end {
            days.insert(day % 7);
            day += step;
        }
    }

    if days.len() == DAY_NAMES.len() {
        return Ok("*".to_string());
    }
    Ok(days
        .into_iter()
        .map(|day| DAY_NAMES[day as usize])
        .collect::<Vec<_>>()
        .join(","))
}

#[cfg(test)]
#[path = "cron_tests.rs"]
mod tests;
