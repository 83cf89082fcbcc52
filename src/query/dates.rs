//! Due Expressions and Date Windows
//!
//! Parses the value of a `due:` token into a [`DueKind`] and resolves it,
//! together with the metric windows, against an injected "today".
//!
//! # Supported Syntax
//!
//! ```text
//! due:today      due exactly today
//! due:tomorrow   due exactly tomorrow
//! due:+7         due between today and 7 days from now
//! due:eow        due between today and the coming Sunday
//! due:eom        due between today and the last day of this month
//! due:3m         due between today and 3 months from now
//! due:20241225   due exactly on that date
//! due:1225       due exactly on Dec 25 (year chosen by policy)
//! ```

use crate::query::ast::DueKind;
use chrono::{Datelike, Days, Months, NaiveDate};
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while_m_n},
    character::complete::{char, digit1},
    combinator::{all_consuming, map_opt, map_res, value},
    sequence::{preceded, terminated},
    IResult,
};
use serde::{Deserialize, Serialize};

/// What a `mmdd` date means once that day has passed this year
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PastMonthDay {
    /// Roll over to the same day next year
    #[default]
    NextYear,
    /// Keep the (past) day in the current year
    CurrentYear,
}

/// Evaluation-time date context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalContext {
    pub today: NaiveDate,
    pub past_month_day: PastMonthDay,
}

impl EvalContext {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today,
            past_month_day: PastMonthDay::default(),
        }
    }

    /// Builder: set the `mmdd` rollover policy
    pub fn past_month_day(mut self, policy: PastMonthDay) -> Self {
        self.past_month_day = policy;
        self
    }
}

/// Inclusive date interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// A single day
    pub fn day(date: NaiveDate) -> Self {
        Self::new(date, date)
    }

    /// Monday through Sunday containing `date`
    pub fn week(date: NaiveDate) -> Self {
        let since_monday = date.weekday().num_days_from_monday() as u64;
        let monday = date - Days::new(since_monday);
        Self::new(monday, monday + Days::new(6))
    }

    /// The calendar month containing `date`
    pub fn month(date: NaiveDate) -> Self {
        let first = date.with_day(1).unwrap_or(date);
        Self::new(first, end_of_month(date))
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// Parse the text after `due:`; `None` if it is not a supported expression
pub fn parse_due(expr: &str) -> Option<DueKind> {
    all_consuming(due_expression)(expr).ok().map(|(_, kind)| kind)
}

fn due_expression(input: &str) -> IResult<&str, DueKind> {
    alt((
        value(DueKind::Today, tag("today")),
        value(DueKind::Tomorrow, tag("tomorrow")),
        value(DueKind::EndOfWeek, tag("eow")),
        value(DueKind::EndOfMonth, tag("eom")),
        parse_within_days,
        parse_within_months,
        parse_full_date,
        parse_month_day,
    ))(input)
}

/// `+N`
fn parse_within_days(input: &str) -> IResult<&str, DueKind> {
    map_res(preceded(char('+'), digit1), |s: &str| {
        s.parse::<u32>().map(|days| DueKind::WithinDays { days })
    })(input)
}

/// `Nm`
fn parse_within_months(input: &str) -> IResult<&str, DueKind> {
    map_res(terminated(digit1, char('m')), |s: &str| {
        s.parse::<u32>().map(|months| DueKind::WithinMonths { months })
    })(input)
}

/// `yyyymmdd`
fn parse_full_date(input: &str) -> IResult<&str, DueKind> {
    map_opt(take_while_m_n(8, 8, |c: char| c.is_ascii_digit()), |s: &str| {
        let year: i32 = s[..4].parse().ok()?;
        let month: u32 = s[4..6].parse().ok()?;
        let day: u32 = s[6..].parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, day).map(|date| DueKind::On { date })
    })(input)
}

/// `mmdd`, validated against a leap year so that `0229` is accepted
fn parse_month_day(input: &str) -> IResult<&str, DueKind> {
    map_opt(take_while_m_n(4, 4, |c: char| c.is_ascii_digit()), |s: &str| {
        let month: u32 = s[..2].parse().ok()?;
        let day: u32 = s[2..].parse().ok()?;
        NaiveDate::from_ymd_opt(2000, month, day)?;
        Some(DueKind::MonthDay { month, day })
    })(input)
}

/// Last day of the month containing `date`
pub fn end_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1)
        .and_then(|first| first.checked_add_months(Months::new(1)))
        .and_then(|next| next.pred_opt())
        .unwrap_or(date)
}

/// The coming Sunday, or `date` itself when it is a Sunday
pub fn end_of_week(date: NaiveDate) -> NaiveDate {
    DateWindow::week(date).end
}

/// Build a date, stepping back to the month's last valid day (Feb 29 → Feb 28)
fn ymd_or_last(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    (1..=day)
        .rev()
        .find_map(|d| NaiveDate::from_ymd_opt(year, month, d))
}

impl DueKind {
    /// The dates this expression selects, given today's date
    pub fn window(&self, ctx: &EvalContext) -> Option<DateWindow> {
        let today = ctx.today;
        let window = match *self {
            DueKind::Today => DateWindow::day(today),
            DueKind::Tomorrow => DateWindow::day(today.succ_opt()?),
            DueKind::WithinDays { days } => {
                DateWindow::new(today, today.checked_add_days(Days::new(days as u64))?)
            }
            DueKind::EndOfWeek => DateWindow::new(today, end_of_week(today)),
            DueKind::EndOfMonth => DateWindow::new(today, end_of_month(today)),
            DueKind::WithinMonths { months } => {
                DateWindow::new(today, today.checked_add_months(Months::new(months))?)
            }
            DueKind::On { date } => DateWindow::day(date),
            DueKind::MonthDay { month, day } => {
                let this_year = ymd_or_last(today.year(), month, day)?;
                let date = if this_year < today && ctx.past_month_day == PastMonthDay::NextYear {
                    ymd_or_last(today.year() + 1, month, day)?
                } else {
                    this_year
                };
                DateWindow::day(date)
            }
        };
        Some(window)
    }

    /// Whether a due date satisfies this expression
    pub fn matches(&self, due: NaiveDate, ctx: &EvalContext) -> bool {
        self.window(ctx).map(|w| w.contains(due)).unwrap_or(false)
    }
}
