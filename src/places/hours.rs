//! "Open now" from the maps provider's weekday text.
//!
//! The text is display copy, not a schedule format, e.g.
//! `Monday: 9:00 AM – 2:00 PM, 5:00 – 10:00 PM` or `Sunday: Closed`.
//! Lines that do not parse are ignored.

use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};

const MINUTES_PER_DAY: u32 = 24 * 60;

#[derive(Debug, Clone, PartialEq, Eq)]
enum DayHours {
    Closed,
    AllDay,
    /// `(open, close)` in minutes after midnight; `close <= open` runs past midnight.
    Ranges(Vec<(u32, u32)>),
}

/// Whether the place is open at `at`, or `None` when the text has no entry for that day.
pub fn is_open_at(weekday_text: &[String], at: NaiveDateTime) -> Option<bool> {
    let days: Vec<(Weekday, DayHours)> = weekday_text.iter().filter_map(|l| parse_line(l)).collect();
    let hours_on = |day: Weekday| days.iter().find(|(d, _)| *d == day).map(|(_, h)| h);

    let now = at.hour() * 60 + at.minute();
    let today = hours_on(at.weekday())?;

    let open_today = match today {
        DayHours::Closed => false,
        DayHours::AllDay => true,
        DayHours::Ranges(ranges) => ranges.iter().any(|&(open, close)| {
            if close > open {
                open <= now && now < close
            } else {
                now >= open
            }
        }),
    };
    if open_today {
        return Some(true);
    }

    // Late-night ranges started yesterday
    let carried_over = match hours_on(at.weekday().pred()) {
        Some(DayHours::Ranges(ranges)) => ranges
            .iter()
            .any(|&(open, close)| close <= open && now < close),
        _ => false,
    };
    Some(carried_over)
}

fn parse_line(line: &str) -> Option<(Weekday, DayHours)> {
    let (day, rest) = line.split_once(':')?;
    let day: Weekday = day.trim().parse().ok()?;

    let rest: String = rest
        .chars()
        .map(|c| match c {
            '\u{202f}' | '\u{2009}' | '\u{a0}' => ' ',
            '\u{2013}' | '\u{2014}' => '-',
            other => other,
        })
        .collect();
    let rest = rest.trim();

    if rest.eq_ignore_ascii_case("closed") {
        return Some((day, DayHours::Closed));
    }
    if rest.to_ascii_lowercase().contains("24 hours") {
        return Some((day, DayHours::AllDay));
    }

    let ranges = rest
        .split(',')
        .map(parse_range)
        .collect::<Option<Vec<_>>>()?;
    Some((day, DayHours::Ranges(ranges)))
}

fn parse_range(range: &str) -> Option<(u32, u32)> {
    let (open, close) = range.split_once('-')?;
    let (close, close_meridiem) = parse_clock(close)?;
    let (open, open_meridiem) = parse_clock(open)?;

    // "5:00 - 10:00 PM" shares the closing meridiem
    let open = to_minutes(open, open_meridiem.or(close_meridiem));
    let close = to_minutes(close, close_meridiem);
    Some((open, close % MINUTES_PER_DAY))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Meridiem {
    Am,
    Pm,
}

/// `(hour, minute)` plus an optional AM/PM suffix.
fn parse_clock(text: &str) -> Option<((u32, u32), Option<Meridiem>)> {
    let text = text.trim();
    let upper = text.to_ascii_uppercase();
    let (clock, meridiem) = if let Some(clock) = upper.strip_suffix("AM") {
        (clock.trim(), Some(Meridiem::Am))
    } else if let Some(clock) = upper.strip_suffix("PM") {
        (clock.trim(), Some(Meridiem::Pm))
    } else {
        (upper.as_str(), None)
    };

    let (hour, minute) = match clock.split_once(':') {
        Some((h, m)) => (h.trim().parse().ok()?, m.trim().parse().ok()?),
        None => (clock.parse().ok()?, 0),
    };
    if hour > 24 || minute > 59 {
        return None;
    }
    Some(((hour, minute), meridiem))
}

fn to_minutes((hour, minute): (u32, u32), meridiem: Option<Meridiem>) -> u32 {
    let hour = match meridiem {
        Some(Meridiem::Am) => hour % 12,
        Some(Meridiem::Pm) => hour % 12 + 12,
        None => hour,
    };
    hour * 60 + minute
}
