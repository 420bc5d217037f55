// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Calendar boundaries for the water (daily) and sun (weekly) allowances.
//!
//! Boundaries are computed in the time zone of `now`: the reset hour is a
//! local wall-clock hour. A reset is due when the last reset happened before
//! the most recent boundary.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};

fn reset_time(hour: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour.min(23), 0, 0).unwrap_or(NaiveTime::MIN)
}

/// `date` at `hour:00:00` local. When a DST jump skips the hour the boundary
/// moves to the first instant after the gap; when the hour repeats, the
/// earlier occurrence wins.
fn local_at<Tz: TimeZone>(tz: &Tz, date: NaiveDate, hour: u32) -> DateTime<Tz> {
    let naive = date.and_time(reset_time(hour));
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
        .unwrap_or_else(|| tz.from_utc_datetime(&naive))
}

/// The most recent `reset_hour:00` at or before `now`. Before today's reset
/// hour that is yesterday's.
pub fn daily_boundary<Tz: TimeZone>(now: &DateTime<Tz>, reset_hour: u32) -> DateTime<Tz> {
    let tz = now.timezone();
    let today = now.date_naive();
    let candidate = local_at(&tz, today, reset_hour);
    if *now >= candidate {
        candidate
    } else {
        let yesterday = today.pred_opt().unwrap_or(today);
        local_at(&tz, yesterday, reset_hour)
    }
}

/// The most recent `reset_hour:00` on `week_start` at or before `now`.
pub fn weekly_boundary<Tz: TimeZone>(now: &DateTime<Tz>, reset_hour: u32, week_start: Weekday) -> DateTime<Tz> {
    let day = daily_boundary(now, reset_hour).date_naive();
    let back = (day.weekday().num_days_from_monday() + 7 - week_start.num_days_from_monday()) % 7;
    local_at(&now.timezone(), day - Duration::days(i64::from(back)), reset_hour)
}

pub fn should_reset_daily<Tz: TimeZone>(last_reset: &DateTime<Utc>, now: &DateTime<Tz>, reset_hour: u32) -> bool {
    *last_reset < daily_boundary(now, reset_hour).with_timezone(&Utc)
}

pub fn should_reset_weekly<Tz: TimeZone>(
    last_reset: &DateTime<Utc>,
    now: &DateTime<Tz>,
    reset_hour: u32,
    week_start: Weekday,
) -> bool {
    *last_reset < weekly_boundary(now, reset_hour, week_start).with_timezone(&Utc)
}

pub fn next_daily_reset<Tz: TimeZone>(now: &DateTime<Tz>, reset_hour: u32) -> DateTime<Tz> {
    let day = daily_boundary(now, reset_hour).date_naive();
    local_at(&now.timezone(), day + Duration::days(1), reset_hour)
}

pub fn next_weekly_reset<Tz: TimeZone>(now: &DateTime<Tz>, reset_hour: u32, week_start: Weekday) -> DateTime<Tz> {
    let day = weekly_boundary(now, reset_hour, week_start).date_naive();
    local_at(&now.timezone(), day + Duration::days(7), reset_hour)
}
