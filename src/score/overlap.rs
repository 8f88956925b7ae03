//! Weekly time-overlap engine.
//!
//! Compares a candidate shift (Monday-first weekday bitmask + daily start/end
//! time) against a user's weekly availability map and produces four
//! compatibility ratios:
//!
//! - `job_norm`: overlapped minutes / (daily shift minutes x #work days),
//!   fit from the job's point of view across its whole weekly schedule.
//! - `intersection_norm`: overlapped minutes / (daily shift minutes x #days
//!   that can actually overlap), fit restricted to eligible days.
//! - `user_fit_ratio`: overlapped minutes / total weekly available minutes,
//!   how much of the user's free time the job would cover.
//! - `time_fit`: geometric mean of the three, epsilon-offset so a single
//!   zero drags the composite down without hard-zeroing it.
//!
//! Overnight shifts (end <= start) spill into the following calendar day and
//! are matched against both days' availability.

use std::collections::BTreeMap;

/// Monday-first weekday names, matching the bitmask order and the
/// availability-map keys on the wire.
pub const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Weekly availability: weekday name -> half-open ("HH:MM", "HH:MM")
/// intervals. Intervals may arrive unsorted and overlapping; per-day overlap
/// is capped at the shift length so duplicates cannot inflate the result.
pub type Availability = BTreeMap<String, Vec<(String, String)>>;

/// Output bundle of the overlap engine. Ratios are rounded to 2 decimals,
/// minute counters stay integral.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OverlapMetrics {
    pub job_norm: f64,
    pub intersection_norm: f64,
    pub user_fit_ratio: f64,
    pub time_fit: f64,
    pub overlap_min: i64,
    pub job_total_min: i64,
    pub user_total_min: i64,
}

impl OverlapMetrics {
    /// Degraded result for malformed input (empty/bad bitmask, unparseable
    /// shift times). Scoring never fails, it zeroes out.
    pub fn zero() -> Self {
        Self::default()
    }
}

/// Parse "HH:MM" (or "HH:MM:SS", seconds ignored) into minutes since
/// midnight. Returns `None` on anything that does not look like a clock time.
fn parse_minutes(s: &str) -> Option<i64> {
    let mut parts = s.split(':');
    let h: i64 = parts.next()?.trim().parse().ok()?;
    let m: i64 = parts.next()?.trim().parse().ok()?;
    if !(0..=24).contains(&h) || !(0..=59).contains(&m) {
        return None;
    }
    Some(h * 60 + m)
}

/// Decode a 7-character Monday-first work-day bitmask into day indices.
/// Wrong length or non-binary characters yield an empty set.
pub fn parse_work_days(bits: &str) -> Vec<usize> {
    let bits = bits.trim();
    if bits.len() != 7 || !bits.chars().all(|c| c == '0' || c == '1') {
        return Vec::new();
    }
    bits.chars()
        .enumerate()
        .filter(|(_, c)| *c == '1')
        .map(|(i, _)| i)
        .collect()
}

fn interval_overlap(a_start: i64, a_end: i64, b_start: i64, b_end: i64) -> i64 {
    (a_end.min(b_end) - a_start.max(b_start)).max(0)
}

/// Minutes of a day's availability overlapping `[seg_start, seg_end)`.
/// User intervals with end <= start are skipped, not split (see DESIGN.md).
fn day_overlap(slots: &[(String, String)], seg_start: i64, seg_end: i64) -> i64 {
    if seg_end <= seg_start {
        return 0;
    }
    let mut olap = 0;
    for (s, e) in slots {
        if let (Some(s), Some(e)) = (parse_minutes(s), parse_minutes(e)) {
            if e > s {
                olap += interval_overlap(seg_start, seg_end, s, e);
            }
        }
    }
    olap
}

fn slots_minutes(slots: &[(String, String)]) -> i64 {
    let mut total = 0;
    for (s, e) in slots {
        if let (Some(s), Some(e)) = (parse_minutes(s), parse_minutes(e)) {
            if e > s {
                total += e - s;
            }
        }
    }
    total
}

/// Compute all time-fit metrics for one candidate shift against a weekly
/// availability map. Pure; malformed input degrades to all-zero metrics.
pub fn overlap_metrics(
    availability: &Availability,
    work_days_bits: &str,
    start_time: &str,
    end_time: &str,
) -> OverlapMetrics {
    let cand_days = parse_work_days(work_days_bits);
    if cand_days.is_empty() {
        return OverlapMetrics::zero();
    }

    let (c_start, mut c_end) = match (parse_minutes(start_time), parse_minutes(end_time)) {
        (Some(s), Some(e)) => (s, e),
        _ => return OverlapMetrics::zero(),
    };
    // end <= start means the shift crosses midnight into the next day.
    let overnight = c_end <= c_start;
    if overnight {
        c_end += 24 * 60;
    }
    let day_sched = c_end - c_start;

    // Per-day and weekly availability totals, computed once.
    let empty: Vec<(String, String)> = Vec::new();
    let mut user_min_by_day = [0i64; 7];
    let mut user_total_min = 0i64;
    for (i, day) in WEEKDAYS.iter().enumerate() {
        let mins = slots_minutes(availability.get(*day).unwrap_or(&empty));
        user_min_by_day[i] = mins;
        user_total_min += mins;
    }

    let mut overlap_min = 0i64;
    let mut intersection_days = 0i64;
    for &day_idx in &cand_days {
        let day_slots = availability.get(WEEKDAYS[day_idx]).unwrap_or(&empty);
        // Segment A: [c_start, min(c_end, 1440)) on the start day.
        let mut olap = day_overlap(day_slots, c_start, c_end.min(1440));
        // Segment B: overnight remainder [0, c_end - 1440) on the next day.
        let next_idx = (day_idx + 1) % 7;
        if overnight && c_end > 1440 {
            let next_slots = availability.get(WEEKDAYS[next_idx]).unwrap_or(&empty);
            olap += day_overlap(next_slots, 0, c_end - 1440);
        }
        // A single day can never contribute more than one full shift even if
        // availability intervals overlap each other.
        overlap_min += olap.min(day_sched);

        if user_min_by_day[day_idx] > 0 || (overnight && user_min_by_day[next_idx] > 0) {
            intersection_days += 1;
        }
    }

    let job_total_min = day_sched * cand_days.len() as i64;

    let job_norm = if job_total_min > 0 {
        overlap_min as f64 / job_total_min as f64
    } else {
        0.0
    };
    let inter_den = day_sched * intersection_days.max(1);
    let intersection_norm = if inter_den > 0 {
        overlap_min as f64 / inter_den as f64
    } else {
        0.0
    };
    let user_fit_ratio = if user_total_min > 0 {
        overlap_min as f64 / user_total_min as f64
    } else {
        0.0
    };

    // Geometric mean with a small epsilon so one zero metric dominates the
    // composite without locking it to exactly zero.
    let eps = 1e-6;
    let time_fit =
        ((job_norm + eps) * (intersection_norm + eps) * (user_fit_ratio + eps)).cbrt() - eps;

    OverlapMetrics {
        job_norm: super::round2(job_norm),
        intersection_norm: super::round2(intersection_norm),
        user_fit_ratio: super::round2(user_fit_ratio),
        time_fit: super::round2(time_fit),
        overlap_min,
        job_total_min,
        user_total_min,
    }
}
