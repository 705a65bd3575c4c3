use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::database::Prescription;
use crate::frequency::parse_frequency;
use crate::timeslot::{parse_time, slot_offsets};

/// How far ahead doses are generated.
pub const HORIZON_DAYS: i64 = 7;

/// How long a missed dose stays visible before it is dropped from the list.
pub const STALENESS_GRACE_MINUTES: i64 = 60;

/// Active window assumed for prescriptions without an end date.
pub const DEFAULT_COURSE_DAYS: i64 = 30;

/// Format of the keys stored in `Prescription::doses_completed`.
pub const OCCURRENCE_KEY_FORMAT: &str = "%Y-%m-%d %H:%M";

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoseStatus {
    Upcoming,
    Overdue,
    Taken,
}

impl DoseStatus {
    pub fn label(&self) -> &'static str {
        match self {
            DoseStatus::Upcoming => "upcoming",
            DoseStatus::Overdue => "overdue",
            DoseStatus::Taken => "taken",
        }
    }
}

/// One concrete scheduled instance of taking a medication.
///
/// Occurrences are recomputed on every call and never persisted; the only
/// state that survives between runs is the set of completed keys on the
/// prescription itself.
#[derive(Debug, Clone)]
pub struct DoseOccurrence {
    /// `{prescription_id}-{day_offset}-{dose_index}`, stable within one pass.
    pub id: String,
    pub prescription_id: String,
    pub medication: String,
    pub dosage: String,
    pub frequency: String,
    pub scheduled_time: NaiveDateTime,
    pub scheduled_time_string: String,
    pub time_until_dose: String,
    pub status: DoseStatus,
    pub reminder_time: &'static str,
}

impl DoseOccurrence {
    /// The key under which this occurrence is recorded when taken.
    pub fn key(&self) -> String {
        self.scheduled_time.format(OCCURRENCE_KEY_FORMAT).to_string()
    }
}

fn parse_date(date_str: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(date_str.trim(), DATE_FORMAT).ok()
}

/// Expand prescriptions into every dose occurrence over the next 7 days.
///
/// The result is a pure function of the input and `now`: callers must read
/// the clock once per pass (`Local::now().naive_local()`) so the
/// upcoming/overdue split stays consistent across the whole list.
/// Prescriptions with a missing or unparseable start date are skipped rather
/// than failing the whole list.
pub fn generate_upcoming_doses(
    prescriptions: &[Prescription],
    now: NaiveDateTime,
) -> Vec<DoseOccurrence> {
    let mut doses = Vec::new();

    for rx in prescriptions {
        expand_prescription(rx, now, &mut doses);
    }

    // Chronological, with prescription id then occurrence id breaking exact
    // time collisions between different medications.
    doses.sort_by(|a, b| {
        a.scheduled_time
            .cmp(&b.scheduled_time)
            .then_with(|| a.prescription_id.cmp(&b.prescription_id))
            .then_with(|| a.id.cmp(&b.id))
    });

    doses
}

fn expand_prescription(rx: &Prescription, now: NaiveDateTime, out: &mut Vec<DoseOccurrence>) {
    let Some(start) = parse_date(&rx.start_date) else {
        return;
    };

    // End of the active range: end of the last day, or a 30-day window when
    // the prescription is open-ended. A present but malformed end date skips
    // the prescription.
    let end = if rx.end_date.trim().is_empty() {
        now + Duration::days(DEFAULT_COURSE_DAYS)
    } else {
        let Some(end_day) = parse_date(&rx.end_date) else {
            return;
        };
        let Some(end) = end_day.and_hms_opt(23, 59, 59) else {
            return;
        };
        end
    };

    if end < now {
        return; // course already finished
    }

    let doses_per_day = parse_frequency(&rx.frequency);
    let anchor = if rx.time.trim().is_empty() {
        None
    } else {
        // An unparseable anchor degrades to the spread-from-midnight layout.
        parse_time(&rx.time)
    };
    let offsets = slot_offsets(anchor, doses_per_day);

    let today = now.date();
    let horizon = now + Duration::days(HORIZON_DAYS);
    let grace = now - Duration::minutes(STALENESS_GRACE_MINUTES);

    for day_offset in 0..HORIZON_DAYS {
        let current_day = today + Duration::days(day_offset);
        if current_day < start {
            continue; // not active yet that day
        }
        let Some(day_start) = current_day.and_hms_opt(0, 0, 0) else {
            continue;
        };
        if day_start > end {
            continue; // past the end of the course
        }

        for (dose_index, offset_minutes) in offsets.iter().enumerate() {
            let scheduled = day_start + Duration::seconds((offset_minutes * 60.0).round() as i64);

            if scheduled < grace {
                continue; // too long past to be worth showing
            }
            // Anchored slots can roll past midnight; keep them inside the
            // course range and the 7-day window.
            if scheduled > end || scheduled > horizon {
                continue;
            }

            let key = scheduled.format(OCCURRENCE_KEY_FORMAT).to_string();
            let status = if rx.doses_completed.contains(&key) {
                DoseStatus::Taken
            } else if scheduled < now {
                DoseStatus::Overdue
            } else {
                DoseStatus::Upcoming
            };

            out.push(DoseOccurrence {
                id: format!("{}-{}-{}", rx.id, day_offset, dose_index),
                prescription_id: rx.id.clone(),
                medication: rx.name.clone(),
                dosage: rx.dosage.clone(),
                frequency: rx.frequency.clone(),
                scheduled_time: scheduled,
                scheduled_time_string: scheduled.format("%a %b %e, %H:%M").to_string(),
                time_until_dose: time_until(scheduled, now),
                status,
                reminder_time: "30 minutes before",
            });
        }
    }
}

/// Human-readable countdown to a scheduled time.
pub fn time_until(scheduled: NaiveDateTime, now: NaiveDateTime) -> String {
    // Floor division so anything past due, even by seconds, reads as overdue.
    let diff_minutes = (scheduled - now).num_seconds().div_euclid(60);

    if diff_minutes < 0 {
        return "Overdue".to_string();
    }
    if diff_minutes < 60 {
        return format!("in {} minutes", diff_minutes);
    }
    if diff_minutes < 1440 {
        return format!("in {}h {}m", diff_minutes / 60, diff_minutes % 60);
    }

    let days = diff_minutes / 1440;
    if days == 1 {
        "in 1 day".to_string()
    } else {
        format!("in {} days", days)
    }
}

/// Print the upcoming-dose list for all active prescriptions.
pub fn display_upcoming(limit: Option<usize>) {
    let prescriptions = crate::database::load_prescriptions();

    if prescriptions.is_empty() {
        println!("No active prescriptions found.");
        return;
    }

    let now = chrono::Local::now().naive_local();
    let doses = generate_upcoming_doses(&prescriptions, now);

    if doses.is_empty() {
        println!("No doses scheduled in the next {} days.", HORIZON_DAYS);
        return;
    }

    let shown = limit.unwrap_or(doses.len()).min(doses.len());

    println!("\nUpcoming Doses (next {} days):", HORIZON_DAYS);
    println!("{}", "=".repeat(60));

    for dose in doses.iter().take(shown) {
        println!("\n{} ({}) - {}", dose.medication, dose.dosage, dose.frequency);
        println!("  When:   {}", dose.scheduled_time_string);
        println!("  Status: {}", dose.status.label());
        match dose.status {
            DoseStatus::Upcoming => {
                println!("  Due:    {}", dose.time_until_dose);
                println!("  Remind: {}", dose.reminder_time);
            }
            DoseStatus::Overdue => {
                println!("  Due:    now (mark with: medsched take {})", dose.medication)
            }
            DoseStatus::Taken => {}
        }
    }

    if shown < doses.len() {
        println!("\n... and {} more", doses.len() - shown);
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn rx(id: &str, frequency: &str, start: &str, end: &str, time: &str) -> Prescription {
        Prescription {
            id: id.to_string(),
            name: format!("med-{}", id),
            dosage: "500 mg".to_string(),
            frequency: frequency.to_string(),
            start_date: start.to_string(),
            end_date: end.to_string(),
            time: time.to_string(),
            doses_completed: BTreeSet::new(),
            notes: None,
        }
    }

    fn at(date: &str, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn test_anchored_twice_daily_three_day_course() {
        let p = rx("a", "twice a day", "2025-06-01", "2025-06-03", "08:00");
        let now = at("2025-06-01", 7, 0);

        let doses = generate_upcoming_doses(&[p], now);
        assert_eq!(doses.len(), 6);

        assert_eq!(doses[0].scheduled_time, at("2025-06-01", 8, 0));
        assert_eq!(doses[1].scheduled_time, at("2025-06-01", 20, 0));
        assert_eq!(doses[2].scheduled_time, at("2025-06-02", 8, 0));
        assert_eq!(doses[5].scheduled_time, at("2025-06-03", 20, 0));
        assert!(doses.iter().all(|d| d.status == DoseStatus::Upcoming));
    }

    #[test]
    fn test_unanchored_slots_spread_from_midnight() {
        let p = rx("b", "3 times/day", "2025-06-01", "", "");
        let now = at("2025-06-01", 0, 0);

        let doses = generate_upcoming_doses(&[p], now);
        // 3 slots per day over the whole 7-day horizon
        assert_eq!(doses.len(), 21);
        assert_eq!(doses[0].scheduled_time, at("2025-06-01", 0, 0));
        assert_eq!(doses[1].scheduled_time, at("2025-06-01", 8, 0));
        assert_eq!(doses[2].scheduled_time, at("2025-06-01", 16, 0));
    }

    #[test]
    fn test_expired_prescription_skipped() {
        let p = rx("c", "once daily", "2025-05-01", "2025-05-31", "08:00");
        let now = at("2025-06-01", 9, 0);
        assert!(generate_upcoming_doses(&[p], now).is_empty());
    }

    #[test]
    fn test_missing_start_date_skipped() {
        let p = rx("d", "once daily", "", "", "08:00");
        let now = at("2025-06-01", 9, 0);
        assert!(generate_upcoming_doses(&[p], now).is_empty());

        let p = rx("d", "once daily", "not-a-date", "", "08:00");
        assert!(generate_upcoming_doses(&[p], now).is_empty());
    }

    #[test]
    fn test_stale_dose_dropped_after_grace() {
        // Dose was 90 minutes ago: outside the 60-minute grace, gone.
        let p = rx("e", "once daily", "2025-06-01", "", "08:00");
        let now = at("2025-06-01", 9, 30);

        let doses = generate_upcoming_doses(&[p], now);
        assert_eq!(doses.len(), 6); // days 1..7 only
        assert!(doses.iter().all(|d| d.scheduled_time != at("2025-06-01", 8, 0)));
    }

    #[test]
    fn test_recent_past_dose_is_overdue() {
        let p = rx("f", "once daily", "2025-06-01", "", "08:00");
        let now = at("2025-06-01", 8, 10);

        let doses = generate_upcoming_doses(&[p], now);
        assert_eq!(doses[0].scheduled_time, at("2025-06-01", 8, 0));
        assert_eq!(doses[0].status, DoseStatus::Overdue);
        assert_eq!(doses[0].time_until_dose, "Overdue");
    }

    #[test]
    fn test_completed_key_marks_taken() {
        let mut p = rx("g", "once daily", "2025-06-01", "", "08:00");
        p.doses_completed.insert("2025-06-02 08:00".to_string());
        let now = at("2025-06-01", 7, 0);

        let doses = generate_upcoming_doses(&[p], now);
        let tomorrow = doses
            .iter()
            .find(|d| d.scheduled_time == at("2025-06-02", 8, 0))
            .unwrap();
        // Taken wins even for a dose still in the future
        assert_eq!(tomorrow.status, DoseStatus::Taken);
        assert_eq!(tomorrow.key(), "2025-06-02 08:00");
        assert!(doses
            .iter()
            .filter(|d| d.scheduled_time != at("2025-06-02", 8, 0))
            .all(|d| d.status == DoseStatus::Upcoming));
    }

    #[test]
    fn test_not_yet_started_days_skipped() {
        let p = rx("h", "once daily", "2025-06-04", "", "09:00");
        let now = at("2025-06-01", 7, 0);

        let doses = generate_upcoming_doses(&[p], now);
        // Active only on days 3..7 of the window
        assert_eq!(doses.len(), 4);
        assert_eq!(doses[0].scheduled_time, at("2025-06-04", 9, 0));
    }

    #[test]
    fn test_determinism_and_sort_order() {
        let a = rx("a", "twice a day", "2025-06-01", "", "09:00");
        let b = rx("b", "every 8 hours", "2025-06-01", "", "");
        let now = at("2025-06-01", 6, 30);

        let first = generate_upcoming_doses(&[a.clone(), b.clone()], now);
        let second = generate_upcoming_doses(&[a, b], now);

        assert_eq!(first.len(), second.len());
        for (x, y) in first.iter().zip(second.iter()) {
            assert_eq!(x.id, y.id);
            assert_eq!(x.scheduled_time, y.scheduled_time);
        }
        for pair in first.windows(2) {
            assert!(pair[0].scheduled_time <= pair[1].scheduled_time);
        }
    }

    #[test]
    fn test_same_time_tie_breaks_by_prescription_id() {
        let a = rx("zzz", "once daily", "2025-06-01", "", "08:00");
        let b = rx("aaa", "once daily", "2025-06-01", "", "08:00");
        let now = at("2025-06-01", 7, 0);

        let doses = generate_upcoming_doses(&[a, b], now);
        assert_eq!(doses[0].prescription_id, "aaa");
        assert_eq!(doses[1].prescription_id, "zzz");
    }

    #[test]
    fn test_staleness_and_horizon_bounds() {
        // Late anchor with two doses/day rolls the second slot past midnight.
        let a = rx("i", "twice a day", "2025-05-20", "", "23:00");
        let b = rx("j", "4 times a day", "2025-06-01", "", "");
        let now = at("2025-06-01", 10, 15);

        let doses = generate_upcoming_doses(&[a, b], now);
        assert!(!doses.is_empty());
        let grace = now - Duration::minutes(STALENESS_GRACE_MINUTES);
        let horizon = now + Duration::days(HORIZON_DAYS);
        for dose in &doses {
            assert!(dose.scheduled_time >= grace);
            assert!(dose.scheduled_time <= horizon);
        }
    }

    #[test]
    fn test_end_date_bounds_rolled_over_slots() {
        // Second daily slot lands at 08:00 the next day; it must not escape
        // past the end of the course.
        let p = rx("k", "twice a day", "2025-06-01", "2025-06-01", "20:00");
        let now = at("2025-06-01", 19, 0);

        let doses = generate_upcoming_doses(&[p], now);
        assert_eq!(doses.len(), 1);
        assert_eq!(doses[0].scheduled_time, at("2025-06-01", 20, 0));
    }

    #[test]
    fn test_occurrence_id_format() {
        let p = rx("rx9", "twice a day", "2025-06-01", "", "08:00");
        let now = at("2025-06-01", 7, 0);

        let doses = generate_upcoming_doses(&[p], now);
        assert_eq!(doses[0].id, "rx9-0-0");
        assert_eq!(doses[1].id, "rx9-0-1");
        assert_eq!(doses[2].id, "rx9-1-0");
    }

    #[test]
    fn test_time_until_buckets() {
        let now = at("2025-06-01", 12, 0);

        assert_eq!(time_until(at("2025-06-01", 11, 59), now), "Overdue");
        assert_eq!(time_until(at("2025-06-01", 12, 0), now), "in 0 minutes");
        assert_eq!(time_until(at("2025-06-01", 12, 5), now), "in 5 minutes");
        assert_eq!(time_until(at("2025-06-01", 12, 59), now), "in 59 minutes");
        assert_eq!(time_until(at("2025-06-01", 13, 30), now), "in 1h 30m");
        assert_eq!(time_until(at("2025-06-02", 11, 59), now), "in 23h 59m");
        assert_eq!(time_until(at("2025-06-02", 12, 0), now), "in 1 day");
        assert_eq!(time_until(at("2025-06-03", 12, 0), now), "in 2 days");
        assert_eq!(time_until(at("2025-06-04", 13, 0), now), "in 3 days");
    }
}
