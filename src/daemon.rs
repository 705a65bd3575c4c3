use chrono::{Datelike, Local};
use notify_rust::Notification;
use std::collections::HashSet;
use std::thread;
use std::time::Duration;

use crate::database::load_prescriptions;
use crate::schedule::{generate_upcoming_doses, DoseStatus};

pub fn run_daemon() {
    println!("Daemon started. Checking for overdue doses...");
    println!("Press Ctrl+C to stop.");

    // Dose slots we've already notified about, keyed by prescription id plus
    // scheduled-time key so the same slot isn't re-notified as the schedule
    // window shifts. Cleared at midnight; stale slots age out of the window
    // on their own.
    let mut notified: HashSet<String> = HashSet::new();
    let mut current_day = Local::now().day();

    loop {
        let now_local = Local::now();

        if now_local.day() != current_day {
            notified.clear();
            current_day = now_local.day();
            println!(
                "[{}] New day detected - resetting reminder tracking",
                now_local.format("%H:%M:%S")
            );
        }

        let prescriptions = load_prescriptions();
        // One clock read anchors the whole pass
        let now = now_local.naive_local();
        let doses = generate_upcoming_doses(&prescriptions, now);

        for dose in &doses {
            let slot = format!("{}|{}", dose.prescription_id, dose.key());

            match dose.status {
                // If the dose got taken after we nagged, allow a fresh
                // reminder should it somehow become pending again
                DoseStatus::Taken => {
                    notified.remove(&slot);
                }
                DoseStatus::Upcoming => {}
                DoseStatus::Overdue => {
                    if notified.contains(&slot) {
                        continue;
                    }

                    let result = Notification::new()
                        .summary("Medication Reminder")
                        .body(&format!(
                            "Time to take: {} ({})\nScheduled for: {}",
                            dose.medication, dose.dosage, dose.scheduled_time_string
                        ))
                        .icon("medication")
                        .timeout(0) // Don't auto-dismiss
                        .show();

                    if result.is_ok() {
                        notified.insert(slot);
                        println!(
                            "[{}] Reminder sent: {} - {}",
                            now_local.format("%H:%M:%S"),
                            dose.medication,
                            dose.dosage
                        );
                    } else {
                        eprintln!(
                            "[{}] Failed to send notification for: {}",
                            now_local.format("%H:%M:%S"),
                            dose.medication
                        );
                    }
                }
            }
        }

        // Check every 60 seconds
        thread::sleep(Duration::from_secs(60));
    }
}
