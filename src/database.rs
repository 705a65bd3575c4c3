use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::schedule::{generate_upcoming_doses, DoseStatus, OCCURRENCE_KEY_FORMAT};
use crate::timeslot::parse_time;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Prescription {
    pub id: String,
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    /// First active day in YYYY-MM-DD format; no doses are generated before it
    pub start_date: String,
    /// Last active day in YYYY-MM-DD format; empty means open-ended
    #[serde(default)]
    pub end_date: String,
    /// "HH:MM" anchor for the first dose of the day; empty spreads doses from midnight
    #[serde(default)]
    pub time: String,
    /// Keys ("YYYY-MM-DD HH:MM" of the scheduled slot) of doses confirmed taken
    #[serde(default)]
    pub doses_completed: BTreeSet<String>,
    pub notes: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct PrescriptionBook {
    pub prescriptions: Vec<Prescription>,
    #[serde(default)]
    pub archived: Vec<Prescription>,
}

/// Returns the path to the prescription book file.
///
/// Uses the `dirs` crate to reliably locate the home directory across platforms.
/// Falls back to `./.medsched.json` if no home directory is found.
pub fn get_data_file() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".medsched.json")
}

/// Loads the prescription book from disk.
///
/// If the file is corrupted, creates a backup and returns an empty book.
/// If the file doesn't exist, returns an empty book.
pub fn load_book() -> PrescriptionBook {
    let file_path = get_data_file();
    if !file_path.exists() {
        return PrescriptionBook::default();
    }

    let contents = match fs::read_to_string(&file_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: Failed to read prescriptions file: {}", e);
            eprintln!(
                "Using empty prescription list. Check file permissions on: {}",
                file_path.display()
            );
            return PrescriptionBook::default();
        }
    };

    if let Ok(book) = serde_json::from_str::<PrescriptionBook>(&contents) {
        return book;
    }

    eprintln!("WARNING: Prescriptions file is corrupted and cannot be parsed!");
    eprintln!("File location: {}", file_path.display());
    eprintln!("Creating backup at: {}.corrupted", file_path.display());

    let backup_path = file_path.with_extension("json.corrupted");
    if let Err(backup_err) = fs::copy(&file_path, &backup_path) {
        eprintln!("Failed to create backup: {}", backup_err);
    } else {
        eprintln!("Backup created successfully.");
    }

    eprintln!("Starting with an empty prescription book.");
    PrescriptionBook::default()
}

/// Loads only the active prescriptions from the book.
pub fn load_prescriptions() -> Vec<Prescription> {
    load_book().prescriptions
}

/// Saves the complete prescription book to disk atomically.
///
/// Uses atomic write pattern (write to temp file, then rename) to prevent
/// data corruption if interrupted. Sets file permissions to 0600 on Unix
/// systems for privacy.
pub fn save_book(book: &PrescriptionBook) {
    let file_path = get_data_file();

    let json = match serde_json::to_string_pretty(book) {
        Ok(j) => j,
        Err(e) => {
            eprintln!("Error: Failed to serialize prescription book: {}", e);
            return;
        }
    };

    let temp_path = file_path.with_extension("json.tmp");

    if let Err(e) = fs::write(&temp_path, &json) {
        eprintln!("Error: Failed to write temporary file: {}", e);
        return;
    }

    // Rename is atomic on POSIX systems
    if let Err(e) = fs::rename(&temp_path, &file_path) {
        eprintln!("Error: Failed to save prescriptions file: {}", e);
        let _ = fs::remove_file(&temp_path);
        return;
    }

    // Owner read/write only; this is medical data
    #[cfg(unix)]
    {
        if let Ok(metadata) = fs::metadata(&file_path) {
            let mut perms = metadata.permissions();
            perms.set_mode(0o600);
            if let Err(e) = fs::set_permissions(&file_path, perms) {
                eprintln!("Warning: Failed to set file permissions: {}", e);
            }
        }
    }
}

fn make_id(name: &str, now: &chrono::DateTime<chrono::Local>) -> String {
    let slug: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    format!("{}-{}", slug.trim_matches('-'), now.timestamp())
}

fn parse_date(date_str: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d").ok()
}

fn print_time_help() {
    eprintln!("Valid formats:");
    eprintln!("  - Named times: 'morning', 'noon', 'evening', 'bedtime'");
    eprintln!("  - Time format: '8:00', '08:30', '14:15'");
    eprintln!("  - Hour only: '8', '14' (defaults to :00)");
}

/// Adds a new prescription or unarchives an existing archived one.
///
/// If a prescription with the same name (case-insensitive) exists in the
/// archive, it is moved back to the active list with updated fields but its
/// completed-dose history preserved. Otherwise a fresh prescription is
/// created with a generated id.
///
/// # Validation
/// - Name, dosage, and frequency cannot be empty
/// - Time, if given, must be parseable by `timeslot::parse_time`
/// - Start and end dates must be YYYY-MM-DD; start defaults to today
/// - End date must not precede start date
/// - Name must not exist in active prescriptions
pub fn add_prescription(
    name: String,
    dosage: String,
    frequency: String,
    time: Option<String>,
    start: Option<String>,
    end: Option<String>,
    notes: Option<String>,
) {
    if name.trim().is_empty() {
        eprintln!("Error: Medication name cannot be empty!");
        return;
    }

    if dosage.trim().is_empty() {
        eprintln!("Error: Dosage cannot be empty!");
        return;
    }

    if frequency.trim().is_empty() {
        eprintln!("Error: Frequency cannot be empty!");
        return;
    }

    // Normalize the anchor time to HH:MM so the stored form is uniform
    let time = match time {
        Some(t) if !t.trim().is_empty() => match parse_time(&t) {
            Some((hour, minute)) => format!("{:02}:{:02}", hour, minute),
            None => {
                eprintln!("Error: Invalid time format '{}'", t);
                print_time_help();
                return;
            }
        },
        _ => String::new(),
    };

    let now = chrono::Local::now();

    let start_date = match start {
        Some(s) => match parse_date(&s) {
            Some(d) => d.format("%Y-%m-%d").to_string(),
            None => {
                eprintln!("Error: Invalid start date '{}' (expected YYYY-MM-DD)", s);
                return;
            }
        },
        None => now.format("%Y-%m-%d").to_string(),
    };

    let end_date = match end {
        Some(s) if !s.trim().is_empty() => match parse_date(&s) {
            Some(d) => {
                let formatted = d.format("%Y-%m-%d").to_string();
                if formatted < start_date {
                    eprintln!(
                        "Error: End date '{}' is before start date '{}'",
                        formatted, start_date
                    );
                    return;
                }
                formatted
            }
            None => {
                eprintln!("Error: Invalid end date '{}' (expected YYYY-MM-DD)", s);
                return;
            }
        },
        _ => String::new(),
    };

    let mut book = load_book();
    let name_lower = name.to_lowercase();

    if book
        .prescriptions
        .iter()
        .any(|p| p.name.to_lowercase() == name_lower)
    {
        eprintln!(
            "Error: Prescription '{}' already exists in active prescriptions!",
            name
        );
        return;
    }

    let archived_index = book
        .archived
        .iter()
        .position(|p| p.name.to_lowercase() == name_lower);

    if let Some(index) = archived_index {
        // Unarchive: move back to active, updating fields but keeping the
        // completed-dose history
        let mut rx = book.archived.remove(index);

        rx.dosage = dosage;
        rx.frequency = frequency;
        rx.time = time;
        rx.start_date = start_date;
        rx.end_date = end_date;
        rx.notes = notes;

        let history_count = rx.doses_completed.len();
        book.prescriptions.push(rx);
        save_book(&book);

        println!("Unarchived prescription: {}", name);
        if history_count > 0 {
            println!("  Restored {} completed dose(s) from archive", history_count);
            println!("  View history with: medsched history {}", name);
        }
    } else {
        let rx = Prescription {
            id: make_id(&name, &now),
            name: name.clone(),
            dosage,
            frequency,
            start_date,
            end_date,
            time,
            doses_completed: BTreeSet::new(),
            notes,
        };

        book.prescriptions.push(rx);
        save_book(&book);
        println!("Added prescription: {}", name);
    }
}

/// Removes a prescription from the active list and archives it.
///
/// The completed-dose history travels with it; re-adding the same name later
/// unarchives it. Nothing is permanently deleted.
pub fn remove_prescription(name: String) {
    let mut book = load_book();
    let name_lower = name.to_lowercase();

    let mut found_rx: Option<Prescription> = None;
    book.prescriptions.retain(|p| {
        if p.name.to_lowercase() == name_lower {
            found_rx = Some(p.clone());
            false
        } else {
            true
        }
    });

    if let Some(rx) = found_rx {
        book.archived.push(rx.clone());
        save_book(&book);

        let history_count = rx.doses_completed.len();
        println!("Archived prescription: {}", name);
        if history_count > 0 {
            println!("  Preserved {} completed dose(s) in archive", history_count);
            println!(
                "  View history anytime with: medsched history {} --archived",
                name
            );
        }
    } else {
        println!("Prescription '{}' not found!", name);
    }
}

pub fn edit_prescription(
    name: String,
    new_dosage: Option<String>,
    new_frequency: Option<String>,
    new_time: Option<String>,
    new_start: Option<String>,
    new_end: Option<String>,
    new_notes: Option<String>,
) {
    let mut book = load_book();
    let mut found = false;
    let name_lower = name.to_lowercase();

    // Validate and normalize the new time if provided (empty string clears it)
    let new_time = match new_time {
        Some(t) if t.trim().is_empty() => Some(String::new()),
        Some(t) => match parse_time(&t) {
            Some((hour, minute)) => Some(format!("{:02}:{:02}", hour, minute)),
            None => {
                eprintln!("Error: Invalid time format '{}'", t);
                print_time_help();
                return;
            }
        },
        None => None,
    };

    if let Some(ref dosage) = new_dosage {
        if dosage.trim().is_empty() {
            eprintln!("Error: Dosage cannot be empty!");
            return;
        }
    }

    if let Some(ref freq) = new_frequency {
        if freq.trim().is_empty() {
            eprintln!("Error: Frequency cannot be empty!");
            return;
        }
    }

    if let Some(ref s) = new_start {
        if parse_date(s).is_none() {
            eprintln!("Error: Invalid start date '{}' (expected YYYY-MM-DD)", s);
            return;
        }
    }

    if let Some(ref s) = new_end {
        if !s.trim().is_empty() && parse_date(s).is_none() {
            eprintln!("Error: Invalid end date '{}' (expected YYYY-MM-DD)", s);
            return;
        }
    }

    for rx in book.prescriptions.iter_mut() {
        if rx.name.to_lowercase() == name_lower {
            let mut changes = Vec::new();

            if let Some(dosage) = new_dosage {
                rx.dosage = dosage.clone();
                changes.push(format!("dosage -> {}", dosage));
            }

            if let Some(freq) = new_frequency {
                rx.frequency = freq.clone();
                changes.push(format!("frequency -> {}", freq));
            }

            if let Some(time) = new_time {
                if time.is_empty() {
                    rx.time = String::new();
                    changes.push("time -> (cleared)".to_string());
                } else {
                    rx.time = time.clone();
                    changes.push(format!("time -> {}", time));
                }
            }

            if let Some(start) = new_start {
                rx.start_date = start.clone();
                changes.push(format!("start -> {}", start));
            }

            if let Some(end) = new_end {
                if end.trim().is_empty() {
                    rx.end_date = String::new();
                    changes.push("end -> (open-ended)".to_string());
                } else {
                    rx.end_date = end.clone();
                    changes.push(format!("end -> {}", end));
                }
            }

            if let Some(notes) = new_notes {
                if notes.is_empty() {
                    rx.notes = None;
                    changes.push("notes -> (cleared)".to_string());
                } else {
                    rx.notes = Some(notes.clone());
                    changes.push(format!("notes -> {}", notes));
                }
            }

            if changes.is_empty() {
                println!("No changes specified for '{}'", rx.name);
                return;
            }

            found = true;
            println!("Updated '{}': {}", rx.name, changes.join(", "));
            break;
        }
    }

    if found {
        save_book(&book);
    } else {
        println!("Prescription '{}' not found!", name);
    }
}

pub fn list_prescriptions(archived: bool) {
    let book = load_book();

    let prescriptions = if archived {
        &book.archived
    } else {
        &book.prescriptions
    };

    if prescriptions.is_empty() {
        if archived {
            println!("No archived prescriptions found.");
        } else {
            println!("No active prescriptions found.");
        }
        return;
    }

    if archived {
        println!("\nArchived Prescriptions:");
    } else {
        println!("\nActive Prescriptions:");
    }
    println!("{}", "=".repeat(60));

    for rx in prescriptions {
        println!("\n{}", rx.name);
        println!("  Dosage:    {}", rx.dosage);
        println!("  Frequency: {}", rx.frequency);
        if !rx.time.is_empty() {
            println!("  Time:      {}", rx.time);
        }
        println!("  Starts:    {}", rx.start_date);
        if !rx.end_date.is_empty() {
            println!("  Ends:      {}", rx.end_date);
        }

        if let Some(notes) = &rx.notes {
            println!("  Notes:     {}", notes);
        }

        if !rx.doses_completed.is_empty() {
            println!("  History:   {} dose(s) taken", rx.doses_completed.len());
        }
    }
    println!();
}

/// Marks the next pending dose of a prescription as taken.
///
/// Regenerates the upcoming schedule and records the earliest occurrence that
/// isn't already taken; an overdue dose, if one is still visible, is always
/// the earliest.
pub fn take_dose(name: String) {
    let mut book = load_book();
    let name_lower = name.to_lowercase();

    let Some(index) = book
        .prescriptions
        .iter()
        .position(|p| p.name.to_lowercase() == name_lower)
    else {
        let is_archived = book
            .archived
            .iter()
            .any(|p| p.name.to_lowercase() == name_lower);

        if is_archived {
            eprintln!("Error: Prescription '{}' is archived.", name);
            eprintln!(
                "To restart taking it, use: medsched add {} --dose <DOSE> --freq <FREQ>",
                name
            );
        } else {
            eprintln!("Error: Prescription '{}' not found!", name);
        }
        return;
    };

    let now = chrono::Local::now().naive_local();
    let doses = generate_upcoming_doses(std::slice::from_ref(&book.prescriptions[index]), now);

    let Some(next) = doses.iter().find(|d| d.status != DoseStatus::Taken) else {
        println!(
            "No pending doses for '{}' in the next 7 days.",
            book.prescriptions[index].name
        );
        return;
    };

    let key = next.key();
    let label = next.status.label();
    book.prescriptions[index]
        .doses_completed
        .insert(key.clone());
    save_book(&book);

    println!(
        "Marked '{}' {} dose at {} as taken",
        book.prescriptions[index].name, label, key
    );
}

/// Removes the most recent completed-dose record (undo of `take_dose`).
pub fn untake_dose(name: String) {
    let mut book = load_book();
    let mut found = false;
    let name_lower = name.to_lowercase();

    for rx in book.prescriptions.iter_mut() {
        if rx.name.to_lowercase() == name_lower {
            // Keys sort chronologically, so the last one is the latest dose
            let Some(last) = rx.doses_completed.iter().next_back().cloned() else {
                println!("Prescription '{}' has no doses marked as taken", rx.name);
                return;
            };

            rx.doses_completed.remove(&last);
            found = true;
            println!("Unmarked '{}' dose at {} as taken", rx.name, last);
            break;
        }
    }

    if found {
        save_book(&book);
    } else {
        let is_archived = book
            .archived
            .iter()
            .any(|p| p.name.to_lowercase() == name_lower);

        if is_archived {
            eprintln!("Error: Prescription '{}' is archived.", name);
            eprintln!(
                "To restart taking it, use: medsched add {} --dose <DOSE> --freq <FREQ>",
                name
            );
        } else {
            eprintln!("Error: Prescription '{}' not found!", name);
        }
    }
}

/// Displays completed-dose history with adherence metrics.
///
/// # Arguments
/// * `medication_name` - Optional specific prescription name (shows all if None)
/// * `days` - Optional number of days to show (default: 30)
/// * `archived` - If true, only shows archived prescriptions; if false, shows both
///
/// Shows all completed doses in reverse chronological order (newest first)
/// and an adherence percentage based on expected vs actual doses.
pub fn display_history(medication_name: Option<String>, days: Option<u32>, archived: bool) {
    let book = load_book();

    let all_rx: Vec<&Prescription> = if archived {
        book.archived.iter().collect()
    } else {
        book.prescriptions
            .iter()
            .chain(book.archived.iter())
            .collect()
    };

    if all_rx.is_empty() {
        if archived {
            println!("No archived prescriptions found.");
        } else {
            println!("No prescriptions found.");
        }
        return;
    }

    let now = chrono::Local::now().naive_local();
    let days_to_check = days.unwrap_or(30);
    let cutoff = now - chrono::Duration::days(i64::from(days_to_check));

    let filtered_rx: Vec<&Prescription> = if let Some(ref name) = medication_name {
        let name_lower = name.to_lowercase();
        all_rx
            .into_iter()
            .filter(|p| p.name.to_lowercase() == name_lower)
            .collect()
    } else {
        all_rx
    };

    if filtered_rx.is_empty() {
        if let Some(name) = medication_name {
            println!("Prescription '{}' not found!", name);
        }
        return;
    }

    for rx in filtered_rx {
        let is_archived = book.archived.iter().any(|p| p.id == rx.id);

        // Keys that parse and fall inside the window; unparseable keys are
        // shown rather than silently hidden
        let history: Vec<&String> = rx
            .doses_completed
            .iter()
            .filter(
                |key| match NaiveDateTime::parse_from_str(key, OCCURRENCE_KEY_FORMAT) {
                    Ok(taken_at) => taken_at >= cutoff,
                    Err(_) => true,
                },
            )
            .collect();

        if history.is_empty() {
            if is_archived {
                println!("\n{} [ARCHIVED] - No doses recorded", rx.name);
            } else {
                println!("\n{} - No doses recorded", rx.name);
            }
            if days.is_some() {
                println!("  (No doses in last {} days)", days_to_check);
            }
            continue;
        }

        if is_archived {
            println!("\n{} [ARCHIVED] - History", rx.name);
        } else {
            println!("\n{} - History", rx.name);
        }
        if days.is_some() {
            println!("  (Last {} days)", days_to_check);
        }
        println!("{}", "=".repeat(60));

        // Newest first
        for key in history.iter().rev() {
            println!("  {} - {}", key, rx.dosage);
        }

        let doses_per_day = crate::frequency::parse_frequency(&rx.frequency);
        let expected_doses = (days_to_check * doses_per_day).max(1);
        let actual_doses = history.len() as u32;
        let adherence = (actual_doses as f32 / expected_doses as f32 * 100.0).min(100.0);

        println!(
            "\n  Total doses: {} (Expected: ~{})",
            actual_doses, expected_doses
        );
        println!("  Adherence: {:.1}%", adherence);
    }
    println!();
}
