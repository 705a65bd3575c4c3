use clap::{Parser, Subcommand};

use daemon::run_daemon;
use database::{
    add_prescription, display_history, edit_prescription, list_prescriptions,
    remove_prescription, take_dose, untake_dose,
};
use schedule::display_upcoming;

pub mod daemon;
pub mod database;
pub mod frequency;
pub mod schedule;
pub mod timeslot;

#[derive(Parser)]
#[command(name = "medsched")]
#[command(
    about = "CLI medication schedule tracker",
    long_about = "A simple CLI tool that expands your prescriptions into a 7-day schedule of upcoming doses, tracks which ones you've taken, and reminds you about overdue ones. Everything is saved as JSON for easy import/export."
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(visible_aliases = ["a", "ad"])]
    /// Add a new prescription
    Add {
        /// Name of the medication
        name: String,
        /// Dosage (e.g., "500 mg", "10 ml")
        #[arg(short, long)]
        dose: String,
        /// How often (e.g., "twice a day", "every 8 hours", "3 times daily")
        #[arg(short, long)]
        freq: String,
        /// Anchor time for the first dose of the day (e.g., "8:00", "morning")
        #[arg(short, long)]
        time: Option<String>,
        /// First day of the course, YYYY-MM-DD (default: today)
        #[arg(short, long)]
        start: Option<String>,
        /// Last day of the course, YYYY-MM-DD (default: open-ended)
        #[arg(short, long)]
        end: Option<String>,
        /// Optional notes
        #[arg(short, long)]
        notes: Option<String>,
    },
    /// Remove a prescription (archives it, history preserved)
    #[command(visible_alias = "r")]
    Remove {
        /// Name of the medication
        name: String,
    },
    /// Mark the next pending dose as taken
    #[command(visible_alias = "t")]
    Take { name: String },
    #[command(visible_alias = "u")]
    /// Unmark the most recently taken dose (undo)
    Untake { name: String },
    /// Edit an existing prescription
    #[command(visible_alias = "e")]
    Edit {
        /// Name of the prescription to edit
        name: String,
        /// New dosage
        #[arg(long)]
        dose: Option<String>,
        /// New frequency
        #[arg(long)]
        freq: Option<String>,
        /// New anchor time (use empty string to clear)
        #[arg(long)]
        time: Option<String>,
        /// New start date, YYYY-MM-DD
        #[arg(long)]
        start: Option<String>,
        /// New end date, YYYY-MM-DD (use empty string for open-ended)
        #[arg(long)]
        end: Option<String>,
        /// New notes (use empty string to clear)
        #[arg(long)]
        notes: Option<String>,
    },
    /// List all prescriptions
    #[command(visible_aliases = ["l", "s", "show"])]
    List {
        /// Show archived prescriptions instead of active ones
        #[arg(short, long)]
        archived: bool,
    },
    /// Show the generated dose schedule for the next 7 days
    #[command(visible_aliases = ["up", "next"])]
    Upcoming {
        /// Show at most this many doses
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// View completed-dose history
    #[command(visible_alias = "h")]
    History {
        /// Name of medication (optional - shows all if not specified)
        name: Option<String>,
        /// Number of days to show (default: 30)
        #[arg(short, long)]
        days: Option<u32>,
        /// Show only archived prescriptions
        #[arg(short, long)]
        archived: bool,
    },
    /// Start the background daemon for reminders
    #[command(visible_alias = "d")]
    Daemon,
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Add {
            name,
            dose,
            freq,
            time,
            start,
            end,
            notes,
        } => {
            add_prescription(name, dose, freq, time, start, end, notes);
        }
        Commands::Remove { name } => {
            remove_prescription(name);
        }
        Commands::Take { name } => {
            take_dose(name);
        }
        Commands::Untake { name } => {
            untake_dose(name);
        }
        Commands::Edit {
            name,
            dose,
            freq,
            time,
            start,
            end,
            notes,
        } => {
            edit_prescription(name, dose, freq, time, start, end, notes);
        }
        Commands::List { archived } => {
            list_prescriptions(archived);
        }
        Commands::Upcoming { limit } => {
            display_upcoming(limit);
        }
        Commands::History {
            name,
            days,
            archived,
        } => {
            display_history(name, days, archived);
        }
        Commands::Daemon => {
            run_daemon();
        }
    }
}
