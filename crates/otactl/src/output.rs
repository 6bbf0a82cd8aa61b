//! Output formatting for otactl

use anyhow::Error;
use badge_ota::{CancelReason, Release, TerminalAction, UpdateReport};
use colored::*;
use serde_json::json;

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("Failed to format output as JSON: {e}"),
    }
}

/// Print error in JSON format
pub fn print_error_json(error: &Error) {
    print_json(&json!({
        "success": false,
        "error": { "message": error.to_string() }
    }));
}

/// Print error in human-readable format
pub fn print_error_human(error: &Error) {
    eprintln!("{} {}", "Error:".red().bold(), error);

    let mut source = error.source();
    while let Some(err) = source {
        eprintln!("  {} {}", "Caused by:".yellow(), err);
        source = err.source();
    }
}

/// Print the outcome of an update session
pub fn print_report(report: &UpdateReport, json: bool) {
    if json {
        print_json(&json!({ "success": true, "report": report }));
        return;
    }

    let outcome = match report.terminal {
        TerminalAction::Reboot => format!("Updated to {}", report.discovered_version)
            .green()
            .bold(),
        TerminalAction::Cancelled(CancelReason::NoUpdateNeeded) => {
            format!("Already up to date ({})", report.current_version).green()
        }
        TerminalAction::Cancelled(reason) => format!("No update: {reason}").yellow(),
    };
    println!("{outcome}");
    println!(
        "  {} {}  {} {}  {} {:.1?}",
        "session:".dimmed(),
        report.session_id,
        "attempts:".dimmed(),
        report.flash_attempts,
        "took:".dimmed(),
        report.duration
    );
    if let Some(notes) = &report.release_notes {
        println!();
        println!("{}", "Release notes:".bold());
        println!("{notes}");
    }
}

/// Print a resolved release
pub fn print_release(release: &Release, current: Option<&str>, update_available: Option<bool>, json: bool) {
    if json {
        print_json(&json!({
            "success": true,
            "download_url": release.download_url,
            "tag": release.tag(),
            "current_version": current,
            "update_available": update_available,
            "release_notes": release.release_notes,
        }));
        return;
    }

    println!("{} {}", "Latest:".bold(), release.tag().unwrap_or("unknown"));
    println!("  {} {}", "url:".dimmed(), release.download_url);
    match (current, update_available) {
        (Some(current), Some(true)) => {
            println!("  {} {} -> update available", "current:".dimmed(), current)
        }
        (Some(current), _) => println!("  {} {} (up to date)", "current:".dimmed(), current),
        _ => {}
    }
    if let Some(notes) = &release.release_notes {
        println!();
        println!("{notes}");
    }
}
