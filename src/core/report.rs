use crate::core::{ContactStats, FlaggedContact, RemovalOutcome, ScanReport};

/// Contacts listed individually before the rest are summarized.
pub const PREVIEW_LIMIT: usize = 20;

const RULE_WIDTH: usize = 60;

pub fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

pub fn print_banner() {
    println!("{}", rule());
    println!("🧹 Google Contacts Cleanup Tool");
    println!("{}", rule());
}

pub fn print_footer() {
    println!("\n{}", rule());
    println!("✅ Process complete!");
    println!("{}", rule());
}

/// Numbered preview of the first contacts, plus a trailing count line.
pub fn preview_lines(contacts: &[FlaggedContact], limit: usize) -> Vec<String> {
    let mut lines: Vec<String> = contacts
        .iter()
        .take(limit)
        .enumerate()
        .map(|(i, c)| format!("  {}. {} ({})", i + 1, c.name, c.email))
        .collect();

    if contacts.len() > limit {
        lines.push(format!("  ... and {} more", contacts.len() - limit));
    }
    lines
}

pub fn print_scan(report: &ScanReport) {
    println!("\n✅ Scanned {} total contacts", report.total_scanned);
    println!(
        "📊 Found {} contacts with bounced emails",
        report.flagged.len()
    );
}

pub fn print_removal(outcome: &RemovalOutcome) {
    print_scan(&outcome.scan);

    let flagged = &outcome.scan.flagged;
    if flagged.is_empty() {
        println!("\n✅ No matching contacts found to delete");
        return;
    }

    let verb = if outcome.dry_run {
        "🔍 DRY RUN - Would delete"
    } else {
        "🗑️  Deleting"
    };
    println!("\n{} {} contacts:", verb, flagged.len());
    for line in preview_lines(flagged, PREVIEW_LIMIT) {
        println!("{}", line);
    }

    if outcome.dry_run {
        println!("\n💡 To actually delete these contacts, run with --no-dry-run");
        println!("⚠️  WARNING: This action cannot be undone!");
        return;
    }

    println!("\n📊 Final Results:");
    println!("  ✅ Successfully deleted: {} contacts", outcome.deleted);
    if !outcome.failures.is_empty() {
        println!("  ❌ Failed to delete: {} contacts", outcome.failures.len());
        for failure in &outcome.failures {
            println!("     - {}: {}", failure.contact.name, failure.error);
        }
    }
}

pub fn print_export(report: &ScanReport, export_file: &str) {
    print_scan(report);
    if report.flagged.is_empty() {
        println!("\n✅ No contacts to export");
    } else {
        println!(
            "\n📁 Exported {} contacts to {}",
            report.flagged.len(),
            export_file
        );
    }
}

pub fn stats_lines(stats: &ContactStats) -> Vec<String> {
    let mut lines = vec![
        "📊 Statistics:".to_string(),
        format!("  • Total contacts in Google: {}", stats.total_contacts),
        format!("  • Bounced emails loaded: {}", stats.bounced_loaded),
    ];

    if let Some(scan) = &stats.scan {
        lines.push(format!("  • Contacts scanned: {}", scan.scanned));
        lines.push(format!("  • Contacts to be deleted: {}", scan.flagged));
        lines.push(format!("  • Contacts that will remain: {}", scan.remaining));
    }
    lines
}

pub fn print_stats(stats: &ContactStats) {
    println!();
    for line in stats_lines(stats) {
        println!("{}", line);
    }
}
