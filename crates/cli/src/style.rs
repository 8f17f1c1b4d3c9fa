//! Shared styling utilities for terminal output.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use depwatch_core::ConflictKind;

/// Green checkmark followed by `msg`.
pub fn success(msg: &str) -> String {
    format!("{} {}", Style::new().green().apply_to("✓"), msg)
}

/// Red cross followed by `msg`.
pub fn error(msg: &str) -> String {
    format!("{} {}", Style::new().red().apply_to("✗"), msg)
}

/// Yellow warning sign followed by `msg`.
pub fn warn(msg: &str) -> String {
    format!("{} {}", Style::new().yellow().apply_to("⚠"), msg)
}

pub fn header(msg: &str) -> String {
    Style::new().bold().apply_to(msg).to_string()
}

pub fn dim(msg: &str) -> String {
    Style::new().dim().apply_to(msg).to_string()
}

/// Machine name of a conflict kind, e.g. `[version_conflict]`.
pub fn kind_tag(kind: ConflictKind) -> String {
    Style::new()
        .red()
        .bold()
        .apply_to(format!("[{}]", kind))
        .to_string()
}

/// Right-aligned step number for remediation lists.
pub fn step_number(n: usize) -> String {
    Style::new().cyan().apply_to(format!("{:>2}.", n)).to_string()
}

/// Spinner on stderr, ticking until finished.
pub fn spinner(msg: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.blue} {msg}")
            .expect("spinner template is valid")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.set_message(msg.to_string());
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));
    spinner
}
