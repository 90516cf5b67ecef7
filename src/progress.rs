use indicatif::ProgressStyle;

/// Spinner shown while a backup step is in flight.
/// Cyan spinner, current step in the message area.
pub fn step_style() -> ProgressStyle {
    ProgressStyle::with_template("\x1b[36m{spinner}\x1b[0m {wide_msg}")
        .unwrap()
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
}

/// Swapped in when the run finishes cleanly.
pub fn done_style() -> ProgressStyle {
    ProgressStyle::with_template("\x1b[32m✓\x1b[0m {wide_msg}").unwrap()
}

/// Swapped in when the run aborts.
pub fn fail_style() -> ProgressStyle {
    ProgressStyle::with_template("\x1b[31m✗\x1b[0m {wide_msg}").unwrap()
}
