//! Allowlisted Task Table
//!
//! Fixed, named shortcuts mapped to pre-defined argument vectors. Tasks are
//! executed directly (no shell interpretation), so nothing in a request can
//! influence what runs beyond selecting a name from this table.
//!
//! The table is process-wide, read-only, and initialized once at startup;
//! no locking is needed.

/// Task name → argument vector. All entries are fast system-info queries,
/// which is why task mode carries a shorter default timeout than free-form
/// commands.
pub const TASKS: &[(&str, &[&str])] = &[
    ("hostname", &["hostname"]),
    ("uptime", &["uptime"]),
    ("kernel", &["uname", "-a"]),
    ("date", &["date", "-u"]),
    ("disk-usage", &["df", "-h"]),
    ("memory", &["free", "-m"]),
    ("who", &["who"]),
];

/// Resolve a task name to its argument vector.
pub fn lookup(name: &str) -> Option<&'static [&'static str]> {
    TASKS
        .iter()
        .find(|(task, _)| *task == name)
        .map(|(_, argv)| *argv)
}

/// The literal allowlisted task names, for the `/tasks` listing.
pub fn names() -> Vec<&'static str> {
    TASKS.iter().map(|(task, _)| *task).collect()
}

/// Check that a task name uses only the characters the route accepts.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
