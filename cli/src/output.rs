use colored::Colorize;
use mirror_core::types::{ChangeEntry, ChangeSet};

pub fn header(title: &str) {
    println!("{}", title.bold().underline());
}

pub fn subheader(title: &str) {
    println!("{}", title.bold());
}

pub fn hint(msg: &str) {
    println!("{} {}", "hint:".cyan().bold(), msg.dimmed());
}

pub fn info(msg: &str) {
    eprintln!("{} {}", "info:".blue().bold(), msg);
}

pub fn warn(msg: &str) {
    eprintln!("{} {}", "warning:".yellow().bold(), msg);
}

pub fn success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg);
}

pub fn warnings(items: &[String]) {
    for w in items {
        warn(w);
    }
}

/// One line per page, marked `+` added, `~` modified, `-` deleted.
pub fn change_lines(changes: &ChangeSet) -> Vec<String> {
    let mut lines = Vec::with_capacity(changes.len());
    let mut push = |mark: &str, entries: &[ChangeEntry]| {
        for e in entries {
            let location = e.local_path.as_deref().unwrap_or("(new)");
            lines.push(format!("{} {} [{}] {}", mark, e.title, e.page_id, location));
        }
    };
    push("+", &changes.added);
    push("~", &changes.modified);
    push("-", &changes.deleted);
    lines
}

pub fn change_set(changes: &ChangeSet) {
    for line in change_lines(changes) {
        let colored = match line.chars().next() {
            Some('+') => line.green(),
            Some('-') => line.red(),
            _ => line.yellow()
        };
        println!("  {}", colored);
    }
}

pub fn counted(label: &str, n: usize) -> String {
    format!("{} {}", n.to_string().bold(), label)
}
