//! Boxed console diagnostics.
//!
//! Fatal errors and startup notices are framed in an ANSI-colored box
//! so they stand out from program output.

const RED: &str = "\u{1b}[31m";
const BLUE: &str = "\u{1b}[34m";
const RESET: &str = "\u{1b}[0m";

/// Message severity, selects the frame color and title prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxKind {
    Info,
    Error,
}

/// Print `message` inside a titled box. Errors go to stderr in red,
/// info to stdout in blue.
pub fn box_message(title: &str, message: &str, kind: BoxKind) {
    let title = match kind {
        BoxKind::Error => format!("Error: {}", title),
        BoxKind::Info => title.to_string(),
    };

    let lines: Vec<&str> = message.lines().collect();
    let width = lines
        .iter()
        .map(|l| l.chars().count())
        .chain(std::iter::once(title.chars().count()))
        .max()
        .unwrap_or(0);

    let border = format!("+{}+", "-".repeat(width + 2));
    let mut out = String::new();
    out.push_str(&border);
    out.push('\n');
    out.push_str(&format!("| {:<w$} |\n", title, w = width));
    out.push_str(&border);
    out.push('\n');
    for line in lines {
        out.push_str(&format!("| {:<w$} |\n", line, w = width));
    }
    out.push_str(&border);

    match kind {
        BoxKind::Error => eprintln!("{}{}{}", RED, out, RESET),
        BoxKind::Info => println!("{}{}{}", BLUE, out, RESET),
    }
}
