use crate::session::{Notice, NoticeLevel, Turn};
use colored::*;

pub fn print_header(text: &str) {
    println!("\n{}", text.bright_green().bold());
    println!("{}", "=".repeat(text.len()).bright_green());
}

pub fn print_success(text: &str) {
    println!("{}", text.green());
}

pub fn print_error(text: &str) {
    eprintln!("{}", text.red().bold());
}

pub fn print_info(text: &str) {
    println!("{}", text.blue());
}

pub fn print_prompt(text: &str) {
    print!("{}", text.yellow().bold());
    use std::io::Write;
    let _ = std::io::stdout().flush();
}

/// Inline notice, colored by severity.
pub fn print_notice(notice: &Notice) {
    match notice.level {
        NoticeLevel::Info => print_info(&notice.text),
        NoticeLevel::Warning => println!("{}", notice.text.yellow()),
        NoticeLevel::Error => print_error(&notice.text),
    }
}

/// One chat exchange, the way the assistant page shows it.
pub fn print_turn(turn: &Turn) {
    println!("{} {}", "You:".bold(), turn.question);
    println!("{} {}", "AI:".bright_cyan().bold(), turn.answer);
    println!("{}", format!("  {}", turn.timestamp).dimmed());
}
