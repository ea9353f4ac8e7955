//! Plain-text rendering for the command line.

use crate::model::{Category, Dataset, MemoCard};
use crate::sync::Notice;

const TITLE_WIDTH: usize = 48;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// One line per record: id, date, title, categories
pub fn record_line(record: &MemoCard) -> String {
  format!(
    "{:<24} {} {:<width$} [{} / {}]",
    record.id,
    record.created_at.format("%Y-%m-%d"),
    truncate(&record.title, TITLE_WIDTH),
    record.theme.name,
    record.body_system.name,
    width = TITLE_WIDTH
  )
}

pub fn record_detail(record: &MemoCard) -> String {
  let mut out = String::new();
  out.push_str(&format!("{}\n", record.title));
  out.push_str(&format!("id:          {}\n", record.id));
  out.push_str(&format!("created:     {}\n", record.created_at.to_rfc3339()));
  out.push_str(&format!("theme:       {}\n", record.theme.name));
  out.push_str(&format!("body system: {}\n", record.body_system.name));
  if !record.level.is_empty() {
    out.push_str(&format!("level:       {}\n", record.level));
  }
  if !record.short_description.is_empty() {
    out.push_str(&format!("\n{}\n", record.short_description));
  }
  out.push_str(&format!(
    "\n{} sections, {} flashcards, {} quiz questions, {} glossary terms, {} resources\n",
    record.memo_content.len(),
    record.flashcards.len(),
    record.quiz.len(),
    record.glossary_terms.len(),
    record.external_resources.len()
  ));
  out
}

fn category_lines(title: &str, categories: &[Category], out: &mut String) {
  out.push_str(&format!("{}:\n", title));
  for category in categories {
    match category.description.as_deref().filter(|d| !d.is_empty()) {
      Some(description) => {
        out.push_str(&format!("  {:<24} {} - {}\n", category.id, category.name, description))
      }
      None => out.push_str(&format!("  {:<24} {}\n", category.id, category.name)),
    }
  }
}

pub fn categories(dataset: &Dataset) -> String {
  let mut out = String::new();
  category_lines("Themes", &dataset.themes, &mut out);
  category_lines("Body systems", &dataset.body_systems, &mut out);
  out
}

pub fn notice_line(notice: Notice) -> String {
  format!("! {}", notice)
}
