use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A category a memo card is filed under.
///
/// Themes and body systems share the same shape; they only differ by which
/// list of the dataset they live in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
  pub id: String,
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
}

pub type Theme = Category;
pub type BodySystem = Category;

impl Category {
  pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      name: name.into(),
      description: None,
    }
  }

  pub fn with_description(mut self, description: impl Into<String>) -> Self {
    self.description = Some(description.into());
    self
  }
}

/// One titled block of memo content, possibly nested
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
  pub id: String,
  pub title: String,
  pub content: String,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub children: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
  pub question: String,
  pub answer: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuizQuestionType {
  #[serde(rename = "mcq")]
  Mcq,
  #[serde(rename = "truefalse")]
  TrueFalse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
  pub question: String,
  #[serde(rename = "type")]
  pub kind: QuizQuestionType,
  #[serde(default)]
  pub options: Vec<String>,
  pub correct_answer: String,
  #[serde(default)]
  pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlossaryTerm {
  pub term: String,
  pub definition: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
  Video,
  Podcast,
  Quiz,
  Article,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalResource {
  #[serde(rename = "type")]
  pub kind: ResourceKind,
  pub title: String,
  pub url: String,
}

/// A learning record.
///
/// The theme and body system are embedded copies, not references. The sync
/// core keeps them consistent with the dataset's category lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoCard {
  pub id: String,
  pub title: String,
  #[serde(default)]
  pub short_description: String,
  pub created_at: DateTime<Utc>,
  pub theme: Theme,
  pub body_system: BodySystem,

  // Content fields, opaque to the sync core
  #[serde(default)]
  pub image_url: String,
  #[serde(default)]
  pub flash_summary: String,
  #[serde(default)]
  pub level: String,
  #[serde(default)]
  pub memo_content: Vec<Section>,
  #[serde(default)]
  pub flashcards: Vec<Flashcard>,
  #[serde(default)]
  pub quiz: Vec<QuizQuestion>,
  #[serde(default)]
  pub glossary_terms: Vec<GlossaryTerm>,
  #[serde(default)]
  pub external_resources: Vec<ExternalResource>,
}

impl MemoCard {
  /// Create a card with empty content fields.
  pub fn new(
    id: impl Into<String>,
    title: impl Into<String>,
    theme: Theme,
    body_system: BodySystem,
  ) -> Self {
    Self {
      id: id.into(),
      title: title.into(),
      short_description: String::new(),
      created_at: Utc::now(),
      theme,
      body_system,
      image_url: String::new(),
      flash_summary: String::new(),
      level: String::new(),
      memo_content: Vec::new(),
      flashcards: Vec::new(),
      quiz: Vec::new(),
      glossary_terms: Vec::new(),
      external_resources: Vec::new(),
    }
  }
}

/// The full dataset mirrored by the sync core.
///
/// `records` is ordered newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
  #[serde(default)]
  pub themes: Vec<Theme>,
  #[serde(default)]
  pub body_systems: Vec<BodySystem>,
  #[serde(default)]
  pub records: Vec<MemoCard>,
}

impl Dataset {
  pub fn find_record(&self, id: &str) -> Option<&MemoCard> {
    self.records.iter().find(|r| r.id == id)
  }

  pub fn contains_record(&self, id: &str) -> bool {
    self.find_record(id).is_some()
  }

  /// Insert the theme unless one with the same id exists. Returns whether it was inserted.
  ///
  /// An existing entry is left untouched even if the incoming name differs
  /// (first write wins).
  pub fn upsert_theme(&mut self, theme: &Theme) -> bool {
    upsert_category(&mut self.themes, theme)
  }

  /// Same policy as [`Dataset::upsert_theme`], for body systems.
  pub fn upsert_body_system(&mut self, body_system: &BodySystem) -> bool {
    upsert_category(&mut self.body_systems, body_system)
  }

  /// Put a record at the front (newest first).
  pub fn prepend_record(&mut self, record: MemoCard) {
    self.records.insert(0, record);
  }

  /// Remove a record by id, returning its former position and value.
  pub fn take_record(&mut self, id: &str) -> Option<(usize, MemoCard)> {
    let index = self.records.iter().position(|r| r.id == id)?;
    Some((index, self.records.remove(index)))
  }

  /// Put a previously taken record back in front of its former successor.
  ///
  /// `successor` is the id that followed the record when it was taken (`None`
  /// if it was last). Records prepended since then stay ahead of it. When the
  /// successor is gone too, `index` is used, clamped to the current length.
  /// Does nothing if a record with the same id is already present.
  pub fn restore_record(&mut self, index: usize, successor: Option<&str>, record: MemoCard) {
    if self.contains_record(&record.id) {
      return;
    }
    let index = match successor {
      Some(next) => self
        .records
        .iter()
        .position(|r| r.id == next)
        .unwrap_or(index),
      None => self.records.len(),
    };
    let index = index.min(self.records.len());
    self.records.insert(index, record);
  }

  pub fn records_for_theme<'a>(&'a self, theme_id: &'a str) -> impl Iterator<Item = &'a MemoCard> {
    self.records.iter().filter(move |r| r.theme.id == theme_id)
  }

  pub fn records_for_body_system<'a>(
    &'a self,
    body_system_id: &'a str,
  ) -> impl Iterator<Item = &'a MemoCard> {
    self
      .records
      .iter()
      .filter(move |r| r.body_system.id == body_system_id)
  }
}

fn upsert_category(list: &mut Vec<Category>, category: &Category) -> bool {
  if list.iter().any(|c| c.id == category.id) {
    return false;
  }
  list.push(category.clone());
  true
}
