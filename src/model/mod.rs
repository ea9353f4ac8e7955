//! Domain model: categories, memo cards and the dataset aggregate.

mod seed;
mod types;

pub use seed::seed_defaults;
pub use types::{
  BodySystem, Category, Dataset, ExternalResource, Flashcard, GlossaryTerm, MemoCard,
  QuizQuestion, QuizQuestionType, ResourceKind, Section, Theme,
};
