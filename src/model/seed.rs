//! Built-in categories used when neither the remote store nor the local cache
//! can provide a dataset.

use super::types::{Category, Dataset};

// Ids are shared with the backend's own seed and must not change.
const THEMES: &[(&str, &str, &str)] = &[
  ("maladies-courantes", "Common conditions", "Conditions frequently seen at the counter"),
  ("ordonnances", "Prescriptions", "Reading and validating prescriptions"),
  ("micronutrition", "Micronutrition", "Nutrition advice and supplements"),
  ("dermocosmetique", "Dermocosmetics", "Beauty products and skin care"),
  ("dispositifs-medicaux", "Medical devices", "Medical and paramedical equipment"),
  ("pharmacie-veterinaire", "Veterinary pharmacy", "Medicines and care for animals"),
  ("communication", "Communication", "Counselling techniques and customer relations"),
];

const BODY_SYSTEMS: &[(&str, &str, &str)] = &[
  ("orl-respiration", "ENT & Respiratory", "Respiratory and ENT disorders"),
  ("digestion", "Digestion", "Digestive and gastro-intestinal conditions"),
  ("sante-cutanee", "Skin health", "Dermatology and skin care"),
  ("muscles-articulations", "Muscles & Joints", "Rheumatology and traumatology"),
  ("sante-feminine", "Women's health", "Gynaecology and contraception"),
  ("cardio-circulation", "Cardio & Circulation", "Cardiology and vascular disorders"),
  ("pediatrie", "Paediatrics", "Care specific to children"),
  ("sommeil-stress", "Sleep & Stress", "Sleep disorders and stress management"),
];

/// The fixed default dataset: all built-in categories, no records.
pub fn seed_defaults() -> Dataset {
  Dataset {
    themes: to_categories(THEMES),
    body_systems: to_categories(BODY_SYSTEMS),
    records: Vec::new(),
  }
}

fn to_categories(entries: &[(&str, &str, &str)]) -> Vec<Category> {
  entries
    .iter()
    .map(|(id, name, description)| Category::new(*id, *name).with_description(*description))
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashSet;

  #[test]
  fn test_seed_has_no_records() {
    let seed = seed_defaults();
    assert!(seed.records.is_empty());
    assert_eq!(seed.themes.len(), 7);
    assert_eq!(seed.body_systems.len(), 8);
  }

  #[test]
  fn test_seed_ids_are_unique() {
    let seed = seed_defaults();
    let themes: HashSet<&str> = seed.themes.iter().map(|c| c.id.as_str()).collect();
    let systems: HashSet<&str> = seed.body_systems.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(themes.len(), seed.themes.len());
    assert_eq!(systems.len(), seed.body_systems.len());
  }

  #[test]
  fn test_seed_ids_match_backend_seed() {
    let seed = seed_defaults();
    let themes: Vec<&str> = seed.themes.iter().map(|c| c.id.as_str()).collect();
    let systems: Vec<&str> = seed.body_systems.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(
      themes,
      vec![
        "maladies-courantes",
        "ordonnances",
        "micronutrition",
        "dermocosmetique",
        "dispositifs-medicaux",
        "pharmacie-veterinaire",
        "communication",
      ]
    );
    assert_eq!(
      systems,
      vec![
        "orl-respiration",
        "digestion",
        "sante-cutanee",
        "muscles-articulations",
        "sante-feminine",
        "cardio-circulation",
        "pediatrie",
        "sommeil-stress",
      ]
    );
  }
}
