//! Item and question catalogs per category.

use geoguess_core::{Category, ItemRecord, QuestionRecord, Scalar};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Keys of an item record that never become attributes.
const NON_ATTRIBUTE_KEYS: [&str; 2] = ["probability", "eliminated"];
const UNKNOWN_ATTRIBUTE_WEIGHT: f64 = 0.5;

/// Template order doubles as the order of generated questions.
const TEMPLATE_WEIGHTS: [(&str, f64); 19] = [
    ("continent", 1.0),
    ("region", 0.9),
    ("landlocked", 0.8),
    ("hasCoast", 0.8),
    ("isIsland", 0.9),
    ("hasMountains", 0.6),
    ("driveSide", 0.7),
    ("government", 0.6),
    ("mainReligion", 0.5),
    ("climate", 0.7),
    ("population", 0.7),
    ("flagColors", 0.6),
    ("famousFor", 0.5),
    ("language", 0.7),
    ("country", 0.9),
    ("isCapital", 0.8),
    ("size", 0.7),
    ("type", 0.9),
    ("isNatural", 0.8),
];

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path:?}: {source}")]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("failed to parse catalog {path:?}: {source}")]
    Parse {
        #[source]
        source: serde_json::Error,
        path: PathBuf,
    },
    #[error("catalog for {0} is empty")]
    Empty(Category),
}

/// Read-only source of the records a session starts from.
pub trait CatalogProvider: Send + Sync {
    fn items(&self, category: Category) -> Result<Vec<ItemRecord>, CatalogError>;
    fn questions(&self, category: Category) -> Result<Vec<QuestionRecord>, CatalogError>;
}

#[derive(Debug)]
struct CatalogEntry {
    items: Vec<ItemRecord>,
    questions: Vec<QuestionRecord>,
}

/// Catalog backed by `<category>.json` files in a data directory. Each
/// category is read once and then served from memory.
#[derive(Debug)]
pub struct JsonCatalog {
    dir: PathBuf,
    cache: RwLock<HashMap<Category, Arc<CatalogEntry>>>,
}

impl JsonCatalog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry(&self, category: Category) -> Result<Arc<CatalogEntry>, CatalogError> {
        if let Some(entry) = self.cache.read().get(&category) {
            return Ok(Arc::clone(entry));
        }

        let items: Vec<ItemRecord> = read_json(&self.dir.join(category.data_file()))?;
        if items.is_empty() {
            return Err(CatalogError::Empty(category));
        }
        let authored = self.dir.join(category.question_file());
        let questions = if authored.exists() {
            read_json(&authored)?
        } else {
            debug!(%category, "no authored question bank, generating one");
            generate_questions(&items)
        };
        info!(
            %category,
            items = items.len(),
            questions = questions.len(),
            "catalog loaded"
        );

        let entry = Arc::new(CatalogEntry { items, questions });
        Ok(Arc::clone(
            self.cache.write().entry(category).or_insert(entry),
        ))
    }
}

impl CatalogProvider for JsonCatalog {
    fn items(&self, category: Category) -> Result<Vec<ItemRecord>, CatalogError> {
        Ok(self.entry(category)?.items.clone())
    }

    fn questions(&self, category: Category) -> Result<Vec<QuestionRecord>, CatalogError> {
        Ok(self.entry(category)?.questions.clone())
    }
}

/// Fixed records, mainly for embedding and tests.
#[derive(Debug, Default)]
pub struct StaticCatalog {
    entries: HashMap<Category, CatalogEntry>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a category. An empty question list is generated from the items.
    pub fn with(
        mut self,
        category: Category,
        items: Vec<ItemRecord>,
        questions: Vec<QuestionRecord>,
    ) -> Self {
        let questions = if questions.is_empty() {
            generate_questions(&items)
        } else {
            questions
        };
        self.entries
            .insert(category, CatalogEntry { items, questions });
        self
    }

    fn entry(&self, category: Category) -> Result<&CatalogEntry, CatalogError> {
        self.entries
            .get(&category)
            .filter(|entry| !entry.items.is_empty())
            .ok_or(CatalogError::Empty(category))
    }
}

impl CatalogProvider for StaticCatalog {
    fn items(&self, category: Category) -> Result<Vec<ItemRecord>, CatalogError> {
        Ok(self.entry(category)?.items.clone())
    }

    fn questions(&self, category: Category) -> Result<Vec<QuestionRecord>, CatalogError> {
        Ok(self.entry(category)?.questions.clone())
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, CatalogError> {
    let file = File::open(path).map_err(|source| CatalogError::Read {
        source,
        path: path.to_path_buf(),
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| CatalogError::Parse {
        source,
        path: path.to_path_buf(),
    })
}

/// Derives a question bank from the attribute values present in `items`.
///
/// Known attributes come first in template order, the rest alphabetically.
/// Values are ordered by their key; `false` flags produce no question since
/// the matching `true` question covers them.
pub fn generate_questions(items: &[ItemRecord]) -> Vec<QuestionRecord> {
    let mut values: BTreeMap<&str, BTreeMap<String, Scalar>> = BTreeMap::new();
    for item in items {
        for (attribute, raw) in &item.attributes {
            if NON_ATTRIBUTE_KEYS.contains(&attribute.as_str()) {
                continue;
            }
            let scalars: Vec<Scalar> = match raw {
                serde_json::Value::Array(list) => list.iter().filter_map(Scalar::from_json).collect(),
                other => Scalar::from_json(other).into_iter().collect(),
            };
            let bucket = values.entry(attribute.as_str()).or_default();
            for scalar in scalars {
                if scalar == Scalar::Flag(false) {
                    continue;
                }
                bucket.entry(scalar.key()).or_insert(scalar);
            }
        }
    }

    let mut ordered: Vec<(&str, f64)> = TEMPLATE_WEIGHTS
        .iter()
        .filter(|(attribute, _)| values.contains_key(attribute))
        .copied()
        .collect();
    ordered.extend(
        values
            .keys()
            .filter(|attribute| !TEMPLATE_WEIGHTS.iter().any(|(known, _)| known == *attribute))
            .map(|attribute| (*attribute, UNKNOWN_ATTRIBUTE_WEIGHT)),
    );

    let mut questions = Vec::new();
    for (attribute, weight) in ordered {
        let Some(bucket) = values.get(attribute) else {
            continue;
        };
        for value in bucket.values() {
            questions.push(QuestionRecord::new(
                attribute,
                value.clone(),
                &question_text(attribute, value),
                weight,
            ));
        }
    }
    questions
}

fn question_text(attribute: &str, value: &Scalar) -> String {
    let plain = value.to_string();
    match attribute {
        "continent" => format!("Is it located in {}?", title_case(&plain)),
        "region" => format!("Is it in the {plain} part of its continent?"),
        "landlocked" => "Is it landlocked?".to_string(),
        "hasCoast" => "Does it have a coastline?".to_string(),
        "isIsland" => "Is it an island?".to_string(),
        "hasMountains" => "Does it have major mountain ranges?".to_string(),
        "driveSide" => format!("Do people drive on the {plain}?"),
        "government" => format!("Is its government a {plain}?"),
        "mainReligion" => format!("Is the main religion {}?", title_case(&plain)),
        "climate" => format!("Is its climate mostly {plain}?"),
        "population" => format!("Is its population {plain}?"),
        "flagColors" => format!("Does the flag contain the color {plain}?"),
        "famousFor" => format!("Is it famous for {plain}?"),
        "language" => format!("Is {} the main language?", title_case(&plain)),
        "country" => format!("Is it in {plain}?"),
        "isCapital" => "Is it a capital city?".to_string(),
        "size" => format!("Is it a {plain} place?"),
        "type" => format!("Is it a {plain}?"),
        "isNatural" => "Is it a natural wonder?".to_string(),
        _ => match value {
            Scalar::Flag(_) => format!("Is it {attribute}?"),
            _ => format!("Is its {attribute} {plain}?"),
        },
    }
}

/// `north_america` becomes `North America`.
fn title_case(raw: &str) -> String {
    raw.split(['_', ' '])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn records() -> Vec<ItemRecord> {
        vec![
            ItemRecord::new("Kenya")
                .with("continent", "africa")
                .with("landlocked", false)
                .with("flagColors", serde_json::json!(["black", "red", "green"]))
                .with("altitude", "high"),
            ItemRecord::new("Chile")
                .with("continent", "south_america")
                .with("landlocked", false)
                .with("flagColors", serde_json::json!(["red", "white", "blue"])),
            ItemRecord::new("Bolivia")
                .with("continent", "south_america")
                .with("landlocked", true)
                .with("flagColors", serde_json::json!(["red", "yellow", "green"])),
        ]
    }

    #[test]
    fn generated_questions_follow_template_order() {
        let questions = generate_questions(&records());
        let texts: Vec<&str> = questions
            .iter()
            .filter_map(|q| q.text.as_deref())
            .collect();
        assert_eq!(texts[0], "Is it located in Africa?");
        assert_eq!(texts[1], "Is it located in South America?");
        assert_eq!(texts[2], "Is it landlocked?");
        assert!(texts[3].starts_with("Does the flag contain the color"));
        assert_eq!(texts.last().copied(), Some("Is its altitude high?"));
        assert_eq!(questions.last().map(|q| q.weight), Some(0.5));
    }

    #[test]
    fn false_flags_and_duplicates_are_skipped() {
        let questions = generate_questions(&records());
        let landlocked: Vec<_> = questions
            .iter()
            .filter(|q| q.attribute.as_deref() == Some("landlocked"))
            .collect();
        assert_eq!(landlocked.len(), 1);
        assert_eq!(landlocked[0].value, Some(Scalar::Flag(true)));

        let colors = questions
            .iter()
            .filter(|q| q.attribute.as_deref() == Some("flagColors"))
            .count();
        assert_eq!(colors, 6);
    }

    #[test]
    fn title_case_handles_separators() {
        assert_eq!(title_case("north_america"), "North America");
        assert_eq!(title_case("islam"), "Islam");
    }

    #[test]
    fn json_catalog_reads_and_caches() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join(Category::City.data_file());
        std::fs::write(&path, serde_json::to_string(&records()).expect("encode")).expect("write");

        let catalog = JsonCatalog::new(dir.path());
        let items = catalog.items(Category::City).expect("items");
        assert_eq!(items.len(), 3);
        assert!(!catalog.questions(Category::City).expect("questions").is_empty());

        // Served from the cache once loaded.
        std::fs::remove_file(&path).expect("remove");
        assert_eq!(catalog.items(Category::City).expect("cached").len(), 3);
    }

    #[test]
    fn authored_question_bank_wins() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join(Category::Place.data_file()),
            serde_json::to_string(&records()).expect("encode"),
        )
        .expect("write items");
        std::fs::write(
            dir.path().join(Category::Place.question_file()),
            r#"[{"attribute": "continent", "value": "africa", "question": "Africa?"}]"#,
        )
        .expect("write questions");

        let questions = JsonCatalog::new(dir.path())
            .questions(Category::Place)
            .expect("questions");
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].text.as_deref(), Some("Africa?"));
        assert_eq!(questions[0].weight, 1.0);
    }

    #[test]
    fn missing_file_reports_path() {
        let dir = tempdir().expect("tempdir");
        let err = JsonCatalog::new(dir.path())
            .items(Category::Country)
            .unwrap_err();
        match err {
            CatalogError::Read { path, .. } => assert!(path.ends_with("countries.json")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn shipped_data_loads() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../data");
        let catalog = JsonCatalog::new(dir);
        for category in Category::ALL {
            assert!(!catalog.items(category).expect("items").is_empty());
            assert!(!catalog.questions(category).expect("questions").is_empty());
        }
    }
}
