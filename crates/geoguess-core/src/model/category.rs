use crate::error::GameError;
use core::fmt;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Catalog families the game knows how to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Country,
    City,
    Place,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Country, Category::City, Category::Place];

    pub const fn as_str(self) -> &'static str {
        match self {
            Category::Country => "country",
            Category::City => "city",
            Category::Place => "place",
        }
    }

    /// File name of the item list for this category inside a data directory.
    pub const fn data_file(self) -> &'static str {
        match self {
            Category::Country => "countries.json",
            Category::City => "cities.json",
            Category::Place => "places.json",
        }
    }

    /// Optional authored question bank next to the item list.
    pub const fn question_file(self) -> &'static str {
        match self {
            Category::Country => "countries.questions.json",
            Category::City => "cities.questions.json",
            Category::Place => "places.questions.json",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "country" | "countries" => Ok(Category::Country),
            "city" | "cities" => Ok(Category::City),
            "place" | "places" => Ok(Category::Place),
            _ => Err(GameError::UnknownCategory(s.to_string())),
        }
    }
}
