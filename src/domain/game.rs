//! Game catalog, independent-game directory and newsletter records.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::domain::error::SquirrelError;

/// A game hosted on the site itself.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CatalogGame {
    pub id: u32,
    pub name: &'static str,
    pub description: &'static str,
    pub rules: &'static str,
}

pub const CATALOG: &[CatalogGame] = &[CatalogGame {
    id: 1,
    name: "Acorn Sweeper",
    description: "Minesweeper, but with a squirrel theme.",
    rules: "Left click on a square to reveal what's there. Right click on an unrevealed square to mark or unmark it.",
}];

/// Leaderboard payload. Scores are not tracked yet, so every board is empty.
pub fn leaderboard() -> Value {
    let boards: Vec<Value> = CATALOG
        .iter()
        .map(|game| {
            json!({
                "gameId": game.id,
                "name": game.name,
                "entries": [],
            })
        })
        .collect();
    json!({ "leaderboards": boards })
}

/// A community-submitted game awaiting or past moderation.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IndependentGame {
    pub id: i64,
    pub game_name: String,
    pub description: String,
    pub image_url: String,
    pub tag1: Option<String>,
    pub tag2: Option<String>,
    pub tag3: Option<String>,
    pub category: String,
    pub link_url: String,
    pub email: String,
    pub additional_info: Option<String>,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIndependentGame {
    pub game_name: String,
    pub description: String,
    pub image_url: String,
    pub tag1: Option<String>,
    pub tag2: Option<String>,
    pub tag3: Option<String>,
    pub category: String,
    pub link_url: String,
    pub email: String,
    pub additional_info: Option<String>,
}

impl NewIndependentGame {
    /// Validate a submission body. Required fields must be non-empty strings,
    /// optional ones strings when present.
    pub fn from_json(body: &Map<String, Value>) -> Result<Self, SquirrelError> {
        Ok(Self {
            game_name: required_str(body, "gameName")?,
            description: required_str(body, "description")?,
            image_url: required_str(body, "imageUrl")?,
            tag1: optional_str(body, "tag1")?,
            tag2: optional_str(body, "tag2")?,
            tag3: optional_str(body, "tag3")?,
            category: required_str(body, "category")?,
            link_url: required_str(body, "linkUrl")?,
            email: required_str(body, "email")?,
            additional_info: optional_str(body, "additionalInfo")?,
        })
    }
}

fn required_str(body: &Map<String, Value>, key: &str) -> Result<String, SquirrelError> {
    match body.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        Some(Value::String(_)) | None | Some(Value::Null) => {
            Err(SquirrelError::validation(format!("Missing {key}.")))
        }
        Some(_) => Err(SquirrelError::validation(format!("{key} must be a string."))),
    }
}

fn optional_str(body: &Map<String, Value>, key: &str) -> Result<Option<String>, SquirrelError> {
    match body.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(SquirrelError::validation(format!("{key} must be a string."))),
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewsletterEntry {
    pub id: i64,
    pub address: String,
    pub created_at: DateTime<Utc>,
}

/// Newsletter sign-ups only need the address to be a string.
pub fn newsletter_address(body: &Map<String, Value>) -> Result<String, SquirrelError> {
    match body.get("address") {
        Some(Value::String(s)) => Ok(s.clone()),
        _ => Err(SquirrelError::validation("Address must be a string.")),
    }
}
