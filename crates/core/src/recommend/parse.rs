//! Block parser for free-text model suggestions.
//!
//! ```text
//! Title: Inception
//! Year: 2010
//! Platforms: Netflix, Prime Video
//! Rating: 8.8
//! Description: A mind-bending thriller.
//! ---
//! Title: ...
//! ```

use serde::{Deserialize, Serialize};

pub const BLOCK_DELIMITER: &str = "---";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationRecord {
    pub title: String,
    pub year: String,
    pub platforms: String,
    pub rating: String,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Year,
    Platforms,
    Rating,
    Description,
}

// No entry may be a prefix of another; the first match wins.
const FIELD_PREFIXES: &[(&str, Field)] = &[
    ("Title:", Field::Title),
    ("Year:", Field::Year),
    ("Platforms:", Field::Platforms),
    ("Rating:", Field::Rating),
    ("Description:", Field::Description),
    ("Başlık:", Field::Title),
    ("Yıl:", Field::Year),
    ("Platformlar:", Field::Platforms),
    ("Puan:", Field::Rating),
    ("Açıklama:", Field::Description),
];

/// Splits model output into records. Never fails; malformed blocks are skipped.
pub fn parse_recommendations(raw: &str) -> Vec<RecommendationRecord> {
    split_blocks(raw)
        .into_iter()
        .filter_map(|block| parse_block(&block))
        .collect()
}

fn split_blocks(raw: &str) -> Vec<Vec<&str>> {
    let mut blocks = Vec::new();
    let mut current = Vec::new();
    for line in raw.lines() {
        if line.trim() == BLOCK_DELIMITER {
            blocks.push(std::mem::take(&mut current));
        } else {
            current.push(line);
        }
    }
    blocks.push(current);

    blocks.retain(|b| b.iter().any(|l| !l.trim().is_empty()));
    blocks
}

fn parse_block(lines: &[&str]) -> Option<RecommendationRecord> {
    let mut rec = RecommendationRecord::default();

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match match_field(line) {
            Some((field, value)) => {
                let value = value.to_string();
                match field {
                    Field::Title => rec.title = value,
                    Field::Year => rec.year = value,
                    Field::Platforms => rec.platforms = value,
                    Field::Rating => rec.rating = value,
                    Field::Description => rec.description = value,
                }
            }
            None if !rec.description.is_empty() => {
                rec.description.push('\n');
                rec.description.push_str(line);
            }
            None => {}
        }
    }

    if rec.title.is_empty() {
        tracing::debug!(lines = lines.len(), "skipping recommendation block without a title");
        return None;
    }
    Some(rec)
}

fn match_field(line: &str) -> Option<(Field, &str)> {
    FIELD_PREFIXES.iter().find_map(|(prefix, field)| {
        let head = line.get(..prefix.len())?;
        head.eq_ignore_ascii_case(prefix)
            .then(|| (*field, line[prefix.len()..].trim()))
    })
}
