pub mod parse;

pub use parse::{parse_recommendations, RecommendationRecord};

use crate::language::AppLanguage;
use crate::llm::TextGenerator;
use anyhow::Context;
use serde::{Deserialize, Serialize};

pub const KNOWN_GENRES: &[&str] = &[
    "Action",
    "Comedy",
    "Science Fiction",
    "Drama",
    "Horror",
    "Romance",
    "Documentary",
    "Animation",
    "Adventure",
    "Fantasy",
    "Thriller",
    "Crime",
    "Family",
    "Musical",
    "Mystery",
];

pub const KNOWN_PLATFORMS: &[&str] = &[
    "Netflix",
    "Prime Video",
    "Disney+",
    "HBO Max",
    "Apple TV+",
    "BluTV",
    "Gain",
    "Exxen",
    "TOD",
    "MUBI",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Movie,
    Series,
}

impl ContentType {
    fn noun(self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Series => "TV series",
        }
    }

    fn plural(self) -> &'static str {
        match self {
            Self::Movie => "movies",
            Self::Series => "TV series",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaCriteria {
    #[serde(default)]
    pub content_type: ContentType,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub year: String,
    #[serde(default)]
    pub platforms: Vec<String>,
}

impl MediaCriteria {
    pub fn set_content_type(&mut self, content_type: ContentType) {
        self.content_type = content_type;
    }

    pub fn toggle_genre(&mut self, genre: &str) {
        toggle(&mut self.genres, genre);
    }

    pub fn toggle_platform(&mut self, platform: &str) {
        toggle(&mut self.platforms, platform);
    }

    /// Accepts up to four ASCII digits (including the empty string). Anything else is ignored and
    /// `false` is returned.
    pub fn set_year(&mut self, year: &str) -> bool {
        if year.len() > 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
        self.year = year.to_string();
        true
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.year.len() <= 4 && self.year.bytes().all(|b| b.is_ascii_digit()),
            "year must be at most 4 digits (got {:?})",
            self.year
        );
        Ok(())
    }
}

fn toggle(list: &mut Vec<String>, value: &str) {
    let value = value.trim();
    if value.is_empty() {
        return;
    }
    if let Some(pos) = list.iter().position(|v| v == value) {
        list.remove(pos);
    } else {
        list.push(value.to_string());
    }
}

const FORMAT_RULES: &str = "Format every suggestion exactly like this, keeping the English field names:\n\
Title: <title>\n\
Year: <release year>\n\
Platforms: <comma separated streaming platforms>\n\
Rating: <IMDb style rating>\n\
Description: <one or two sentence summary>\n\
Separate suggestions with a line containing only ---. Do not add any other text or markdown.";

pub fn build_prompt(criteria: &MediaCriteria, language: AppLanguage) -> String {
    let mut prompt = format!("Recommend some {}.", criteria.content_type.plural());

    if !criteria.genres.is_empty() {
        prompt.push_str(&format!(" Genres: {}.", criteria.genres.join(", ")));
    }
    if !criteria.year.trim().is_empty() {
        prompt.push_str(&format!(
            " Released in {} or close to it.",
            criteria.year.trim()
        ));
    }
    if !criteria.platforms.is_empty() {
        prompt.push_str(&format!(
            " Prefer titles available on: {}.",
            criteria.platforms.join(", ")
        ));
    }

    format!(
        "{prompt} Give 5 different options that match these criteria.\n\n{FORMAT_RULES}\n{}",
        language.prompt_instruction()
    )
}

pub fn build_single_prompt(content_type: ContentType, language: AppLanguage) -> String {
    format!(
        "Recommend exactly one popular, well rated {} for tonight.\n\n{FORMAT_RULES}\n{}",
        content_type.noun(),
        language.prompt_instruction()
    )
}

pub async fn recommend(
    generator: &dyn TextGenerator,
    criteria: &MediaCriteria,
    language: AppLanguage,
) -> anyhow::Result<Vec<RecommendationRecord>> {
    criteria.validate()?;
    let text = generator
        .generate(&build_prompt(criteria, language))
        .await
        .context("recommendation request failed")?;

    let records = parse_recommendations(&text);
    if records.is_empty() {
        tracing::warn!(
            provider = ?generator.provider(),
            response_len = text.len(),
            "model response contained no parseable recommendations"
        );
    } else {
        tracing::info!(count = records.len(), content_type = ?criteria.content_type, "recommendations parsed");
    }
    Ok(records)
}

/// One suggestion for glanceable surfaces. `None` when the model fails or returns nothing usable.
pub async fn recommend_single(
    generator: &dyn TextGenerator,
    content_type: ContentType,
    language: AppLanguage,
) -> Option<RecommendationRecord> {
    match generator
        .generate(&build_single_prompt(content_type, language))
        .await
    {
        Ok(text) => parse_recommendations(&text).into_iter().next(),
        Err(err) => {
            tracing::warn!(error = %err, "single recommendation request failed");
            None
        }
    }
}
