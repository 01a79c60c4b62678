use crate::language::AppLanguage;
use crate::llm::TextGenerator;
use chrono::Timelike;
use serde::Serialize;

pub const FALLBACK_ON_ERROR: &str = "Enjoy life.";
pub const FALLBACK_ON_EMPTY: &str = "Have a great day!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DayPart {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl DayPart {
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            6..=11 => Self::Morning,
            12..=17 => Self::Afternoon,
            18..=22 => Self::Evening,
            _ => Self::Night,
        }
    }

    pub fn now() -> Self {
        Self::from_hour(chrono::Local::now().hour())
    }

    fn theme(self) -> &'static str {
        match self {
            Self::Morning => "a motivating line that helps them start the day with energy",
            Self::Afternoon => "a thought-provoking idea that makes them take a short break mid-day",
            Self::Evening => "a calming piece of advice that helps them shake off the day",
            Self::Night => "a quiet thought that eases them into a peaceful night",
        }
    }
}

pub fn build_prompt(part: DayPart, language: AppLanguage) -> String {
    format!(
        "Tell the user {}. Reply with the sentence only, at most 15 words, with no heading and no \
quotation marks. {}",
        part.theme(),
        language.prompt_instruction()
    )
}

/// Never fails: model errors and empty replies fall back to fixed sentences.
pub async fn fetch_tip(generator: &dyn TextGenerator, part: DayPart, language: AppLanguage) -> String {
    match generator.generate(&build_prompt(part, language)).await {
        Ok(text) => {
            let tip = text.trim().trim_matches('"').trim();
            if tip.is_empty() {
                FALLBACK_ON_EMPTY.to_string()
            } else {
                tip.to_string()
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, ?part, "tip of the day request failed");
            FALLBACK_ON_ERROR.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::CannedGenerator;

    #[test]
    fn day_part_boundaries() {
        assert_eq!(DayPart::from_hour(5), DayPart::Night);
        assert_eq!(DayPart::from_hour(6), DayPart::Morning);
        assert_eq!(DayPart::from_hour(11), DayPart::Morning);
        assert_eq!(DayPart::from_hour(12), DayPart::Afternoon);
        assert_eq!(DayPart::from_hour(17), DayPart::Afternoon);
        assert_eq!(DayPart::from_hour(18), DayPart::Evening);
        assert_eq!(DayPart::from_hour(22), DayPart::Evening);
        assert_eq!(DayPart::from_hour(23), DayPart::Night);
        assert_eq!(DayPart::from_hour(0), DayPart::Night);
    }

    #[tokio::test]
    async fn falls_back_instead_of_failing() {
        let failing = CannedGenerator::failing("503");
        assert_eq!(
            fetch_tip(&failing, DayPart::Morning, AppLanguage::English).await,
            FALLBACK_ON_ERROR
        );

        let empty = CannedGenerator::with_reply(" \"\" ");
        assert_eq!(
            fetch_tip(&empty, DayPart::Night, AppLanguage::English).await,
            FALLBACK_ON_EMPTY
        );

        let ok = CannedGenerator::with_reply("\"Breathe and begin.\"\n");
        assert_eq!(
            fetch_tip(&ok, DayPart::Morning, AppLanguage::English).await,
            "Breathe and begin."
        );
        assert!(ok.last_prompt().unwrap().contains("start the day"));
    }
}
