use crate::language::AppLanguage;
use crate::llm::TextGenerator;
use anyhow::Context;

pub fn questions_prompt(language: AppLanguage) -> String {
    format!(
        "Create a list of \"truth\" questions for a group of friends or teenagers playing truth or \
dare, sincere and fun enough to loosen up the room. Make them resemble popular or interesting \
questions people ask on forums and social media. List about 10 to 15 questions. Put each question \
on its own line without numbering.\n\
Example:\n\
Who did you last lie to?\n\
Have you ever cheated on a test?\n\
What is the biggest regret of your life?\n\
{}",
        language.prompt_instruction()
    )
}

pub fn single_question_prompt(language: AppLanguage) -> String {
    format!(
        "Write one short, catchy \"truth\" question to show on a home screen widget. Reply with the \
question text only, no explanation and no numbering.\n\
Example:\n\
Who did you last lie to?\n\
{}",
        language.prompt_instruction()
    )
}

/// Non-blank lines, trimmed, in order.
pub fn parse_questions(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn first_question(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
}

pub async fn fetch_questions(
    generator: &dyn TextGenerator,
    language: AppLanguage,
) -> anyhow::Result<Vec<String>> {
    let text = generator
        .generate(&questions_prompt(language))
        .await
        .context("truth questions request failed")?;
    let questions = parse_questions(&text);
    anyhow::ensure!(!questions.is_empty(), "the model returned no questions");
    Ok(questions)
}

/// Widget feed: `None` on any failure.
pub async fn fetch_single_question(
    generator: &dyn TextGenerator,
    language: AppLanguage,
) -> Option<String> {
    match generator.generate(&single_question_prompt(language)).await {
        Ok(text) => first_question(&text),
        Err(err) => {
            tracing::warn!(error = %err, "single truth question request failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::CannedGenerator;

    #[test]
    fn splits_into_trimmed_non_blank_lines() {
        let text = "\n  Who was your first crush?  \n\n\tWhat scares you most?\n   \n";
        assert_eq!(
            parse_questions(text),
            ["Who was your first crush?", "What scares you most?"]
        );
        assert_eq!(
            first_question(text).as_deref(),
            Some("Who was your first crush?")
        );
        assert_eq!(first_question(" \n \n"), None);
    }

    #[tokio::test]
    async fn fetch_questions_requires_at_least_one_line() {
        let generator = CannedGenerator::with_reply("\n\n");
        assert!(fetch_questions(&generator, AppLanguage::English).await.is_err());

        let generator = CannedGenerator::with_reply("Q1?\nQ2?");
        let qs = fetch_questions(&generator, AppLanguage::English).await.unwrap();
        assert_eq!(qs.len(), 2);
    }

    #[tokio::test]
    async fn single_question_is_none_on_failure() {
        let generator = CannedGenerator::failing("timeout");
        assert_eq!(
            fetch_single_question(&generator, AppLanguage::Turkish).await,
            None
        );
        let generator = CannedGenerator::with_reply("\nBiggest secret?\nExtra line");
        assert_eq!(
            fetch_single_question(&generator, AppLanguage::Turkish)
                .await
                .as_deref(),
            Some("Biggest secret?")
        );
    }
}
