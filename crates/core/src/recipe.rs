use crate::language::AppLanguage;
use crate::llm::TextGenerator;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Participant {
    User,
    Ai,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub text: String,
    pub participant: Participant,
    /// Placeholder shown while the model is still answering.
    #[serde(default)]
    pub is_loading: bool,
}

impl ChatMessage {
    fn new(text: impl Into<String>, participant: Participant) -> Self {
        Self {
            text: text.into(),
            participant,
            is_loading: false,
        }
    }

    fn loading() -> Self {
        Self {
            text: String::new(),
            participant: Participant::Ai,
            is_loading: true,
        }
    }
}

pub fn build_prompt(ingredients: &str, language: AppLanguage) -> String {
    format!(
        "I have these ingredients: {ingredients}. I want to cook something with them. \
Can you give me some ideas? Format the answer as Markdown with headings and lists so it is easy \
to read. {}",
        language.prompt_instruction()
    )
}

/// Conversation with the recipe assistant.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RecipeChat {
    messages: Vec<ChatMessage>,
}

impl RecipeChat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Appends the user's ingredients and the assistant's answer.
    ///
    /// Blank input is rejected without touching the conversation. Model failures become an
    /// `Error` message in the conversation instead of an `Err`.
    pub async fn send(
        &mut self,
        generator: &dyn TextGenerator,
        input: &str,
        language: AppLanguage,
    ) -> anyhow::Result<&ChatMessage> {
        let ingredients = input.trim();
        anyhow::ensure!(!ingredients.is_empty(), "please enter some ingredients");

        self.messages
            .push(ChatMessage::new(ingredients, Participant::User));
        self.messages.push(ChatMessage::loading());

        let reply = match generator.generate(&build_prompt(ingredients, language)).await {
            Ok(text) if !text.trim().is_empty() => ChatMessage::new(text, Participant::Ai),
            Ok(_) => ChatMessage::new("The assistant returned an empty answer.", Participant::Error),
            Err(err) => {
                tracing::warn!(error = %err, "recipe request failed");
                ChatMessage::new(
                    format!("Could not get a recipe: {err}"),
                    Participant::Error,
                )
            }
        };

        let slot = self.replace_placeholder(reply);
        Ok(&self.messages[slot])
    }

    fn replace_placeholder(&mut self, reply: ChatMessage) -> usize {
        match self.messages.iter().rposition(|m| m.is_loading) {
            Some(idx) => {
                self.messages[idx] = reply;
                idx
            }
            None => {
                self.messages.push(reply);
                self.messages.len() - 1
            }
        }
    }
}
