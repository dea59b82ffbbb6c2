use crate::core::io::Storage;
use crate::core::model::{new_id, Character, DialogueEntry, StoryPanel};
use crate::services::llm::{create_llm, LlmClient, LlmConfig};
use crate::utils::text::strip_code_blocks;
use anyhow::{anyhow, bail, Context, Result};
use log::warn;
use serde::Deserialize;
use std::time::Duration;

pub const MAX_SUGGESTED_PANELS: usize = 12;

const SYSTEM_PROMPT: &str = "You are a creative comic book writer. Reply with valid JSON only.";

#[derive(Deserialize)]
struct SuggestedPanel {
    scene: String,
    expression: String,
    #[serde(default)]
    dialogues: Vec<SuggestedDialogue>,
}

#[derive(Deserialize)]
struct SuggestedDialogue {
    #[serde(default)]
    speaker: Option<String>,
    #[serde(alias = "text")]
    dialogue: String,
}

/// Drafts a storyboard from a one-line idea using a text model.
pub struct StoryAssistant {
    llm: Box<dyn LlmClient>,
    retry_count: usize,
    retry_delay: Duration,
}

impl StoryAssistant {
    pub fn new(llm: Box<dyn LlmClient>, retry_count: usize, retry_delay: Duration) -> Self {
        Self {
            llm,
            retry_count,
            retry_delay,
        }
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        Ok(Self::new(
            create_llm(config)?,
            config.retry_count,
            Duration::from_secs(config.retry_delay_seconds),
        ))
    }

    pub async fn suggest(
        &self,
        character: &Character,
        idea: &str,
        panel_count: usize,
    ) -> Result<Vec<StoryPanel>> {
        if idea.trim().is_empty() {
            bail!("Please enter a story prompt.");
        }
        if !(1..=MAX_SUGGESTED_PANELS).contains(&panel_count) {
            bail!("Panel count must be between 1 and {}", MAX_SUGGESTED_PANELS);
        }

        let prompt = story_prompt(character, idea, panel_count);
        let response = self.chat_with_retry(&prompt).await?;
        parse_story(&response, panel_count).context("Failed to generate story")
    }

    async fn chat_with_retry(&self, prompt: &str) -> Result<String> {
        let mut last_error = anyhow!("Unknown error");

        for attempt in 0..=self.retry_count {
            if attempt > 0 {
                warn!(
                    "Story generation failed (attempt {}/{}), retrying...",
                    attempt,
                    self.retry_count + 1
                );
                tokio::time::sleep(self.retry_delay).await;
            }

            match self.llm.chat(SYSTEM_PROMPT, prompt).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    warn!("Story generation error: {:#}", e);
                    last_error = e;
                }
            }
        }

        Err(last_error.context("Story generation still failing after retries"))
    }
}

/// Reads a hand-written storyboard: a YAML list of panels. Missing ids are
/// generated.
pub async fn load_storyboard(storage: &dyn Storage, path: &str) -> Result<Vec<StoryPanel>> {
    let bytes = storage.read(path).await?;
    let panels: Vec<StoryPanel> = serde_yaml_ng::from_slice(&bytes)
        .with_context(|| format!("Failed to parse storyboard {}", path))?;
    Ok(panels)
}

/// `Speaker: text` is a line of dialogue; anything else is a caption.
pub fn parse_dialogue_line(line: &str) -> Option<DialogueEntry> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match line.split_once(':') {
        Some((speaker, text)) if !speaker.trim().is_empty() && !text.trim().is_empty() => Some(
            DialogueEntry::new(Some(speaker.trim().to_string()), text.trim()),
        ),
        _ => Some(DialogueEntry::new(None, line)),
    }
}

fn story_prompt(character: &Character, idea: &str, panel_count: usize) -> String {
    format!(
        "Your task is to generate a comic book storyboard based on a user's prompt.\n\
         The main character is {name}, who is described as: \"{description}\". Keep this description consistent.\n\
         \n\
         The user's story idea is: \"{idea}\".\n\
         \n\
         Create a compelling story arc that spans exactly {n} panels.\n\
         For each panel, provide a scene description, the character's expression/action, and any dialogues or captions.\n\
         - The scene should describe the setting and action visually.\n\
         - The expression should focus on the character's emotion and pose.\n\
         - Dialogues can be from the main character, other characters, or be a narrator's caption.\n\
         - For narrator captions, the 'speaker' field should be an empty string.\n\
         - For thought bubbles, the 'speaker' should contain the word 'thought' (e.g., \"{name} (thought bubble)\").\n\
         \n\
         Return only a JSON array of {n} objects shaped like:\n\
         [{{ \"scene\": \"...\", \"expression\": \"...\", \"dialogues\": [{{ \"speaker\": \"...\", \"dialogue\": \"...\" }}] }}]",
        name = character.name,
        description = character.description,
        idea = idea.trim(),
        n = panel_count,
    )
}

fn parse_story(response: &str, panel_count: usize) -> Result<Vec<StoryPanel>> {
    let clean_json = strip_code_blocks(response);
    let value: serde_json::Value = serde_json::from_str(&clean_json)
        .with_context(|| format!("Failed to parse story JSON: {}", clean_json))?;

    if !value.is_array() {
        bail!("AI response was not a JSON array.");
    }
    let suggested: Vec<SuggestedPanel> =
        serde_json::from_value(value).context("Story panels do not match the expected shape")?;

    if suggested.is_empty() && panel_count > 0 {
        bail!("AI returned an empty story. Try a different prompt.");
    }

    Ok(suggested
        .into_iter()
        .map(|p| StoryPanel {
            id: new_id("panel"),
            scene: p.scene,
            expression: p.expression,
            dialogues: p
                .dialogues
                .into_iter()
                .map(|d| {
                    let speaker = d.speaker.filter(|s| !s.trim().is_empty());
                    DialogueEntry::new(speaker, d.dialogue)
                })
                .collect(),
        })
        .collect())
}
