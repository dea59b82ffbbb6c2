use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Stand-in image URL for failed panels wherever a plain string is expected.
pub const ERROR_SENTINEL: &str = "ERROR";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Character {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct DialogueEntry {
    #[serde(default = "dialogue_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    #[serde(alias = "dialogue")]
    pub text: String,
}

impl DialogueEntry {
    pub fn new(speaker: Option<String>, text: impl Into<String>) -> Self {
        Self {
            id: dialogue_id(),
            speaker,
            text: text.into(),
        }
    }

    /// Blank entries stay in the storyboard but are never drawn.
    pub fn is_visible(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct StoryPanel {
    #[serde(default = "panel_id")]
    pub id: String,
    pub scene: String,
    pub expression: String,
    #[serde(default)]
    pub dialogues: Vec<DialogueEntry>,
}

impl StoryPanel {
    pub fn new(scene: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            id: panel_id(),
            scene: scene.into(),
            expression: expression.into(),
            dialogues: Vec::new(),
        }
    }

    pub fn with_dialogue(mut self, entry: DialogueEntry) -> Self {
        self.dialogues.push(entry);
        self
    }
}

pub fn new_id(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4())
}

fn panel_id() -> String {
    new_id("panel")
}

fn dialogue_id() -> String {
    new_id("dialogue")
}

/// How a dialogue entry is drawn on top of the panel artwork.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogueKind {
    Caption,
    Thought,
    Speech { speaker: String },
}

/// Speaker-less entries are narration; a speaker mentioning "thought" marks a
/// thought bubble. The substring rule is the only discriminator the storyboard
/// format carries.
pub fn classify(entry: &DialogueEntry) -> DialogueKind {
    match entry.speaker.as_deref().map(str::trim) {
        None | Some("") => DialogueKind::Caption,
        Some(speaker) if speaker.to_lowercase().contains("thought") => DialogueKind::Thought,
        Some(speaker) => DialogueKind::Speech {
            speaker: speaker.to_string(),
        },
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PanelImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl PanelImage {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    pub fn from_base64(mime_type: impl Into<String>, encoded: &str) -> anyhow::Result<Self> {
        let data = STANDARD.decode(encoded.trim())?;
        Ok(Self::new(mime_type, data))
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.data)
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }
}

impl fmt::Debug for PanelImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PanelImage")
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.data.len())
            .finish()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PanelOutcome {
    Succeeded { image: PanelImage },
    Failed { reason: String },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct GeneratedPanel {
    #[serde(flatten)]
    pub panel: StoryPanel,
    pub outcome: PanelOutcome,
}

impl GeneratedPanel {
    pub fn succeeded(panel: StoryPanel, image: PanelImage) -> Self {
        Self {
            panel,
            outcome: PanelOutcome::Succeeded { image },
        }
    }

    pub fn failed(panel: StoryPanel, reason: impl Into<String>) -> Self {
        Self {
            panel,
            outcome: PanelOutcome::Failed {
                reason: reason.into(),
            },
        }
    }

    pub fn id(&self) -> &str {
        &self.panel.id
    }

    pub fn image(&self) -> Option<&PanelImage> {
        match &self.outcome {
            PanelOutcome::Succeeded { image } => Some(image),
            PanelOutcome::Failed { .. } => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, PanelOutcome::Failed { .. })
    }

    /// Data URL for succeeded panels, [`ERROR_SENTINEL`] otherwise.
    pub fn image_url(&self) -> Cow<'static, str> {
        match &self.outcome {
            PanelOutcome::Succeeded { image } => Cow::Owned(image.to_data_url()),
            PanelOutcome::Failed { .. } => Cow::Borrowed(ERROR_SENTINEL),
        }
    }
}
