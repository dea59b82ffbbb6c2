use crate::core::error::{ComicError, ComicResult};
use crate::core::model::{Character, GeneratedPanel, PanelImage, StoryPanel};
use crate::services::pipeline::{validate_character, PanelPipeline};
use log::info;

/// New collection with `id`'s artwork replaced. Order, length and every other
/// entry are carried over unchanged.
pub fn with_panel_image(
    panels: &[GeneratedPanel],
    id: &str,
    image: PanelImage,
) -> ComicResult<Vec<GeneratedPanel>> {
    if !panels.iter().any(|p| p.id() == id) {
        return Err(ComicError::not_found(id));
    }

    Ok(panels
        .iter()
        .map(|p| {
            if p.id() == id {
                GeneratedPanel::succeeded(p.panel.clone(), image.clone())
            } else {
                p.clone()
            }
        })
        .collect())
}

/// Everything one comic needs between storyboard submission and export.
/// Dropping the session is "start over".
#[derive(Debug)]
pub struct ComicSession {
    character: Character,
    title: String,
    panels: Vec<GeneratedPanel>,
    retrying: Option<String>,
}

impl ComicSession {
    pub async fn start(
        pipeline: &PanelPipeline,
        character: Character,
        title: &str,
        storyboard: &[StoryPanel],
    ) -> ComicResult<Self> {
        Self::start_with(pipeline, character, title, storyboard, |_, _| {}).await
    }

    pub async fn start_with<F>(
        pipeline: &PanelPipeline,
        character: Character,
        title: &str,
        storyboard: &[StoryPanel],
        on_panel: F,
    ) -> ComicResult<Self>
    where
        F: FnMut(usize, &GeneratedPanel),
    {
        validate_character(&character)?;
        if title.trim().is_empty() {
            return Err(ComicError::InvalidStoryboard("title is empty".to_string()));
        }

        let panels = pipeline
            .generate_all_with(&character, storyboard, on_panel)
            .await?;
        let session = Self {
            character,
            title: title.trim().to_string(),
            panels,
            retrying: None,
        };
        info!(
            "Comic \"{}\" ready: {} of {} panels generated",
            session.title,
            session.succeeded_count(),
            session.panels.len()
        );
        Ok(session)
    }

    pub fn character(&self) -> &Character {
        &self.character
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn panels(&self) -> &[GeneratedPanel] {
        &self.panels
    }

    pub fn retrying(&self) -> Option<&str> {
        self.retrying.as_deref()
    }

    pub fn succeeded_count(&self) -> usize {
        self.panels.iter().filter(|p| !p.is_failed()).count()
    }

    pub fn failed_panels(&self) -> impl Iterator<Item = (usize, &GeneratedPanel)> {
        self.panels.iter().enumerate().filter(|(_, p)| p.is_failed())
    }

    /// Marks `id` as in flight. Only one retry runs per session at a time.
    pub fn begin_retry(&mut self, id: &str) -> ComicResult<()> {
        if let Some(current) = &self.retrying {
            return Err(ComicError::RetryInFlight(current.clone()));
        }
        if !self.panels.iter().any(|p| p.id() == id) {
            return Err(ComicError::not_found(id));
        }
        self.retrying = Some(id.to_string());
        Ok(())
    }

    /// Applies the result of a retry started with [`Self::begin_retry`]. A
    /// failed retry leaves the panel as it was.
    pub fn finish_retry(&mut self, id: &str, result: ComicResult<PanelImage>) -> ComicResult<()> {
        if self.retrying.as_deref() == Some(id) {
            self.retrying = None;
        }
        let image = result?;
        self.panels = with_panel_image(&self.panels, id, image)?;
        Ok(())
    }

    pub async fn retry(&mut self, pipeline: &PanelPipeline, id: &str) -> ComicResult<()> {
        self.begin_retry(id)?;
        let result = pipeline.retry_one(&self.character, &self.panels, id).await;
        self.finish_retry(id, result)
    }
}
