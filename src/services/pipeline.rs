use crate::core::error::{ComicError, ComicResult};
use crate::core::model::{Character, GeneratedPanel, PanelImage, StoryPanel};
use crate::services::imagegen::ImageGenerator;
use crate::services::prompt::panel_request;
use log::{debug, info, warn};
use std::collections::HashSet;

/// Accumulator for one bulk pass: the results so far plus the most recent
/// successful artwork, which becomes the reference for the next panel.
#[derive(Debug, Default)]
pub struct ContinuityChain {
    results: Vec<GeneratedPanel>,
    last_good: Option<PanelImage>,
}

impl ContinuityChain {
    pub fn reference(&self) -> Option<&PanelImage> {
        self.last_good.as_ref()
    }

    /// Failures are recorded but leave the reference untouched, so the next
    /// panel still chains to the last success.
    pub fn record(mut self, panel: StoryPanel, outcome: ComicResult<PanelImage>) -> Self {
        let generated = match outcome {
            Ok(image) => {
                self.last_good = Some(image.clone());
                GeneratedPanel::succeeded(panel, image)
            }
            Err(e) => GeneratedPanel::failed(panel, e.to_string()),
        };
        self.results.push(generated);
        self
    }

    pub fn last(&self) -> Option<&GeneratedPanel> {
        self.results.last()
    }

    pub fn into_results(self) -> Vec<GeneratedPanel> {
        self.results
    }
}

/// Artwork of the closest panel before `index` that succeeded.
pub fn nearest_success(panels: &[GeneratedPanel], index: usize) -> Option<&PanelImage> {
    panels[..index.min(panels.len())]
        .iter()
        .rev()
        .find_map(GeneratedPanel::image)
}

pub fn validate_character(character: &Character) -> ComicResult<()> {
    if character.name.trim().is_empty() {
        return Err(ComicError::InvalidCharacter("name is empty".to_string()));
    }
    if character.description.trim().is_empty() {
        return Err(ComicError::InvalidCharacter("description is empty".to_string()));
    }
    Ok(())
}

pub fn validate_panels(panels: &[StoryPanel]) -> ComicResult<()> {
    if panels.is_empty() {
        return Err(ComicError::InvalidStoryboard("storyboard has no panels".to_string()));
    }

    let mut seen = HashSet::new();
    for (i, panel) in panels.iter().enumerate() {
        if panel.scene.trim().is_empty() || panel.expression.trim().is_empty() {
            return Err(ComicError::InvalidStoryboard(format!(
                "panel {} needs both a scene and an expression",
                i + 1
            )));
        }
        if !seen.insert(panel.id.as_str()) {
            return Err(ComicError::DuplicatePanelId(panel.id.clone()));
        }
    }
    Ok(())
}

#[derive(Debug)]
pub struct PanelPipeline {
    generator: Box<dyn ImageGenerator>,
    aspect_ratio: String,
}

impl PanelPipeline {
    pub fn new(generator: Box<dyn ImageGenerator>, aspect_ratio: impl Into<String>) -> Self {
        Self {
            generator,
            aspect_ratio: aspect_ratio.into(),
        }
    }

    /// One request for one panel. Bulk generation and retries both go through
    /// here so they build identical requests.
    pub async fn generate_panel(
        &self,
        character: &Character,
        panel: &StoryPanel,
        reference: Option<&PanelImage>,
    ) -> ComicResult<PanelImage> {
        let request = panel_request(character, panel, reference, &self.aspect_ratio);
        debug!("Panel {} prompt:\n{}", panel.id, request.full_prompt());
        self.generator.generate(&request).await
    }

    pub async fn generate_all(
        &self,
        character: &Character,
        panels: &[StoryPanel],
    ) -> ComicResult<Vec<GeneratedPanel>> {
        self.generate_all_with(character, panels, |_, _| {}).await
    }

    /// Generates panels strictly one after another. Individual failures end up
    /// in the returned collection; only invalid input fails the whole pass.
    pub async fn generate_all_with<F>(
        &self,
        character: &Character,
        panels: &[StoryPanel],
        mut on_panel: F,
    ) -> ComicResult<Vec<GeneratedPanel>>
    where
        F: FnMut(usize, &GeneratedPanel),
    {
        validate_character(character)?;
        validate_panels(panels)?;

        let total = panels.len();
        let mut chain = ContinuityChain::default();

        for (i, panel) in panels.iter().enumerate() {
            let outcome = self.generate_panel(character, panel, chain.reference()).await;
            match &outcome {
                Ok(_) => info!("Panel {}/{} generated", i + 1, total),
                Err(e) => warn!("Panel {}/{} ({}) failed: {:#}", i + 1, total, panel.id, e),
            }

            chain = chain.record(panel.clone(), outcome);
            if let Some(generated) = chain.last() {
                on_panel(i, generated);
            }
        }

        Ok(chain.into_results())
    }

    /// Regenerates one panel against the caller's snapshot and returns the new
    /// artwork. The caller splices it in; nothing is mutated here.
    pub async fn retry_one(
        &self,
        character: &Character,
        panels: &[GeneratedPanel],
        target_id: &str,
    ) -> ComicResult<PanelImage> {
        let index = panels
            .iter()
            .position(|p| p.id() == target_id)
            .ok_or_else(|| ComicError::not_found(target_id))?;

        let reference = nearest_success(panels, index);
        info!(
            "Retrying panel {} (reference: {})",
            index + 1,
            if reference.is_some() { "yes" } else { "none" }
        );

        self.generate_panel(character, &panels[index].panel, reference)
            .await
    }
}
