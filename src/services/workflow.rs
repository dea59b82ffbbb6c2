use crate::core::config::Config;
use crate::core::error::ComicResult;
use crate::core::io::Storage;
use crate::core::model::{Character, GeneratedPanel, StoryPanel};
use crate::services::compose::progress::ExportPhase;
use crate::services::compose::DocumentComposer;
use crate::services::pipeline::PanelPipeline;
use crate::services::session::ComicSession;
use crate::services::story::{load_storyboard, parse_dialogue_line, StoryAssistant, MAX_SUGGESTED_PANELS};
use anyhow::{bail, Result};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Confirm, CustomType, Select, Text};
use log::info;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StorySource {
    File,
    Assistant,
    Manual,
}

impl fmt::Display for StorySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorySource::File => write!(f, "Load the configured storyboard file"),
            StorySource::Assistant => write!(f, "Let the story assistant draft it"),
            StorySource::Manual => write!(f, "Enter panels by hand"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuAction {
    Retry,
    Export,
    StartOver,
    Quit,
}

impl fmt::Display for MenuAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MenuAction::Retry => write!(f, "Regenerate a panel"),
            MenuAction::Export => write!(f, "Export PDF"),
            MenuAction::StartOver => write!(f, "Start over"),
            MenuAction::Quit => write!(f, "Quit"),
        }
    }
}

fn story_sources(config: &Config) -> Vec<StorySource> {
    let mut sources = Vec::new();
    if config.storyboard.is_some() {
        sources.push(StorySource::File);
    }
    if config.llm.is_some() {
        sources.push(StorySource::Assistant);
    }
    sources.push(StorySource::Manual);
    sources
}

/// One line per panel for the retry picker.
fn panel_label(index: usize, panel: &GeneratedPanel) -> String {
    let status = if panel.is_failed() { " [failed]" } else { "" };
    let scene: String = panel.panel.scene.chars().take(60).collect();
    format!("Panel {}: {}{}", index + 1, scene, status)
}

fn print_summary(session: &ComicSession) {
    println!(
        "\n\"{}\": {} of {} panels generated.",
        session.title(),
        session.succeeded_count(),
        session.panels().len()
    );
    for (i, panel) in session.failed_panels() {
        println!("  Panel {} failed ({})", i + 1, panel.panel.scene);
    }
}

pub struct ComicWorkflow {
    config: Config,
    pipeline: PanelPipeline,
    composer: DocumentComposer,
    storage: Arc<dyn Storage>,
}

impl ComicWorkflow {
    pub fn new(
        config: Config,
        pipeline: PanelPipeline,
        composer: DocumentComposer,
        storage: Arc<dyn Storage>,
    ) -> Self {
        Self {
            config,
            pipeline,
            composer,
            storage,
        }
    }

    pub async fn run(&self) -> Result<()> {
        loop {
            let Some(session) = self.new_session().await? else {
                continue;
            };
            if !self.session_menu(session).await? {
                break;
            }
        }
        println!("Bye.");
        Ok(())
    }

    /// Collects character, title and storyboard, then runs the bulk pass.
    /// `None` means the input was rejected and the user should start again.
    async fn new_session(&self) -> Result<Option<ComicSession>> {
        let character = Character {
            name: Text::new("Character name:").prompt()?,
            description: Text::new("Character description:")
                .with_help_message("Appearance, outfit, anything the artist must keep consistent")
                .prompt()?,
        };
        let title = Text::new("Comic title:").prompt()?;

        let storyboard = match self.storyboard(&character).await {
            Ok(panels) => panels,
            Err(e) => {
                println!("Could not build the storyboard: {:#}", e);
                return Ok(None);
            }
        };

        let pb = ProgressBar::new(storyboard.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("#>-"),
        );
        pb.set_message("Generating panels");

        let started =
            ComicSession::start_with(&self.pipeline, character, &title, &storyboard, |i, panel| {
                if panel.is_failed() {
                    pb.println(format!("Panel {} failed; it can be retried later.", i + 1));
                }
                pb.inc(1);
            })
            .await;
        pb.finish_and_clear();

        match started {
            Ok(session) => {
                print_summary(&session);
                Ok(Some(session))
            }
            Err(e) => {
                println!("{}", e);
                Ok(None)
            }
        }
    }

    async fn storyboard(&self, character: &Character) -> Result<Vec<StoryPanel>> {
        let source = Select::new("Storyboard:", story_sources(&self.config)).prompt()?;
        match source {
            StorySource::File => {
                let Some(path) = &self.config.storyboard else {
                    bail!("No storyboard file configured");
                };
                let panels = load_storyboard(self.storage.as_ref(), path).await?;
                println!("Loaded {} panels from {}", panels.len(), path);
                Ok(panels)
            }
            StorySource::Assistant => {
                let Some(llm) = &self.config.llm else {
                    bail!("No llm section in config.yml");
                };
                let assistant = StoryAssistant::from_config(llm)?;
                let idea = Text::new("Story idea:").prompt()?;
                let count = CustomType::<usize>::new("Number of panels:")
                    .with_default(4)
                    .with_help_message(&format!("1 to {}", MAX_SUGGESTED_PANELS))
                    .prompt()?;

                let spinner = ProgressBar::new_spinner();
                spinner.enable_steady_tick(Duration::from_millis(100));
                spinner.set_message("Writing story...");
                let result = assistant.suggest(character, &idea, count).await;
                spinner.finish_and_clear();

                let panels = result?;
                for (i, panel) in panels.iter().enumerate() {
                    println!("  {}. {} ({})", i + 1, panel.scene, panel.expression);
                }
                Ok(panels)
            }
            StorySource::Manual => manual_storyboard(),
        }
    }

    /// Returns false when the user wants to quit.
    async fn session_menu(&self, mut session: ComicSession) -> Result<bool> {
        let actions = vec![
            MenuAction::Retry,
            MenuAction::Export,
            MenuAction::StartOver,
            MenuAction::Quit,
        ];

        loop {
            match Select::new("What next?", actions.clone()).prompt()? {
                MenuAction::Retry => self.retry(&mut session).await?,
                MenuAction::Export => self.export(&session).await,
                MenuAction::StartOver => return Ok(true),
                MenuAction::Quit => return Ok(false),
            }
        }
    }

    async fn retry(&self, session: &mut ComicSession) -> Result<()> {
        let labels: Vec<String> = session
            .panels()
            .iter()
            .enumerate()
            .map(|(i, p)| panel_label(i, p))
            .collect();
        let starting = session
            .failed_panels()
            .next()
            .map(|(i, _)| i)
            .unwrap_or(0);

        let choice = Select::new("Panel to regenerate:", labels)
            .with_starting_cursor(starting)
            .raw_prompt()?;
        let id = session.panels()[choice.index].id().to_string();

        let spinner = ProgressBar::new_spinner();
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner.set_message(format!("Regenerating panel {}...", choice.index + 1));
        let result = session.retry(&self.pipeline, &id).await;
        spinner.finish_and_clear();

        match result {
            Ok(()) => println!("Panel {} regenerated.", choice.index + 1),
            Err(e) => println!("Failed to regenerate panel {}: {}", choice.index + 1, e),
        }
        Ok(())
    }

    async fn export(&self, session: &ComicSession) {
        let spinner = ProgressBar::new_spinner();
        spinner.enable_steady_tick(Duration::from_millis(100));
        let observer = |phase: &ExportPhase| {
            info!("{}", phase);
            spinner.set_message(phase.to_string());
        };

        let result: ComicResult<PathBuf> = async {
            let document = self
                .composer
                .compose(session.title(), session.character(), session.panels(), &observer)
                .await?;
            self.composer
                .save(&document, self.storage.as_ref(), Path::new(&self.config.output_folder))
                .await
        }
        .await;
        spinner.finish_and_clear();

        match result {
            Ok(path) => println!("Saved {}", path.display()),
            Err(e) => println!("Failed to export PDF: {}", e),
        }
    }
}

fn manual_storyboard() -> Result<Vec<StoryPanel>> {
    let mut panels = Vec::new();
    loop {
        println!("-- Panel {} --", panels.len() + 1);
        let scene = Text::new("Scene:").prompt()?;
        let expression = Text::new("Expression / action:").prompt()?;
        let mut panel = StoryPanel::new(scene, expression);

        loop {
            let line = Text::new("Dialogue:")
                .with_help_message("\"Speaker: text\" for speech, plain text for a caption, 'thought' in the speaker for a thought bubble; empty to finish")
                .prompt()?;
            match parse_dialogue_line(&line) {
                Some(entry) => panel = panel.with_dialogue(entry),
                None => break,
            }
        }
        panels.push(panel);

        if !Confirm::new("Add another panel?").with_default(true).prompt()? {
            return Ok(panels);
        }
    }
}
