//! Paginated PDF export: a cover page followed by panel pages laid out on a
//! fixed grid over a shared page background.

pub mod background;
pub mod capture;
pub mod filename;
pub mod layout;
pub mod overlay;
pub mod pdf;
pub mod progress;
pub mod theme;

use crate::core::error::{ComicError, ComicResult};
use crate::core::io::Storage;
use crate::core::model::{Character, GeneratedPanel};
use anyhow::Context;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use background::{encode_png, generate_background, Palette};
use capture::{PanelCapture, RasterCapture};
use filename::safe_file_name;
use layout::{plan_cover, plan_document, DocumentPlan, GridSpec, PageGeometry, Rect};
use overlay::{layout_overlays, panel_badge, unavailable_label, OverlayStyle, Tail, BADGE_RADIUS};
use pdf::PdfWriter;
use progress::{ExportObserver, ExportPhase};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundStyle {
    Procedural,
    Solid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub columns: u32,
    pub rows: u32,
    pub margin: f32,
    pub gap: f32,
    pub capture_scale: f32,
    pub background: BackgroundStyle,
    pub dot_spacing: u32,
    pub dot_radius: u32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            columns: 2,
            rows: 2,
            margin: 40.0,
            gap: 20.0,
            capture_scale: 2.0,
            background: BackgroundStyle::Procedural,
            dot_spacing: 18,
            dot_radius: 2,
        }
    }
}

impl ExportConfig {
    pub fn grid(&self) -> GridSpec {
        GridSpec {
            columns: self.columns,
            rows: self.rows,
            margin: self.margin,
            gap: self.gap,
        }
    }
}

/// A finished export, held in memory until it is saved.
#[derive(Debug, Clone)]
pub struct ComicDocument {
    pub file_name: String,
    pub plan: DocumentPlan,
    pub page_count: usize,
    pub bytes: Vec<u8>,
}

pub struct DocumentComposer {
    config: ExportConfig,
    page: PageGeometry,
    capture: Box<dyn PanelCapture>,
}

impl DocumentComposer {
    pub fn new(config: ExportConfig, capture: Box<dyn PanelCapture>) -> Self {
        Self {
            config,
            page: PageGeometry::A4,
            capture,
        }
    }

    pub fn from_config(config: &ExportConfig) -> Self {
        let capture = RasterCapture::new(config.capture_scale);
        Self::new(config.clone(), Box::new(capture))
    }

    pub fn plan(&self, panel_count: usize) -> ComicResult<DocumentPlan> {
        plan_document(panel_count, self.page, self.config.grid()).map_err(ComicError::Export)
    }

    /// Builds the whole document in memory. Any failure aborts the export and
    /// nothing is returned.
    pub async fn compose(
        &self,
        title: &str,
        character: &Character,
        panels: &[GeneratedPanel],
        observer: &dyn ExportObserver,
    ) -> ComicResult<ComicDocument> {
        let plan = self.plan(panels.len())?;
        let (bytes, page_count) = self
            .render(&plan, title, character, panels, observer)
            .await
            .map_err(ComicError::Export)?;

        let document = ComicDocument {
            file_name: format!("{}.pdf", safe_file_name(title)),
            plan,
            page_count,
            bytes,
        };
        info!(
            "Composed {} ({} pages, {} bytes)",
            document.file_name,
            document.page_count,
            document.bytes.len()
        );
        Ok(document)
    }

    async fn render(
        &self,
        plan: &DocumentPlan,
        title: &str,
        character: &Character,
        panels: &[GeneratedPanel],
        observer: &dyn ExportObserver,
    ) -> anyhow::Result<(Vec<u8>, usize)> {
        observer.on_phase(&ExportPhase::CreatingTheme);
        let backdrop = self.page_backdrop()?;

        observer.on_phase(&ExportPhase::CreatingTitlePage);
        let subject = format!("A comic about {}", character.name);
        let mut writer = PdfWriter::new(title, &subject, plan.page)?;
        self.draw_backdrop(&writer, backdrop.as_deref())?;
        draw_cover(&writer, title, character, &plan.page);

        let total = plan.panel_pages.len();
        for page in &plan.panel_pages {
            observer.on_phase(&ExportPhase::ProcessingPage {
                page: page.number,
                total,
            });
            writer.add_page();
            self.draw_backdrop(&writer, backdrop.as_deref())?;

            for slot in &page.slots {
                let panel = panels
                    .get(slot.panel_index)
                    .context("Panel layout refers to a missing panel")?;
                self.draw_panel(&writer, panel, slot.panel_index + 1, slot.rect)
                    .await
                    .with_context(|| format!("Failed to render panel {}", slot.panel_index + 1))?;
            }
        }

        observer.on_phase(&ExportPhase::Saving);
        let pages = writer.page_count();
        if pages != plan.page_count() {
            anyhow::bail!("Rendered {} pages, planned {}", pages, plan.page_count());
        }
        Ok((writer.finish()?, pages))
    }

    /// PNG of the procedural page texture, or `None` for a plain fill.
    fn page_backdrop(&self) -> anyhow::Result<Option<Vec<u8>>> {
        if self.config.background == BackgroundStyle::Solid || self.config.dot_spacing == 0 {
            return Ok(None);
        }
        let img = generate_background(
            self.page.width.round() as u32,
            self.page.height.round() as u32,
            Palette {
                base: theme::PAGE_FILL,
                dot: theme::PAGE_DOTS,
            },
            self.config.dot_spacing,
            self.config.dot_radius,
        );
        debug!("Page background {}x{}", img.width(), img.height());
        encode_png(&img).map(Some)
    }

    fn draw_backdrop(&self, writer: &PdfWriter, backdrop: Option<&[u8]>) -> anyhow::Result<()> {
        match backdrop {
            Some(png) => writer.image(png, self.page.bounds()),
            None => {
                writer.fill_rect(self.page.bounds(), theme::PAGE_FILL);
                Ok(())
            }
        }
    }

    async fn draw_panel(
        &self,
        writer: &PdfWriter,
        panel: &GeneratedPanel,
        number: usize,
        cell: Rect,
    ) -> anyhow::Result<()> {
        let captured = self.capture.capture(panel, cell.width).await?;

        let frame = Rect::new(cell.x - 1.5, cell.y - 1.5, cell.width + 3.0, cell.height + 3.0);
        writer.fill_rect(frame, theme::PANEL_BORDER);
        writer.image(&captured.png, cell)?;

        if !captured.available {
            writer.text(&unavailable_label(cell), theme::MUTED_TEXT);
        }

        for overlay in layout_overlays(&panel.panel, cell) {
            let (fill, text, outline) = match overlay.style {
                OverlayStyle::Caption => (
                    theme::blend(theme::PANEL_FILL, theme::CAPTION_FILL, 0.8),
                    theme::CAPTION_TEXT,
                    Some((theme::PANEL_BORDER, 0.75)),
                ),
                OverlayStyle::Speech => (theme::BUBBLE_FILL, theme::BUBBLE_TEXT, None),
                OverlayStyle::Thought => (
                    theme::BUBBLE_FILL,
                    theme::BUBBLE_TEXT,
                    Some((theme::THOUGHT_BORDER, 1.5)),
                ),
            };

            writer.rect(overlay.plate, fill, outline);
            match &overlay.tail {
                Some(Tail::Pointer(points)) => writer.fill_polygon(points, fill),
                Some(Tail::Dots(dots)) => {
                    for &(cx, cy, r) in dots {
                        writer.circle(cx, cy, r, fill, outline);
                    }
                }
                None => {}
            }
            if let Some(speaker) = &overlay.speaker {
                writer.text(speaker, theme::SPEAKER_TEXT);
            }
            for line in &overlay.lines {
                writer.text(line, text);
            }
        }

        let ((cx, cy), label) = panel_badge(number, cell);
        writer.circle(cx, cy, BADGE_RADIUS, theme::BADGE_FILL, Some((theme::PANEL_BORDER, 1.5)));
        writer.text(&label, theme::BADGE_TEXT);
        Ok(())
    }

    /// Writes the document into `folder` and returns its path. The file only
    /// appears once it is complete.
    pub async fn save(
        &self,
        document: &ComicDocument,
        storage: &dyn Storage,
        folder: &Path,
    ) -> ComicResult<PathBuf> {
        let path = folder.join(&document.file_name);
        storage
            .write(&path.to_string_lossy(), &document.bytes)
            .await
            .map_err(ComicError::Export)?;
        info!("Saved {}", path.display());
        Ok(path)
    }
}

fn draw_cover(writer: &PdfWriter, title: &str, character: &Character, page: &PageGeometry) {
    let cover = plan_cover(title, character, page);

    writer.rect(
        cover.plaque,
        theme::blend(theme::PAGE_FILL, theme::BADGE_FILL, 0.6),
        Some((theme::PANEL_BORDER, 1.0)),
    );
    for line in &cover.title {
        writer.text(line, theme::TITLE_TEXT);
    }
    writer.text(&cover.subtitle, theme::SUBTITLE_TEXT);
    writer.text(&cover.footer, theme::ACCENT);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::NativeStorage;
    use crate::core::model::{DialogueEntry, PanelImage, StoryPanel};
    use async_trait::async_trait;
    use capture::CapturedPanel;
    use std::sync::{Arc, Mutex};

    // Records capture order and hands back a tiny solid tile.
    struct FakeCapture {
        seen: Arc<Mutex<Vec<String>>>,
        fail_on: Option<usize>,
    }

    #[async_trait]
    impl PanelCapture for FakeCapture {
        async fn capture(&self, panel: &GeneratedPanel, _side_pt: f32) -> anyhow::Result<CapturedPanel> {
            let mut seen = self.seen.lock().unwrap();
            if self.fail_on == Some(seen.len()) {
                anyhow::bail!("surface detached");
            }
            seen.push(panel.panel.scene.clone());
            let png = encode_png(&image::RgbImage::from_pixel(4, 4, image::Rgb([9, 9, 9])))?;
            Ok(CapturedPanel {
                png,
                width: 4,
                height: 4,
                available: !panel.is_failed(),
            })
        }
    }

    fn composer(fail_on: Option<usize>) -> (DocumentComposer, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let capture = FakeCapture {
            seen: seen.clone(),
            fail_on,
        };
        let config = ExportConfig {
            dot_spacing: 40,
            ..Default::default()
        };
        (DocumentComposer::new(config, Box::new(capture)), seen)
    }

    fn character() -> Character {
        Character {
            name: "Nova".to_string(),
            description: "A pilot".to_string(),
        }
    }

    fn panels(n: usize) -> Vec<GeneratedPanel> {
        (0..n)
            .map(|i| {
                let panel = StoryPanel::new(format!("scene {}", i), "calm")
                    .with_dialogue(DialogueEntry::new(Some("Nova".to_string()), "Hello"));
                if i % 3 == 1 {
                    GeneratedPanel::failed(panel, "quota")
                } else {
                    GeneratedPanel::succeeded(panel, PanelImage::new("image/png", vec![1]))
                }
            })
            .collect()
    }

    #[tokio::test]
    async fn test_compose_paginates_in_order() -> anyhow::Result<()> {
        let (composer, seen) = composer(None);
        let phases = Mutex::new(Vec::new());
        let observer = |p: &ExportPhase| phases.lock().unwrap().push(p.clone());

        let doc = composer
            .compose("Nova Takes Flight", &character(), &panels(5), &observer)
            .await?;

        assert!(doc.bytes.starts_with(b"%PDF"));
        assert_eq!(doc.page_count, 3);
        assert_eq!(doc.file_name, "nova_takes_flight.pdf");
        assert_eq!(
            seen.lock().unwrap().as_slice(),
            ["scene 0", "scene 1", "scene 2", "scene 3", "scene 4"]
        );
        assert_eq!(
            phases.lock().unwrap().as_slice(),
            [
                ExportPhase::CreatingTheme,
                ExportPhase::CreatingTitlePage,
                ExportPhase::ProcessingPage { page: 1, total: 2 },
                ExportPhase::ProcessingPage { page: 2, total: 2 },
                ExportPhase::Saving,
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_no_panels_gives_cover_only() -> anyhow::Result<()> {
        let (composer, seen) = composer(None);
        let doc = composer
            .compose("!!!", &character(), &[], &progress::LogObserver)
            .await?;
        assert_eq!(doc.page_count, 1);
        assert_eq!(doc.file_name, "comic.pdf");
        assert!(seen.lock().unwrap().is_empty());
        Ok(())
    }

    // Mirrors the CLI export: save only runs on a composed document.
    async fn export_into(
        composer: &DocumentComposer,
        panels: &[GeneratedPanel],
        folder: &Path,
    ) -> ComicResult<PathBuf> {
        let document = composer
            .compose("Broken", &character(), panels, &progress::LogObserver)
            .await?;
        composer.save(&document, &NativeStorage::new(), folder).await
    }

    #[tokio::test]
    async fn test_capture_failure_aborts_without_saving() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let (composer, seen) = composer(Some(2));

        let err = export_into(&composer, &panels(4), dir.path()).await.unwrap_err();

        assert!(matches!(err, ComicError::Export(_)));
        assert_eq!(seen.lock().unwrap().len(), 2);
        assert!(std::fs::read_dir(dir.path())?.next().is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_save_leaves_no_partial_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::create_dir(dir.path().join("broken.pdf"))?;
        let (composer, _) = composer(None);

        let err = export_into(&composer, &panels(2), dir.path()).await.unwrap_err();

        assert!(matches!(err, ComicError::Export(_)));
        assert!(!dir.path().join("broken.pdf.part").exists());
        assert!(dir.path().join("broken.pdf").is_dir());
        Ok(())
    }

    #[tokio::test]
    async fn test_save_writes_complete_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let (composer, _) = composer(None);
        let doc = composer
            .compose("Save Me", &character(), &panels(2), &progress::LogObserver)
            .await?;

        let path = composer.save(&doc, &NativeStorage::new(), dir.path()).await?;
        assert_eq!(path, dir.path().join("save_me.pdf"));
        assert_eq!(std::fs::read(&path)?, doc.bytes);
        assert!(!dir.path().join("save_me.pdf.part").exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_compose_twice_gives_same_layout() -> anyhow::Result<()> {
        let (composer, seen) = composer(None);
        let panels = panels(7);

        let first = composer
            .compose("Again", &character(), &panels, &progress::LogObserver)
            .await?;
        let second = composer
            .compose("Again", &character(), &panels, &progress::LogObserver)
            .await?;

        assert_eq!(first.page_count, second.page_count);
        assert_eq!(first.file_name, second.file_name);
        assert_eq!(first.plan, second.plan);
        let slots: Vec<Rect> = first
            .plan
            .panel_pages
            .iter()
            .flat_map(|p| p.slots.iter().map(|s| s.rect))
            .collect();
        assert_eq!(slots.len(), 7);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 14);
        assert_eq!(seen[..7], seen[7..]);
        Ok(())
    }

    #[tokio::test]
    async fn test_pages_share_one_background() -> anyhow::Result<()> {
        let (composer, _) = composer(None);
        let failed = |n: usize| -> Vec<GeneratedPanel> {
            (0..n)
                .map(|i| GeneratedPanel::failed(StoryPanel::new(format!("scene {}", i), "calm"), "quota"))
                .collect()
        };

        let cover = composer
            .compose("Size", &character(), &[], &progress::LogObserver)
            .await?;
        let long = composer
            .compose("Size", &character(), &failed(20), &progress::LogObserver)
            .await?;

        assert_eq!(long.page_count, 6);
        let per_page = (long.bytes.len() - cover.bytes.len()) / 5;
        let raw_backdrop = 595 * 842 * 3;
        assert!(per_page < raw_backdrop / 20, "each page added {} bytes", per_page);
        Ok(())
    }

    #[tokio::test]
    async fn test_document_names_character() -> anyhow::Result<()> {
        let (composer, _) = composer(None);
        let doc = composer
            .compose("Nova Takes Flight", &character(), &panels(1), &progress::LogObserver)
            .await?;
        let has = |needle: &[u8]| doc.bytes.windows(needle.len()).any(|w| w == needle);
        assert!(has(b"A comic about Nova"));
        assert!(has(b"Comic Crafter AI"));
        Ok(())
    }

    #[test]
    fn test_plan_is_repeatable() {
        let (composer, _) = composer(None);
        assert_eq!(composer.plan(9).unwrap(), composer.plan(9).unwrap());
        assert_eq!(composer.plan(9).unwrap().page_count(), 4);
    }

    #[test]
    fn test_export_config_partial_yaml() {
        let config: ExportConfig =
            serde_yaml_ng::from_str("columns: 3\nbackground: solid\n").unwrap();
        assert_eq!(config.columns, 3);
        assert_eq!(config.rows, 2);
        assert_eq!(config.background, BackgroundStyle::Solid);
    }
}
