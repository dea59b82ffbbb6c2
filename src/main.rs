use anyhow::Result;
use comic_crafter::core::config::Config;
use comic_crafter::core::io::{NativeStorage, Storage};
use comic_crafter::services::compose::DocumentComposer;
use comic_crafter::services::imagegen::create_image_generator;
use comic_crafter::services::pipeline::PanelPipeline;
use comic_crafter::services::workflow::ComicWorkflow;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    // 1. Load Config
    let config = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            eprintln!("Please ensure 'config.yml' exists with an image provider section.");
            return Err(e);
        }
    };

    config.ensure_directories()?;

    // 2. Initialize image generation and export
    let generator = create_image_generator(&config)?;
    let pipeline = PanelPipeline::new(generator, config.image.aspect_ratio.clone());
    let composer = DocumentComposer::from_config(&config.export);
    let storage: Arc<dyn Storage> = Arc::new(NativeStorage::new());

    // 3. Run the interactive loop
    let workflow = ComicWorkflow::new(config, pipeline, composer, storage);
    workflow.run().await?;

    Ok(())
}
