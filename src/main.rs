use std::error::Error;

use oya_engine::{Engine, EngineConfig};
use wiki_gen::{CancelToken, CorrectionNotes};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Load environment variables from .env file when present.
    let _ = dotenvy::dotenv();

    oya_engine::init_tracing();

    let engine = Engine::new(EngineConfig::from_env()?)?;
    let report = engine
        .generate(CorrectionNotes::default(), CancelToken::new())
        .await?;
    tracing::info!(
        files_generated = report.files_generated,
        files_reused = report.files_reused,
        dirs_generated = report.dirs_generated,
        chunks_indexed = report.chunks_indexed,
        elapsed_ms = report.elapsed_ms,
        "wiki generation complete"
    );
    Ok(())
}
