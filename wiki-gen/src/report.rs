//! Run report returned to the caller.

use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct GenerationReport {
    pub files_total: usize,
    pub files_generated: usize,
    pub files_reused: usize,
    pub files_failed: usize,
    pub dirs_generated: usize,
    pub dirs_reused: usize,
    pub chunks_indexed: usize,
    pub llm_calls: usize,
    pub elapsed_ms: u64,
}
