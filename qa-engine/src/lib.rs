//! Q&A engine.
//!
//! A question is classified into one of four modes and routed to a
//! specialized retriever: diagnostic and analytical questions exploit the
//! code index, exploratory questions walk the graph, conceptual questions
//! go through hybrid search. The CGRAG loop then iterates: answer, let the
//! model name what is missing, resolve those gaps against the code index
//! or the vector store, and re-ask up to a pass cap. Quick mode does a
//! single pass over the initial context.
//!
//! Q&A is read-only: it shares the promoted stores and never mutates them.

pub mod anchors;
pub mod answer;
pub mod classify;
pub mod confidence;
pub mod engine;
pub mod errors;
pub mod fetch;
pub mod gaps;
pub mod prompts;
pub mod retrievers;
pub mod session;
pub mod types;

pub use classify::{Classification, QueryMode};
pub use engine::{QaCancel, QaConfig, QaEngine};
pub use errors::QaError;
pub use fetch::SourceFetcher;
pub use types::{
    CgragStats, Citation, Confidence, IssueRef, QaEvent, QaRequest, QaResponse, SearchQuality,
};
