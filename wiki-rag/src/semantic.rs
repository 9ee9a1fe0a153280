//! Thin adapter around `qdrant-client` for the semantic store.
//!
//! Concentrates all Qdrant interactions behind a minimal API (ensure,
//! reset, upsert, search) and keeps the rest of the crate decoupled from
//! the client's builder surface. Point IDs are deterministic UUIDv5 hashes
//! of the chunk ID, so re-upserting identical chunks overwrites in place.

use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, Distance, Filter, PointStruct, SearchPointsBuilder,
    UpsertPointsBuilder, Value as QValue, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::chunk::{Chunk, ChunkKind, ChunkMetadata};
use crate::errors::RagError;

/// Connection settings for the semantic store.
#[derive(Debug, Clone)]
pub struct SemanticConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub collection: String,
    /// Embedding dimensionality; must match the embedding profile.
    pub dim: usize,
}

/// One semantic hit: reconstructed chunk plus similarity score.
#[derive(Debug, Clone)]
pub struct SemanticHit {
    pub chunk: Chunk,
    /// Cosine similarity as returned by Qdrant (higher is better).
    pub score: f32,
}

impl SemanticHit {
    /// Distance view of the score, used by confidence derivation.
    pub fn distance(&self) -> f32 {
        1.0 - self.score
    }
}

pub struct SemanticStore {
    client: Qdrant,
    collection: String,
    dim: usize,
}

impl SemanticStore {
    pub fn new(cfg: &SemanticConfig) -> Result<Self, RagError> {
        if cfg.dim == 0 {
            return Err(RagError::Config("embedding dim must be non-zero".into()));
        }
        let mut builder = Qdrant::from_url(&cfg.url);
        if let Some(key) = &cfg.api_key {
            builder = builder.api_key(key.clone());
        }
        let client = builder
            .build()
            .map_err(|e| RagError::Qdrant(e.to_string()))?;
        Ok(Self {
            client,
            collection: cfg.collection.clone(),
            dim: cfg.dim,
        })
    }

    /// Create the collection if missing.
    pub async fn ensure_collection(&self) -> Result<(), RagError> {
        match self.client.collection_info(&self.collection).await {
            Ok(_) => {
                debug!("collection '{}' already exists", self.collection);
                return Ok(());
            }
            Err(err) => {
                warn!(
                    "collection '{}' not found, creating (error={err})",
                    self.collection
                );
            }
        }
        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection)
                    .vectors_config(VectorParamsBuilder::new(self.dim as u64, Distance::Cosine)),
            )
            .await
            .map_err(|e| RagError::Qdrant(e.to_string()))?;
        info!("collection '{}' created", self.collection);
        Ok(())
    }

    /// Drop and recreate the collection (indexing passes rebuild from
    /// scratch).
    pub async fn reset(&self) -> Result<(), RagError> {
        let _ = self.client.delete_collection(&self.collection).await;
        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection)
                    .vectors_config(VectorParamsBuilder::new(self.dim as u64, Distance::Cosine)),
            )
            .await
            .map_err(|e| RagError::Qdrant(e.to_string()))?;
        info!("collection '{}' reset", self.collection);
        Ok(())
    }

    /// Upsert a batch of embedded chunks. Returns the number written.
    pub async fn upsert_chunks(
        &self,
        batch: Vec<(Chunk, Vec<f32>)>,
    ) -> Result<usize, RagError> {
        if batch.is_empty() {
            return Ok(0);
        }
        let mut points = Vec::with_capacity(batch.len());
        for (chunk, vector) in batch {
            if vector.len() != self.dim {
                return Err(RagError::Embedding(format!(
                    "vector size mismatch: got={}, want={}",
                    vector.len(),
                    self.dim
                )));
            }
            let point_id = Uuid::new_v5(&Uuid::NAMESPACE_URL, chunk.id.as_bytes()).to_string();
            points.push(PointStruct::new(point_id, vector, chunk_payload(&chunk)));
        }
        let count = points.len();
        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points))
            .await
            .map_err(|e| RagError::Qdrant(e.to_string()))?;
        debug!(count, "semantic upsert complete");
        Ok(count)
    }

    /// Vector search, optionally filtered by metadata equality.
    pub async fn search(
        &self,
        vector: Vec<f32>,
        top_k: u64,
        filter_layer: Option<&str>,
    ) -> Result<Vec<SemanticHit>, RagError> {
        let mut builder =
            SearchPointsBuilder::new(&self.collection, vector, top_k).with_payload(true);
        if let Some(layer) = filter_layer {
            builder = builder.filter(Filter::must([Condition::matches(
                "layer",
                layer.to_string(),
            )]));
        }
        let res = self
            .client
            .search_points(builder)
            .await
            .map_err(|e| RagError::Qdrant(e.to_string()))?;

        let mut out = Vec::with_capacity(res.result.len());
        for point in res.result {
            if let Some(chunk) = payload_to_chunk(&point.payload) {
                out.push(SemanticHit {
                    chunk,
                    score: point.score,
                });
            }
        }
        debug!(hits = out.len(), "semantic search complete");
        Ok(out)
    }
}

fn chunk_payload(chunk: &Chunk) -> qdrant_client::Payload {
    let value = serde_json::json!({
        "chunk_id": chunk.id,
        "content": chunk.content,
        "document_path": chunk.document_path,
        "title": chunk.title,
        "section_header": chunk.section_header,
        "chunk_index": chunk.chunk_index,
        "token_estimate": chunk.token_estimate,
        "kind": chunk.kind.as_str(),
        "layer": chunk.metadata.layer,
        "symbols": chunk.metadata.symbols,
        "imports": chunk.metadata.imports,
        "entry_points": chunk.metadata.entry_points,
        "source_file": chunk.metadata.source_file,
    });
    qdrant_client::Payload::try_from(value).unwrap_or_default()
}

fn payload_to_chunk(
    payload: &std::collections::HashMap<String, QValue>,
) -> Option<Chunk> {
    let get_str = |key: &str| -> Option<String> {
        payload.get(key).and_then(|v| match &v.kind {
            Some(qdrant_client::qdrant::value::Kind::StringValue(s)) => Some(s.clone()),
            _ => None,
        })
    };
    let get_list = |key: &str| -> Vec<String> {
        payload
            .get(key)
            .and_then(|v| match &v.kind {
                Some(qdrant_client::qdrant::value::Kind::ListValue(l)) => Some(
                    l.values
                        .iter()
                        .filter_map(|x| match &x.kind {
                            Some(qdrant_client::qdrant::value::Kind::StringValue(s)) => {
                                Some(s.clone())
                            }
                            _ => None,
                        })
                        .collect(),
                ),
                _ => None,
            })
            .unwrap_or_default()
    };
    let get_usize = |key: &str| -> usize {
        payload
            .get(key)
            .and_then(|v| match &v.kind {
                Some(qdrant_client::qdrant::value::Kind::IntegerValue(i)) => Some(*i as usize),
                _ => None,
            })
            .unwrap_or(0)
    };

    let kind = match get_str("kind").as_deref() {
        Some("note") => ChunkKind::Note,
        Some("code") => ChunkKind::Code,
        _ => ChunkKind::Wiki,
    };

    Some(Chunk {
        id: get_str("chunk_id")?,
        content: get_str("content").unwrap_or_default(),
        document_path: get_str("document_path").unwrap_or_default(),
        title: get_str("title").unwrap_or_default(),
        section_header: get_str("section_header").unwrap_or_default(),
        chunk_index: get_usize("chunk_index"),
        token_estimate: get_usize("token_estimate"),
        kind,
        metadata: ChunkMetadata {
            layer: get_str("layer").unwrap_or_default(),
            symbols: get_list("symbols"),
            imports: get_list("imports"),
            entry_points: get_list("entry_points"),
            source_file: get_str("source_file"),
        },
    })
}
