//! Knowledge chunk store: append and full scan.
//!
//! Ids are not deduplicated. A row whose metadata or embedding cannot be
//! decoded is still returned, with default metadata or no embedding.

use anyhow::Result;
use rusqlite::{params, Connection};

use super::types::{ChunkMetadata, KnowledgeChunk, NewChunk};
use super::{bytes_to_embedding, embedding_to_bytes};

/// Turn an ingestion request into a chunk, generating an id when absent.
pub fn prepare_chunk(input: NewChunk, embedding: Option<Vec<f32>>) -> KnowledgeChunk {
    KnowledgeChunk {
        id: input
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::now_v7().to_string()),
        text: input.text,
        metadata: input.metadata.unwrap_or_default(),
        embedding,
    }
}

/// Split a document into chunks of whole lines.
///
/// A chunk is closed before the line that would push it past `max_chars`
/// characters; a single longer line becomes its own chunk. Blank chunks are
/// dropped.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0;

    for line in text.lines() {
        let line_chars = line.chars().count();
        if current_chars + line_chars > max_chars && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_chars = 0;
        }
        current.push_str(line);
        current.push('\n');
        current_chars += line_chars + 1;
    }
    chunks.push(current);

    chunks.retain(|c| !c.trim().is_empty());
    chunks
}

/// Build ingestion requests for a file's chunks: ids are `<file name>-<index>`
/// and `source` is the file name.
pub fn file_chunks(file_name: &str, text: &str, max_chars: usize) -> Vec<NewChunk> {
    chunk_text(text, max_chars)
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| NewChunk {
            id: Some(format!("{file_name}-{i}")),
            text: chunk,
            metadata: Some(ChunkMetadata {
                source: Some(file_name.to_string()),
                ..ChunkMetadata::default()
            }),
        })
        .collect()
}

/// Append a chunk. Existing chunks with the same id are left in place.
pub fn append_chunk(conn: &Connection, chunk: &KnowledgeChunk) -> Result<()> {
    let now = chrono::Utc::now().to_rfc3339();
    let metadata_json = serde_json::to_string(&chunk.metadata)?;
    let embedding_blob = chunk.embedding.as_deref().map(embedding_to_bytes);

    conn.execute(
        "INSERT INTO chunks (id, text, metadata, embedding, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![chunk.id, chunk.text, metadata_json, embedding_blob, now],
    )?;
    Ok(())
}

/// Every stored chunk in insertion order.
pub fn all_chunks(conn: &Connection) -> Result<Vec<KnowledgeChunk>> {
    let mut stmt =
        conn.prepare("SELECT seq, id, text, metadata, embedding FROM chunks ORDER BY seq")?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<Vec<u8>>>(4)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let chunks = rows
        .into_iter()
        .map(|(seq, id, text, metadata, embedding)| {
            let metadata = match metadata {
                Some(raw) => serde_json::from_str::<ChunkMetadata>(&raw).unwrap_or_else(|e| {
                    tracing::warn!(seq, error = %e, "unreadable chunk metadata, using default");
                    ChunkMetadata::default()
                }),
                None => ChunkMetadata::default(),
            };
            let embedding = embedding.and_then(|blob| {
                let decoded = bytes_to_embedding(&blob);
                if decoded.is_none() {
                    tracing::warn!(seq, len = blob.len(), "corrupt chunk embedding, ignoring");
                }
                decoded
            });
            KnowledgeChunk {
                id,
                text,
                metadata,
                embedding,
            }
        })
        .collect();

    Ok(chunks)
}

/// Number of stored chunks, and how many of them carry an embedding.
pub fn count_chunks(conn: &Connection) -> Result<(u64, u64)> {
    let (total, embedded): (i64, i64) = conn.query_row(
        "SELECT COUNT(*), COUNT(embedding) FROM chunks",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok((total as u64, embedded as u64))
}
