mod helpers;

use std::sync::Arc;

use memoria::embedding::DisabledEmbeddingProvider;
use memoria::memory::search::{cosine_similarity, retrieve, RankConfig, RetrievalPath, CONTEXT_HEADER};
use memoria::memory::types::{ChunkMetadata, KnowledgeChunk, NewChunk};

fn chunk(id: &str, text: &str, embedding: Option<Vec<f32>>) -> KnowledgeChunk {
    KnowledgeChunk {
        id: id.into(),
        text: text.into(),
        metadata: ChunkMetadata::default(),
        embedding,
    }
}

fn new_chunk(id: Option<&str>, text: &str) -> NewChunk {
    NewChunk {
        id: id.map(str::to_string),
        text: text.into(),
        metadata: None,
    }
}

#[test]
fn cosine_identity_and_orthogonality() {
    let v = [0.3f32, -1.2, 4.0];
    assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
}

#[test]
fn only_chunks_above_threshold_are_returned() {
    // query [1, 0]; first chunk scores 0.9, second 0.3
    let high = vec![0.9f32, (1.0f32 - 0.81).sqrt()];
    let low = vec![0.3f32, (1.0f32 - 0.09).sqrt()];
    let chunks = vec![chunk("high", "close", Some(high)), chunk("low", "far", Some(low))];

    let result = retrieve("anything", Some(&[1.0, 0.0]), &chunks, &RankConfig::default());
    assert_eq!(result.path, RetrievalPath::Semantic);
    assert_eq!(result.candidates.len(), 1);
    assert_eq!(result.candidates[0].chunk.id, "high");
    assert!((result.candidates[0].score - 0.9).abs() < 1e-5);
}

#[test]
fn keyword_fallback_when_query_cannot_be_embedded() {
    let chunks = vec![
        chunk("a", "apple pie recipe", None),
        chunk("b", "car repair guide", None),
    ];
    let result = retrieve("apple recipe", None, &chunks, &RankConfig::default());

    assert_eq!(result.path, RetrievalPath::Keyword);
    assert_eq!(result.candidates.len(), 1);
    assert_eq!(result.candidates[0].chunk.id, "a");
    assert_eq!(result.candidates[0].score, 2.0);

    let context = result.context().unwrap();
    assert!(context.starts_with(CONTEXT_HEADER));
    assert!(context.ends_with("\n- apple pie recipe"));
}

#[test]
fn weak_semantic_matches_fall_back_to_keywords() {
    let chunks = vec![
        chunk("a", "pricing plans and tiers", Some(vec![0.0, 1.0])),
        chunk("b", "contact form", Some(vec![0.1, 1.0])),
    ];
    let result = retrieve("pricing", Some(&[1.0, 0.0]), &chunks, &RankConfig::default());
    assert_eq!(result.path, RetrievalPath::Keyword);
    assert_eq!(result.candidates[0].chunk.id, "a");
}

#[test]
fn nothing_found_means_no_context_block() {
    let chunks = vec![chunk("a", "car repair guide", None)];
    let result = retrieve("hi", None, &chunks, &RankConfig::default());
    assert_eq!(result.path, RetrievalPath::None);
    assert!(result.context().is_none());
}

#[tokio::test]
async fn duplicate_ids_both_survive_ingestion() {
    let service = helpers::service(
        Arc::new(DisabledEmbeddingProvider),
        Arc::new(helpers::ScriptedModel::new("ok")),
    );

    let first = service
        .ingest(vec![new_chunk(Some("dup"), "first version")])
        .await
        .unwrap();
    let second = service
        .ingest(vec![
            new_chunk(Some("dup"), "second version"),
            new_chunk(Some("dup"), "third version"),
        ])
        .await
        .unwrap();
    assert_eq!((first, second), (1, 2));

    let chunks = service
        .database()
        .run(|conn| memoria::memory::documents::all_chunks(conn))
        .await
        .unwrap();
    assert_eq!(chunks.len(), 3);
    assert!(chunks.iter().all(|c| c.id == "dup" && c.embedding.is_none()));
}

#[tokio::test]
async fn ingested_embeddings_drive_semantic_search() {
    let embedder = helpers::TableEmbedder::new(&[
        ("Open the nutrition calculator from the top menu.", vec![1.0, 0.0, 0.0]),
        ("The storyteller writes bedtime stories.", vec![0.0, 1.0, 0.0]),
        ("how do I count calories", vec![0.95, 0.1, 0.0]),
    ]);
    let service = helpers::service(
        Arc::new(embedder),
        Arc::new(helpers::ScriptedModel::new("ok")),
    );

    service
        .ingest(vec![
            new_chunk(None, "Open the nutrition calculator from the top menu."),
            new_chunk(None, "The storyteller writes bedtime stories."),
            // no vector in the table: stored without an embedding
            new_chunk(None, "Calories are listed per serving."),
        ])
        .await
        .unwrap();

    let result = service.search("how do I count calories").await;
    assert_eq!(result.path, RetrievalPath::Semantic);
    assert_eq!(result.candidates.len(), 1);
    assert!(result.candidates[0].chunk.text.contains("nutrition calculator"));

    // unembeddable query: keyword path reaches the chunk stored without a vector
    let result = service.search("calories serving").await;
    assert_eq!(result.path, RetrievalPath::Keyword);
    assert_eq!(result.candidates[0].chunk.text, "Calories are listed per serving.");
}

#[tokio::test]
async fn blank_chunk_text_is_rejected_without_side_effects() {
    let service = helpers::service(
        Arc::new(DisabledEmbeddingProvider),
        Arc::new(helpers::ScriptedModel::new("ok")),
    );
    let err = service
        .ingest(vec![new_chunk(None, "fine"), new_chunk(None, "   ")])
        .await
        .unwrap_err();
    assert!(err.is_client_error());

    let (total, _) = service
        .database()
        .run(|conn| memoria::memory::documents::count_chunks(conn))
        .await
        .unwrap();
    assert_eq!(total, 0);
}
