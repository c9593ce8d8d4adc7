use anyhow::Result;

use memoria::chat::ChatService;
use memoria::config::MemoriaConfig;
use memoria::memory::search::RetrievalPath;

use super::preview;

/// Run the chat retrieval pipeline for a query and print what it found.
pub async fn search(config: &MemoriaConfig, query: &str) -> Result<()> {
    let service = ChatService::from_config(config)?;
    let retrieval = service.search(query).await;

    if retrieval.path == RetrievalPath::None {
        println!("No results found.");
        return Ok(());
    }

    println!(
        "Found {} result(s) via {} search\n",
        retrieval.candidates.len(),
        retrieval.path.as_str()
    );
    for (i, candidate) in retrieval.candidates.iter().enumerate() {
        let source = candidate
            .chunk
            .metadata
            .source
            .as_deref()
            .unwrap_or("-");
        println!(
            "  {}. {} [{}] (score: {:.4})",
            i + 1,
            candidate.chunk.id,
            source,
            candidate.score
        );
        println!("     {}", preview(&candidate.chunk.text, 120));
        println!();
    }

    Ok(())
}
