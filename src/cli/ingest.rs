use anyhow::Result;
use std::path::PathBuf;

use memoria::chat::ChatService;
use memoria::config::MemoriaConfig;
use memoria::memory::documents::file_chunks;

/// Chunk files line by line and store them with embeddings where available.
pub async fn ingest(config: &MemoriaConfig, files: &[PathBuf], max_chars: usize) -> Result<()> {
    let service = ChatService::from_config(config)?;

    let mut documents = Vec::new();
    for file in files {
        let text = match std::fs::read_to_string(file) {
            Ok(text) => text,
            Err(e) => {
                eprintln!("Skipping {}: {e}", file.display());
                continue;
            }
        };
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.display().to_string());
        let chunks = file_chunks(&name, &text, max_chars);
        println!("{}: {} chunk(s)", file.display(), chunks.len());
        documents.extend(chunks);
    }

    if documents.is_empty() {
        println!("No documents to ingest.");
        return Ok(());
    }

    let count = service.ingest(documents).await?;
    println!("Ingested {count} chunk(s).");
    Ok(())
}
