use anyhow::Result;

use memoria::config::MemoriaConfig;

/// Display store statistics in the terminal.
pub fn stats(config: &MemoriaConfig) -> Result<()> {
    let db_path = config.resolved_db_path();
    let conn = memoria::db::open_database(&db_path)?;

    let response = memoria::memory::stats::store_stats(&conn, Some(&db_path))?;

    println!("Store Statistics");
    println!("{}", "=".repeat(40));
    println!("  Knowledge chunks:    {}", response.total_chunks);
    println!("  With embeddings:     {}", response.embedded_chunks);
    println!();
    println!("  Users:               {}", response.users);
    println!("  Registered:          {}", response.registered_users);
    println!("  With summaries:      {}", response.summarized_users);
    println!("  Stored messages:     {}", response.messages);
    println!();
    println!("Database size:         {} bytes", response.db_size_bytes);
    if let Some(ref model) = response.embedding_model {
        println!("Embedding model:       {model}");
    }

    Ok(())
}
