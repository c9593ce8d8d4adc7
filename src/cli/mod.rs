pub mod history;
pub mod ingest;
pub mod search;
pub mod stats;

use memoria::memory::truncate_chars;

/// One-line preview of a chunk or message for terminal output.
pub fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let cut = truncate_chars(&flat, max_chars);
    if cut.len() < flat.len() {
        format!("{cut}...")
    } else {
        flat
    }
}
