#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

/// Split points tried in order, coarsest first. The empty separator splits
/// between characters and always applies.
const SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];

/// Configuration for splitting uploaded documents into chunks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters
    pub chunk_size: usize,
    /// Characters shared between adjacent chunks
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 512,
            chunk_overlap: 100,
        }
    }
}

/// Split extracted document text into trimmed, non-empty chunks of at most
/// `chunk_size` characters, preferring paragraph, line, sentence and word
/// boundaries in that order.
#[inline]
pub fn split_text(text: &str, config: &ChunkingConfig) -> Vec<String> {
    let chunks: Vec<String> = split_recursive(text, &SEPARATORS, config)
        .into_iter()
        .map(|chunk| chunk.trim().to_string())
        .filter(|chunk| !chunk.is_empty())
        .collect();

    debug!(
        "Split {} characters into {} chunks (size {}, overlap {})",
        char_len(text),
        chunks.len(),
        config.chunk_size,
        config.chunk_overlap
    );

    chunks
}

fn split_recursive(text: &str, separators: &[&str], config: &ChunkingConfig) -> Vec<String> {
    let index = separators
        .iter()
        .position(|separator| separator.is_empty() || text.contains(separator))
        .unwrap_or(separators.len().saturating_sub(1));
    let separator = separators.get(index).copied().unwrap_or_default();
    let finer = separators.get(index + 1..).unwrap_or_default();

    let pieces: Vec<&str> = if separator.is_empty() {
        text.split_inclusive(|_: char| true).collect()
    } else {
        text.split(separator).filter(|piece| !piece.is_empty()).collect()
    };

    let mut chunks = Vec::new();
    let mut fitting: Vec<&str> = Vec::new();

    for piece in pieces {
        if char_len(piece) <= config.chunk_size {
            fitting.push(piece);
            continue;
        }

        if !fitting.is_empty() {
            chunks.extend(merge_pieces(&fitting, separator, config));
            fitting.clear();
        }

        if finer.is_empty() {
            chunks.push(piece.to_string());
        } else {
            chunks.extend(split_recursive(piece, finer, config));
        }
    }

    if !fitting.is_empty() {
        chunks.extend(merge_pieces(&fitting, separator, config));
    }

    chunks
}

/// Greedily join small pieces into chunks, carrying up to `chunk_overlap`
/// characters of trailing pieces into the next chunk.
fn merge_pieces(pieces: &[&str], separator: &str, config: &ChunkingConfig) -> Vec<String> {
    let separator_len = char_len(separator);
    let mut merged = Vec::new();
    let mut window: VecDeque<&str> = VecDeque::new();
    let mut total = 0_usize;

    for &piece in pieces {
        let piece_len = char_len(piece);
        let joiner = |window: &VecDeque<&str>| {
            if window.is_empty() { 0 } else { separator_len }
        };

        if !window.is_empty() && total + joiner(&window) + piece_len > config.chunk_size {
            merged.push(join(&window, separator));

            while total > config.chunk_overlap
                || (total > 0 && total + joiner(&window) + piece_len > config.chunk_size)
            {
                let Some(first) = window.pop_front() else {
                    break;
                };
                total = total.saturating_sub(char_len(first) + joiner(&window));
            }
        }

        total += joiner(&window) + piece_len;
        window.push_back(piece);
    }

    if !window.is_empty() {
        merged.push(join(&window, separator));
    }

    merged
}

fn join(window: &VecDeque<&str>, separator: &str) -> String {
    window
        .iter()
        .copied()
        .collect::<Vec<_>>()
        .join(separator)
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}
