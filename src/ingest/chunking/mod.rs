
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Separators tried in order, from paragraph breaks down to single characters
const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Configuration for document chunking, measured in characters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk size
    pub chunk_size: usize,
    /// Characters carried over from the end of one chunk into the next
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Split a document into chunks of at most `chunk_size` characters.
///
/// The text is cut at the coarsest separator that occurs in it; pieces that
/// are still too long are cut again with the next separator. Neighbouring
/// pieces are then merged back together up to the size limit, and each new
/// chunk starts with the trailing pieces of the previous one, up to
/// `chunk_overlap` characters. Output is trimmed and never contains empty
/// chunks.
#[inline]
pub fn split_text(text: &str, config: &ChunkingConfig) -> Vec<String> {
    let chunks = split_recursive(text, &SEPARATORS, config);

    debug!(
        "Split {} characters into {} chunks",
        char_len(text),
        chunks.len()
    );

    chunks
}

fn split_recursive(text: &str, separators: &[&str], config: &ChunkingConfig) -> Vec<String> {
    let mut final_chunks = Vec::new();

    let position = separators
        .iter()
        .position(|separator| separator.is_empty() || text.contains(*separator));
    let (separator, remaining) = match position {
        Some(index) => (separators[index], &separators[index + 1..]),
        None => ("", &[][..]),
    };

    let mut good_splits: Vec<String> = Vec::new();

    for piece in split_keeping_separator(text, separator) {
        if char_len(&piece) < config.chunk_size {
            good_splits.push(piece);
            continue;
        }

        if !good_splits.is_empty() {
            final_chunks.extend(merge_splits(&good_splits, config));
            good_splits.clear();
        }

        if remaining.is_empty() {
            let trimmed = piece.trim();
            if !trimmed.is_empty() {
                final_chunks.push(trimmed.to_string());
            }
        } else {
            final_chunks.extend(split_recursive(&piece, remaining, config));
        }
    }

    if !good_splits.is_empty() {
        final_chunks.extend(merge_splits(&good_splits, config));
    }

    final_chunks
}

/// Split on `separator`, attaching each separator to the start of the piece
/// that follows it so that concatenating the pieces restores the text
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(String::from).collect();
    }

    let mut pieces = Vec::new();
    for (i, part) in text.split(separator).enumerate() {
        let piece = if i == 0 {
            part.to_string()
        } else {
            format!("{}{}", separator, part)
        };
        if !piece.is_empty() {
            pieces.push(piece);
        }
    }
    pieces
}

/// Greedily merge small pieces into chunks, carrying an overlap window
fn merge_splits(splits: &[String], config: &ChunkingConfig) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0;

    for split in splits {
        let split_len = char_len(split);

        if current_len + split_len > config.chunk_size && !current.is_empty() {
            if current_len > config.chunk_size {
                warn!(
                    "Created a chunk of size {}, which is longer than the specified {}",
                    current_len, config.chunk_size
                );
            }

            push_joined(&mut chunks, &current);

            // Drop leading pieces until the carried-over window fits the overlap
            // and leaves room for the incoming piece
            while current_len > config.chunk_overlap
                || (current_len + split_len > config.chunk_size && current_len > 0)
            {
                if current.is_empty() {
                    break;
                }
                let first = current.remove(0);
                current_len -= char_len(first);
            }
        }

        current.push(split);
        current_len += split_len;
    }

    push_joined(&mut chunks, &current);
    chunks
}

fn push_joined(chunks: &mut Vec<String>, pieces: &[&str]) {
    let joined = pieces.concat();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

/// Length in Unicode scalar values, so CJK text is measured like ASCII
#[inline]
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}
