use super::*;

fn config(chunk_size: usize, chunk_overlap: usize) -> ChunkingConfig {
    ChunkingConfig {
        chunk_size,
        chunk_overlap,
    }
}

#[test]
fn default_sizes() {
    let config = ChunkingConfig::default();
    assert_eq!(config.chunk_size, 512);
    assert_eq!(config.chunk_overlap, 100);
}

#[test]
fn short_text_is_a_single_trimmed_chunk() {
    let chunks = split_text("  Paris is the capital of France.  \n", &ChunkingConfig::default());
    assert_eq!(chunks, vec!["Paris is the capital of France."]);
}

#[test]
fn blank_text_yields_nothing() {
    assert!(split_text("", &ChunkingConfig::default()).is_empty());
    assert!(split_text(" \n\n \t ", &ChunkingConfig::default()).is_empty());
}

#[test]
fn prefers_paragraph_boundaries() {
    let text = "para one text.\n\npara two text.";
    let chunks = split_text(text, &config(20, 5));
    assert_eq!(chunks, vec!["para one text.", "para two text."]);
}

#[test]
fn small_paragraphs_are_merged() {
    let text = "first\n\nsecond\n\nthird";
    let chunks = split_text(text, &config(512, 100));
    assert_eq!(chunks, vec!["first\n\nsecond\n\nthird"]);
}

#[test]
fn adjacent_chunks_overlap() {
    let text = "aaaa bbbb cccc dddd eeee ffff";
    let chunks = split_text(text, &config(20, 8));
    assert_eq!(chunks, vec!["aaaa bbbb cccc dddd", "dddd eeee ffff"]);
}

#[test]
fn unbroken_text_falls_back_to_characters() {
    let text = "x".repeat(50);
    let chunks = split_text(&text, &config(20, 0));
    let lengths: Vec<usize> = chunks.iter().map(String::len).collect();
    assert_eq!(lengths, vec![20, 20, 10]);
}

#[test]
fn lengths_are_counted_in_characters() {
    let text = "é".repeat(30);
    let chunks = split_text(&text, &config(16, 0));
    let lengths: Vec<usize> = chunks.iter().map(|c| c.chars().count()).collect();
    assert_eq!(lengths, vec![16, 14]);
}

#[test]
fn every_chunk_respects_size_limit() {
    let text = (0..400)
        .map(|i| {
            if i % 17 == 0 {
                format!("word{}.\n\n", i)
            } else if i % 5 == 0 {
                format!("word{}. ", i)
            } else {
                format!("word{} ", i)
            }
        })
        .collect::<String>();
    let config = config(64, 16);

    let chunks = split_text(&text, &config);

    assert!(chunks.len() > 10);
    assert!(chunks.iter().all(|c| c.chars().count() <= 64));
    assert!(chunks.iter().all(|c| !c.trim().is_empty()));
    assert!(chunks.first().is_some_and(|c| c.starts_with("word0")));
    assert!(chunks.last().is_some_and(|c| c.contains("word399")));
}

#[test]
fn every_word_survives_splitting() {
    let text = (0..200).map(|i| format!("w{} ", i)).collect::<String>();
    let chunks = split_text(&text, &config(40, 0));
    let rejoined = chunks.join(" ");

    for i in 0..200 {
        assert!(
            rejoined.split_whitespace().any(|w| w == format!("w{}", i)),
            "missing w{}",
            i
        );
    }
}
