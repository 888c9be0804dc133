use super::*;

fn page(content: &str, page_number: u32) -> Page {
    Page {
        content: content.to_string(),
        page_number,
        source: "agreement.pdf".to_string(),
    }
}

fn sentence_text(count: usize) -> String {
    (0..count)
        .map(|i| format!("Sentence number {i:03} sets out a contractual term. "))
        .collect()
}

#[test]
fn default_config() {
    let config = ChunkingConfig::default();
    assert_eq!(config.chunk_size, 800);
    assert_eq!(config.chunk_overlap, 150);
    assert_eq!(config.separators.first().map(String::as_str), Some("\n\n"));
    assert!(config.separators.iter().any(|s| s == "Clause "));
    assert!(config.separators.iter().any(|s| s == "Section "));
    assert!(config.separators.iter().any(|s| s == "Article "));
}

#[test]
fn short_text_is_single_chunk() {
    let config = ChunkingConfig::default();
    let chunks = split_text("  The Supplier shall deliver the Goods.  ", &config);
    assert_eq!(chunks, vec!["The Supplier shall deliver the Goods.".to_string()]);
}

#[test]
fn whitespace_only_text_produces_nothing() {
    let config = ChunkingConfig::default();
    assert!(split_text("", &config).is_empty());
    assert!(split_text(" \n\n\t \n", &config).is_empty());

    let chunks = chunk_pages(&[page("   \n  ", 1)], &config);
    assert!(chunks.is_empty());
}

#[test]
fn chunks_respect_size_bound() {
    let config = ChunkingConfig::default();
    let text = sentence_text(120);

    let chunks = split_text(&text, &config);

    assert!(chunks.len() > 1);
    for chunk in &chunks {
        assert!(
            chunk.chars().count() <= config.chunk_size,
            "chunk of {} chars exceeds bound",
            chunk.chars().count()
        );
        assert_eq!(chunk.trim(), chunk);
        assert!(!chunk.is_empty());
    }
}

#[test]
fn paragraphs_are_preferred_boundaries() {
    let config = ChunkingConfig {
        chunk_size: 200,
        chunk_overlap: 0,
        ..ChunkingConfig::default()
    };
    let text = format!(
        "{}\n\n{}\n\n{}",
        "Section 1. Definitions apply throughout this agreement.",
        "Section 2. The term of this agreement is two years from the effective date.",
        "Section 3. Either party may terminate with thirty days written notice to the other."
    );

    let chunks = split_text(&text, &config);

    assert_eq!(chunks.len(), 2);
    assert!(chunks[0].starts_with("Section 1."));
    assert!(chunks[0].contains("Section 2."));
    assert!(chunks[1].starts_with("Section 3."));
}

#[test]
fn adjacent_chunks_overlap() {
    let config = ChunkingConfig::default();
    let text = sentence_text(60);

    let chunks = split_text(&text, &config);
    assert!(chunks.len() >= 2);

    for pair in chunks.windows(2) {
        let previous = &pair[0];
        let next = &pair[1];
        let last_sentence = previous
            .rsplit(". ")
            .next()
            .expect("chunk should contain a sentence");
        assert!(
            next.contains(last_sentence.trim_end_matches('.')),
            "expected overlap between chunks:\n{previous}\n---\n{next}"
        );

        // Overlap is bounded by the configured size
        let shared_prefix_start = next.get(..30).expect("chunk longer than 30 chars");
        let position = previous
            .rfind(shared_prefix_start)
            .expect("next chunk should start with text from the previous chunk");
        assert!(previous.chars().count() - position <= config.chunk_overlap + 2);
    }
}

#[test]
fn zero_overlap_produces_disjoint_chunks() {
    let config = ChunkingConfig {
        chunk_overlap: 0,
        ..ChunkingConfig::default()
    };
    let text = sentence_text(60);

    let chunks = split_text(&text, &config);
    let total: usize = chunks.iter().map(|c| c.chars().count()).sum();

    assert!(chunks.len() >= 2);
    assert!(total <= text.chars().count());
}

#[test]
fn unsplittable_span_overflows_bound() {
    let config = ChunkingConfig::default();
    let token = "x".repeat(1000);
    let text = format!("Schedule A lists the parties. {token} Remaining terms follow.");

    let chunks = split_text(&text, &config);

    let oversized: Vec<_> = chunks
        .iter()
        .filter(|c| c.chars().count() > config.chunk_size)
        .collect();
    assert_eq!(oversized.len(), 1);
    assert_eq!(oversized[0], &token);
    assert!(chunks.iter().all(|c| c.chars().any(char::is_alphanumeric)));
    assert!(chunks.iter().any(|c| c.contains("Schedule A")));
    assert!(chunks.iter().any(|c| c.contains("Remaining terms")));
}

#[test]
fn character_split_as_last_resort() {
    let config = ChunkingConfig {
        chunk_size: 100,
        chunk_overlap: 10,
        separators: vec![" ".to_string(), String::new()],
    };
    let text = "y".repeat(250);

    let chunks = split_text(&text, &config);

    assert!(chunks.len() >= 3);
    assert!(chunks.iter().all(|c| c.chars().count() <= 100));
}

#[test]
fn multibyte_text_is_measured_in_characters() {
    let config = ChunkingConfig {
        chunk_size: 100,
        chunk_overlap: 20,
        ..ChunkingConfig::default()
    };
    let text = "Die Vertraulichkeit gilt fünf Jahre über das Vertragsende hinaus. ".repeat(10);

    let chunks = split_text(&text, &config);

    assert!(chunks.len() > 1);
    assert!(chunks.iter().all(|c| c.chars().count() <= 100));
}

#[test]
fn chunk_pages_keeps_metadata() {
    let config = ChunkingConfig::default();
    let pages = vec![
        page(&sentence_text(40), 1),
        page("", 2),
        page("Clause 7. Confidentiality survives termination.", 3),
    ];

    let chunks = chunk_pages(&pages, &config);

    assert!(chunks.len() >= 3);
    assert!(chunks.iter().all(|c| c.source == "agreement.pdf"));
    assert!(chunks.iter().all(|c| c.page_number != 2));

    let last = chunks.last().expect("at least one chunk");
    assert_eq!(last.page_number, 3);
    assert_eq!(last.content, "Clause 7. Confidentiality survives termination.");

    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.chunk_index, i);
    }
}

#[test]
fn chunks_never_span_pages() {
    let config = ChunkingConfig::default();
    let pages = vec![page("Page one ends here.", 1), page("Page two starts here.", 2)];

    let chunks = chunk_pages(&pages, &config);

    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].page_number, 1);
    assert_eq!(chunks[1].page_number, 2);
}
