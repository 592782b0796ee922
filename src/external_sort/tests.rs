use std::fs;
use tempfile::tempdir;

use crate::external_sort::{sort_and_deduplicate, ChunkMerger, ChunkProcessor, ExternalSortConfig};

fn config(temp: &std::path::Path, chunk_size_bytes: usize) -> ExternalSortConfig {
    ExternalSortConfig {
        chunk_size_bytes,
        io_buffer_size: 4096,
        temp_directory: temp.to_path_buf(),
    }
}

#[test]
fn test_chunks_are_sorted_and_bounded() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("sink.txt");
    fs::write(&input, "delta\nalpha\ncharlie\nalpha\nbravo\n").unwrap();

    let processor = ChunkProcessor::new(12, 4096, dir.path().to_path_buf());
    let (chunks, lines_read) = processor.process_file_to_chunks(&input).unwrap();

    assert_eq!(lines_read, 5);
    assert!(chunks.len() > 1);
    for chunk in &chunks {
        let content = fs::read_to_string(&chunk.file_path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        let mut sorted = lines.clone();
        sorted.sort();
        assert_eq!(lines, sorted);
    }

    processor.cleanup_all_chunks(&chunks);
    assert!(chunks.iter().all(|c| !c.file_path.exists()));
}

#[test]
fn test_merge_drops_duplicates_across_chunks() {
    let dir = tempdir().unwrap();
    let processor = ChunkProcessor::new(1024, 4096, dir.path().to_path_buf());
    let chunks = vec![
        processor
            .sort_and_write_chunk(0, vec!["b".into(), "a".into(), "c".into()])
            .unwrap(),
        processor
            .sort_and_write_chunk(1, vec!["c".into(), "b".into(), "d".into()])
            .unwrap(),
    ];

    let output = dir.path().join("merged.txt");
    let stats = ChunkMerger::new(4096).merge_chunks(&chunks, &output).unwrap();

    assert_eq!(fs::read_to_string(&output).unwrap(), "a\nb\nc\nd\n");
    assert_eq!(stats.lines_written, 4);
    assert_eq!(stats.duplicates_removed, 2);
}

#[test]
fn test_sort_and_deduplicate_skips_blank_lines() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.txt");
    let output = dir.path().join("out.txt");
    fs::write(&input, "x@a.de, pw\r\n\n\nx@a.de, pw\nb@a.de, pw").unwrap();

    let stats = sort_and_deduplicate(&input, &output, &config(dir.path(), 8)).unwrap();

    assert_eq!(fs::read_to_string(&output).unwrap(), "b@a.de, pw\nx@a.de, pw\n");
    assert_eq!(stats.lines_read, 3);
    assert_eq!(stats.unique_lines, 2);
    assert_eq!(stats.duplicates_removed, 1);
}

#[test]
fn test_empty_input_produces_empty_output() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("empty.txt");
    let output = dir.path().join("out.txt");
    fs::write(&input, "").unwrap();

    let stats = sort_and_deduplicate(&input, &output, &config(dir.path(), 1024)).unwrap();

    assert_eq!(stats.chunks_created, 0);
    assert_eq!(fs::read_to_string(&output).unwrap(), "");
}
