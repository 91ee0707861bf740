//! Document loading and recursive character splitting.
//!
//! Files are loaded into one or more source texts (`.txt`/`.md` as a whole,
//! `.jsonl` one text per line, `.csv` one text per row, `.pdf` one text per
//! page) and split into chunks of at most
//! `chunk_size` characters, preferring paragraph, then line, then word
//! boundaries. Consecutive chunks share up to `chunk_overlap` characters.
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::ChunkingSettings;
use crate::error::{Error, Result};

const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];
const SUPPORTED_EXTENSIONS: [&str; 5] = ["txt", "md", "jsonl", "csv", "pdf"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentChunk {
    pub file_name: String,
    pub chunk_index: usize,
    pub text: String,
}

impl DocumentChunk {
    /// Record id of this chunk: `{file_name}:{chunk_index}`.
    pub fn id(&self) -> String {
        format!("{}:{}", self.file_name, self.chunk_index)
    }
}

#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 100, chunk_overlap: 20 }
    }
}

impl From<&ChunkingSettings> for ChunkingConfig {
    fn from(s: &ChunkingSettings) -> Self {
        Self { chunk_size: s.chunk_size, chunk_overlap: s.chunk_overlap }
    }
}

#[derive(Default)]
pub struct DataProcessor {
    chunking_config: ChunkingConfig,
}

impl DataProcessor {
    pub fn new(chunking_config: ChunkingConfig) -> Result<Self> {
        if chunking_config.chunk_size == 0 || chunking_config.chunk_overlap >= chunking_config.chunk_size {
            return Err(Error::InvalidInput(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunking_config.chunk_overlap, chunking_config.chunk_size
            )));
        }
        Ok(Self { chunking_config })
    }

    /// Load and split one file. The partition key is the file's base name.
    pub fn process_file(&self, file_path: &Path) -> Result<Vec<DocumentChunk>> {
        let file_name = file_name_of(file_path)?;
        let texts = self.load_file(file_path)?;
        let mut chunks = Vec::new();
        for text in &texts {
            for piece in self.split_text(text) {
                chunks.push(DocumentChunk { file_name: file_name.clone(), chunk_index: chunks.len(), text: piece });
            }
        }
        info!(file = %file_path.display(), documents = texts.len(), chunks = chunks.len(), "processed file");
        Ok(chunks)
    }

    /// Every supported file under `data_dir`, sorted.
    pub fn list_files(&self, data_dir: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(data_dir).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
            let path = entry.path();
            if extension_of(path).is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str())) {
                files.push(path.to_path_buf());
            }
        }
        files.sort();
        files
    }

    pub fn load_file(&self, file_path: &Path) -> Result<Vec<String>> {
        if !file_path.is_file() {
            return Err(Error::NotFound(format!("file {}", file_path.display())));
        }
        match extension_of(file_path).unwrap_or_default().as_str() {
            "txt" | "md" => {
                let content = read_file_content(file_path)?;
                Ok(if content.trim().is_empty() { vec![] } else { vec![content] })
            }
            "jsonl" => load_jsonl(file_path, &read_file_content(file_path)?),
            "csv" => load_csv(file_path, &read_file_content(file_path)?),
            "pdf" => load_pdf(file_path),
            other => Err(Error::InvalidInput(format!("unsupported file type '{other}' for {}", file_path.display()))),
        }
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &SEPARATORS)
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect()
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let size = self.chunking_config.chunk_size;
        let (separator, rest) = match separators.iter().position(|s| s.is_empty() || text.contains(s)) {
            Some(i) => (separators[i], &separators[i + 1..]),
            None => ("", &[][..]),
        };
        let pieces: Vec<String> = if separator.is_empty() {
            text.chars().map(String::from).collect()
        } else {
            text.split(separator).filter(|p| !p.is_empty()).map(String::from).collect()
        };

        let mut out = Vec::new();
        let mut fitting = Vec::new();
        for piece in pieces {
            if char_len(&piece) <= size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                out.extend(self.merge_pieces(&fitting, separator));
                fitting.clear();
            }
            if rest.is_empty() {
                out.push(piece);
            } else {
                out.extend(self.split_recursive(&piece, rest));
            }
        }
        if !fitting.is_empty() {
            out.extend(self.merge_pieces(&fitting, separator));
        }
        out
    }

    /// Greedily pack pieces into chunks, carrying a tail of at most `chunk_overlap` characters forward.
    fn merge_pieces(&self, pieces: &[String], separator: &str) -> Vec<String> {
        let size = self.chunking_config.chunk_size;
        let overlap = self.chunking_config.chunk_overlap;
        let sep_len = char_len(separator);
        let mut chunks = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            let joined_len = |window: &VecDeque<&str>, total: usize| total + len + if window.is_empty() { 0 } else { sep_len };
            if !window.is_empty() && joined_len(&window, total) > size {
                chunks.push(join(&window, separator));
                while !window.is_empty() && (total > overlap || joined_len(&window, total) > size) {
                    if let Some(first) = window.pop_front() {
                        total -= char_len(first) + if window.is_empty() { 0 } else { sep_len };
                    }
                }
            }
            total = joined_len(&window, total);
            window.push_back(piece);
        }
        if !window.is_empty() {
            chunks.push(join(&window, separator));
        }
        debug!(pieces = pieces.len(), chunks = chunks.len(), "merged pieces");
        chunks
    }
}

fn load_jsonl(file_path: &Path, content: &str) -> Result<Vec<String>> {
    content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|line| {
            let value: serde_json::Value = serde_json::from_str(line)
                .map_err(|e| Error::InvalidInput(format!("{}: bad JSON line: {e}", file_path.display())))?;
            Ok(match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
        })
        .collect()
}

/// One text per data row, each cell rendered as a `header: value` line.
fn load_csv(file_path: &Path, content: &str) -> Result<Vec<String>> {
    let bad_csv = |e: csv::Error| Error::InvalidInput(format!("{}: bad CSV: {e}", file_path.display()));
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(content.as_bytes());
    let headers = reader.headers().map_err(bad_csv)?.clone();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(bad_csv)?;
        let row = headers
            .iter()
            .zip(record.iter())
            .map(|(header, value)| format!("{}: {}", header.trim(), value.trim()))
            .collect::<Vec<_>>()
            .join("\n");
        rows.push(row);
    }
    Ok(rows)
}

/// One text per page; pages without extractable text are skipped.
fn load_pdf(file_path: &Path) -> Result<Vec<String>> {
    let bytes = fs::read(file_path)?;
    let pages = pdf_extract::extract_text_from_mem_by_pages(&bytes)
        .map_err(|e| Error::InvalidInput(format!("{}: PDF extraction failed: {e}", file_path.display())))?;
    let total = pages.len();
    let texts: Vec<String> = pages.into_iter().filter(|p| !p.trim().is_empty()).collect();
    debug!(file = %file_path.display(), pages = total, with_text = texts.len(), "extracted pdf");
    Ok(texts)
}

fn join(window: &VecDeque<&str>, separator: &str) -> String {
    window.iter().copied().collect::<Vec<_>>().join(separator)
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension().and_then(|s| s.to_str()).map(|s| s.to_ascii_lowercase())
}

fn file_name_of(path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| Error::InvalidInput(format!("{} has no file name", path.display())))
}

fn read_file_content(file_path: &Path) -> Result<String> {
    match fs::read_to_string(file_path) {
        Ok(content) => Ok(content),
        Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string()),
    }
}
