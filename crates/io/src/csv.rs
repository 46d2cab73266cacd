// CSV attempt source

use std::io::Read;
use std::path::{Path, PathBuf};

use payreport_retry::config::ColumnMapping;
use payreport_retry::model::AttemptRecord;
use payreport_retry::RetryError;

use crate::source::{non_empty, AttemptSource, ColumnIndex};

/// Attempts from a delimited text file with a header row.
#[derive(Debug, Clone)]
pub struct CsvSource {
    pub path: PathBuf,
    /// Encoding label; UTF-8 with a Windows-1252 fallback when unset.
    pub encoding: Option<String>,
    pub columns: ColumnMapping,
}

impl AttemptSource for CsvSource {
    fn describe(&self) -> String {
        format!("csv file {}", self.path.display())
    }

    fn load(&self) -> Result<Vec<AttemptRecord>, RetryError> {
        let content = read_file_as_utf8(&self.path, self.encoding.as_deref())?;
        parse_attempts(&self.path.display().to_string(), &content, &self.columns)
    }
}

/// Parse CSV text into attempt records.
pub fn parse_attempts(
    origin: &str,
    content: &str,
    columns: &ColumnMapping,
) -> Result<Vec<AttemptRecord>, RetryError> {
    let delimiter = sniff_delimiter(content);
    log::debug!("{origin}: using delimiter {:?}", delimiter as char);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| RetryError::Io(format!("{origin}: cannot read header row: {e}")))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let index = ColumnIndex::resolve(origin, columns, &headers)?;

    let mut records = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let row = result.map_err(|e| RetryError::Io(format!("{origin}: {e}")))?;
        if row.len() < headers.len() {
            let line = row.position().map(|p| p.line()).unwrap_or(i as u64 + 2);
            return Err(RetryError::Io(format!(
                "{origin}: data row {} (line {line}) has {} field(s), header has {}",
                i + 1,
                row.len(),
                headers.len()
            )));
        }
        let fields: Vec<Option<String>> = row.iter().map(non_empty).collect();
        records.push(index.record(i + 1, &fields));
    }

    Ok(records)
}

/// Detect the most likely field delimiter by checking consistency across the first few lines.
///
/// For each candidate (tab, semicolon, comma, pipe), count fields per line. The delimiter
/// that produces the most consistent field count (>1 field) wins.
fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample_lines: Vec<&str> = content.lines().take(10).collect();

    let mut best = b',';
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        let target = counts.first().copied().unwrap_or(0);
        if target <= 1 {
            continue;
        }

        // Consistent lines times field count; wider splits win ties
        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;

        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

/// Read a file as UTF-8 text, decoding through `encoding` when given.
///
/// Without a label the bytes are tried as UTF-8 first and fall back to
/// Windows-1252 (common for Excel-exported CSVs). A leading BOM is dropped.
pub fn read_file_as_utf8(path: &Path, encoding: Option<&str>) -> Result<String, RetryError> {
    let mut file = std::fs::File::open(path)
        .map_err(|e| RetryError::Io(format!("{}: {e}", path.display())))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .map_err(|e| RetryError::Io(format!("{}: {e}", path.display())))?;

    decode(bytes, encoding)
}

fn decode(bytes: Vec<u8>, encoding: Option<&str>) -> Result<String, RetryError> {
    let text = match encoding {
        Some(label) => {
            let enc = encoding_rs::Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| {
                RetryError::ConfigValidation(format!("unknown encoding '{label}'"))
            })?;
            let (decoded, _, had_errors) = enc.decode(&bytes);
            if had_errors {
                log::warn!("input is not valid {}; bad bytes were replaced", enc.name());
            }
            decoded.into_owned()
        }
        None => match String::from_utf8(bytes) {
            Ok(s) => s,
            Err(e) => {
                let bytes = e.into_bytes();
                log::debug!("input is not UTF-8, decoding as windows-1252");
                let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
                decoded.into_owned()
            }
        },
    };

    Ok(match text.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => text,
    })
}
