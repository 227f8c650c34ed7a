//! Code-snippet extraction (§4.5 step 4, §6 encoding helpers).

use std::fmt::Write as _;
use std::path::Path;

use analyzer_domain::error::{Error, Result};
use analyzer_domain::model::CodeLocation;

/// A padded, line-numbered snippet plus the line range it was read from.
#[derive(Debug, Clone)]
pub struct Snippet {
    /// Rendered, line-numbered text.
    pub text: String,
    /// Line range the text covers, after clamping to the file and `limit`.
    pub location: CodeLocation,
}

/// Read `path`, decode it per `encoding`, and return the padded,
/// line-numbered snippet covering `[line_number - context_lines, line_number
/// + context_lines]`, capped at `limit` retained lines (0 = uncapped).
///
/// # Errors
///
/// Returns an error if the file cannot be read or the encoding is unsupported.
pub fn extract(
    path: &Path,
    line_number: usize,
    context_lines: usize,
    limit: usize,
    encoding: Option<&str>,
) -> Result<Snippet> {
    let bytes = std::fs::read(path)
        .map_err(|err| Error::io_with_source(format!("reading {}", path.display()), err))?;
    let text = decode(&bytes, encoding)?;
    let lines: Vec<&str> = text.lines().collect();

    let start = line_number.saturating_sub(context_lines).max(1);
    let mut end = (line_number + context_lines).min(lines.len());
    if limit > 0 && end.saturating_sub(start) + 1 > limit {
        end = start + limit - 1;
    }
    let end = end.max(start);

    let width = end.to_string().len();
    let mut out = String::new();
    for line_no in start..=end {
        let Some(content) = lines.get(line_no - 1) else {
            break;
        };
        let _ = writeln!(out, "{line_no:>width$}  {content}");
    }
    Ok(Snippet {
        text: out,
        location: CodeLocation {
            start_line: start,
            end_line: end,
        },
    })
}

/// Decode `bytes` per a per-source encoding hint. `None` or `"utf-8"` reads
/// bytes verbatim (lossily, for non-UTF-8 byte sequences); any other value
/// is looked up in a small table of supported encodings (Shift-JIS at minimum).
fn decode(bytes: &[u8], encoding: Option<&str>) -> Result<String> {
    match encoding.map(str::to_ascii_lowercase).as_deref() {
        None | Some("utf-8" | "utf8") => Ok(String::from_utf8_lossy(bytes).into_owned()),
        Some("shift_jis" | "shift-jis" | "sjis") => {
            let (decoded, _, _had_errors) = encoding_rs::SHIFT_JIS.decode(bytes);
            Ok(decoded.into_owned())
        }
        Some(other) => Err(Error::configuration(format!("unsupported encoding: {other}"))),
    }
}

/// Locate the snippet line whose numeric prefix equals `line_number` and
/// return the content with the prefix stripped (§4.5 step 5).
#[must_use]
pub fn line_without_prefix(snippet: &str, line_number: usize) -> Option<String> {
    for line in snippet.lines() {
        let trimmed = line.trim_start();
        let digits: String = trimmed.chars().take_while(char::is_ascii_digit).collect();
        if digits.is_empty() {
            continue;
        }
        if digits.parse::<usize>() == Ok(line_number) {
            return Some(trimmed[digits.len()..].trim_start().to_owned());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_line_numbers_and_respects_context() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sample.rs");
        std::fs::write(&path, "one\ntwo\nthree\nfour\nfive\n").expect("write fixture");

        let snippet = extract(&path, 3, 1, 0, None).expect("extract");
        assert_eq!(snippet.text, "2  two\n3  three\n4  four\n");
        assert_eq!(snippet.location.start_line, 2);
        assert_eq!(snippet.location.end_line, 4);
    }

    #[test]
    fn strips_numeric_prefix_for_matching_line() {
        let snippet = "10  let x = 1;\n11  let y = 2;\n";
        assert_eq!(line_without_prefix(snippet, 11), Some("let y = 2;".to_owned()));
        assert_eq!(line_without_prefix(snippet, 99), None);
    }
}
