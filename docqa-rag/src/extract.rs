//! Document-to-text extraction.
//!
//! [`PlainTextExtractor`] reads UTF-8 text files as-is. [`RtfExtractor`]
//! reduces an RTF document to its visible text: control words and ignorable
//! destinations (font tables, stylesheets, embedded pictures, `\*` groups)
//! are dropped, paragraph breaks become newlines and `\'hh` / `\uN` escapes
//! are decoded. `\'hh` bytes follow the document's `\ansicpg` codepage.

use std::fs;
use std::path::Path;

use encoding_rs::{Encoding, MACINTOSH, WINDOWS_1252};
use tracing::debug;

use crate::error::{RagError, Result};

/// Control words that open a destination whose content is never visible text.
const SKIPPED_DESTINATIONS: &[&str] = &[
    "fonttbl",
    "colortbl",
    "stylesheet",
    "info",
    "pict",
    "object",
    "header",
    "footer",
    "headerl",
    "headerr",
    "footerl",
    "footerr",
    "themedata",
    "colorschememapping",
    "latentstyles",
    "datastore",
    "listtable",
    "listoverridetable",
    "rsidtbl",
    "xmlnstbl",
    "generator",
    "filetbl",
    "revtbl",
];

/// Turns a document on disk into plain text.
pub trait TextExtractor: Send + Sync {
    /// Read `path` and return its text content.
    fn extract(&self, path: &Path) -> Result<String>;
}

/// Reads a file as UTF-8 text.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

/// Extracts the visible text of an RTF document.
#[derive(Debug, Clone, Copy, Default)]
pub struct RtfExtractor;

/// Choose an extractor from the file extension: `.rtf` gets
/// [`RtfExtractor`], anything else [`PlainTextExtractor`].
pub fn extractor_for(path: &Path) -> Box<dyn TextExtractor> {
    let is_rtf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("rtf"));
    if is_rtf { Box::new(RtfExtractor) } else { Box::new(PlainTextExtractor) }
}

fn read(path: &Path) -> Result<Vec<u8>> {
    if !path.exists() {
        return Err(RagError::ExtractionError {
            path: path.to_path_buf(),
            message: "file not found".to_string(),
        });
    }
    fs::read(path).map_err(|e| RagError::ExtractionError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, path: &Path) -> Result<String> {
        let bytes = read(path)?;
        String::from_utf8(bytes).map_err(|e| RagError::ExtractionError {
            path: path.to_path_buf(),
            message: format!("not valid UTF-8: {e}"),
        })
    }
}

impl TextExtractor for RtfExtractor {
    fn extract(&self, path: &Path) -> Result<String> {
        let bytes = read(path)?;
        let source = String::from_utf8_lossy(&bytes);
        if !source.trim_start().starts_with("{\\rtf") {
            return Err(RagError::ExtractionError {
                path: path.to_path_buf(),
                message: "missing {\\rtf header".to_string(),
            });
        }
        let text = rtf_to_text(&source);
        debug!(path = %path.display(), chars = text.len(), "extracted RTF text");
        Ok(text)
    }
}

/// Map a Windows codepage number (`\ansicpgN`, `\cpgN`) to its encoding.
fn encoding_for_codepage(codepage: i32) -> Option<&'static Encoding> {
    let label = match codepage {
        866 => "ibm866".to_string(),
        874 => "windows-874".to_string(),
        932 => "shift_jis".to_string(),
        936 => "gbk".to_string(),
        949 => "euc-kr".to_string(),
        950 => "big5".to_string(),
        1250..=1258 => format!("windows-{codepage}"),
        10000 => "macintosh".to_string(),
        10007 => "x-mac-cyrillic".to_string(),
        20866 => "koi8-r".to_string(),
        21866 => "koi8-u".to_string(),
        28591..=28599 | 28603 | 28605 => format!("iso-8859-{}", codepage - 28590),
        65001 => "utf-8".to_string(),
        _ => return None,
    };
    Encoding::for_label(label.as_bytes())
}

#[derive(Debug, Clone, Copy)]
struct GroupState {
    skip: bool,
    unicode_skip: usize,
    /// Group-local codepage from `\cpgN`; falls back to the document's.
    encoding: Option<&'static Encoding>,
}

struct RtfWriter {
    out: String,
    pending_fallback: usize,
    /// Document codepage from `\ansicpgN`.
    codepage: &'static Encoding,
    /// Consecutive `\'hh` bytes, decoded together so multi-byte codepages work.
    bytes: Vec<u8>,
    bytes_encoding: &'static Encoding,
}

impl RtfWriter {
    fn new() -> Self {
        Self {
            out: String::new(),
            pending_fallback: 0,
            codepage: WINDOWS_1252,
            bytes: Vec::new(),
            bytes_encoding: WINDOWS_1252,
        }
    }

    fn emit(&mut self, state: GroupState, c: char) {
        if state.skip {
            return;
        }
        if self.pending_fallback > 0 {
            self.pending_fallback -= 1;
            return;
        }
        self.flush_bytes();
        self.out.push(c);
    }

    fn emit_control(&mut self, state: GroupState, c: char) {
        self.pending_fallback = 0;
        if !state.skip {
            self.flush_bytes();
            self.out.push(c);
        }
    }

    fn emit_byte(&mut self, state: GroupState, byte: u8) {
        if state.skip {
            return;
        }
        if self.pending_fallback > 0 {
            self.pending_fallback -= 1;
            return;
        }
        let encoding = state.encoding.unwrap_or(self.codepage);
        if encoding != self.bytes_encoding {
            self.flush_bytes();
            self.bytes_encoding = encoding;
        }
        self.bytes.push(byte);
    }

    fn flush_bytes(&mut self) {
        if self.bytes.is_empty() {
            return;
        }
        let (text, _) = self.bytes_encoding.decode_without_bom_handling(&self.bytes);
        self.out.push_str(&text);
        self.bytes.clear();
    }

    fn finish(mut self) -> String {
        self.flush_bytes();
        self.out
    }
}

/// Reduce RTF markup to visible text.
///
/// `\'hh` bytes are decoded through the codepage declared by `\ansicpgN`
/// (or a group's `\cpgN`), defaulting to Windows-1252.
pub fn rtf_to_text(source: &str) -> String {
    let mut chars = source.chars().peekable();
    let mut stack: Vec<GroupState> = Vec::new();
    let mut state = GroupState { skip: false, unicode_skip: 1, encoding: None };
    let mut writer = RtfWriter::new();

    while let Some(c) = chars.next() {
        match c {
            '{' => stack.push(state),
            '}' => {
                if let Some(outer) = stack.pop() {
                    state = outer;
                }
            }
            '\r' | '\n' => {}
            '\\' => {
                let Some(next) = chars.next() else { break };
                match next {
                    '\\' | '{' | '}' => writer.emit(state, next),
                    '*' => state.skip = true,
                    '~' => writer.emit(state, '\u{a0}'),
                    '_' => writer.emit(state, '-'),
                    '-' => {}
                    '\r' | '\n' => writer.emit_control(state, '\n'),
                    '\'' => {
                        let hex: String = chars.by_ref().take(2).collect();
                        if let Ok(byte) = u8::from_str_radix(&hex, 16) {
                            writer.emit_byte(state, byte);
                        }
                    }
                    c if c.is_ascii_alphabetic() => {
                        let mut word = String::from(c);
                        while let Some(&c) = chars.peek() {
                            if !c.is_ascii_alphabetic() {
                                break;
                            }
                            word.push(c);
                            chars.next();
                        }
                        let mut param = String::new();
                        if chars.peek() == Some(&'-') {
                            param.push('-');
                            chars.next();
                        }
                        while let Some(&c) = chars.peek() {
                            if !c.is_ascii_digit() {
                                break;
                            }
                            param.push(c);
                            chars.next();
                        }
                        if chars.peek() == Some(&' ') {
                            chars.next();
                        }
                        let param: Option<i32> = param.parse().ok();
                        control_word(&word, param, &mut state, &mut writer);
                    }
                    _ => {}
                }
            }
            _ => writer.emit(state, c),
        }
    }

    writer.finish()
}

fn control_word(word: &str, param: Option<i32>, state: &mut GroupState, writer: &mut RtfWriter) {
    match word {
        "par" | "line" | "sect" | "page" | "row" => writer.emit_control(*state, '\n'),
        "tab" | "cell" => writer.emit_control(*state, '\t'),
        "emdash" => writer.emit_control(*state, '\u{2014}'),
        "endash" => writer.emit_control(*state, '\u{2013}'),
        "bullet" => writer.emit_control(*state, '\u{2022}'),
        "lquote" => writer.emit_control(*state, '\u{2018}'),
        "rquote" => writer.emit_control(*state, '\u{2019}'),
        "ldblquote" => writer.emit_control(*state, '\u{201c}'),
        "rdblquote" => writer.emit_control(*state, '\u{201d}'),
        "mac" => writer.codepage = MACINTOSH,
        "ansicpg" => {
            if let Some(encoding) = param.and_then(encoding_for_codepage) {
                writer.codepage = encoding;
            }
        }
        "cpg" if !state.skip => state.encoding = param.and_then(encoding_for_codepage),
        "uc" => state.unicode_skip = param.map_or(1, |n| n.max(0) as usize),
        "u" if !state.skip => {
            if let Some(n) = param {
                let code = if n < 0 { n + 65536 } else { n };
                if let Some(c) = u32::try_from(code).ok().and_then(char::from_u32) {
                    writer.emit_control(*state, c);
                }
                writer.pending_fallback = state.unicode_skip;
            }
        }
        w if SKIPPED_DESTINATIONS.contains(&w) => state.skip = true,
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markup_and_tables() {
        let rtf = r"{\rtf1\ansi{\fonttbl{\f0 Helvetica;}}{\colortbl;\red0\green0\blue0;}
\f0\fs24 Hello \b world\b0 .\par Second line.}";
        assert_eq!(rtf_to_text(rtf), "Hello world.\nSecond line.");
    }

    #[test]
    fn decodes_escapes() {
        let rtf = r"{\rtf1 caf\'e9 \{x\} na\u239?ve \u8212? end}";
        assert_eq!(rtf_to_text(rtf), "caf\u{e9} {x} na\u{ef}ve \u{2014} end");
    }

    #[test]
    fn hex_bytes_follow_declared_codepage() {
        let rtf = r"{\rtf1\ansi\ansicpg1251 \'cf\'f0\'e8\'e2\'e5\'f2, \'ec\'e8\'f0!}";
        assert_eq!(rtf_to_text(rtf), "Привет, мир!");
    }

    #[test]
    fn group_codepage_overrides_document() {
        let rtf = r"{\rtf1\ansi\ansicpg1252 caf\'e9 {\cpg1251 \'e4\'e0} caf\'e9}";
        assert_eq!(rtf_to_text(rtf), "caf\u{e9} да caf\u{e9}");
    }

    #[test]
    fn multibyte_codepage_decodes_byte_pairs() {
        let rtf = r"{\rtf1\ansi\ansicpg936 \'c4\'e3\'ba\'c3}";
        assert_eq!(rtf_to_text(rtf), "你好");
    }

    #[test]
    fn unicode_fallback_bytes_are_skipped() {
        let rtf = r"{\rtf1\ansi\ansicpg1251\uc1 \u1055\'cf\u1088\'f0}";
        assert_eq!(rtf_to_text(rtf), "Пр");
    }

    #[test]
    fn ignorable_destinations_are_skipped() {
        let rtf = r"{\rtf1{\*\generator Writer;}Visible}";
        assert_eq!(rtf_to_text(rtf), "Visible");
    }

    #[test]
    fn extractor_is_chosen_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let rtf_path = dir.path().join("doc.RTF");
        fs::write(&rtf_path, r"{\rtf1 Plain\par text}").unwrap();
        assert_eq!(extractor_for(&rtf_path).extract(&rtf_path).unwrap(), "Plain\ntext");

        let txt_path = dir.path().join("doc.txt");
        fs::write(&txt_path, "{\\rtf1 literal}").unwrap();
        assert_eq!(extractor_for(&txt_path).extract(&txt_path).unwrap(), "{\\rtf1 literal}");
    }

    #[test]
    fn missing_file_is_an_extraction_error() {
        let err = PlainTextExtractor.extract(Path::new("/definitely/not/here.txt")).unwrap_err();
        assert!(matches!(err, RagError::ExtractionError { .. }));
    }

    #[test]
    fn rtf_without_header_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.rtf");
        fs::write(&path, "just text").unwrap();
        assert!(RtfExtractor.extract(&path).is_err());
    }
}
