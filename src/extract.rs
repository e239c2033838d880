//! Per-file text extraction.
//!
//! [`Extractor`] is a closed set of decoders chosen from a static extension
//! table. [`ExtractorRegistry`] wraps dispatch with failure isolation and the
//! content pipeline (normalize, then truncate): a decoder error or panic for
//! one file yields `None` and never affects the next file.
//!
//! OOXML containers are read with `zip` and walked with `quick-xml` event
//! loops. Every ZIP entry is read through a bounded reader so a crafted
//! archive cannot inflate past [`MAX_XML_ENTRY_BYTES`].

use std::fs::File;
use std::io::{Read, Seek};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use deskindex_core::models::extension_of;
use deskindex_core::text::prepare_content;
use encoding_rs::{Encoding, UTF_8};
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::Reader;
use tracing::debug;

/// Maximum decompressed bytes read from a single ZIP entry.
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;
/// Non-empty rows read across all sheets of a workbook.
const XLSX_MAX_ROWS: usize = 10_000;
/// Bytes read from a plain-text file.
const TEXT_MAX_BYTES: u64 = 1024 * 1024;
/// Bytes sampled for encoding detection.
const ENCODING_SAMPLE_BYTES: usize = 10_000;
/// Below this detector confidence the text is decoded as UTF-8.
const MIN_ENCODING_CONFIDENCE: f64 = 0.5;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("no extractor for extension `{0}`")]
    Unsupported(String),
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("OOXML extraction failed: {0}")]
    Ooxml(String),
    #[error("content is binary")]
    Binary,
    #[error("extractor panicked")]
    Panicked,
}

impl From<zip::result::ZipError> for ExtractError {
    fn from(e: zip::result::ZipError) -> Self {
        ExtractError::Ooxml(e.to_string())
    }
}

impl From<quick_xml::Error> for ExtractError {
    fn from(e: quick_xml::Error) -> Self {
        ExtractError::Ooxml(e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extractor {
    Pdf,
    Docx,
    Xlsx,
    Pptx,
    PlainText,
}

static EXTENSION_TABLE: &[(&str, Extractor)] = &[
    (".pdf", Extractor::Pdf),
    (".docx", Extractor::Docx),
    (".xlsx", Extractor::Xlsx),
    (".pptx", Extractor::Pptx),
    (".txt", Extractor::PlainText),
    (".md", Extractor::PlainText),
    (".csv", Extractor::PlainText),
    (".json", Extractor::PlainText),
    (".xml", Extractor::PlainText),
    (".yaml", Extractor::PlainText),
    (".yml", Extractor::PlainText),
    (".toml", Extractor::PlainText),
    (".ini", Extractor::PlainText),
    (".log", Extractor::PlainText),
    (".py", Extractor::PlainText),
    (".js", Extractor::PlainText),
    (".ts", Extractor::PlainText),
    (".jsx", Extractor::PlainText),
    (".tsx", Extractor::PlainText),
    (".html", Extractor::PlainText),
    (".css", Extractor::PlainText),
    (".scss", Extractor::PlainText),
    (".java", Extractor::PlainText),
    (".c", Extractor::PlainText),
    (".cpp", Extractor::PlainText),
    (".h", Extractor::PlainText),
    (".hpp", Extractor::PlainText),
    (".cs", Extractor::PlainText),
    (".go", Extractor::PlainText),
    (".rs", Extractor::PlainText),
    (".rb", Extractor::PlainText),
    (".php", Extractor::PlainText),
    (".sql", Extractor::PlainText),
    (".sh", Extractor::PlainText),
    (".bat", Extractor::PlainText),
    (".ps1", Extractor::PlainText),
];

impl Extractor {
    /// Looks up a lower-cased, dot-prefixed extension.
    pub fn for_extension(ext: &str) -> Option<Extractor> {
        EXTENSION_TABLE
            .iter()
            .find(|(e, _)| *e == ext)
            .map(|(_, x)| *x)
    }

    pub fn for_path(path: &Path) -> Option<Extractor> {
        let name = path.file_name()?.to_string_lossy();
        Self::for_extension(&extension_of(&name))
    }

    /// Raw text of `path`, before normalization and truncation.
    pub fn extract(self, path: &Path) -> Result<String, ExtractError> {
        match self {
            Extractor::Pdf => {
                let bytes = std::fs::read(path)?;
                pdf_extract::extract_text_from_mem(&bytes)
                    .map_err(|e| ExtractError::Pdf(e.to_string()))
            }
            Extractor::Docx => extract_docx(File::open(path)?),
            Extractor::Xlsx => extract_xlsx(File::open(path)?),
            Extractor::Pptx => extract_pptx(File::open(path)?),
            Extractor::PlainText => {
                let mut bytes = Vec::new();
                File::open(path)?.take(TEXT_MAX_BYTES).read_to_end(&mut bytes)?;
                decode_text(&bytes)
            }
        }
    }
}

/// Dispatch plus the content pipeline.
#[derive(Debug, Clone)]
pub struct ExtractorRegistry {
    max_content_length: usize,
}

impl ExtractorRegistry {
    pub fn new(max_content_length: usize) -> Self {
        Self { max_content_length }
    }

    pub fn is_supported(&self, path: &Path) -> bool {
        Extractor::for_path(path).is_some()
    }

    /// Normalized, truncated text of `path`, or `None` when the type is
    /// unsupported, decoding fails, or nothing textual remains.
    pub fn extract_text(&self, path: &Path) -> Option<String> {
        match self.try_extract(path) {
            Ok(raw) => {
                let content = prepare_content(&raw, self.max_content_length);
                if content.is_empty() {
                    None
                } else {
                    Some(content)
                }
            }
            Err(ExtractError::Unsupported(ext)) => {
                debug!(path = %path.display(), ext = %ext, "unsupported extension");
                None
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "extraction failed");
                None
            }
        }
    }

    /// Raw extraction with panics from third-party decoders turned into
    /// [`ExtractError::Panicked`].
    pub fn try_extract(&self, path: &Path) -> Result<String, ExtractError> {
        let extractor = Extractor::for_path(path).ok_or_else(|| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            ExtractError::Unsupported(extension_of(&name))
        })?;
        catch_unwind(AssertUnwindSafe(|| extractor.extract(path)))
            .unwrap_or(Err(ExtractError::Panicked))
    }
}

// ---------------------------------------------------------------------------
// Plain text
// ---------------------------------------------------------------------------

/// Encoding chosen for a sample, and how sure the detector is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectedEncoding {
    pub encoding: &'static Encoding,
    pub confidence: f64,
}

/// Picks the encoding of `sample`.
///
/// A byte-order mark wins. Otherwise valid UTF-8 is taken as UTF-8 (a
/// multi-byte sequence cut by the sample boundary is allowed). Otherwise
/// `chardetng` guesses, and the guess is scored by the share of decoded
/// characters that are neither replacement characters nor control codes
/// other than tab, newline, carriage return and form feed. Below
/// `MIN_ENCODING_CONFIDENCE` the sample is treated as UTF-8.
pub fn detect_encoding(sample: &[u8]) -> Result<DetectedEncoding, ExtractError> {
    if let Some((encoding, _)) = Encoding::for_bom(sample) {
        return Ok(DetectedEncoding {
            encoding,
            confidence: 1.0,
        });
    }
    if sample.contains(&0) {
        return Err(ExtractError::Binary);
    }
    match std::str::from_utf8(sample) {
        Ok(_) => {
            return Ok(DetectedEncoding {
                encoding: UTF_8,
                confidence: 1.0,
            })
        }
        Err(e) if e.error_len().is_none() => {
            return Ok(DetectedEncoding {
                encoding: UTF_8,
                confidence: 1.0,
            })
        }
        Err(_) => {}
    }

    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(sample, true);
    let guess = detector.guess(None, true);
    let (decoded, _) = guess.decode_without_bom_handling(sample);
    let total = decoded.chars().count().max(1);
    let garbage = decoded.chars().filter(|c| is_garbage(*c)).count();
    let confidence = 1.0 - garbage as f64 / total as f64;

    if confidence < MIN_ENCODING_CONFIDENCE {
        Ok(DetectedEncoding {
            encoding: UTF_8,
            confidence,
        })
    } else {
        Ok(DetectedEncoding {
            encoding: guess,
            confidence,
        })
    }
}

fn is_garbage(c: char) -> bool {
    c == '\u{FFFD}' || (c.is_control() && !matches!(c, '\t' | '\n' | '\r' | '\x0C'))
}

/// Decodes a whole read, replacing undecodable bytes.
pub fn decode_text(bytes: &[u8]) -> Result<String, ExtractError> {
    let sample = &bytes[..bytes.len().min(ENCODING_SAMPLE_BYTES)];
    let detected = detect_encoding(sample)?;
    let (text, _, _) = detected.encoding.decode(bytes);
    Ok(text.into_owned())
}

// ---------------------------------------------------------------------------
// OOXML
// ---------------------------------------------------------------------------

fn read_zip_entry_bounded<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
    name: &str,
) -> Result<Vec<u8>, ExtractError> {
    let entry = archive.by_name(name)?;
    let mut out = Vec::new();
    entry.take(MAX_XML_ENTRY_BYTES).read_to_end(&mut out)?;
    if out.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Ooxml(format!(
            "ZIP entry {name} exceeds size limit ({MAX_XML_ENTRY_BYTES} bytes)"
        )));
    }
    Ok(out)
}

/// Entry names under `prefix` ending in `.xml`, ordered by the number
/// between them (`slide2.xml` before `slide10.xml`).
fn numbered_entries<R: Read + Seek>(archive: &zip::ZipArchive<R>, prefix: &str) -> Vec<String> {
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with(prefix) && n.ends_with(".xml"))
        .map(str::to_string)
        .collect();
    names.sort_by_key(|name| {
        name.trim_start_matches(prefix)
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    names
}

fn unescaped(te: &BytesText<'_>) -> Result<String, ExtractError> {
    te.unescape()
        .map(|t| t.into_owned())
        .map_err(|e| ExtractError::Ooxml(e.to_string()))
}

fn xml_reader(xml: &[u8]) -> Reader<&[u8]> {
    let mut reader = Reader::from_reader(xml);
    // Whitespace inside runs is significant (`xml:space="preserve"`).
    reader.config_mut().trim_text(false);
    reader
}

/// Collects `<t>` text from a WordprocessingML or DrawingML part. Each
/// paragraph (`<p>`) ends a line; tabs and breaks are kept.
fn paragraph_text(xml: &[u8]) -> Result<String, ExtractError> {
    let mut reader = xml_reader(xml);
    let mut out = String::new();
    let mut buf = Vec::new();
    let mut in_t = false;
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"t" => in_t = true,
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_t = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"tab" => out.push('\t'),
                b"br" | b"cr" => out.push('\n'),
                _ => {}
            },
            Event::Text(te) if in_t => out.push_str(&unescaped(&te)?),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

fn extract_docx<R: Read + Seek>(reader: R) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(reader)?;
    let xml = read_zip_entry_bounded(&mut archive, "word/document.xml")?;
    paragraph_text(&xml)
}

fn extract_pptx<R: Read + Seek>(reader: R) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(reader)?;
    let mut out = String::new();
    for name in numbered_entries(&archive, "ppt/slides/slide") {
        let xml = read_zip_entry_bounded(&mut archive, &name)?;
        let text = paragraph_text(&xml)?;
        if !out.is_empty() && !text.trim().is_empty() {
            out.push('\n');
        }
        out.push_str(&text);
    }
    Ok(out)
}

/// Shared string table. Rich-text runs of one `<si>` are concatenated;
/// phonetic hints (`<rPh>`) are skipped.
fn read_shared_strings<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
) -> Result<Vec<String>, ExtractError> {
    const PART: &str = "xl/sharedStrings.xml";
    if !archive.file_names().any(|n| n == PART) {
        return Ok(Vec::new());
    }
    let xml = read_zip_entry_bounded(archive, PART)?;
    let mut reader = xml_reader(&xml);
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut buf = Vec::new();
    let mut in_t = false;
    let mut in_phonetic = false;
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => current.clear(),
                b"rPh" => in_phonetic = true,
                b"t" => in_t = !in_phonetic,
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"si" => strings.push(std::mem::take(&mut current)),
                b"rPh" => in_phonetic = false,
                b"t" => in_t = false,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::Text(te) if in_t => current.push_str(&unescaped(&te)?),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum CellKind {
    Shared,
    Inline,
    Other,
}

fn cell_kind(e: &BytesStart<'_>) -> CellKind {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == b"t" {
            return match attr.value.as_ref() {
                b"s" => CellKind::Shared,
                b"inlineStr" => CellKind::Inline,
                _ => CellKind::Other,
            };
        }
    }
    CellKind::Other
}

/// Appends the non-empty rows of one sheet to `rows`, stopping at
/// [`XLSX_MAX_ROWS`] total.
fn sheet_rows(
    xml: &[u8],
    shared: &[String],
    rows: &mut Vec<String>,
) -> Result<(), ExtractError> {
    let mut reader = xml_reader(xml);
    let mut buf = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut kind = CellKind::Other;
    let mut value = String::new();
    let mut in_value = false;
    loop {
        if rows.len() >= XLSX_MAX_ROWS {
            break;
        }
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"row" => row.clear(),
                b"c" => {
                    kind = cell_kind(&e);
                    value.clear();
                }
                b"v" => in_value = true,
                b"t" if kind == CellKind::Inline => in_value = true,
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => {
                    let text = match kind {
                        CellKind::Shared => value
                            .trim()
                            .parse::<usize>()
                            .ok()
                            .and_then(|i| shared.get(i).cloned())
                            .unwrap_or_default(),
                        CellKind::Inline | CellKind::Other => std::mem::take(&mut value),
                    };
                    if !text.is_empty() {
                        row.push(text);
                    }
                    kind = CellKind::Other;
                }
                b"row" => {
                    if !row.is_empty() {
                        rows.push(row.join("\t"));
                        row.clear();
                    }
                }
                _ => {}
            },
            Event::Text(te) if in_value => value.push_str(&unescaped(&te)?),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(())
}

fn extract_xlsx<R: Read + Seek>(reader: R) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(reader)?;
    let shared = read_shared_strings(&mut archive)?;
    let mut rows = Vec::new();
    for name in numbered_entries(&archive, "xl/worksheets/sheet") {
        if rows.len() >= XLSX_MAX_ROWS {
            break;
        }
        let xml = read_zip_entry_bounded(&mut archive, &name)?;
        sheet_rows(&xml, &shared, &mut rows)?;
    }
    Ok(rows.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut w = zip::ZipWriter::new(&mut buf);
            for (name, body) in entries {
                w.start_file(*name, SimpleFileOptions::default()).unwrap();
                w.write_all(body.as_bytes()).unwrap();
            }
            w.finish().unwrap();
        }
        buf.into_inner()
    }

    const DOCX_BODY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>
<w:p><w:r><w:t>Quarterly</w:t></w:r><w:r><w:t xml:space="preserve"> report</w:t></w:r></w:p>
<w:tbl><w:tr><w:tc><w:p><w:r><w:t>cell A</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>cell B</w:t></w:r></w:p></w:tc></w:tr></w:tbl>
<w:p><w:r><w:t>a</w:t><w:tab/><w:t>b</w:t></w:r></w:p>
</w:body></w:document>"#;

    #[test]
    fn unsupported_extension_is_reported() {
        let reg = ExtractorRegistry::new(100);
        let err = reg.try_extract(Path::new("/tmp/movie.mkv")).unwrap_err();
        assert!(matches!(err, ExtractError::Unsupported(ext) if ext == ".mkv"));
        assert!(!reg.is_supported(Path::new("/tmp/noext")));
        assert!(reg.is_supported(Path::new("/tmp/README.MD")));
    }

    #[test]
    fn docx_paragraphs_and_cells_become_lines() {
        let text =
            extract_docx(Cursor::new(zip_bytes(&[("word/document.xml", DOCX_BODY)]))).unwrap();
        let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
        assert_eq!(lines, vec!["Quarterly report", "cell A", "cell B", "a\tb"]);
    }

    #[test]
    fn docx_without_document_part_fails() {
        let err = extract_docx(Cursor::new(zip_bytes(&[("other.xml", "<x/>")]))).unwrap_err();
        assert!(matches!(err, ExtractError::Ooxml(_)));
    }

    #[test]
    fn xlsx_rows_are_tab_and_newline_joined() {
        let shared = r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<si><t>Name</t></si><si><r><t>Tot</t></r><r><t>al</t></r></si>
<si><t>東京</t><rPh sb="0" eb="2"><t>トウキョウ</t></rPh></si></sst>"#;
        let sheet = r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>
<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c></row>
<row r="2"><c r="A2" t="s"><v>2</v></c><c r="B2"><v>42.5</v></c></row>
<row r="3"></row>
<row r="4"><c r="A4" t="inlineStr"><is><t>inline</t></is></c></row>
</sheetData></worksheet>"#;
        let bytes = zip_bytes(&[
            ("xl/sharedStrings.xml", shared),
            ("xl/worksheets/sheet1.xml", sheet),
        ]);
        let text = extract_xlsx(Cursor::new(bytes)).unwrap();
        assert_eq!(text, "Name\tTotal\n東京\t42.5\ninline");
    }

    #[test]
    fn xlsx_without_shared_strings_uses_raw_values() {
        let sheet = r#"<worksheet><sheetData><row><c><v>1</v></c><c><v>2</v></c></row></sheetData></worksheet>"#;
        let bytes = zip_bytes(&[("xl/worksheets/sheet1.xml", sheet)]);
        assert_eq!(extract_xlsx(Cursor::new(bytes)).unwrap(), "1\t2");
    }

    #[test]
    fn pptx_slides_follow_numeric_order() {
        let slide = |t: &str| {
            format!(
                r#"<p:sld xmlns:p="p" xmlns:a="a"><p:cSld><p:spTree><p:sp><p:txBody><a:p><a:r><a:t>{t}</a:t></a:r></a:p></p:txBody></p:sp></p:spTree></p:cSld></p:sld>"#
            )
        };
        let (s1, s2, s10) = (slide("one"), slide("two"), slide("ten"));
        let bytes = zip_bytes(&[
            ("ppt/slides/slide10.xml", s10.as_str()),
            ("ppt/slides/slide2.xml", s2.as_str()),
            ("ppt/slides/slide1.xml", s1.as_str()),
        ]);
        let text = extract_pptx(Cursor::new(bytes)).unwrap();
        let lines: Vec<&str> = text.lines().filter(|l| !l.is_empty()).collect();
        assert_eq!(lines, vec!["one", "two", "ten"]);
    }

    #[test]
    fn utf8_and_truncated_utf8_samples_are_utf8() {
        assert_eq!(detect_encoding("héllo".as_bytes()).unwrap().encoding, UTF_8);
        let bytes = "日本".as_bytes();
        assert_eq!(detect_encoding(&bytes[..4]).unwrap().encoding, UTF_8);
    }

    #[test]
    fn detects_shift_jis() {
        let text = "これは日本語のテキストファイルです。検索エンジンに登録されます。";
        let (encoded, _, _) = encoding_rs::SHIFT_JIS.encode(text);
        let detected = detect_encoding(&encoded).unwrap();
        assert_eq!(detected.encoding, encoding_rs::SHIFT_JIS);
        assert_eq!(decode_text(&encoded).unwrap(), text);
    }

    #[test]
    fn control_heavy_sample_falls_back_to_utf8() {
        let sample: Vec<u8> = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0xE9]
            .repeat(20);
        assert!(std::str::from_utf8(&sample).is_err());

        let detected = detect_encoding(&sample).unwrap();
        assert_eq!(detected.encoding, UTF_8);
        assert!(detected.confidence < MIN_ENCODING_CONFIDENCE);

        let text = decode_text(&sample).unwrap();
        assert!(text.contains('\u{FFFD}'));
        assert!(!text.contains('é'));
    }

    #[test]
    fn latin1_prose_keeps_its_guess() {
        let text = "Café crème, déjà vu à la française. Le garçon était très sûr.";
        let (encoded, _, _) = encoding_rs::WINDOWS_1252.encode(text);
        let detected = detect_encoding(&encoded).unwrap();
        assert!(detected.confidence >= MIN_ENCODING_CONFIDENCE);
        assert_ne!(detected.encoding, UTF_8);
        assert_eq!(decode_text(&encoded).unwrap(), text);
    }

    #[test]
    fn bom_wins_and_nul_means_binary() {
        let mut utf16 = vec![0xFF, 0xFE];
        for unit in "hi".encode_utf16() {
            utf16.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(
            detect_encoding(&utf16).unwrap().encoding,
            encoding_rs::UTF_16LE
        );
        assert!(matches!(
            detect_encoding(b"ab\0cd"),
            Err(ExtractError::Binary)
        ));
    }

    #[test]
    fn registry_isolates_failures_and_normalizes() {
        let tmp = TempDir::new().unwrap();
        let bad_pdf = tmp.path().join("broken.pdf");
        let bad_docx = tmp.path().join("broken.docx");
        let good = tmp.path().join("notes.txt");
        std::fs::write(&bad_pdf, b"not a pdf").unwrap();
        std::fs::write(&bad_docx, b"not a zip").unwrap();
        std::fs::write(&good, "  first  \n\n\n\nsecond\n").unwrap();

        let reg = ExtractorRegistry::new(1000);
        assert_eq!(reg.extract_text(&bad_pdf), None);
        assert_eq!(reg.extract_text(&bad_docx), None);
        assert_eq!(reg.extract_text(&good).as_deref(), Some("first\n\nsecond"));
    }

    #[test]
    fn registry_truncates_to_max_length() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("long.md");
        std::fs::write(&path, format!("{}\n\n\n{}", "x".repeat(50), "y".repeat(50))).unwrap();
        let text = ExtractorRegistry::new(60).extract_text(&path).unwrap();
        assert_eq!(text.chars().count(), 60);
    }

    #[test]
    fn whitespace_only_file_has_no_content() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("blank.txt");
        std::fs::write(&path, " \n\t\n").unwrap();
        assert_eq!(ExtractorRegistry::new(10).extract_text(&path), None);
    }
}
