// src/extractors/pdf.rs

// --- Imports ---
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::content::Content;
use lopdf::{Document, Object, ObjectId, Stream};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::extractors::OcrEngine;
use crate::gateway::models::{ExtractionResult, Table};
use crate::utils::error::PdfError;

// --- Constants ---
const TITLE_MAX_WORDS: usize = 12;
const TITLE_MAX_CHARS: usize = 100;

// Layout distances, in multiples of the font size
const GLYPH_WIDTH: f32 = 0.5;
const WORD_GAP: f32 = 0.15;
const COLUMN_GAP: f32 = 1.0;
const SAME_LINE: f32 = 0.3;
const PARAGRAPH_GAP: f32 = 1.8;

// --- Regex Patterns (Lazy Static) ---
// Cells in a text-rendered table are separated by tabs or wide gaps
static COLUMN_GAP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\t+| {2,}").expect("Failed to compile COLUMN_GAP_RE")
});

// Bullets, "1." / "2)" enumerators, "a)" letters
static LIST_MARKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[-*•◦▪‣]|\d{1,3}[.)]|[a-z]\))\s+\S").expect("Failed to compile LIST_MARKER_RE")
});

// --- Data Structures ---

/// How hard the partitioner looks at each page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum PdfStrategy {
    /// Line-level layout analysis with table detection
    #[default]
    #[value(name = "hi_res")]
    HiRes,
    /// One text element per page
    #[value(name = "fast")]
    Fast,
}

impl fmt::Display for PdfStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PdfStrategy::HiRes => f.write_str("hi_res"),
            PdfStrategy::Fast => f.write_str("fast"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Title,
    NarrativeText,
    ListItem,
    Table,
    PageBreak,
}

/// One unit of document structure. Page breaks carry no text.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub kind: ElementKind,
    pub text: Option<String>,
}

impl Element {
    fn with_text(kind: ElementKind, text: String) -> Self {
        Self {
            kind,
            text: Some(text),
        }
    }

    fn page_break() -> Self {
        Self {
            kind: ElementKind::PageBreak,
            text: None,
        }
    }
}

/// Splits a PDF into an ordered list of [`Element`]s.
pub trait DocumentPartitioner: Send + Sync {
    fn partition(&self, path: &Path, strategy: PdfStrategy) -> Result<Vec<Element>, PdfError>;
}

#[derive(Clone)]
struct PageOcr {
    engine: Arc<dyn OcrEngine>,
    language: String,
}

/// Partitioner that lays out each page's content stream with `lopdf`.
///
/// With an OCR engine attached, `hi_res` also reads pages that have no text layer by
/// recognising their embedded images.
#[derive(Clone, Default)]
pub struct LopdfPartitioner {
    ocr: Option<PageOcr>,
}

impl LopdfPartitioner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ocr(mut self, engine: Arc<dyn OcrEngine>, language: impl Into<String>) -> Self {
        self.ocr = Some(PageOcr {
            engine,
            language: language.into(),
        });
        self
    }
}

impl DocumentPartitioner for LopdfPartitioner {
    fn partition(&self, path: &Path, strategy: PdfStrategy) -> Result<Vec<Element>, PdfError> {
        let doc = Document::load(path).map_err(|e| PdfError::Load(e.to_string()))?;
        let pages = doc.get_pages();
        tracing::debug!("Partitioning {} pages with {} strategy", pages.len(), strategy);

        let mut elements = Vec::new();
        for (index, (&page, &page_id)) in pages.iter().enumerate() {
            let lines = page_lines(&doc, page_id).map_err(|e| PdfError::Extraction {
                page,
                message: e.to_string(),
            })?;

            if index > 0 {
                elements.push(Element::page_break());
            }
            match strategy {
                PdfStrategy::HiRes => {
                    let has_text = lines.iter().any(|line| !line.trim().is_empty());
                    match &self.ocr {
                        Some(ocr) if !has_text => elements.extend(ocr_page(&doc, page, page_id, ocr)?),
                        _ => elements.extend(partition_lines(lines.iter().map(String::as_str))),
                    }
                }
                PdfStrategy::Fast => {
                    let text = lines.join("\n");
                    let text = text.trim();
                    if !text.is_empty() {
                        elements.push(Element::with_text(
                            ElementKind::NarrativeText,
                            text.to_string(),
                        ));
                    }
                }
            }
        }

        Ok(elements)
    }
}

// --- Entry Point ---

/// Partitions the PDF at `path`, joins all element text with single spaces and
/// collects the text of table elements separately, in document order.
pub fn extract_from_pdf(
    partitioner: &dyn DocumentPartitioner,
    path: &Path,
    strategy: PdfStrategy,
) -> Result<ExtractionResult, PdfError> {
    let elements = partitioner.partition(path, strategy)?;

    let text = elements
        .iter()
        .filter_map(|el| el.text.as_deref())
        .collect::<Vec<_>>()
        .join(" ");

    let tables: Vec<Table> = elements
        .iter()
        .filter(|el| el.kind == ElementKind::Table)
        .filter_map(|el| el.text.clone())
        .map(Table::Text)
        .collect();

    tracing::info!(
        "Partitioned PDF into {} elements ({} tables)",
        elements.len(),
        tables.len()
    );
    Ok(ExtractionResult { text, tables })
}

// --- Content Stream Layout ---

/// A string drawn at one position, in unscaled page units.
#[derive(Debug, Clone)]
struct TextRun {
    x: f32,
    y: f32,
    width: f32,
    size: f32,
    text: String,
}

/// The parts of the PDF text state that decide where glyphs land.
struct TextCursor {
    font_size: f32,
    leading: f32,
    scale: (f32, f32),
    line: (f32, f32),
    pen_x: f32,
}

impl Default for TextCursor {
    fn default() -> Self {
        Self {
            font_size: 12.0,
            leading: 0.0,
            scale: (1.0, 1.0),
            line: (0.0, 0.0),
            pen_x: 0.0,
        }
    }
}

impl TextCursor {
    fn begin(&mut self) {
        self.scale = (1.0, 1.0);
        self.line = (0.0, 0.0);
        self.pen_x = 0.0;
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.line.0 += tx * self.scale.0;
        self.line.1 += ty * self.scale.1;
        self.pen_x = self.line.0;
    }

    fn set_matrix(&mut self, a: f32, d: f32, e: f32, f: f32) {
        self.scale = (a, d);
        self.line = (e, f);
        self.pen_x = e;
    }

    fn next_line(&mut self) {
        self.move_line(0.0, -self.leading);
    }

    fn size(&self) -> f32 {
        let scaled = self.font_size * self.scale.1.abs();
        if scaled > 0.0 {
            scaled
        } else {
            self.font_size.abs().max(1.0)
        }
    }

    /// Records the strings in `operands` as one run and advances the pen past it.
    fn show(&mut self, operands: &[Object], encoding: Option<&str>, runs: &mut Vec<TextRun>) {
        let size = self.size();
        let mut text = String::new();
        let mut adjust = 0.0;
        for operand in operands {
            match operand {
                Object::String(bytes, _) => text.push_str(&Document::decode_text(encoding, bytes)),
                Object::Array(items) => {
                    for item in items {
                        match item {
                            Object::String(bytes, _) => {
                                text.push_str(&Document::decode_text(encoding, bytes))
                            }
                            other => {
                                // Kerning in thousandths of a text-space unit; large negative values are word gaps
                                if let Ok(kern) = other.as_float() {
                                    if kern < -100.0 && !text.ends_with(' ') {
                                        text.push(' ');
                                    }
                                    adjust -= kern / 1000.0 * size;
                                }
                            }
                        }
                    }
                }
                _ => {}
            }
        }

        let width = text.chars().count() as f32 * GLYPH_WIDTH * size + adjust;
        if !text.trim().is_empty() {
            runs.push(TextRun {
                x: self.pen_x,
                y: self.line.1,
                width,
                size,
                text,
            });
        }
        self.pen_x += width;
    }
}

fn number(operands: &[Object], index: usize) -> Option<f32> {
    operands.get(index).and_then(|o| o.as_float().ok())
}

/// Walks the page's content stream and returns its text as lines, top to bottom.
/// Wide gaps between runs on a line become double spaces; wide gaps between lines
/// become empty lines.
fn page_lines(doc: &Document, page_id: ObjectId) -> lopdf::Result<Vec<String>> {
    let encodings: BTreeMap<Vec<u8>, &str> = doc
        .get_page_fonts(page_id)
        .into_iter()
        .map(|(name, font)| (name, font.get_font_encoding()))
        .collect();
    let content = Content::decode(&doc.get_page_content(page_id)?)?;

    let mut cursor = TextCursor::default();
    let mut encoding = None;
    let mut runs = Vec::new();
    for op in &content.operations {
        let operands = op.operands.as_slice();
        match op.operator.as_str() {
            "BT" => cursor.begin(),
            "Tf" => {
                if let Some(name) = operands.first().and_then(|o| o.as_name().ok()) {
                    encoding = encodings.get(name).copied();
                }
                if let Some(size) = number(operands, 1) {
                    cursor.font_size = size;
                }
            }
            "TL" => {
                if let Some(leading) = number(operands, 0) {
                    cursor.leading = leading;
                }
            }
            "Td" | "TD" => {
                let tx = number(operands, 0).unwrap_or(0.0);
                let ty = number(operands, 1).unwrap_or(0.0);
                if op.operator == "TD" {
                    cursor.leading = -ty;
                }
                cursor.move_line(tx, ty);
            }
            "Tm" => {
                let m: Vec<f32> = operands.iter().filter_map(|o| o.as_float().ok()).collect();
                if let [a, _, _, d, e, f] = m.as_slice() {
                    cursor.set_matrix(*a, *d, *e, *f);
                }
            }
            "T*" => cursor.next_line(),
            "Tj" | "TJ" => cursor.show(operands, encoding, &mut runs),
            "'" => {
                cursor.next_line();
                cursor.show(operands, encoding, &mut runs);
            }
            "\"" => {
                cursor.next_line();
                cursor.show(operands.get(2..).unwrap_or(&[]), encoding, &mut runs);
            }
            _ => {}
        }
    }

    Ok(layout_lines(runs))
}

fn layout_lines(mut runs: Vec<TextRun>) -> Vec<String> {
    // Stable, so runs sharing a baseline keep their drawing order
    runs.sort_by(|a, b| b.y.total_cmp(&a.y));

    let mut rows: Vec<Vec<TextRun>> = Vec::new();
    for run in runs {
        match rows.last_mut() {
            Some(row) if (row[0].y - run.y).abs() <= row[0].size.max(run.size) * SAME_LINE => {
                row.push(run)
            }
            _ => rows.push(vec![run]),
        }
    }

    let mut lines = Vec::new();
    let mut previous: Option<(f32, f32)> = None;
    for mut row in rows {
        row.sort_by(|a, b| a.x.total_cmp(&b.x));
        let y = row[0].y;
        let size = row.iter().map(|run| run.size).fold(0.0, f32::max);
        if let Some((prev_y, prev_size)) = previous {
            if prev_y - y > prev_size.max(size) * PARAGRAPH_GAP {
                lines.push(String::new());
            }
        }
        previous = Some((y, size));
        lines.push(join_runs(&row));
    }
    lines
}

fn join_runs(row: &[TextRun]) -> String {
    let mut line = String::new();
    let mut end: Option<f32> = None;
    for run in row {
        if let Some(end) = end {
            let gap = run.x - end;
            if gap > run.size * COLUMN_GAP {
                line.push_str("  ");
            } else if gap > run.size * WORD_GAP && !line.ends_with(' ') && !run.text.starts_with(' ') {
                line.push(' ');
            }
        }
        line.push_str(&run.text);
        end = Some(run.x + run.width);
    }
    line
}

// --- Scanned Pages ---

/// Image XObjects reachable from the page's own and inherited resources.
fn page_image_streams(doc: &Document, page_id: ObjectId) -> Vec<(ObjectId, &Stream)> {
    let (own, inherited) = doc.get_page_resources(page_id);
    let resources = own
        .into_iter()
        .chain(inherited.into_iter().filter_map(|id| doc.get_dictionary(id).ok()));

    let mut images: Vec<(ObjectId, &Stream)> = Vec::new();
    for resource in resources {
        let Ok(xobjects) = doc.get_dict_in_dict(resource, b"XObject") else {
            continue;
        };
        for (_, value) in xobjects.iter() {
            let Ok(id) = value.as_reference() else {
                continue;
            };
            let Ok(stream) = doc.get_object(id).and_then(Object::as_stream) else {
                continue;
            };
            let is_image = stream
                .dict
                .get(b"Subtype")
                .and_then(Object::as_name)
                .is_ok_and(|subtype| subtype == b"Image");
            if is_image && !images.iter().any(|(seen, _)| *seen == id) {
                images.push((id, stream));
            }
        }
    }
    images
}

fn ocr_page(
    doc: &Document,
    page: u32,
    page_id: ObjectId,
    ocr: &PageOcr,
) -> Result<Vec<Element>, PdfError> {
    let mut elements = Vec::new();
    for (id, stream) in page_image_streams(doc, page_id) {
        let Some(raster) = decode_image_xobject(stream) else {
            tracing::warn!("Skipping image {:?} on page {}: unsupported encoding", id, page);
            continue;
        };
        tracing::debug!(
            "Running {} OCR on {}x{} image from page {}",
            ocr.engine.name(),
            raster.width(),
            raster.height(),
            page
        );

        let text = ocr
            .engine
            .recognize(&raster, &ocr.language)
            .map_err(|source| PdfError::Ocr { page, source })?;
        let text = text.trim();
        if !text.is_empty() {
            elements.push(Element::with_text(ElementKind::NarrativeText, text.to_string()));
        }
    }
    Ok(elements)
}

/// Decodes JPEG (`DCTDecode`) images and 8-bit gray or RGB samples that are raw or
/// `FlateDecode` compressed. Anything else yields `None`.
fn decode_image_xobject(stream: &Stream) -> Option<GrayImage> {
    let filters = stream.filters().unwrap_or_default();
    let samples = match filters.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["DCTDecode"] => {
            return image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg)
                .ok()
                .map(|img| img.to_luma8());
        }
        [] => stream.content.clone(),
        ["FlateDecode"] => {
            // lopdf refuses to inflate streams tagged as images
            let mut plain = stream.clone();
            plain.dict.remove(b"Subtype");
            plain.decompressed_content().ok()?
        }
        _ => return None,
    };

    let dict = &stream.dict;
    let width = u32::try_from(dict.get(b"Width").and_then(Object::as_i64).ok()?).ok()?;
    let height = u32::try_from(dict.get(b"Height").and_then(Object::as_i64).ok()?).ok()?;
    let bits = dict.get(b"BitsPerComponent").and_then(Object::as_i64).unwrap_or(8);
    if bits != 8 {
        return None;
    }

    let pixels = width as usize * height as usize;
    match dict.get(b"ColorSpace").and_then(Object::as_name).ok()? {
        b"DeviceGray" => GrayImage::from_raw(width, height, samples.get(..pixels)?.to_vec()),
        b"DeviceRGB" => RgbImage::from_raw(width, height, samples.get(..pixels * 3)?.to_vec())
            .map(|rgb| DynamicImage::ImageRgb8(rgb).to_luma8()),
        _ => None,
    }
}

// --- Page Layout Analysis ---

#[derive(Debug, PartialEq)]
enum LineKind {
    Blank,
    Row(Vec<String>),
    ListItem,
    Heading,
    Prose,
}

fn classify_line(line: &str) -> LineKind {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return LineKind::Blank;
    }
    if LIST_MARKER_RE.is_match(trimmed) {
        return LineKind::ListItem;
    }

    let cells: Vec<String> = COLUMN_GAP_RE
        .split(trimmed)
        .map(str::trim)
        .filter(|cell| !cell.is_empty())
        .map(str::to_string)
        .collect();
    if cells.len() >= 2 {
        return LineKind::Row(cells);
    }

    if looks_like_heading(trimmed) {
        LineKind::Heading
    } else {
        LineKind::Prose
    }
}

fn looks_like_heading(line: &str) -> bool {
    let starts_upper = line
        .chars()
        .find(|c| c.is_alphabetic())
        .is_some_and(char::is_uppercase);

    starts_upper
        && line.chars().count() <= TITLE_MAX_CHARS
        && line.split_whitespace().count() <= TITLE_MAX_WORDS
        && !ends_sentence(line)
        && !line.ends_with(',')
        && !line.ends_with(';')
}

fn starts_lowercase(line: &str) -> bool {
    line.chars()
        .find(|c| c.is_alphabetic())
        .is_some_and(char::is_lowercase)
}

fn ends_sentence(line: &str) -> bool {
    line.ends_with(['.', '!', '?', ':'])
}

/// Accumulates the elements of one page as its lines stream past.
#[derive(Default)]
struct PageBuilder {
    elements: Vec<Element>,
    paragraph: Vec<String>,
    rows: Vec<Vec<String>>,
    // Heading candidate waiting to see whether the next line continues it
    pending_title: Option<String>,
}

impl PageBuilder {
    fn push_line(&mut self, line: &str) {
        let kind = classify_line(line);
        self.resolve_pending_title(line, &kind);

        match kind {
            LineKind::Row(cells) => {
                // A change in column count starts a new table
                if self.rows.last().is_some_and(|last| last.len() != cells.len()) {
                    self.flush_rows();
                }
                self.rows.push(cells);
            }
            other => {
                self.flush_rows();
                match other {
                    LineKind::Blank => self.flush_paragraph(),
                    LineKind::ListItem => {
                        self.flush_paragraph();
                        self.push(ElementKind::ListItem, line.trim().to_string());
                    }
                    LineKind::Heading if self.at_block_start() => {
                        self.flush_paragraph();
                        self.pending_title = Some(line.trim().to_string());
                    }
                    _ => self.paragraph.push(line.trim().to_string()),
                }
            }
        }
    }

    /// A candidate followed by a lowercase prose line was a wrapped sentence, not a title.
    fn resolve_pending_title(&mut self, next_line: &str, next: &LineKind) {
        let Some(title) = self.pending_title.take() else {
            return;
        };
        if *next == LineKind::Prose && starts_lowercase(next_line) {
            self.paragraph.push(title);
        } else {
            self.push(ElementKind::Title, title);
        }
    }

    /// A heading can only open a block, not continue a wrapped sentence.
    fn at_block_start(&self) -> bool {
        self.paragraph.last().map_or(true, |last| ends_sentence(last))
    }

    fn push(&mut self, kind: ElementKind, text: String) {
        self.elements.push(Element::with_text(kind, text));
    }

    fn flush_paragraph(&mut self) {
        if !self.paragraph.is_empty() {
            let text = self.paragraph.join(" ");
            self.paragraph.clear();
            self.push(ElementKind::NarrativeText, text);
        }
    }

    /// Two or more aligned rows make a table; a lone row is just spaced-out prose.
    fn flush_rows(&mut self) {
        match self.rows.len() {
            0 => {}
            1 => {
                let row = self.rows.remove(0);
                self.paragraph.push(row.join(" "));
            }
            _ => {
                self.flush_paragraph();
                let text = self
                    .rows
                    .drain(..)
                    .map(|row| row.join(" "))
                    .collect::<Vec<_>>()
                    .join("\n");
                self.push(ElementKind::Table, text);
            }
        }
    }

    fn finish(mut self) -> Vec<Element> {
        if let Some(title) = self.pending_title.take() {
            self.push(ElementKind::Title, title);
        }
        self.flush_rows();
        self.flush_paragraph();
        self.elements
    }
}

fn partition_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Vec<Element> {
    let mut builder = PageBuilder::default();
    for line in lines {
        builder.push_line(line);
    }
    builder.finish()
}
