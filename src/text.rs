//! Text layer extraction with position filtering.
//!
//! Cropping a slice only narrows the page's visible window; every glyph of
//! the source page is still present in the content stream. To read only
//! what a printed slice shows, each text-showing operation is placed in
//! user space (text matrix times CTM, through nested Form XObjects) and
//! kept only when its origin falls inside the page's crop box.

use lopdf::content::Content;
use lopdf::{Dictionary, Document as LopdfDocument, Object, ObjectId};
use serde::{Deserialize, Serialize};

use crate::document::{get_dict, get_number, inherited, page_box, resolve};
use crate::error::{Error, Result};

/// Nested Form XObjects deeper than this are not entered.
const MAX_FORM_DEPTH: usize = 8;

/// Spans whose baselines differ by less than this share a line.
const BASELINE_TOLERANCE: f64 = 1.0;

/// Which part of a page's text layer is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExtractionScope {
    /// Only text whose origin lies inside the crop box
    #[default]
    Visible,
    /// Every string in the content stream, regardless of the crop box
    ContentStream,
}

/// A decoded string placed at its origin in user space.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedText {
    pub text: String,
    pub x: f64,
    pub y: f64,
}

/// Affine transform `[a b c d e f]` in PDF row-vector convention.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix {
    a: f64,
    b: f64,
    c: f64,
    d: f64,
    e: f64,
    f: f64,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix {
    const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    fn translation(tx: f64, ty: f64) -> Self {
        Self {
            e: tx,
            f: ty,
            ..Self::IDENTITY
        }
    }

    fn from_operands(operands: &[Object]) -> Option<Self> {
        if operands.len() < 6 {
            return None;
        }
        let n: Vec<f64> = operands[..6]
            .iter()
            .map(get_number)
            .collect::<Option<_>>()?;
        Some(Self {
            a: n[0],
            b: n[1],
            c: n[2],
            d: n[3],
            e: n[4],
            f: n[5],
        })
    }

    /// `self × other`: apply `self` first, then `other`.
    fn then(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }
}

/// Read a page's text, restricted to its crop box unless `scope` says otherwise.
pub fn visible_text(doc: &LopdfDocument, page_id: ObjectId, scope: ExtractionScope) -> Result<String> {
    let spans = page_spans(doc, page_id)?;

    let window = match scope {
        ExtractionScope::Visible => {
            page_box(doc, page_id, b"CropBox").or_else(|| page_box(doc, page_id, b"MediaBox"))
        }
        ExtractionScope::ContentStream => None,
    };

    let kept: Vec<PlacedText> = match window {
        Some(rect) => spans
            .into_iter()
            .filter(|s| rect.contains(s.x, s.y))
            .collect(),
        None => spans,
    };

    Ok(join_spans(&kept))
}

/// Every text-showing operation on a page, in content order.
pub fn page_spans(doc: &LopdfDocument, page_id: ObjectId) -> Result<Vec<PlacedText>> {
    let content = page_content(doc, page_id)?;
    let resources = inherited(doc, page_id, b"Resources").and_then(|o| o.as_dict().ok());

    let mut walker = Walker {
        doc,
        spans: Vec::new(),
    };
    walker.walk(&content, resources, Matrix::IDENTITY, 0)?;
    Ok(walker.spans)
}

/// Join spans into text: same-baseline spans run together, new baselines start a new line.
pub fn join_spans(spans: &[PlacedText]) -> String {
    let mut out = String::new();
    let mut last_y: Option<f64> = None;

    for span in spans {
        if let Some(y) = last_y {
            if (y - span.y).abs() > BASELINE_TOLERANCE {
                out.push('\n');
            }
        }
        out.push_str(&span.text);
        last_y = Some(span.y);
    }

    out
}

/// Concatenated, decompressed content streams of a page.
fn page_content(doc: &LopdfDocument, page_id: ObjectId) -> Result<Vec<u8>> {
    let page = doc
        .get_dictionary(page_id)
        .map_err(|e| Error::TextExtract(e.to_string()))?;

    // A page without /Contents is blank.
    let contents = match page.get(b"Contents") {
        Ok(obj) => resolve(doc, obj),
        Err(_) => return Ok(Vec::new()),
    };

    match contents {
        Object::Stream(s) => Ok(stream_bytes(s)),
        Object::Array(arr) => {
            let mut content = Vec::new();
            for obj in arr {
                if let Object::Stream(s) = resolve(doc, obj) {
                    content.extend_from_slice(&stream_bytes(s));
                    content.push(b' ');
                }
            }
            Ok(content)
        }
        _ => Err(Error::TextExtract("Invalid content stream".to_string())),
    }
}

/// Stream data, decompressed when a filter is present.
fn stream_bytes(stream: &lopdf::Stream) -> Vec<u8> {
    stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone())
}

struct Walker<'a> {
    doc: &'a LopdfDocument,
    spans: Vec<PlacedText>,
}

impl<'a> Walker<'a> {
    fn walk(
        &mut self,
        content: &[u8],
        resources: Option<&'a Dictionary>,
        base_ctm: Matrix,
        depth: usize,
    ) -> Result<()> {
        let content = Content::decode(content).map_err(|e| Error::TextExtract(e.to_string()))?;

        let fonts = resources.and_then(|r| get_dict(self.doc, r, b"Font"));
        let xobjects = resources.and_then(|r| get_dict(self.doc, r, b"XObject"));

        let mut ctm = base_ctm;
        let mut tm = Matrix::IDENTITY;
        let mut tlm = Matrix::IDENTITY;
        let mut leading = 0.0;
        let mut font: Option<&'a Dictionary> = None;
        // Graphics state stack: CTM and the current font
        let mut saved: Vec<(Matrix, Option<&'a Dictionary>)> = Vec::new();

        for op in &content.operations {
            let operands = &op.operands;
            match op.operator.as_str() {
                "q" => saved.push((ctm, font)),
                "Q" => (ctm, font) = saved.pop().unwrap_or((base_ctm, font)),
                "cm" => {
                    if let Some(m) = Matrix::from_operands(operands) {
                        ctm = m.then(&ctm);
                    }
                }
                "BT" => {
                    tm = Matrix::IDENTITY;
                    tlm = Matrix::IDENTITY;
                }
                "Tf" => {
                    font = operands
                        .first()
                        .and_then(|o| o.as_name().ok())
                        .and_then(|name| fonts.and_then(|f| get_dict(self.doc, f, name)));
                }
                "TL" => {
                    leading = operands.first().and_then(get_number).unwrap_or(leading);
                }
                "Td" | "TD" => {
                    let tx = operands.first().and_then(get_number).unwrap_or(0.0);
                    let ty = operands.get(1).and_then(get_number).unwrap_or(0.0);
                    if op.operator == "TD" {
                        leading = -ty;
                    }
                    tlm = Matrix::translation(tx, ty).then(&tlm);
                    tm = tlm;
                }
                "Tm" => {
                    if let Some(m) = Matrix::from_operands(operands) {
                        tlm = m;
                        tm = m;
                    }
                }
                "T*" => {
                    tlm = Matrix::translation(0.0, -leading).then(&tlm);
                    tm = tlm;
                }
                "Tj" => {
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        let text = self.decode(font, bytes);
                        self.place(text, &tm, &ctm);
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = operands.first() {
                        let text: String = items
                            .iter()
                            .filter_map(|item| match item {
                                Object::String(bytes, _) => Some(self.decode(font, bytes)),
                                _ => None,
                            })
                            .collect();
                        self.place(text, &tm, &ctm);
                    }
                }
                "'" | "\"" => {
                    tlm = Matrix::translation(0.0, -leading).then(&tlm);
                    tm = tlm;
                    let index = if op.operator == "\"" { 2 } else { 0 };
                    if let Some(Object::String(bytes, _)) = operands.get(index) {
                        let text = self.decode(font, bytes);
                        self.place(text, &tm, &ctm);
                    }
                }
                "Do" => {
                    let name = operands.first().and_then(|o| o.as_name().ok());
                    if let (Some(name), Some(xobjects)) = (name, xobjects) {
                        self.enter_form(xobjects, name, resources, &ctm, depth)?;
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }

    fn enter_form(
        &mut self,
        xobjects: &'a Dictionary,
        name: &[u8],
        parent_resources: Option<&'a Dictionary>,
        ctm: &Matrix,
        depth: usize,
    ) -> Result<()> {
        if depth >= MAX_FORM_DEPTH {
            log::debug!("Skipping Form XObject nested deeper than {}", MAX_FORM_DEPTH);
            return Ok(());
        }

        let stream = match xobjects.get(name).map(|o| resolve(self.doc, o)) {
            Ok(Object::Stream(s)) => s,
            _ => return Ok(()),
        };
        let is_form = stream
            .dict
            .get(b"Subtype")
            .and_then(|o| o.as_name())
            .map(|n| n == b"Form")
            .unwrap_or(false);
        if !is_form {
            return Ok(());
        }

        let matrix = stream
            .dict
            .get(b"Matrix")
            .ok()
            .and_then(|o| resolve(self.doc, o).as_array().ok())
            .and_then(|arr| Matrix::from_operands(arr.as_slice()))
            .unwrap_or_default();
        let resources = get_dict(self.doc, &stream.dict, b"Resources").or(parent_resources);

        self.walk(
            &stream_bytes(stream),
            resources,
            matrix.then(ctm),
            depth + 1,
        )
    }

    fn decode(&self, font: Option<&Dictionary>, bytes: &[u8]) -> String {
        if let Some(font) = font {
            if let Ok(encoding) = font.get_font_encoding(self.doc) {
                if let Ok(text) = LopdfDocument::decode_text(&encoding, bytes) {
                    return text;
                }
            }
        }
        decode_text_simple(bytes)
    }

    fn place(&mut self, text: String, tm: &Matrix, ctm: &Matrix) {
        if text.is_empty() {
            return;
        }
        let origin = tm.then(ctm);
        self.spans.push(PlacedText {
            text,
            x: origin.e,
            y: origin.f,
        });
    }
}

/// Simple text decoding fallback when no encoding is available.
pub fn decode_text_simple(bytes: &[u8]) -> String {
    if let [0xFE, 0xFF, rest @ ..] = bytes {
        let utf16: Vec<u16> = rest
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&utf16);
    }

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        // Latin-1
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}
