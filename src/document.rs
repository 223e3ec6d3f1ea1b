//! Read-only access to the input label sheet.

use std::path::Path;

use lopdf::{Dictionary, Document as LopdfDocument, Object, ObjectId};

use crate::detect::sniff_path;
use crate::error::{Error, Result};
use crate::geometry::CropRect;

/// Page boxes are inherited through the page tree; guards against cyclic `/Parent` chains.
const MAX_TREE_DEPTH: usize = 32;

/// US Letter, used when a page carries no usable `/MediaBox`.
const FALLBACK_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

/// One physical page of the source document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourcePage {
    /// Page number (1-based, document order)
    pub number: u32,
    /// Object id of the page dictionary
    pub id: ObjectId,
    /// Page width in points
    pub width: f64,
    /// Page height in points
    pub height: f64,
    /// Lower-left corner of the media box
    pub origin: (f64, f64),
}

impl SourcePage {
    /// Translate a page-relative rectangle into the page's coordinate space.
    pub fn to_page_space(&self, rect: &CropRect) -> CropRect {
        rect.translate(self.origin.0, self.origin.1)
    }
}

/// An opened input PDF.
///
/// The underlying document is released when this value is dropped.
pub struct SourceDocument {
    doc: LopdfDocument,
    pages: Vec<SourcePage>,
}

impl SourceDocument {
    /// Open a PDF file read-only.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::InputNotFound(path.to_path_buf()));
        }

        sniff_path(path).map_err(|e| match e {
            Error::Io(io) => Error::InputUnreadable(io.to_string()),
            other => Error::InputUnreadable(other.to_string()),
        })?;

        let doc = LopdfDocument::load(path).map_err(|e| match e {
            lopdf::Error::Decryption(_) => Error::Encrypted,
            other => Error::InputUnreadable(other.to_string()),
        })?;

        Self::from_document(doc)
    }

    /// Open a PDF held in memory.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        crate::detect::sniff_bytes(data).map_err(|e| Error::InputUnreadable(e.to_string()))?;

        let doc = LopdfDocument::load_mem(data).map_err(|e| match e {
            lopdf::Error::Decryption(_) => Error::Encrypted,
            other => Error::InputUnreadable(other.to_string()),
        })?;

        Self::from_document(doc)
    }

    /// Wrap an already loaded document.
    pub fn from_document(doc: LopdfDocument) -> Result<Self> {
        if doc.is_encrypted() {
            return Err(Error::Encrypted);
        }

        let pages = doc
            .get_pages()
            .into_iter()
            .map(|(number, id)| {
                let media = page_box(&doc, id, b"MediaBox").unwrap_or_else(|| {
                    log::warn!("Page {} has no MediaBox, assuming US Letter", number);
                    CropRect::from_corners(FALLBACK_MEDIA_BOX)
                });
                SourcePage {
                    number,
                    id,
                    width: media.width,
                    height: media.height,
                    origin: (media.x, media.y),
                }
            })
            .collect();

        Ok(Self { doc, pages })
    }

    /// Pages in document order.
    pub fn pages(&self) -> &[SourcePage] {
        &self.pages
    }

    /// Number of pages.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Look up a page by number (1-based).
    pub fn page(&self, number: u32) -> Option<&SourcePage> {
        self.pages.iter().find(|p| p.number == number)
    }

    /// Direct access to the underlying `lopdf::Document`.
    pub fn raw_doc(&self) -> &LopdfDocument {
        &self.doc
    }

    /// PDF version string.
    pub fn version(&self) -> String {
        self.doc.version.to_string()
    }
}

/// Follow a reference to the object it names; other objects pass through.
pub(crate) fn resolve<'a>(doc: &'a LopdfDocument, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

/// Resolve `key` in `dict` to a dictionary, following one reference.
pub(crate) fn get_dict<'a>(
    doc: &'a LopdfDocument,
    dict: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Dictionary> {
    dict.get(key)
        .ok()
        .map(|obj| resolve(doc, obj))
        .and_then(|obj| obj.as_dict().ok())
}

/// Look up a page attribute, walking up the page tree for inheritable keys.
pub(crate) fn inherited<'a>(
    doc: &'a LopdfDocument,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut dict = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = dict.get(key) {
            return Some(resolve(doc, value));
        }
        let parent = dict.get(b"Parent").ok()?.as_reference().ok()?;
        dict = doc.get_dictionary(parent).ok()?;
    }
    None
}

/// Read a page box (`MediaBox`, `CropBox`, ...) as a normalized rectangle.
pub(crate) fn page_box(doc: &LopdfDocument, page_id: ObjectId, key: &[u8]) -> Option<CropRect> {
    let array = inherited(doc, page_id, key)?.as_array().ok()?;
    if array.len() != 4 {
        return None;
    }

    let mut corners = [0.0; 4];
    for (slot, obj) in corners.iter_mut().zip(array) {
        *slot = get_number(resolve(doc, obj))?;
    }
    let rect = CropRect::from_corners(corners);
    (rect.width > 0.0 && rect.height > 0.0).then_some(rect)
}

/// Helper to extract a number from a PDF object.
pub(crate) fn get_number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}
