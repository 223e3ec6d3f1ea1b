//! Slice documents: one source page viewed through one crop window.

use std::fs;
use std::path::Path;

use lopdf::{Document as LopdfDocument, Object, ObjectId};

use crate::document::{page_box, SourceDocument, SourcePage};
use crate::error::{Error, Result};
use crate::geometry::CropRect;
use crate::text::{visible_text, ExtractionScope};

/// Boxes that must not extend past the new media box.
const STALE_BOXES: [&[u8]; 2] = [b"BleedBox", b"ArtBox"];

/// A standalone single-page document showing one band of a source page.
///
/// The source page's content stream is embedded whole; only the page boxes
/// change, so text outside the band is still in the stream but not shown.
#[derive(Debug, Clone)]
pub struct SliceDocument {
    doc: LopdfDocument,
    page_id: ObjectId,
    rect: CropRect,
}

impl SliceDocument {
    /// Reopen a persisted slice.
    ///
    /// The crop window is read back from the file's first page.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let doc = LopdfDocument::load(path)?;
        Self::from_document(doc)
    }

    /// Reopen a slice held in memory.
    pub fn load_bytes(data: &[u8]) -> Result<Self> {
        let doc = LopdfDocument::load_mem(data)?;
        Self::from_document(doc)
    }

    fn from_document(doc: LopdfDocument) -> Result<Self> {
        let page_id = *doc
            .get_pages()
            .values()
            .next()
            .ok_or_else(|| Error::PdfParse("slice has no pages".to_string()))?;
        let rect = page_box(&doc, page_id, b"CropBox")
            .or_else(|| page_box(&doc, page_id, b"MediaBox"))
            .ok_or_else(|| Error::PdfParse("slice page has no MediaBox".to_string()))?;
        Ok(Self { doc, page_id, rect })
    }

    /// The crop window, in the source page's coordinate space.
    pub fn rect(&self) -> CropRect {
        self.rect
    }

    /// Object id of the slice's only page.
    pub fn page_id(&self) -> ObjectId {
        self.page_id
    }

    /// Direct access to the underlying `lopdf::Document`.
    pub fn raw_doc(&self) -> &LopdfDocument {
        &self.doc
    }

    /// Read the slice's text layer.
    pub fn text(&self, scope: ExtractionScope) -> Result<String> {
        visible_text(&self.doc, self.page_id, scope)
    }

    /// Serialize to PDF bytes.
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.doc.save_to(&mut bytes)?;
        Ok(bytes)
    }

    /// Serialize to a file, replacing anything already there.
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let bytes = self.to_bytes()?;
        fs::write(path, bytes)?;
        Ok(())
    }
}

/// A source page reduced to a document of its own, ready to be cropped.
///
/// Built once per page; every band clones it, which is much cheaper than
/// pruning the whole source document again for each band.
pub struct PageTemplate {
    doc: LopdfDocument,
    page: SourcePage,
}

impl PageTemplate {
    /// Copy `page` out of `source`, dropping every other page and the
    /// objects only they referenced.
    pub fn new(source: &SourceDocument, page: &SourcePage) -> Result<Self> {
        let mut doc = source.raw_doc().clone();

        let others: Vec<u32> = doc
            .get_pages()
            .keys()
            .copied()
            .filter(|&n| n != page.number)
            .collect();
        if !others.is_empty() {
            doc.delete_pages(&others);
        }
        doc.prune_objects();

        if !doc.get_pages().values().any(|&id| id == page.id) {
            return Err(Error::PdfParse(format!(
                "page {} did not survive extraction",
                page.number
            )));
        }

        Ok(Self { doc, page: *page })
    }

    /// The source page this template was built from.
    pub fn page(&self) -> &SourcePage {
        &self.page
    }

    /// Produce the slice showing `rect` (relative to the page's lower-left corner).
    pub fn slice(&self, rect: &CropRect) -> Result<SliceDocument> {
        let window = self.page.to_page_space(rect);
        let corners: Vec<Object> = window
            .corners()
            .iter()
            .map(|&v| Object::Real(v as f32))
            .collect();

        let mut doc = self.doc.clone();
        let page = doc.get_object_mut(self.page.id)?.as_dict_mut()?;
        page.set("MediaBox", corners.clone());
        page.set("CropBox", corners.clone());
        page.set("TrimBox", corners);
        for key in STALE_BOXES {
            page.remove(key);
        }

        Ok(SliceDocument {
            doc,
            page_id: self.page.id,
            rect: window,
        })
    }
}

/// Build the slice of `page` showing `rect`.
///
/// Convenience for one-off use; the pipeline keeps a [`PageTemplate`] per page.
pub fn extract_slice(
    source: &SourceDocument,
    page: &SourcePage,
    rect: &CropRect,
) -> Result<SliceDocument> {
    PageTemplate::new(source, page)?.slice(rect)
}
