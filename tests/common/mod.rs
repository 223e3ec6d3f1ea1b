//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

pub const CODE_A: &str = "*ST100R1TAAAA 0001*";
pub const CODE_B: &str = "*ST200R2TBBBB 0002*";
pub const CODE_C: &str = "*ST300R3TCCCC 0003*";

/// Label page width used throughout (4 inches).
pub const WIDTH: f64 = 288.0;

/// A page of `height` points with text lines at `(y, text)`.
pub struct Page<'a> {
    pub height: f64,
    pub lines: Vec<(f64, &'a str)>,
}

impl<'a> Page<'a> {
    pub fn new(height: f64, lines: &[(f64, &'a str)]) -> Self {
        Self {
            height,
            lines: lines.to_vec(),
        }
    }
}

/// Build a label sheet PDF in memory.
pub fn build_sheet(pages: &[Page<'_>]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });

    let mut kids: Vec<Object> = Vec::new();
    for page in pages {
        let mut operations = Vec::new();
        for (y, text) in &page.lines {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec!["F1".into(), 9.into()]));
            operations.push(Operation::new(
                "Td",
                vec![Object::Real(18.0), Object::Real(*y as f32)],
            ));
            operations.push(Operation::new("Tj", vec![Object::string_literal(*text)]));
            operations.push(Operation::new("ET", vec![]));
        }
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), Object::Real(WIDTH as f32), Object::Real(page.height as f32)],
            "Contents" => content_id,
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// A one-page sheet whose `/Contents` is not a stream, so no text can be read.
pub fn build_unreadable_sheet(height: f64) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), Object::Real(WIDTH as f32), Object::Real(height as f32)],
        "Contents" => Object::Integer(7),
        "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// Write a label sheet into `dir` and return its path.
pub fn write_sheet(dir: &Path, name: &str, pages: &[Page<'_>]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, build_sheet(pages)).unwrap();
    path
}

/// The two-page sheet: label A printed twice on page 1, label B once on page 2.
pub fn two_page_sheet(dir: &Path) -> PathBuf {
    write_sheet(
        dir,
        "sheet.pdf",
        &[
            Page::new(600.0, &[(500.0, CODE_A), (300.0, CODE_A)]),
            Page::new(600.0, &[(500.0, CODE_B)]),
        ],
    )
}

/// File names in `dir`, sorted.
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}
