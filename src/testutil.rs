//! Synthetic label sheets for unit tests.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

/// How a text line is placed on the page.
#[derive(Debug, Clone)]
pub enum Placement {
    /// `BT .. Td .. Tj ET` directly in the page content
    Direct,
    /// Positioned by a `cm` translation inside `q .. Q`
    Transformed,
    /// Drawn by a Form XObject translated to the position
    Form,
}

/// One page of a synthetic sheet.
#[derive(Debug, Clone)]
pub struct PageSpec {
    pub width: f64,
    pub height: f64,
    pub origin: (f64, f64),
    pub inherit: bool,
    pub texts: Vec<(f64, f64, String, Placement)>,
}

impl PageSpec {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            origin: (0.0, 0.0),
            inherit: false,
            texts: Vec::new(),
        }
    }

    pub fn with_origin(mut self, x: f64, y: f64) -> Self {
        self.origin = (x, y);
        self
    }

    /// Put the media box on the page tree node instead of the page.
    pub fn inherit_media_box(mut self) -> Self {
        self.inherit = true;
        self
    }

    pub fn text(self, x: f64, y: f64, text: &str) -> Self {
        self.placed(x, y, text, Placement::Direct)
    }

    pub fn placed(mut self, x: f64, y: f64, text: &str, placement: Placement) -> Self {
        self.texts.push((x, y, text.to_string(), placement));
        self
    }
}

fn real(v: f64) -> Object {
    Object::Real(v as f32)
}

fn show(x: f64, y: f64, text: &str) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), 10.into()]),
        Operation::new("Td", vec![real(x), real(y)]),
        Operation::new("Tj", vec![Object::string_literal(text)]),
        Operation::new("ET", vec![]),
    ]
}

/// Build a PDF with one page per spec and return its bytes.
pub fn sheet(specs: &[PageSpec]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let fonts = dictionary! { "F1" => font_id };

    let mut kids = Vec::new();
    let mut tree_media_box = None;

    for spec in specs {
        let mut operations = Vec::new();
        let mut xobjects = lopdf::Dictionary::new();

        for (i, (x, y, text, placement)) in spec.texts.iter().enumerate() {
            let (x, y) = (x + spec.origin.0, y + spec.origin.1);
            match placement {
                Placement::Direct => operations.extend(show(x, y, text)),
                Placement::Transformed => {
                    operations.push(Operation::new("q", vec![]));
                    operations.push(Operation::new(
                        "cm",
                        vec![
                            1.into(),
                            0.into(),
                            0.into(),
                            1.into(),
                            real(x),
                            real(y),
                        ],
                    ));
                    operations.extend(show(0.0, 0.0, text));
                    operations.push(Operation::new("Q", vec![]));
                }
                Placement::Form => {
                    let form = Content {
                        operations: show(0.0, 0.0, text),
                    };
                    let form_id = doc.add_object(Stream::new(
                        dictionary! {
                            "Type" => "XObject",
                            "Subtype" => "Form",
                            "BBox" => vec![0.into(), 0.into(), 300.into(), 50.into()],
                            "Matrix" => vec![1.into(), 0.into(), 0.into(), 1.into(), real(x), real(y)],
                            "Resources" => dictionary! { "Font" => fonts.clone() },
                        },
                        form.encode().unwrap(),
                    ));
                    let name = format!("Fm{}", i);
                    xobjects.set(name.as_bytes().to_vec(), form_id);
                    operations.push(Operation::new("Do", vec![Object::Name(name.into_bytes())]));
                }
            }
        }

        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let media_box = vec![
            real(spec.origin.0),
            real(spec.origin.1),
            real(spec.origin.0 + spec.width),
            real(spec.origin.1 + spec.height),
        ];

        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => fonts.clone(),
                "XObject" => xobjects,
            },
        };
        if spec.inherit {
            tree_media_box = Some(media_box);
        } else {
            page.set("MediaBox", media_box);
        }
        kids.push(doc.add_object(page).into());
    }

    let mut pages = dictionary! {
        "Type" => "Pages",
        "Count" => kids.len() as i64,
        "Kids" => kids,
    };
    if let Some(media_box) = tree_media_box {
        pages.set("MediaBox", media_box);
    }
    doc.objects.insert(pages_id, Object::Dictionary(pages));

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
