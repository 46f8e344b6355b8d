//! Builders for test inputs.

#![allow(dead_code)]

use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document as PdfDocument, Object, Stream};

use pdfcast::config::Config;
use pdfcast::Document;

/// A configuration rooted in `base` with a short stage timeout and no
/// retries.
pub fn test_config(base: &Path) -> Config {
    let mut config = Config::with_defaults();
    config.upload_directory = Some(base.join("input").to_string_lossy().into_owned());
    config.work_directory = Some(base.join("work").to_string_lossy().into_owned());
    config.output_directory = Some(base.join("output").to_string_lossy().into_owned());
    config.stage_timeout_secs = Some(10);
    config
}

/// A minimal PDF with one page per entry, each showing its text in Courier.
pub fn pdf_bytes(pages: &[&str]) -> Vec<u8> {
    let mut doc = PdfDocument::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 14.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("encode page content"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => resources_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => pages.len() as i64,
            "Kids" => kids,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("serialize test PDF");
    bytes
}

/// A valid PDF upload with a single page of text.
pub fn pdf_document(text: &str) -> Document {
    Document::new(pdf_bytes(&[text]), "application/pdf").with_filename("paper.pdf")
}
