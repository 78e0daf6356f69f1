//! Stamping tests against generated PDF documents.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{ImageFormat, Rgba, RgbaImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use stamp_sign::{
    AuditEvent, MemoryAuditSink, NormalizedBox, NormalizedSuggestion, PlacementInstruction,
    PlacementKind, SignError, SkipReason, StampingEngine,
};
use std::io::Cursor;
use std::sync::Arc;

const IDENTIFIER: &str = "3xKq9WbZ2mNa";

/// A document with one text content stream per page and a resource
/// dictionary shared by all pages through the page tree.
struct TestPdf {
    bytes: Vec<u8>,
    resources: ObjectId,
}

fn build_pdf(sizes: &[(i64, i64)]) -> TestPdf {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::new();
    for (i, (width, height)) in sizes.iter().enumerate() {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 72.into()]),
                Operation::new("Tj", vec![Object::string_literal(format!("Page {}", i + 1))]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![0.into(), 0.into(), (*width).into(), (*height).into()],
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => sizes.len() as i64,
            "Resources" => resources,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    TestPdf { bytes, resources }
}

fn three_pages() -> TestPdf {
    build_pdf(&[(612, 792), (842, 595), (595, 842)])
}

fn png_base64(width: u32, height: u32) -> String {
    let img = RgbaImage::from_pixel(width, height, Rgba([0, 0, 255, 128]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    STANDARD.encode(bytes)
}

fn page_ids(doc: &Document) -> Vec<ObjectId> {
    doc.get_pages().values().copied().collect()
}

fn contents(doc: &Document, page: ObjectId) -> Object {
    doc.get_dictionary(page)
        .unwrap()
        .get(b"Contents")
        .unwrap()
        .clone()
}

fn stream_bytes(doc: &Document, object: &Object) -> Vec<u8> {
    let id = object.as_reference().unwrap();
    let stream = doc.get_object(id).unwrap().as_stream().unwrap();
    if stream.dict.has(b"Filter") {
        stream.decompressed_content().unwrap()
    } else {
        stream.content.clone()
    }
}

fn filter(doc: &Document, id: ObjectId) -> Option<Vec<u8>> {
    let stream = doc.get_object(id).unwrap().as_stream().unwrap();
    stream
        .dict
        .get(b"Filter")
        .ok()
        .map(|f| f.as_name().unwrap().to_vec())
}

/// Numeric operands of the first `operator` in a content stream.
fn operands(content: &[u8], operator: &str) -> Vec<f64> {
    let content = Content::decode(content).unwrap();
    let operation = content
        .operations
        .iter()
        .find(|op| op.operator == operator)
        .unwrap();
    operation
        .operands
        .iter()
        .map(|o| f64::from(o.as_float().unwrap()))
        .collect()
}

#[test]
fn test_unrelated_pages_untouched() {
    let source = three_pages();
    let original = Document::load_mem(&source.bytes).unwrap();
    let placements = vec![PlacementInstruction::digital(2, 100.0, 100.0)];

    let report = StampingEngine::new()
        .stamp(&source.bytes, IDENTIFIER, &placements, None)
        .unwrap();
    assert_eq!(report.applied, 1);
    assert!(report.skipped.is_empty());

    let stamped = Document::load_mem(&report.document).unwrap();
    let before = page_ids(&original);
    let after = page_ids(&stamped);
    assert_eq!(before, after);

    for index in [0, 2] {
        let page = after[index];
        assert_eq!(
            format!("{:?}", original.get_dictionary(page).unwrap()),
            format!("{:?}", stamped.get_dictionary(page).unwrap())
        );
        let content = contents(&stamped, page);
        assert_eq!(
            content.as_reference().unwrap(),
            contents(&original, page).as_reference().unwrap()
        );
        assert_eq!(stream_bytes(&stamped, &content), stream_bytes(&original, &content));
    }
}

#[test]
fn test_stamped_page_keeps_original_content_underneath() {
    let source = three_pages();
    let original = Document::load_mem(&source.bytes).unwrap();
    let page = page_ids(&original)[1];
    let original_content = contents(&original, page);

    let report = StampingEngine::new()
        .stamp(
            &source.bytes,
            IDENTIFIER,
            &[PlacementInstruction::digital(2, 100.0, 100.0)],
            None,
        )
        .unwrap();
    let stamped = Document::load_mem(&report.document).unwrap();

    let streams = contents(&stamped, page);
    let streams = streams.as_array().unwrap();
    assert_eq!(streams.len(), 3);
    assert_eq!(
        streams[1].as_reference().unwrap(),
        original_content.as_reference().unwrap()
    );
    assert_eq!(
        stream_bytes(&stamped, &streams[1]),
        stream_bytes(&original, &original_content)
    );

    let overlay = String::from_utf8(stream_bytes(&stamped, &streams[2])).unwrap();
    assert!(overlay.contains(&format!("(Signed: {})", IDENTIFIER)));
    assert_eq!(
        operands(&stream_bytes(&stamped, &streams[2]), "re"),
        vec![100.0, 100.0, 150.0, 30.0]
    );

    // the page's own resources gain the stamp font, the shared ones do not
    let resources = stamped
        .get_dictionary(page)
        .unwrap()
        .get(b"Resources")
        .unwrap()
        .as_dict()
        .unwrap();
    let fonts = resources.get(b"Font").unwrap().as_dict().unwrap();
    assert!(fonts.has(b"F1"));
    assert!(fonts.has(b"StampFont"));

    let shared = stamped.get_dictionary(source.resources).unwrap();
    let shared_fonts = shared.get(b"Font").unwrap().as_dict().unwrap();
    assert!(!shared_fonts.has(b"StampFont"));
}

#[test]
fn test_page_count_and_order_preserved() {
    let source = three_pages();
    let placements = vec![
        PlacementInstruction::digital(3, 10.0, 10.0),
        PlacementInstruction::digital(1, 10.0, 10.0),
        PlacementInstruction::digital(1, 200.0, 300.0),
    ];

    let report = StampingEngine::new()
        .stamp(&source.bytes, IDENTIFIER, &placements, None)
        .unwrap();
    assert_eq!(report.applied, 3);

    let engine = StampingEngine::new();
    assert_eq!(
        engine.page_sizes(&report.document).unwrap(),
        engine.page_sizes(&source.bytes).unwrap()
    );
}

#[test]
fn test_user_image_with_transparency() {
    let source = three_pages();
    let image = format!("data:image/png;base64,{}", png_base64(40, 20));
    let placements = vec![PlacementInstruction::user_image(1, 50.0, 60.0)];

    let report = StampingEngine::new()
        .stamp(&source.bytes, IDENTIFIER, &placements, Some(&image))
        .unwrap();
    assert_eq!(report.applied, 1);

    let stamped = Document::load_mem(&report.document).unwrap();
    let page = page_ids(&stamped)[0];
    let streams = contents(&stamped, page);
    let overlay = stream_bytes(&stamped, streams.as_array().unwrap().last().unwrap());
    // width 150, height follows the 2:1 aspect ratio
    assert_eq!(
        operands(&overlay, "cm"),
        vec![150.0, 0.0, 0.0, 75.0, 50.0, 60.0]
    );
    assert!(String::from_utf8(overlay).unwrap().contains("/StampImage Do"));

    let resources = stamped
        .get_dictionary(page)
        .unwrap()
        .get(b"Resources")
        .unwrap()
        .as_dict()
        .unwrap();
    let xobjects = resources.get(b"XObject").unwrap().as_dict().unwrap();
    let image_id = xobjects.get(b"StampImage").unwrap().as_reference().unwrap();
    let image = stamped.get_object(image_id).unwrap().as_stream().unwrap();
    assert_eq!(image.dict.get(b"Width").unwrap().as_i64().unwrap(), 40);
    assert!(image.dict.has(b"SMask"));
}

#[test]
fn test_large_image_is_embedded_compressed() {
    let source = three_pages();
    let image = png_base64(1200, 400);
    let placements = vec![
        PlacementInstruction::user_image(1, 50.0, 60.0),
        PlacementInstruction::user_image(3, 50.0, 60.0),
    ];

    let report = StampingEngine::new()
        .stamp(&source.bytes, IDENTIFIER, &placements, Some(&image))
        .unwrap();
    assert_eq!(report.applied, 2);
    // raw RGB alone would be 1200 * 400 * 3 bytes
    assert!(report.document.len() < 100_000, "{} bytes", report.document.len());

    let stamped = Document::load_mem(&report.document).unwrap();
    let page = page_ids(&stamped)[0];
    let resources = stamped
        .get_dictionary(page)
        .unwrap()
        .get(b"Resources")
        .unwrap()
        .as_dict()
        .unwrap();
    let xobjects = resources.get(b"XObject").unwrap().as_dict().unwrap();
    let image_id = xobjects.get(b"StampImage").unwrap().as_reference().unwrap();
    assert_eq!(filter(&stamped, image_id).as_deref(), Some(&b"FlateDecode"[..]));

    let image = stamped.get_object(image_id).unwrap().as_stream().unwrap();
    let mask_id = image.dict.get(b"SMask").unwrap().as_reference().unwrap();
    assert_eq!(filter(&stamped, mask_id).as_deref(), Some(&b"FlateDecode"[..]));
    assert_eq!(image.decompressed_content().unwrap().len(), 1200 * 400 * 3);
}

#[test]
fn test_bad_image_does_not_fail_batch() {
    let source = three_pages();
    let placements = vec![
        PlacementInstruction::digital(1, 72.0, 72.0),
        PlacementInstruction::user_image(2, 72.0, 72.0),
        PlacementInstruction::digital(3, 72.0, 72.0),
    ];

    let report = StampingEngine::new()
        .stamp(&source.bytes, IDENTIFIER, &placements, Some("not an image"))
        .unwrap();

    assert_eq!(report.applied, 2);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].index, 1);
    assert_eq!(report.skipped[0].page, 2);
    assert!(matches!(report.skipped[0].reason, SkipReason::ImageDecode(_)));
}

#[test]
fn test_missing_image_skipped() {
    let source = three_pages();
    let placements = vec![
        PlacementInstruction::user_image(1, 72.0, 72.0),
        PlacementInstruction::digital(1, 300.0, 72.0),
    ];

    let report = StampingEngine::new()
        .stamp(&source.bytes, IDENTIFIER, &placements, None)
        .unwrap();

    assert_eq!(report.applied, 1);
    assert_eq!(report.skipped[0].reason, SkipReason::MissingImage);
}

#[test]
fn test_out_of_range_placements() {
    let source = three_pages();
    let placements = vec![
        PlacementInstruction::digital(0, 72.0, 72.0),
        PlacementInstruction::digital(4, 72.0, 72.0),
    ];

    let report = StampingEngine::new()
        .stamp(&source.bytes, IDENTIFIER, &placements, None)
        .unwrap();

    assert_eq!(report.applied, 0);
    assert_eq!(
        report.skipped.iter().map(|s| s.index).collect::<Vec<_>>(),
        vec![0, 1]
    );
    assert_eq!(
        report.skipped[1].reason,
        SkipReason::PageOutOfRange {
            page: 4,
            page_count: 3
        }
    );
    // nothing drawn, nothing rewritten
    assert_eq!(report.document, source.bytes);
}

#[test]
fn test_no_placements_returns_input() {
    let source = three_pages();
    let report = StampingEngine::new()
        .stamp(&source.bytes, IDENTIFIER, &[], None)
        .unwrap();
    assert_eq!(report.document, source.bytes);
    assert_eq!(report.applied, 0);
}

#[test]
fn test_unparsable_document() {
    let audit = Arc::new(MemoryAuditSink::new());
    let engine = StampingEngine::new().with_audit(audit.clone());

    let result = engine.stamp(
        b"%PDF-1.5 this is not really a pdf",
        IDENTIFIER,
        &[PlacementInstruction::digital(1, 0.0, 0.0)],
        None,
    );

    assert!(matches!(result, Err(SignError::UnparsableDocument(_))));
    assert_eq!(audit.kinds(), vec![AuditEvent::StampError]);
}

#[test]
fn test_stamp_audit_event() {
    let source = three_pages();
    let audit = Arc::new(MemoryAuditSink::new());
    StampingEngine::new()
        .with_audit(audit.clone())
        .stamp(
            &source.bytes,
            IDENTIFIER,
            &[PlacementInstruction::digital(1, 0.0, 0.0)],
            None,
        )
        .unwrap();

    let events = audit.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, AuditEvent::Stamp);
    assert!(events[0].1.contains(IDENTIFIER));
}

#[test]
fn test_resolve_suggestions_per_page_size() {
    let source = three_pages();
    let suggestions = vec![
        NormalizedSuggestion {
            page: 1,
            bounds: NormalizedBox::new(100.0, 200.0, 150.0, 500.0),
            label: "Sign Here".to_string(),
        },
        NormalizedSuggestion {
            page: 2,
            bounds: NormalizedBox::new(0.0, 500.0, 1000.0, 1000.0),
            label: "Initials".to_string(),
        },
        NormalizedSuggestion {
            page: 9,
            bounds: NormalizedBox::default(),
            label: "Nowhere".to_string(),
        },
    ];

    let resolved = StampingEngine::new()
        .resolve_suggestions(&source.bytes, &suggestions)
        .unwrap();

    assert_eq!(resolved.len(), 2);
    assert!((resolved[0].x - 122.4).abs() < 1e-9);
    assert!((resolved[0].y - 673.2).abs() < 1e-9);
    // landscape page: bottom edge of the box sits on the page's bottom edge
    assert!((resolved[1].x - 421.0).abs() < 1e-9);
    assert!(resolved[1].y.abs() < 1e-9);
    assert_eq!(resolved[1].label, "Initials");

    let instruction = resolved[0].clone().into_instruction(PlacementKind::Digital);
    assert_eq!(instruction.page, 1);
    assert_eq!(instruction.label.as_deref(), Some("Sign Here"));
}

#[test]
fn test_suggestion_json_wire_format() {
    let json = r#"[{"page": 1, "box_2d": [100, 200, 150, 500], "label": "Sign"}, {"box_2d": [0, 0, 10, 10]}]"#;
    let suggestions: Vec<NormalizedSuggestion> = serde_json::from_str(json).unwrap();

    assert_eq!(suggestions[0].bounds, NormalizedBox::new(100.0, 200.0, 150.0, 500.0));
    assert_eq!(suggestions[1].page, 1);
    assert_eq!(suggestions[1].label, "Sign Here");
}
