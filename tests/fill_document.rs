use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};

use signature_pad::BlankDetector;
use signature_pad::codec;
use signature_pad::fill::{self, EnrolmentForm, FieldWriter, FormFiller, SignatureOutcome, SignaturePlacement};
use signature_pad::{Raster, Rgba};

struct Template {
    bytes: Vec<u8>,
    card_name: ObjectId,
    card_no_1: ObjectId,
    cc_agree: ObjectId,
    visa: ObjectId,
    nested: ObjectId,
    pages: Vec<ObjectId>,
}

/// Three pages, a few text fields, two checkboxes and one hierarchical field.
fn template() -> Template {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let content_id = doc.add_object(Stream::new(Dictionary::new(), b"BT ET".to_vec()));

    let mut pages = Vec::new();
    for _ in 0..3 {
        pages.push(doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(595), Object::Integer(842)],
        }));
    }
    let kids: Vec<Object> = pages.iter().map(|&id| Object::Reference(id)).collect();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => 3,
            "Resources" => Dictionary::new(),
        }),
    );

    let text = |doc: &mut Document, name: &str| {
        doc.add_object(dictionary! {
            "FT" => "Tx",
            "T" => Object::string_literal(name),
            "Type" => "Annot",
            "Subtype" => "Widget",
        })
    };
    let card_name = text(&mut doc, "CardName");
    let card_no_1 = text(&mut doc, "CardNo_1");

    let checkbox = |doc: &mut Document, name: &str, on: &str| {
        let on_ap = doc.add_object(Stream::new(Dictionary::new(), Vec::new()));
        let off_ap = doc.add_object(Stream::new(Dictionary::new(), Vec::new()));
        let mut normal = Dictionary::new();
        normal.set(on, on_ap);
        normal.set("Off", off_ap);
        doc.add_object(dictionary! {
            "FT" => "Btn",
            "T" => Object::string_literal(name),
            "Type" => "Annot",
            "Subtype" => "Widget",
            "AP" => dictionary! { "N" => normal },
            "AS" => "Off",
        })
    };
    let cc_agree = checkbox(&mut doc, "CCAgree", "Agreed");
    let visa = checkbox(&mut doc, "Visa_Tick", "Yes");

    let nested = text(&mut doc, "Date");
    let group = doc.add_object(dictionary! {
        "T" => Object::string_literal("Sign"),
        "Kids" => vec![Object::Reference(nested)],
    });

    let fields: Vec<Object> =
        [card_name, card_no_1, cc_agree, visa, group].iter().map(|&id| Object::Reference(id)).collect();
    let acroform = doc.add_object(dictionary! { "Fields" => fields });
    let catalog = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
        "AcroForm" => acroform,
    });
    doc.trailer.set("Root", catalog);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    Template { bytes, card_name, card_no_1, cc_agree, visa, nested, pages }
}

fn signature() -> signature_pad::SignatureImage {
    let mut raster = Raster::new(120, 40);
    for x in 0..120 {
        raster.pixels[x] = Rgba::BLACK.pack();
        raster.pixels[20 * 120 + x] = Rgba::BLACK.pack();
    }
    codec::encode(&raster).unwrap()
}

fn dict(doc: &Document, id: ObjectId) -> &Dictionary {
    doc.get_object(id).unwrap().as_dict().unwrap()
}

fn text_value(doc: &Document, id: ObjectId) -> Vec<u8> {
    match dict(doc, id).get(b"V").unwrap() {
        Object::String(bytes, _) => bytes.clone(),
        other => panic!("V is not a string: {other:?}"),
    }
}

fn name_value<'a>(doc: &'a Document, id: ObjectId, key: &[u8]) -> &'a [u8] {
    dict(doc, id).get(key).unwrap().as_name().unwrap()
}

fn page_xobjects(doc: &Document, page: ObjectId) -> Option<Dictionary> {
    let res = dict(doc, page).get(b"Resources").ok()?;
    let res = match res {
        Object::Reference(id) => dict(doc, *id).clone(),
        Object::Dictionary(d) => d.clone(),
        _ => return None,
    };
    res.get(b"XObject").ok()?.as_dict().ok().cloned()
}

#[test]
fn form_values_land_in_their_fields() {
    let t = template();
    let form = EnrolmentForm {
        cc_agree: true,
        visa: false,
        card_name: "J DOE".into(),
        card_number: "4 1 1 1".into(),
        ..Default::default()
    };
    let (bytes, report) =
        fill::fill_document(&t.bytes, &form, None, &SignaturePlacement::default(), &BlankDetector::default()).unwrap();

    let doc = Document::load_mem(&bytes).unwrap();
    assert_eq!(text_value(&doc, t.card_name), b"J DOE");
    assert_eq!(text_value(&doc, t.card_no_1), b"4");
    assert_eq!(name_value(&doc, t.cc_agree, b"V"), b"Agreed");
    assert_eq!(name_value(&doc, t.cc_agree, b"AS"), b"Agreed");
    assert_eq!(name_value(&doc, t.visa, b"AS"), b"Off");

    assert_eq!(report.signature, SignatureOutcome::Absent);
    assert!(report.missing_fields.iter().any(|f| f == "CardBank"));
    assert!(report.missing_fields.iter().any(|f| f == "CardNo_2"));
    assert!(!report.missing_fields.iter().any(|f| f == "CardName" || f == "CCAgree"));
}

#[test]
fn need_appearances_is_set() {
    let t = template();
    let (bytes, _) = fill::fill_document(
        &t.bytes,
        &EnrolmentForm::default(),
        None,
        &SignaturePlacement::default(),
        &BlankDetector::default(),
    )
    .unwrap();
    let doc = Document::load_mem(&bytes).unwrap();
    let root = doc.trailer.get(b"Root").unwrap().as_reference().unwrap();
    let form_id = dict(&doc, root).get(b"AcroForm").unwrap().as_reference().unwrap();
    assert!(matches!(dict(&doc, form_id).get(b"NeedAppearances"), Ok(Object::Boolean(true))));
}

#[test]
fn nested_fields_use_qualified_names() {
    let t = template();
    let mut filler = FormFiller::from_bytes(&t.bytes).unwrap();
    assert!(filler.field_names().any(|n| n == "Sign.Date"));
    filler.set_text("Sign.Date", "14");
    let (bytes, report) = filler.finish().unwrap();
    assert!(report.missing_fields.is_empty());

    let doc = Document::load_mem(&bytes).unwrap();
    assert_eq!(text_value(&doc, t.nested), b"14");
}

#[test]
fn signature_is_drawn_on_the_configured_page() {
    let t = template();
    let sig = signature();
    let (bytes, report) = fill::fill_document(
        &t.bytes,
        &EnrolmentForm::default(),
        Some(&sig),
        &SignaturePlacement::default(),
        &BlankDetector::default(),
    )
    .unwrap();
    assert_eq!(report.signature, SignatureOutcome::Embedded);

    let doc = Document::load_mem(&bytes).unwrap();
    let xobjects = page_xobjects(&doc, t.pages[2]).expect("page 3 has XObjects");
    let image_id = xobjects.get(b"SigPad0").unwrap().as_reference().unwrap();
    let image = doc.get_object(image_id).unwrap().as_stream().unwrap();
    assert_eq!(image.dict.get(b"Width").unwrap().as_i64().unwrap(), 120);
    assert!(image.dict.has(b"SMask"));

    assert!(page_xobjects(&doc, t.pages[0]).is_none());
    let contents = dict(&doc, t.pages[2]).get(b"Contents").unwrap().as_array().unwrap();
    assert_eq!(contents.len(), 3);
}

#[test]
fn placement_page_is_clamped_to_the_last_page() {
    let t = template();
    let sig = signature();
    let placement = SignaturePlacement { page_index: 40, ..Default::default() };
    let (bytes, report) =
        fill::fill_document(&t.bytes, &EnrolmentForm::default(), Some(&sig), &placement, &BlankDetector::default())
            .unwrap();
    assert_eq!(report.signature, SignatureOutcome::Embedded);
    let doc = Document::load_mem(&bytes).unwrap();
    assert!(page_xobjects(&doc, t.pages[2]).is_some());
}

#[test]
fn blank_signature_is_skipped() {
    let t = template();
    let blank = codec::encode(&Raster::new(120, 40)).unwrap();
    let (bytes, report) = fill::fill_document(
        &t.bytes,
        &EnrolmentForm::default(),
        Some(&blank),
        &SignaturePlacement::default(),
        &BlankDetector::default(),
    )
    .unwrap();
    assert_eq!(report.signature, SignatureOutcome::Blank);
    let doc = Document::load_mem(&bytes).unwrap();
    assert!(page_xobjects(&doc, t.pages[2]).is_none());
}

#[test]
fn template_without_a_form_still_gets_filled() {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(595), Object::Integer(842)],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        }),
    );
    let catalog = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog);
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();

    let form = EnrolmentForm { card_name: "J DOE".into(), ..Default::default() };
    let sig = signature();
    let (out, report) =
        fill::fill_document(&bytes, &form, Some(&sig), &SignaturePlacement::default(), &BlankDetector::default())
            .unwrap();

    assert_eq!(report.signature, SignatureOutcome::Embedded);
    assert!(report.missing_fields.iter().any(|f| f == "CardName"));
    assert!(report.missing_fields.iter().any(|f| f == "CCAgree"));

    let filled = Document::load_mem(&out).unwrap();
    let root = filled.trailer.get(b"Root").unwrap().as_reference().unwrap();
    let form_id = dict(&filled, root).get(b"AcroForm").unwrap().as_reference().unwrap();
    assert!(matches!(dict(&filled, form_id).get(b"NeedAppearances"), Ok(Object::Boolean(true))));
    assert!(page_xobjects(&filled, page_id).is_some());
}
