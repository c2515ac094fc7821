use signature_pad::codec::{self, SignatureImage};
use signature_pad::{
    Activation, FileStore, Page, PadState, Point, PointerEvent, PointerKind, Preview, SignatureOptions, SignaturePad,
    Viewport,
};

fn page_with(slots: &[&str]) -> Page {
    let page = Page::new(Viewport::new(800.0, 600.0, 2.0));
    for s in slots {
        page.add_slot(s);
    }
    page
}

/// Horizontal stroke across the middle third of the surface, at height `frac`.
fn stroke(page: &Page, frac: f32) {
    let b = page.surface_bounds().expect("surface exists");
    let y = b.y + b.height * frac;
    let mouse = PointerKind::Mouse;
    page.pointer(PointerEvent::Down { pos: Point::new(b.x + b.width / 3.0, y), kind: mouse });
    page.pointer(PointerEvent::Move { pos: Point::new(b.x + b.width / 2.0, y), kind: mouse });
    page.pointer(PointerEvent::Move { pos: Point::new(b.x + 2.0 * b.width / 3.0, y), kind: mouse });
    page.pointer(PointerEvent::Up);
}

fn surface_pixels(page: &Page) -> signature_pad::Raster {
    page.surface_pixels().expect("surface exists")
}

#[test]
fn sig1_draw_and_save_is_persisted() {
    let page = page_with(&["sig1"]);
    let mut pad = SignaturePad::new(&page, "sig1", SignatureOptions::with_storage_key("sig1")).unwrap();
    assert_eq!(page.preview("sig1"), Some(Preview::Placeholder("Tap to sign".into())));

    pad.open();
    assert_eq!(pad.state(), PadState::Open);
    stroke(&page, 0.5);
    let drawn = surface_pixels(&page);
    let saved = pad.save().unwrap();

    assert_eq!(pad.state(), PadState::Closed);
    assert_eq!(pad.current_image(), Some(&saved));
    assert_eq!(codec::decode(&saved).unwrap(), drawn);
    assert_eq!(page.stored("sig1").unwrap(), Some(saved.to_data_url()));
    assert_eq!(page.preview("sig1"), Some(Preview::Image(saved)));
}

#[test]
fn saved_image_has_backing_buffer_resolution() {
    let page = page_with(&["sig1"]);
    let mut pad = SignaturePad::new(&page, "sig1", SignatureOptions::default()).unwrap();
    pad.open();
    stroke(&page, 0.5);
    let img = pad.save().unwrap();
    // 720 css px wide at DPR 2
    assert_eq!(img.dimensions().unwrap(), (1440, 436));
}

#[test]
fn clear_removes_image_and_storage() {
    let page = page_with(&["sig1"]);
    let mut pad = SignaturePad::new(&page, "sig1", SignatureOptions::with_storage_key("sig1")).unwrap();
    pad.open();
    stroke(&page, 0.5);
    pad.save().unwrap();

    pad.clear().unwrap();
    assert!(pad.current_image().is_none());
    assert_eq!(page.stored("sig1").unwrap(), None);
    assert_eq!(page.preview("sig1"), Some(Preview::Placeholder("Tap to sign".into())));
}

#[test]
fn cancel_keeps_the_previous_image() {
    let page = page_with(&["sig1"]);
    let mut pad = SignaturePad::new(&page, "sig1", SignatureOptions::default()).unwrap();

    pad.open();
    stroke(&page, 0.3);
    pad.cancel();
    assert!(pad.current_image().is_none());

    pad.open();
    stroke(&page, 0.3);
    let first = pad.save().unwrap();

    pad.open();
    stroke(&page, 0.7);
    pad.close();
    assert_eq!(pad.current_image(), Some(&first));
    assert_eq!(pad.state(), PadState::Closed);
}

#[test]
fn opening_another_pad_steals_the_surface() {
    let page = page_with(&["sig1", "sig2"]);
    let mut a = SignaturePad::new(&page, "sig1", SignatureOptions::with_storage_key("sig1")).unwrap();
    let mut b = SignaturePad::new(&page, "sig2", SignatureOptions::with_storage_key("sig2")).unwrap();

    a.open();
    stroke(&page, 0.25);
    b.open();
    assert_eq!(a.state(), PadState::Closed);
    assert_eq!(b.state(), PadState::Open);
    // a's unsaved strokes are gone from the surface b now owns
    assert!(surface_pixels(&page).is_empty());

    // a can no longer commit anything
    assert!(a.save().is_err());
    assert!(a.current_image().is_none());

    stroke(&page, 0.75);
    let b_img = b.save().unwrap();
    assert!(a.current_image().is_none());
    assert_eq!(page.stored("sig1").unwrap(), None);
    assert_eq!(page.stored("sig2").unwrap(), Some(b_img.to_data_url()));
}

#[test]
fn reopening_shows_own_saved_state_not_the_other_pads_strokes() {
    let page = page_with(&["sig1", "sig2"]);
    let mut a = SignaturePad::new(&page, "sig1", SignatureOptions::default()).unwrap();
    let b = SignaturePad::new(&page, "sig2", SignatureOptions::default()).unwrap();

    a.open();
    stroke(&page, 0.25);
    let a_img = a.save().unwrap();

    b.open();
    stroke(&page, 0.75);
    a.open();
    assert_eq!(surface_pixels(&page), codec::decode(&a_img).unwrap());
    let again = a.save().unwrap();
    assert_eq!(codec::decode(&again).unwrap(), codec::decode(&a_img).unwrap());
}

#[test]
fn new_pad_with_same_key_rehydrates() {
    let page = page_with(&["sig1", "copy"]);
    let mut pad = SignaturePad::new(&page, "sig1", SignatureOptions::with_storage_key("sig1")).unwrap();
    pad.open();
    stroke(&page, 0.5);
    let saved = pad.save().unwrap();

    let twin = SignaturePad::new(&page, "copy", SignatureOptions::with_storage_key("sig1")).unwrap();
    assert_eq!(twin.current_image(), Some(&saved));
    assert_eq!(page.preview("copy"), Some(Preview::Image(saved)));

    pad.clear().unwrap();
    let after = SignaturePad::new(&page, "copy", SignatureOptions::with_storage_key("sig1")).unwrap();
    assert!(after.current_image().is_none());
    assert_eq!(page.preview("copy"), Some(Preview::Placeholder("Tap to sign".into())));
}

#[test]
fn undecodable_store_entry_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    std::fs::write(&path, r#"{"sig1": "data:image/png;base64,bm90IGEgcG5n"}"#).unwrap();

    let page = Page::with_store(Viewport::default(), FileStore::open(&path).unwrap());
    page.add_slot("sig1");
    let pad = SignaturePad::new(&page, "sig1", SignatureOptions::with_storage_key("sig1")).unwrap();
    assert!(pad.current_image().is_none());
}

#[test]
fn file_store_carries_signatures_across_pages() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sigs").join("store.json");

    let saved: SignatureImage = {
        let page = Page::with_store(Viewport::default(), FileStore::open(&path).unwrap());
        page.add_slot("sig1");
        let mut pad = SignaturePad::new(&page, "sig1", SignatureOptions::with_storage_key("sig1")).unwrap();
        pad.open();
        stroke(&page, 0.5);
        pad.save().unwrap()
    };

    let page = Page::with_store(Viewport::default(), FileStore::open(&path).unwrap());
    page.add_slot("sig1");
    let pad = SignaturePad::new(&page, "sig1", SignatureOptions::with_storage_key("sig1")).unwrap();
    assert_eq!(pad.current_image(), Some(&saved));
}

#[test]
fn resize_while_open_keeps_content() {
    let page = page_with(&["sig1"]);
    let mut pad = SignaturePad::new(&page, "sig1", SignatureOptions::default()).unwrap();
    pad.open();
    stroke(&page, 0.5);
    pad.save().unwrap();

    pad.open();
    page.resize(Viewport::new(360.0, 640.0, 3.0));
    let g = page.surface_geometry().unwrap();
    assert!((g.css_width - 342.0).abs() < 1e-3);
    assert_eq!((g.pixel_width, g.pixel_height), (1026, 312));
    assert!(!surface_pixels(&page).is_empty());

    let resized = pad.save().unwrap();
    assert!(!codec::decode(&resized).unwrap().is_empty());
}

#[test]
fn touch_drawing_suppresses_scrolling() {
    let page = page_with(&["sig1"]);
    let mut pad = SignaturePad::new(&page, "sig1", SignatureOptions::default()).unwrap();
    pad.open();
    let b = page.surface_bounds().unwrap();
    let y = b.y + b.height / 2.0;
    assert!(page.pointer(PointerEvent::Down { pos: Point::new(b.x + 10.0, y), kind: PointerKind::Touch }));
    assert!(page.pointer(PointerEvent::Move { pos: Point::new(b.x + 90.0, y), kind: PointerKind::Touch }));
    assert!(!page.pointer(PointerEvent::Up));
    assert!(!pad.save().unwrap().png_bytes().is_empty());
}

#[test]
fn slot_activation_opens_the_bound_pad() {
    let page = page_with(&["sig1"]);
    let pad = SignaturePad::new(&page, "sig1", SignatureOptions::default()).unwrap();
    assert_eq!(page.activate("sig1", Activation::Click), Some(pad.id()));
    pad.teardown();
    assert_eq!(page.activate("sig1", Activation::Click), None);
    assert_eq!(page.preview("sig1"), Some(Preview::Empty));
}

#[test]
fn load_mirrors_to_store_and_surface() {
    let page = page_with(&["sig1", "sig2"]);
    let mut a = SignaturePad::new(&page, "sig1", SignatureOptions::default()).unwrap();
    let mut b = SignaturePad::new(&page, "sig2", SignatureOptions::with_storage_key("b")).unwrap();

    a.open();
    stroke(&page, 0.5);
    let img = a.save().unwrap();

    b.load(img.clone()).unwrap();
    assert_eq!(b.current_image(), Some(&img));
    assert_eq!(page.stored("b").unwrap(), Some(img.to_data_url()));

    b.open();
    assert_eq!(surface_pixels(&page), codec::decode(&img).unwrap());
}
