// What you SEE:
// • One box per signature slot. Click a box to open the shared signing surface.
// • Hold Left Mouse on the surface to draw.
// • S / Save: keep the signature. C / Clear: wipe it. Esc / Cancel: close without saving.
// • F fills the configured PDF template with the form values and the first slot's signature.
// • Q quits.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use clap::Parser;
use log::{error, info, warn};
use minifb::Key;

use signature_pad::codec::{self, SignatureImage};
use signature_pad::draw::{
    Drawer, PointerTracker, blit_raster, draw_text_5x7, fill_rect, fit_within, shade, stroke_rect, text_width,
};
use signature_pad::fill::{self, EnrolmentForm};
use signature_pad::{
    Activation, Config, Error, FileStore, Page, PadId, PointerEvent, Preview, Raster, Rect, SignaturePad, Viewport,
};

const BACKGROUND: u32 = 0xFF_F4_F4_F4;
const INK: u32 = 0xFF_20_20_20;
const MUTED: u32 = 0xFF_80_80_80;
const PANEL: u32 = 0xFF_FF_FF_FF;
const BUTTON: u32 = 0xFF_1F_6F_D0;
const BUTTON_SECONDARY: u32 = 0xFF_D8_D8_D8;

#[derive(Parser, Debug)]
#[command(about = "Capture signatures and fill them into a PDF form")]
struct Args {
    /// TOML config (viewport, pads, placement, ...)
    #[arg(long)]
    config: Option<PathBuf>,
    /// JSON file backing the signature store
    #[arg(long)]
    store: Option<PathBuf>,
    /// Fillable PDF template
    #[arg(long)]
    template: Option<PathBuf>,
    /// Form values as JSON
    #[arg(long)]
    form: Option<PathBuf>,
    /// Where the filled PDF is written
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ModalButton {
    Save,
    Clear,
    Cancel,
}

/// Preview box for the i-th slot.
fn slot_rect(i: usize, viewport: &Viewport) -> Rect {
    Rect { x: 20.0, y: 40.0 + i as f32 * 120.0, width: (viewport.width - 40.0).clamp(40.0, 360.0), height: 100.0 }
}

/// Save / Clear / Cancel, in a row under the surface.
fn modal_buttons(surface: Rect) -> [(ModalButton, Rect); 3] {
    let y = surface.y + surface.height + 10.0;
    let at = |i: f32| Rect { x: surface.x + i * 100.0, y, width: 90.0, height: 28.0 };
    [(ModalButton::Save, at(0.0)), (ModalButton::Clear, at(1.0)), (ModalButton::Cancel, at(2.0))]
}

fn pad_mut(pads: &mut [SignaturePad], id: Option<PadId>) -> Option<&mut SignaturePad> {
    let id = id?;
    pads.iter_mut().find(|p| p.id() == id)
}

fn press(pads: &mut [SignaturePad], page: &Page, button: ModalButton) {
    let Some(pad) = pad_mut(pads, page.active_pad()) else { return };
    let result = match button {
        ModalButton::Save => pad.save().map(|_| ()),
        ModalButton::Clear => pad.clear(),
        ModalButton::Cancel => {
            pad.cancel();
            Ok(())
        }
    };
    if let Err(e) = result {
        error!("{button:?} failed: {e}");
    }
}

/// Decoded previews, re-decoded only when a pad's image changes.
#[derive(Default)]
struct PreviewCache {
    decoded: HashMap<String, (SignatureImage, Raster)>,
}

impl PreviewCache {
    fn get(&mut self, slot: &str, image: &SignatureImage) -> Option<&Raster> {
        let stale = self.decoded.get(slot).is_none_or(|(cached, _)| cached != image);
        if stale {
            match codec::decode(image) {
                Ok(raster) => {
                    self.decoded.insert(slot.to_owned(), (image.clone(), raster));
                }
                Err(e) => {
                    warn!("preview for {slot:?} could not be decoded: {e}");
                    self.decoded.remove(slot);
                }
            }
        }
        self.decoded.get(slot).map(|(_, raster)| raster)
    }
}

fn render(frame: &mut Raster, page: &Page, pads: &[SignaturePad], cache: &mut PreviewCache) {
    frame.pixels.fill(BACKGROUND);
    let viewport = page.viewport();
    draw_text_5x7(frame, 20, 14, "Click a box to sign. F: fill PDF  Q: quit", INK, 2);

    for (i, pad) in pads.iter().enumerate() {
        let r = slot_rect(i, &viewport);
        fill_rect(frame, r, PANEL);
        stroke_rect(frame, r, MUTED);
        match page.preview(pad.slot()) {
            Some(Preview::Placeholder(label)) => {
                let x = r.x as i32 + (r.width as i32 - text_width(&label, 2)) / 2;
                draw_text_5x7(frame, x, (r.y + r.height / 2.0) as i32 - 7, &label, MUTED, 2);
            }
            Some(Preview::Image(image)) => {
                if let Some(raster) = cache.get(pad.slot(), &image) {
                    let inner = Rect { x: r.x + 4.0, y: r.y + 4.0, width: r.width - 8.0, height: r.height - 8.0 };
                    blit_raster(frame, raster, fit_within(raster.width, raster.height, inner));
                }
            }
            Some(Preview::Empty) | None => {}
        }
    }

    if !page.surface_open() {
        return;
    }
    let (Some(b), Some(pixels)) = (page.surface_bounds(), page.surface_pixels()) else { return };
    let Some(pad) = pads.iter().find(|p| Some(p.id()) == page.active_pad()) else { return };

    shade(frame, 110);
    fill_rect(frame, Rect { x: b.x - 12.0, y: b.y - 12.0, width: b.width + 24.0, height: b.height + 62.0 }, PANEL);
    stroke_rect(frame, b, MUTED);
    blit_raster(frame, &pixels, b);

    let opts = pad.options();
    for (button, r) in modal_buttons(b) {
        let (fill, text_color, caption) = match button {
            ModalButton::Save => (BUTTON, PANEL, opts.save_text.as_str()),
            ModalButton::Clear => (BUTTON_SECONDARY, INK, opts.clear_text.as_str()),
            ModalButton::Cancel => (BUTTON_SECONDARY, INK, opts.cancel_text.as_str()),
        };
        fill_rect(frame, r, fill);
        let x = r.x as i32 + (r.width as i32 - text_width(caption, 2)) / 2;
        draw_text_5x7(frame, x, r.y as i32 + 7, caption, text_color, 2);
    }
}

fn fill_pdf(config: &Config, pads: &[SignaturePad]) -> Result<(), Error> {
    let Some(template_path) = &config.template else {
        warn!("no template configured; pass --template");
        return Ok(());
    };
    let template = fs::read(template_path)?;
    let form = match &config.form {
        Some(path) => EnrolmentForm::from_json(&fs::read_to_string(path)?)?,
        None => EnrolmentForm::default(),
    };
    let signature = pads.first().and_then(|p| p.current_image());

    let (bytes, report) = fill::fill_document(&template, &form, signature, &config.placement, &config.blank)?;
    fs::write(&config.output, bytes)?;
    info!(
        "wrote {} (signature: {:?}, {} missing fields)",
        config.output.display(),
        report.signature,
        report.missing_fields.len()
    );
    Ok(())
}

fn main() -> Result<(), Error> {
    env_logger::init();
    let args = Args::parse();

    /* --- Config: file first, then CLI overrides --- */
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if args.store.is_some() {
        config.store = args.store;
    }
    if args.template.is_some() {
        config.template = args.template;
    }
    if args.form.is_some() {
        config.form = args.form;
    }
    if let Some(out) = args.out {
        config.output = out;
    }

    /* --- Page + pads ---
       Visual: every slot shows its saved signature or the placeholder. */
    let viewport = Viewport::from(&config.viewport);
    let page = match &config.store {
        Some(path) => Page::with_store(viewport, FileStore::open(path)?),
        None => Page::new(viewport),
    };
    let mut pads = Vec::with_capacity(config.pads.len());
    for pc in &config.pads {
        page.add_slot(&pc.slot);
        pads.push(SignaturePad::new(&page, &pc.slot, pc.options.clone())?);
    }

    /* --- Window ---
       The demo draws at one device pixel per CSS pixel. */
    let (mut w, mut h) = (viewport.width.max(1.0) as usize, viewport.height.max(1.0) as usize);
    let mut drawer = Drawer::new("Signature Pad", w, h)?;
    let mut frame = Raster::new(w, h);
    let mut tracker = PointerTracker::default();
    let mut cache = PreviewCache::default();

    /* ------------------------------ Main loop ------------------------------ */
    while drawer.is_open() && !drawer.key_once(Key::Q) {
        // 1) Window resized: the page gets a new viewport (surface re-fits if open).
        let (nw, nh) = drawer.size();
        if (nw, nh) != (w, h) && nw > 0 && nh > 0 {
            (w, h) = (nw, nh);
            frame = Raster::new(w, h);
            page.resize(Viewport::new(w as f32, h as f32, 1.0));
        }

        // 2) Mouse: buttons and slot boxes take clicks, the surface takes the rest.
        if let Some(event) = tracker.poll(&drawer) {
            let mut consumed = false;
            if let PointerEvent::Down { pos, .. } = event {
                let open_bounds = if page.surface_open() { page.surface_bounds() } else { None };
                match open_bounds {
                    Some(b) => {
                        if let Some((button, _)) = modal_buttons(b).into_iter().find(|(_, r)| r.contains(pos)) {
                            press(&mut pads, &page, button);
                            consumed = true;
                        }
                    }
                    None => {
                        let vp = page.viewport();
                        let hit = (0..pads.len()).find(|&i| slot_rect(i, &vp).contains(pos));
                        if let Some(i) = hit {
                            if let Some(id) = page.activate(pads[i].slot(), Activation::Click) {
                                if let Some(pad) = pad_mut(&mut pads, Some(id)) {
                                    pad.open();
                                }
                            }
                            consumed = true;
                        }
                    }
                }
            }
            if !consumed {
                page.pointer(event);
            }
        }

        // 3) Keyboard shortcuts for the modal buttons, and F to fill.
        if drawer.key_once(Key::S) {
            press(&mut pads, &page, ModalButton::Save);
        }
        if drawer.key_once(Key::C) {
            press(&mut pads, &page, ModalButton::Clear);
        }
        if drawer.key_once(Key::Escape) {
            press(&mut pads, &page, ModalButton::Cancel);
        }
        if drawer.key_once(Key::F) {
            if let Err(e) = fill_pdf(&config, &pads) {
                error!("PDF generation failed: {e}");
            }
        }

        // 4) Draw the page and present it.
        render(&mut frame, &page, &pads, &mut cache);
        drawer.present(&frame)?;
    }

    Ok(())
}
