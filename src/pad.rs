// The signature capture widget.
//
// A `SignaturePad` is bound to one slot on a `Page`. Activating the slot
// opens the page's shared surface for this pad; Save turns what was drawn into
// a PNG, Clear drops it, Cancel leaves the last saved signature untouched.
//
//   Closed --open()--> Open --save() / cancel() / another pad's open()--> Closed

use log::{debug, info, warn};
use serde::Deserialize;

use crate::codec::SignatureImage;
use crate::error::{Error, Result};
use crate::page::{Page, Preview};
use crate::surface::{DEFAULT_HEIGHT_RATIO, DEFAULT_MAX_WIDTH, PadId, SurfaceStyle};
use crate::types::Rgba;

/// Construction-time options. Read-only once the pad exists.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SignatureOptions {
    /// Store key the image is mirrored under; `None` disables persistence.
    pub storage_key: Option<String>,
    /// Placeholder shown in the slot while there is no signature.
    pub label: String,
    pub max_width: f32,
    /// Surface width / height.
    pub height_ratio: f32,
    pub line_width: f32,
    pub stroke_style: String,
    pub save_text: String,
    pub clear_text: String,
    pub cancel_text: String,
}

impl Default for SignatureOptions {
    fn default() -> Self {
        Self {
            storage_key: None,
            label: "Tap to sign".into(),
            max_width: DEFAULT_MAX_WIDTH,
            height_ratio: DEFAULT_HEIGHT_RATIO,
            line_width: 2.5,
            stroke_style: "#000".into(),
            save_text: "Save".into(),
            clear_text: "Clear".into(),
            cancel_text: "Cancel".into(),
        }
    }
}

impl SignatureOptions {
    pub fn with_storage_key(key: impl Into<String>) -> Self {
        Self { storage_key: Some(key.into()), ..Self::default() }
    }

    fn surface_style(&self) -> SurfaceStyle {
        let stroke = Rgba::parse(&self.stroke_style).unwrap_or_else(|| {
            warn!("unknown stroke colour {:?}, using black", self.stroke_style);
            Rgba::BLACK
        });
        SurfaceStyle {
            line_width: if self.line_width > 0.0 { self.line_width } else { 2.5 },
            stroke,
            max_width: self.max_width,
            height_ratio: self.height_ratio,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PadState {
    Closed,
    Open,
}

pub struct SignaturePad {
    id: PadId,
    slot: String,
    page: Page,
    options: SignatureOptions,
    style: SurfaceStyle,
    image: Option<SignatureImage>,
}

impl SignaturePad {
    /// Bind to `slot` on `page`. Fails if the page has no such slot.
    pub fn new(page: &Page, slot: &str, options: SignatureOptions) -> Result<Self> {
        if !page.has_slot(slot) {
            return Err(Error::SlotNotFound(slot.to_owned()));
        }
        let id = page.next_pad_id();
        let style = options.surface_style();
        let mut pad = Self { id, slot: slot.to_owned(), page: page.clone(), options, style, image: None };

        page.bind(slot, Some(id));
        pad.show_preview();

        if let Some(key) = pad.options.storage_key.clone() {
            match page.stored(&key) {
                Ok(Some(url)) => match SignatureImage::from_data_url(&url) {
                    Ok(image) => {
                        debug!("pad {id} restored signature from {key:?}");
                        pad.set_image(Some(image));
                    }
                    Err(e) => warn!("ignoring stored signature under {key:?}: {e}"),
                },
                Ok(None) => {}
                Err(e) => warn!("could not read stored signature under {key:?}: {e}"),
            }
        }
        Ok(pad)
    }

    pub fn id(&self) -> PadId {
        self.id
    }

    pub fn slot(&self) -> &str {
        &self.slot
    }

    pub fn options(&self) -> &SignatureOptions {
        &self.options
    }

    pub fn state(&self) -> PadState {
        if self.page.active_pad() == Some(self.id) { PadState::Open } else { PadState::Closed }
    }

    pub fn current_image(&self) -> Option<&SignatureImage> {
        self.image.as_ref()
    }

    pub fn current_data_url(&self) -> Option<String> {
        self.image.as_ref().map(SignatureImage::to_data_url)
    }

    /// Take the shared surface and show this pad's signature on it.
    pub fn open(&self) {
        info!("opening signature surface for {:?}", self.slot);
        self.page.surface_mut().claim(self.id, self.style.clone(), self.image.clone());
    }

    /// Keep what is on the surface as this pad's signature and close it.
    pub fn save(&mut self) -> Result<SignatureImage> {
        let image = self.page.surface().snapshot(self.id)?;
        if let Some(key) = &self.options.storage_key {
            self.page.store_mut().set(key, &image.to_data_url())?;
            debug!("pad {} stored signature under {key:?}", self.id);
        }
        self.set_image(Some(image.clone()));
        self.close();
        info!("signature saved for {:?}", self.slot);
        Ok(image)
    }

    /// Drop the signature. While this pad holds the surface it is wiped too
    /// and stays open for a fresh attempt.
    pub fn clear(&mut self) -> Result<()> {
        self.page.surface_mut().erase(self.id);
        if let Some(key) = &self.options.storage_key {
            self.page.store_mut().remove(key)?;
        }
        self.set_image(None);
        Ok(())
    }

    /// Hide the surface without touching the saved signature.
    pub fn close(&self) {
        if self.page.surface_mut().release(self.id) {
            debug!("pad {} released the surface", self.id);
        }
    }

    pub fn cancel(&self) {
        self.close();
    }

    /// Replace the signature from outside, without the surface.
    pub fn load(&mut self, image: SignatureImage) -> Result<()> {
        if let Some(key) = &self.options.storage_key {
            self.page.store_mut().set(key, &image.to_data_url())?;
        }
        self.set_image(Some(image));
        Ok(())
    }

    /// `load` from a data URL; an empty string clears.
    pub fn load_data_url(&mut self, url: &str) -> Result<()> {
        if url.trim().is_empty() {
            return self.clear_image();
        }
        let image = SignatureImage::from_data_url(url)?;
        self.load(image)
    }

    /// Clear from outside: never touches the surface pixels.
    fn clear_image(&mut self) -> Result<()> {
        if let Some(key) = &self.options.storage_key {
            self.page.store_mut().remove(key)?;
        }
        self.set_image(None);
        Ok(())
    }

    /// Unbind from the slot and empty it. Closes the surface if this pad held it.
    pub fn teardown(self) {
        self.page.set_preview(&self.slot, Preview::Empty);
        debug!("pad {} torn down", self.id);
        // Drop releases the claim and the slot binding.
    }

    fn set_image(&mut self, image: Option<SignatureImage>) {
        self.page.surface_mut().sync_image(self.id, image.clone());
        self.image = image;
        self.show_preview();
    }

    fn show_preview(&self) {
        let preview = match &self.image {
            Some(image) => Preview::Image(image.clone()),
            None => Preview::Placeholder(self.options.label.clone()),
        };
        self.page.set_preview(&self.slot, preview);
    }
}

impl Drop for SignaturePad {
    fn drop(&mut self) {
        self.page.unbind(&self.slot, self.id);
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{PointerEvent, PointerKind};
    use crate::types::{Point, Viewport};

    fn page() -> Page {
        let page = Page::new(Viewport::new(800.0, 600.0, 1.0));
        page.add_slot("sig1");
        page.add_slot("sig2");
        page
    }

    fn scribble(page: &Page) {
        let b = page.surface().surface().unwrap().bounds();
        let y = b.y + b.height / 2.0;
        page.pointer(PointerEvent::Down { pos: Point::new(b.x + 20.0, y), kind: PointerKind::Mouse });
        page.pointer(PointerEvent::Move { pos: Point::new(b.x + 200.0, y), kind: PointerKind::Mouse });
        page.pointer(PointerEvent::Up);
    }

    #[test]
    fn missing_slot_fails() {
        let err = SignaturePad::new(&page(), "nope", SignatureOptions::default()).err();
        assert!(matches!(err, Some(Error::SlotNotFound(s)) if s == "nope"));
    }

    #[test]
    fn new_pad_shows_placeholder() {
        let page = page();
        let opts = SignatureOptions { label: "Sign here".into(), ..Default::default() };
        let pad = SignaturePad::new(&page, "sig1", opts).unwrap();
        assert_eq!(page.preview("sig1"), Some(Preview::Placeholder("Sign here".into())));
        assert_eq!(pad.state(), PadState::Closed);
        assert!(pad.current_image().is_none());
    }

    #[test]
    fn save_without_claim_is_an_error() {
        let page = page();
        let mut pad = SignaturePad::new(&page, "sig1", SignatureOptions::default()).unwrap();
        assert!(matches!(pad.save(), Err(Error::SurfaceNotClaimed(_))));
    }

    #[test]
    fn modal_clear_keeps_the_surface_open() {
        let page = page();
        let mut pad = SignaturePad::new(&page, "sig1", SignatureOptions::with_storage_key("k")).unwrap();
        pad.open();
        scribble(&page);
        pad.save().unwrap();
        pad.open();
        assert!(!page.surface().surface().unwrap().raster().is_empty());

        pad.clear().unwrap();
        assert_eq!(pad.state(), PadState::Open);
        assert!(page.surface().surface().unwrap().raster().is_empty());
        assert!(pad.current_image().is_none());
        assert_eq!(page.stored("k").unwrap(), None);
    }

    #[test]
    fn empty_data_url_clears() {
        let page = page();
        let mut pad = SignaturePad::new(&page, "sig1", SignatureOptions::with_storage_key("k")).unwrap();
        pad.open();
        scribble(&page);
        let url = pad.save().unwrap().to_data_url();
        pad.load_data_url("").unwrap();
        assert!(pad.current_image().is_none());
        pad.load_data_url(&url).unwrap();
        assert_eq!(pad.current_data_url().as_deref(), Some(url.as_str()));
        assert_eq!(page.stored("k").unwrap().as_deref(), Some(url.as_str()));
        assert!(pad.load_data_url("data:text/plain,hi").is_err());
    }

    #[test]
    fn bad_stroke_colour_falls_back_to_black() {
        let opts = SignatureOptions { stroke_style: "chartreuse-ish".into(), ..Default::default() };
        assert_eq!(opts.surface_style().stroke, Rgba::BLACK);
    }

    #[test]
    fn teardown_unbinds_and_closes() {
        let page = page();
        let pad = SignaturePad::new(&page, "sig1", SignatureOptions::default()).unwrap();
        pad.open();
        pad.teardown();
        assert_eq!(page.preview("sig1"), Some(Preview::Empty));
        assert_eq!(page.active_pad(), None);
        assert!(!page.surface().is_open());
        assert_eq!(page.activate("sig1", crate::page::Activation::Click), None);
    }

    #[test]
    fn dropping_an_open_pad_releases_the_surface() {
        let page = page();
        let pad = SignaturePad::new(&page, "sig1", SignatureOptions::default()).unwrap();
        pad.open();
        drop(pad);
        assert_eq!(page.active_pad(), None);
        assert!(!page.surface().is_open());
        assert_eq!(page.activate("sig1", crate::page::Activation::Click), None);
    }

    #[test]
    fn dropping_a_replaced_pad_keeps_the_new_binding() {
        let page = page();
        let old = SignaturePad::new(&page, "sig1", SignatureOptions::default()).unwrap();
        let new = SignaturePad::new(&page, "sig1", SignatureOptions::default()).unwrap();
        new.open();
        drop(old);
        assert_eq!(page.active_pad(), Some(new.id()));
        assert_eq!(page.activate("sig1", crate::page::Activation::Click), Some(new.id()));
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let opts: SignatureOptions = toml::from_str("storage_key = \"sig1\"\nline_width = 4.0").unwrap();
        assert_eq!(opts.storage_key.as_deref(), Some("sig1"));
        assert_eq!(opts.line_width, 4.0);
        assert_eq!(opts.save_text, "Save");
        assert_eq!(opts.height_ratio, 3.3);
    }
}
