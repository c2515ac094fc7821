// Headless host page.
//
// Stands in for the document a browser would give the widget: named slot
// elements, the viewport, the overlay surface and the durable store. A `Page`
// is a cheap handle; every pad on the page holds a clone of it.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::codec::SignatureImage;
use crate::error::Result;
use crate::store::{DurableStore, MemoryStore};
use crate::surface::{Geometry, PadId, PointerEvent, Surface, SurfaceManager};
use crate::types::{Raster, Rect, Viewport};

/// What a slot element currently shows.
#[derive(Clone, Debug, PartialEq)]
pub enum Preview {
    Empty,
    Placeholder(String),
    Image(SignatureImage),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActivationKey {
    Enter,
    Space,
    Other,
}

/// User interaction on a slot element.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Activation {
    Click,
    Key(ActivationKey),
}

struct Slot {
    preview: Preview,
    pad: Option<PadId>,
    listening: bool,
}

struct PageInner {
    slots: RefCell<BTreeMap<String, Slot>>,
    surface: RefCell<SurfaceManager>,
    store: RefCell<Box<dyn DurableStore>>,
    next_pad: Cell<PadId>,
}

#[derive(Clone)]
pub struct Page {
    inner: Rc<PageInner>,
}

impl Page {
    /// A page whose store only lives as long as the process.
    pub fn new(viewport: Viewport) -> Self {
        Self::with_store(viewport, MemoryStore::new())
    }

    pub fn with_store(viewport: Viewport, store: impl DurableStore + 'static) -> Self {
        Self {
            inner: Rc::new(PageInner {
                slots: RefCell::new(BTreeMap::new()),
                surface: RefCell::new(SurfaceManager::new(viewport)),
                store: RefCell::new(Box::new(store)),
                next_pad: Cell::new(1),
            }),
        }
    }

    pub fn add_slot(&self, name: &str) {
        self.inner
            .slots
            .borrow_mut()
            .entry(name.to_owned())
            .or_insert(Slot { preview: Preview::Empty, pad: None, listening: false });
    }

    pub fn has_slot(&self, name: &str) -> bool {
        self.inner.slots.borrow().contains_key(name)
    }

    pub fn slot_names(&self) -> Vec<String> {
        self.inner.slots.borrow().keys().cloned().collect()
    }

    pub fn preview(&self, slot: &str) -> Option<Preview> {
        self.inner.slots.borrow().get(slot).map(|s| s.preview.clone())
    }

    /// The pad a click or Enter/Space on `slot` should open, if any.
    pub fn activate(&self, slot: &str, how: Activation) -> Option<PadId> {
        let slots = self.inner.slots.borrow();
        let slot = slots.get(slot).filter(|s| s.listening)?;
        match how {
            Activation::Click | Activation::Key(ActivationKey::Enter | ActivationKey::Space) => slot.pad,
            Activation::Key(ActivationKey::Other) => None,
        }
    }

    /// Route pointer input to the surface. True means "prevent default".
    pub fn pointer(&self, event: PointerEvent) -> bool {
        self.inner.surface.borrow_mut().pointer(event)
    }

    pub fn resize(&self, viewport: Viewport) {
        self.inner.surface.borrow_mut().set_viewport(viewport);
    }

    pub fn viewport(&self) -> Viewport {
        self.inner.surface.borrow().viewport()
    }

    pub fn active_pad(&self) -> Option<PadId> {
        self.inner.surface.borrow().active()
    }

    /// Whether the shared surface is currently shown.
    pub fn surface_open(&self) -> bool {
        self.inner.surface.borrow().is_open()
    }

    /// Screen rectangle of the surface, once it has been created.
    pub fn surface_bounds(&self) -> Option<Rect> {
        self.inner.surface.borrow().surface().map(Surface::bounds)
    }

    pub fn surface_geometry(&self) -> Option<Geometry> {
        self.inner.surface.borrow().surface().map(Surface::geometry)
    }

    /// A copy of the surface pixels.
    pub fn surface_pixels(&self) -> Option<Raster> {
        self.inner.surface.borrow().surface().map(|s| s.raster().clone())
    }

    pub(crate) fn surface(&self) -> Ref<'_, SurfaceManager> {
        self.inner.surface.borrow()
    }

    /// Raw value under `key` in the durable store.
    pub fn stored(&self, key: &str) -> Result<Option<String>> {
        self.inner.store.borrow().get(key)
    }

    pub(crate) fn surface_mut(&self) -> RefMut<'_, SurfaceManager> {
        self.inner.surface.borrow_mut()
    }

    pub(crate) fn store_mut(&self) -> RefMut<'_, Box<dyn DurableStore>> {
        self.inner.store.borrow_mut()
    }

    pub(crate) fn next_pad_id(&self) -> PadId {
        let id = self.inner.next_pad.get();
        self.inner.next_pad.set(id + 1);
        id
    }

    pub(crate) fn bind(&self, slot: &str, pad: Option<PadId>) {
        if let Some(s) = self.inner.slots.borrow_mut().get_mut(slot) {
            s.pad = pad;
            s.listening = pad.is_some();
        }
    }

    /// Detach `pad` from `slot`, unless another pad has bound it since.
    pub(crate) fn unbind(&self, slot: &str, pad: PadId) {
        if let Some(s) = self.inner.slots.borrow_mut().get_mut(slot).filter(|s| s.pad == Some(pad)) {
            s.pad = None;
            s.listening = false;
        }
    }

    pub(crate) fn set_preview(&self, slot: &str, preview: Preview) {
        if let Some(s) = self.inner.slots.borrow_mut().get_mut(slot) {
            s.preview = preview;
        }
    }
}
