// The shared drawing surface.
//
// There is exactly one surface per page. It is created the first time any pad
// claims it and lives as long as the `SurfaceManager`. At most one pad holds
// the claim; claiming never waits, it simply replaces the previous holder and
// whatever that holder had drawn without saving is dropped.

use log::{debug, warn};

use crate::brush;
use crate::codec::{self, SignatureImage};
use crate::error::{Error, Result};
use crate::types::{Point, Raster, Rect, Rgba, Viewport};

pub type PadId = u64;

pub const DEFAULT_MAX_WIDTH: f32 = 720.0;
pub const DEFAULT_HEIGHT_RATIO: f32 = 3.3;
/// Share of the viewport width the surface may take.
const VIEWPORT_FILL: f32 = 0.95;

/// Pen and sizing taken from the claiming pad's options.
#[derive(Clone, Debug, PartialEq)]
pub struct SurfaceStyle {
    pub line_width: f32,
    pub stroke: Rgba,
    pub max_width: f32,
    pub height_ratio: f32,
}

impl Default for SurfaceStyle {
    fn default() -> Self {
        Self {
            line_width: 2.5,
            stroke: Rgba::BLACK,
            max_width: DEFAULT_MAX_WIDTH,
            height_ratio: DEFAULT_HEIGHT_RATIO,
        }
    }
}

/// On-screen (CSS) size and the backing buffer derived from it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Geometry {
    pub css_width: f32,
    pub css_height: f32,
    /// Device pixels per CSS pixel; every drawing command is scaled by this.
    pub scale: f32,
    pub pixel_width: usize,
    pub pixel_height: usize,
}

impl Geometry {
    pub fn fit(viewport: &Viewport, max_width: f32, height_ratio: f32) -> Self {
        let max_width = if max_width > 0.0 { max_width } else { DEFAULT_MAX_WIDTH };
        let ratio = if height_ratio > 0.0 { height_ratio } else { DEFAULT_HEIGHT_RATIO };
        let scale = viewport.density();

        let css_width = (viewport.width.max(0.0) * VIEWPORT_FILL).min(max_width);
        let css_height = (css_width / ratio).round();

        Self {
            css_width,
            css_height,
            scale,
            // PNG has no zero-sized images; keep at least one pixel.
            pixel_width: ((css_width * scale).round() as usize).max(1),
            pixel_height: ((css_height * scale).round() as usize).max(1),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerKind {
    Mouse,
    Touch,
}

/// Input in screen (viewport) coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerEvent {
    Down { pos: Point, kind: PointerKind },
    Move { pos: Point, kind: PointerKind },
    Up,
    Leave,
    Cancel,
}

pub struct Surface {
    raster: Raster,
    geometry: Geometry,
    bounds: Rect,
    drawing: bool,
    last: Option<Point>, // device pixels
    visible: bool,
}

impl Surface {
    fn new(viewport: &Viewport, style: &SurfaceStyle) -> Self {
        let mut surface = Self {
            raster: Raster::new(1, 1),
            geometry: Geometry::fit(viewport, style.max_width, style.height_ratio),
            bounds: Rect::default(),
            drawing: false,
            last: None,
            visible: false,
        };
        surface.layout(viewport, style);
        surface
    }

    pub fn raster(&self) -> &Raster {
        &self.raster
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Where the surface sits on screen, in CSS pixels.
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_drawing(&self) -> bool {
        self.drawing
    }

    /// Resize the backing buffer for `viewport`. Like resizing a canvas, this
    /// drops every pixel and any stroke in progress.
    fn layout(&mut self, viewport: &Viewport, style: &SurfaceStyle) {
        let g = Geometry::fit(viewport, style.max_width, style.height_ratio);
        self.raster = Raster::new(g.pixel_width, g.pixel_height);
        self.bounds = Rect {
            x: ((viewport.width - g.css_width) / 2.0).max(0.0),
            y: ((viewport.height - g.css_height) / 2.0).max(0.0),
            width: g.css_width,
            height: g.css_height,
        };
        self.geometry = g;
        self.end_stroke();
    }

    fn end_stroke(&mut self) {
        self.drawing = false;
        self.last = None;
    }

    /// Screen position -> device pixels on the backing buffer.
    fn to_device(&self, screen: Point) -> Point {
        let s = self.geometry.scale;
        Point::new((screen.x - self.bounds.x) * s, (screen.y - self.bounds.y) * s)
    }

    /// Draw `image` stretched over the whole surface (CSS size under the DPR transform).
    fn paint_image(&mut self, image: &SignatureImage) -> Result<()> {
        let decoded = codec::decode(image)?;
        self.raster = codec::resample(&decoded, self.raster.width, self.raster.height);
        Ok(())
    }

    fn repaint(&mut self, image: Option<&SignatureImage>) {
        self.raster.clear();
        if let Some(image) = image {
            if let Err(e) = self.paint_image(image) {
                warn!("could not redraw signature on surface: {e}");
                self.raster.clear();
            }
        }
    }
}

struct Claim {
    pad: PadId,
    style: SurfaceStyle,
    image: Option<SignatureImage>,
}

/// Owns the page's single surface and the exclusive claim on it.
pub struct SurfaceManager {
    viewport: Viewport,
    surface: Option<Surface>,
    claim: Option<Claim>,
}

impl SurfaceManager {
    pub fn new(viewport: Viewport) -> Self {
        Self { viewport, surface: None, claim: None }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// `None` until the first claim.
    pub fn surface(&self) -> Option<&Surface> {
        self.surface.as_ref()
    }

    pub fn active(&self) -> Option<PadId> {
        self.claim.as_ref().map(|c| c.pad)
    }

    pub fn is_open(&self) -> bool {
        self.surface.as_ref().is_some_and(|s| s.visible)
    }

    /// Take the surface for `pad`: size it to the viewport, wipe it, paint
    /// `image` if any and show it. Any previous holder loses the claim.
    pub fn claim(&mut self, pad: PadId, style: SurfaceStyle, image: Option<SignatureImage>) {
        if let Some(prev) = self.active().filter(|&p| p != pad) {
            debug!("pad {pad} takes the surface from pad {prev}");
        }
        let viewport = self.viewport;
        let surface = self.surface.get_or_insert_with(|| {
            debug!("creating shared signature surface");
            Surface::new(&viewport, &style)
        });
        surface.layout(&viewport, &style);
        surface.repaint(image.as_ref());
        surface.visible = true;
        self.claim = Some(Claim { pad, style, image });
    }

    /// Hide the surface, but only if `pad` is the holder. Returns whether it was.
    pub fn release(&mut self, pad: PadId) -> bool {
        if self.active() != Some(pad) {
            return false;
        }
        self.claim = None;
        if let Some(surface) = self.surface.as_mut() {
            surface.visible = false;
            surface.end_stroke();
        }
        true
    }

    /// Keep the holder's current image in step so a resize redraws the right thing.
    pub fn sync_image(&mut self, pad: PadId, image: Option<SignatureImage>) {
        if let Some(claim) = self.claim.as_mut().filter(|c| c.pad == pad) {
            claim.image = image;
        }
    }

    /// Wipe the pixels. Only the holder may do this.
    pub fn erase(&mut self, pad: PadId) -> bool {
        if self.active() != Some(pad) {
            return false;
        }
        if let Some(surface) = self.surface.as_mut() {
            surface.raster.clear();
            surface.end_stroke();
        }
        true
    }

    /// Encode what is currently visible. Only the holder may read the pixels.
    pub fn snapshot(&self, pad: PadId) -> Result<SignatureImage> {
        match (&self.surface, self.active()) {
            (Some(surface), Some(active)) if active == pad => codec::encode(&surface.raster),
            _ => Err(Error::SurfaceNotClaimed(pad)),
        }
    }

    /// Viewport changed. While open, re-fit and redraw the holder's image at
    /// the new size; the redraw is from the stored bitmap, so it is lossy.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        let (Some(surface), Some(claim)) = (self.surface.as_mut(), self.claim.as_ref()) else {
            return;
        };
        if !surface.visible {
            return;
        }
        surface.layout(&viewport, &claim.style);
        surface.repaint(claim.image.as_ref());
        debug!(
            "surface resized to {}x{} css ({}x{} px)",
            surface.geometry.css_width,
            surface.geometry.css_height,
            surface.geometry.pixel_width,
            surface.geometry.pixel_height
        );
    }

    /// Feed one input event. Returns true when the host must suppress its
    /// default handling (touch scrolling while drawing).
    pub fn pointer(&mut self, event: PointerEvent) -> bool {
        let (Some(surface), Some(claim)) = (self.surface.as_mut(), self.claim.as_ref()) else {
            return false;
        };
        if !surface.visible {
            return false;
        }

        match event {
            PointerEvent::Down { pos, kind } => {
                if !surface.bounds.contains(pos) {
                    return false;
                }
                // Begin a new path; nothing is painted until the pointer moves.
                surface.drawing = true;
                surface.last = Some(surface.to_device(pos));
                kind == PointerKind::Touch
            }
            PointerEvent::Move { pos, kind } => {
                let suppress = kind == PointerKind::Touch;
                if !surface.drawing {
                    return suppress;
                }
                if kind == PointerKind::Mouse && !surface.bounds.contains(pos) {
                    // the mouse left the surface
                    surface.end_stroke();
                    return false;
                }
                let to = surface.to_device(pos);
                if let Some(from) = surface.last {
                    let width = claim.style.line_width * surface.geometry.scale;
                    brush::stroke_segment(&mut surface.raster, from, to, width, claim.style.stroke);
                }
                surface.last = Some(to);
                suppress
            }
            PointerEvent::Up | PointerEvent::Leave | PointerEvent::Cancel => {
                surface.end_stroke();
                false
            }
        }
    }
}
