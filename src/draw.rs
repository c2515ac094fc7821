// Window + software drawing utilities for the demo host page.
// Provided here:
// 1) A window that shows the page: slot previews, and the signature overlay when open.
// 2) Mouse -> PointerEvent translation for the shared surface.
// 3) A tiny 5x7 bitmap font for placeholders and button captions.

use crate::error::Error;
use crate::surface::{PointerEvent, PointerKind};
use crate::types::{Point, Raster, Rect, Rgba};
use minifb::{Key, KeyRepeat, MouseButton, MouseMode, Window, WindowOptions};

pub struct Drawer {
    window: Window,
    scratch: Vec<u32>, // 0x00RRGGBB copy of the frame for minifb
}

impl Drawer {
    /// Create a resizable window the size of the viewport.
    pub fn new(title: &str, width: usize, height: usize) -> Result<Self, Error> {
        let options = WindowOptions { resize: true, ..WindowOptions::default() };
        let mut window = Window::new(title, width, height, options)
            .map_err(|e| Error::WindowInit(e.to_string()))?;
        window.set_target_fps(60);
        Ok(Self { window, scratch: Vec::new() })
    }

    /// Push the frame to the screen. The frame is expected to be opaque.
    pub fn present(&mut self, frame: &Raster) -> Result<(), Error> {
        self.scratch.clear();
        self.scratch.extend(frame.pixels.iter().map(|p| p & 0x00FF_FFFF));
        self.window
            .update_with_buffer(&self.scratch, frame.width, frame.height)
            .map_err(|e| Error::WindowUpdate(e.to_string()))?;
        Ok(())
    }

    /// Returns false when the user closes the window.
    pub fn is_open(&self) -> bool {
        self.window.is_open()
    }

    pub fn size(&self) -> (usize, usize) {
        self.window.get_size()
    }

    /// Mouse position in window pixels; `None` while outside the window.
    pub fn mouse_pos(&self) -> Option<Point> {
        self.window.get_mouse_pos(MouseMode::Discard).map(|(x, y)| Point::new(x, y))
    }

    pub fn left_mouse_down(&self) -> bool {
        self.window.get_mouse_down(MouseButton::Left)
    }

    pub fn key_once(&self, key: Key) -> bool {
        self.window.is_key_pressed(key, KeyRepeat::No)
    }
}

/// Turns polled mouse state into the down/move/up/leave sequence a canvas sees.
#[derive(Default)]
pub struct PointerTracker {
    down: bool,
    inside: bool,
}

impl PointerTracker {
    pub fn poll(&mut self, drawer: &Drawer) -> Option<PointerEvent> {
        self.step(drawer.mouse_pos(), drawer.left_mouse_down())
    }

    fn step(&mut self, pos: Option<Point>, down_now: bool) -> Option<PointerEvent> {
        let was_down = self.down;
        self.down = down_now;

        let Some(pos) = pos else {
            let left = self.inside;
            self.inside = false;
            return left.then_some(PointerEvent::Leave);
        };
        self.inside = true;

        let kind = PointerKind::Mouse;
        Some(match (was_down, down_now) {
            (false, true) => PointerEvent::Down { pos, kind },
            (true, false) => PointerEvent::Up,
            _ => PointerEvent::Move { pos, kind },
        })
    }
}

/* ---------- Software drawing on an opaque frame ---------- */

/// Put a pixel on the frame if (x,y) is inside bounds.
#[inline]
pub fn put_pixel(fb: &mut Raster, x: i32, y: i32, color: u32) {
    if x < 0 || y < 0 {
        return;
    }
    let (x, y) = (x as usize, y as usize);
    if x >= fb.width || y >= fb.height {
        return;
    }
    fb.pixels[y * fb.width + x] = color;
}

/// Mix `src` over an opaque frame pixel.
#[inline]
fn blend_pixel(fb: &mut Raster, x: i32, y: i32, src: Rgba) {
    if src.a == 0 || x < 0 || y < 0 {
        return;
    }
    let (x, y) = (x as usize, y as usize);
    if x >= fb.width || y >= fb.height {
        return;
    }
    let idx = y * fb.width + x;
    let dst = Rgba::unpack(fb.pixels[idx]);
    let a = src.a as u32;
    let mix = |s: u8, d: u8| ((s as u32 * a + d as u32 * (255 - a) + 127) / 255) as u8;
    fb.pixels[idx] = Rgba::rgb(mix(src.r, dst.r), mix(src.g, dst.g), mix(src.b, dst.b)).pack();
}

pub fn fill_rect(fb: &mut Raster, r: Rect, color: u32) {
    let (x0, y0) = (r.x.round() as i32, r.y.round() as i32);
    let (x1, y1) = ((r.x + r.width).round() as i32, (r.y + r.height).round() as i32);
    for y in y0..y1 {
        for x in x0..x1 {
            put_pixel(fb, x, y, color);
        }
    }
}

/// Draw a thin line between (x0,y0) and (x1,y1) using Bresenham.
fn draw_line(fb: &mut Raster, x0: i32, y0: i32, x1: i32, y1: i32, color: u32) {
    let (mut x0, mut y0) = (x0, y0);
    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    loop {
        put_pixel(fb, x0, y0, color);
        if x0 == x1 && y0 == y1 { break; }
        let e2 = 2 * err;
        if e2 >= dy { err += dy; x0 += sx; }
        if e2 <= dx { err += dx; y0 += sy; }
    }
}

/// One-pixel outline just inside `r`.
pub fn stroke_rect(fb: &mut Raster, r: Rect, color: u32) {
    let (x0, y0) = (r.x.round() as i32, r.y.round() as i32);
    let (x1, y1) = ((r.x + r.width).round() as i32 - 1, (r.y + r.height).round() as i32 - 1);
    draw_line(fb, x0, y0, x1, y0, color);
    draw_line(fb, x1, y0, x1, y1, color);
    draw_line(fb, x1, y1, x0, y1, color);
    draw_line(fb, x0, y1, x0, y0, color);
}

/// Darken the whole frame, like the overlay behind a modal.
pub fn shade(fb: &mut Raster, alpha: u8) {
    let veil = Rgba { r: 0, g: 0, b: 0, a: alpha };
    for y in 0..fb.height as i32 {
        for x in 0..fb.width as i32 {
            blend_pixel(fb, x, y, veil);
        }
    }
}

/// Scale `src` (nearest neighbour) into `dst` on the frame, respecting alpha.
pub fn blit_raster(fb: &mut Raster, src: &Raster, dst: Rect) {
    if src.width == 0 || src.height == 0 || dst.width < 1.0 || dst.height < 1.0 {
        return;
    }
    let (x0, y0) = (dst.x.round() as i32, dst.y.round() as i32);
    let (w, h) = (dst.width.round() as usize, dst.height.round() as usize);
    for dy in 0..h {
        let sy = (dy * src.height / h).min(src.height - 1);
        for dx in 0..w {
            let sx = (dx * src.width / w).min(src.width - 1);
            let px = Rgba::unpack(src.pixels[sy * src.width + sx]);
            blend_pixel(fb, x0 + dx as i32, y0 + dy as i32, px);
        }
    }
}

/// Largest rect with `src`'s aspect ratio that fits in `bounds`, centred.
pub fn fit_within(src_w: usize, src_h: usize, bounds: Rect) -> Rect {
    if src_w == 0 || src_h == 0 {
        return bounds;
    }
    let scale = (bounds.width / src_w as f32).min(bounds.height / src_h as f32);
    let (w, h) = (src_w as f32 * scale, src_h as f32 * scale);
    Rect {
        x: bounds.x + (bounds.width - w) / 2.0,
        y: bounds.y + (bounds.height - h) / 2.0,
        width: w,
        height: h,
    }
}

/* ---------- 5x7 bitmap font (digits, A-Z, a little punctuation) ---------- */

/// Return a 5x7 glyph bitmap. Lowercase letters use the uppercase glyphs.
/// Each u8 is a row; the low 5 bits are the pixels (bit 4 = leftmost).
fn glyph5x7(ch: char) -> Option<[u8; 7]> {
    macro_rules! g { ($a:expr,$b:expr,$c:expr,$d:expr,$e:expr,$f:expr,$g:expr) => {
        Some([$a,$b,$c,$d,$e,$f,$g])
    }; }

    match ch.to_ascii_uppercase() {
        '0' => g!(0b01110,0b10001,0b10011,0b10101,0b11001,0b10001,0b01110),
        '1' => g!(0b00100,0b01100,0b00100,0b00100,0b00100,0b00100,0b01110),
        '2' => g!(0b01110,0b10001,0b00001,0b00010,0b00100,0b01000,0b11111),
        '3' => g!(0b11110,0b00001,0b00001,0b01110,0b00001,0b00001,0b11110),
        '4' => g!(0b00010,0b00110,0b01010,0b10010,0b11111,0b00010,0b00010),
        '5' => g!(0b11111,0b10000,0b11110,0b00001,0b00001,0b10001,0b01110),
        '6' => g!(0b00110,0b01000,0b10000,0b11110,0b10001,0b10001,0b01110),
        '7' => g!(0b11111,0b00001,0b00010,0b00100,0b01000,0b01000,0b01000),
        '8' => g!(0b01110,0b10001,0b10001,0b01110,0b10001,0b10001,0b01110),
        '9' => g!(0b01110,0b10001,0b10001,0b01111,0b00001,0b00010,0b01100),

        'A' => g!(0b01110,0b10001,0b10001,0b11111,0b10001,0b10001,0b10001),
        'B' => g!(0b11110,0b10001,0b10001,0b11110,0b10001,0b10001,0b11110),
        'C' => g!(0b01110,0b10001,0b10000,0b10000,0b10000,0b10001,0b01110),
        'D' => g!(0b11100,0b10010,0b10001,0b10001,0b10001,0b10010,0b11100),
        'E' => g!(0b11111,0b10000,0b10000,0b11110,0b10000,0b10000,0b11111),
        'F' => g!(0b11111,0b10000,0b10000,0b11110,0b10000,0b10000,0b10000),
        'G' => g!(0b01110,0b10001,0b10000,0b10111,0b10001,0b10001,0b01111),
        'H' => g!(0b10001,0b10001,0b10001,0b11111,0b10001,0b10001,0b10001),
        'I' => g!(0b01110,0b00100,0b00100,0b00100,0b00100,0b00100,0b01110),
        'J' => g!(0b00111,0b00010,0b00010,0b00010,0b00010,0b10010,0b01100),
        'K' => g!(0b10001,0b10010,0b10100,0b11000,0b10100,0b10010,0b10001),
        'L' => g!(0b10000,0b10000,0b10000,0b10000,0b10000,0b10000,0b11111),
        'M' => g!(0b10001,0b11011,0b10101,0b10101,0b10001,0b10001,0b10001),
        'N' => g!(0b10001,0b10001,0b11001,0b10101,0b10011,0b10001,0b10001),
        'O' => g!(0b01110,0b10001,0b10001,0b10001,0b10001,0b10001,0b01110),
        'P' => g!(0b11110,0b10001,0b10001,0b11110,0b10000,0b10000,0b10000),
        'Q' => g!(0b01110,0b10001,0b10001,0b10001,0b10101,0b10010,0b01101),
        'R' => g!(0b11110,0b10001,0b10001,0b11110,0b10100,0b10010,0b10001),
        'S' => g!(0b01111,0b10000,0b10000,0b01110,0b00001,0b00001,0b11110),
        'T' => g!(0b11111,0b00100,0b00100,0b00100,0b00100,0b00100,0b00100),
        'U' => g!(0b10001,0b10001,0b10001,0b10001,0b10001,0b10001,0b01110),
        'V' => g!(0b10001,0b10001,0b10001,0b10001,0b10001,0b01010,0b00100),
        'W' => g!(0b10001,0b10001,0b10001,0b10101,0b10101,0b10101,0b01010),
        'X' => g!(0b10001,0b10001,0b01010,0b00100,0b01010,0b10001,0b10001),
        'Y' => g!(0b10001,0b10001,0b01010,0b00100,0b00100,0b00100,0b00100),
        'Z' => g!(0b11111,0b00001,0b00010,0b00100,0b01000,0b10000,0b11111),

        ' ' => g!(0b00000,0b00000,0b00000,0b00000,0b00000,0b00000,0b00000),
        '|' => g!(0b00100,0b00100,0b00100,0b00100,0b00100,0b00100,0b00100),
        ':' => g!(0b00000,0b00100,0b00000,0b00000,0b00100,0b00000,0b00000),
        '.' => g!(0b00000,0b00000,0b00000,0b00000,0b00000,0b00100,0b00000),
        ',' => g!(0b00000,0b00000,0b00000,0b00000,0b00000,0b00100,0b01000),
        '-' => g!(0b00000,0b00000,0b00000,0b11111,0b00000,0b00000,0b00000),
        '/' => g!(0b00001,0b00010,0b00010,0b00100,0b01000,0b01000,0b10000),

        _ => None,
    }
}

/// Draw a text string with 5x7 glyphs, each pixel a `scale` x `scale` block.
/// Unknown characters leave a gap.
pub fn draw_text_5x7(fb: &mut Raster, x: i32, y: i32, text: &str, color: u32, scale: i32) {
    let scale = scale.max(1);
    let mut pen_x = x;
    for ch in text.chars() {
        if let Some(rows) = glyph5x7(ch) {
            for (ry, rowbits) in rows.iter().enumerate() {
                for rx in 0..5 {
                    if (rowbits & (1 << (4 - rx))) == 0 {
                        continue;
                    }
                    for sy in 0..scale {
                        for sx in 0..scale {
                            put_pixel(fb, pen_x + rx * scale + sx, y + ry as i32 * scale + sy, color);
                        }
                    }
                }
            }
        }
        pen_x += 6 * scale; // 5 pixels glyph width + 1 pixel spacing
    }
}

/// Width in pixels `draw_text_5x7` will use for `text`.
pub fn text_width(text: &str, scale: i32) -> i32 {
    let n = text.chars().count() as i32;
    if n == 0 { 0 } else { n * 6 * scale.max(1) - scale.max(1) }
}
