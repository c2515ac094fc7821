// Signature capture for fillable forms.
//
// Pads (`SignaturePad`) are bound to named slots on a `Page` and share the
// page's single drawing surface. Saved signatures are PNGs, mirrored into a
// `DurableStore` when the pad has a storage key. `fill` writes form values
// and the signature into a fillable PDF.

pub mod blank;
pub mod brush;
pub mod codec;
pub mod config;
pub mod draw;
pub mod error;
pub mod fill;
pub mod pad;
pub mod page;
pub mod store;
pub mod surface;
pub mod types;

pub use blank::BlankDetector;
pub use codec::SignatureImage;
pub use config::Config;
pub use error::{Error, Result};
pub use pad::{PadState, SignatureOptions, SignaturePad};
pub use page::{Activation, ActivationKey, Page, Preview};
pub use store::{DurableStore, FileStore, MemoryStore};
pub use surface::{PadId, PointerEvent, PointerKind, SurfaceManager};
pub use types::{Point, Raster, Rect, Rgba, Viewport};
