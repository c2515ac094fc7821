// One error type for the whole crate.
// Every variant states *where* things went wrong.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("slot not found: {0}")]
    SlotNotFound(String), // The host page has no element registered under this name

    #[error("pad {0} does not hold the drawing surface")]
    SurfaceNotClaimed(u64), // save() called while another pad (or none) owns the surface

    #[error("window init error: {0}")]
    WindowInit(String), // Creating the demo window failed

    #[error("window update error: {0}")]
    WindowUpdate(String), // Pushing the frame to the window failed

    #[error("image codec error: {0}")]
    Image(#[from] image::ImageError), // PNG encode/decode/resample failed

    #[error("malformed data url: {0}")]
    DataUrl(String), // Stored value is not a base64 PNG data URL

    #[error("durable store error: {0}")]
    Store(String), // Store file could not be parsed or written

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error), // Config file is not valid TOML for `Config`

    #[error("form input error: {0}")]
    Form(#[from] serde_json::Error), // Form values file is not valid JSON

    #[error("document error: {0}")]
    Document(#[from] lopdf::Error), // Template PDF could not be loaded or edited

    #[error("document has no form: {0}")]
    NoForm(String), // Template PDF carries no AcroForm

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
