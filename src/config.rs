// Demo/page configuration, read from TOML. Every field has a default, so an
// empty file (or no file) gives two persisted pads on an 800x600 page.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::blank::BlankDetector;
use crate::fill::SignaturePlacement;
use crate::pad::SignatureOptions;
use crate::types::Viewport;

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub width: f32,
    pub height: f32,
    pub device_pixel_ratio: f32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self { width: 800.0, height: 600.0, device_pixel_ratio: 1.0 }
    }
}

impl From<&ViewportConfig> for Viewport {
    fn from(v: &ViewportConfig) -> Self {
        Viewport::new(v.width, v.height, v.device_pixel_ratio)
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct PadConfig {
    pub slot: String,
    #[serde(default)]
    pub options: SignatureOptions,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub viewport: ViewportConfig,
    /// JSON file backing the durable store; in-memory when unset.
    pub store: Option<PathBuf>,
    pub pads: Vec<PadConfig>,
    pub blank: BlankDetector,
    pub placement: SignaturePlacement,
    /// Fillable PDF the signature is written into.
    pub template: Option<PathBuf>,
    /// Form values (JSON, see `EnrolmentForm`).
    pub form: Option<PathBuf>,
    pub output: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            viewport: ViewportConfig::default(),
            store: None,
            pads: vec![
                PadConfig { slot: "sig1".into(), options: SignatureOptions::with_storage_key("sig1") },
                PadConfig { slot: "sig2".into(), options: SignatureOptions::with_storage_key("sig2") },
            ],
            blank: BlankDetector::default(),
            placement: SignaturePlacement::default(),
            template: None,
            form: None,
            output: PathBuf::from("Filled_Credit_Card_Form.pdf"),
        }
    }
}

impl Config {
    pub fn from_toml(text: &str) -> crate::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> crate::Result<Self> {
        Self::from_toml(&fs::read_to_string(path)?)
    }
}
