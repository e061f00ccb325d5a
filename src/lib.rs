#![forbid(unsafe_code)]

//! Layered image compositor: typed layers drawn by plugins, a fingerprinted
//! computed-value cache, neural background removal, and an undoable editing
//! session over a premultiplied-RGBA8 raster surface.

pub mod cache;
pub mod compositor;
pub mod editor;
pub mod error;
pub mod fingerprint;
pub mod history;
pub mod layer;
pub mod plugins;
pub mod removebg;
pub mod surface;
pub mod text;

pub use cache::{CacheEntry, CacheKey, ComputedCache};
pub use editor::EditorSession;
pub use error::{LaminaError, LaminaResult};
pub use history::History;
pub use layer::{Layer, LayerId, LayerStack};
pub use plugins::{ComputedValue, LayerOptions, PluginKind};
pub use surface::{Bitmap, Color, CompositeMode, Surface};
pub use text::FontCatalog;
