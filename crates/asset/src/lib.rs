//! Asset loading: scene import (OBJ/MTL), texture decoding, and the
//! model/mesh representation handed to the renderer.

pub mod error;
pub mod import;
pub mod mesh;
pub mod model;
pub mod mtl;
pub mod obj;
pub mod postprocess;
pub mod scene;
pub mod texture;

pub use error::{ImportError, ImportResult};
pub use mesh::{Bounds, DrawPlan, Mesh, SamplerBinding, Texture, TextureKind, Vertex};
pub use model::{ImportOptions, Model};
pub use postprocess::PostProcess;
pub use texture::{TextureData, TextureUploader};
