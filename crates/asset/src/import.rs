//! Importer seam: anything that can turn a file into a [`Scene`].

use std::path::Path;

use crate::{
    error::{ImportError, ImportResult},
    obj,
    postprocess::PostProcess,
    scene::Scene,
};

pub trait Importer {
    fn read_file(&self, path: &Path, steps: PostProcess) -> ImportResult<Scene>;
}

/// Wavefront OBJ (+ MTL) importer.
#[derive(Clone, Copy, Debug, Default)]
pub struct ObjImporter;

impl Importer for ObjImporter {
    fn read_file(&self, path: &Path, steps: PostProcess) -> ImportResult<Scene> {
        obj::load_obj_from_path(path, steps)
    }
}

/// Importer for `path`, chosen by file extension.
pub fn importer_for(path: &Path) -> ImportResult<Box<dyn Importer>> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "obj" => Ok(Box::new(ObjImporter)),
        other => Err(ImportError::UnsupportedFormat(if other.is_empty() {
            path.display().to_string()
        } else {
            format!(".{other}")
        })),
    }
}

/// Import `path` with the importer matching its extension.
pub fn import_file(path: impl AsRef<Path>, steps: PostProcess) -> ImportResult<Scene> {
    let path = path.as_ref();
    importer_for(path)?.read_file(path, steps)
}
