//! MTL material library parser (texture maps only).

use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::Path,
};

use anyhow::{Context, Result, anyhow};

use crate::scene::{Material, TextureSlot};

pub fn load_mtl_from_path(path: impl AsRef<Path>) -> Result<Vec<Material>> {
    let file = File::open(&path)
        .with_context(|| format!("Failed to open MTL file: {}", path.as_ref().display()))?;
    parse_mtl(BufReader::new(file))
}

pub fn load_mtl_from_str(contents: &str) -> Result<Vec<Material>> {
    parse_mtl(io::Cursor::new(contents))
}

fn parse_mtl<R: BufRead>(reader: R) -> Result<Vec<Material>> {
    let mut materials: Vec<Material> = Vec::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {}", line_no + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let mut parts = trimmed.split_whitespace();
        let Some(tag) = parts.next() else {
            continue;
        };

        if tag == "newmtl" {
            let name = parts
                .next()
                .ok_or_else(|| anyhow!("newmtl without a name on line {}", line_no + 1))?;
            materials.push(Material::named(name));
            continue;
        }

        let Some(slot) = map_slot(tag) else {
            // Colours, exponents, illumination models: not needed here.
            continue;
        };
        let tokens: Vec<&str> = parts.collect();
        let Some(file) = map_file_name(&tokens) else {
            log::warn!("{} without a file name on line {}, skipping", tag, line_no + 1);
            continue;
        };
        let Some(material) = materials.last_mut() else {
            log::warn!("{} before any newmtl on line {}, skipping", tag, line_no + 1);
            continue;
        };
        material.textures_mut(slot).push(file);
    }

    Ok(materials)
}

/// Number of values taken by a texture map option, as (min, max).
fn option_arity(option: &str) -> Option<(usize, usize)> {
    match option {
        "-blendu" | "-blendv" | "-bm" | "-boost" | "-cc" | "-clamp" | "-imfchan"
        | "-texres" | "-type" => Some((1, 1)),
        "-mm" => Some((2, 2)),
        "-o" | "-s" | "-t" => Some((1, 3)),
        _ => None,
    }
}

/// Strip leading map options and join what is left, so file names keep
/// their interior spaces.
fn map_file_name(tokens: &[&str]) -> Option<String> {
    let mut rest = tokens;
    while let [option, tail @ ..] = rest {
        let Some((min, max)) = option_arity(option) else {
            break;
        };
        let numeric = tail
            .iter()
            .skip(min)
            .take(max - min)
            .take_while(|t| t.parse::<f32>().is_ok())
            .count();
        rest = tail.get(min + numeric..).unwrap_or_default();
    }
    (!rest.is_empty()).then(|| rest.join(" "))
}

fn map_slot(tag: &str) -> Option<TextureSlot> {
    match tag {
        "map_Kd" => Some(TextureSlot::Diffuse),
        "map_Ks" => Some(TextureSlot::Specular),
        "map_Ka" => Some(TextureSlot::Ambient),
        "map_Bump" | "map_bump" | "bump" | "norm" => Some(TextureSlot::Height),
        _ => None,
    }
}
