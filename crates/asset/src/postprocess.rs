//! Post-processing steps applied to imported meshes.

use std::collections::HashMap;

use bitflags::bitflags;
use glam::{Vec2, Vec3};

use crate::scene::{Face, SceneMesh};

bitflags! {
    /// Steps an importer runs over every mesh before handing the scene out.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct PostProcess: u32 {
        /// Split polygons into triangle fans.
        const TRIANGULATE = 1 << 0;
        /// Generate smoothed vertex normals for meshes that have none.
        const GEN_SMOOTH_NORMALS = 1 << 1;
        /// Flip the v texture coordinate (top-left image origin).
        const FLIP_UVS = 1 << 2;
        /// Compute tangents and bitangents from positions and uvs.
        const CALC_TANGENT_SPACE = 1 << 3;
    }
}

impl Default for PostProcess {
    fn default() -> Self {
        Self::TRIANGULATE | Self::GEN_SMOOTH_NORMALS | Self::FLIP_UVS | Self::CALC_TANGENT_SPACE
    }
}

/// Run the requested steps in a fixed order.
pub fn apply(mesh: &mut SceneMesh, steps: PostProcess) {
    if steps.contains(PostProcess::TRIANGULATE) {
        triangulate(mesh);
    }
    if steps.contains(PostProcess::FLIP_UVS) {
        flip_uvs(mesh);
    }
    if steps.contains(PostProcess::GEN_SMOOTH_NORMALS) {
        gen_smooth_normals(mesh);
    }
    if steps.contains(PostProcess::CALC_TANGENT_SPACE) {
        calc_tangent_space(mesh);
    }
}

pub fn triangulate(mesh: &mut SceneMesh) {
    if mesh.faces.iter().all(|f| f.indices.len() <= 3) {
        return;
    }
    let mut out = Vec::with_capacity(mesh.faces.len());
    for face in mesh.faces.drain(..) {
        let idx = &face.indices;
        if idx.len() <= 3 {
            out.push(face);
            continue;
        }
        for tri in 1..(idx.len() - 1) {
            out.push(Face::new(vec![idx[0], idx[tri], idx[tri + 1]]));
        }
    }
    mesh.faces = out;
}

pub fn flip_uvs(mesh: &mut SceneMesh) {
    if let Some(uvs) = mesh.tex_coords.as_mut() {
        for uv in uvs.iter_mut() {
            uv[1] = 1.0 - uv[1];
        }
    }
}

/// Area-weighted normals, averaged across vertices sharing a position.
pub fn gen_smooth_normals(mesh: &mut SceneMesh) {
    if mesh.normals.is_some() {
        return;
    }

    let mut accum = vec![Vec3::ZERO; mesh.vertex_count()];
    for face in mesh.faces.iter().filter(|f| f.indices.len() >= 3) {
        let [a, b, c] = [face.indices[0], face.indices[1], face.indices[2]].map(|i| i as usize);
        let (Some(pa), Some(pb), Some(pc)) = (
            mesh.positions.get(a),
            mesh.positions.get(b),
            mesh.positions.get(c),
        ) else {
            continue;
        };
        let (pa, pb, pc) = (Vec3::from(*pa), Vec3::from(*pb), Vec3::from(*pc));
        let n = (pb - pa).cross(pc - pa);
        for &i in &face.indices {
            if let Some(slot) = accum.get_mut(i as usize) {
                *slot += n;
            }
        }
    }

    // Vertices split by differing uvs still share one smooth normal.
    let mut by_position: HashMap<[u32; 3], Vec3> = HashMap::new();
    for (pos, n) in mesh.positions.iter().zip(&accum) {
        *by_position.entry(position_key(pos)).or_insert(Vec3::ZERO) += *n;
    }

    let normals = mesh
        .positions
        .iter()
        .map(|pos| {
            by_position[&position_key(pos)]
                .try_normalize()
                .unwrap_or(Vec3::Z)
                .to_array()
        })
        .collect();
    mesh.normals = Some(normals);
}

/// Per-vertex tangent frame from triangle uv gradients, orthogonalised
/// against the normal. No-op without uvs or normals.
pub fn calc_tangent_space(mesh: &mut SceneMesh) {
    let (Some(uvs), Some(normals)) = (mesh.tex_coords.as_ref(), mesh.normals.as_ref()) else {
        return;
    };

    let count = mesh.positions.len();
    let mut tan = vec![Vec3::ZERO; count];
    let mut bitan = vec![Vec3::ZERO; count];

    for face in mesh.faces.iter().filter(|f| f.indices.len() == 3) {
        let [a, b, c] = [face.indices[0], face.indices[1], face.indices[2]].map(|i| i as usize);
        if a >= count || b >= count || c >= count {
            continue;
        }
        let (p0, p1, p2) = (
            Vec3::from(mesh.positions[a]),
            Vec3::from(mesh.positions[b]),
            Vec3::from(mesh.positions[c]),
        );
        let (t0, t1, t2) = (Vec2::from(uvs[a]), Vec2::from(uvs[b]), Vec2::from(uvs[c]));
        let (e1, e2) = (p1 - p0, p2 - p0);
        let (d1, d2) = (t1 - t0, t2 - t0);
        let det = d1.x * d2.y - d2.x * d1.y;
        if det.abs() < f32::EPSILON {
            continue;
        }
        let r = 1.0 / det;
        let t = (e1 * d2.y - e2 * d1.y) * r;
        let bt = (e2 * d1.x - e1 * d2.x) * r;
        for i in [a, b, c] {
            tan[i] += t;
            bitan[i] += bt;
        }
    }

    let mut tangents = Vec::with_capacity(count);
    let mut bitangents = Vec::with_capacity(count);
    for i in 0..count {
        let n = Vec3::from(normals[i]).try_normalize().unwrap_or(Vec3::Z);
        let t = (tan[i] - n * n.dot(tan[i]))
            .try_normalize()
            .unwrap_or_else(|| n.any_orthonormal_vector());
        let mut b = n.cross(t);
        if b.dot(bitan[i]) < 0.0 {
            b = -b;
        }
        tangents.push(t.to_array());
        bitangents.push(b.to_array());
    }
    mesh.tangents = Some(tangents);
    mesh.bitangents = Some(bitangents);
}

fn position_key(p: &[f32; 3]) -> [u32; 3] {
    p.map(f32::to_bits)
}
