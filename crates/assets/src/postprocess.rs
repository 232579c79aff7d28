//! Mesh post-processing applied by importers after parsing.
//!
//! Steps run in a fixed order: normal generation, vertex joining, mesh
//! merging. Normal generation leaves meshes that already carry normals alone.

use crate::import::{ImportFlags, ImportedMesh, ImportedNode, ImportedScene};
use glam::Vec3;
use std::collections::HashMap;
use tracing::debug;

/// Run every step selected by `flags` on `scene`.
pub fn apply(scene: &mut ImportedScene, flags: ImportFlags) {
    for mesh in &mut scene.meshes {
        if flags.contains(ImportFlags::GEN_SMOOTH_NORMALS) {
            generate_smooth_normals(mesh);
        } else if flags.contains(ImportFlags::GEN_NORMALS) {
            generate_flat_normals(mesh);
        }
        if flags.contains(ImportFlags::JOIN_IDENTICAL_VERTICES) {
            join_identical_vertices(mesh);
        }
    }
    if flags.contains(ImportFlags::OPTIMIZE_MESHES) {
        optimize_meshes(scene);
    }
}

fn face_normal(a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    (b - a).cross(c - a)
}

/// Give every triangle its own three vertices carrying the face normal.
pub fn generate_flat_normals(mesh: &mut ImportedMesh) {
    if mesh.normals.is_some() {
        return;
    }
    let corners: Vec<u32> = mesh.triangles.iter().flatten().copied().collect();
    let mut flat = mesh.select(&corners);

    let mut normals = Vec::with_capacity(corners.len());
    for triangle in flat.positions.chunks_exact(3) {
        let [a, b, c] = [triangle[0], triangle[1], triangle[2]].map(Vec3::from);
        let normal = face_normal(a, b, c).normalize_or_zero().to_array();
        normals.extend([normal; 3]);
    }
    flat.normals = Some(normals);
    flat.triangles = (0..corners.len() as u32 / 3)
        .map(|t| [t * 3, t * 3 + 1, t * 3 + 2])
        .collect();
    *mesh = flat;
}

fn position_key(position: [f32; 3]) -> [u32; 3] {
    position.map(f32::to_bits)
}

/// Area-weighted face normals summed over every vertex sharing a position.
pub fn generate_smooth_normals(mesh: &mut ImportedMesh) {
    if mesh.normals.is_some() {
        return;
    }
    let mut sums: HashMap<[u32; 3], Vec3> = HashMap::new();
    for triangle in &mesh.triangles {
        let [a, b, c] = triangle.map(|i| Vec3::from(mesh.positions[i as usize]));
        let normal = face_normal(a, b, c);
        for &i in triangle {
            *sums
                .entry(position_key(mesh.positions[i as usize]))
                .or_default() += normal;
        }
    }
    let normals = mesh
        .positions
        .iter()
        .map(|&p| {
            sums.get(&position_key(p))
                .copied()
                .unwrap_or_default()
                .normalize_or_zero()
                .to_array()
        })
        .collect();
    mesh.normals = Some(normals);
}

/// Collapse vertices whose every channel is bit-identical.
pub fn join_identical_vertices(mesh: &mut ImportedMesh) {
    let count = mesh.vertex_count();
    let mut seen: HashMap<Vec<u32>, u32> = HashMap::with_capacity(count);
    let mut kept: Vec<u32> = Vec::new();
    let mut remap = Vec::with_capacity(count);

    for i in 0..count {
        let next = kept.len() as u32;
        let target = *seen.entry(mesh.vertex_key(i)).or_insert_with(|| {
            kept.push(i as u32);
            next
        });
        remap.push(target);
    }
    if kept.len() == count {
        return;
    }

    let triangles = mesh
        .triangles
        .iter()
        .map(|t| t.map(|i| remap[i as usize]))
        .collect();
    let mut joined = mesh.select(&kept);
    joined.triangles = triangles;
    debug!(before = count, after = joined.vertex_count(), "joined vertices");
    *mesh = joined;
}

fn append(into: &mut ImportedMesh, mesh: &ImportedMesh) {
    fn extend<T: Copy>(into: &mut Option<Vec<T>>, from: &Option<Vec<T>>) {
        if let (Some(into), Some(from)) = (into, from) {
            into.extend_from_slice(from);
        }
    }
    let offset = into.positions.len() as u32;
    into.positions.extend_from_slice(&mesh.positions);
    extend(&mut into.normals, &mesh.normals);
    extend(&mut into.tangents, &mesh.tangents);
    extend(&mut into.bitangents, &mesh.bitangents);
    extend(&mut into.colors, &mesh.colors);
    extend(&mut into.uvs, &mesh.uvs);
    into.triangles
        .extend(mesh.triangles.iter().map(|t| t.map(|i| i + offset)));
}

/// Merge the meshes each node references when they share a material and a
/// channel layout. Meshes without triangles are dropped.
pub fn optimize_meshes(scene: &mut ImportedScene) {
    let source = std::mem::take(&mut scene.meshes);
    let before = source.len();
    optimize_node(&mut scene.root, &source, &mut scene.meshes);
    debug!(before, after = scene.meshes.len(), "optimized meshes");
}

fn optimize_node(node: &mut ImportedNode, source: &[ImportedMesh], out: &mut Vec<ImportedMesh>) {
    let mut groups: Vec<ImportedMesh> = Vec::new();
    for &index in &node.meshes {
        let Some(mesh) = source.get(index) else {
            continue;
        };
        if mesh.triangles.is_empty() {
            continue;
        }
        match groups
            .iter_mut()
            .find(|g| g.material == mesh.material && g.layout() == mesh.layout())
        {
            Some(group) => append(group, mesh),
            None => groups.push(mesh.clone()),
        }
    }
    node.meshes = groups
        .into_iter()
        .map(|mesh| {
            out.push(mesh);
            out.len() - 1
        })
        .collect();

    for child in &mut node.children {
        optimize_node(child, source, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> ImportedMesh {
        ImportedMesh {
            positions: vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 1.0, 0.0],
                [0.0, 1.0, 0.0],
            ],
            triangles: vec![[0, 1, 2], [0, 2, 3]],
            ..ImportedMesh::default()
        }
    }

    #[test]
    fn flat_normals_unshare_corners() {
        let mut mesh = quad();
        generate_flat_normals(&mut mesh);
        assert_eq!(mesh.vertex_count(), 6);
        assert_eq!(mesh.triangles, vec![[0, 1, 2], [3, 4, 5]]);
        let normals = mesh.normals.as_ref().unwrap();
        assert!(normals.iter().all(|n| *n == [0.0, 0.0, 1.0]));
    }

    #[test]
    fn flat_then_join_restores_planar_quad() {
        let mut mesh = quad();
        generate_flat_normals(&mut mesh);
        join_identical_vertices(&mut mesh);
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.index_count(), 6);
        assert_eq!(mesh.first_bad_index(), None);
    }

    #[test]
    fn existing_normals_are_kept() {
        let mut mesh = quad();
        mesh.normals = Some(vec![[1.0, 0.0, 0.0]; 4]);
        generate_flat_normals(&mut mesh);
        generate_smooth_normals(&mut mesh);
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.normals, Some(vec![[1.0, 0.0, 0.0]; 4]));
    }

    #[test]
    fn smooth_normals_average_shared_positions() {
        // Two faces meeting at a right angle along the x axis.
        let mut mesh = ImportedMesh {
            positions: vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [0.0, 0.0, 1.0],
            ],
            triangles: vec![[0, 1, 2], [0, 3, 1]],
            ..ImportedMesh::default()
        };
        generate_smooth_normals(&mut mesh);
        let normals = mesh.normals.unwrap();
        assert_eq!(normals[2], [0.0, 0.0, 1.0]);
        assert_eq!(normals[3], [0.0, 1.0, 0.0]);
        let shared = Vec3::from(normals[0]);
        assert!((shared - Vec3::new(0.0, 1.0, 1.0).normalize()).length() < 1e-6);
    }

    #[test]
    fn join_keeps_distinct_uvs_apart() {
        let mut mesh = quad();
        mesh.positions.push([0.0, 0.0, 0.0]);
        mesh.uvs = Some(vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.5, 0.5]]);
        mesh.triangles.push([4, 1, 2]);
        join_identical_vertices(&mut mesh);
        assert_eq!(mesh.vertex_count(), 5);
    }

    #[test]
    fn optimize_merges_same_material_meshes_of_a_node() {
        let mut other = quad();
        other.material = Some(1);
        let mut scene = ImportedScene {
            root: ImportedNode {
                name: "root".into(),
                meshes: vec![0, 1, 2, 3],
                children: vec![ImportedNode {
                    name: "child".into(),
                    meshes: vec![0],
                    children: Vec::new(),
                }],
            },
            meshes: vec![quad(), quad(), other, ImportedMesh::default()],
            ..ImportedScene::default()
        };

        optimize_meshes(&mut scene);

        assert_eq!(scene.root.meshes, vec![0, 1]);
        assert_eq!(scene.root.children[0].meshes, vec![2]);
        assert_eq!(scene.meshes.len(), 3);
        assert_eq!(scene.meshes[0].vertex_count(), 8);
        assert_eq!(scene.meshes[0].triangles[3], [4, 6, 7]);
        assert_eq!(scene.meshes[1].material, Some(1));
    }

    #[test]
    fn apply_prefers_smooth_normals() {
        let mut scene = ImportedScene {
            root: ImportedNode {
                name: "root".into(),
                meshes: vec![0],
                children: Vec::new(),
            },
            meshes: vec![quad()],
            ..ImportedScene::default()
        };
        apply(
            &mut scene,
            ImportFlags::GEN_NORMALS | ImportFlags::GEN_SMOOTH_NORMALS,
        );
        assert_eq!(scene.meshes[0].vertex_count(), 4);
        assert!(scene.meshes[0].normals.is_some());
    }
}
