//! Procedural meshes used when no model file is available.

use crate::mesh::{Mesh, Vertex};

/// Axis-aligned cube centred on the origin with edge length `size`.
///
/// Each face has its own four vertices so normals stay flat. Winding is
/// counter-clockwise seen from outside.
pub fn cube(size: f32) -> Mesh {
    let p = size * 0.5;
    #[rustfmt::skip]
    let faces: [([f32; 3], [[f32; 3]; 4]); 6] = [
        ([0.0, 0.0, 1.0],  [[-p, -p,  p], [ p, -p,  p], [ p,  p,  p], [-p,  p,  p]]),
        ([0.0, 0.0, -1.0], [[ p, -p, -p], [-p, -p, -p], [-p,  p, -p], [ p,  p, -p]]),
        ([1.0, 0.0, 0.0],  [[ p, -p,  p], [ p, -p, -p], [ p,  p, -p], [ p,  p,  p]]),
        ([-1.0, 0.0, 0.0], [[-p, -p, -p], [-p, -p,  p], [-p,  p,  p], [-p,  p, -p]]),
        ([0.0, 1.0, 0.0],  [[-p,  p,  p], [ p,  p,  p], [ p,  p, -p], [-p,  p, -p]]),
        ([0.0, -1.0, 0.0], [[-p, -p, -p], [ p, -p, -p], [ p, -p,  p], [-p, -p,  p]]),
    ];
    const UVS: [[f32; 2]; 4] = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];

    let mut builder = Mesh::builder("cube");
    for (normal, corners) in faces {
        let base = builder.vertex_count() as u32;
        for (corner, uv) in corners.into_iter().zip(UVS) {
            builder = builder.vertex(Vertex::new(corner, normal, uv));
        }
        builder = builder
            .face(&[base, base + 1, base + 2])
            .face(&[base + 2, base + 3, base]);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn cube_counts() {
        let mesh = cube(1.0);
        assert_eq!(mesh.vertex_count(), 24);
        assert_eq!(mesh.index_count(), 36);
        assert!(mesh.indices().iter().all(|&i| (i as usize) < 24));
    }

    #[test]
    fn cube_winding_matches_normals() {
        let mesh = cube(2.0);
        let v = mesh.vertices();
        for tri in mesh.indices().chunks(3) {
            let a = Vec3::from(v[tri[0] as usize].position);
            let b = Vec3::from(v[tri[1] as usize].position);
            let c = Vec3::from(v[tri[2] as usize].position);
            let n = Vec3::from(v[tri[0] as usize].normal);
            assert!((b - a).cross(c - a).dot(n) > 0.0);
        }
    }

    #[test]
    fn cube_extent() {
        let mesh = cube(3.0);
        let max = mesh
            .vertices()
            .iter()
            .flat_map(|v| v.position)
            .fold(f32::MIN, f32::max);
        assert_eq!(max, 1.5);
    }
}
