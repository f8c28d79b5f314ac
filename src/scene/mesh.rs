use std::f32::consts::PI;

use ash;
use ash::vk;
use bytemuck;
use glam::{vec2, vec3, Vec2, Vec3};

/// Vertex layout of every rigid model in the scene.
/// Rendered in `MainPass`
#[derive(Copy, Clone, Debug)] // , bytemuck::Zeroable, bytemuck::Pod
#[repr(C)]
pub struct MeshVertex {
  /// position in 3d space
  pub position: Vec3,
  /// normalized normal vector for this vertex
  pub normal: Vec3,
  /// uv texture coordinates
  pub uv: Vec2,
}
unsafe impl bytemuck::Zeroable for MeshVertex {}
unsafe impl bytemuck::Pod for MeshVertex {}

impl MeshVertex {
  pub const BINDINGS_DESC: [vk::VertexInputBindingDescription; 1] =
    [vk::VertexInputBindingDescription {
      binding: 0,
      input_rate: vk::VertexInputRate::VERTEX,
      stride: std::mem::size_of::<MeshVertex>() as u32,
    }];

  pub const ATTRIBUTES_DESC: [vk::VertexInputAttributeDescription; 3] = [
    // position
    vk::VertexInputAttributeDescription {
      binding: 0,
      location: 0,
      format: vk::Format::R32G32B32_SFLOAT,
      offset: 0,
    },
    // normal
    vk::VertexInputAttributeDescription {
      binding: 0,
      location: 1,
      format: vk::Format::R32G32B32_SFLOAT,
      // offsetted by 'position' from beginning of structure
      offset: std::mem::size_of::<Vec3>() as u32,
    },
    // uv
    vk::VertexInputAttributeDescription {
      binding: 0,
      location: 2,
      format: vk::Format::R32G32_SFLOAT,
      // offsetted by 'position' and 'normal' from beginning of structure
      offset: 2 * std::mem::size_of::<Vec3>() as u32,
    },
  ];
}

/// Triangle that can grow hair. Normal is shared by all 3 corners.
#[derive(Copy, Clone, Debug)]
pub struct EmitterTriangle {
  pub positions: [Vec3; 3],
  pub normal: Vec3,
}

/// CPU-side indexed triangle mesh
pub struct MeshData {
  pub vertices: Vec<MeshVertex>,
  pub indices: Vec<u32>,
}

impl MeshData {
  /// Sphere centered at origin. `rings` splits it horizontally, `segments` vertically.
  pub fn uv_sphere(radius: f32, rings: u32, segments: u32) -> Self {
    let rings = rings.max(2);
    let segments = segments.max(3);
    let mut vertices = Vec::with_capacity(((rings + 1) * (segments + 1)) as usize);
    let mut indices = Vec::with_capacity((rings * segments * 6) as usize);

    for ring in 0..=rings {
      let v = ring as f32 / rings as f32;
      let theta = v * PI; // 0 at north pole
      for segment in 0..=segments {
        let u = segment as f32 / segments as f32;
        let phi = u * 2.0 * PI;
        let normal = vec3(
          theta.sin() * phi.cos(),
          theta.cos(),
          theta.sin() * phi.sin(),
        );
        vertices.push(MeshVertex {
          position: normal * radius,
          normal,
          uv: vec2(u, v),
        });
      }
    }

    let row = segments + 1;
    for ring in 0..rings {
      for segment in 0..segments {
        let a = ring * row + segment;
        let b = a + row;
        // counter clockwise when looking from outside
        indices.extend_from_slice(&[a, a + 1, b]);
        indices.extend_from_slice(&[a + 1, b + 1, b]);
      }
    }

    Self { vertices, indices }
  }

  pub fn triangle_count(&self) -> usize {
    self.indices.len() / 3
  }

  /// Triangles with positions moved by `offset`, normal taken from the first corner.
  /// Degenerate triangles (at sphere poles) are skipped.
  pub fn emitter_triangles(&self, offset: Vec3) -> Vec<EmitterTriangle> {
    self
      .indices
      .chunks_exact(3)
      .filter_map(|tri| {
        let vert = |i: usize| &self.vertices[tri[i] as usize];
        let positions = [
          vert(0).position + offset,
          vert(1).position + offset,
          vert(2).position + offset,
        ];
        let area2 = (positions[1] - positions[0])
          .cross(positions[2] - positions[0])
          .length();
        if area2 <= 1e-6 {
          return None;
        }
        Some(EmitterTriangle {
          positions,
          normal: vert(0).normal,
        })
      })
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn vertex_layout() {
    assert_eq!(std::mem::size_of::<MeshVertex>(), 32);
    assert_eq!(MeshVertex::ATTRIBUTES_DESC[2].offset, 24);
  }

  #[test]
  fn sphere_vertices_lie_on_surface() {
    let mesh = MeshData::uv_sphere(2.0, 8, 12);
    assert_eq!(mesh.triangle_count(), 8 * 12 * 2);
    for v in &mesh.vertices {
      assert!((v.position.length() - 2.0).abs() < 1e-4);
      assert!((v.normal.length() - 1.0).abs() < 1e-4);
    }
    let max_index = *mesh.indices.iter().max().unwrap() as usize;
    assert!(max_index < mesh.vertices.len());
  }

  #[test]
  fn emitter_skips_degenerate_pole_triangles() {
    let mesh = MeshData::uv_sphere(1.0, 4, 6);
    let emitters = mesh.emitter_triangles(Vec3::ZERO);
    // one degenerate triangle per segment at each pole
    assert_eq!(emitters.len(), mesh.triangle_count() - 2 * 6);
  }
}
