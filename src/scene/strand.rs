use ash::vk;
use glam::{Vec3, Vec4};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::mesh::EmitterTriangle;

/// Control points per strand. Shaders are compiled against the same value.
pub const NUM_CURVE_POINTS: usize = 10;

/// Single hair strand as seen by both the simulation (SSBO element)
/// and the hair pipelines (one vertex = one strand).
///
/// `w` of every vector is unused and kept for std430 alignment.
#[derive(Copy, Clone, Debug)] // , bytemuck::Zeroable, bytemuck::Pod
#[repr(C)]
pub struct Strand {
  pub curve_points: [Vec4; NUM_CURVE_POINTS],
  pub curve_vels: [Vec4; NUM_CURVE_POINTS],
  pub correction_vecs: [Vec4; NUM_CURVE_POINTS],
}
unsafe impl bytemuck::Zeroable for Strand {}
unsafe impl bytemuck::Pod for Strand {}

impl Strand {
  pub const BINDINGS_DESC: [vk::VertexInputBindingDescription; 1] =
    [vk::VertexInputBindingDescription {
      binding: 0,
      input_rate: vk::VertexInputRate::VERTEX,
      stride: std::mem::size_of::<Strand>() as u32,
    }];

  /// `3 * NUM_CURVE_POINTS` vec4 attributes in declaration order:
  /// locations `[0, N)` are curve points, then velocities, then corrections.
  pub fn attributes_desc() -> Vec<vk::VertexInputAttributeDescription> {
    let vec4_size = std::mem::size_of::<Vec4>() as u32;
    (0..(3 * NUM_CURVE_POINTS as u32))
      .map(|i| vk::VertexInputAttributeDescription {
        binding: 0,
        location: i,
        format: vk::Format::R32G32B32A32_SFLOAT,
        offset: i * vec4_size,
      })
      .collect()
  }

  /// Straight strand starting at `root`. Control points are evenly spaced
  /// along `direction` so that the whole strand has `length` times its magnitude.
  pub fn grow(root: Vec3, direction: Vec3, length: f32, velocity: Vec3) -> Self {
    let step = direction * (length / (NUM_CURVE_POINTS - 1) as f32);
    let mut curve_points = [Vec4::ZERO; NUM_CURVE_POINTS];
    for (i, point) in curve_points.iter_mut().enumerate() {
      *point = (root + step * i as f32).extend(1.0);
    }

    Self {
      curve_points,
      curve_vels: [velocity.extend(0.0); NUM_CURVE_POINTS],
      correction_vecs: [Vec4::ZERO; NUM_CURVE_POINTS],
    }
  }

  pub fn root(&self) -> Vec3 {
    self.curve_points[0].truncate()
  }

  pub fn tip(&self) -> Vec3 {
    self.curve_points[NUM_CURVE_POINTS - 1].truncate()
  }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RootPoint {
  pub position: Vec3,
  pub normal: Vec3,
}

/// Uniformly pick `count` points on randomly chosen `triangles`.
/// Same `seed` always gives the same points.
pub fn sample_root_points(triangles: &[EmitterTriangle], count: usize, seed: u64) -> Vec<RootPoint> {
  if triangles.is_empty() {
    return Vec::new();
  }
  let mut rng = StdRng::seed_from_u64(seed);

  (0..count)
    .map(|_| {
      let tri = &triangles[rng.gen_range(0..triangles.len())];
      let mut u = rng.gen::<f32>();
      let mut v = rng.gen::<f32>();
      // fold back into the triangle
      if u + v >= 1.0 {
        u = 1.0 - u;
        v = 1.0 - v;
      }
      let [p1, p2, p3] = tri.positions;
      RootPoint {
        position: p1 * u + p2 * v + p3 * (1.0 - u - v),
        normal: tri.normal,
      }
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use glam::vec3;

  fn flat_triangle() -> EmitterTriangle {
    EmitterTriangle {
      positions: [
        vec3(0.0, 0.0, 0.0),
        vec3(1.0, 0.0, 0.0),
        vec3(0.0, 0.0, 1.0),
      ],
      normal: Vec3::Y,
    }
  }

  #[test]
  fn strand_layout_matches_vertex_attributes() {
    assert_eq!(std::mem::size_of::<Strand>(), 3 * NUM_CURVE_POINTS * 16);
    let attrs = Strand::attributes_desc();
    assert_eq!(attrs.len(), 30);
    assert_eq!(attrs[29].location, 29);
    assert_eq!(attrs[29].offset, 29 * 16);
    assert_eq!(attrs[NUM_CURVE_POINTS].offset, 160); // first velocity
    assert_eq!(
      Strand::BINDINGS_DESC[0].stride as usize,
      std::mem::size_of::<Strand>()
    );
  }

  #[test]
  fn grown_strand_spans_length() {
    let strand = Strand::grow(vec3(1.0, 2.0, 3.0), Vec3::Y, 2.5, vec3(0.0, 0.0, -1.0));
    assert!(strand.root().abs_diff_eq(vec3(1.0, 2.0, 3.0), 1e-6));
    assert!(strand.tip().abs_diff_eq(vec3(1.0, 4.5, 3.0), 1e-5));
    assert!(strand
      .curve_vels
      .iter()
      .all(|v| *v == Vec4::new(0.0, 0.0, -1.0, 0.0)));
    assert!(strand.correction_vecs.iter().all(|c| *c == Vec4::ZERO));
  }

  #[test]
  fn roots_are_deterministic_and_inside_triangle() {
    let tris = [flat_triangle()];
    let a = sample_root_points(&tris, 100, 8);
    let b = sample_root_points(&tris, 100, 8);
    assert_eq!(a, b);
    for p in &a {
      let pos = p.position;
      assert!(pos.x >= -1e-6 && pos.z >= -1e-6 && pos.x + pos.z <= 1.0 + 1e-5);
      assert_eq!(pos.y, 0.0);
      assert_eq!(p.normal, Vec3::Y);
    }
  }

  #[test]
  fn no_triangles_no_roots() {
    assert!(sample_root_points(&[], 10, 8).is_empty());
  }
}
