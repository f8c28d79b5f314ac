use glam::{vec3, EulerRot, Mat4, Quat, Vec3};
use lazy_static::lazy_static;

/// Ellipsoid collision volume: unit sphere under an affine transform.
/// All three matrices are always updated together.
#[derive(Copy, Clone, Debug)] // , bytemuck::Zeroable, bytemuck::Pod
#[repr(C)]
pub struct Collider {
  pub transform: Mat4,
  /// Used for point-inside tests
  pub inv: Mat4,
  /// Used to transform normals
  pub inv_trans: Mat4,
}
unsafe impl bytemuck::Zeroable for Collider {}
unsafe impl bytemuck::Pod for Collider {}

impl Collider {
  /// `T * Rz * Ry * Rx * S`, rotation in degrees
  pub fn new(translation: Vec3, rotation_dgr: Vec3, scale: Vec3) -> Self {
    let rotation = Quat::from_euler(
      EulerRot::ZYX,
      rotation_dgr.z.to_radians(),
      rotation_dgr.y.to_radians(),
      rotation_dgr.x.to_radians(),
    );
    Self::from_transform(Mat4::from_scale_rotation_translation(
      scale,
      rotation,
      translation,
    ))
  }

  pub fn from_transform(transform: Mat4) -> Self {
    let inv = transform.inverse();
    Self {
      transform,
      inv,
      inv_trans: inv.transpose(),
    }
  }

  pub fn center(&self) -> Vec3 {
    self.transform.w_axis.truncate()
  }

  /// Move in world space. Rotation and scale are kept.
  pub fn translate(&mut self, delta: Vec3) {
    *self = Self::from_transform(Mat4::from_translation(delta) * self.transform);
  }

  pub fn contains_point(&self, p: Vec3) -> bool {
    self.inv.transform_point3(p).length() <= 1.0
  }
}

pub struct ColliderPreset {
  pub name: &'static str,
  pub translation: Vec3,
  pub rotation_dgr: Vec3,
  pub scale: Vec3,
}

impl ColliderPreset {
  pub fn create(&self) -> Collider {
    Collider::new(self.translation, self.rotation_dgr, self.scale)
  }
}

/// Index of the sphere that can be moved around with the keyboard
pub const TEST_SPHERE_COLLIDER: usize = 0;

lazy_static! {
  /// Rough approximation of a head and upper body
  pub static ref COLLIDER_PRESETS: Vec<ColliderPreset> = vec![
    ColliderPreset {
      name: "test_sphere",
      translation: vec3(2.0, 0.0, 1.0),
      rotation_dgr: Vec3::ZERO,
      scale: Vec3::ONE,
    },
    ColliderPreset {
      name: "head",
      translation: vec3(0.0, 2.64, 0.08),
      rotation_dgr: vec3(-38.270, 0.0, 0.0),
      scale: vec3(0.817, 1.158, 1.01),
    },
    ColliderPreset {
      name: "neck",
      translation: vec3(0.0, 1.35, -0.288),
      rotation_dgr: vec3(18.301, 0.0, 0.0),
      scale: vec3(0.457, 1.0, 0.538),
    },
    ColliderPreset {
      name: "bust",
      translation: vec3(0.0, -0.380, -0.116),
      rotation_dgr: vec3(-17.260, 0.0, 0.0),
      scale: vec3(1.078, 1.683, 0.974),
    },
    ColliderPreset {
      name: "shoulder_r",
      translation: vec3(-0.698, 0.087, -0.36),
      rotation_dgr: vec3(-20.254, 13.144, 34.5),
      scale: vec3(0.721, 1.0, 0.724),
    },
    ColliderPreset {
      name: "shoulder_l",
      translation: vec3(0.698, 0.087, -0.36),
      rotation_dgr: vec3(-20.254, 13.144, -34.5),
      scale: vec3(0.721, 1.0, 0.724),
    },
  ];
}

#[cfg(test)]
mod tests {
  use super::*;

  fn mat_eq(a: &Mat4, b: &Mat4) -> bool {
    a.abs_diff_eq(*b, 1e-4)
  }

  #[test]
  fn cached_matrices_are_consistent() {
    for preset in COLLIDER_PRESETS.iter() {
      let c = preset.create();
      assert!(mat_eq(&c.transform.inverse(), &c.inv), "{}", preset.name);
      assert!(mat_eq(&c.inv.transpose(), &c.inv_trans), "{}", preset.name);
    }
  }

  #[test]
  fn rotation_order_is_z_y_x() {
    let c = Collider::new(Vec3::ZERO, vec3(90.0, 90.0, 0.0), Vec3::ONE);
    let expected = Mat4::from_rotation_y(90f32.to_radians()) * Mat4::from_rotation_x(90f32.to_radians());
    assert!(mat_eq(&c.transform, &expected));
  }

  #[test]
  fn translate_moves_by_exact_delta() {
    let delta = vec3(0.5, -1.0, 2.0);
    let mut a = COLLIDER_PRESETS[1].create();
    let mut b = COLLIDER_PRESETS[4].create();
    let (a_before, b_before) = (a, b);

    a.translate(delta);
    b.translate(delta);

    for (after, before) in [(a, a_before), (b, b_before)] {
      assert!(after.center().abs_diff_eq(before.center() + delta, 1e-5));
      // rotation+scale part unchanged
      assert!(after.transform.x_axis.abs_diff_eq(before.transform.x_axis, 1e-6));
      assert!(after.transform.y_axis.abs_diff_eq(before.transform.y_axis, 1e-6));
      assert!(after.transform.z_axis.abs_diff_eq(before.transform.z_axis, 1e-6));
      assert!(mat_eq(&after.transform.inverse(), &after.inv));
      assert!(mat_eq(&after.inv.transpose(), &after.inv_trans));
    }
  }

  #[test]
  fn contains_point_respects_scale() {
    let c = Collider::new(vec3(1.0, 0.0, 0.0), Vec3::ZERO, vec3(2.0, 0.5, 1.0));
    assert!(c.contains_point(vec3(2.9, 0.0, 0.0)));
    assert!(!c.contains_point(vec3(1.0, 0.6, 0.0)));
    assert!(c.contains_point(vec3(1.0, 0.4, 0.0)));
  }
}
