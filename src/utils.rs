use glam::{vec3, Vec3};

/// `std::any::type_name` without the module path, e.g. `ShadowMapPass`
pub fn get_simple_type_name<T>() -> &'static str {
  let full_name = std::any::type_name::<T>();
  let name_no_generics = full_name.split('<').next().unwrap_or(full_name);
  name_no_generics
    .rsplit("::")
    .next()
    .unwrap_or(name_no_generics)
}

/// Convert u8 [0..255) into float
pub fn color_u8_to_float(col_u8: u8) -> f32 {
  (col_u8 as f32) / 255.0
}

/// Convert u8 [0..255) into float vector
pub fn color_hex_to_vec(c0: u8, c1: u8, c2: u8) -> Vec3 {
  vec3(
    color_u8_to_float(c0),
    color_u8_to_float(c1),
    color_u8_to_float(c2),
  )
}

/// Convert spherical->cartesian. Both angles in degrees.
pub fn spherical_to_cartesian_dgr(phi_dgr: f32, theta_dgr: f32, distance: f32) -> Vec3 {
  spherical_to_cartesian_rad(phi_dgr.to_radians(), theta_dgr.to_radians(), distance)
}

/// Convert spherical->cartesian. Both angles in radians.
pub fn spherical_to_cartesian_rad(phi: f32, theta: f32, distance: f32) -> Vec3 {
  vec3(
    f32::cos(phi) * f32::sin(theta) * distance,
    f32::cos(theta) * distance,
    f32::sin(phi) * f32::sin(theta) * distance,
  )
}

/// Number of workgroups needed to cover `item_count` items, one item per invocation.
pub fn group_count(item_count: u32, workgroup_size: u32) -> u32 {
  (item_count + workgroup_size - 1) / workgroup_size
}

pub fn vec3_to_pretty_str(v: Vec3) -> String {
  format!("[{:.2}, {:.2}, {:.2}]", v.x, v.y, v.z)
}

#[cfg(test)]
mod tests {
  use super::*;

  struct ShadowMapPass;
  struct Wrapper<T>(T);

  #[test]
  fn simple_type_name_strips_path() {
    assert_eq!(get_simple_type_name::<ShadowMapPass>(), "ShadowMapPass");
    assert_eq!(get_simple_type_name::<Wrapper<u32>>(), "Wrapper");
  }

  #[test]
  fn group_count_rounds_up() {
    assert_eq!(group_count(0, 32), 0);
    assert_eq!(group_count(1, 32), 1);
    assert_eq!(group_count(32, 32), 1);
    assert_eq!(group_count(33, 32), 2);
    assert_eq!(group_count(1000, 32), 32);
  }

  #[test]
  fn spherical_straight_up() {
    let p = spherical_to_cartesian_dgr(0.0, 0.0, 3.0);
    assert!(p.abs_diff_eq(vec3(0.0, 3.0, 0.0), 1e-5));
  }
}
