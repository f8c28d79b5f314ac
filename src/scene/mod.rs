mod camera;
mod collider;
mod drawable;
mod grid;
mod hair_group;
mod mesh;
mod model;
mod scene;
mod strand;

pub use self::camera::*;
pub use self::collider::*;
pub use self::drawable::*;
pub use self::grid::*;
pub use self::hair_group::*;
pub use self::mesh::*;
pub use self::model::*;
pub use self::scene::*;
pub use self::strand::*;
