mod descriptors;
mod frame_state;
mod hair_pipeline;
mod pass_exec_context;

pub use self::descriptors::*;
pub use self::frame_state::*;
pub use self::hair_pipeline::*;
pub use self::pass_exec_context::*;
