/// Frames and the visitor protocol that processes them

pub mod visitor;
pub mod write_frame;
pub mod empty_frame;
pub mod composite_frame;

pub use visitor::*;
pub use write_frame::*;
pub use empty_frame::*;
pub use composite_frame::*;
