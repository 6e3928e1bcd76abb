/// Frame capability trait and frame visitor
///
/// Pipeline stages implement [`FrameVisitor`] and never depend on a concrete
/// frame type. A frame drives the visitor through `begin`, zero or more
/// `visit` calls, then `end`, synchronously on the calling thread.

use crate::frame::WriteFrame;

/// Capability shared by every frame variant
pub trait Frame: Send {
    /// Opaque correlation tag set by the producer
    fn tag(&self) -> i32;

    /// Expose this frame to `visitor`
    fn accept(&mut self, visitor: &mut dyn FrameVisitor);
}

/// Processing stage walking over frames
pub trait FrameVisitor {
    /// Called first with the frame being accepted
    fn begin(&mut self, frame: &dyn Frame);

    /// Called for every writable frame, which may be written or committed here
    fn visit(&mut self, frame: &mut WriteFrame);

    /// Called last, paired with `begin`
    fn end(&mut self);
}
