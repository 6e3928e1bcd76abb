/// Ordered group of frames accepted as one unit
///
/// A visitor sees `begin(composite)`, then the full begin/visit/end sequence
/// of every child in insertion order, then the composite's `end`.

use crate::frame::{Frame, FrameVisitor};

pub struct CompositeFrame {
    tag: i32,
    frames: Vec<Box<dyn Frame>>,
}

impl CompositeFrame {
    pub fn new(tag: i32) -> Self {
        Self { tag, frames: Vec::new() }
    }

    pub fn with_frames(tag: i32, frames: Vec<Box<dyn Frame>>) -> Self {
        Self { tag, frames }
    }

    /// Append a child, accepted after the existing ones
    pub fn push(&mut self, frame: Box<dyn Frame>) {
        self.frames.push(frame);
    }

    pub fn frames(&self) -> &[Box<dyn Frame>] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Consume the composite and return its children
    pub fn into_frames(self) -> Vec<Box<dyn Frame>> {
        self.frames
    }
}

impl Frame for CompositeFrame {
    fn tag(&self) -> i32 {
        self.tag
    }

    fn accept(&mut self, visitor: &mut dyn FrameVisitor) {
        visitor.begin(&*self);
        for frame in &mut self.frames {
            frame.accept(visitor);
        }
        visitor.end();
    }
}
