/// Frame without payload (gaps, end-of-stream markers)

use crate::frame::{Frame, FrameVisitor};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmptyFrame {
    tag: i32,
}

impl EmptyFrame {
    pub fn new(tag: i32) -> Self {
        Self { tag }
    }
}

impl Frame for EmptyFrame {
    fn tag(&self) -> i32 {
        self.tag
    }

    fn accept(&mut self, visitor: &mut dyn FrameVisitor) {
        visitor.begin(&*self);
        visitor.end();
    }
}
