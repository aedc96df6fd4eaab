//! Follow-the-tail scrolling for the message list.
//!
//! State changes that should reveal the newest message call
//! [`ScrollFollow::request_bottom`]. The renderer calls
//! [`ScrollFollow::resolve`] once per frame, after it knows the content
//! height, and gets back the offset to draw with.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollFollow {
    offset: u16,
    follow_bottom: bool,
    pending_bottom: bool,
}

impl ScrollFollow {
    pub fn new() -> Self {
        Self {
            offset: 0,
            follow_bottom: true,
            pending_bottom: true,
        }
    }

    pub fn offset(&self) -> u16 {
        self.offset
    }

    pub fn is_following(&self) -> bool {
        self.follow_bottom
    }

    pub fn has_pending(&self) -> bool {
        self.pending_bottom
    }

    pub fn request_bottom(&mut self) {
        self.pending_bottom = true;
        self.follow_bottom = true;
    }

    /// New conversation on screen: start at the tail.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.offset = self.offset.saturating_sub(lines);
        self.follow_bottom = false;
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.offset = self.offset.saturating_add(lines);
    }

    /// Clamp to the content and apply any pending or follow-mode jump to the
    /// bottom. Scrolling back down to the tail re-enables follow mode.
    pub fn resolve(&mut self, content_lines: u16, view_height: u16) -> u16 {
        let max_offset = content_lines.saturating_sub(view_height);
        if self.pending_bottom || self.follow_bottom {
            self.offset = max_offset;
        } else {
            self.offset = self.offset.min(max_offset);
            if self.offset == max_offset {
                self.follow_bottom = true;
            }
        }
        self.pending_bottom = false;
        self.offset
    }
}

impl Default for ScrollFollow {
    fn default() -> Self {
        Self::new()
    }
}
