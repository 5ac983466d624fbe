//! Entity tags
//!
//! Every library-owned object (window, stream, file reference) is known by a
//! tag. Tags are handed out in increasing order by the library and are the
//! only way the presentation side refers to an object.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque stable identifier for a library-owned entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(u32);

impl Tag {
    /// Wrap a raw tag value
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw value, as exchanged with the interpreter's dispatch layer
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic tag source
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagCounter {
    last: u32,
}

impl TagCounter {
    /// Hand out the next unused tag
    pub fn next(&mut self) -> Tag {
        self.last += 1;
        Tag(self.last)
    }

    /// The most recently issued tag value (0 if none)
    pub fn last(&self) -> u32 {
        self.last
    }

    /// Make sure future tags are greater than `tag`
    pub fn observe(&mut self, tag: Tag) {
        self.last = self.last.max(tag.0);
    }

    /// Start over from 1
    pub fn reset(&mut self) {
        self.last = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_is_monotonic() {
        let mut counter = TagCounter::default();
        let a = counter.next();
        let b = counter.next();
        assert!(b > a);
        assert_eq!(a.get(), 1);
    }

    #[test]
    fn test_counter_observe_and_reset() {
        let mut counter = TagCounter::default();
        counter.observe(Tag::new(40));
        assert_eq!(counter.next().get(), 41);

        counter.reset();
        assert_eq!(counter.next().get(), 1);
    }

    #[test]
    fn test_tag_serializes_as_number() {
        assert_eq!(serde_json::to_string(&Tag::new(12)).unwrap(), "12");
    }
}
