//! Source identifiers and byte ranges.

use std::fmt;

/// A byte index into a logical source.
pub type SourceOffset = u32;

/// The offset used for locations that do not point anywhere.
pub const INVALID_OFFSET: SourceOffset = SourceOffset::MAX;

/// Identifies one input file or stream within a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(pub u32);

impl SourceId {
    /// The id used when no source is known.
    pub const INVALID: SourceId = SourceId(u32::MAX);

    /// Whether this id refers to an actual source.
    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "#{}", self.0)
        } else {
            f.write_str("#?")
        }
    }
}

/// A byte range `[start, end)` within one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    /// The source this range belongs to.
    pub source: SourceId,
    /// Byte offset of the start (inclusive)
    pub start: SourceOffset,
    /// Byte offset of the end (exclusive)
    pub end: SourceOffset,
}

impl SourceLocation {
    /// Create a new location from start and end byte offsets.
    #[inline]
    pub fn new(source: SourceId, start: SourceOffset, end: SourceOffset) -> Self {
        debug_assert!(start <= end);
        Self { source, start, end }
    }

    /// Create an empty location at a position.
    #[inline]
    pub fn empty(source: SourceId, pos: SourceOffset) -> Self {
        Self {
            source,
            start: pos,
            end: pos,
        }
    }

    /// A location that does not point anywhere.
    #[inline]
    pub fn invalid() -> Self {
        Self {
            source: SourceId::INVALID,
            start: INVALID_OFFSET,
            end: INVALID_OFFSET,
        }
    }

    /// Whether both the source and the offsets are valid.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.source.is_valid() && self.start != INVALID_OFFSET && self.end != INVALID_OFFSET
    }

    /// Length of this range in bytes.
    #[inline]
    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    /// Whether this range is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Extend this range to include another range of the same source.
    #[inline]
    pub fn extend(&self, other: SourceLocation) -> SourceLocation {
        SourceLocation {
            source: self.source,
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// The empty location at the start of this range.
    #[inline]
    pub fn start_point(&self) -> SourceLocation {
        Self::empty(self.source, self.start)
    }

    /// The empty location at the end of this range.
    #[inline]
    pub fn end_point(&self) -> SourceLocation {
        Self::empty(self.source, self.end)
    }

    /// Get the source text for this range.
    #[inline]
    pub fn slice<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start as usize..self.end as usize]
    }
}

impl Default for SourceLocation {
    fn default() -> Self {
        Self::invalid()
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{},{})", self.source, self.start, self.end)
    }
}

impl From<SourceLocation> for std::ops::Range<usize> {
    fn from(location: SourceLocation) -> Self {
        location.start as usize..location.end as usize
    }
}
