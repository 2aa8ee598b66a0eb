//! Spatial matching: axis-aligned bounding boxes over flat coordinate lists.
//!
//! DESIGN
//! ======
//! Elements arrive as a flat `[x0, y0, x1, y1, ...]` list. The box is the
//! min/max over even indices (x) and odd indices (y). Queries pad the box and
//! match stored boxes either by overlap or by full containment.
//!
//! The predicates here are the reference semantics: every store adapter must
//! use the exact same comparisons when it pushes a range query down.

use serde::{Deserialize, Serialize};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SpatialError {
    #[error("coordinate list is empty")]
    Empty,
    #[error("coordinate list has odd length {0}")]
    OddLength(usize),
    #[error("coordinate at index {0} is not finite")]
    NonFinite(usize),
}

impl crate::frame::ErrorCode for SpatialError {
    fn error_code(&self) -> &'static str {
        "E_BAD_COORDINATES"
    }
}

/// Axis-aligned bounding box. `lower_* <= upper_*` on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub lower_x: f64,
    pub upper_x: f64,
    pub lower_y: f64,
    pub upper_y: f64,
}

/// How a stored box must relate to the query box to count as a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// Any overlap, touching edges included.
    #[default]
    Intersect,
    /// Stored box lies entirely inside the query box.
    Contain,
}

impl MatchMode {
    #[must_use]
    pub fn from_contain_flag(contain: bool) -> Self {
        if contain { Self::Contain } else { Self::Intersect }
    }

    /// Evaluate this mode's predicate for one stored box.
    #[must_use]
    pub fn matches(self, candidate: &BoundingBox, query: &BoundingBox) -> bool {
        match self {
            Self::Intersect => intersects(candidate, query),
            Self::Contain => contains(candidate, query),
        }
    }
}

// =============================================================================
// CONSTRUCTION
// =============================================================================

impl BoundingBox {
    /// Compute the box of a flat `x, y, x, y, ...` coordinate list.
    ///
    /// # Errors
    ///
    /// Returns an error if the list is empty, has odd length, or contains a
    /// non-finite value.
    pub fn from_coords(coords: &[f64]) -> Result<Self, SpatialError> {
        if coords.is_empty() {
            return Err(SpatialError::Empty);
        }
        if coords.len() % 2 != 0 {
            return Err(SpatialError::OddLength(coords.len()));
        }
        if let Some(index) = coords.iter().position(|c| !c.is_finite()) {
            return Err(SpatialError::NonFinite(index));
        }

        let mut bounds = Self {
            lower_x: coords[0],
            upper_x: coords[0],
            lower_y: coords[1],
            upper_y: coords[1],
        };
        for point in coords.chunks_exact(2).skip(1) {
            bounds.lower_x = bounds.lower_x.min(point[0]);
            bounds.upper_x = bounds.upper_x.max(point[0]);
            bounds.lower_y = bounds.lower_y.min(point[1]);
            bounds.upper_y = bounds.upper_y.max(point[1]);
        }
        Ok(bounds)
    }

    /// Expand all four edges outward by `amount`.
    #[must_use]
    pub fn pad(self, amount: f64) -> Self {
        Self {
            lower_x: self.lower_x - amount,
            upper_x: self.upper_x + amount,
            lower_y: self.lower_y - amount,
            upper_y: self.upper_y + amount,
        }
    }
}

// =============================================================================
// PREDICATES
// =============================================================================

/// True unless the boxes are disjoint on either axis.
#[must_use]
pub fn intersects(candidate: &BoundingBox, query: &BoundingBox) -> bool {
    candidate.lower_x <= query.upper_x
        && candidate.upper_x >= query.lower_x
        && candidate.lower_y <= query.upper_y
        && candidate.upper_y >= query.lower_y
}

/// True iff `candidate` lies entirely within `query` on both axes.
#[must_use]
pub fn contains(candidate: &BoundingBox, query: &BoundingBox) -> bool {
    query.lower_x <= candidate.lower_x
        && candidate.upper_x <= query.upper_x
        && query.lower_y <= candidate.lower_y
        && candidate.upper_y <= query.upper_y
}

#[cfg(test)]
#[path = "spatial_test.rs"]
mod tests;
