//! Copy pool sizing.
//!
//! [`plan_resize`] decides what a resize does from a consistent view of the
//! book's copies. Persistence layers must take that view under a lock that
//! excludes concurrent borrows of the same copies, then apply the plan before
//! releasing it.

use std::cmp::Reverse;

use crate::{error::Result, BookCopy, CopyId, Error};

/// What a resize must do to reach the target count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResizePlan {
    /// Target equals the current count.
    Unchanged,
    /// Create this many new available copies.
    Grow(usize),
    /// Delete exactly these available copies.
    Shrink(Vec<CopyId>),
}

impl ResizePlan {
    /// Net change in pool size.
    pub fn delta(&self) -> isize {
        match self {
            ResizePlan::Unchanged => 0,
            ResizePlan::Grow(n) => *n as isize,
            ResizePlan::Shrink(ids) => -(ids.len() as isize),
        }
    }
}

/// Plan a resize of `copies` (all copies of one book) to `new_count`.
///
/// Shrinking removes only available copies, newest first: copies are ordered
/// by `created_at` descending, then `serial_number` descending. If fewer
/// copies are available than must be removed the resize fails and nothing is
/// planned.
pub fn plan_resize(copies: &[BookCopy], new_count: usize) -> Result<ResizePlan> {
    let current = copies.len();

    if new_count == current {
        return Ok(ResizePlan::Unchanged);
    }
    if new_count > current {
        return Ok(ResizePlan::Grow(new_count - current));
    }

    let deficit = current - new_count;
    let mut available: Vec<&BookCopy> = copies.iter().filter(|c| c.is_available).collect();
    if deficit > available.len() {
        return Err(Error::InsufficientAvailableCopies {
            requested: deficit,
            available: available.len(),
        });
    }

    available.sort_by_key(|c| Reverse((c.created_at, c.serial_number.clone())));
    Ok(ResizePlan::Shrink(
        available.into_iter().take(deficit).map(|c| c.id).collect(),
    ))
}

/// Number of available copies in `copies`.
pub fn available_count(copies: &[BookCopy]) -> usize {
    copies.iter().filter(|c| c.is_available).count()
}
