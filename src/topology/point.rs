//! Strong handles for globally numbered mesh entities.
//!
//! Elements and vertices are identified by a `u64` that is unique across the
//! whole process group and stable across redistribution; only ownership moves.
//! The newtypes keep the two ID spaces apart at compile time and are
//! `repr(transparent)` so slices of them can be packed onto the wire as plain
//! words.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Global identifier of a simplex element.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct ElementId(u64);

/// Global identifier of a mesh vertex.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct VertexId(u64);

macro_rules! impl_id {
    ($ty:ident, $name:literal) => {
        impl $ty {
            #[inline]
            pub const fn new(raw: u64) -> Self {
                $ty(raw)
            }

            #[inline]
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple($name).field(&self.0).finish()
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $ty {
            fn from(raw: u64) -> Self {
                $ty(raw)
            }
        }
    };
}

impl_id!(ElementId, "ElementId");
impl_id!(VertexId, "VertexId");
