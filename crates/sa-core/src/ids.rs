//! Typed indices for model objects.
//!
//! Each id is a distinct type, so a DOF index cannot be handed to an API that
//! expects an element. Storage is `index + 1` in a `NonZeroU32`, which keeps
//! `Option<Id>` the same size as the id.

use core::fmt;
use core::num::NonZeroU32;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub struct $name(NonZeroU32);

        impl $name {
            /// Panics if `index` does not fit in `u32`; models never get near that.
            pub fn from_index(index: usize) -> Self {
                match u32::try_from(index).ok().and_then(|i| NonZeroU32::new(i.wrapping_add(1))) {
                    Some(raw) => Self(raw),
                    None => panic!(concat!($label, " index {} out of range"), index),
                }
            }

            pub fn index(self) -> usize {
                (self.0.get() - 1) as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "({})"), self.index())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.index())
            }
        }
    };
}

define_id!(
    /// Degree of freedom, numbered in creation order.
    DofId,
    "Dof"
);
define_id!(
    /// Element, in the order it was added to the model.
    EleId,
    "Ele"
);
define_id!(
    /// Load pattern.
    PatternId,
    "Pattern"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_survives_round_trip() {
        for i in [0_usize, 1, 7, 4096] {
            assert_eq!(DofId::from_index(i).index(), i);
            assert_eq!(EleId::from_index(i).index(), i);
        }
    }

    #[test]
    fn optional_dof_has_no_overhead() {
        assert_eq!(
            core::mem::size_of::<DofId>(),
            core::mem::size_of::<Option<DofId>>()
        );
    }

    #[test]
    fn debug_names_the_kind() {
        assert_eq!(format!("{:?}", DofId::from_index(3)), "Dof(3)");
        assert_eq!(format!("{}", PatternId::from_index(2)), "2");
    }

    #[test]
    #[should_panic]
    fn index_past_u32_range_panics() {
        let _ = DofId::from_index(u32::MAX as usize);
    }
}
