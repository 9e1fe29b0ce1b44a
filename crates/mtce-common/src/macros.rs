//! Small hand-rolled bit-field generator.
//!
//! The original source (`nodeBase.h`) represents both the node-type and
//! degrade masks as plain `#define`d `u32` bit constants, not as a tagged
//! flags type. A hand-rolled newtype with the handful of operations we
//! actually need (`contains`/`insert`/`remove`/bitwise-or) matches that
//! grounding more closely than pulling in the `bitflags` crate for two
//! small masks, so this crate defines its own.

/// Generates a `Copy` newtype wrapping an integer with named `const`
/// bit values and the handful of set operations the core needs.
#[macro_export]
macro_rules! bitflags_like {
    (
        $(#[$meta:meta])*
        pub struct $name:ident: $int:ty {
            $(const $flag:ident = $value:expr;)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
        pub struct $name(pub $int);

        impl $name {
            $(
                #[allow(missing_docs)]
                pub const $flag: $name = $name($value);
            )*

            /// Empty mask.
            pub const NONE: $name = $name(0);

            /// True if every bit in `other` is set in `self`.
            pub fn contains(&self, other: $name) -> bool {
                (self.0 & other.0) == other.0
            }

            /// Set the bits in `other`.
            pub fn insert(&mut self, other: $name) {
                self.0 |= other.0;
            }

            /// Clear the bits in `other`.
            pub fn remove(&mut self, other: $name) {
                self.0 &= !other.0;
            }

            /// True if no bits are set.
            pub fn is_empty(&self) -> bool {
                self.0 == 0
            }
        }

        impl std::ops::BitOr for $name {
            type Output = $name;
            fn bitor(self, rhs: $name) -> $name {
                $name(self.0 | rhs.0)
            }
        }

        impl std::ops::BitAnd for $name {
            type Output = $name;
            fn bitand(self, rhs: $name) -> $name {
                $name(self.0 & rhs.0)
            }
        }
    };
}
