// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A macro to declare typed flag sets without pulling in an extra crate.

/// Declares a `Copy` flag set backed by an unsigned integer.
///
/// The generated type exposes one associated constant per flag, set algebra
/// (`|`, `&`, `contains`, `intersects`, `insert`, `remove`) and a `Debug`
/// implementation that prints flag names.
#[macro_export]
macro_rules! relume_bitflags {
    (
        $(#[$attr:meta])*
        $vis:vis struct $name:ident: $ty:ty {
            $(
                $(#[$flag_attr:meta])*
                const $flag_name:ident = $flag_value:expr;
            )*
        }
    ) => {
        $(#[$attr])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
        $vis struct $name {
            bits: $ty,
        }

        impl $name {
            /// An empty set of flags.
            pub const EMPTY: Self = Self { bits: 0 };

            $(
                $(#[$flag_attr])*
                pub const $flag_name: Self = Self { bits: $flag_value };
            )*

            /// Creates a flag set from raw bits. Unknown bits are kept.
            pub const fn from_bits_truncate(bits: $ty) -> Self {
                Self { bits }
            }

            /// Returns the raw bits.
            pub const fn bits(&self) -> $ty {
                self.bits
            }

            /// Returns `true` if every flag of `other` is set in `self`.
            pub const fn contains(&self, other: Self) -> bool {
                (self.bits & other.bits) == other.bits
            }

            /// Returns `true` if `self` and `other` share at least one flag.
            pub const fn intersects(&self, other: Self) -> bool {
                (self.bits & other.bits) != 0
            }

            /// Returns `true` if no flag is set.
            pub const fn is_empty(&self) -> bool {
                self.bits == 0
            }

            /// Sets the flags of `other`.
            pub fn insert(&mut self, other: Self) {
                self.bits |= other.bits;
            }

            /// Clears the flags of `other`.
            pub fn remove(&mut self, other: Self) {
                self.bits &= !other.bits;
            }
        }

        impl core::ops::BitOr for $name {
            type Output = Self;
            fn bitor(self, other: Self) -> Self {
                Self { bits: self.bits | other.bits }
            }
        }

        impl core::ops::BitAnd for $name {
            type Output = Self;
            fn bitand(self, other: Self) -> Self {
                Self { bits: self.bits & other.bits }
            }
        }

        impl core::ops::BitOrAssign for $name {
            fn bitor_assign(&mut self, other: Self) {
                self.bits |= other.bits;
            }
        }

        impl core::fmt::Debug for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                let mut remaining = self.bits;
                let mut first = true;
                write!(f, "{} {{ ", stringify!($name))?;
                $(
                    if ($flag_value != 0) && (remaining & $flag_value) == $flag_value {
                        if !first {
                            write!(f, " | ")?;
                        }
                        write!(f, "{}", stringify!($flag_name))?;
                        remaining &= !$flag_value;
                        first = false;
                    }
                )*
                if remaining != 0 {
                    if !first {
                        write!(f, " | ")?;
                    }
                    write!(f, "UNKNOWN({:#x})", remaining)?;
                    first = false;
                }
                if first {
                    write!(f, "EMPTY")?;
                }
                write!(f, " }}")
            }
        }
    };
}
