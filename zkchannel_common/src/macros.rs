//{{ Liquid }}
//Copyright (C) {{ 2015,2016,2017,2018 }}  {{ Blockstream }}

//This program is free software: you can redistribute it and/or modify
//it under the terms of the GNU Affero General Public License as published by
//the Free Software Foundation, either version 3 of the License, or
//(at your option) any later version.

//This program is distributed in the hope that it will be useful,
//but WITHOUT ANY WARRANTY; without even the implied warranty of
//MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//GNU Affero General Public License for more details.

//You should have received a copy of the GNU Affero General Public License
//along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! # Macros
//! Helpers shared across the zkChannels crates

/// Unwrap an `Option`, or run the given block (which must diverge) if it
/// is `None`.
#[macro_export]
macro_rules! unwrap_opt_or {
    ($maybe:expr, $else:tt) => {
        if let Some(v) = $maybe {
            v
        } else {
            $else
        }
    }
}

/// Define a fixed-length 32-byte digest newtype.
///
/// The generated type has `from_slice`, `as_bytes`, `to_bytes` and hex
/// `Display`/`Debug`. With `reversed` it displays in reversed byte order,
/// the way txids are shown.
#[macro_export]
macro_rules! hash_newtype {
    ($name:ident, $doc:expr) => {
        hash_newtype!($name, $doc, false);
    };
    ($name:ident, $doc:expr, reversed) => {
        hash_newtype!($name, $doc, true);
    };
    ($name:ident, $doc:expr, $rev:expr) => {
        #[doc = $doc]
        #[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name(pub [u8; 32]);

        impl $name {
            /// Build from a slice, which must be exactly 32 bytes long.
            pub fn from_slice(sl: &[u8]) -> Option<$name> {
                if sl.len() != 32 {
                    return None;
                }
                let mut ret = [0; 32];
                ret.copy_from_slice(sl);
                Some($name(ret))
            }

            /// The bytes in internal order.
            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            /// The bytes in internal order, copied.
            pub fn to_bytes(&self) -> [u8; 32] {
                self.0
            }

            /// The bytes in display order.
            pub fn to_display_bytes(&self) -> [u8; 32] {
                let mut ret = self.0;
                if $rev {
                    ret.reverse();
                }
                ret
            }

            /// Build from bytes given in display order.
            pub fn from_display_bytes(mut bytes: [u8; 32]) -> $name {
                if $rev {
                    bytes.reverse();
                }
                $name(bytes)
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
                for b in self.to_display_bytes().iter() {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
        }

        impl ::std::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }
    };
}
