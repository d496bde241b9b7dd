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

//! # zkChannels Common
//! Types and constants shared by the channel library, its logging and its tools

// Coding conventions
#![deny(non_upper_case_globals)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
#![deny(unused_mut)]
#![warn(missing_docs)]

#[cfg(feature = "serde")]
extern crate serde;
#[cfg(feature = "serde")]
#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate lazy_static;

#[macro_use]
pub mod macros;

pub mod constants;
pub mod util;

use std::fmt;

/// An amount of satoshis
pub type Satoshis = u64;

/// A block height
pub type BlockHeight = u64;

/// A relative delay in blocks, as carried by CSV scripts
pub type BlockDelay = u16;

/// One of the two channel parties.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Role {
    /// The customer, who pays and who initiates the cust-close
    Customer,
    /// The merchant, who is paid and who may force-close with merch-close
    Merchant,
}

impl Role {
    /// The other party.
    pub fn other(self) -> Role {
        match self {
            Role::Customer => Role::Merchant,
            Role::Merchant => Role::Customer,
        }
    }

    /// Short lowercase name for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Merchant => "merchant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A trait for objects that can be printed concisely for logging.
pub trait ConcisePrintable {
    /// Write a concise representation into `f`.
    fn fmt_concise(&self, f: &mut dyn fmt::Write) -> fmt::Result;

    /// Return the concise representation as a string.
    fn to_concise_string(&self) -> String {
        let mut ret = String::new();
        self.fmt_concise(&mut ret).expect("writing to a string");
        ret
    }
}

impl ConcisePrintable for [u8] {
    fn fmt_concise(&self, f: &mut dyn fmt::Write) -> fmt::Result {
        if self.len() <= 8 {
            for b in self {
                write!(f, "{:02x}", b)?;
            }
        } else {
            for b in &self[..4] {
                write!(f, "{:02x}", b)?;
            }
            f.write_str("..")?;
            for b in &self[self.len() - 4..] {
                write!(f, "{:02x}", b)?;
            }
        }
        Ok(())
    }
}
