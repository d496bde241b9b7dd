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


//! # zkChannels
//! This is the library used to open, close, claim and dispute two-party
//! zkChannels on a Bitcoin-like ledger. It builds bit-exact transactions
//! and witnesses, computes their signature hashes, checks the spends with a
//! small script interpreter, splits close outputs so a CPFP child can
//! always be attached, and tracks which close paths are still legal.
//!

// Coding conventions
#![deny(non_upper_case_globals)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
#![deny(unused)]
#![deny(unused_mut)]
#![warn(missing_docs)]

// External libs
pub extern crate bitcoin;
extern crate byteorder;
#[cfg(test)]
#[macro_use] extern crate hex_literal;
extern crate serde;
#[allow(unused_imports)]
#[macro_use] extern crate serde_derive;
#[cfg(test)]
extern crate tempfile;
extern crate toml;

#[macro_use]
pub extern crate zkchannel_logs as logs;
#[macro_use]
pub extern crate zkchannel_common as common;

pub mod builder;
pub mod bytes;
pub mod config;
pub mod error;
pub mod fee;
pub mod interpreter;
pub mod keys;
pub mod script;
pub mod sighash;
pub mod signer;
pub mod state;
pub mod transaction;
pub mod verifier;
pub mod witness;

pub use error::Error;

#[cfg(test)]
mod fixtures;
