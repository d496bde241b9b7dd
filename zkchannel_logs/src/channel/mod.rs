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


//! # Channel Logs
//!

pub mod fee;
pub use self::fee::*;
pub mod state;
pub use self::state::*;
pub mod tx;
pub use self::tx::*;

/// Logged once when the close tool starts.
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct StartingCloseTool<'a> {
    /// Crate version of the tool
    pub version: &'a str,
    /// Path of the configuration file in use
    pub config_path: &'a str,
    /// Requested mode of operation
    pub mode: &'a str,
}

/// The configuration file could not be used.
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct ConfigRejected<'a> {
    /// Path of the configuration file
    pub config_path: &'a str,
    /// Stringified error
    pub error: String,
}
