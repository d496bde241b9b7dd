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


//! # Fee allocation logs
//!

/// Output values were allocated for a close transaction.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct OutputsAllocated<'a> {
    /// Which close transaction the values are for
    pub kind: &'a str,
    /// Value of the spent output
    pub input_value: u64,
    /// Values of the principal outputs, in output order
    pub outputs: Vec<u64>,
    /// Value of the CPFP child output
    pub cpfp: u64,
    /// Fee left to miners
    pub fee: u64,
}

/// Value was moved between principal outputs so both reach the minimum.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct OutputsRebalanced {
    /// Output which gave up value
    pub from_output: usize,
    /// Output which received value
    pub to_output: usize,
    /// Amount moved, in satoshis
    pub amount: u64,
}

/// A principal output fell below its dust limit and was dropped into the fee.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct DustFoldedIntoFee {
    /// Index of the dropped output
    pub output: usize,
    /// Value that went to the fee
    pub value: u64,
    /// Dust limit for the output's script type
    pub dust_limit: u64,
}

/// The channel cannot pay for its close transactions.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ChannelTooSmall {
    /// Total channel value
    pub total: u64,
    /// Smallest workable channel value
    pub minimum: u64,
}
