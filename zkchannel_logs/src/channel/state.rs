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


//! # Channel state machine logs
//!

use common::Role;

/// The channel moved to a new status.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct StateTransition<'a> {
    /// Status before the event
    pub from: &'a str,
    /// Status after the event
    pub to: &'a str,
    /// Event which caused the move
    pub event: &'a str,
    /// Block height the event was observed at, if any
    pub height: Option<u64>,
}

/// An event was not valid in the channel's current status.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct TransitionRejected<'a> {
    /// Status the channel stays in
    pub status: &'a str,
    /// Event which was rejected
    pub event: &'a str,
    /// Stringified reason
    pub reason: String,
}

/// The off-chain channel state was updated.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct StateUpdated {
    /// New sequence number
    pub seq: u64,
    /// Customer balance
    pub cust_bal: u64,
    /// Merchant balance
    pub merch_bal: u64,
}

/// A party funded the escrow.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct FundingAdded {
    /// Funding party
    pub role: Role,
    /// Amount contributed
    pub amount: u64,
}
