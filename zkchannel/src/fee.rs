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


//! # Fee/CPFP Allocator
//!
//! Splits a channel's value across the outputs of its close transactions.
//! Every close reserves a CPFP child output, and each principal output is
//! kept at or above the CPFP value so a child can always be attached to
//! it as well. Fees come from fixed vbyte estimates of each close.
//!

use std::{error, fmt};

use common::constants::{
    self, CLOSE_ESCROW_VBYTES, CLOSE_MERCH_VBYTES, DUST_LIMIT_P2WPKH, DUST_LIMIT_P2WSH,
    MERCH_CLOSE_VBYTES,
};
use common::Satoshis;
use script::Script;

/// Dust limit of P2SH outputs.
const DUST_LIMIT_P2SH: Satoshis = 540;
/// Dust limit of any other output type.
const DUST_LIMIT_OTHER: Satoshis = 546;

/// Fee allocation error
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Error {
    /// The channel cannot pay for both close transactions and their children
    ChannelTooSmall {
        /// Channel value
        total: Satoshis,
        /// Smallest workable value
        minimum: Satoshis,
    },
    /// The configured CPFP output value is itself dust
    CpfpBelowDust {
        /// Configured value
        cpfp: Satoshis,
        /// Dust limit of the CPFP output
        dust_limit: Satoshis,
    },
    /// An amount overflowed
    Overflow,
    /// An output came out negative
    NegativeOutput {
        /// Index of the output
        index: usize,
        /// Its value
        value: i64,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::ChannelTooSmall { total, minimum } => write!(
                f, "channel value {} is below the minimum {}", total, minimum,
            ),
            Error::CpfpBelowDust { cpfp, dust_limit } => write!(
                f, "cpfp value {} is below the dust limit {}", cpfp, dust_limit,
            ),
            Error::Overflow => f.write_str("amount overflow"),
            Error::NegativeOutput { index, value } => write!(
                f, "output {} would have negative value {}", index, value,
            ),
        }
    }
}

impl error::Error for Error {}

/// The close transactions whose outputs are allocated here.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum CloseKind {
    /// Cust-close spending the escrow
    CloseEscrow,
    /// Cust-close spending merch-close
    CloseMerch,
    /// Merch-close spending the escrow
    MerchClose,
}

impl CloseKind {
    /// Estimated size of the transaction, in vbytes
    pub fn vbytes(self) -> u64 {
        match self {
            CloseKind::CloseEscrow => CLOSE_ESCROW_VBYTES,
            CloseKind::CloseMerch => CLOSE_MERCH_VBYTES,
            CloseKind::MerchClose => MERCH_CLOSE_VBYTES,
        }
    }

    /// Name used in logs and on the command line
    pub fn as_str(self) -> &'static str {
        match self {
            CloseKind::CloseEscrow => "close_escrow",
            CloseKind::CloseMerch => "close_merch",
            CloseKind::MerchClose => "merch_close",
        }
    }

    /// Parse a name as printed by [CloseKind::as_str]
    pub fn from_name(s: &str) -> Option<CloseKind> {
        match s {
            "close_escrow" => Some(CloseKind::CloseEscrow),
            "close_merch" => Some(CloseKind::CloseMerch),
            "merch_close" => Some(CloseKind::MerchClose),
            _ => None,
        }
    }

    /// Dust limits of the principal outputs, in output order
    fn dust_limits(self) -> &'static [Satoshis] {
        match self {
            // cust delayed P2WSH, merch P2WPKH
            CloseKind::CloseEscrow | CloseKind::CloseMerch => &[DUST_LIMIT_P2WSH, DUST_LIMIT_P2WPKH],
            // merch-close P2WSH
            CloseKind::MerchClose => &[DUST_LIMIT_P2WSH],
        }
    }
}

impl fmt::Display for CloseKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dust limit of an output script.
pub fn dust_limit(script_pubkey: &Script) -> Satoshis {
    if script_pubkey.is_op_return() {
        0
    } else if script_pubkey.is_p2wpkh() {
        DUST_LIMIT_P2WPKH
    } else if script_pubkey.is_p2wsh() {
        DUST_LIMIT_P2WSH
    } else if script_pubkey.is_p2sh() {
        DUST_LIMIT_P2SH
    } else {
        DUST_LIMIT_OTHER
    }
}

/// Fee rate and CPFP output value.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct FeeModel {
    /// Satoshis per vbyte
    pub fee_rate: u64,
    /// Value of each CPFP child output, and the floor of each principal output
    pub cpfp_value: Satoshis,
}

impl FeeModel {
    /// A model with explicit parameters
    pub fn new(fee_rate: u64, cpfp_value: Satoshis) -> Result<FeeModel, Error> {
        if cpfp_value < DUST_LIMIT_P2WPKH {
            return Err(Error::CpfpBelowDust { cpfp: cpfp_value, dust_limit: DUST_LIMIT_P2WPKH });
        }
        Ok(FeeModel {
            fee_rate: fee_rate,
            cpfp_value: cpfp_value,
        })
    }

    /// The model configured at startup, or the defaults
    pub fn from_constants() -> Result<FeeModel, Error> {
        let c = constants::constants();
        FeeModel::new(c.fee_rate, c.cpfp_value)
    }

    /// Fee for a transaction of `vsize` vbytes
    pub fn fee_for_vsize(&self, vsize: u64) -> Result<Satoshis, Error> {
        vsize.checked_mul(self.fee_rate).ok_or(Error::Overflow)
    }

    /// Fee of a close transaction
    pub fn fee(&self, kind: CloseKind) -> Result<Satoshis, Error> {
        self.fee_for_vsize(kind.vbytes())
    }

    /// The smallest channel which can pay for merch-close, cust-close from
    /// merch-close, both of their children, and minimum principal outputs.
    pub fn min_channel_value(&self) -> Result<Satoshis, Error> {
        let fees = self.fee(CloseKind::MerchClose)?
            .checked_add(self.fee(CloseKind::CloseMerch)?)
            .ok_or(Error::Overflow)?;
        self.cpfp_value.checked_mul(4)
            .and_then(|c| c.checked_add(fees))
            .ok_or(Error::Overflow)
    }
}

/// Output values of one close transaction.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Allocation {
    /// Which close this is for
    pub kind: CloseKind,
    /// Value of the output the close spends
    pub input_value: Satoshis,
    /// Principal outputs in output order. `None` for an output which was
    /// dust and whose value went to the fee.
    pub outputs: Vec<Option<Satoshis>>,
    /// Value of the CPFP child output
    pub cpfp: Satoshis,
    /// Fee: the input value not paid to any output
    pub fee: Satoshis,
}

fn to_i64(n: Satoshis) -> Result<i64, Error> {
    if n > i64::max_value() as u64 {
        Err(Error::Overflow)
    } else {
        Ok(n as i64)
    }
}

/// Top up each principal output below `floor` from the other one.
fn rebalance_values(values: &mut [i64], floor: i64) -> bool {
    if values.len() != 2 {
        return false;
    }
    let mut changed = false;
    for &(to, from) in &[(0, 1), (1, 0)] {
        if values[to] < floor {
            let diff = floor - values[to];
            values[to] += diff;
            values[from] -= diff;
            slog!(OutputsRebalanced, from_output: from, to_output: to, amount: diff as u64);
            changed = true;
        }
    }
    changed
}

impl Allocation {
    fn settle(
        kind: CloseKind,
        input_value: Satoshis,
        mut values: Vec<i64>,
        cpfp: Satoshis,
    ) -> Result<Allocation, Error> {
        rebalance_values(&mut values, to_i64(cpfp)?);

        let mut outputs = Vec::with_capacity(values.len());
        for (index, (value, limit)) in values.into_iter().zip(kind.dust_limits()).enumerate() {
            if value < 0 {
                return Err(Error::NegativeOutput { index: index, value: value });
            }
            let value = value as Satoshis;
            if value < *limit {
                slog!(DustFoldedIntoFee, output: index, value: value, dust_limit: *limit);
                outputs.push(None);
            } else {
                outputs.push(Some(value));
            }
        }

        let paid = outputs.iter()
            .filter_map(|o| *o)
            .try_fold(cpfp, |acc, v| acc.checked_add(v))
            .ok_or(Error::Overflow)?;
        let fee = match input_value.checked_sub(paid) {
            Some(fee) => fee,
            None => return Err(Error::NegativeOutput { index: 0, value: input_value as i64 - paid as i64 }),
        };

        slog!(OutputsAllocated,
            kind: kind.as_str(),
            input_value: input_value,
            outputs: outputs.iter().map(|o| o.unwrap_or(0)).collect(),
            cpfp: cpfp,
            fee: fee,
        );
        Ok(Allocation {
            kind: kind,
            input_value: input_value,
            outputs: outputs,
            cpfp: cpfp,
            fee: fee,
        })
    }

    /// Apply the rebalancing and dust rules again. Returns whether anything
    /// changed, which for an allocation made by [allocate] is never.
    pub fn rebalance(&mut self) -> Result<bool, Error> {
        // a folded output stays folded
        if self.outputs.iter().any(Option::is_none) {
            return Ok(false);
        }
        let mut values = Vec::with_capacity(self.outputs.len());
        for v in self.outputs.iter().filter_map(|o| *o) {
            values.push(to_i64(v)?);
        }
        let before = values.clone();
        rebalance_values(&mut values, to_i64(self.cpfp)?);
        let dust_free = self.outputs.iter()
            .zip(self.kind.dust_limits())
            .all(|(o, limit)| o.map_or(true, |v| v >= *limit));
        if values == before && dust_free {
            return Ok(false);
        }

        let new = Allocation::settle(self.kind, self.input_value, values, self.cpfp)?;
        let changed = new != *self;
        *self = new;
        Ok(changed)
    }

    /// Values of all outputs in transaction order: the principal outputs,
    /// then the CPFP output.
    pub fn values(&self) -> Vec<Option<Satoshis>> {
        let mut ret = self.outputs.clone();
        ret.push(Some(self.cpfp));
        ret
    }
}

/// Allocate the outputs of close transaction `kind` for a channel with
/// balances `cust_bal` and `merch_bal`.
///
/// * cust-close from escrow: the customer's output pays the CPFP output
///   and the fee, the merchant gets their whole balance.
/// * cust-close from merch-close: the input is what merch-close left, and
///   each side pays its own CPFP output and fee.
/// * merch-close: one output carries everything but the CPFP output and fee.
pub fn allocate(
    kind: CloseKind,
    cust_bal: Satoshis,
    merch_bal: Satoshis,
    model: &FeeModel,
) -> Result<Allocation, Error> {
    let total = cust_bal.checked_add(merch_bal).ok_or(Error::Overflow)?;
    let minimum = model.min_channel_value()?;
    if total < minimum {
        slog!(ChannelTooSmall, total: total, minimum: minimum);
        return Err(Error::ChannelTooSmall { total: total, minimum: minimum });
    }

    let cpfp = to_i64(model.cpfp_value)?;
    let cb = to_i64(cust_bal)?;
    let mb = to_i64(merch_bal)?;
    let fee_ce = to_i64(model.fee(CloseKind::CloseEscrow)?)?;
    let fee_cm = to_i64(model.fee(CloseKind::CloseMerch)?)?;
    let fee_mc = to_i64(model.fee(CloseKind::MerchClose)?)?;

    let (input_value, values) = match kind {
        CloseKind::CloseEscrow => (cb + mb, vec![cb - cpfp - fee_ce, mb]),
        CloseKind::CloseMerch => (
            cb + mb - cpfp - fee_mc,
            vec![cb - cpfp - fee_cm, mb - cpfp - fee_mc],
        ),
        CloseKind::MerchClose => (cb + mb, vec![cb + mb - cpfp - fee_mc]),
    };
    Allocation::settle(kind, input_value as Satoshis, values, model.cpfp_value)
}
