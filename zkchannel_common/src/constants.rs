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


//! # Constants
//! Protocol constants shared by the transaction builders and the fee allocator

use std::sync;

use {BlockDelay, Satoshis};

/// Version of every transaction we create. Relative timelocks need at least 2.
pub const TX_VERSION: u32 = 2;

/// Locktime of every transaction we create.
pub const TX_LOCKTIME: u32 = 0;

/// nSequence for inputs which do not use a relative timelock.
pub const SEQUENCE_FINAL: u32 = 0xffff_ffff;

/// If this bit is set in an nSequence, the relative timelock is disabled.
pub const SEQUENCE_LOCKTIME_DISABLE_FLAG: u32 = 1 << 31;

/// If this bit is set in an nSequence, the relative timelock is time-based.
pub const SEQUENCE_LOCKTIME_TYPE_FLAG: u32 = 1 << 22;

/// Bits of an nSequence which carry the relative timelock value.
pub const SEQUENCE_LOCKTIME_MASK: u32 = 0x0000_ffff;

/// The largest relative delay, in blocks, that can be expressed.
pub const MAX_RELATIVE_DELAY: BlockDelay = 0xffff;

/// Sighash flag: sign all inputs and outputs.
pub const SIGHASH_ALL: u8 = 0x01;
/// Sighash flag: sign no outputs.
pub const SIGHASH_NONE: u8 = 0x02;
/// Sighash flag: sign only the output with the same index as the input.
pub const SIGHASH_SINGLE: u8 = 0x03;
/// Sighash modifier: sign only the input being spent.
pub const SIGHASH_ANYONECANPAY: u8 = 0x80;
/// Mask selecting the base type out of a sighash flag.
pub const SIGHASH_BASE_MASK: u8 = 0x1f;

/// Length of a compressed secp256k1 public key.
pub const PUBKEY_LEN: usize = 33;
/// Length of a SHA256 digest, and so of txids, revocation locks and channel ids.
pub const HASH256_LEN: usize = 32;
/// Length of a RIPEMD160(SHA256(x)) digest.
pub const HASH160_LEN: usize = 20;

/// Segwit discount factor between weight units and virtual bytes.
pub const WITNESS_SCALE_FACTOR: usize = 4;

/// Number of satoshis in one bitcoin.
pub const SATOSHIS_PER_BITCOIN: Satoshis = 100_000_000;

/// Estimated size in vbytes of a cust-close transaction spending the escrow.
pub const CLOSE_ESCROW_VBYTES: u64 = 298;

/// Estimated size in vbytes of a cust-close transaction spending merch-close.
pub const CLOSE_MERCH_VBYTES: u64 = 299;

/// Estimated size in vbytes of a merch-close transaction.
pub const MERCH_CLOSE_VBYTES: u64 = 181;

/// Fee rate used when none is configured, in satoshis per vbyte.
pub const DEFAULT_FEE_RATE: u64 = 10;

/// Value of the child output reserved for CPFP fee bumping, in satoshis.
/// It is also the minimum either principal close output may hold.
pub const DEFAULT_CPFP_VALUE: Satoshis = 500;

/// Below this value a P2WPKH output is non-standard (dust).
pub const DUST_LIMIT_P2WPKH: Satoshis = 294;

/// Below this value a P2WSH output is non-standard (dust).
pub const DUST_LIMIT_P2WSH: Satoshis = 330;

/// Constants which may be overridden from the configuration file.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Constants {
    /// Fee rate for close transactions, in satoshis per vbyte
    pub fee_rate: u64,
    /// Value of every CPFP child output, in satoshis
    pub cpfp_value: Satoshis,
}

impl Default for Constants {
    fn default() -> Self {
        Constants {
            fee_rate: DEFAULT_FEE_RATE,
            cpfp_value: DEFAULT_CPFP_VALUE,
        }
    }
}

lazy_static! {
    static ref CONSTANTS_STATIC: sync::Mutex<Option<Constants>> = sync::Mutex::new(None);
}

/// Should only be set ONCE on startup before any transaction is built.
pub fn set_constants_on_startup(constants: Constants) {
    let mut lock = CONSTANTS_STATIC.lock().unwrap();
    assert!(lock.is_none(), "Must not set Constants more than once");
    *lock = Some(constants);
}

/// The constants in effect: the configured ones, or the defaults.
pub fn constants() -> Constants {
    CONSTANTS_STATIC.lock().unwrap().unwrap_or_default()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sighash_bits_do_not_overlap() {
        assert_eq!(SIGHASH_ANYONECANPAY & SIGHASH_BASE_MASK, 0);
        assert_eq!(SIGHASH_SINGLE & SIGHASH_BASE_MASK, SIGHASH_SINGLE);
    }

    #[test]
    fn cpfp_value_is_not_dust() {
        assert!(DEFAULT_CPFP_VALUE >= DUST_LIMIT_P2WSH);
        assert!(DEFAULT_CPFP_VALUE >= DUST_LIMIT_P2WPKH);
    }

    #[test]
    fn defaults_without_override() {
        let c = Constants::default();
        assert_eq!(c.fee_rate, 10);
        assert_eq!(c.cpfp_value, 500);
    }
}
