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


//! # Signature Hashes
//! BIP143 preimages and digests for segwit v0 inputs
//!

use std::fmt;

use bytes::{sha256d, ByteWriter};
use common::constants::{SIGHASH_ALL, SIGHASH_ANYONECANPAY, SIGHASH_NONE, SIGHASH_SINGLE};
use common::Satoshis;
use keys::to_hex;
use script::Script;
use transaction::Transaction;
use Error;

/// A one-byte sighash flag, as appended to a witness signature.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct SighashFlag(u8);

impl SighashFlag {
    /// Commit to every input and output
    pub const ALL: SighashFlag = SighashFlag(SIGHASH_ALL);
    /// Commit to every input and no output
    pub const NONE: SighashFlag = SighashFlag(SIGHASH_NONE);
    /// Commit to every input and the output at the same index
    pub const SINGLE: SighashFlag = SighashFlag(SIGHASH_SINGLE);
    /// Commit to this input and every output
    pub const ALL_ANYONECANPAY: SighashFlag = SighashFlag(SIGHASH_ALL | SIGHASH_ANYONECANPAY);
    /// Commit to this input only
    pub const NONE_ANYONECANPAY: SighashFlag = SighashFlag(SIGHASH_NONE | SIGHASH_ANYONECANPAY);
    /// Commit to this input and the output at the same index
    pub const SINGLE_ANYONECANPAY: SighashFlag = SighashFlag(SIGHASH_SINGLE | SIGHASH_ANYONECANPAY);

    /// Parse a flag byte. Only the three base types, optionally with
    /// ANYONECANPAY, are accepted.
    pub fn from_u8(flag: u8) -> Result<SighashFlag, Error> {
        let base = flag & !SIGHASH_ANYONECANPAY;
        if base < SIGHASH_ALL || base > SIGHASH_SINGLE {
            return Err(Error::MalformedInput(format!("invalid sighash flag {:#04x}", flag)));
        }
        Ok(SighashFlag(flag))
    }

    /// The byte appended to signatures
    pub fn to_u8(self) -> u8 {
        self.0
    }

    /// The 4-byte little-endian field at the end of the preimage. It is
    /// always the witness flag byte zero-extended.
    pub fn to_preimage_field(self) -> u32 {
        u32::from(self.0)
    }

    /// Whether only the signed input is committed to
    pub fn anyone_can_pay(self) -> bool {
        self.0 & SIGHASH_ANYONECANPAY != 0
    }

    /// The base type, without ANYONECANPAY
    pub fn base(self) -> SighashFlag {
        SighashFlag(self.0 & !SIGHASH_ANYONECANPAY)
    }
}

impl fmt::Display for SighashFlag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let base = match self.base() {
            SighashFlag::ALL => "ALL",
            SighashFlag::NONE => "NONE",
            _ => "SINGLE",
        };
        if self.anyone_can_pay() {
            write!(f, "{}|ANYONECANPAY", base)
        } else {
            f.write_str(base)
        }
    }
}

/// Computes preimages for the inputs of one transaction.
///
/// The aggregate hashes are computed once, so a cache must not outlive
/// any change to the transaction: it borrows it immutably.
pub struct SighashCache<'a> {
    tx: &'a Transaction,
    hash_prevouts: [u8; 32],
    hash_sequence: [u8; 32],
    hash_outputs: [u8; 32],
}

impl<'a> SighashCache<'a> {
    /// Precompute the aggregate hashes of `tx`
    pub fn new(tx: &'a Transaction) -> SighashCache<'a> {
        let mut prevouts = ByteWriter::with_capacity(36 * tx.input.len());
        let mut sequences = ByteWriter::with_capacity(4 * tx.input.len());
        for input in &tx.input {
            prevouts
                .push_slice(input.previous_output.txid.as_bytes())
                .push_u32(input.previous_output.vout);
            sequences.push_u32(input.sequence);
        }
        let mut outputs = ByteWriter::new();
        for output in &tx.output {
            outputs.push_u64(output.value).push_var_slice(output.script_pubkey.as_bytes());
        }
        SighashCache {
            tx: tx,
            hash_prevouts: sha256d(prevouts.as_bytes()),
            hash_sequence: sha256d(sequences.as_bytes()),
            hash_outputs: sha256d(outputs.as_bytes()),
        }
    }

    /// The exact preimage for `input`, spending an output worth `value`
    /// whose script code is `script_code`.
    pub fn preimage(
        &self,
        input: usize,
        script_code: &Script,
        value: Satoshis,
        flag: SighashFlag,
    ) -> Result<Vec<u8>, Error> {
        let txin = match self.tx.input.get(input) {
            Some(txin) => txin,
            None => return Err(Error::MalformedInput(format!(
                "input {} out of range, tx has {}", input, self.tx.input.len(),
            ))),
        };
        let zero = [0u8; 32];
        let acp = flag.anyone_can_pay();
        let base = flag.base();

        let hash_prevouts = if acp { zero } else { self.hash_prevouts };
        let hash_sequence = if acp || base != SighashFlag::ALL {
            zero
        } else {
            self.hash_sequence
        };
        let hash_outputs = match base {
            SighashFlag::ALL => self.hash_outputs,
            SighashFlag::SINGLE if input < self.tx.output.len() => {
                let out = &self.tx.output[input];
                let mut w = ByteWriter::with_capacity(out.size());
                w.push_u64(out.value).push_var_slice(out.script_pubkey.as_bytes());
                sha256d(w.as_bytes())
            }
            _ => zero,
        };

        let mut w = ByteWriter::with_capacity(156 + script_code.len());
        w.push_u32(self.tx.version)
            .push_slice(&hash_prevouts)
            .push_slice(&hash_sequence)
            .push_slice(txin.previous_output.txid.as_bytes())
            .push_u32(txin.previous_output.vout)
            .push_var_slice(script_code.as_bytes())
            .push_u64(value)
            .push_u32(txin.sequence)
            .push_slice(&hash_outputs)
            .push_u32(self.tx.lock_time)
            .push_u32(flag.to_preimage_field());
        Ok(w.into_bytes())
    }

    /// The digest a signature for `input` commits to
    pub fn digest(
        &self,
        input: usize,
        script_code: &Script,
        value: Satoshis,
        flag: SighashFlag,
    ) -> Result<[u8; 32], Error> {
        let digest = sha256d(&self.preimage(input, script_code, value, flag)?);
        slog!(SighashComputed, input: input, flag: flag.to_u8(), digest: to_hex(&digest));
        Ok(digest)
    }
}

#[cfg(test)]
mod tests {
    use bitcoin;
    use bitcoin::hashes::Hash;

    use super::*;
    use fixtures;
    use transaction::{Transaction, TxIn, TxOut};

    fn bitcoin_preimage(tx: &Transaction, input: usize, code: &Script, value: u64, flag: SighashFlag) -> Vec<u8> {
        let btc: bitcoin::Transaction = bitcoin::consensus::encode::deserialize(&tx.serialize()).unwrap();
        let mut cache = bitcoin::sighash::SighashCache::new(&btc);
        let mut ret = vec![];
        cache.segwit_v0_encode_signing_data_to(
            &mut ret,
            input,
            bitcoin::Script::from_bytes(code.as_bytes()),
            bitcoin::Amount::from_sat(value),
            bitcoin::EcdsaSighashType::from_consensus(u32::from(flag.to_u8())),
        ).unwrap();
        ret
    }

    #[test]
    fn flag_parsing() {
        for &b in &[0x01u8, 0x02, 0x03, 0x81, 0x82, 0x83] {
            assert_eq!(SighashFlag::from_u8(b).unwrap().to_u8(), b);
        }
        for &b in &[0x00u8, 0x04, 0x80, 0x84, 0x41, 0xff] {
            assert!(SighashFlag::from_u8(b).is_err(), "{:#x}", b);
        }
        assert_eq!(SighashFlag::NONE_ANYONECANPAY.base(), SighashFlag::NONE);
        assert_eq!(SighashFlag::ALL_ANYONECANPAY.to_string(), "ALL|ANYONECANPAY");
    }

    #[test]
    fn preimage_field_matches_witness_flag() {
        let f = fixtures::Fixture::new();
        let built = f.cust_close_from_escrow(false);
        let cache = SighashCache::new(&built.tx);
        let code = f.escrow().to_script();
        for &flag in &[
            SighashFlag::ALL,
            SighashFlag::NONE,
            SighashFlag::ALL_ANYONECANPAY,
            SighashFlag::NONE_ANYONECANPAY,
        ] {
            let pre = cache.preimage(0, &code, 1, flag).unwrap();
            let n = pre.len();
            assert_eq!(&pre[n - 4..], &[flag.to_u8(), 0, 0, 0]);
            assert_eq!(flag.to_preimage_field() & 0xff, u32::from(flag.to_u8()));
        }
    }

    #[test]
    fn matches_bitcoin_for_every_flag() {
        let f = fixtures::Fixture::new();
        let mut tx = f.cust_close_from_escrow(true).tx;
        tx.input.push(TxIn::new(f.extra_utxo().outpoint));
        tx.input[1].sequence = 1487;
        let code = f.escrow().to_script();
        let cache = SighashCache::new(&tx);
        for &flag in &[
            SighashFlag::ALL,
            SighashFlag::NONE,
            SighashFlag::SINGLE,
            SighashFlag::ALL_ANYONECANPAY,
            SighashFlag::NONE_ANYONECANPAY,
            SighashFlag::SINGLE_ANYONECANPAY,
        ] {
            for input in 0..2 {
                let ours = cache.preimage(input, &code, 210_000_000, flag).unwrap();
                assert_eq!(ours, bitcoin_preimage(&tx, input, &code, 210_000_000, flag), "{} {}", flag, input);
            }
        }
    }

    #[test]
    fn digest_matches_bitcoin() {
        let f = fixtures::Fixture::new();
        let built = f.cust_close_from_escrow(true);
        let btc: bitcoin::Transaction = bitcoin::consensus::encode::deserialize(&built.tx.serialize()).unwrap();
        let code = f.escrow().to_script();
        let theirs = bitcoin::sighash::SighashCache::new(&btc).p2wsh_signature_hash(
            0,
            bitcoin::Script::from_bytes(code.as_bytes()),
            bitcoin::Amount::from_sat(built.spent[0].value),
            bitcoin::EcdsaSighashType::All,
        ).unwrap();
        let ours = SighashCache::new(&built.tx).digest(0, &code, built.spent[0].value, SighashFlag::ALL).unwrap();
        assert_eq!(theirs.to_byte_array(), ours);
    }

    #[test]
    fn anyonecanpay_zeroes_aggregates() {
        let f = fixtures::Fixture::new();
        let outpoint = f.escrow_outpoint();
        let tx = Transaction::new(
            vec![TxIn::new(outpoint)],
            vec![TxOut { value: 199_999_000, script_pubkey: f.escrow().to_script().to_p2wsh() }],
        );
        let code = f.escrow().to_script();
        let pre = SighashCache::new(&tx).preimage(0, &code, 200_000_000, SighashFlag::ALL_ANYONECANPAY).unwrap();

        assert_eq!(&pre[0..4], &[2, 0, 0, 0]);
        assert_eq!(&pre[4..36], &[0u8; 32]);
        assert_eq!(&pre[36..68], &[0u8; 32]);
        assert_eq!(&pre[68..100], outpoint.txid.as_bytes());
        assert_eq!(&pre[100..104], &[0, 0, 0, 0]);
        let n = pre.len();
        // sequence, hashOutputs, locktime, sighash type
        assert_eq!(&pre[n - 48..n - 44], &[0xff; 4]);
        assert_ne!(&pre[n - 44..n - 12], &[0u8; 32]);
        assert_eq!(&pre[n - 8..], &hex!("00000000 81000000"));
    }

    #[test]
    fn input_out_of_range() {
        let f = fixtures::Fixture::new();
        let tx = f.cust_close_from_escrow(false).tx;
        let cache = SighashCache::new(&tx);
        assert!(cache.preimage(1, &f.escrow().to_script(), 1, SighashFlag::ALL).is_err());
    }
}
