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


//! # Transactions
//! Segwit transaction serialization, txids, weight, and a parser for the
//! transactions this library produces
//!

use std::fmt;

use bytes::{sha256d, varint_len, ByteReader, ByteWriter};
use common::constants::{SEQUENCE_FINAL, TX_LOCKTIME, TX_VERSION, WITNESS_SCALE_FACTOR};
use common::{ConcisePrintable, Satoshis};
use keys::{decode_hex, to_hex};
use script::Script;
use witness::Witness;
use Error;

hash_newtype!(Txid, "A transaction id. Displayed in reversed byte order.", reversed);

impl Txid {
    /// Parse a txid from its usual display hex.
    pub fn from_hex(s: &str) -> Result<Txid, Error> {
        let data = decode_hex("txid", s)?;
        match Txid::from_slice(&data) {
            Some(txid) => Ok(Txid::from_display_bytes(txid.0)),
            None => Err(Error::InvalidParameterLength { what: "txid", expected: 32, got: data.len() }),
        }
    }
}

/// A reference to an output of a previous transaction.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct OutPoint {
    /// Transaction containing the output
    pub txid: Txid,
    /// Index of the output
    pub vout: u32,
}

impl OutPoint {
    /// Build an outpoint
    pub fn new(txid: Txid, vout: u32) -> OutPoint {
        OutPoint { txid: txid, vout: vout }
    }

    fn encode(&self, w: &mut ByteWriter) {
        w.push_slice(self.txid.as_bytes()).push_u32(self.vout);
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

/// A transaction input.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct TxIn {
    /// Output being spent
    pub previous_output: OutPoint,
    /// Legacy unlocking script; empty for native segwit spends
    pub script_sig: Script,
    /// nSequence, carrying the relative timelock when one is used
    pub sequence: u32,
    /// Witness stack
    pub witness: Witness,
}

impl TxIn {
    /// An input with an empty scriptSig and witness and final sequence
    pub fn new(previous_output: OutPoint) -> TxIn {
        TxIn {
            previous_output: previous_output,
            script_sig: Script::new(),
            sequence: SEQUENCE_FINAL,
            witness: Witness::new(),
        }
    }
}

/// A transaction output.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct TxOut {
    /// Value in satoshis
    pub value: Satoshis,
    /// Locking script
    pub script_pubkey: Script,
}

impl TxOut {
    fn encode(&self, w: &mut ByteWriter) {
        w.push_u64(self.value).push_var_slice(self.script_pubkey.as_bytes());
    }

    /// Serialized size in bytes
    pub fn size(&self) -> usize {
        8 + varint_len(self.script_pubkey.len() as u64) + self.script_pubkey.len()
    }
}

/// A transaction.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Transaction {
    /// Version; 2 so relative timelocks apply
    pub version: u32,
    /// Inputs
    pub input: Vec<TxIn>,
    /// Outputs
    pub output: Vec<TxOut>,
    /// nLockTime
    pub lock_time: u32,
}

impl Transaction {
    /// A version 2 transaction with zero locktime
    pub fn new(input: Vec<TxIn>, output: Vec<TxOut>) -> Transaction {
        Transaction {
            version: TX_VERSION,
            input: input,
            output: output,
            lock_time: TX_LOCKTIME,
        }
    }

    /// Whether any input carries witness data
    pub fn has_witness(&self) -> bool {
        self.input.iter().any(|i| !i.witness.is_empty())
    }

    fn encode(&self, w: &mut ByteWriter, segwit: bool) {
        w.push_u32(self.version);
        if segwit {
            w.push_u8(0x00).push_u8(0x01);
        }
        w.push_varint(self.input.len() as u64);
        for input in &self.input {
            input.previous_output.encode(w);
            w.push_var_slice(input.script_sig.as_bytes());
            w.push_u32(input.sequence);
        }
        w.push_varint(self.output.len() as u64);
        for output in &self.output {
            output.encode(w);
        }
        if segwit {
            for input in &self.input {
                input.witness.encode(w);
            }
        }
        w.push_u32(self.lock_time);
    }

    /// Full serialization, with marker, flag and witnesses when there are any
    pub fn serialize(&self) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(self.total_size());
        self.encode(&mut w, self.has_witness());
        w.into_bytes()
    }

    /// Serialization without witness data, which the txid commits to
    pub fn serialize_legacy(&self) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(self.base_size());
        self.encode(&mut w, false);
        w.into_bytes()
    }

    /// Hex of the full serialization
    pub fn to_hex(&self) -> String {
        to_hex(&self.serialize())
    }

    /// The transaction id
    pub fn txid(&self) -> Txid {
        Txid(sha256d(&self.serialize_legacy()))
    }

    /// Size without witness data
    pub fn base_size(&self) -> usize {
        let mut size = 4 + varint_len(self.input.len() as u64) + 4;
        for input in &self.input {
            size += 32 + 4 + varint_len(input.script_sig.len() as u64) + input.script_sig.len() + 4;
        }
        size += varint_len(self.output.len() as u64);
        size += self.output.iter().map(TxOut::size).sum::<usize>();
        size
    }

    /// Size with witness data
    pub fn total_size(&self) -> usize {
        if self.has_witness() {
            self.base_size() + 2 + self.input.iter().map(|i| i.witness.serialized_len()).sum::<usize>()
        } else {
            self.base_size()
        }
    }

    /// Weight units: base size counts four times, witness data once
    pub fn weight(&self) -> usize {
        self.base_size() * (WITNESS_SCALE_FACTOR - 1) + self.total_size()
    }

    /// Virtual size in vbytes, rounded up
    pub fn vsize(&self) -> usize {
        (self.weight() + WITNESS_SCALE_FACTOR - 1) / WITNESS_SCALE_FACTOR
    }

    /// Total value of the outputs; `None` on overflow
    pub fn output_value(&self) -> Option<Satoshis> {
        self.output.iter().try_fold(0u64, |acc, o| acc.checked_add(o.value))
    }

    /// Parse a transaction, rejecting trailing bytes.
    pub fn parse(data: &[u8]) -> Result<Transaction, Error> {
        let mut r = ByteReader::new(data);
        let version = r.read_u32()?;

        let segwit = r.peek_u8() == Some(0x00);
        if segwit {
            r.read_u8()?;
            if r.read_u8()? != 0x01 {
                return Err(Error::Parse("unknown segwit flag"));
            }
        }

        let n_in = r.read_varint()?;
        // every input takes at least 41 bytes
        if n_in == 0 || n_in > (r.remaining() / 41) as u64 {
            return Err(Error::Parse("bad input count"));
        }
        let mut input = Vec::with_capacity(n_in as usize);
        for _ in 0..n_in {
            let txid = Txid(r.read_hash()?);
            let vout = r.read_u32()?;
            let script_sig = Script::from_bytes(r.read_var_slice()?);
            let sequence = r.read_u32()?;
            input.push(TxIn {
                previous_output: OutPoint::new(txid, vout),
                script_sig: script_sig,
                sequence: sequence,
                witness: Witness::new(),
            });
        }

        let n_out = r.read_varint()?;
        if n_out > (r.remaining() / 9) as u64 {
            return Err(Error::Parse("bad output count"));
        }
        let mut output = Vec::with_capacity(n_out as usize);
        for _ in 0..n_out {
            let value = r.read_u64()?;
            let script_pubkey = Script::from_bytes(r.read_var_slice()?);
            output.push(TxOut { value: value, script_pubkey: script_pubkey });
        }

        if segwit {
            for txin in &mut input {
                txin.witness = Witness::decode(&mut r)?;
            }
        }
        let lock_time = r.read_u32()?;
        if r.remaining() != 0 {
            return Err(Error::Parse("trailing data after transaction"));
        }

        let tx = Transaction {
            version: version,
            input: input,
            output: output,
            lock_time: lock_time,
        };
        if segwit && !tx.has_witness() {
            return Err(Error::Parse("segwit marker without witness data"));
        }
        Ok(tx)
    }

    /// Parse a transaction from hex
    pub fn from_hex(s: &str) -> Result<Transaction, Error> {
        Transaction::parse(&decode_hex("transaction", s)?)
    }
}

impl ConcisePrintable for Transaction {
    fn fmt_concise(&self, f: &mut dyn fmt::Write) -> fmt::Result {
        write!(f, "tx {} ({} in, {} out:", self.txid(), self.input.len(), self.output.len())?;
        for o in &self.output {
            write!(f, " {}", o.value)?;
        }
        f.write_str(")")
    }
}
