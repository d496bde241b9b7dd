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


//! # Transaction construction logs
//!

/// A transaction was assembled and passed its value checks.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct TxAssembled<'a> {
    /// Which protocol transaction this is
    pub kind: &'a str,
    /// Hex txid, in display order
    pub txid: String,
    /// Number of inputs
    pub n_inputs: usize,
    /// Number of outputs
    pub n_outputs: usize,
    /// Total value of the spent outputs
    pub input_value: u64,
    /// Implied fee, in satoshis
    pub fee: u64,
    /// Virtual size, in vbytes
    pub vsize: u64,
}

/// A signature hash was computed. Digests are sensitive so this is trace-level.
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct SighashComputed {
    /// Index of the input being signed
    pub input: usize,
    /// One-byte sighash flag
    pub flag: u8,
    /// Hex digest
    pub digest: String,
}

/// A signature was produced for an input.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize)]
pub struct SignatureProduced<'a> {
    /// Index of the input
    pub input: usize,
    /// Name of the signing key's role in the script
    pub key: &'a str,
    /// One-byte sighash flag appended to the signature
    pub flag: u8,
}

/// Extra inputs and a change output were attached to a merch-close
/// which was signed with ANYONECANPAY.
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct FeeInputsAttached {
    /// Hex txid of the resulting transaction
    pub txid: String,
    /// Number of inputs added
    pub added_inputs: usize,
    /// Value the added inputs bring in
    pub added_value: u64,
    /// Value of the change output, if any
    pub change: Option<u64>,
}

/// A witness did not satisfy the script it spends.
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct SpendCheckFailed<'a> {
    /// Which protocol transaction failed the check
    pub kind: &'a str,
    /// Index of the failing input
    pub input: usize,
    /// Stringified interpreter error
    pub error: String,
}

/// A serialized transaction was parsed.
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct TxParsed {
    /// Hex txid
    pub txid: String,
    /// Serialized size in bytes
    pub size: usize,
    /// Whether the transaction carried witness data
    pub segwit: bool,
}
