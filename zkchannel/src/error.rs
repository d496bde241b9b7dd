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


//! # Errors
//! Failures of transaction construction and parsing
//!

use std::{error, fmt, io};

use bitcoin::secp256k1;

use common::Satoshis;
use fee;
use interpreter;

/// Library error
#[derive(Debug)]
pub enum Error {
    /// Bad hex, out-of-range number or otherwise unusable parameter
    MalformedInput(String),
    /// A key, hash or other fixed-width parameter had the wrong length
    InvalidParameterLength {
        /// What the parameter is
        what: &'static str,
        /// Required length in bytes
        expected: usize,
        /// Length that was supplied
        got: usize,
    },
    /// Outputs plus fee do not add up to the inputs
    ValueConservationViolation {
        /// Total value of spent outputs
        inputs: Satoshis,
        /// Total value of created outputs
        outputs: Satoshis,
        /// Fee the transaction was supposed to pay
        fee: Satoshis,
    },
    /// An output is below the relay dust limit for its script type
    DustOutputViolation {
        /// Output index
        index: usize,
        /// Its value
        value: Satoshis,
        /// The dust limit it needs to reach
        minimum: Satoshis,
    },
    /// Multisig signatures are not in the order of the script's keys
    SignatureOrderingViolation {
        /// Input the signatures were supplied for
        input: usize,
    },
    /// A signature does not verify against any key it was supplied for
    InvalidSignature {
        /// Input the signature was supplied for
        input: usize,
    },
    /// A change would invalidate a signature which commits to it
    FrozenSignature {
        /// Input carrying the signature
        input: usize,
        /// Sighash flag of the signature
        flag: u8,
    },
    /// A revocation secret does not hash to the lock in the script
    RevocationMismatch,
    /// The assembled witness does not satisfy the spent script
    SpendFailed {
        /// Failing input
        input: usize,
        /// Interpreter failure
        error: interpreter::Error,
    },
    /// Close outputs could not be allocated
    Fee(fee::Error),
    /// The external signer failed or returned an unusable signature
    Signer(String),
    /// secp256k1 error
    Secp(secp256k1::Error),
    /// I/O error
    Io(io::Error),
    /// A serialized structure could not be parsed
    Parse(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::MalformedInput(ref s) => write!(f, "malformed input: {}", s),
            Error::InvalidParameterLength { what, expected, got } => write!(
                f, "invalid length for {}: expected {} bytes, got {}", what, expected, got,
            ),
            Error::ValueConservationViolation { inputs, outputs, fee } => write!(
                f, "outputs {} plus fee {} do not match inputs {}", outputs, fee, inputs,
            ),
            Error::DustOutputViolation { index, value, minimum } => write!(
                f, "output {} has value {} below dust limit {}", index, value, minimum,
            ),
            Error::SignatureOrderingViolation { input } => write!(
                f, "input {}: signatures not in script key order", input,
            ),
            Error::InvalidSignature { input } => write!(f, "input {}: invalid signature", input),
            Error::FrozenSignature { input, flag } => write!(
                f, "input {}: signature with flag {:02x} commits to the change", input, flag,
            ),
            Error::RevocationMismatch => f.write_str("secret does not match revocation lock"),
            Error::SpendFailed { input, ref error } => write!(
                f, "input {}: script evaluation failed: {}", input, error,
            ),
            Error::Fee(ref e) => write!(f, "fee: {}", e),
            Error::Signer(ref s) => write!(f, "signer: {}", s),
            Error::Secp(ref e) => write!(f, "secp256k1: {}", e),
            Error::Io(ref e) => write!(f, "io: {}", e),
            Error::Parse(s) => write!(f, "parse: {}", s),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::SpendFailed { ref error, .. } => Some(error),
            Error::Fee(ref e) => Some(e),
            Error::Secp(ref e) => Some(e),
            Error::Io(ref e) => Some(e),
            _ => None,
        }
    }
}

#[doc(hidden)]
impl From<fee::Error> for Error {
    fn from(e: fee::Error) -> Error { Error::Fee(e) }
}

#[doc(hidden)]
impl From<secp256k1::Error> for Error {
    fn from(e: secp256k1::Error) -> Error { Error::Secp(e) }
}

#[doc(hidden)]
impl From<io::Error> for Error {
    fn from(e: io::Error) -> Error { Error::Io(e) }
}
