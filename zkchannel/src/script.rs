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


//! # Scripts
//! The locking scripts of a channel: the 2-of-2 escrow, the two
//! branching delayed scripts, and the OP_RETURN commitment output
//!

use std::fmt;

use bitcoin::opcodes::{self, all::*};
use bitcoin::secp256k1::PublicKey;

use bytes::{sha256, ByteWriter};
use common::constants::{HASH160_LEN, HASH256_LEN, SEQUENCE_LOCKTIME_MASK};
use common::util::{build_scriptint, parse_be_hex_u32};
use common::{BlockDelay, ConcisePrintable};
use keys::{to_hex, RevocationLock};
use Error;

/// A serialized script.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Script(Vec<u8>);

impl Script {
    /// An empty script
    pub fn new() -> Script {
        Script(vec![])
    }

    /// Wrap raw script bytes
    pub fn from_bytes(data: Vec<u8>) -> Script {
        Script(data)
    }

    /// The script bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume into the script bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the script is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// SHA256 of the script, the program of its P2WSH output
    pub fn wscript_hash(&self) -> [u8; 32] {
        sha256(&self.0)
    }

    /// The P2WSH output script committing to this script, `0020<sha256>`
    pub fn to_p2wsh(&self) -> Script {
        Builder::new()
            .push_int(0)
            .push_slice(&self.wscript_hash())
            .into_script()
    }

    /// Whether this is a v0 P2WSH output script
    pub fn is_p2wsh(&self) -> bool {
        self.0.len() == 2 + HASH256_LEN && self.0[0] == 0x00 && self.0[1] == HASH256_LEN as u8
    }

    /// Whether this is a v0 P2WPKH output script
    pub fn is_p2wpkh(&self) -> bool {
        self.0.len() == 2 + HASH160_LEN && self.0[0] == 0x00 && self.0[1] == HASH160_LEN as u8
    }

    /// Whether this is a P2SH output script
    pub fn is_p2sh(&self) -> bool {
        self.0.len() == 23
            && self.0[0] == OP_HASH160.to_u8()
            && self.0[1] == HASH160_LEN as u8
            && self.0[22] == OP_EQUAL.to_u8()
    }

    /// Whether this is a provably unspendable data output
    pub fn is_op_return(&self) -> bool {
        !self.0.is_empty() && self.0[0] == OP_RETURN.to_u8()
    }

    /// The witness program of a v0 witness output script
    pub fn witness_program(&self) -> Option<&[u8]> {
        if self.is_p2wsh() || self.is_p2wpkh() {
            Some(&self.0[2..])
        } else {
            None
        }
    }

    /// Lowercase hex
    pub fn to_hex(&self) -> String {
        to_hex(&self.0)
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Script({})", bitcoin::Script::from_bytes(&self.0))
    }
}

impl ConcisePrintable for Script {
    fn fmt_concise(&self, f: &mut dyn fmt::Write) -> fmt::Result {
        self.0[..].fmt_concise(f)
    }
}

/// Script builder on top of a [ByteWriter].
#[derive(Default)]
pub struct Builder(ByteWriter);

impl Builder {
    /// Start an empty script
    pub fn new() -> Builder {
        Builder(ByteWriter::new())
    }

    /// Push an opcode
    pub fn push_opcode(mut self, op: opcodes::Opcode) -> Builder {
        self.0.push_opcode(op);
        self
    }

    /// Push data with a minimal push opcode
    pub fn push_slice(mut self, data: &[u8]) -> Builder {
        self.0.push_data(data);
        self
    }

    /// Push a compressed public key
    pub fn push_key(self, pk: &PublicKey) -> Builder {
        self.push_slice(&pk.serialize())
    }

    /// Push a number
    pub fn push_int(mut self, n: i64) -> Builder {
        self.0.push_int(n);
        self
    }

    /// Finish the script
    pub fn into_script(self) -> Script {
        Script(self.0.into_bytes())
    }
}

/// A relative timelock in blocks, as checked by OP_CHECKSEQUENCEVERIFY.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct RelativeDelay(BlockDelay);

impl RelativeDelay {
    /// A delay of `n` blocks; must be between 1 and 65535.
    pub fn from_blocks(n: u32) -> Result<RelativeDelay, Error> {
        if n == 0 || n > SEQUENCE_LOCKTIME_MASK {
            return Err(Error::MalformedInput(format!("relative delay {} out of range", n)));
        }
        Ok(RelativeDelay(n as BlockDelay))
    }

    /// Parse a delay written as big-endian hex, e.g. "05cf" for 1487 blocks.
    pub fn from_be_hex(s: &str) -> Result<RelativeDelay, Error> {
        match parse_be_hex_u32(s) {
            Some(n) => RelativeDelay::from_blocks(n),
            None => Err(Error::MalformedInput(format!("bad delay hex {:?}", s))),
        }
    }

    /// The delay in blocks
    pub fn blocks(self) -> BlockDelay {
        self.0
    }

    /// The nSequence an input must carry to satisfy this delay
    pub fn to_sequence(self) -> u32 {
        u32::from(self.0)
    }

    /// The delay as a minimal script number
    pub fn to_script_num(self) -> Vec<u8> {
        build_scriptint(i64::from(self.0))
    }
}

impl fmt::Display for RelativeDelay {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} blocks", self.0)
    }
}

/// The 2-of-2 funding multisig. The merchant key comes first.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct EscrowScript {
    /// Merchant's escrow key
    pub merch_pk: PublicKey,
    /// Customer's escrow key
    pub cust_pk: PublicKey,
}

impl EscrowScript {
    /// `OP_2 <merch_pk> <cust_pk> OP_2 OP_CHECKMULTISIG`
    pub fn to_script(&self) -> Script {
        multisig_2of2(&self.merch_pk, &self.cust_pk)
    }

    /// The keys in script order
    pub fn keys(&self) -> [PublicKey; 2] {
        [self.merch_pk, self.cust_pk]
    }
}

fn multisig_2of2(first: &PublicKey, second: &PublicKey) -> Script {
    Builder::new()
        .push_int(2)
        .push_key(first)
        .push_key(second)
        .push_int(2)
        .push_opcode(OP_CHECKMULTISIG)
        .into_script()
}

/// Output of merch-close. The IF branch is a cooperative 2-of-2 spend,
/// the ELSE branch pays the merchant after the delay.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct MerchCloseScript {
    /// Merchant's escrow key
    pub merch_pk: PublicKey,
    /// Customer's escrow key
    pub cust_pk: PublicKey,
    /// Key the merchant claims with once the delay has passed
    pub merch_close_pk: PublicKey,
    /// Delay before the merchant may claim
    pub delay: RelativeDelay,
}

impl MerchCloseScript {
    /// `IF 2 <m> <c> 2 CHECKMULTISIG ELSE <delay> CSV DROP <merch_close_pk> CHECKSIG ENDIF`
    pub fn to_script(&self) -> Script {
        Builder::new()
            .push_opcode(OP_IF)
            .push_int(2)
            .push_key(&self.merch_pk)
            .push_key(&self.cust_pk)
            .push_int(2)
            .push_opcode(OP_CHECKMULTISIG)
            .push_opcode(OP_ELSE)
            .push_int(i64::from(self.delay.blocks()))
            .push_opcode(OP_CSV)
            .push_opcode(OP_DROP)
            .push_key(&self.merch_close_pk)
            .push_opcode(OP_CHECKSIG)
            .push_opcode(OP_ENDIF)
            .into_script()
    }

    /// The escrow keys in script order
    pub fn multisig_keys(&self) -> [PublicKey; 2] {
        [self.merch_pk, self.cust_pk]
    }
}

/// Customer's delayed output of cust-close. The IF branch lets the
/// merchant take it with the revocation secret, the ELSE branch pays the
/// customer after the delay.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct CustCloseScript {
    /// Lock of the state this close was made from
    pub rev_lock: RevocationLock,
    /// Merchant's dispute key
    pub merch_disp_pk: PublicKey,
    /// Customer's payout key
    pub cust_payout_pk: PublicKey,
    /// Delay before the customer may claim
    pub delay: RelativeDelay,
}

impl CustCloseScript {
    /// `IF SHA256 <rev_lock> EQUALVERIFY <merch_disp_pk> ELSE <delay> CSV DROP <cust_payout_pk> ENDIF CHECKSIG`
    pub fn to_script(&self) -> Script {
        Builder::new()
            .push_opcode(OP_IF)
            .push_opcode(OP_SHA256)
            .push_slice(self.rev_lock.as_bytes())
            .push_opcode(OP_EQUALVERIFY)
            .push_key(&self.merch_disp_pk)
            .push_opcode(OP_ELSE)
            .push_int(i64::from(self.delay.blocks()))
            .push_opcode(OP_CSV)
            .push_opcode(OP_DROP)
            .push_key(&self.cust_payout_pk)
            .push_opcode(OP_ENDIF)
            .push_opcode(OP_CHECKSIG)
            .into_script()
    }

    /// The OP_RETURN output published alongside this script
    pub fn op_return(&self) -> Script {
        op_return_script(&self.rev_lock, &self.cust_payout_pk)
    }
}

/// Either branching delayed script.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum DelayedScript {
    /// The customer's revocable output
    CustClose(CustCloseScript),
    /// The merchant's close output
    MerchClose(MerchCloseScript),
}

impl DelayedScript {
    /// The serialized script
    pub fn to_script(&self) -> Script {
        match *self {
            DelayedScript::CustClose(ref s) => s.to_script(),
            DelayedScript::MerchClose(ref s) => s.to_script(),
        }
    }

    /// The delay on the ELSE branch
    pub fn delay(&self) -> RelativeDelay {
        match *self {
            DelayedScript::CustClose(ref s) => s.delay,
            DelayedScript::MerchClose(ref s) => s.delay,
        }
    }

    /// The key that may spend the ELSE branch
    pub fn delayed_key(&self) -> PublicKey {
        match *self {
            DelayedScript::CustClose(ref s) => s.cust_payout_pk,
            DelayedScript::MerchClose(ref s) => s.merch_close_pk,
        }
    }
}

/// `OP_RETURN <rev_lock || cust_payout_pk>`, a single 65-byte push.
pub fn op_return_script(rev_lock: &RevocationLock, cust_payout_pk: &PublicKey) -> Script {
    let mut data = Vec::with_capacity(HASH256_LEN + 33);
    data.extend_from_slice(rev_lock.as_bytes());
    data.extend_from_slice(&cust_payout_pk.serialize());
    Builder::new()
        .push_opcode(OP_RETURN)
        .push_slice(&data)
        .into_script()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixtures;

    #[test]
    fn escrow_layout() {
        let f = fixtures::Fixture::new();
        let s = f.escrow().to_script();
        let mut expected = vec![0x52, 0x21];
        expected.extend_from_slice(&f.merch_pk.serialize());
        expected.push(0x21);
        expected.extend_from_slice(&f.cust_pk.serialize());
        expected.extend_from_slice(&[0x52, 0xae]);
        assert_eq!(s.as_bytes(), &expected[..]);

        let p2wsh = s.to_p2wsh();
        assert!(p2wsh.is_p2wsh());
        assert!(!p2wsh.is_p2wpkh());
        assert_eq!(&p2wsh.as_bytes()[..2], &[0x00, 0x20]);
        assert_eq!(&p2wsh.as_bytes()[2..], &sha256(s.as_bytes())[..]);
    }

    #[test]
    fn cust_close_layout() {
        let s = fixtures::published_cust_close_script().to_script();
        let mut expected = hex!("63 a8 20").to_vec();
        expected.extend_from_slice(&fixtures::REV_LOCK);
        expected.extend_from_slice(&hex!("88 21"));
        expected.extend_from_slice(&fixtures::MERCH_DISP_PK);
        expected.extend_from_slice(&hex!("67 02 cf05 b2 75 21"));
        expected.extend_from_slice(&fixtures::CUST_PAYOUT_PK);
        expected.extend_from_slice(&hex!("68 ac"));
        assert_eq!(s.as_bytes(), &expected[..]);
    }

    #[test]
    fn merch_close_layout() {
        let f = fixtures::Fixture::new();
        let s = f.merch_close_script().to_script();
        let b = s.as_bytes();
        assert_eq!(&b[..3], &hex!("63 52 21"));
        assert_eq!(&b[3..36], &f.merch_pk.serialize()[..]);
        assert_eq!(b[36], 0x21);
        assert_eq!(&b[37..70], &f.cust_pk.serialize()[..]);
        assert_eq!(&b[70..79], &hex!("52 ae 67 02 cf05 b2 75 21"));
        assert_eq!(&b[79..112], &f.merch_close_pk.serialize()[..]);
        assert_eq!(&b[112..], &hex!("ac 68"));
    }

    #[test]
    fn op_return_layout() {
        let s = fixtures::published_cust_close_script().op_return();
        assert_eq!(s.len(), 67);
        assert_eq!(&s.as_bytes()[..2], &[0x6a, 0x41]);
        assert_eq!(&s.as_bytes()[2..34], &fixtures::REV_LOCK[..]);
        assert_eq!(&s.as_bytes()[34..], &fixtures::CUST_PAYOUT_PK[..]);
        assert!(s.is_op_return());
    }

    #[test]
    fn delays() {
        let d = RelativeDelay::from_be_hex("05cf").unwrap();
        assert_eq!(d.blocks(), 1487);
        assert_eq!(d.to_sequence(), 1487);
        assert_eq!(d.to_script_num(), vec![0xcf, 0x05]);
        assert!(RelativeDelay::from_blocks(0).is_err());
        assert!(RelativeDelay::from_blocks(65536).is_err());
        assert!(RelativeDelay::from_blocks(65535).is_ok());
        assert!(RelativeDelay::from_be_hex("0g").is_err());

        // small delays use OP_N, large ones a 3-byte push
        let f = fixtures::Fixture::new();
        let mut c = f.cust_close_script();
        c.delay = RelativeDelay::from_blocks(16).unwrap();
        assert!(c.to_script().as_bytes().windows(3).any(|w| w == [0x67, 0x60, 0xb2]));
        c.delay = RelativeDelay::from_blocks(65535).unwrap();
        assert!(c.to_script().as_bytes().windows(6).any(|w| w == [0x67, 0x03, 0xff, 0xff, 0x00, 0xb2]));
    }

    #[test]
    fn delayed_script_accessors() {
        let f = fixtures::Fixture::new();
        let d = DelayedScript::MerchClose(f.merch_close_script());
        assert_eq!(d.delayed_key(), f.merch_close_pk);
        assert_eq!(d.delay().blocks(), 1487);
        assert_eq!(d.to_script(), f.merch_close_script().to_script());
    }
}
