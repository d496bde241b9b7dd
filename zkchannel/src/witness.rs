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


//! # Witnesses
//! Witness stacks, signature encoding, and the spends of each script.
//! Each spend variant fixes its own branch selector and signature set.
//!

use bitcoin::secp256k1::{ecdsa, Message, PublicKey, Secp256k1};

use bytes::{ByteReader, ByteWriter, varint_len};
use keys::RevocationSecret;
use script::{CustCloseScript, EscrowScript, MerchCloseScript};
use sighash::SighashFlag;
use Error;

/// Selector which enters the IF branch of a delayed script.
pub const SELECT_IF: &[u8] = &[0x01];
/// Selector which enters the ELSE branch of a delayed script.
pub const SELECT_ELSE: &[u8] = &[];

/// The witness stack of one input.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Witness(Vec<Vec<u8>>);

impl Witness {
    /// An empty witness
    pub fn new() -> Witness {
        Witness(vec![])
    }

    /// Build from stack items, bottom first
    pub fn from_items(items: Vec<Vec<u8>>) -> Witness {
        Witness(items)
    }

    /// Push an item on top
    pub fn push(&mut self, item: &[u8]) {
        self.0.push(item.to_vec());
    }

    /// The stack items, bottom first
    pub fn items(&self) -> &[Vec<u8>] {
        &self.0
    }

    /// Copy of the stack items
    pub fn to_vec(&self) -> Vec<Vec<u8>> {
        self.0.clone()
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no items
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The top item, which for P2WSH spends is the witness script
    pub fn last(&self) -> Option<&[u8]> {
        self.0.last().map(|v| &v[..])
    }

    /// Serialized size: item count, then each item length-prefixed
    pub fn serialized_len(&self) -> usize {
        varint_len(self.0.len() as u64)
            + self.0.iter().map(|i| varint_len(i.len() as u64) + i.len()).sum::<usize>()
    }

    /// Append the serialization to `w`
    pub fn encode(&self, w: &mut ByteWriter) {
        w.push_varint(self.0.len() as u64);
        for item in &self.0 {
            w.push_var_slice(item);
        }
    }

    /// Read a witness stack
    pub fn decode(r: &mut ByteReader) -> Result<Witness, Error> {
        let n = r.read_varint()?;
        if n > r.remaining() as u64 {
            return Err(Error::Parse("bad witness item count"));
        }
        let mut items = Vec::with_capacity(n as usize);
        for _ in 0..n {
            items.push(r.read_var_slice()?);
        }
        Ok(Witness(items))
    }
}

/// An ECDSA signature as it appears in a witness: DER followed by the
/// one-byte sighash flag.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct EcdsaSig {
    /// The signature, always low-S
    pub sig: ecdsa::Signature,
    /// The sighash flag it was made with
    pub flag: SighashFlag,
}

impl EcdsaSig {
    /// Serialize as `DER || flag`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut ret = self.sig.serialize_der().to_vec();
        ret.push(self.flag.to_u8());
        ret
    }

    /// Parse `DER || flag`
    pub fn from_bytes(data: &[u8]) -> Result<EcdsaSig, Error> {
        let (flag, der) = match data.split_last() {
            Some((flag, der)) => (*flag, der),
            None => return Err(Error::Parse("empty signature")),
        };
        Ok(EcdsaSig {
            sig: ecdsa::Signature::from_der(der)?,
            flag: SighashFlag::from_u8(flag)?,
        })
    }

    /// Whether the signature is valid for `digest` under `pk`
    pub fn verifies(&self, digest: &[u8; 32], pk: &PublicKey) -> bool {
        let secp = Secp256k1::verification_only();
        let msg = Message::from_digest(*digest);
        secp.verify_ecdsa(&msg, &self.sig, pk).is_ok()
    }
}

/// The sighash flags of every signature in a witness.
///
/// Items which are not DER signatures with a valid flag (keys, secrets,
/// selectors, scripts) are skipped.
pub fn signature_flags(witness: &Witness) -> Vec<SighashFlag> {
    witness.items()
        .iter()
        .filter(|item| item.len() >= 9 && item[0] == 0x30)
        .filter_map(|item| EcdsaSig::from_bytes(item).ok())
        .map(|s| s.flag)
        .collect()
}

/// Check that two multisig signatures are in the order of `keys`.
///
/// `digests` holds the digest each signature commits to. A signature
/// which only verifies against the other key is an ordering violation;
/// one which verifies against neither is invalid.
pub fn check_multisig_order(
    input: usize,
    keys: &[PublicKey; 2],
    sigs: &[EcdsaSig; 2],
    digests: &[[u8; 32]; 2],
) -> Result<(), Error> {
    for i in 0..2 {
        if sigs[i].verifies(&digests[i], &keys[i]) {
            continue;
        }
        if sigs[i].verifies(&digests[i], &keys[1 - i]) {
            return Err(Error::SignatureOrderingViolation { input: input });
        }
        return Err(Error::InvalidSignature { input: input });
    }
    Ok(())
}

/// `[<empty>, sig_merch, sig_cust, escrow_script]`
pub fn escrow_witness(escrow: &EscrowScript, merch_sig: &EcdsaSig, cust_sig: &EcdsaSig) -> Witness {
    Witness(vec![
        vec![],
        merch_sig.to_bytes(),
        cust_sig.to_bytes(),
        escrow.to_script().into_bytes(),
    ])
}

/// `[sig, pk]`
pub fn p2wpkh_witness(sig: &EcdsaSig, pk: &PublicKey) -> Witness {
    Witness(vec![sig.to_bytes(), pk.serialize().to_vec()])
}

/// A spend of a cust-close output.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum CustCloseSpend {
    /// The merchant punishes a revoked state with its secret
    Dispute {
        /// Revocation secret of the closed state
        secret: RevocationSecret,
        /// Signature under the merchant's dispute key
        merch_disp_sig: EcdsaSig,
    },
    /// The customer claims after the delay
    Claim {
        /// Signature under the customer's payout key
        cust_sig: EcdsaSig,
    },
}

impl CustCloseSpend {
    /// The witness, ending with the selector and script. A dispute whose
    /// secret does not open the script's lock is rejected here.
    pub fn witness(&self, script: &CustCloseScript) -> Result<Witness, Error> {
        let ws = script.to_script().into_bytes();
        match *self {
            CustCloseSpend::Dispute { ref secret, ref merch_disp_sig } => {
                if !script.rev_lock.is_opened_by(secret) {
                    return Err(Error::RevocationMismatch);
                }
                Ok(Witness(vec![
                    merch_disp_sig.to_bytes(),
                    secret.to_bytes().to_vec(),
                    SELECT_IF.to_vec(),
                    ws,
                ]))
            }
            CustCloseSpend::Claim { ref cust_sig } => Ok(Witness(vec![
                cust_sig.to_bytes(),
                SELECT_ELSE.to_vec(),
                ws,
            ])),
        }
    }

    /// The nSequence the spending input needs
    pub fn sequence(&self, script: &CustCloseScript) -> u32 {
        match *self {
            CustCloseSpend::Dispute { .. } => ::common::constants::SEQUENCE_FINAL,
            CustCloseSpend::Claim { .. } => script.delay.to_sequence(),
        }
    }
}

/// A spend of a merch-close output.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum MerchCloseSpend {
    /// Both parties sign, as the customer's close does
    Cooperative {
        /// Merchant's escrow signature
        merch_sig: EcdsaSig,
        /// Customer's escrow signature
        cust_sig: EcdsaSig,
    },
    /// The merchant claims after the delay
    Claim {
        /// Signature under the merchant's close key
        merch_sig: EcdsaSig,
    },
}

impl MerchCloseSpend {
    /// The witness, ending with the selector and script
    pub fn witness(&self, script: &MerchCloseScript) -> Witness {
        let ws = script.to_script().into_bytes();
        match *self {
            MerchCloseSpend::Cooperative { ref merch_sig, ref cust_sig } => Witness(vec![
                vec![],
                merch_sig.to_bytes(),
                cust_sig.to_bytes(),
                SELECT_IF.to_vec(),
                ws,
            ]),
            MerchCloseSpend::Claim { ref merch_sig } => Witness(vec![
                merch_sig.to_bytes(),
                SELECT_ELSE.to_vec(),
                ws,
            ]),
        }
    }

    /// The nSequence the spending input needs
    pub fn sequence(&self, script: &MerchCloseScript) -> u32 {
        match *self {
            MerchCloseSpend::Cooperative { .. } => ::common::constants::SEQUENCE_FINAL,
            MerchCloseSpend::Claim { .. } => script.delay.to_sequence(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixtures;
    use sighash::SighashFlag;

    #[test]
    fn witness_serialization() {
        let w = Witness::from_items(vec![vec![], vec![0xaa; 3], vec![0x01]]);
        let mut bw = ByteWriter::new();
        w.encode(&mut bw);
        assert_eq!(bw.as_bytes(), &hex!("03 00 03aaaaaa 0101")[..]);
        assert_eq!(w.serialized_len(), bw.len());
        let mut r = ByteReader::new(bw.as_bytes());
        assert_eq!(Witness::decode(&mut r).unwrap(), w);
    }

    #[test]
    fn selectors() {
        let f = fixtures::Fixture::new();
        let sig = f.dummy_sig(SighashFlag::ALL);
        let script = f.cust_close_script();

        let claim = CustCloseSpend::Claim { cust_sig: sig };
        let w = claim.witness(&script).unwrap();
        assert_eq!(w.len(), 3);
        assert_eq!(w.items()[1], Vec::<u8>::new());
        assert_eq!(w.last().unwrap(), script.to_script().as_bytes());
        assert_eq!(claim.sequence(&script), 1487);

        let dispute = CustCloseSpend::Dispute { secret: f.secret, merch_disp_sig: sig };
        let w = dispute.witness(&script).unwrap();
        assert_eq!(w.len(), 4);
        assert_eq!(w.items()[1], f.secret.to_bytes().to_vec());
        assert_eq!(w.items()[2], vec![0x01]);
        assert_eq!(dispute.sequence(&script), 0xffff_ffff);

        let wrong = CustCloseSpend::Dispute { secret: RevocationSecret([9; 32]), merch_disp_sig: sig };
        match wrong.witness(&script) {
            Err(Error::RevocationMismatch) => {}
            r => panic!("unexpected {:?}", r),
        }

        let mscript = f.merch_close_script();
        let coop = MerchCloseSpend::Cooperative { merch_sig: sig, cust_sig: sig };
        let w = coop.witness(&mscript);
        assert_eq!(w.len(), 5);
        assert!(w.items()[0].is_empty());
        assert_eq!(w.items()[3], vec![0x01]);
        let claim = MerchCloseSpend::Claim { merch_sig: sig };
        assert_eq!(claim.witness(&mscript).items()[1], Vec::<u8>::new());
        assert_eq!(claim.sequence(&mscript), 1487);
    }

    #[test]
    fn signature_encoding() {
        let f = fixtures::Fixture::new();
        let sig = f.dummy_sig(SighashFlag::NONE_ANYONECANPAY);
        let bytes = sig.to_bytes();
        assert_eq!(*bytes.last().unwrap(), 0x82);
        assert_eq!(EcdsaSig::from_bytes(&bytes).unwrap(), sig);
        assert!(EcdsaSig::from_bytes(&[]).is_err());
        assert!(EcdsaSig::from_bytes(&bytes[..bytes.len() - 1]).is_err());
    }

    #[test]
    fn flags_of_witness() {
        let f = fixtures::Fixture::new();
        let a = f.dummy_sig(SighashFlag::ALL_ANYONECANPAY);
        let b = f.dummy_sig(SighashFlag::ALL);
        let w = escrow_witness(&f.escrow(), &a, &b);
        assert_eq!(signature_flags(&w), vec![SighashFlag::ALL_ANYONECANPAY, SighashFlag::ALL]);
        let w = p2wpkh_witness(&b, &f.cust_pk);
        assert_eq!(signature_flags(&w), vec![SighashFlag::ALL]);
    }

    #[test]
    fn multisig_order() {
        let f = fixtures::Fixture::new();
        let digest = [7u8; 32];
        let merch_sig = f.sign_digest(&f.merch_sk, &digest, SighashFlag::ALL);
        let cust_sig = f.sign_digest(&f.cust_sk, &digest, SighashFlag::ALL);
        let keys = f.escrow().keys();
        let digests = [digest, digest];

        assert!(check_multisig_order(0, &keys, &[merch_sig, cust_sig], &digests).is_ok());
        match check_multisig_order(0, &keys, &[cust_sig, merch_sig], &digests) {
            Err(Error::SignatureOrderingViolation { input: 0 }) => {}
            r => panic!("unexpected {:?}", r),
        }
        let other = f.sign_digest(&f.cpfp_sk, &digest, SighashFlag::ALL);
        match check_multisig_order(1, &keys, &[merch_sig, other], &digests) {
            Err(Error::InvalidSignature { input: 1 }) => {}
            r => panic!("unexpected {:?}", r),
        }
    }
}
