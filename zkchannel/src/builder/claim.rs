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


//! # Claims
//! Spends of close outputs by their owners: the customer's delayed
//! cust-close output, the merchant's delayed merch-close output, and the
//! merchant's immediate cust-close payout.
//!

use bitcoin::secp256k1::PublicKey;

use builder::{finish, sign, Built, Payout, TxKind, Utxo};
use keys::{p2wpkh_script_code, p2wpkh_script_pubkey};
use script::{CustCloseScript, MerchCloseScript, Script};
use sighash::SighashFlag;
use signer::Signer;
use transaction::{Transaction, TxIn, TxOut};
use witness::{p2wpkh_witness, CustCloseSpend, EcdsaSig, MerchCloseSpend, Witness};
use Error;

/// The output a claim spends.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ClaimSource {
    /// The customer's delayed cust-close output
    CustClose(CustCloseScript),
    /// The merch-close output, after its delay
    MerchClose(MerchCloseScript),
    /// A P2WPKH output, such as the merchant's cust-close payout
    P2wpkh(PublicKey),
}

impl ClaimSource {
    /// Key which must sign the claim
    pub fn claim_key(&self) -> PublicKey {
        match *self {
            ClaimSource::CustClose(ref s) => s.cust_payout_pk,
            ClaimSource::MerchClose(ref s) => s.merch_close_pk,
            ClaimSource::P2wpkh(pk) => pk,
        }
    }

    fn kind(&self) -> TxKind {
        match *self {
            ClaimSource::CustClose(..) => TxKind::CustomerClaim,
            ClaimSource::MerchClose(..) => TxKind::MerchantClaim,
            ClaimSource::P2wpkh(..) => TxKind::MerchantClaimPayout,
        }
    }

    fn script_pubkey(&self) -> Script {
        match *self {
            ClaimSource::CustClose(ref s) => s.to_script().to_p2wsh(),
            ClaimSource::MerchClose(ref s) => s.to_script().to_p2wsh(),
            ClaimSource::P2wpkh(ref pk) => p2wpkh_script_pubkey(pk),
        }
    }

    fn script_code(&self) -> Script {
        match *self {
            ClaimSource::CustClose(ref s) => s.to_script(),
            ClaimSource::MerchClose(ref s) => s.to_script(),
            ClaimSource::P2wpkh(ref pk) => p2wpkh_script_code(pk),
        }
    }

    /// nSequence of the claiming input: the delay for timelocked outputs
    fn sequence(&self) -> u32 {
        match *self {
            ClaimSource::CustClose(ref s) => s.delay.to_sequence(),
            ClaimSource::MerchClose(ref s) => s.delay.to_sequence(),
            ClaimSource::P2wpkh(..) => ::common::constants::SEQUENCE_FINAL,
        }
    }

    fn witness(&self, sig: EcdsaSig) -> Result<Witness, Error> {
        match *self {
            ClaimSource::CustClose(ref s) => CustCloseSpend::Claim { cust_sig: sig }.witness(s),
            ClaimSource::MerchClose(ref s) => Ok(MerchCloseSpend::Claim { merch_sig: sig }.witness(s)),
            ClaimSource::P2wpkh(ref pk) => Ok(p2wpkh_witness(&sig, pk)),
        }
    }
}

/// Claim parameters.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Claim {
    /// Output being claimed
    pub utxo: Utxo,
    /// How it is locked
    pub source: ClaimSource,
    /// Where the funds go
    pub payout: Payout,
}

impl Claim {
    /// Assemble and sign with the claim key
    pub fn build(&self, signer: &dyn Signer) -> Result<Built, Error> {
        if signer.public_key() != self.source.claim_key() {
            return Err(Error::Signer(format!(
                "{} must be signed by {}", self.source.kind(), self.source.claim_key(),
            )));
        }
        let mut txin = TxIn::new(self.utxo.outpoint);
        txin.sequence = self.source.sequence();
        let mut tx = Transaction::new(vec![txin], vec![self.payout.to_txout()]);

        let code = self.source.script_code();
        let sig = sign(&tx, 0, &code, self.utxo.value, SighashFlag::ALL, signer, "claim")?;
        tx.input[0].witness = self.source.witness(sig)?;

        let spent = vec![TxOut { value: self.utxo.value, script_pubkey: self.source.script_pubkey() }];
        finish(self.source.kind(), tx, spent, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixtures;
    use signer::LocalSigner;

    #[test]
    fn customer_claim() {
        let f = fixtures::Fixture::new();
        let close = f.cust_close_from_escrow(true);
        let claim = Claim {
            utxo: close.utxo(0).unwrap(),
            source: ClaimSource::CustClose(f.cust_close_script()),
            payout: Payout { pk: f.cust_pk, value: close.tx.output[0].value - 1_500 },
        };
        let built = claim.build(&LocalSigner::new(f.cust_payout_sk)).unwrap();
        assert_eq!(built.kind, TxKind::CustomerClaim);
        assert_eq!(built.tx.input[0].sequence, 1487);
        assert_eq!(built.fee, 1_500);
        let w = built.tx.input[0].witness.items();
        assert_eq!(w.len(), 3);
        assert!(w[1].is_empty());
    }

    #[test]
    fn merchant_claims() {
        let f = fixtures::Fixture::new();
        let mc = f.merch_close_params().build(&LocalSigner::new(f.merch_sk), &LocalSigner::new(f.cust_sk)).unwrap();
        let utxo = mc.utxo(0).unwrap();
        let claim = Claim {
            utxo: utxo,
            source: ClaimSource::MerchClose(f.merch_close_script()),
            payout: Payout { pk: f.merch_payout_pk, value: utxo.value - 1_000 },
        };
        let built = claim.build(&LocalSigner::new(f.merch_close_sk)).unwrap();
        assert_eq!(built.kind, TxKind::MerchantClaim);
        assert_eq!(built.tx.input[0].sequence, 1487);

        let close = f.cust_close_from_escrow(true);
        let utxo = close.utxo(1).unwrap();
        let payout_claim = Claim {
            utxo: utxo,
            source: ClaimSource::P2wpkh(f.merch_payout_pk),
            payout: Payout { pk: f.merch_pk, value: utxo.value - 1_000 },
        };
        let built = payout_claim.build(&LocalSigner::new(f.merch_payout_sk)).unwrap();
        assert_eq!(built.kind, TxKind::MerchantClaimPayout);
        assert_eq!(built.tx.input[0].sequence, 0xffff_ffff);
        assert_eq!(built.tx.input[0].witness.len(), 2);
    }

    #[test]
    fn wrong_signer() {
        let f = fixtures::Fixture::new();
        let close = f.cust_close_from_escrow(true);
        let claim = Claim {
            utxo: close.utxo(0).unwrap(),
            source: ClaimSource::CustClose(f.cust_close_script()),
            payout: Payout { pk: f.cust_pk, value: 1_000_000 },
        };
        match claim.build(&LocalSigner::new(f.cust_sk)) {
            Err(Error::Signer(_)) => {}
            r => panic!("unexpected {:?}", r),
        }
    }
}
