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

//! Keys, scripts and transactions shared by the unit tests.
//!
//! The published example close uses the escrow keys `0x79 11..` and
//! `0x37 11..`, a 2 BTC escrow split 1/1 and a delay of 1487 blocks.

use bitcoin::secp256k1::{Message, PublicKey, Secp256k1, SecretKey};

use bytes::sha256;

use builder::{Built, Claim, ClaimSource, CpfpChild, CustClose, CustCloseSource, MerchClose, Payout, Utxo};
use keys::{public_key, RevocationLock, RevocationSecret};
use script::{CustCloseScript, EscrowScript, MerchCloseScript, RelativeDelay};
use sighash::SighashFlag;
use signer::LocalSigner;
use transaction::{OutPoint, Txid};
use verifier::{CloseMessage, CloseSignature, Encodable, MerchantPublicKey, Verifier};
use witness::EcdsaSig;

/// Revocation lock of the published example close
pub const REV_LOCK: [u8; 32] = hex!("f8345a21a55dc665b65c8dcfb49488b8e4f337d5c9bb843603f7222a892ce941");
/// Merchant dispute key of the published example close
pub const MERCH_DISP_PK: [u8; 33] = hex!("0253be79afe84fd9342c1f52024379b6da6299ea98844aee23838e8e678a765f7c");
/// Customer payout key of the published example close
pub const CUST_PAYOUT_PK: [u8; 33] = hex!("03195e272df2310ded35f9958fd0c2847bf73b5b429a716c005d465009bd768641");

pub const ESCROW_TXID: &str = "f4df16149735c2963832ccaa9627f4008a06291e8b932c2fc76b3a5d62d462e1";
const EXTRA_TXID: &str = "9d7a5f7b2e4f5c0a7e1c2e6b6f1f3a8de2b7c1aa5e4b8f0d1c3b5a7f9e2d4c61";

/// The cust-close script of the published example close.
pub fn published_cust_close_script() -> CustCloseScript {
    CustCloseScript {
        rev_lock: RevocationLock(REV_LOCK),
        merch_disp_pk: PublicKey::from_slice(&MERCH_DISP_PK).unwrap(),
        cust_payout_pk: PublicKey::from_slice(&CUST_PAYOUT_PK).unwrap(),
        delay: RelativeDelay::from_blocks(1487).unwrap(),
    }
}

pub fn sk(first: u8) -> SecretKey {
    let mut data = [0x11; 32];
    data[0] = first;
    SecretKey::from_slice(&data).unwrap()
}

pub struct Fixture {
    pub cust_sk: SecretKey,
    pub merch_sk: SecretKey,
    pub cust_payout_sk: SecretKey,
    pub merch_disp_sk: SecretKey,
    pub merch_close_sk: SecretKey,
    pub merch_payout_sk: SecretKey,
    pub cpfp_sk: SecretKey,

    pub cust_pk: PublicKey,
    pub merch_pk: PublicKey,
    pub cust_payout_pk: PublicKey,
    pub merch_disp_pk: PublicKey,
    pub merch_close_pk: PublicKey,
    pub merch_payout_pk: PublicKey,
    pub cpfp_pk: PublicKey,

    pub secret: RevocationSecret,
    pub rev_lock: RevocationLock,
    pub delay: RelativeDelay,
}

impl Fixture {
    pub fn new() -> Fixture {
        let cust_sk = sk(0x79);
        let merch_sk = sk(0x37);
        let cust_payout_sk = sk(0x72);
        let merch_disp_sk = sk(0x31);
        let merch_close_sk = sk(0x38);
        let merch_payout_sk = sk(0x39);
        let cpfp_sk = sk(0x70);
        let secret = RevocationSecret(hex!("4a1b6e9de3c1c8f0f2b0c7a6e9f7c1d3b5a7e9c1d3f5b7a9c1e3f5a7b9d1f3e5"));

        Fixture {
            cust_pk: public_key(&cust_sk),
            merch_pk: public_key(&merch_sk),
            cust_payout_pk: public_key(&cust_payout_sk),
            merch_disp_pk: public_key(&merch_disp_sk),
            merch_close_pk: public_key(&merch_close_sk),
            merch_payout_pk: public_key(&merch_payout_sk),
            cpfp_pk: public_key(&cpfp_sk),
            cust_sk: cust_sk,
            merch_sk: merch_sk,
            cust_payout_sk: cust_payout_sk,
            merch_disp_sk: merch_disp_sk,
            merch_close_sk: merch_close_sk,
            merch_payout_sk: merch_payout_sk,
            cpfp_sk: cpfp_sk,
            rev_lock: secret.lock(),
            secret: secret,
            delay: RelativeDelay::from_blocks(1487).unwrap(),
        }
    }

    pub fn escrow(&self) -> EscrowScript {
        EscrowScript { merch_pk: self.merch_pk, cust_pk: self.cust_pk }
    }

    pub fn merch_close_script(&self) -> MerchCloseScript {
        MerchCloseScript {
            merch_pk: self.merch_pk,
            cust_pk: self.cust_pk,
            merch_close_pk: self.merch_close_pk,
            delay: self.delay,
        }
    }

    pub fn cust_close_script(&self) -> CustCloseScript {
        CustCloseScript {
            rev_lock: self.rev_lock,
            merch_disp_pk: self.merch_disp_pk,
            cust_payout_pk: self.cust_payout_pk,
            delay: self.delay,
        }
    }

    pub fn escrow_outpoint(&self) -> OutPoint {
        OutPoint::new(Txid::from_hex(ESCROW_TXID).unwrap(), 0)
    }

    /// The 2 BTC escrow output
    pub fn escrow_utxo(&self) -> Utxo {
        Utxo { outpoint: self.escrow_outpoint(), value: 200_000_000 }
    }

    /// A P2WPKH output of `cust_pk`, for fee inputs and CPFP children
    pub fn extra_utxo(&self) -> Utxo {
        Utxo { outpoint: OutPoint::new(Txid::from_hex(EXTRA_TXID).unwrap(), 1), value: 100_000 }
    }

    pub fn utxo(&self, fill: u8, vout: u32, value: u64) -> Utxo {
        Utxo { outpoint: OutPoint::new(Txid([fill; 32]), vout), value: value }
    }

    pub fn sign_digest(&self, sk: &SecretKey, digest: &[u8; 32], flag: SighashFlag) -> EcdsaSig {
        let secp = Secp256k1::signing_only();
        EcdsaSig {
            sig: secp.sign_ecdsa(&Message::from_digest(*digest), sk),
            flag: flag,
        }
    }

    /// A well-formed signature which verifies against nothing in particular
    pub fn dummy_sig(&self, flag: SighashFlag) -> EcdsaSig {
        self.sign_digest(&self.cust_sk, &[0x5a; 32], flag)
    }

    /// Merch-close of the escrow at 10 sat/vB with a 500 sat CPFP output
    pub fn merch_close_params(&self) -> MerchClose {
        MerchClose {
            escrow_utxo: self.escrow_utxo(),
            escrow: self.escrow(),
            merch_close: self.merch_close_script(),
            output_value: self.escrow_utxo().value - 1_810 - 500,
            cpfp: Some(Payout { pk: self.cpfp_pk, value: 500 }),
            flag: SighashFlag::ALL,
        }
    }

    /// The published example close: 1 BTC to each side, 3000 sat fee
    pub fn cust_close_params(&self) -> CustClose {
        CustClose {
            source_utxo: self.escrow_utxo(),
            source: CustCloseSource::Escrow(self.escrow()),
            cust_close: self.cust_close_script(),
            cust_value: 100_000_000,
            merch_payout: Payout { pk: self.merch_payout_pk, value: 100_000_000 - 3_000 },
            cpfp: None,
        }
    }

    /// The example close, optionally with a 500 sat CPFP output taken
    /// from the merchant's side as output 3.
    pub fn cust_close_from_escrow(&self, with_cpfp: bool) -> Built {
        let mut cc = self.cust_close_params();
        if with_cpfp {
            cc.cpfp = Some(Payout { pk: self.cpfp_pk, value: 500 });
            cc.merch_payout.value -= 500;
        }
        cc.build(&LocalSigner::new(self.merch_sk), &LocalSigner::new(self.cust_sk)).unwrap()
    }

    /// A customer claim of an example close whose script has `delay`.
    pub fn cust_claim_with_delay(&self, delay: RelativeDelay) -> Built {
        let mut cc = self.cust_close_params();
        cc.cust_close.delay = delay;
        let close = cc.build(&LocalSigner::new(self.merch_sk), &LocalSigner::new(self.cust_sk)).unwrap();
        let utxo = close.utxo(0).unwrap();
        Claim {
            utxo: utxo,
            source: ClaimSource::CustClose(cc.cust_close),
            payout: Payout { pk: self.cust_pk, value: utxo.value - 1_500 },
        }.build(&LocalSigner::new(self.cust_payout_sk)).unwrap()
    }

    /// A child spending output 3 of `cust_close_from_escrow(true)` and
    /// `extra_utxo`, paying a 20000 sat fee.
    pub fn cpfp_child(&self) -> Built {
        let close = self.cust_close_from_escrow(true);
        let child = close.utxo(3).unwrap();
        let funding = self.extra_utxo();
        CpfpChild {
            child: child,
            child_pk: self.cpfp_pk,
            funding: funding,
            funding_pk: self.cust_pk,
            payout: Payout { pk: self.cust_pk, value: child.value + funding.value - 20_000 },
        }.build(&LocalSigner::new(self.cpfp_sk), &LocalSigner::new(self.cust_sk)).unwrap()
    }
}

/// Verifier which accepts exactly the signatures produced by `sign`.
pub struct HashVerifier;

impl HashVerifier {
    pub fn sign(message: &CloseMessage, pk: &MerchantPublicKey) -> CloseSignature {
        let mut data = message.to_bytes().unwrap();
        data.extend(pk.to_bytes().unwrap());
        CloseSignature {
            s1: sha256(&data).to_vec(),
            s2: pk.g2.clone(),
        }
    }
}

impl Verifier for HashVerifier {
    fn verify(&self, message: &CloseMessage, signature: &CloseSignature, pk: &MerchantPublicKey) -> bool {
        *signature == HashVerifier::sign(message, pk)
    }
}

pub fn merchant_pk() -> MerchantPublicKey {
    MerchantPublicKey {
        g2: vec![0x0a; 192],
        components: [
            vec![0x08; 192], vec![0x01; 192], vec![0x12; 192], vec![0x14; 192], vec![0x0b; 192],
        ],
    }
}
