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


//! # Signers
//! Signing is an external capability: a signer is given a digest and some
//! context about what it is signing, and returns a DER signature. Every
//! signature is normalized to low-S and checked before it is used.
//!

use std::collections::HashMap;

use bitcoin::secp256k1::{ecdsa, Message, PublicKey, Secp256k1, SecretKey};

use keys::{public_key, to_hex};
use sighash::SighashFlag;
use witness::EcdsaSig;
use Error;

/// What a signature is being requested for.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct SigningContext<'a> {
    /// Index of the input being signed
    pub input: usize,
    /// Sighash flag the signature will carry
    pub flag: SighashFlag,
    /// Role of the key in the spent script, e.g. "merch" or "cust-payout"
    pub key: &'a str,
}

/// Anything able to produce ECDSA signatures for one key.
pub trait Signer {
    /// The key signatures verify against
    fn public_key(&self) -> PublicKey;

    /// Sign a 32-byte digest, returning a DER signature
    fn sign_digest(&self, digest: &[u8; 32], ctx: &SigningContext) -> Result<Vec<u8>, Error>;
}

/// Signs with a secret key held in memory.
pub struct LocalSigner {
    sk: SecretKey,
    pk: PublicKey,
}

impl LocalSigner {
    /// Wrap a secret key
    pub fn new(sk: SecretKey) -> LocalSigner {
        LocalSigner {
            sk: sk,
            pk: public_key(&sk),
        }
    }
}

impl Signer for LocalSigner {
    fn public_key(&self) -> PublicKey {
        self.pk
    }

    fn sign_digest(&self, digest: &[u8; 32], _: &SigningContext) -> Result<Vec<u8>, Error> {
        let secp = Secp256k1::signing_only();
        let sig = secp.sign_ecdsa(&Message::from_digest(*digest), &self.sk);
        Ok(sig.serialize_der().to_vec())
    }
}

/// Signatures produced ahead of time by someone else, typically a
/// multiparty signing engine, indexed by the digest they sign.
pub struct Presigned {
    pk: PublicKey,
    sigs: HashMap<[u8; 32], Vec<u8>>,
}

impl Presigned {
    /// No signatures yet, for key `pk`
    pub fn new(pk: PublicKey) -> Presigned {
        Presigned {
            pk: pk,
            sigs: HashMap::new(),
        }
    }

    /// Record a DER signature for `digest`
    pub fn insert(&mut self, digest: [u8; 32], der: Vec<u8>) {
        self.sigs.insert(digest, der);
    }
}

impl Signer for Presigned {
    fn public_key(&self) -> PublicKey {
        self.pk
    }

    fn sign_digest(&self, digest: &[u8; 32], ctx: &SigningContext) -> Result<Vec<u8>, Error> {
        match self.sigs.get(digest) {
            Some(der) => Ok(der.clone()),
            None => Err(Error::Signer(format!(
                "no signature for input {} ({} key) over digest {}", ctx.input, ctx.key, to_hex(digest),
            ))),
        }
    }
}

/// Ask `signer` for a signature on `digest`, normalize it to low-S and
/// check it against the signer's key.
pub fn sign_input(
    signer: &dyn Signer,
    digest: &[u8; 32],
    ctx: &SigningContext,
) -> Result<EcdsaSig, Error> {
    let der = signer.sign_digest(digest, ctx)?;
    let mut sig = ecdsa::Signature::from_der(&der)
        .map_err(|e| Error::Signer(format!("input {}: bad DER from signer: {}", ctx.input, e)))?;
    sig.normalize_s();

    let secp = Secp256k1::verification_only();
    if secp.verify_ecdsa(&Message::from_digest(*digest), &sig, &signer.public_key()).is_err() {
        return Err(Error::InvalidSignature { input: ctx.input });
    }
    slog!(SignatureProduced, input: ctx.input, key: ctx.key, flag: ctx.flag.to_u8());
    Ok(EcdsaSig { sig: sig, flag: ctx.flag })
}
