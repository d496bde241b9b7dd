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


//! # Keys
//! Key parsing, key-to-hash derivation and the revocation material
//! bound into customer close outputs
//!

use std::str::FromStr;

use bitcoin::hex::{DisplayHex, FromHex};
use bitcoin::opcodes::all::*;
use bitcoin::secp256k1::{PublicKey, Secp256k1, SecretKey};

use bytes::{hash160, sha256};
use common::constants::{HASH160_LEN, HASH256_LEN, PUBKEY_LEN};
use script::{Builder, Script};
use Error;

hash_newtype!(RevocationLock, "SHA256 commitment to a revocation secret");
hash_newtype!(RevocationSecret, "Preimage of a revocation lock");
hash_newtype!(ChannelId, "Identifier of a channel, shared by both parties");

impl RevocationSecret {
    /// The lock this secret opens.
    pub fn lock(&self) -> RevocationLock {
        RevocationLock(sha256(&self.0))
    }
}

impl RevocationLock {
    /// Whether `secret` hashes to this lock.
    pub fn is_opened_by(&self, secret: &RevocationSecret) -> bool {
        secret.lock() == *self
    }
}

/// Decode hex, mapping failures to `MalformedInput`.
pub fn decode_hex(what: &'static str, s: &str) -> Result<Vec<u8>, Error> {
    Vec::<u8>::from_hex(s).map_err(|e| Error::MalformedInput(format!("{}: {}", what, e)))
}

/// Lowercase hex of some bytes.
pub fn to_hex(data: &[u8]) -> String {
    data.to_lower_hex_string()
}

/// Check that `data` is exactly `expected` bytes long.
pub fn check_len(what: &'static str, data: &[u8], expected: usize) -> Result<(), Error> {
    if data.len() != expected {
        return Err(Error::InvalidParameterLength {
            what: what,
            expected: expected,
            got: data.len(),
        });
    }
    Ok(())
}

/// Parse a 32-byte hash given as 64 hex characters, in the order written.
pub fn parse_hash32(what: &'static str, s: &str) -> Result<[u8; 32], Error> {
    let data = decode_hex(what, s)?;
    check_len(what, &data, HASH256_LEN)?;
    let mut ret = [0; 32];
    ret.copy_from_slice(&data);
    Ok(ret)
}

/// Parse a 33-byte compressed public key.
pub fn parse_public_key(what: &'static str, data: &[u8]) -> Result<PublicKey, Error> {
    check_len(what, data, PUBKEY_LEN)?;
    Ok(PublicKey::from_slice(data)?)
}

/// Parse a compressed public key from hex.
pub fn parse_public_key_hex(what: &'static str, s: &str) -> Result<PublicKey, Error> {
    parse_public_key(what, &decode_hex(what, s)?)
}

/// Parse a secret key given either in WIF or as 32 bytes of hex.
pub fn parse_secret_key(what: &'static str, s: &str) -> Result<SecretKey, Error> {
    if s.len() == 2 * HASH256_LEN {
        let data = decode_hex(what, s)?;
        return Ok(SecretKey::from_slice(&data)?);
    }
    match bitcoin::PrivateKey::from_str(s) {
        Ok(sk) if sk.compressed => Ok(sk.inner),
        Ok(_) => Err(Error::MalformedInput(format!("{}: uncompressed WIF key", what))),
        Err(e) => Err(Error::MalformedInput(format!("{}: {}", what, e))),
    }
}

/// The compressed public key of a secret key.
pub fn public_key(sk: &SecretKey) -> PublicKey {
    let secp = Secp256k1::signing_only();
    PublicKey::from_secret_key(&secp, sk)
}

/// HASH160 of the compressed serialization of `pk`.
pub fn pubkey_hash(pk: &PublicKey) -> [u8; HASH160_LEN] {
    hash160(&pk.serialize())
}

/// Native segwit v0 pay-to-pubkey-hash output script, `0014<hash160(pk)>`.
pub fn p2wpkh_script_pubkey(pk: &PublicKey) -> Script {
    Builder::new()
        .push_int(0)
        .push_slice(&pubkey_hash(pk))
        .into_script()
}

/// The script code a P2WPKH input is signed over, `76a914<hash160(pk)>88ac`.
pub fn p2wpkh_script_code(pk: &PublicKey) -> Script {
    p2pkh_script_code(&pubkey_hash(pk))
}

/// `OP_DUP OP_HASH160 <hash> OP_EQUALVERIFY OP_CHECKSIG`
pub fn p2pkh_script_code(hash: &[u8; HASH160_LEN]) -> Script {
    Builder::new()
        .push_opcode(OP_DUP)
        .push_opcode(OP_HASH160)
        .push_slice(hash)
        .push_opcode(OP_EQUALVERIFY)
        .push_opcode(OP_CHECKSIG)
        .into_script()
}

/// The redeem script of a P2SH-wrapped P2WPKH output.
pub fn p2sh_p2wpkh_redeem_script(pk: &PublicKey) -> Script {
    p2wpkh_script_pubkey(pk)
}

/// Pay-to-script-hash output script, `a914<hash160(redeem)>87`.
pub fn p2sh_script_pubkey(redeem: &Script) -> Script {
    Builder::new()
        .push_opcode(OP_HASH160)
        .push_slice(&hash160(redeem.as_bytes()))
        .push_opcode(OP_EQUAL)
        .into_script()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pubkey_derivation() {
        // secret key 1 has the generator as its public key
        let mut one = [0u8; 32];
        one[31] = 1;
        let sk = SecretKey::from_slice(&one).unwrap();
        let pk = public_key(&sk);
        assert_eq!(
            pk.serialize()[..],
            hex!("0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798")[..],
        );
        assert_eq!(pubkey_hash(&pk), hex!("751e76e8199196d454941c45d1b3a323f1433bd6"));
        assert_eq!(
            p2wpkh_script_pubkey(&pk).as_bytes(),
            &hex!("0014751e76e8199196d454941c45d1b3a323f1433bd6")[..],
        );
        assert_eq!(
            p2wpkh_script_code(&pk).as_bytes(),
            &hex!("76a914751e76e8199196d454941c45d1b3a323f1433bd688ac")[..],
        );
        let p2sh = p2sh_script_pubkey(&p2sh_p2wpkh_redeem_script(&pk));
        assert_eq!(p2sh.len(), 23);
        assert_eq!(p2sh.as_bytes()[0], 0xa9);
        assert_eq!(p2sh.as_bytes()[22], 0x87);
    }

    #[test]
    fn parameter_lengths() {
        let short = hex!("0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f817");
        match parse_public_key("cust_pk", &short) {
            Err(Error::InvalidParameterLength { what, expected, got }) => {
                assert_eq!((what, expected, got), ("cust_pk", 33, 32));
            }
            r => panic!("unexpected {:?}", r),
        }
        assert!(parse_hash32("rev_lock", "abcd").is_err());
        match decode_hex("rev_lock", "zz") {
            Err(Error::MalformedInput(_)) => {}
            r => panic!("unexpected {:?}", r),
        }
    }

    #[test]
    fn secret_key_formats() {
        let hex_sk = "7911111111111111111111111111111111111111111111111111111111111111";
        let sk = parse_secret_key("cust_sk", hex_sk).unwrap();
        assert_eq!(sk.secret_bytes()[0], 0x79);

        // WIF for secret key 1, compressed, mainnet
        let wif = "KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU73sVHnoWn";
        let sk = parse_secret_key("merch_sk", wif).unwrap();
        assert_eq!(sk.secret_bytes()[31], 1);
        assert!(parse_secret_key("merch_sk", "not a key").is_err());
    }

    #[test]
    fn revocation() {
        let secret = RevocationSecret([0x11; 32]);
        let lock = secret.lock();
        assert!(lock.is_opened_by(&secret));
        assert!(!lock.is_opened_by(&RevocationSecret([0x12; 32])));
        assert_eq!(to_hex(&[0xab, 0x01]), "ab01");
    }
}
