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

//! # External Verifier Messages
//!
//! Some ledgers close a channel with a contract that checks an algebraic
//! signature over the channel state instead of a multisig. This module
//! encodes what such a verifier is handed: the close message and the
//! merchant's public key components, and the record both parties sign to
//! close mutually. Balances are fixed-width little-endian, identifiers are
//! raw 32-byte hashes and variable-length group elements carry a varint
//! length prefix.
//!

use std::io::{Read, Write};

use bitcoin::secp256k1::{ecdsa, Message, PublicKey, Secp256k1};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use bytes::{read_varint, sha256, write_varint};
use common::Satoshis;
use keys::{ChannelId, RevocationLock};
use Error;

/// Largest variable-length field we will decode.
pub const MAX_FIELD_LEN: usize = 1024;

/// Number of merchant public key components besides the generator.
pub const N_KEY_COMPONENTS: usize = 5;

/// Trait defining the encoding handed to an external verifier
pub trait Encodable: Sized {
    /// Encode data into a writer, returning the number of bytes written
    fn encode<W: Write>(&self, w: W) -> Result<usize, Error>;
    /// Decode data from a reader
    fn decode<R: Read>(r: R) -> Result<Self, Error>;

    /// Encode into a fresh vector. Fails only on fields over `MAX_FIELD_LEN`.
    fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let mut ret = vec![];
        self.encode(&mut ret)?;
        Ok(ret)
    }
}

impl Encodable for u64 {
    fn encode<W: Write>(&self, mut w: W) -> Result<usize, Error> {
        w.write_u64::<LittleEndian>(*self)?;
        Ok(8)
    }

    fn decode<R: Read>(mut r: R) -> Result<Self, Error> {
        Ok(r.read_u64::<LittleEndian>()?)
    }
}

impl Encodable for [u8; 32] {
    fn encode<W: Write>(&self, mut w: W) -> Result<usize, Error> {
        w.write_all(&self[..])?;
        Ok(32)
    }

    fn decode<R: Read>(mut r: R) -> Result<Self, Error> {
        let mut ret = [0; 32];
        r.read_exact(&mut ret)?;
        Ok(ret)
    }
}

impl Encodable for Vec<u8> {
    fn encode<W: Write>(&self, mut w: W) -> Result<usize, Error> {
        if self.len() > MAX_FIELD_LEN {
            return Err(Error::MalformedInput(format!(
                "field of {} bytes exceeds maximum {}", self.len(), MAX_FIELD_LEN,
            )));
        }
        let len = write_varint(&mut w, self.len() as u64)?;
        w.write_all(self)?;
        Ok(len + self.len())
    }

    fn decode<R: Read>(mut r: R) -> Result<Self, Error> {
        let len = read_varint(&mut r)?;
        if len > MAX_FIELD_LEN as u64 {
            return Err(Error::Parse("field length exceeds maximum"));
        }
        let mut ret = vec![0; len as usize];
        r.read_exact(&mut ret)?;
        Ok(ret)
    }
}

macro_rules! impl_hash_encodable {
    ($name:ident) => {
        impl Encodable for $name {
            fn encode<W: Write>(&self, w: W) -> Result<usize, Error> {
                self.as_bytes().encode(w)
            }

            fn decode<R: Read>(r: R) -> Result<Self, Error> {
                Ok($name(Encodable::decode(r)?))
            }
        }
    };
}

impl_hash_encodable!(ChannelId);
impl_hash_encodable!(RevocationLock);

/// The state a customer closes on, as checked by the verifier.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct CloseMessage {
    /// Channel being closed
    pub channel_id: ChannelId,
    /// Revocation lock of the closing state
    pub rev_lock: RevocationLock,
    /// Customer balance
    pub cust_bal: Satoshis,
    /// Merchant balance
    pub merch_bal: Satoshis,
}

impl Encodable for CloseMessage {
    fn encode<W: Write>(&self, mut w: W) -> Result<usize, Error> {
        Ok(self.channel_id.encode(&mut w)?
            + self.rev_lock.encode(&mut w)?
            + self.cust_bal.encode(&mut w)?
            + self.merch_bal.encode(&mut w)?)
    }

    fn decode<R: Read>(mut r: R) -> Result<Self, Error> {
        Ok(CloseMessage {
            channel_id: Encodable::decode(&mut r)?,
            rev_lock: Encodable::decode(&mut r)?,
            cust_bal: Encodable::decode(&mut r)?,
            merch_bal: Encodable::decode(&mut r)?,
        })
    }
}

/// The merchant's signing key for close messages: a generator and one
/// component per message field plus a constant term, as opaque group
/// element encodings.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct MerchantPublicKey {
    /// Generator
    pub g2: Vec<u8>,
    /// Components, in message field order with the constant term last
    pub components: [Vec<u8>; N_KEY_COMPONENTS],
}

impl Encodable for MerchantPublicKey {
    fn encode<W: Write>(&self, mut w: W) -> Result<usize, Error> {
        let mut len = self.g2.encode(&mut w)?;
        for c in self.components.iter() {
            len += c.encode(&mut w)?;
        }
        Ok(len)
    }

    fn decode<R: Read>(mut r: R) -> Result<Self, Error> {
        Ok(MerchantPublicKey {
            g2: Encodable::decode(&mut r)?,
            components: [
                Encodable::decode(&mut r)?,
                Encodable::decode(&mut r)?,
                Encodable::decode(&mut r)?,
                Encodable::decode(&mut r)?,
                Encodable::decode(&mut r)?,
            ],
        })
    }
}

/// A two-part signature on a close message.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct CloseSignature {
    /// First group element
    pub s1: Vec<u8>,
    /// Second group element
    pub s2: Vec<u8>,
}

impl Encodable for CloseSignature {
    fn encode<W: Write>(&self, mut w: W) -> Result<usize, Error> {
        Ok(self.s1.encode(&mut w)? + self.s2.encode(&mut w)?)
    }

    fn decode<R: Read>(mut r: R) -> Result<Self, Error> {
        Ok(CloseSignature {
            s1: Encodable::decode(&mut r)?,
            s2: Encodable::decode(&mut r)?,
        })
    }
}

/// The final split both parties sign to close without timelocks.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct MutualCloseMessage {
    /// Channel being closed
    pub channel_id: ChannelId,
    /// Where the customer is paid, as a script or address encoding
    pub cust_addr: Vec<u8>,
    /// Where the merchant is paid
    pub merch_addr: Vec<u8>,
    /// Customer balance
    pub cust_bal: Satoshis,
    /// Merchant balance
    pub merch_bal: Satoshis,
}

impl MutualCloseMessage {
    /// SHA256 of the encoding, which is what each party signs. A record
    /// with an oversized address has no digest.
    pub fn digest(&self) -> Result<[u8; 32], Error> {
        Ok(sha256(&self.to_bytes()?))
    }

    /// Whether `sig` is a valid signature of `pk` over this record.
    pub fn is_signed_by(&self, sig: &ecdsa::Signature, pk: &PublicKey) -> Result<bool, Error> {
        let secp = Secp256k1::verification_only();
        let msg = Message::from_digest(self.digest()?);
        Ok(secp.verify_ecdsa(&msg, sig, pk).is_ok())
    }
}

impl Encodable for MutualCloseMessage {
    fn encode<W: Write>(&self, mut w: W) -> Result<usize, Error> {
        Ok(self.channel_id.encode(&mut w)?
            + self.cust_addr.encode(&mut w)?
            + self.merch_addr.encode(&mut w)?
            + self.cust_bal.encode(&mut w)?
            + self.merch_bal.encode(&mut w)?)
    }

    fn decode<R: Read>(mut r: R) -> Result<Self, Error> {
        Ok(MutualCloseMessage {
            channel_id: Encodable::decode(&mut r)?,
            cust_addr: Encodable::decode(&mut r)?,
            merch_addr: Encodable::decode(&mut r)?,
            cust_bal: Encodable::decode(&mut r)?,
            merch_bal: Encodable::decode(&mut r)?,
        })
    }
}

/// An external verifier of close message signatures.
pub trait Verifier {
    /// Accept or reject `signature` on `message` under `pk`.
    fn verify(&self, message: &CloseMessage, signature: &CloseSignature, pk: &MerchantPublicKey) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    use bitcoin::secp256k1::SecretKey;

    use fixtures::{merchant_pk, HashVerifier};

    fn close_message() -> CloseMessage {
        CloseMessage {
            channel_id: ChannelId(hex!("90988a2421c40eaba101137fecccce44177b040c671fbce4ead7b129a3d1e26f")),
            rev_lock: RevocationLock(hex!("16eee90f1221a6a8c0ee8a1907f030def6e2fcc3d6ba9517410f722b1c373852")),
            cust_bal: 20_000_000,
            merch_bal: 10_000_000,
        }
    }

    #[test]
    fn close_message_layout() {
        let msg = close_message();
        let bytes = msg.to_bytes().unwrap();
        assert_eq!(bytes.len(), 80);
        assert_eq!(&bytes[..32], msg.channel_id.as_bytes());
        assert_eq!(&bytes[32..64], msg.rev_lock.as_bytes());
        assert_eq!(&bytes[64..72], &hex!("002d310100000000"));
        assert_eq!(&bytes[72..], &hex!("8096980000000000"));
        assert_eq!(CloseMessage::decode(&bytes[..]).unwrap(), msg);
    }

    #[test]
    fn merchant_key_layout() {
        let pk = merchant_pk();
        let bytes = pk.to_bytes().unwrap();
        assert_eq!(bytes.len(), 6 * (1 + 192));
        assert_eq!(bytes[0], 0xc0);
        assert_eq!(bytes[1 + 192], 0xc0);
        assert_eq!(MerchantPublicKey::decode(&bytes[..]).unwrap(), pk);

        let mut short = bytes.clone();
        short.truncate(bytes.len() - 1);
        assert!(MerchantPublicKey::decode(&short[..]).is_err());
    }

    #[test]
    fn oversized_fields() {
        let long = vec![0; MAX_FIELD_LEN + 1];
        assert!(long.encode(&mut vec![]).is_err());

        let mut data = vec![0xfd];
        data.extend(&((MAX_FIELD_LEN + 1) as u16).to_le_bytes());
        data.extend(vec![0; MAX_FIELD_LEN + 1]);
        match Vec::<u8>::decode(&data[..]) {
            Err(Error::Parse(_)) => {}
            x => panic!("unexpected {:?}", x),
        }
    }

    #[test]
    fn verifier_sees_every_field() {
        let pk = merchant_pk();
        let msg = close_message();
        let sig = HashVerifier::sign(&msg, &pk);
        assert!(HashVerifier.verify(&msg, &sig, &pk));

        let mut other = msg;
        other.cust_bal -= 1;
        other.merch_bal += 1;
        assert!(!HashVerifier.verify(&other, &sig, &pk));

        let mut other_pk = pk.clone();
        other_pk.components[4][0] ^= 1;
        assert!(!HashVerifier.verify(&msg, &sig, &other_pk));
    }

    #[test]
    fn mutual_close_signatures() {
        let secp = Secp256k1::new();
        let sk = SecretKey::from_slice(&[0x79; 32]).unwrap();
        let pk = PublicKey::from_secret_key(&secp, &sk);
        let msg = MutualCloseMessage {
            channel_id: close_message().channel_id,
            cust_addr: hex!("0014d4f9d40fdd2e1c5a7b4b9d2c9e1e7b8d5a2b2f3e").to_vec(),
            merch_addr: hex!("0014a6d1bf7e2a92f14dbc2f4a1e28e8fba1b17f4aa1").to_vec(),
            cust_bal: 19_000_000,
            merch_bal: 11_000_000,
        };
        let bytes = msg.to_bytes().unwrap();
        assert_eq!(bytes.len(), 32 + 23 + 23 + 8 + 8);
        assert_eq!(MutualCloseMessage::decode(&bytes[..]).unwrap(), msg);

        let sig = secp.sign_ecdsa(&Message::from_digest(msg.digest().unwrap()), &sk);
        assert_eq!(msg.is_signed_by(&sig, &pk).unwrap(), true);

        let mut other = msg.clone();
        other.merch_addr[2] ^= 1;
        assert_eq!(other.is_signed_by(&sig, &pk).unwrap(), false);

        // An address too long to encode has no digest, so nothing can sign it
        let mut long = msg.clone();
        long.cust_addr = vec![0x51; MAX_FIELD_LEN + 1];
        match long.digest() {
            Err(Error::MalformedInput(_)) => {}
            x => panic!("unexpected {:?}", x),
        }
        assert!(long.is_signed_by(&sig, &pk).is_err());
    }
}
