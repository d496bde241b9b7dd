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

//! # Configuration
//! Support for parsing the .toml files describing which transaction to build
//!

use std::fs;
use std::path::Path;

use bitcoin::secp256k1::{PublicKey, SecretKey};
use serde::{Deserialize, Deserializer};

use builder::{
    Built, Claim, ClaimSource, CpfpChild, CustClose, CustCloseSource, Dispute, Funding,
    FundingInput, FundingInputKind, MerchClose, MutualClose, Payout, Utxo,
};
use common::constants::Constants;
use common::Satoshis;
use fee::{allocate, CloseKind, FeeModel};
use keys::{self, public_key, RevocationLock, RevocationSecret};
use script::{CustCloseScript, EscrowScript, MerchCloseScript, RelativeDelay};
use sighash::SighashFlag;
use signer::LocalSigner;
use transaction::{OutPoint, Txid};
use Error;

/// Helper function to deserialize hex-encoded compressed public keys
pub fn deserialize_public_key<'de, D: Deserializer<'de>>(d: D)
    -> Result<PublicKey, D::Error>
{
    use serde::de::Error;

    let s = String::deserialize(d)?;
    keys::parse_public_key_hex("public key", &s).map_err(D::Error::custom)
}

/// Helper function to deserialize secret keys, given in WIF or as hex
pub fn deserialize_secret_key<'de, D: Deserializer<'de>>(d: D)
    -> Result<SecretKey, D::Error>
{
    use serde::de::Error;

    let s = String::deserialize(d)?;
    keys::parse_secret_key("secret key", &s).map_err(D::Error::custom)
}

/// Helper function to deserialize a revocation lock
pub fn deserialize_rev_lock<'de, D: Deserializer<'de>>(d: D)
    -> Result<RevocationLock, D::Error>
{
    use serde::de::Error;

    let s = String::deserialize(d)?;
    keys::parse_hash32("rev_lock", &s).map(RevocationLock).map_err(D::Error::custom)
}

/// Helper function to deserialize a revocation secret
pub fn deserialize_rev_secret<'de, D: Deserializer<'de>>(d: D)
    -> Result<RevocationSecret, D::Error>
{
    use serde::de::Error;

    let s = String::deserialize(d)?;
    keys::parse_hash32("rev_secret", &s).map(RevocationSecret).map_err(D::Error::custom)
}

/// Helper function to deserialize a txid in its usual reversed hex
pub fn deserialize_txid<'de, D: Deserializer<'de>>(d: D)
    -> Result<Txid, D::Error>
{
    use serde::de::Error;

    let s = String::deserialize(d)?;
    Txid::from_hex(&s).map_err(D::Error::custom)
}

/// Helper function to deserialize a sighash flag given as one hex byte,
/// e.g. "81" for ALL|ANYONECANPAY
pub fn deserialize_sighash<'de, D: Deserializer<'de>>(d: D)
    -> Result<SighashFlag, D::Error>
{
    use serde::de::Error;

    let s = String::deserialize(d)?;
    let data = keys::decode_hex("sighash", &s).map_err(D::Error::custom)?;
    keys::check_len("sighash", &data, 1).map_err(D::Error::custom)?;
    SighashFlag::from_u8(data[0]).map_err(D::Error::custom)
}

fn default_sighash() -> SighashFlag {
    SighashFlag::ALL
}

/// Local settings of the tool
#[derive(Clone, PartialEq, Eq, Debug, Deserialize)]
pub struct Local {
    /// Minimum level of log messages to print
    pub log_level: ::logs::Severity,
    /// Period in milliseconds over which identical messages are counted
    pub log_period_ms: Option<u64>,
    /// Maximum number of times a message may be printed per period
    pub log_max_instance_per_period: Option<u32>,
    /// Fee rate for close transactions, in satoshis per vbyte
    pub fee_rate: Option<u64>,
    /// Value of each CPFP child output
    pub cpfp_value: Option<Satoshis>,
}

impl Local {
    /// Protocol constants, with the configured values replacing the defaults
    pub fn constants(&self) -> Constants {
        let mut ret = Constants::default();
        if let Some(fee_rate) = self.fee_rate {
            ret.fee_rate = fee_rate;
        }
        if let Some(cpfp_value) = self.cpfp_value {
            ret.cpfp_value = cpfp_value;
        }
        ret
    }
}

/// An output to be spent.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Deserialize)]
pub struct UtxoConfig {
    /// Transaction holding it
    #[serde(deserialize_with = "deserialize_txid")]
    pub txid: Txid,
    /// Its index
    pub index: u32,
    /// Its value
    pub value: Satoshis,
}

impl UtxoConfig {
    /// The builder's view of this output
    pub fn to_utxo(&self) -> Utxo {
        Utxo {
            outpoint: OutPoint::new(self.txid, self.index),
            value: self.value,
        }
    }
}

/// A P2WPKH output to pay to.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Deserialize)]
pub struct PayoutConfig {
    /// Key it pays to
    #[serde(deserialize_with = "deserialize_public_key")]
    pub pk: PublicKey,
    /// Its value
    pub value: Satoshis,
}

impl PayoutConfig {
    fn to_payout(&self) -> Payout {
        Payout { pk: self.pk, value: self.value }
    }
}

/// One input to a funding transaction.
#[derive(Clone, PartialEq, Eq, Debug, Deserialize)]
pub struct FundingInputConfig {
    /// The output spent
    pub utxo: UtxoConfig,
    /// Key it is locked to
    #[serde(deserialize_with = "deserialize_secret_key")]
    pub sk: SecretKey,
    /// Whether the output is P2WPKH nested in P2SH
    #[serde(default)]
    pub nested: bool,
}

/// Keys and parameters shared by every close of one channel.
#[derive(Clone, PartialEq, Eq, Debug, Deserialize)]
pub struct ChannelConfig {
    /// Merchant's escrow key
    #[serde(deserialize_with = "deserialize_secret_key")]
    pub merch_sk: SecretKey,
    /// Customer's escrow key
    #[serde(deserialize_with = "deserialize_secret_key")]
    pub cust_sk: SecretKey,
    /// Key the merch-close output pays to after its delay
    #[serde(deserialize_with = "deserialize_public_key")]
    pub merch_close_pk: PublicKey,
    /// Merchant's dispute key
    #[serde(deserialize_with = "deserialize_public_key")]
    pub merch_disp_pk: PublicKey,
    /// Customer's payout key
    #[serde(deserialize_with = "deserialize_public_key")]
    pub cust_payout_pk: PublicKey,
    /// Merchant's payout key
    #[serde(deserialize_with = "deserialize_public_key")]
    pub merch_payout_pk: PublicKey,
    /// Key of the CPFP child outputs
    #[serde(deserialize_with = "deserialize_public_key")]
    pub cpfp_pk: PublicKey,
    /// Relative delay of the delayed close outputs, in blocks
    pub delay: u32,
}

impl ChannelConfig {
    fn escrow(&self) -> EscrowScript {
        EscrowScript {
            merch_pk: public_key(&self.merch_sk),
            cust_pk: public_key(&self.cust_sk),
        }
    }

    fn merch_close(&self) -> Result<MerchCloseScript, Error> {
        Ok(MerchCloseScript {
            merch_pk: public_key(&self.merch_sk),
            cust_pk: public_key(&self.cust_sk),
            merch_close_pk: self.merch_close_pk,
            delay: RelativeDelay::from_blocks(self.delay)?,
        })
    }

    fn cust_close(&self, rev_lock: RevocationLock) -> Result<CustCloseScript, Error> {
        Ok(CustCloseScript {
            rev_lock: rev_lock,
            merch_disp_pk: self.merch_disp_pk,
            cust_payout_pk: self.cust_payout_pk,
            delay: RelativeDelay::from_blocks(self.delay)?,
        })
    }

    fn signers(&self) -> (LocalSigner, LocalSigner) {
        (LocalSigner::new(self.merch_sk), LocalSigner::new(self.cust_sk))
    }

    fn cust_close_tx(
        &self,
        kind: CloseKind,
        source_utxo: &UtxoConfig,
        source: CustCloseSource,
        rev_lock: RevocationLock,
        cust_bal: Satoshis,
        merch_bal: Satoshis,
        model: &FeeModel,
    ) -> Result<Built, Error> {
        let alloc = allocate(kind, cust_bal, merch_bal, model)?;
        let close = CustClose::from_allocation(
            source_utxo.to_utxo(),
            source,
            self.cust_close(rev_lock)?,
            self.merch_payout_pk,
            &alloc,
            self.cpfp_pk,
        )?;
        let (merch, cust) = self.signers();
        close.build(&merch, &cust)
    }
}

/// The transaction to build.
#[derive(Clone, PartialEq, Eq, Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TxConfig {
    /// Lock both parties' contributions in the escrow
    Funding {
        /// Contributions, in input order
        inputs: Vec<FundingInputConfig>,
        /// Merchant's escrow key
        #[serde(deserialize_with = "deserialize_public_key")]
        merch_pk: PublicKey,
        /// Customer's escrow key
        #[serde(deserialize_with = "deserialize_public_key")]
        cust_pk: PublicKey,
        /// Value locked in the escrow
        escrow_value: Satoshis,
        /// Change outputs
        #[serde(default)]
        change: Vec<PayoutConfig>,
    },
    /// Merchant's unilateral close of the escrow
    MerchantClose {
        /// The channel
        channel: ChannelConfig,
        /// The escrow output
        escrow: UtxoConfig,
        /// Customer's balance
        cust_bal: Satoshis,
        /// Merchant's balance
        merch_bal: Satoshis,
        /// Flag both parties sign with
        #[serde(default = "default_sighash", deserialize_with = "deserialize_sighash")]
        sighash: SighashFlag,
    },
    /// Customer's close of the escrow on a channel state
    CustomerCloseFromEscrow {
        /// The channel
        channel: ChannelConfig,
        /// The escrow output
        escrow: UtxoConfig,
        /// Lock of the state being closed on
        #[serde(deserialize_with = "deserialize_rev_lock")]
        rev_lock: RevocationLock,
        /// Customer's balance
        cust_bal: Satoshis,
        /// Merchant's balance
        merch_bal: Satoshis,
    },
    /// Customer's answer to a merch-close
    CustomerCloseFromMerchantClose {
        /// The channel
        channel: ChannelConfig,
        /// The merch-close output
        merch_close: UtxoConfig,
        /// Lock of the state being closed on
        #[serde(deserialize_with = "deserialize_rev_lock")]
        rev_lock: RevocationLock,
        /// Customer's balance
        cust_bal: Satoshis,
        /// Merchant's balance
        merch_bal: Satoshis,
    },
    /// Customer sweeps its delayed cust-close output
    CustomerClaim {
        /// The delayed output
        utxo: UtxoConfig,
        /// Lock bound into the output
        #[serde(deserialize_with = "deserialize_rev_lock")]
        rev_lock: RevocationLock,
        /// Merchant's dispute key
        #[serde(deserialize_with = "deserialize_public_key")]
        merch_disp_pk: PublicKey,
        /// Customer's payout key, which signs the claim
        #[serde(deserialize_with = "deserialize_secret_key")]
        cust_payout_sk: SecretKey,
        /// Relative delay of the output
        delay: u32,
        /// Where the claim pays to
        payout: PayoutConfig,
    },
    /// Merchant sweeps the merch-close output after its delay
    MerchantClaim {
        /// The merch-close output
        utxo: UtxoConfig,
        /// Merchant's escrow key
        #[serde(deserialize_with = "deserialize_public_key")]
        merch_pk: PublicKey,
        /// Customer's escrow key
        #[serde(deserialize_with = "deserialize_public_key")]
        cust_pk: PublicKey,
        /// Key of the delayed branch, which signs the claim
        #[serde(deserialize_with = "deserialize_secret_key")]
        merch_close_sk: SecretKey,
        /// Relative delay of the output
        delay: u32,
        /// Where the claim pays to
        payout: PayoutConfig,
    },
    /// Merchant sweeps its P2WPKH output of a cust-close
    MerchantClaimPayout {
        /// The payout output
        utxo: UtxoConfig,
        /// Key it is locked to
        #[serde(deserialize_with = "deserialize_secret_key")]
        merch_payout_sk: SecretKey,
        /// Where the claim pays to
        payout: PayoutConfig,
    },
    /// Merchant takes a revoked cust-close output
    Dispute {
        /// The delayed output
        utxo: UtxoConfig,
        /// Secret revealed for the closed state
        #[serde(deserialize_with = "deserialize_rev_secret")]
        rev_secret: RevocationSecret,
        /// Merchant's dispute key, which signs
        #[serde(deserialize_with = "deserialize_secret_key")]
        merch_disp_sk: SecretKey,
        /// Customer's payout key
        #[serde(deserialize_with = "deserialize_public_key")]
        cust_payout_pk: PublicKey,
        /// Relative delay of the output
        delay: u32,
        /// Where the merchant is paid
        payout: PayoutConfig,
    },
    /// Cooperative close paying both final balances
    MutualClose {
        /// The channel
        channel: ChannelConfig,
        /// The escrow output
        escrow: UtxoConfig,
        /// Customer's final balance
        cust_bal: Satoshis,
        /// Merchant's final balance
        merch_bal: Satoshis,
    },
    /// Child spending a CPFP output to bump its parent's fee
    CpfpChild {
        /// The CPFP output
        child: UtxoConfig,
        /// Its key
        #[serde(deserialize_with = "deserialize_secret_key")]
        child_sk: SecretKey,
        /// P2WPKH output paying the fee
        funding: UtxoConfig,
        /// Its key
        #[serde(deserialize_with = "deserialize_secret_key")]
        funding_sk: SecretKey,
        /// Where the remainder goes
        payout: PayoutConfig,
    },
}

impl TxConfig {
    /// Name of the transaction kind, as written in the file
    pub fn name(&self) -> &'static str {
        match *self {
            TxConfig::Funding { .. } => "funding",
            TxConfig::MerchantClose { .. } => "merchant_close",
            TxConfig::CustomerCloseFromEscrow { .. } => "customer_close_from_escrow",
            TxConfig::CustomerCloseFromMerchantClose { .. } => "customer_close_from_merchant_close",
            TxConfig::CustomerClaim { .. } => "customer_claim",
            TxConfig::MerchantClaim { .. } => "merchant_claim",
            TxConfig::MerchantClaimPayout { .. } => "merchant_claim_payout",
            TxConfig::Dispute { .. } => "dispute",
            TxConfig::MutualClose { .. } => "mutual_close",
            TxConfig::CpfpChild { .. } => "cpfp_child",
        }
    }

    /// Assemble and sign the transaction. Close output values are
    /// allocated from the balances with `model`.
    pub fn build(&self, model: &FeeModel) -> Result<Built, Error> {
        match *self {
            TxConfig::Funding { ref inputs, merch_pk, cust_pk, escrow_value, ref change } => {
                let signers: Vec<LocalSigner> = inputs.iter().map(|i| LocalSigner::new(i.sk)).collect();
                let funding = Funding {
                    inputs: inputs.iter().zip(signers.iter()).map(|(i, signer)| FundingInput {
                        utxo: i.utxo.to_utxo(),
                        kind: if i.nested { FundingInputKind::P2shP2wpkh } else { FundingInputKind::P2wpkh },
                        signer: signer,
                    }).collect(),
                    escrow: EscrowScript { merch_pk: merch_pk, cust_pk: cust_pk },
                    escrow_value: escrow_value,
                    change: change.iter().map(PayoutConfig::to_payout).collect(),
                };
                funding.build()
            }
            TxConfig::MerchantClose { ref channel, ref escrow, cust_bal, merch_bal, sighash } => {
                let alloc = allocate(CloseKind::MerchClose, cust_bal, merch_bal, model)?;
                let mut close = MerchClose::from_allocation(
                    escrow.to_utxo(),
                    channel.escrow(),
                    channel.merch_close()?,
                    &alloc,
                    channel.cpfp_pk,
                )?;
                close.flag = sighash;
                let (merch, cust) = channel.signers();
                close.build(&merch, &cust)
            }
            TxConfig::CustomerCloseFromEscrow { ref channel, ref escrow, rev_lock, cust_bal, merch_bal } => {
                channel.cust_close_tx(
                    CloseKind::CloseEscrow,
                    escrow,
                    CustCloseSource::Escrow(channel.escrow()),
                    rev_lock,
                    cust_bal,
                    merch_bal,
                    model,
                )
            }
            TxConfig::CustomerCloseFromMerchantClose { ref channel, ref merch_close, rev_lock, cust_bal, merch_bal } => {
                channel.cust_close_tx(
                    CloseKind::CloseMerch,
                    merch_close,
                    CustCloseSource::MerchClose(channel.merch_close()?),
                    rev_lock,
                    cust_bal,
                    merch_bal,
                    model,
                )
            }
            TxConfig::CustomerClaim { ref utxo, rev_lock, merch_disp_pk, cust_payout_sk, delay, ref payout } => {
                let script = CustCloseScript {
                    rev_lock: rev_lock,
                    merch_disp_pk: merch_disp_pk,
                    cust_payout_pk: public_key(&cust_payout_sk),
                    delay: RelativeDelay::from_blocks(delay)?,
                };
                Claim {
                    utxo: utxo.to_utxo(),
                    source: ClaimSource::CustClose(script),
                    payout: payout.to_payout(),
                }.build(&LocalSigner::new(cust_payout_sk))
            }
            TxConfig::MerchantClaim { ref utxo, merch_pk, cust_pk, merch_close_sk, delay, ref payout } => {
                let script = MerchCloseScript {
                    merch_pk: merch_pk,
                    cust_pk: cust_pk,
                    merch_close_pk: public_key(&merch_close_sk),
                    delay: RelativeDelay::from_blocks(delay)?,
                };
                Claim {
                    utxo: utxo.to_utxo(),
                    source: ClaimSource::MerchClose(script),
                    payout: payout.to_payout(),
                }.build(&LocalSigner::new(merch_close_sk))
            }
            TxConfig::MerchantClaimPayout { ref utxo, merch_payout_sk, ref payout } => {
                Claim {
                    utxo: utxo.to_utxo(),
                    source: ClaimSource::P2wpkh(public_key(&merch_payout_sk)),
                    payout: payout.to_payout(),
                }.build(&LocalSigner::new(merch_payout_sk))
            }
            TxConfig::Dispute { ref utxo, rev_secret, merch_disp_sk, cust_payout_pk, delay, ref payout } => {
                let script = CustCloseScript {
                    rev_lock: rev_secret.lock(),
                    merch_disp_pk: public_key(&merch_disp_sk),
                    cust_payout_pk: cust_payout_pk,
                    delay: RelativeDelay::from_blocks(delay)?,
                };
                Dispute {
                    utxo: utxo.to_utxo(),
                    cust_close: script,
                    secret: rev_secret,
                    payout: payout.to_payout(),
                }.build(&LocalSigner::new(merch_disp_sk))
            }
            TxConfig::MutualClose { ref channel, ref escrow, cust_bal, merch_bal } => {
                let close = MutualClose {
                    escrow_utxo: escrow.to_utxo(),
                    escrow: channel.escrow(),
                    cust_payout: Payout { pk: channel.cust_payout_pk, value: cust_bal },
                    merch_payout: Payout { pk: channel.merch_payout_pk, value: merch_bal },
                };
                let (merch, cust) = channel.signers();
                close.build(&merch, &cust)
            }
            TxConfig::CpfpChild { ref child, child_sk, ref funding, funding_sk, ref payout } => {
                CpfpChild {
                    child: child.to_utxo(),
                    child_pk: public_key(&child_sk),
                    funding: funding.to_utxo(),
                    funding_pk: public_key(&funding_sk),
                    payout: payout.to_payout(),
                }.build(&LocalSigner::new(child_sk), &LocalSigner::new(funding_sk))
            }
        }
    }
}

/// Everything in the configuration file
#[derive(Clone, PartialEq, Eq, Debug, Deserialize)]
pub struct Configuration {
    /// Local settings
    pub local: Local,
    /// The transaction to build, if any
    pub tx: Option<TxConfig>,
}

impl Configuration {
    /// Parse a configuration from TOML text
    pub fn from_str(s: &str) -> Result<Configuration, Error> {
        ::toml::from_str(s).map_err(|e| Error::MalformedInput(format!("configuration: {}", e)))
    }

    /// Read and parse a configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Configuration, Error> {
        let path = path.as_ref();
        let s = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                slog!(ReadFailed, filename: &*path.to_string_lossy(), error: e.to_string());
                return Err(Error::Io(e));
            }
        };
        Configuration::from_str(&s)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use builder::TxKind;
    use fixtures::{sk, ESCROW_TXID};
    use keys::to_hex;

    fn pk_hex(first: u8) -> String {
        to_hex(&public_key(&sk(first)).serialize())
    }

    fn sk_hex(first: u8) -> String {
        to_hex(&sk(first).secret_bytes())
    }

    fn channel_toml() -> String {
        format!("
[tx.channel]
merch_sk = \"{}\"
cust_sk = \"{}\"
merch_close_pk = \"{}\"
merch_disp_pk = \"{}\"
cust_payout_pk = \"{}\"
merch_payout_pk = \"{}\"
cpfp_pk = \"{}\"
delay = 1487
",
            sk_hex(0x37), sk_hex(0x79), pk_hex(0x38), pk_hex(0x31),
            pk_hex(0x72), pk_hex(0x39), pk_hex(0x70),
        )
    }

    fn escrow_toml() -> String {
        format!("
[tx.escrow]
txid = \"{}\"
index = 0
value = 200000000
", ESCROW_TXID)
    }

    #[test]
    fn local_settings() {
        let config = Configuration::from_str("
[local]
log_level = \"debug\"
fee_rate = 25
").unwrap();
        assert_eq!(config.local.log_level, ::logs::Severity::Debug);
        assert_eq!(config.tx, None);
        let constants = config.local.constants();
        assert_eq!(constants.fee_rate, 25);
        assert_eq!(constants.cpfp_value, 500);
    }

    #[test]
    fn merchant_close_from_file() {
        let text = format!("
[local]
log_level = \"warn\"

[tx]
kind = \"merchant_close\"
cust_bal = 100000000
merch_bal = 100000000
{}{}", channel_toml(), escrow_toml());

        let mut file = ::tempfile::NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        let config = Configuration::from_file(file.path()).unwrap();
        let tx = config.tx.unwrap();
        assert_eq!(tx.name(), "merchant_close");
        match tx {
            TxConfig::MerchantClose { sighash, .. } => assert_eq!(sighash, SighashFlag::ALL),
            _ => panic!("wrong kind"),
        }

        let model = FeeModel::new(10, 500).unwrap();
        let built = tx.build(&model).unwrap();
        assert_eq!(built.kind, TxKind::MerchantClose);
        assert_eq!(built.fee, model.fee(CloseKind::MerchClose).unwrap());
        assert_eq!(built.tx.output.len(), 2);
        assert_eq!(built.tx.output[1].value, 500);
    }

    #[test]
    fn customer_close_with_flag_and_lock() {
        let text = format!("
[local]
log_level = \"info\"

[tx]
kind = \"customer_close_from_escrow\"
rev_lock = \"{}\"
cust_bal = 150000000
merch_bal = 50000000
{}{}", to_hex(&[0x42; 32]), channel_toml(), escrow_toml());

        let tx = Configuration::from_str(&text).unwrap().tx.unwrap();
        let built = tx.build(&FeeModel::new(10, 500).unwrap()).unwrap();
        assert_eq!(built.kind, TxKind::CustomerCloseFromEscrow);
        // the merchant is paid its whole balance
        assert!(built.tx.output.iter().any(|o| o.value == 50_000_000));
    }

    #[test]
    fn sighash_parsing() {
        let text = format!("
[local]
log_level = \"info\"

[tx]
kind = \"merchant_close\"
cust_bal = 100000000
merch_bal = 100000000
sighash = \"81\"
{}{}", channel_toml(), escrow_toml());
        match Configuration::from_str(&text).unwrap().tx.unwrap() {
            TxConfig::MerchantClose { sighash, .. } => assert_eq!(sighash, SighashFlag::ALL_ANYONECANPAY),
            _ => panic!("wrong kind"),
        }

        let bad = text.replace("\"81\"", "\"04\"");
        assert!(Configuration::from_str(&bad).is_err());
    }

    #[test]
    fn bad_values_are_rejected() {
        // unknown kind
        let text = "[local]\nlog_level = \"info\"\n[tx]\nkind = \"steal\"\n";
        assert!(Configuration::from_str(text).is_err());

        // short public key
        let text = format!("
[local]
log_level = \"info\"

[tx]
kind = \"merchant_claim_payout\"
merch_payout_sk = \"{}\"

[tx.utxo]
txid = \"{}\"
index = 1
value = 50000000

[tx.payout]
pk = \"02abcd\"
value = 49998000
", sk_hex(0x39), ESCROW_TXID);
        match Configuration::from_str(&text) {
            Err(Error::MalformedInput(msg)) => assert!(msg.contains("public key")),
            other => panic!("unexpected {:?}", other.map(|c| c.tx)),
        }

        assert!(Configuration::from_file("/nonexistent/config.toml").is_err());
    }

    #[test]
    fn merchant_claim_payout() {
        let text = format!("
[local]
log_level = \"info\"

[tx]
kind = \"merchant_claim_payout\"
merch_payout_sk = \"{}\"

[tx.utxo]
txid = \"{}\"
index = 1
value = 50000000

[tx.payout]
pk = \"{}\"
value = 49998000
", sk_hex(0x39), ESCROW_TXID, pk_hex(0x39));
        let tx = Configuration::from_str(&text).unwrap().tx.unwrap();
        let built = tx.build(&FeeModel::new(10, 500).unwrap()).unwrap();
        assert_eq!(built.kind, TxKind::MerchantClaimPayout);
        assert_eq!(built.fee, 2000);
    }
}
