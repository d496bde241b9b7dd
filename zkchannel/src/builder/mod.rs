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


//! # Transaction Builders
//!
//! One builder per protocol transaction. Each takes typed parameters and
//! signers, assembles the transaction, signs it, and hands it to
//! [finish], which refuses anything that does not conserve value, pays a
//! dust output or fails script evaluation.
//!

use std::fmt;

use bitcoin::secp256k1::PublicKey;

use common::Satoshis;
use fee::dust_limit;
use interpreter;
use keys::p2wpkh_script_pubkey;
use script::{EscrowScript, Script};
use sighash::{SighashCache, SighashFlag};
use signer::{sign_input, Signer, SigningContext};
use transaction::{OutPoint, Transaction, TxOut};
use witness::{check_multisig_order, escrow_witness, EcdsaSig, Witness};
use Error;

pub mod claim;
pub mod cpfp;
pub mod cust_close;
pub mod dispute;
pub mod fee_input;
pub mod funding;
pub mod merch_close;
pub mod mutual_close;

pub use self::claim::{Claim, ClaimSource};
pub use self::cpfp::CpfpChild;
pub use self::cust_close::{CustClose, CustCloseSource};
pub use self::dispute::Dispute;
pub use self::fee_input::{attach_fee_input, FeeInput};
pub use self::funding::{Funding, FundingInput, FundingInputKind};
pub use self::merch_close::MerchClose;
pub use self::mutual_close::MutualClose;

/// The protocol transactions.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum TxKind {
    /// Funds the escrow
    Funding,
    /// Merchant's unilateral close of the escrow
    MerchantClose,
    /// Customer's close spending the escrow
    CustomerCloseFromEscrow,
    /// Customer's close spending merch-close
    CustomerCloseFromMerchantClose,
    /// Customer takes the delayed cust-close output
    CustomerClaim,
    /// Merchant takes the delayed merch-close output
    MerchantClaim,
    /// Merchant spends its immediate cust-close output
    MerchantClaimPayout,
    /// Merchant takes a revoked cust-close output with the secret
    Dispute,
    /// Both parties close at once
    MutualClose,
    /// Child spending a close's CPFP output
    CpfpChild,
    /// Close with a fee-paying input attached
    FeeInputAttached,
}

impl TxKind {
    /// Name used in logs and configuration
    pub fn as_str(self) -> &'static str {
        match self {
            TxKind::Funding => "funding",
            TxKind::MerchantClose => "merch_close",
            TxKind::CustomerCloseFromEscrow => "cust_close_from_escrow",
            TxKind::CustomerCloseFromMerchantClose => "cust_close_from_merch_close",
            TxKind::CustomerClaim => "cust_claim",
            TxKind::MerchantClaim => "merch_claim",
            TxKind::MerchantClaimPayout => "merch_claim_payout",
            TxKind::Dispute => "dispute",
            TxKind::MutualClose => "mutual_close",
            TxKind::CpfpChild => "cpfp_child",
            TxKind::FeeInputAttached => "fee_input_attached",
        }
    }
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An output to be spent, and its value.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Utxo {
    /// Where it is
    pub outpoint: OutPoint,
    /// How much it holds
    pub value: Satoshis,
}

/// A P2WPKH payment.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Payout {
    /// Key the output pays to
    pub pk: PublicKey,
    /// Amount
    pub value: Satoshis,
}

impl Payout {
    /// The output
    pub fn to_txout(&self) -> TxOut {
        TxOut {
            value: self.value,
            script_pubkey: p2wpkh_script_pubkey(&self.pk),
        }
    }
}

/// A signed transaction together with the outputs it spends.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Built {
    /// Which protocol transaction this is
    pub kind: TxKind,
    /// The signed transaction
    pub tx: Transaction,
    /// The outputs spent by each input, in input order
    pub spent: Vec<TxOut>,
    /// Input value not paid to outputs
    pub fee: Satoshis,
}

impl Built {
    /// Hex of the signed transaction, as handed to the ledger
    pub fn to_hex(&self) -> String {
        self.tx.to_hex()
    }

    /// Total value of the spent outputs
    pub fn input_value(&self) -> Satoshis {
        self.spent.iter().map(|o| o.value).sum()
    }

    /// Index of the first output paying to `script_pubkey`
    pub fn find_output(&self, script_pubkey: &Script) -> Option<u32> {
        self.tx.output.iter()
            .position(|o| o.script_pubkey == *script_pubkey)
            .map(|i| i as u32)
    }

    /// An output of this transaction, as a [Utxo] to spend later
    pub fn utxo(&self, vout: u32) -> Option<Utxo> {
        self.tx.output.get(vout as usize).map(|o| Utxo {
            outpoint: OutPoint::new(self.tx.txid(), vout),
            value: o.value,
        })
    }
}

/// Sign one input with `signer`.
pub fn sign(
    tx: &Transaction,
    input: usize,
    script_code: &Script,
    value: Satoshis,
    flag: SighashFlag,
    signer: &dyn Signer,
    key: &str,
) -> Result<EcdsaSig, Error> {
    let digest = SighashCache::new(tx).digest(input, script_code, value, flag)?;
    sign_input(signer, &digest, &SigningContext { input: input, flag: flag, key: key })
}

/// Both signatures for a 2-of-2 input, checked to be in script key order.
pub fn sign_multisig(
    tx: &Transaction,
    input: usize,
    script_code: &Script,
    keys: &[PublicKey; 2],
    value: Satoshis,
    flag: SighashFlag,
    merch: &dyn Signer,
    cust: &dyn Signer,
) -> Result<[EcdsaSig; 2], Error> {
    let cache = SighashCache::new(tx);
    let digest = cache.digest(input, script_code, value, flag)?;
    let ctx = |key| SigningContext { input: input, flag: flag, key: key };
    let sigs = [
        sign_input(merch, &digest, &ctx("merch"))?,
        sign_input(cust, &digest, &ctx("cust"))?,
    ];
    check_multisig_order(input, keys, &sigs, &[digest, digest])?;
    Ok(sigs)
}

/// The witness of an escrow spend.
pub fn sign_escrow(
    tx: &Transaction,
    input: usize,
    escrow: &EscrowScript,
    value: Satoshis,
    flag: SighashFlag,
    merch: &dyn Signer,
    cust: &dyn Signer,
) -> Result<Witness, Error> {
    let script = escrow.to_script();
    let sigs = sign_multisig(tx, input, &script, &escrow.keys(), value, flag, merch, cust)?;
    Ok(escrow_witness(escrow, &sigs[0], &sigs[1]))
}

/// Check a signed transaction and wrap it up.
///
/// With `expected_fee`, the fee must come out exactly; otherwise any
/// non-negative fee is accepted.
pub fn finish(
    kind: TxKind,
    tx: Transaction,
    spent: Vec<TxOut>,
    expected_fee: Option<Satoshis>,
) -> Result<Built, Error> {
    if spent.len() != tx.input.len() {
        return Err(Error::MalformedInput(format!(
            "{} inputs but {} spent outputs", tx.input.len(), spent.len(),
        )));
    }
    let inputs = match spent.iter().try_fold(0u64, |acc, o| acc.checked_add(o.value)) {
        Some(v) => v,
        None => return Err(Error::MalformedInput("input value overflow".to_owned())),
    };
    let outputs = match tx.output_value() {
        Some(v) => v,
        None => return Err(Error::MalformedInput("output value overflow".to_owned())),
    };
    let fee = match inputs.checked_sub(outputs) {
        Some(fee) => fee,
        None => return Err(Error::ValueConservationViolation {
            inputs: inputs,
            outputs: outputs,
            fee: expected_fee.unwrap_or(0),
        }),
    };
    if let Some(expected) = expected_fee {
        if fee != expected {
            return Err(Error::ValueConservationViolation {
                inputs: inputs,
                outputs: outputs,
                fee: expected,
            });
        }
    }

    for (index, output) in tx.output.iter().enumerate() {
        let minimum = dust_limit(&output.script_pubkey);
        if output.value < minimum {
            return Err(Error::DustOutputViolation {
                index: index,
                value: output.value,
                minimum: minimum,
            });
        }
    }

    for (index, prev) in spent.iter().enumerate() {
        if let Err(e) = interpreter::verify_input(&tx, index, prev) {
            slog!(SpendCheckFailed, kind: kind.as_str(), input: index, error: e.to_string());
            return Err(Error::SpendFailed { input: index, error: e });
        }
    }

    let txid = tx.txid();
    slog!(TxAssembled,
        kind: kind.as_str(),
        txid: txid.to_string(),
        n_inputs: tx.input.len(),
        n_outputs: tx.output.len(),
        input_value: inputs,
        fee: fee,
        vsize: tx.vsize() as u64,
    );
    Ok(Built {
        kind: kind,
        tx: tx,
        spent: spent,
        fee: fee,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixtures;
    use transaction::TxIn;

    #[test]
    fn rejects_value_creation() {
        let f = fixtures::Fixture::new();
        let built = f.cust_close_from_escrow(false);
        let mut tx = built.tx.clone();
        tx.output[1].value += built.fee + 1;
        match finish(built.kind, tx, built.spent.clone(), None) {
            Err(Error::ValueConservationViolation { inputs, .. }) => assert_eq!(inputs, built.input_value()),
            r => panic!("unexpected {:?}", r),
        }
    }

    #[test]
    fn rejects_unexpected_fee() {
        let f = fixtures::Fixture::new();
        let built = f.cust_close_from_escrow(false);
        match finish(built.kind, built.tx.clone(), built.spent.clone(), Some(built.fee + 1)) {
            Err(Error::ValueConservationViolation { .. }) => {}
            r => panic!("unexpected {:?}", r),
        }
        assert!(finish(built.kind, built.tx.clone(), built.spent.clone(), Some(built.fee)).is_ok());
    }

    #[test]
    fn rejects_dust_and_bad_spends() {
        let f = fixtures::Fixture::new();
        let built = f.cust_close_from_escrow(false);

        // changing an output invalidates the signatures; dust is caught first
        let mut tx = built.tx.clone();
        tx.output[1].value = 293;
        match finish(built.kind, tx, built.spent.clone(), None) {
            Err(Error::DustOutputViolation { index: 1, value: 293, minimum: 294 }) => {}
            r => panic!("unexpected {:?}", r),
        }

        let mut tx = built.tx.clone();
        tx.output[1].value -= 1;
        match finish(built.kind, tx, built.spent.clone(), None) {
            Err(Error::SpendFailed { input: 0, .. }) => {}
            r => panic!("unexpected {:?}", r),
        }

        let mut tx = built.tx.clone();
        tx.input.push(TxIn::new(f.extra_utxo().outpoint));
        assert!(finish(built.kind, tx, built.spent.clone(), None).is_err());
    }

    #[test]
    fn built_helpers() {
        let f = fixtures::Fixture::new();
        let built = f.cust_close_from_escrow(true);
        let cust_spk = f.cust_close_script().to_script().to_p2wsh();
        assert_eq!(built.find_output(&cust_spk), Some(0));
        let utxo = built.utxo(0).unwrap();
        assert_eq!(utxo.outpoint.txid, built.tx.txid());
        assert_eq!(utxo.value, built.tx.output[0].value);
        assert!(built.utxo(4).is_none());
        assert_eq!(TxKind::CustomerCloseFromEscrow.to_string(), "cust_close_from_escrow");
    }
}
