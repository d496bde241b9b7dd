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


//! # Fee inputs
//!
//! Attaches a fee-paying P2WPKH input, and optionally a change output, to
//! a transaction whose signatures already exist. Existing signatures are
//! never touched, so this only works when each of them leaves out what
//! changes: ANYONECANPAY for a new input, NONE (or SINGLE at an index the
//! change does not move) for a new output.
//!

use bitcoin::secp256k1::PublicKey;

use builder::{finish, sign, Built, Payout, TxKind, Utxo};
use keys::{p2wpkh_script_code, p2wpkh_script_pubkey};
use sighash::SighashFlag;
use signer::Signer;
use transaction::{TxIn, TxOut};
use witness::{p2wpkh_witness, signature_flags};
use Error;

/// A P2WPKH output used to pay fees.
pub struct FeeInput<'a> {
    /// The output
    pub utxo: Utxo,
    /// Key it pays to
    pub pk: PublicKey,
    /// Its owner
    pub signer: &'a dyn Signer,
}

/// Check that every existing signature survives the change.
fn check_frozen(parent: &Built, adding_output: bool) -> Result<(), Error> {
    let n_outputs = parent.tx.output.len();
    for (input, txin) in parent.tx.input.iter().enumerate() {
        for flag in signature_flags(&txin.witness) {
            let output_ok = !adding_output
                || flag.base() == SighashFlag::NONE
                || (flag.base() == SighashFlag::SINGLE && input < n_outputs);
            if !flag.anyone_can_pay() || !output_ok {
                return Err(Error::FrozenSignature { input: input, flag: flag.to_u8() });
            }
        }
    }
    Ok(())
}

/// Add `fee_input`, and `change` if given, to the signed `parent`.
pub fn attach_fee_input(
    parent: &Built,
    fee_input: &FeeInput,
    change: Option<Payout>,
) -> Result<Built, Error> {
    check_frozen(parent, change.is_some())?;
    if fee_input.signer.public_key() != fee_input.pk {
        return Err(Error::Signer(format!("fee input must be signed by {}", fee_input.pk)));
    }

    let mut tx = parent.tx.clone();
    tx.input.push(TxIn::new(fee_input.utxo.outpoint));
    if let Some(ref change) = change {
        tx.output.push(change.to_txout());
    }
    let index = tx.input.len() - 1;
    let sig = sign(
        &tx, index, &p2wpkh_script_code(&fee_input.pk), fee_input.utxo.value,
        SighashFlag::ALL, fee_input.signer, "fee",
    )?;
    tx.input[index].witness = p2wpkh_witness(&sig, &fee_input.pk);

    let mut spent = parent.spent.clone();
    spent.push(TxOut { value: fee_input.utxo.value, script_pubkey: p2wpkh_script_pubkey(&fee_input.pk) });
    let built = finish(TxKind::FeeInputAttached, tx, spent, None)?;

    slog!(FeeInputsAttached,
        txid: built.tx.txid().to_string(),
        added_inputs: 1,
        added_value: fee_input.utxo.value,
        change: change.map(|c| c.value),
    );
    Ok(built)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixtures;
    use signer::LocalSigner;

    fn merch_close(f: &fixtures::Fixture, flag: SighashFlag) -> Built {
        let mut mc = f.merch_close_params();
        mc.flag = flag;
        mc.build(&LocalSigner::new(f.merch_sk), &LocalSigner::new(f.cust_sk)).unwrap()
    }

    #[test]
    fn all_anyonecanpay_takes_an_input() {
        let f = fixtures::Fixture::new();
        let parent = merch_close(&f, SighashFlag::ALL_ANYONECANPAY);
        let signer = LocalSigner::new(f.cust_sk);
        let fi = FeeInput { utxo: f.extra_utxo(), pk: f.cust_pk, signer: &signer };

        let built = attach_fee_input(&parent, &fi, None).unwrap();
        assert_eq!(built.kind, TxKind::FeeInputAttached);
        assert_eq!(built.tx.input.len(), 2);
        assert_eq!(built.tx.input[0].witness, parent.tx.input[0].witness);
        assert_eq!(built.fee, parent.fee + f.extra_utxo().value);

        let change = Payout { pk: f.cust_pk, value: 50_000 };
        match attach_fee_input(&parent, &fi, Some(change)) {
            Err(Error::FrozenSignature { input: 0, flag: 0x81 }) => {}
            r => panic!("unexpected {:?}", r),
        }
    }

    #[test]
    fn none_anyonecanpay_takes_change() {
        let f = fixtures::Fixture::new();
        let parent = merch_close(&f, SighashFlag::NONE_ANYONECANPAY);
        let signer = LocalSigner::new(f.cust_sk);
        let fi = FeeInput { utxo: f.extra_utxo(), pk: f.cust_pk, signer: &signer };
        let change = Payout { pk: f.cust_pk, value: f.extra_utxo().value - 5_000 };

        let built = attach_fee_input(&parent, &fi, Some(change)).unwrap();
        assert_eq!(built.tx.output.len(), parent.tx.output.len() + 1);
        assert_eq!(built.fee, parent.fee + 5_000);
        assert_eq!(built.tx.input[0].witness, parent.tx.input[0].witness);
    }

    #[test]
    fn sighash_all_is_frozen() {
        let f = fixtures::Fixture::new();
        let parent = merch_close(&f, SighashFlag::ALL);
        let signer = LocalSigner::new(f.cust_sk);
        let fi = FeeInput { utxo: f.extra_utxo(), pk: f.cust_pk, signer: &signer };
        match attach_fee_input(&parent, &fi, None) {
            Err(Error::FrozenSignature { input: 0, flag: 0x01 }) => {}
            r => panic!("unexpected {:?}", r),
        }
    }
}
