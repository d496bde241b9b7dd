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


//! # Merch-close
//! The merchant's unilateral close: the escrow moves to the merch-close
//! script, where the customer can still close with the latest state until
//! the merchant's delay has passed.
//!

use builder::{finish, sign_escrow, Built, Payout, TxKind, Utxo};
use common::Satoshis;
use fee::{Allocation, CloseKind};
use script::{EscrowScript, MerchCloseScript};
use sighash::SighashFlag;
use signer::Signer;
use transaction::{Transaction, TxIn, TxOut};
use Error;

/// Merch-close parameters.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct MerchClose {
    /// The escrow output
    pub escrow_utxo: Utxo,
    /// Its script
    pub escrow: EscrowScript,
    /// Script of the merch-close output; its multisig keys must be the escrow's
    pub merch_close: MerchCloseScript,
    /// Value of the merch-close output
    pub output_value: Satoshis,
    /// Child output for fee bumping
    pub cpfp: Option<Payout>,
    /// Flag both parties sign with. ANYONECANPAY flags let a fee input be
    /// attached later.
    pub flag: SighashFlag,
}

impl MerchClose {
    /// Parameters from an allocation made for [CloseKind::MerchClose]
    pub fn from_allocation(
        escrow_utxo: Utxo,
        escrow: EscrowScript,
        merch_close: MerchCloseScript,
        alloc: &Allocation,
        cpfp_pk: ::bitcoin::secp256k1::PublicKey,
    ) -> Result<MerchClose, Error> {
        if alloc.kind != CloseKind::MerchClose || alloc.input_value != escrow_utxo.value {
            return Err(Error::MalformedInput(format!(
                "allocation for {} of {} does not fit merch-close of {}",
                alloc.kind, alloc.input_value, escrow_utxo.value,
            )));
        }
        Ok(MerchClose {
            escrow_utxo: escrow_utxo,
            escrow: escrow,
            merch_close: merch_close,
            output_value: alloc.outputs.get(0).and_then(|o| *o).unwrap_or(0),
            cpfp: Some(Payout { pk: cpfp_pk, value: alloc.cpfp }),
            flag: SighashFlag::ALL,
        })
    }

    /// Assemble and sign
    pub fn build(&self, merch: &dyn Signer, cust: &dyn Signer) -> Result<Built, Error> {
        if self.merch_close.multisig_keys() != self.escrow.keys() {
            return Err(Error::MalformedInput("merch-close keys differ from escrow keys".to_owned()));
        }
        let mut output = vec![TxOut {
            value: self.output_value,
            script_pubkey: self.merch_close.to_script().to_p2wsh(),
        }];
        output.extend(self.cpfp.iter().map(Payout::to_txout));

        let mut tx = Transaction::new(vec![TxIn::new(self.escrow_utxo.outpoint)], output);
        let witness = sign_escrow(&tx, 0, &self.escrow, self.escrow_utxo.value, self.flag, merch, cust)?;
        tx.input[0].witness = witness;

        let spent = vec![TxOut {
            value: self.escrow_utxo.value,
            script_pubkey: self.escrow.to_script().to_p2wsh(),
        }];
        finish(TxKind::MerchantClose, tx, spent, None)
    }
}
