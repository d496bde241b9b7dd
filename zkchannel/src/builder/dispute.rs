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


//! # Dispute
//! The merchant's spend of a revoked cust-close output. Whichever output
//! the cust-close spent, its delayed output has the same script, so one
//! builder covers closes from the escrow and from merch-close.
//!

use builder::{finish, sign, Built, Payout, TxKind, Utxo};
use keys::RevocationSecret;
use script::CustCloseScript;
use sighash::SighashFlag;
use signer::Signer;
use transaction::{Transaction, TxIn, TxOut};
use witness::CustCloseSpend;
use Error;

/// Dispute parameters.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Dispute {
    /// The customer's delayed cust-close output
    pub utxo: Utxo,
    /// Its script
    pub cust_close: CustCloseScript,
    /// Secret revealed when the customer moved past this state
    pub secret: RevocationSecret,
    /// Where the whole output goes
    pub payout: Payout,
}

impl Dispute {
    /// Assemble and sign with the merchant's dispute key. A secret which
    /// does not open the output's lock is rejected before anything is signed.
    pub fn build(&self, merch_disp: &dyn Signer) -> Result<Built, Error> {
        if !self.cust_close.rev_lock.is_opened_by(&self.secret) {
            return Err(Error::RevocationMismatch);
        }
        if merch_disp.public_key() != self.cust_close.merch_disp_pk {
            return Err(Error::Signer("dispute must be signed by the merchant dispute key".to_owned()));
        }

        let mut tx = Transaction::new(vec![TxIn::new(self.utxo.outpoint)], vec![self.payout.to_txout()]);
        let code = self.cust_close.to_script();
        let sig = sign(&tx, 0, &code, self.utxo.value, SighashFlag::ALL, merch_disp, "merch-disp")?;
        let spend = CustCloseSpend::Dispute { secret: self.secret, merch_disp_sig: sig };
        tx.input[0].sequence = spend.sequence(&self.cust_close);
        tx.input[0].witness = spend.witness(&self.cust_close)?;

        let spent = vec![TxOut { value: self.utxo.value, script_pubkey: code.to_p2wsh() }];
        finish(TxKind::Dispute, tx, spent, None)
    }
}
