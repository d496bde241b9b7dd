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


//! # Mutual close
//! Both parties sign one transaction paying out the final balances
//! straight from the escrow. No timelock, no revocation.
//!

use builder::{finish, sign_escrow, Built, Payout, TxKind, Utxo};
use script::EscrowScript;
use sighash::SighashFlag;
use signer::Signer;
use transaction::{Transaction, TxIn, TxOut};
use Error;

/// Mutual close parameters.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct MutualClose {
    /// The escrow output
    pub escrow_utxo: Utxo,
    /// Its script
    pub escrow: EscrowScript,
    /// Customer's final balance
    pub cust_payout: Payout,
    /// Merchant's final balance
    pub merch_payout: Payout,
}

impl MutualClose {
    /// Assemble and sign. A party with a zero balance gets no output.
    pub fn build(&self, merch: &dyn Signer, cust: &dyn Signer) -> Result<Built, Error> {
        let output: Vec<TxOut> = [self.cust_payout, self.merch_payout]
            .iter()
            .filter(|p| p.value > 0)
            .map(Payout::to_txout)
            .collect();
        if output.is_empty() {
            return Err(Error::MalformedInput("mutual close pays nobody".to_owned()));
        }

        let mut tx = Transaction::new(vec![TxIn::new(self.escrow_utxo.outpoint)], output);
        let witness = sign_escrow(&tx, 0, &self.escrow, self.escrow_utxo.value, SighashFlag::ALL, merch, cust)?;
        tx.input[0].witness = witness;

        let spent = vec![TxOut {
            value: self.escrow_utxo.value,
            script_pubkey: self.escrow.to_script().to_p2wsh(),
        }];
        finish(TxKind::MutualClose, tx, spent, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixtures;
    use signer::LocalSigner;

    fn params(f: &fixtures::Fixture, cust: u64, merch: u64) -> MutualClose {
        MutualClose {
            escrow_utxo: f.escrow_utxo(),
            escrow: f.escrow(),
            cust_payout: Payout { pk: f.cust_payout_pk, value: cust },
            merch_payout: Payout { pk: f.merch_payout_pk, value: merch },
        }
    }

    #[test]
    fn both_sides_paid() {
        let f = fixtures::Fixture::new();
        let built = params(&f, 150_000_000, 49_998_000)
            .build(&LocalSigner::new(f.merch_sk), &LocalSigner::new(f.cust_sk))
            .unwrap();
        assert_eq!(built.tx.output.len(), 2);
        assert_eq!(built.fee, 2_000);
        assert_eq!(built.tx.input[0].sequence, 0xffff_ffff);
    }

    #[test]
    fn zero_balance_gets_no_output() {
        let f = fixtures::Fixture::new();
        let built = params(&f, 0, 199_998_000)
            .build(&LocalSigner::new(f.merch_sk), &LocalSigner::new(f.cust_sk))
            .unwrap();
        assert_eq!(built.tx.output.len(), 1);
        assert!(params(&f, 0, 0).build(&LocalSigner::new(f.merch_sk), &LocalSigner::new(f.cust_sk)).is_err());
    }
}
