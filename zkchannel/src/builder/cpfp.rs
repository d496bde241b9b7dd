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


//! # CPFP child
//! Spends a close's child output together with a P2WPKH UTXO of the same
//! party, so the child's fee can lift the unconfirmed close.
//!

use bitcoin::secp256k1::PublicKey;

use builder::{finish, sign, Built, Payout, TxKind, Utxo};
use keys::{p2wpkh_script_code, p2wpkh_script_pubkey};
use sighash::SighashFlag;
use signer::Signer;
use transaction::{Transaction, TxIn, TxOut};
use witness::p2wpkh_witness;
use Error;

/// Child transaction parameters.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct CpfpChild {
    /// The close's child output
    pub child: Utxo,
    /// Key the child output pays to
    pub child_pk: PublicKey,
    /// An extra UTXO bringing in the fee
    pub funding: Utxo,
    /// Key the extra UTXO pays to
    pub funding_pk: PublicKey,
    /// Where everything but the fee goes
    pub payout: Payout,
}

impl CpfpChild {
    /// Assemble and sign. `child_signer` owns the close's child output,
    /// `funding_signer` the extra UTXO.
    pub fn build(&self, child_signer: &dyn Signer, funding_signer: &dyn Signer) -> Result<Built, Error> {
        let mut tx = Transaction::new(
            vec![TxIn::new(self.child.outpoint), TxIn::new(self.funding.outpoint)],
            vec![self.payout.to_txout()],
        );
        let inputs = [
            (self.child, self.child_pk, child_signer, "cpfp"),
            (self.funding, self.funding_pk, funding_signer, "fee"),
        ];

        let mut witnesses = Vec::with_capacity(2);
        let mut spent = Vec::with_capacity(2);
        for (i, &(utxo, pk, signer, key)) in inputs.iter().enumerate() {
            if signer.public_key() != pk {
                return Err(Error::Signer(format!("input {} must be signed by {}", i, pk)));
            }
            let sig = sign(&tx, i, &p2wpkh_script_code(&pk), utxo.value, SighashFlag::ALL, signer, key)?;
            witnesses.push(p2wpkh_witness(&sig, &pk));
            spent.push(TxOut { value: utxo.value, script_pubkey: p2wpkh_script_pubkey(&pk) });
        }
        for (txin, w) in tx.input.iter_mut().zip(witnesses) {
            txin.witness = w;
        }
        finish(TxKind::CpfpChild, tx, spent, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixtures;
    use signer::LocalSigner;

    #[test]
    fn child_of_cust_close() {
        let f = fixtures::Fixture::new();
        let child = f.cpfp_child();
        assert_eq!(child.kind, TxKind::CpfpChild);
        assert_eq!(child.tx.input.len(), 2);
        assert_eq!(child.tx.output.len(), 1);
        assert_eq!(child.spent[0].value, 500);
        assert_eq!(child.fee, 20_000);
    }

    #[test]
    fn signer_must_own_the_output() {
        let f = fixtures::Fixture::new();
        let close = f.cust_close_from_escrow(true);
        let c = CpfpChild {
            child: close.utxo(3).unwrap(),
            child_pk: f.cpfp_pk,
            funding: f.extra_utxo(),
            funding_pk: f.cust_pk,
            payout: Payout { pk: f.cust_pk, value: 1_000 },
        };
        match c.build(&LocalSigner::new(f.cust_sk), &LocalSigner::new(f.cust_sk)) {
            Err(Error::Signer(_)) => {}
            r => panic!("unexpected {:?}", r),
        }
        assert!(c.build(&LocalSigner::new(f.cpfp_sk), &LocalSigner::new(f.cust_sk)).is_ok());
    }
}
