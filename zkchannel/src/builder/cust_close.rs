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


//! # Cust-close
//! The customer's close with the latest state. It spends either the
//! escrow or merch-close, pays the merchant immediately, and locks the
//! customer's balance behind the revocation lock of the state.
//!
//! Outputs, in order: the customer's delayed output, the merchant's
//! payout, the OP_RETURN carrying `rev_lock || cust_payout_pk`, and an
//! optional CPFP child output. A principal output of zero value is left
//! out.
//!

use bitcoin::secp256k1::PublicKey;

use builder::{finish, sign_escrow, sign_multisig, Built, Payout, TxKind, Utxo};
use common::Satoshis;
use fee::{Allocation, CloseKind};
use script::{CustCloseScript, EscrowScript, MerchCloseScript, Script};
use sighash::SighashFlag;
use signer::Signer;
use transaction::{Transaction, TxIn, TxOut};
use witness::MerchCloseSpend;
use Error;

/// What a cust-close spends.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum CustCloseSource {
    /// The escrow output
    Escrow(EscrowScript),
    /// The merch-close output, through its cooperative branch
    MerchClose(MerchCloseScript),
}

impl CustCloseSource {
    fn script(&self) -> Script {
        match *self {
            CustCloseSource::Escrow(ref s) => s.to_script(),
            CustCloseSource::MerchClose(ref s) => s.to_script(),
        }
    }

    fn kind(&self) -> TxKind {
        match *self {
            CustCloseSource::Escrow(..) => TxKind::CustomerCloseFromEscrow,
            CustCloseSource::MerchClose(..) => TxKind::CustomerCloseFromMerchantClose,
        }
    }

    fn close_kind(&self) -> CloseKind {
        match *self {
            CustCloseSource::Escrow(..) => CloseKind::CloseEscrow,
            CustCloseSource::MerchClose(..) => CloseKind::CloseMerch,
        }
    }
}

/// Cust-close parameters.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct CustClose {
    /// Output being spent
    pub source_utxo: Utxo,
    /// Its script
    pub source: CustCloseSource,
    /// Script of the customer's delayed output
    pub cust_close: CustCloseScript,
    /// Value of the customer's delayed output
    pub cust_value: Satoshis,
    /// The merchant's immediate payout
    pub merch_payout: Payout,
    /// Child output for fee bumping
    pub cpfp: Option<Payout>,
}

impl CustClose {
    /// Parameters from an allocation for the matching [CloseKind]
    pub fn from_allocation(
        source_utxo: Utxo,
        source: CustCloseSource,
        cust_close: CustCloseScript,
        merch_payout_pk: PublicKey,
        alloc: &Allocation,
        cpfp_pk: PublicKey,
    ) -> Result<CustClose, Error> {
        if alloc.kind != source.close_kind() || alloc.input_value != source_utxo.value {
            return Err(Error::MalformedInput(format!(
                "allocation for {} of {} does not fit {} of {}",
                alloc.kind, alloc.input_value, source.kind(), source_utxo.value,
            )));
        }
        let value = |i: usize| alloc.outputs.get(i).and_then(|o| *o).unwrap_or(0);
        Ok(CustClose {
            source_utxo: source_utxo,
            source: source,
            cust_close: cust_close,
            cust_value: value(0),
            merch_payout: Payout { pk: merch_payout_pk, value: value(1) },
            cpfp: Some(Payout { pk: cpfp_pk, value: alloc.cpfp }),
        })
    }

    /// The outputs, in transaction order
    pub fn outputs(&self) -> Vec<TxOut> {
        let mut ret = Vec::with_capacity(4);
        if self.cust_value > 0 {
            ret.push(TxOut {
                value: self.cust_value,
                script_pubkey: self.cust_close.to_script().to_p2wsh(),
            });
        }
        if self.merch_payout.value > 0 {
            ret.push(self.merch_payout.to_txout());
        }
        ret.push(TxOut { value: 0, script_pubkey: self.cust_close.op_return() });
        ret.extend(self.cpfp.iter().map(Payout::to_txout));
        ret
    }

    /// Assemble and sign. Both escrow keys sign with SIGHASH_ALL.
    pub fn build(&self, merch: &dyn Signer, cust: &dyn Signer) -> Result<Built, Error> {
        let script = self.source.script();
        let value = self.source_utxo.value;
        let mut tx = Transaction::new(vec![TxIn::new(self.source_utxo.outpoint)], self.outputs());

        let witness = match self.source {
            CustCloseSource::Escrow(ref escrow) => {
                sign_escrow(&tx, 0, escrow, value, SighashFlag::ALL, merch, cust)?
            }
            CustCloseSource::MerchClose(ref mc) => {
                let sigs = sign_multisig(
                    &tx, 0, &script, &mc.multisig_keys(), value, SighashFlag::ALL, merch, cust,
                )?;
                MerchCloseSpend::Cooperative { merch_sig: sigs[0], cust_sig: sigs[1] }.witness(mc)
            }
        };
        tx.input[0].witness = witness;

        let spent = vec![TxOut { value: value, script_pubkey: script.to_p2wsh() }];
        finish(self.source.kind(), tx, spent, None)
    }
}

#[cfg(test)]
mod tests {
    use bitcoin;
    use bitcoin::blockdata::script::Instruction;

    use super::*;
    use common::constants::{CLOSE_ESCROW_VBYTES, CLOSE_MERCH_VBYTES, SATOSHIS_PER_BITCOIN};
    use fee::{allocate, FeeModel};
    use fixtures;
    use signer::LocalSigner;

    #[test]
    fn concrete_scenario() {
        let f = fixtures::Fixture::new();
        let built = f.cust_close_from_escrow(false);
        assert_eq!(built.input_value(), 2 * SATOSHIS_PER_BITCOIN);
        assert_eq!(built.tx.input.len(), 1);
        assert_eq!(built.tx.output.len(), 3);
        assert_eq!(built.tx.output[0].value, SATOSHIS_PER_BITCOIN);
        assert_eq!(built.tx.output[1].value, SATOSHIS_PER_BITCOIN - built.fee);
        assert_eq!(built.tx.output[2].value, 0);
        let outputs: u64 = built.tx.output.iter().map(|o| o.value).sum();
        assert_eq!(outputs + built.fee, built.input_value());

        // 1487 blocks, little-endian
        let script = f.cust_close_script().to_script();
        assert!(script.as_bytes().windows(3).any(|w| w == [0x02, 0xcf, 0x05]));

        // the OP_RETURN is a single push of rev_lock || cust_payout_pk
        let op_return = &built.tx.output[2].script_pubkey;
        let mut expected = f.rev_lock.to_bytes().to_vec();
        expected.extend_from_slice(&f.cust_payout_pk.serialize());
        let ins: Vec<_> = bitcoin::Script::from_bytes(op_return.as_bytes())
            .instructions()
            .map(|i| i.unwrap())
            .collect();
        assert_eq!(ins.len(), 2);
        match ins[1] {
            Instruction::PushBytes(pb) => assert_eq!(pb.as_bytes(), &expected[..]),
            ref i => panic!("unexpected {:?}", i),
        }
    }

    #[test]
    fn allocated_closes_fit_their_size_estimates() {
        let f = fixtures::Fixture::new();
        let model = FeeModel::new(10, 500).unwrap();
        let merch = LocalSigner::new(f.merch_sk);
        let cust = LocalSigner::new(f.cust_sk);

        let alloc = allocate(CloseKind::CloseEscrow, 120_000_000, 80_000_000, &model).unwrap();
        let cc = CustClose::from_allocation(
            f.escrow_utxo(), CustCloseSource::Escrow(f.escrow()), f.cust_close_script(),
            f.merch_payout_pk, &alloc, f.cpfp_pk,
        ).unwrap();
        let built = cc.build(&merch, &cust).unwrap();
        assert_eq!(built.tx.output.len(), 4);
        assert_eq!(built.fee, alloc.fee);
        assert!(built.tx.vsize() as u64 <= CLOSE_ESCROW_VBYTES, "{}", built.tx.vsize());

        let mc = f.merch_close_params().build(&merch, &cust).unwrap();
        let alloc = allocate(CloseKind::CloseMerch, 120_000_000, 80_000_000, &model).unwrap();
        let utxo = mc.utxo(0).unwrap();
        assert_eq!(utxo.value, alloc.input_value);
        let cc = CustClose::from_allocation(
            utxo, CustCloseSource::MerchClose(f.merch_close_script()), f.cust_close_script(),
            f.merch_payout_pk, &alloc, f.cpfp_pk,
        ).unwrap();
        let built = cc.build(&merch, &cust).unwrap();
        assert_eq!(built.kind, TxKind::CustomerCloseFromMerchantClose);
        assert_eq!(built.fee, alloc.fee);
        assert!(built.tx.vsize() as u64 <= CLOSE_MERCH_VBYTES, "{}", built.tx.vsize());
        let w = built.tx.input[0].witness.items();
        assert_eq!(w.len(), 5);
        assert_eq!(w[3], vec![0x01]);
    }

    #[test]
    fn zero_principal_outputs_are_left_out() {
        let f = fixtures::Fixture::new();
        let mut cc = f.cust_close_params();
        cc.merch_payout.value = 0;
        cc.cust_value = f.escrow_utxo().value - 5_000;
        let built = cc.build(&LocalSigner::new(f.merch_sk), &LocalSigner::new(f.cust_sk)).unwrap();
        assert_eq!(built.tx.output.len(), 2);
        assert!(built.tx.output[1].script_pubkey.is_op_return());
    }

    #[test]
    fn overspending_is_rejected() {
        let f = fixtures::Fixture::new();
        let mut cc = f.cust_close_params();
        cc.cust_value = f.escrow_utxo().value;
        match cc.build(&LocalSigner::new(f.merch_sk), &LocalSigner::new(f.cust_sk)) {
            Err(Error::ValueConservationViolation { .. }) => {}
            r => panic!("unexpected {:?}", r),
        }
    }
}
