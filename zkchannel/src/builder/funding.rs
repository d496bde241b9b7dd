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


//! # Funding
//! The escrow funding transaction. Either party, or both, contribute
//! P2WPKH or P2SH-wrapped P2WPKH inputs and may take change back.
//!

use bitcoin::secp256k1::PublicKey;

use builder::{finish, sign, Built, Payout, TxKind, Utxo};
use common::Satoshis;
use keys::{p2sh_p2wpkh_redeem_script, p2sh_script_pubkey, p2wpkh_script_code, p2wpkh_script_pubkey};
use script::{Builder, EscrowScript, Script};
use sighash::SighashFlag;
use signer::Signer;
use transaction::{Transaction, TxIn, TxOut};
use witness::p2wpkh_witness;
use Error;

/// How a funding input's output is locked.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum FundingInputKind {
    /// Native `0014<hash160(pk)>`
    P2wpkh,
    /// The same program wrapped in P2SH
    P2shP2wpkh,
}

impl FundingInputKind {
    fn script_pubkey(self, pk: &PublicKey) -> Script {
        match self {
            FundingInputKind::P2wpkh => p2wpkh_script_pubkey(pk),
            FundingInputKind::P2shP2wpkh => p2sh_script_pubkey(&p2sh_p2wpkh_redeem_script(pk)),
        }
    }

    fn script_sig(self, pk: &PublicKey) -> Script {
        match self {
            FundingInputKind::P2wpkh => Script::new(),
            FundingInputKind::P2shP2wpkh => Builder::new()
                .push_slice(p2sh_p2wpkh_redeem_script(pk).as_bytes())
                .into_script(),
        }
    }
}

/// One contribution to the escrow.
pub struct FundingInput<'a> {
    /// Output being spent
    pub utxo: Utxo,
    /// How it is locked
    pub kind: FundingInputKind,
    /// Owner of the key it is locked to
    pub signer: &'a dyn Signer,
}

/// Funding transaction parameters.
pub struct Funding<'a> {
    /// Contributions, in input order
    pub inputs: Vec<FundingInput<'a>>,
    /// The escrow being funded
    pub escrow: EscrowScript,
    /// Value locked in the escrow
    pub escrow_value: Satoshis,
    /// Change outputs, after the escrow output
    pub change: Vec<Payout>,
}

impl<'a> Funding<'a> {
    /// Assemble and sign. Whatever the inputs bring beyond the escrow
    /// value and the change is the fee.
    pub fn build(&self) -> Result<Built, Error> {
        if self.inputs.is_empty() {
            return Err(Error::MalformedInput("funding needs at least one input".to_owned()));
        }

        let mut output = vec![TxOut {
            value: self.escrow_value,
            script_pubkey: self.escrow.to_script().to_p2wsh(),
        }];
        output.extend(self.change.iter().map(Payout::to_txout));

        let mut spent = Vec::with_capacity(self.inputs.len());
        let mut input = Vec::with_capacity(self.inputs.len());
        for fi in &self.inputs {
            let pk = fi.signer.public_key();
            let mut txin = TxIn::new(fi.utxo.outpoint);
            txin.script_sig = fi.kind.script_sig(&pk);
            input.push(txin);
            spent.push(TxOut { value: fi.utxo.value, script_pubkey: fi.kind.script_pubkey(&pk) });
        }
        let mut tx = Transaction::new(input, output);

        let mut witnesses = Vec::with_capacity(self.inputs.len());
        for (i, fi) in self.inputs.iter().enumerate() {
            let pk = fi.signer.public_key();
            let code = p2wpkh_script_code(&pk);
            let sig = sign(&tx, i, &code, fi.utxo.value, SighashFlag::ALL, fi.signer, "funding")?;
            witnesses.push(p2wpkh_witness(&sig, &pk));
        }
        for (txin, w) in tx.input.iter_mut().zip(witnesses) {
            txin.witness = w;
        }
        finish(TxKind::Funding, tx, spent, None)
    }
}
