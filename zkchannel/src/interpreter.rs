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


//! # Script Interpreter
//!
//! Evaluates the subset of Script used by channel outputs: pushes, small
//! integers, conditionals, hashing, signature checks and CSV. Segwit v0
//! rules apply throughout (minimal pushes and IF arguments, low-S,
//! NULLDUMMY, NULLFAIL, clean stack), so a spend accepted here is a spend
//! relay policy accepts.
//!

use std::{error, fmt};

use bitcoin::opcodes::all::*;
use bitcoin::script::Instruction;
use bitcoin::secp256k1::{ecdsa, Message, PublicKey, Secp256k1};

use bytes::{hash160, sha256};
use common::constants::{
    PUBKEY_LEN, SEQUENCE_LOCKTIME_DISABLE_FLAG, SEQUENCE_LOCKTIME_MASK,
    SEQUENCE_LOCKTIME_TYPE_FLAG,
};
use common::util::read_scriptint;
use common::Satoshis;
use keys::p2pkh_script_code;
use script::Script;
use sighash::{SighashCache, SighashFlag};
use transaction::{Transaction, TxOut};
use witness::Witness;

/// Largest stack element a script may push.
pub const MAX_ELEMENT_SIZE: usize = 520;
/// Largest number of keys in a CHECKMULTISIG.
pub const MAX_MULTISIG_KEYS: i64 = 20;

/// Script evaluation failure
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Error {
    /// The script finished with a false value on top
    EvalFalse,
    /// A VERIFY-family opcode found a false value
    VerifyFailed(&'static str),
    /// An opcode needed more stack elements than there were
    StackUnderflow,
    /// ELSE/ENDIF without IF, or IF without ENDIF
    UnbalancedConditional,
    /// IF argument other than empty or `0x01`
    NonMinimalIf,
    /// CHECKSEQUENCEVERIFY failed
    Locktime(&'static str),
    /// An opcode outside the supported subset was executed
    BadOpcode(u8),
    /// The script bytes do not parse, or use non-minimal pushes
    BadScript,
    /// OP_RETURN was executed
    OpReturn,
    /// A number was too long or not minimally encoded
    ScriptNumber,
    /// A pushed element is larger than allowed
    PushSize,
    /// A signature is not strict DER, high-S or has an unknown flag
    SigEncoding(&'static str),
    /// A public key is not a valid compressed key
    PubkeyType,
    /// The CHECKMULTISIG dummy element was not empty
    NullDummy,
    /// A failed signature check had a non-empty signature
    NullFail,
    /// More or less than one element was left on the stack
    CleanStack,
    /// The witness script does not hash to the witness program
    WitnessProgramMismatch,
    /// A native witness spend had a non-empty scriptSig, or a nested one
    /// had something other than the redeem script push
    WitnessMalleated,
    /// The spent output is not a v0 witness output
    UnsupportedProgram,
    /// The input index is not in the transaction
    InputIndex(usize),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::EvalFalse => f.write_str("script evaluated to false"),
            Error::VerifyFailed(op) => write!(f, "{} failed", op),
            Error::StackUnderflow => f.write_str("stack underflow"),
            Error::UnbalancedConditional => f.write_str("unbalanced conditional"),
            Error::NonMinimalIf => f.write_str("non-minimal IF argument"),
            Error::Locktime(s) => write!(f, "relative locktime: {}", s),
            Error::BadOpcode(op) => write!(f, "unsupported opcode 0x{:02x}", op),
            Error::BadScript => f.write_str("unparseable or non-minimal script"),
            Error::OpReturn => f.write_str("OP_RETURN executed"),
            Error::ScriptNumber => f.write_str("invalid script number"),
            Error::PushSize => f.write_str("push exceeds maximum element size"),
            Error::SigEncoding(s) => write!(f, "bad signature encoding: {}", s),
            Error::PubkeyType => f.write_str("public key is not compressed"),
            Error::NullDummy => f.write_str("CHECKMULTISIG dummy is not empty"),
            Error::NullFail => f.write_str("failed signature check with non-empty signature"),
            Error::CleanStack => f.write_str("stack not clean after evaluation"),
            Error::WitnessProgramMismatch => f.write_str("witness program mismatch"),
            Error::WitnessMalleated => f.write_str("unexpected scriptSig for witness spend"),
            Error::UnsupportedProgram => f.write_str("spent output is not a v0 witness output"),
            Error::InputIndex(i) => write!(f, "input {} out of range", i),
        }
    }
}

impl error::Error for Error {}

/// The parts of evaluation which depend on the spending transaction.
pub trait SignatureChecker {
    /// Check an encoded signature (DER and flag) against an encoded key.
    /// An invalid signature is `Ok(false)`; a malformed one is an error.
    fn check_sig(&self, sig: &[u8], pubkey: &[u8], script_code: &Script) -> Result<bool, Error>;

    /// Whether the input's nSequence satisfies a CSV argument
    fn check_sequence(&self, n: i64) -> bool;
}

/// Whether an input with `sequence`, in a transaction of `version`,
/// satisfies `n CHECKSEQUENCEVERIFY`. `n` must not have the disable flag.
pub fn sequence_satisfies(version: u32, sequence: u32, n: i64) -> bool {
    if version < 2 || sequence & SEQUENCE_LOCKTIME_DISABLE_FLAG != 0 {
        return false;
    }
    let mask = SEQUENCE_LOCKTIME_TYPE_FLAG | SEQUENCE_LOCKTIME_MASK;
    let tx_lock = sequence & mask;
    let script_lock = (n as u32) & mask;
    // both heights or both times
    if (tx_lock & SEQUENCE_LOCKTIME_TYPE_FLAG) != (script_lock & SEQUENCE_LOCKTIME_TYPE_FLAG) {
        return false;
    }
    (script_lock & SEQUENCE_LOCKTIME_MASK) <= (tx_lock & SEQUENCE_LOCKTIME_MASK)
}

/// Checks signatures against the BIP143 digests of one input.
pub struct TxChecker<'a> {
    tx: &'a Transaction,
    input: usize,
    value: Satoshis,
    cache: SighashCache<'a>,
}

impl<'a> TxChecker<'a> {
    /// A checker for `input` of `tx`, which spends an output worth `value`
    pub fn new(tx: &'a Transaction, input: usize, value: Satoshis) -> TxChecker<'a> {
        TxChecker {
            tx: tx,
            input: input,
            value: value,
            cache: SighashCache::new(tx),
        }
    }
}

impl<'a> SignatureChecker for TxChecker<'a> {
    fn check_sig(&self, sig: &[u8], pubkey: &[u8], script_code: &Script) -> Result<bool, Error> {
        if pubkey.len() != PUBKEY_LEN || (pubkey[0] != 0x02 && pubkey[0] != 0x03) {
            return Err(Error::PubkeyType);
        }
        let (flag, der) = match sig.split_last() {
            Some((flag, der)) => (*flag, der),
            None => return Ok(false),
        };
        let flag = SighashFlag::from_u8(flag).map_err(|_| Error::SigEncoding("unknown sighash flag"))?;
        let ecdsa_sig = ecdsa::Signature::from_der(der).map_err(|_| Error::SigEncoding("not strict DER"))?;
        let mut normalized = ecdsa_sig;
        normalized.normalize_s();
        if normalized != ecdsa_sig {
            return Err(Error::SigEncoding("high S"));
        }
        let pk = match PublicKey::from_slice(pubkey) {
            Ok(pk) => pk,
            Err(_) => return Ok(false),
        };
        let digest = self.cache
            .digest(self.input, script_code, self.value, flag)
            .map_err(|_| Error::InputIndex(self.input))?;
        let secp = Secp256k1::verification_only();
        Ok(secp.verify_ecdsa(&Message::from_digest(digest), &ecdsa_sig, &pk).is_ok())
    }

    fn check_sequence(&self, n: i64) -> bool {
        sequence_satisfies(self.tx.version, self.tx.input[self.input].sequence, n)
    }
}

fn cast_to_bool(v: &[u8]) -> bool {
    for (i, b) in v.iter().enumerate() {
        if *b != 0 {
            // negative zero
            return !(i == v.len() - 1 && *b == 0x80);
        }
    }
    false
}

fn pop(stack: &mut Vec<Vec<u8>>) -> Result<Vec<u8>, Error> {
    stack.pop().ok_or(Error::StackUnderflow)
}

fn pop_num(stack: &mut Vec<Vec<u8>>, max_len: usize) -> Result<i64, Error> {
    let v = pop(stack)?;
    read_scriptint(&v, max_len).ok_or(Error::ScriptNumber)
}

fn push_bool(stack: &mut Vec<Vec<u8>>, b: bool) {
    stack.push(if b { vec![1] } else { vec![] });
}

/// Evaluate `script` on `stack`. Signatures are checked over `script`
/// itself as the script code.
pub fn eval_script(
    stack: &mut Vec<Vec<u8>>,
    script: &Script,
    checker: &dyn SignatureChecker,
) -> Result<(), Error> {
    let mut exec: Vec<bool> = vec![];

    for ins in bitcoin::Script::from_bytes(script.as_bytes()).instructions_minimal() {
        let executing = exec.iter().all(|b| *b);
        let op = match ins.map_err(|_| Error::BadScript)? {
            Instruction::PushBytes(data) => {
                if data.len() > MAX_ELEMENT_SIZE {
                    return Err(Error::PushSize);
                }
                if executing {
                    stack.push(data.as_bytes().to_vec());
                }
                continue;
            }
            Instruction::Op(op) => op,
        };

        match op {
            OP_IF | OP_NOTIF => {
                let mut value = false;
                if executing {
                    let top = pop(stack)?;
                    if top.len() > 1 || (top.len() == 1 && top[0] != 1) {
                        return Err(Error::NonMinimalIf);
                    }
                    value = cast_to_bool(&top);
                    if op == OP_NOTIF {
                        value = !value;
                    }
                }
                exec.push(value);
                continue;
            }
            OP_ELSE => {
                match exec.last_mut() {
                    Some(top) => *top = !*top,
                    None => return Err(Error::UnbalancedConditional),
                }
                continue;
            }
            OP_ENDIF => {
                if exec.pop().is_none() {
                    return Err(Error::UnbalancedConditional);
                }
                continue;
            }
            _ => {}
        }
        if !executing {
            continue;
        }

        let code = op.to_u8();
        if code >= OP_PUSHNUM_1.to_u8() && code <= OP_PUSHNUM_16.to_u8() {
            stack.push(vec![code - OP_PUSHNUM_1.to_u8() + 1]);
            continue;
        }

        match op {
            OP_PUSHNUM_NEG1 => stack.push(vec![0x81]),
            OP_NOP => {}
            OP_RETURN => return Err(Error::OpReturn),
            OP_VERIFY => {
                if !cast_to_bool(&pop(stack)?) {
                    return Err(Error::VerifyFailed("OP_VERIFY"));
                }
            }
            OP_DROP => {
                pop(stack)?;
            }
            OP_DUP => {
                let top = stack.last().cloned().ok_or(Error::StackUnderflow)?;
                stack.push(top);
            }
            OP_EQUAL | OP_EQUALVERIFY => {
                let a = pop(stack)?;
                let b = pop(stack)?;
                if op == OP_EQUALVERIFY {
                    if a != b {
                        return Err(Error::VerifyFailed("OP_EQUALVERIFY"));
                    }
                } else {
                    push_bool(stack, a == b);
                }
            }
            OP_SHA256 => {
                let top = pop(stack)?;
                stack.push(sha256(&top).to_vec());
            }
            OP_HASH160 => {
                let top = pop(stack)?;
                stack.push(hash160(&top).to_vec());
            }
            OP_CHECKSIG | OP_CHECKSIGVERIFY => {
                let pubkey = pop(stack)?;
                let sig = pop(stack)?;
                let ok = checker.check_sig(&sig, &pubkey, script)?;
                if !ok && !sig.is_empty() {
                    return Err(Error::NullFail);
                }
                if op == OP_CHECKSIGVERIFY {
                    if !ok {
                        return Err(Error::VerifyFailed("OP_CHECKSIGVERIFY"));
                    }
                } else {
                    push_bool(stack, ok);
                }
            }
            OP_CHECKMULTISIG | OP_CHECKMULTISIGVERIFY => {
                let ok = check_multisig(stack, script, checker)?;
                if op == OP_CHECKMULTISIGVERIFY {
                    if !ok {
                        return Err(Error::VerifyFailed("OP_CHECKMULTISIGVERIFY"));
                    }
                } else {
                    push_bool(stack, ok);
                }
            }
            OP_CSV => {
                let top = stack.last().ok_or(Error::StackUnderflow)?;
                let n = read_scriptint(top, 5).ok_or(Error::ScriptNumber)?;
                if n < 0 {
                    return Err(Error::Locktime("negative delay"));
                }
                if n & i64::from(SEQUENCE_LOCKTIME_DISABLE_FLAG) == 0 && !checker.check_sequence(n) {
                    return Err(Error::Locktime("delay not satisfied by nSequence"));
                }
            }
            _ => return Err(Error::BadOpcode(code)),
        }
    }

    if !exec.is_empty() {
        return Err(Error::UnbalancedConditional);
    }
    Ok(())
}

/// CHECKMULTISIG, popping its arguments from `stack`. Signatures are
/// matched to keys in order; a key which has been passed over is never
/// tried again.
fn check_multisig(
    stack: &mut Vec<Vec<u8>>,
    script: &Script,
    checker: &dyn SignatureChecker,
) -> Result<bool, Error> {
    let n_keys = pop_num(stack, 4)?;
    if n_keys < 0 || n_keys > MAX_MULTISIG_KEYS {
        return Err(Error::ScriptNumber);
    }
    let mut keys = Vec::with_capacity(n_keys as usize);
    for _ in 0..n_keys {
        keys.push(pop(stack)?);
    }
    let n_sigs = pop_num(stack, 4)?;
    if n_sigs < 0 || n_sigs > n_keys {
        return Err(Error::ScriptNumber);
    }
    let mut sigs = Vec::with_capacity(n_sigs as usize);
    for _ in 0..n_sigs {
        sigs.push(pop(stack)?);
    }
    if !pop(stack)?.is_empty() {
        return Err(Error::NullDummy);
    }

    // Both lists were popped top first, so the last key in the script
    // faces the last signature in the witness.
    let mut isig = 0;
    let mut ikey = 0;
    let mut ok = true;
    while isig < sigs.len() {
        if sigs.len() - isig > keys.len() - ikey {
            ok = false;
            break;
        }
        if checker.check_sig(&sigs[isig], &keys[ikey], script)? {
            isig += 1;
        }
        ikey += 1;
    }

    if !ok && sigs.iter().any(|s| !s.is_empty()) {
        return Err(Error::NullFail);
    }
    Ok(ok)
}

fn finish(stack: &[Vec<u8>]) -> Result<(), Error> {
    match stack.len() {
        0 => Err(Error::EvalFalse),
        1 if cast_to_bool(&stack[0]) => Ok(()),
        1 => Err(Error::EvalFalse),
        _ => Err(Error::CleanStack),
    }
}

/// Check that `script_sig` and `witness` satisfy `script_pubkey`, which
/// must be a v0 witness output, natively or nested in P2SH.
pub fn verify_spend(
    script_sig: &Script,
    witness: &Witness,
    script_pubkey: &Script,
    checker: &dyn SignatureChecker,
) -> Result<(), Error> {
    let program_script;
    let program_owner = if script_pubkey.is_p2sh() {
        // the scriptSig must be exactly one push of the redeem script
        let mut pushes = vec![];
        for ins in bitcoin::Script::from_bytes(script_sig.as_bytes()).instructions_minimal() {
            match ins.map_err(|_| Error::BadScript)? {
                Instruction::PushBytes(data) => pushes.push(data.as_bytes().to_vec()),
                Instruction::Op(_) => return Err(Error::WitnessMalleated),
            }
        }
        if pushes.len() != 1 {
            return Err(Error::WitnessMalleated);
        }
        program_script = Script::from_bytes(pushes.remove(0));
        if hash160(program_script.as_bytes())[..] != script_pubkey.as_bytes()[2..22] {
            return Err(Error::EvalFalse);
        }
        &program_script
    } else {
        if !script_sig.is_empty() {
            return Err(Error::WitnessMalleated);
        }
        script_pubkey
    };

    let program = program_owner.witness_program().ok_or(Error::UnsupportedProgram)?;
    let items = witness.items();
    let (mut stack, script) = if program_owner.is_p2wsh() {
        let (last, rest) = items.split_last().ok_or(Error::WitnessProgramMismatch)?;
        if sha256(last)[..] != program[..] {
            return Err(Error::WitnessProgramMismatch);
        }
        (rest.to_vec(), Script::from_bytes(last.clone()))
    } else {
        if items.len() != 2 {
            return Err(Error::WitnessProgramMismatch);
        }
        let mut hash = [0; 20];
        hash.copy_from_slice(program);
        (items.to_vec(), p2pkh_script_code(&hash))
    };

    if stack.iter().any(|item| item.len() > MAX_ELEMENT_SIZE) {
        return Err(Error::PushSize);
    }
    eval_script(&mut stack, &script, checker)?;
    finish(&stack)
}

/// Check that input `index` of `tx` validly spends `spent`.
pub fn verify_input(tx: &Transaction, index: usize, spent: &TxOut) -> Result<(), Error> {
    let txin = tx.input.get(index).ok_or(Error::InputIndex(index))?;
    let checker = TxChecker::new(tx, index, spent.value);
    verify_spend(&txin.script_sig, &txin.witness, &spent.script_pubkey, &checker)
}
