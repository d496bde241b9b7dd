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

//! # Closing Protocol State Machine
//!
//! Tracks one channel from funding to its final on-chain close and decides
//! which close, claim and dispute events are legal at each point. Every
//! on-chain event carries the block height it confirmed at; relative
//! timelocks are measured against it.
//!
//! ```text
//! AwaitingFunding -> Funded -> Open -> MerchantClosed -> CustomerClosedFromMerchantClose
//!        |                      |  |         |                    |
//!        v                      |  |         v                    v
//!  FundingReclaimed             |  |   MerchantClaimed   CustomerClaimed | Disputed
//!                               |  v
//!                               | CustomerClosed -> CustomerClaimed | Disputed
//!                               v
//!                         MutuallyClosed
//! ```
//!

use std::{error, fmt};

use bitcoin::secp256k1::{ecdsa, Message, PublicKey, Secp256k1};

use bytes::{sha256, ByteWriter};
use common::{BlockHeight, Role, Satoshis};
use keys::{ChannelId, RevocationLock, RevocationSecret};
use logs;
use script::RelativeDelay;
use transaction::Txid;
use verifier::{CloseMessage, CloseSignature, MerchantPublicKey, MutualCloseMessage, Verifier};

/// Where a channel is in its life.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Status {
    /// Waiting for both parties' deposits
    AwaitingFunding,
    /// Escrow fully funded, initial state not yet agreed
    Funded,
    /// Payments can be made off-chain
    Open,
    /// The merchant broadcast merch-close
    MerchantClosed,
    /// The customer broadcast cust-close spending the escrow
    CustomerClosed,
    /// The customer broadcast cust-close spending merch-close
    CustomerClosedFromMerchantClose,
    /// Closed by a transaction both parties signed
    MutuallyClosed,
    /// The customer took its balance after the delay
    CustomerClaimed,
    /// The merchant took the whole channel after the delay
    MerchantClaimed,
    /// The merchant punished a stale cust-close
    Disputed,
    /// Deposits were returned before the channel was funded
    FundingReclaimed,
}

impl Status {
    /// Name for logs
    pub fn as_str(self) -> &'static str {
        match self {
            Status::AwaitingFunding => "awaiting_funding",
            Status::Funded => "funded",
            Status::Open => "open",
            Status::MerchantClosed => "merchant_closed",
            Status::CustomerClosed => "customer_closed",
            Status::CustomerClosedFromMerchantClose => "customer_closed_from_merchant_close",
            Status::MutuallyClosed => "mutually_closed",
            Status::CustomerClaimed => "customer_claimed",
            Status::MerchantClaimed => "merchant_claimed",
            Status::Disputed => "disputed",
            Status::FundingReclaimed => "funding_reclaimed",
        }
    }

    /// Whether no further event can apply.
    pub fn is_terminal(self) -> bool {
        match self {
            Status::MutuallyClosed
            | Status::CustomerClaimed
            | Status::MerchantClaimed
            | Status::Disputed
            | Status::FundingReclaimed => true,
            _ => false,
        }
    }

    fn is_customer_closed(self) -> bool {
        self == Status::CustomerClosed || self == Status::CustomerClosedFromMerchantClose
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed parameters of a channel, agreed before funding.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ChannelParams {
    /// Channel identifier
    pub channel_id: ChannelId,
    /// Customer escrow key
    pub cust_pk: PublicKey,
    /// Merchant escrow key
    pub merch_pk: PublicKey,
    /// Deposit expected from the customer
    pub cust_funding: Satoshis,
    /// Deposit expected from the merchant, possibly zero
    pub merch_funding: Satoshis,
    /// Relative delay of both close outputs
    pub delay: RelativeDelay,
    /// Txid of the escrow transaction
    pub escrow_txid: Txid,
    /// Txid of the merch-close transaction
    pub merch_txid: Txid,
    /// Customer mutual-close payout
    pub cust_addr: Vec<u8>,
    /// Merchant mutual-close payout
    pub merch_addr: Vec<u8>,
}

impl ChannelParams {
    /// Total value held by the channel.
    pub fn total(&self) -> Satoshis {
        self.cust_funding.saturating_add(self.merch_funding)
    }
}

/// One off-chain state of the channel.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct ChannelState {
    /// Sequence number, increasing with every payment
    pub seq: u64,
    /// Customer balance
    pub cust_bal: Satoshis,
    /// Merchant balance
    pub merch_bal: Satoshis,
    /// Lock whose secret revokes this state
    pub rev_lock: RevocationLock,
}

impl ChannelState {
    /// Sum of both balances, if it does not overflow.
    pub fn total(&self) -> Option<Satoshis> {
        self.cust_bal.checked_add(self.merch_bal)
    }

    /// Hash binding this state to the channel's keys and transactions:
    /// SHA256 of rev_lock, pk_c, pk_m, the two balances as little-endian
    /// u64 and the escrow and merch-close txids.
    pub fn commitment(&self, params: &ChannelParams) -> [u8; 32] {
        let mut w = ByteWriter::with_capacity(32 + 33 + 33 + 8 + 8 + 32 + 32);
        w.push_slice(self.rev_lock.as_bytes())
            .push_slice(&params.cust_pk.serialize())
            .push_slice(&params.merch_pk.serialize())
            .push_u64(self.cust_bal)
            .push_u64(self.merch_bal)
            .push_slice(params.escrow_txid.as_bytes())
            .push_slice(params.merch_txid.as_bytes());
        sha256(w.as_bytes())
    }

    /// The message an external verifier checks for a close on this state.
    pub fn close_message(&self, channel_id: ChannelId) -> CloseMessage {
        CloseMessage {
            channel_id: channel_id,
            rev_lock: self.rev_lock,
            cust_bal: self.cust_bal,
            merch_bal: self.merch_bal,
        }
    }
}

/// Proof that the merchant agreed to the state a customer closes on.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum CloseAuthorization {
    /// Merchant ECDSA signature over the state commitment
    MerchantSignature(ecdsa::Signature),
    /// Signature checked by the channel's external verifier
    Verified(CloseSignature),
}

/// Something that happened to the channel.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Event {
    /// A party deposited into the escrow
    AddFunding {
        /// Depositing party
        role: Role,
        /// Amount deposited
        amount: Satoshis,
    },
    /// A party took back its deposit before the channel was funded
    ReclaimFunding {
        /// Reclaiming party
        role: Role,
    },
    /// Both parties agreed on the initial state
    Activate {
        /// Revocation lock of the initial state
        rev_lock: RevocationLock,
    },
    /// An off-chain payment moved the channel to a new state
    Pay {
        /// The new state
        state: ChannelState,
        /// Secret revoking the previous state
        revealed: RevocationSecret,
    },
    /// merch-close confirmed
    MerchClose {
        /// Confirmation height
        height: BlockHeight,
    },
    /// cust-close confirmed
    CustClose {
        /// State the close pays out
        state: ChannelState,
        /// Merchant's agreement to the state
        auth: CloseAuthorization,
        /// Confirmation height
        height: BlockHeight,
    },
    /// The customer's claim of the delayed cust-close output confirmed
    CustClaim {
        /// Confirmation height
        height: BlockHeight,
    },
    /// The merchant's claim of the merch-close output confirmed
    MerchClaim {
        /// Confirmation height
        height: BlockHeight,
    },
    /// The merchant's dispute of a cust-close confirmed
    Dispute {
        /// Revealed secret
        secret: RevocationSecret,
        /// Confirmation height
        height: BlockHeight,
    },
    /// A mutual close confirmed
    MutualClose {
        /// Customer payout
        cust_bal: Satoshis,
        /// Merchant payout
        merch_bal: Satoshis,
        /// Customer signature over the mutual-close record
        cust_sig: ecdsa::Signature,
        /// Merchant signature over the mutual-close record
        merch_sig: ecdsa::Signature,
    },
}

impl Event {
    /// Name for logs
    pub fn name(&self) -> &'static str {
        match *self {
            Event::AddFunding { .. } => "add_funding",
            Event::ReclaimFunding { .. } => "reclaim_funding",
            Event::Activate { .. } => "activate",
            Event::Pay { .. } => "pay",
            Event::MerchClose { .. } => "merch_close",
            Event::CustClose { .. } => "cust_close",
            Event::CustClaim { .. } => "cust_claim",
            Event::MerchClaim { .. } => "merch_claim",
            Event::Dispute { .. } => "dispute",
            Event::MutualClose { .. } => "mutual_close",
        }
    }

    /// Block height of an on-chain event
    pub fn height(&self) -> Option<BlockHeight> {
        match *self {
            Event::MerchClose { height }
            | Event::CustClose { height, .. }
            | Event::CustClaim { height }
            | Event::MerchClaim { height }
            | Event::Dispute { height, .. } => Some(height),
            _ => None,
        }
    }
}

/// A rejected event.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum TransitionError {
    /// The event cannot happen in the current status
    IllegalTransition {
        /// Current status
        from: Status,
        /// Name of the event
        event: &'static str,
    },
    /// A delayed output was spent before its delay elapsed
    TimelockNotElapsed {
        /// Height the delayed output confirmed at
        confirmed_at: BlockHeight,
        /// The delay
        delay: RelativeDelay,
        /// Height of the spend
        now: BlockHeight,
    },
    /// A dispute came after the customer could already claim
    TimelockElapsed {
        /// Height the cust-close confirmed at
        confirmed_at: BlockHeight,
        /// The delay
        delay: RelativeDelay,
        /// Height of the dispute
        now: BlockHeight,
    },
    /// The secret does not open the lock it was given for
    RevocationMismatch,
    /// A dispute targeted the latest state
    NotStale {
        /// Sequence number of the closed state
        seq: u64,
    },
    /// A payment did not advance the sequence number
    StaleSequence {
        /// Current sequence number
        current: u64,
        /// Sequence number of the rejected state
        got: u64,
    },
    /// A close was on a state the channel never held: its sequence number
    /// is ahead of the latest, or its lock is neither current nor revoked
    UnknownState {
        /// Sequence number of the closed state
        seq: u64,
    },
    /// A close signature did not verify
    VerifierRejected,
    /// A message to be signed could not be encoded
    MalformedMessage {
        /// Encoder error
        reason: String,
    },
    /// Balances do not add up to the channel value
    BalanceMismatch {
        /// Channel value
        expected: Satoshis,
        /// Sum of the balances, if it did not overflow
        got: Option<Satoshis>,
    },
    /// A deposit was not the agreed amount
    FundingMismatch {
        /// Depositing party
        role: Role,
        /// Agreed amount
        expected: Satoshis,
        /// Deposited amount
        got: Satoshis,
    },
    /// A party deposited twice
    AlreadyFunded {
        /// Depositing party
        role: Role,
    },
    /// A party reclaimed without having deposited
    NotFunded {
        /// Reclaiming party
        role: Role,
    },
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            TransitionError::IllegalTransition { from, event } => write!(
                f, "{} is not allowed in status {}", event, from,
            ),
            TransitionError::TimelockNotElapsed { confirmed_at, delay, now } => write!(
                f, "delay of {} from height {} has not elapsed at {}", delay, confirmed_at, now,
            ),
            TransitionError::TimelockElapsed { confirmed_at, delay, now } => write!(
                f, "delay of {} from height {} already elapsed at {}", delay, confirmed_at, now,
            ),
            TransitionError::RevocationMismatch => f.write_str("secret does not match revocation lock"),
            TransitionError::NotStale { seq } => write!(f, "state {} is the latest state", seq),
            TransitionError::StaleSequence { current, got } => write!(
                f, "state {} does not follow state {}", got, current,
            ),
            TransitionError::UnknownState { seq } => write!(f, "state {} was never held", seq),
            TransitionError::VerifierRejected => f.write_str("close signature rejected"),
            TransitionError::MalformedMessage { ref reason } => write!(f, "unencodable message: {}", reason),
            TransitionError::BalanceMismatch { expected, got: Some(got) } => write!(
                f, "balances sum to {} instead of {}", got, expected,
            ),
            TransitionError::BalanceMismatch { expected, got: None } => write!(
                f, "balances overflow instead of summing to {}", expected,
            ),
            TransitionError::FundingMismatch { role, expected, got } => write!(
                f, "{} deposited {} instead of {}", role, got, expected,
            ),
            TransitionError::AlreadyFunded { role } => write!(f, "{} already funded", role),
            TransitionError::NotFunded { role } => write!(f, "{} has no deposit", role),
        }
    }
}

impl error::Error for TransitionError {}

/// An on-chain close paying out a state.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
struct Closed {
    state: ChannelState,
    confirmed_at: BlockHeight,
}

/// A channel and the events applied to it so far.
pub struct Channel {
    params: ChannelParams,
    status: Status,
    cust_deposit: Satoshis,
    merch_deposit: Satoshis,
    latest: ChannelState,
    revealed: Vec<RevocationSecret>,
    merch_closed_at: Option<BlockHeight>,
    closed: Option<Closed>,
    verifier: Option<(Box<dyn Verifier>, MerchantPublicKey)>,
}

impl Channel {
    /// A new channel awaiting its deposits, with a zero-balance state.
    pub fn new(params: ChannelParams) -> Channel {
        let ret = Channel {
            params: params,
            status: Status::AwaitingFunding,
            cust_deposit: 0,
            merch_deposit: 0,
            latest: ChannelState {
                seq: 0,
                cust_bal: 0,
                merch_bal: 0,
                rev_lock: RevocationLock::default(),
            },
            revealed: vec![],
            merch_closed_at: None,
            closed: None,
            verifier: None,
        };
        ret.set_log_context();
        ret
    }

    /// Accept customer closes authorized by `verifier` under `pk`.
    pub fn with_verifier(mut self, verifier: Box<dyn Verifier>, pk: MerchantPublicKey) -> Channel {
        self.verifier = Some((verifier, pk));
        self
    }

    /// Current status
    pub fn status(&self) -> Status {
        self.status
    }

    /// Fixed parameters
    pub fn params(&self) -> &ChannelParams {
        &self.params
    }

    /// Latest agreed off-chain state
    pub fn latest(&self) -> &ChannelState {
        &self.latest
    }

    /// State paid out by the confirmed cust-close, if any
    pub fn closed_state(&self) -> Option<&ChannelState> {
        self.closed.as_ref().map(|c| &c.state)
    }

    /// A revealed secret opening `lock`, which is what a dispute needs.
    pub fn secret_for(&self, lock: &RevocationLock) -> Option<RevocationSecret> {
        self.revealed.iter().find(|s| lock.is_opened_by(s)).cloned()
    }

    /// The record both parties sign to close mutually on this split.
    pub fn mutual_close_message(&self, cust_bal: Satoshis, merch_bal: Satoshis) -> MutualCloseMessage {
        MutualCloseMessage {
            channel_id: self.params.channel_id,
            cust_addr: self.params.cust_addr.clone(),
            merch_addr: self.params.merch_addr.clone(),
            cust_bal: cust_bal,
            merch_bal: merch_bal,
        }
    }

    /// Apply an event, returning the new status. A rejected event leaves
    /// the channel unchanged.
    pub fn apply(&mut self, event: Event) -> Result<Status, TransitionError> {
        let from = self.status;
        match self.transition(&event) {
            Ok(to) => {
                self.status = to;
                if from != to {
                    slog!(StateTransition, from: from.as_str(), to: to.as_str(),
                        event: event.name(), height: event.height());
                }
                self.set_log_context();
                Ok(to)
            }
            Err(e) => {
                slog!(TransitionRejected, status: from.as_str(), event: event.name(),
                    reason: e.to_string());
                Err(e)
            }
        }
    }

    fn set_log_context(&self) {
        logs::set_channel_context(logs::ChannelContext {
            channel_id: Some(self.params.channel_id.to_string()),
            status: Some(self.status.as_str().to_owned()),
        });
    }

    fn expected_deposit(&self, role: Role) -> Satoshis {
        match role {
            Role::Customer => self.params.cust_funding,
            Role::Merchant => self.params.merch_funding,
        }
    }

    fn deposit_mut(&mut self, role: Role) -> &mut Satoshis {
        match role {
            Role::Customer => &mut self.cust_deposit,
            Role::Merchant => &mut self.merch_deposit,
        }
    }

    fn check_balances(&self, cust_bal: Satoshis, merch_bal: Satoshis) -> Result<(), TransitionError> {
        let got = cust_bal.checked_add(merch_bal);
        if got != Some(self.params.total()) {
            return Err(TransitionError::BalanceMismatch {
                expected: self.params.total(),
                got: got,
            });
        }
        Ok(())
    }

    fn delay_elapsed(&self, confirmed_at: BlockHeight, now: BlockHeight) -> bool {
        now >= confirmed_at.saturating_add(BlockHeight::from(self.params.delay.blocks()))
    }

    fn check_elapsed(&self, confirmed_at: BlockHeight, now: BlockHeight) -> Result<(), TransitionError> {
        if !self.delay_elapsed(confirmed_at, now) {
            return Err(TransitionError::TimelockNotElapsed {
                confirmed_at: confirmed_at,
                delay: self.params.delay,
                now: now,
            });
        }
        Ok(())
    }

    fn check_known(&self, state: &ChannelState) -> Result<(), TransitionError> {
        let known = state.rev_lock == self.latest.rev_lock
            || self.secret_for(&state.rev_lock).is_some();
        if state.seq > self.latest.seq || !known {
            return Err(TransitionError::UnknownState { seq: state.seq });
        }
        Ok(())
    }

    fn check_authorization(&self, state: &ChannelState, auth: &CloseAuthorization) -> Result<(), TransitionError> {
        let ok = match *auth {
            CloseAuthorization::MerchantSignature(ref sig) => {
                let secp = Secp256k1::verification_only();
                let msg = Message::from_digest(state.commitment(&self.params));
                secp.verify_ecdsa(&msg, sig, &self.params.merch_pk).is_ok()
            }
            CloseAuthorization::Verified(ref sig) => match self.verifier {
                Some((ref verifier, ref pk)) => {
                    verifier.verify(&state.close_message(self.params.channel_id), sig, pk)
                }
                None => false,
            },
        };
        if ok {
            Ok(())
        } else {
            Err(TransitionError::VerifierRejected)
        }
    }

    fn transition(&mut self, event: &Event) -> Result<Status, TransitionError> {
        let illegal = TransitionError::IllegalTransition {
            from: self.status,
            event: event.name(),
        };

        match (self.status, event) {
            (Status::AwaitingFunding, &Event::AddFunding { role, amount }) => {
                let expected = self.expected_deposit(role);
                if *self.deposit_mut(role) == expected {
                    return Err(TransitionError::AlreadyFunded { role: role });
                }
                if amount != expected {
                    return Err(TransitionError::FundingMismatch {
                        role: role,
                        expected: expected,
                        got: amount,
                    });
                }
                *self.deposit_mut(role) = amount;
                self.latest.cust_bal = self.cust_deposit;
                self.latest.merch_bal = self.merch_deposit;
                slog!(FundingAdded, role: role, amount: amount);

                if self.cust_deposit == self.params.cust_funding
                    && self.merch_deposit == self.params.merch_funding
                {
                    Ok(Status::Funded)
                } else {
                    Ok(Status::AwaitingFunding)
                }
            }
            (Status::AwaitingFunding, &Event::ReclaimFunding { role }) => {
                if *self.deposit_mut(role) == 0 {
                    return Err(TransitionError::NotFunded { role: role });
                }
                *self.deposit_mut(role) = 0;
                self.latest.cust_bal = self.cust_deposit;
                self.latest.merch_bal = self.merch_deposit;

                if self.cust_deposit == 0 && self.merch_deposit == 0 {
                    Ok(Status::FundingReclaimed)
                } else {
                    Ok(Status::AwaitingFunding)
                }
            }
            (Status::Funded, &Event::Activate { rev_lock }) => {
                self.latest.rev_lock = rev_lock;
                Ok(Status::Open)
            }
            (Status::Open, &Event::Pay { ref state, ref revealed }) => {
                if state.seq <= self.latest.seq {
                    return Err(TransitionError::StaleSequence {
                        current: self.latest.seq,
                        got: state.seq,
                    });
                }
                self.check_balances(state.cust_bal, state.merch_bal)?;
                if !self.latest.rev_lock.is_opened_by(revealed) {
                    return Err(TransitionError::RevocationMismatch);
                }
                self.revealed.push(*revealed);
                self.latest = *state;
                slog!(StateUpdated, seq: state.seq, cust_bal: state.cust_bal,
                    merch_bal: state.merch_bal);
                Ok(Status::Open)
            }
            (Status::Open, &Event::MerchClose { height }) => {
                self.merch_closed_at = Some(height);
                Ok(Status::MerchantClosed)
            }
            (Status::MerchantClosed, &Event::MerchClaim { height }) => {
                let confirmed_at = self.merch_closed_at.ok_or(illegal)?;
                self.check_elapsed(confirmed_at, height)?;
                Ok(Status::MerchantClaimed)
            }
            (from @ Status::Open, &Event::CustClose { ref state, ref auth, height })
            | (from @ Status::MerchantClosed, &Event::CustClose { ref state, ref auth, height }) => {
                self.check_balances(state.cust_bal, state.merch_bal)?;
                self.check_known(state)?;
                self.check_authorization(state, auth)?;
                self.closed = Some(Closed {
                    state: *state,
                    confirmed_at: height,
                });
                if from == Status::Open {
                    Ok(Status::CustomerClosed)
                } else {
                    Ok(Status::CustomerClosedFromMerchantClose)
                }
            }
            (from, &Event::CustClaim { height }) if from.is_customer_closed() => {
                let closed = self.closed.ok_or(illegal)?;
                self.check_elapsed(closed.confirmed_at, height)?;
                Ok(Status::CustomerClaimed)
            }
            (from, &Event::Dispute { ref secret, height }) if from.is_customer_closed() => {
                let closed = self.closed.ok_or(illegal)?;
                if !closed.state.rev_lock.is_opened_by(secret) {
                    return Err(TransitionError::RevocationMismatch);
                }
                // The sequence number is not signed, so only the lock tells
                // a revoked state from the latest one
                if closed.state.rev_lock == self.latest.rev_lock {
                    return Err(TransitionError::NotStale { seq: closed.state.seq });
                }
                if self.delay_elapsed(closed.confirmed_at, height) {
                    return Err(TransitionError::TimelockElapsed {
                        confirmed_at: closed.confirmed_at,
                        delay: self.params.delay,
                        now: height,
                    });
                }
                Ok(Status::Disputed)
            }
            (Status::Open, &Event::MutualClose { cust_bal, merch_bal, ref cust_sig, ref merch_sig }) => {
                self.check_balances(cust_bal, merch_bal)?;
                let msg = self.mutual_close_message(cust_bal, merch_bal);
                let malformed = |e: ::Error| TransitionError::MalformedMessage { reason: e.to_string() };
                if !msg.is_signed_by(cust_sig, &self.params.cust_pk).map_err(malformed)?
                    || !msg.is_signed_by(merch_sig, &self.params.merch_pk).map_err(malformed)?
                {
                    return Err(TransitionError::VerifierRejected);
                }
                Ok(Status::MutuallyClosed)
            }
            _ => Err(illegal),
        }
    }
}
