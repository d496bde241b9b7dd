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


//! # Global table of all log codes
//!

use channel::*;
use io_log::*;

use UnstructuredLogTrace;
use UnstructuredLogDebug;
use UnstructuredLogInfo;
use UnstructuredLogWarn;
use UnstructuredLogError;
use UnstructuredLogFatal;

macro_rules! impl_log(
    ($log_id:expr, $level:ident, $struct:ident, $desc:expr) => {
        impl $crate::Log for $struct {
            const SEVERITY: $crate::Severity = $crate::Severity::$level;
            const LOG_ID: &'static str = $log_id;

            fn desc(&self) -> &str {
                $desc
            }
        }
    };
    ($log_id:expr, $level:ident, $struct:ident<$($lt:tt),*>, $desc:expr) => {
        impl<$($lt),*> $crate::Log for $struct<$($lt),*> {
            const SEVERITY: $crate::Severity = $crate::Severity::$level;
            const LOG_ID: &'static str = $log_id;

            fn desc(&self) -> &str {
                $desc
            }
        }
    };
);

impl_log!("Z-0000", Info, StartingCloseTool<'a>, "starting close tool");
impl_log!("Z-0001", Error, ConfigRejected<'a>, "configuration rejected");

impl_log!("Z-T000", Info, TxAssembled<'a>, "transaction assembled");
impl_log!("Z-T001", Trace, SighashComputed, "sighash computed");
impl_log!("Z-T002", Debug, SignatureProduced<'a>, "signature produced");
impl_log!("Z-T003", Info, FeeInputsAttached, "fee inputs attached");
impl_log!("Z-T004", Debug, TxParsed, "transaction parsed");
impl_log!("Z-T800", Warn, SpendCheckFailed<'a>, "spend check failed");

impl_log!("Z-F000", Debug, OutputsAllocated<'a>, "close outputs allocated");
impl_log!("Z-F001", Info, OutputsRebalanced, "close outputs rebalanced");
impl_log!("Z-F800", Warn, DustFoldedIntoFee, "dust output folded into fee");
impl_log!("Z-F801", Warn, ChannelTooSmall, "channel too small");

impl_log!("Z-S000", Info, StateTransition<'a>, "channel state transition");
impl_log!("Z-S001", Debug, StateUpdated, "off-chain state updated");
impl_log!("Z-S002", Info, FundingAdded, "escrow funding added");
impl_log!("Z-S800", Warn, TransitionRejected<'a>, "channel state transition rejected");

impl_log!("Z-IO80", Warn, ReadFailed<'a>, "read failed");

impl_log!("Z-L000", Trace, UnstructuredLogTrace, "unstructured log");
impl_log!("Z-L001", Debug, UnstructuredLogDebug, "unstructured log");
impl_log!("Z-L002", Info, UnstructuredLogInfo, "unstructured log");
impl_log!("Z-L003", Warn, UnstructuredLogWarn, "unstructured log");
impl_log!("Z-L004", Error, UnstructuredLogError, "unstructured log");
impl_log!("Z-L005", Fatal, UnstructuredLogFatal, "unstructured log");
