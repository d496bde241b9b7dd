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

//! # Close Tool
//!
//! Builds and signs zkChannels funding, close, claim and dispute
//! transactions described by a configuration file, and inspects
//! transactions and fee allocations.
//!

// Coding conventions
#![deny(non_upper_case_globals)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
#![deny(unused_mut)]
#![warn(missing_docs)]

// External libs
#[macro_use]
extern crate zkchannel_logs as logs;
extern crate zkchannel;
#[macro_use]
extern crate serde_json;
#[cfg(test)]
extern crate tempfile;

use std::{env, io, process};

use zkchannel::common::constants::set_constants_on_startup;
use zkchannel::config::Configuration;
use zkchannel::fee::{allocate, CloseKind, FeeModel};
use zkchannel::transaction::Transaction;
use zkchannel::Error;

/// What the tool was asked to do
#[derive(Clone, PartialEq, Eq, Debug)]
enum Mode {
    /// Build the transaction in the configuration file
    Build,
    /// Print the output values of a close
    Allocate { kind: CloseKind, cust_bal: u64, merch_bal: u64 },
    /// Decode a raw transaction
    Inspect { hex: String },
}

impl Mode {
    fn name(&self) -> &'static str {
        match *self {
            Mode::Build => "build",
            Mode::Allocate { .. } => "allocate",
            Mode::Inspect { .. } => "inspect",
        }
    }

    fn from_args(args: &[String]) -> Result<Mode, String> {
        match args.get(0).map(|s| &s[..]) {
            None => Ok(Mode::Build),
            Some("allocate") if args.len() == 4 => {
                let kind = CloseKind::from_name(&args[1])
                    .ok_or_else(|| format!("unknown close kind {}", args[1]))?;
                let cust_bal = args[2].parse().map_err(|e| format!("cust_bal: {}", e))?;
                let merch_bal = args[3].parse().map_err(|e| format!("merch_bal: {}", e))?;
                Ok(Mode::Allocate { kind: kind, cust_bal: cust_bal, merch_bal: merch_bal })
            }
            Some("inspect") if args.len() == 2 => Ok(Mode::Inspect { hex: args[1].clone() }),
            Some(other) => Err(format!("bad arguments for mode {}", other)),
        }
    }
}

/// Raw transaction hex when building, a JSON report otherwise
fn run(mode: &Mode, config: &Configuration, model: &FeeModel) -> Result<String, Error> {
    match *mode {
        Mode::Build => {
            let tx = match config.tx {
                Some(ref tx) => tx,
                None => return Err(Error::MalformedInput("no [tx] section to build".to_owned())),
            };
            Ok(tx.build(model)?.to_hex())
        }
        Mode::Allocate { kind, cust_bal, merch_bal } => {
            let alloc = allocate(kind, cust_bal, merch_bal, model)?;
            Ok(json!({
                "kind": alloc.kind.as_str(),
                "input_value": alloc.input_value,
                "outputs": alloc.outputs,
                "cpfp": alloc.cpfp,
                "fee": alloc.fee,
            }).to_string())
        }
        Mode::Inspect { ref hex } => {
            let tx = Transaction::from_hex(hex)?;
            let txid = tx.txid().to_string();
            slog!(TxParsed, txid: txid.clone(), size: tx.total_size(), segwit: tx.has_witness());
            Ok(json!({
                "txid": txid,
                "size": tx.total_size(),
                "vsize": tx.vsize(),
                "segwit": tx.has_witness(),
                "n_inputs": tx.input.len(),
                "n_outputs": tx.output.len(),
                "output_value": tx.output_value(),
            }).to_string())
        }
    }
}

fn main() {
    let args: Vec<_> = env::args().collect();
    if args.len() < 2 {
        println!("Usage: {} <datadir> [allocate <kind> <cust_bal> <merch_bal> | inspect <hex>]", args[0]);
        return;
    }
    let mode = match Mode::from_args(&args[2..]) {
        Ok(mode) => mode,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(2);
        }
    };

    let mut config_path = args[1].clone();
    config_path.push_str("/config.toml");

    logs::initialize(logs::Severity::Info, None, None, "closetool", Box::new(io::stderr()));
    let config = match Configuration::from_file(&config_path) {
        Ok(config) => config,
        Err(e) => {
            slog!(ConfigRejected, config_path: &config_path[..], error: e.to_string());
            process::exit(1);
        }
    };

    logs::initialize(
        config.local.log_level,
        config.local.log_period_ms,
        config.local.log_max_instance_per_period,
        "closetool",
        Box::new(io::stderr()),
    );
    slog!(StartingCloseTool, version: env!("CARGO_PKG_VERSION"),
        config_path: &config_path[..],
        mode: mode.name(),
    );

    set_constants_on_startup(config.local.constants());
    let model = match FeeModel::from_constants() {
        Ok(model) => model,
        Err(e) => {
            slog!(ConfigRejected, config_path: &config_path[..], error: e.to_string());
            process::exit(1);
        }
    };

    match run(&mode, &config, &model) {
        Ok(out) => println!("{}", out),
        Err(e) => {
            log!(Error, "{} failed: {}", mode.name(), e);
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn args(s: &[&str]) -> Vec<String> {
        s.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parse_modes() {
        assert_eq!(Mode::from_args(&[]), Ok(Mode::Build));
        assert_eq!(
            Mode::from_args(&args(&["allocate", "merch_close", "5000", "6000"])),
            Ok(Mode::Allocate { kind: CloseKind::MerchClose, cust_bal: 5000, merch_bal: 6000 }),
        );
        assert_eq!(Mode::from_args(&args(&["inspect", "00"])).map(|m| m.name()), Ok("inspect"));
        assert!(Mode::from_args(&args(&["allocate", "close_sideways", "1", "2"])).is_err());
        assert!(Mode::from_args(&args(&["allocate", "close_escrow", "-1", "2"])).is_err());
        assert!(Mode::from_args(&args(&["inspect"])).is_err());
        assert!(Mode::from_args(&args(&["steal"])).is_err());
    }

    #[test]
    fn allocate_from_datadir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[local]\nlog_level = \"error\"\nfee_rate = 10\ncpfp_value = 500\n").unwrap();

        let config = Configuration::from_file(&path).unwrap();
        let constants = config.local.constants();
        let model = FeeModel::new(constants.fee_rate, constants.cpfp_value).unwrap();

        let mode = Mode::Allocate { kind: CloseKind::CloseEscrow, cust_bal: 1_000_000, merch_bal: 1_000_000 };
        let out = run(&mode, &config, &model).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["kind"], "close_escrow");
        assert_eq!(value["input_value"], 2_000_000);
        assert_eq!(value["outputs"][0], 1_000_000 - 500 - 2980);
        assert_eq!(value["outputs"][1], 1_000_000);
        assert_eq!(value["fee"], 2980);

        // nothing to build
        assert!(run(&Mode::Build, &config, &model).is_err());
        // not a transaction
        assert!(run(&Mode::Inspect { hex: "0200".to_owned() }, &config, &model).is_err());
    }
}
