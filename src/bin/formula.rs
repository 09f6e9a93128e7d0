// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Command-line interface for evaluating formulas and firing triggers

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use formula_engine::{CatalogDocument, ContextMap, EngineConfig, Formula, extract_references};
use serde_json::Value as JsonValue;
use std::fs;
use std::process;

#[derive(Parser)]
#[command(name = "formula")]
#[command(about = "Evaluate formulas and fire triggers from the command line")]
#[command(version)]
#[command(author = "OctoFHIR Team <funyloony@gmail.com>")]
struct Cli {
    /// JSON file with engine configuration
    #[arg(long, global = true)]
    config: Option<String>,

    /// Pretty-print JSON output
    #[arg(short, long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load referenced functions, run a script and print its value
    Eval {
        /// Script to run
        script: String,
        /// Variable binding, NAME=JSON (repeatable)
        #[arg(long = "var", value_name = "NAME=JSON")]
        vars: Vec<String>,
        /// Catalog document whose functions are registered first
        #[arg(short, long)]
        functions: Option<String>,
    },
    /// List the function references a script makes
    Refs {
        /// Script to scan
        script: String,
    },
    /// Fire a trigger from a catalog document
    Trigger {
        /// Trigger id
        id: String,
        /// Catalog document with functions, formulas and triggers
        #[arg(short, long)]
        catalog: String,
        /// Caller context as a JSON object
        #[arg(long, default_value = "{}")]
        context: String,
    },
}

fn main() {
    human_panic::setup_panic!();
    env_logger::init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("reading config file '{path}'"))?;
            EngineConfig::from_json_str(&json)?
        }
        None => EngineConfig::default(),
    };
    let formula = Formula::with_config(config);

    match cli.command {
        Commands::Eval {
            script,
            vars,
            functions,
        } => {
            if let Some(path) = functions {
                let document = CatalogDocument::from_path(&path)
                    .with_context(|| format!("loading functions from '{path}'"))?;
                for (name, body) in &document.functions {
                    formula.register_custom_function(name, body);
                }
            }

            let variables = parse_vars(&vars)?;
            let value = formula.evaluate_with(&script, &variables)?;
            print_json(&value.export()?, cli.pretty)
        }
        Commands::Refs { script } => {
            for name in extract_references(&script) {
                println!("{name}");
            }
            Ok(())
        }
        Commands::Trigger {
            id,
            catalog,
            context,
        } => {
            let dispatcher = CatalogDocument::from_path(&catalog)
                .with_context(|| format!("loading catalog '{catalog}'"))?
                .into_dispatcher(formula);
            let context = parse_context(&context)?;
            let result = dispatcher.execute(&id, &context)?;
            print_json(&JsonValue::Object(result), cli.pretty)
        }
    }
}

fn parse_vars(vars: &[String]) -> Result<ContextMap> {
    let mut variables = ContextMap::new();
    for var in vars {
        let (name, json) = var
            .split_once('=')
            .ok_or_else(|| anyhow!("variable '{var}' is not NAME=JSON"))?;
        let value: JsonValue = serde_json::from_str(json)
            .with_context(|| format!("parsing value of variable '{name}'"))?;
        variables.insert(name.trim().to_string(), value);
    }
    Ok(variables)
}

fn parse_context(json: &str) -> Result<ContextMap> {
    match serde_json::from_str(json).context("parsing trigger context")? {
        JsonValue::Object(map) => Ok(map),
        _ => Err(anyhow!("trigger context must be a JSON object")),
    }
}

fn print_json(value: &JsonValue, pretty: bool) -> Result<()> {
    let output = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{output}");
    Ok(())
}
