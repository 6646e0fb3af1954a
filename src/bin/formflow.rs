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

//! Command-line interface for formflow
//!
//! Validates and renders form definitions against data files, prints the
//! normalized field paths and evaluates single templates.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use formflow::path::ResolvedField;
use formflow::{EngineConfig, FormBuilder, FormConfig, PathResolver, TemplateEvaluator};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(name = "formflow")]
#[command(about = "Evaluate declarative form definitions against JSON data")]
#[command(version)]
#[command(author = "OctoFHIR Team <funyloony@gmail.com>")]
struct Cli {
    /// Engine configuration file (JSON); defaults are used when omitted
    #[arg(long, global = true)]
    engine: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mount a form against data and print the validation result
    Validate {
        /// Form definition file
        #[arg(short, long)]
        config: PathBuf,
        /// Initial data file
        #[arg(short, long)]
        data: Option<PathBuf>,
        /// Pretty-print JSON output
        #[arg(short, long)]
        pretty: bool,
    },
    /// Print the normalized state and data path of every field
    Paths {
        /// Form definition file
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Evaluate a single template
    Eval {
        /// Template, optionally prefixed with a `[[language]]` tag
        template: String,
        /// Context file; without it the template is echoed unevaluated
        #[arg(long)]
        context: Option<PathBuf>,
    },
    /// Mount a form against data and print it as text
    Render {
        /// Form definition file
        #[arg(short, long)]
        config: PathBuf,
        /// Initial data file
        #[arg(short, long)]
        data: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    human_panic::setup_panic!();
    env_logger::init();

    let cli = Cli::parse();
    let engine = match &cli.engine {
        Some(path) => serde_json::from_value::<EngineConfig>(read_json(path)?)
            .with_context(|| format!("invalid engine configuration in '{}'", path.display()))?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Validate {
            config,
            data,
            pretty,
        } => handle_validate(engine, &config, data.as_deref(), pretty).await,
        Commands::Paths { config } => handle_paths(&config),
        Commands::Eval { template, context } => {
            handle_eval(&engine, &template, context.as_deref()).await
        }
        Commands::Render { config, data } => handle_render(engine, &config, data.as_deref()).await,
    }
}

fn read_json(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read '{}'", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid JSON in '{}'", path.display()))
}

fn read_form(path: &Path) -> Result<FormConfig> {
    serde_json::from_value(read_json(path)?)
        .with_context(|| format!("invalid form definition in '{}'", path.display()))
}

fn read_data(path: Option<&Path>) -> Result<Value> {
    match path {
        Some(path) => read_json(path),
        None => Ok(Value::Object(Default::default())),
    }
}

async fn handle_validate(
    engine: EngineConfig,
    config: &Path,
    data: Option<&Path>,
    pretty: bool,
) -> Result<()> {
    let form = FormBuilder::new(read_form(config)?)
        .with_engine_config(engine)
        .mount(read_data(data)?)
        .await
        .context("failed to mount form")?;

    let result = form.validate().await;
    let output = if pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    println!("{output}");

    if !result.is_valid {
        process::exit(1);
    }
    Ok(())
}

fn handle_paths(config: &Path) -> Result<()> {
    let form = read_form(config)?;
    print_paths(&PathResolver::resolve_tree(&form.fields, None), 0);
    Ok(())
}

fn print_paths(fields: &[ResolvedField], depth: usize) {
    for resolved in fields {
        println!(
            "{}{} -> data.{} ({})",
            "  ".repeat(depth),
            resolved.field.state_path,
            resolved.field.data_path,
            resolved.field.fieldtype
        );
        print_paths(&resolved.children, depth + 1);
    }
}

async fn handle_eval(engine: &EngineConfig, template: &str, context: Option<&Path>) -> Result<()> {
    let evaluator = TemplateEvaluator::with_config(engine);
    let result = match context {
        Some(path) => {
            let context = read_json(path)?;
            evaluator
                .try_evaluate_str(template, &context)
                .await
                .context("evaluation failed")?
        }
        None => evaluator.evaluate_str(template, None).await,
    };

    match result {
        Some(Value::String(text)) => println!("{text}"),
        Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        None => println!("undefined"),
    }
    Ok(())
}

async fn handle_render(engine: EngineConfig, config: &Path, data: Option<&Path>) -> Result<()> {
    let form = FormBuilder::new(read_form(config)?)
        .with_engine_config(engine)
        .mount(read_data(data)?)
        .await
        .context("failed to mount form")?;

    if !form.settle().await {
        log::warn!("Form did not settle before rendering");
    }
    println!("{}", form.render());
    Ok(())
}
