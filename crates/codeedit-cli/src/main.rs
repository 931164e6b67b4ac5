//! codeedit CLI - command-line interface for the verified structural
//! code-editing engine.
//!
//! ARCHITECTURE: thin I/O layer over `codeedit-core`/`codeedit-engine`.
//! This binary handles:
//! - CLI argument parsing (clap)
//! - JSON I/O (stdin-free; plan/graph/step arrive as positional JSON strings)
//! - Output formatting (stdout) and process exit codes

use clap::{Parser, Subcommand};
use codeedit_core::{build_graph, Graph, GraphError, Import, Symbol};
use codeedit_engine::plan::{ComposedOperatorDef, Step};
use codeedit_engine::{interpreter, verify, Plan};
use std::path::PathBuf;

/// codeedit - verified structural code editing
#[derive(Parser, Debug)]
#[command(name = "codeedit")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "EXAMPLES:\n  \
    codeedit build_graph src/a.py src/b.py      Build a symbol/import graph\n  \
    codeedit verify_plan '[...]' '{...}'        Run pre-edit verification\n  \
    codeedit execute_step '{...}'               Apply a single plan step\n\n\
For more info: https://github.com/codeedit-rs/codeedit")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build a symbol/import/line-kind graph from a set of files.
    BuildGraph {
        #[arg(value_name = "FILE", required = true, num_args = 1..)]
        files: Vec<PathBuf>,
    },
    /// Run pre-edit verification layers (L0-L6) against a plan and graph.
    VerifyPlan {
        /// JSON edit plan: a bare array of steps, or `{define_operators, plan}`.
        plan_json: String,
        /// JSON graph previously produced by `build_graph`.
        graph_json: String,
    },
    /// Apply a single plan step through the transactional mutation protocol.
    ExecuteStep {
        /// JSON step object.
        step_json: String,
        /// Optional JSON array of `{name, steps}` composed operator definitions.
        custom_ops_json: Option<String>,
    },
}

fn main() {
    let args = Args::parse();
    match run(args.command) {
        Ok(()) => {}
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    }
}

fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::BuildGraph { files } => run_build_graph(files),
        Command::VerifyPlan {
            plan_json,
            graph_json,
        } => run_verify_plan(&plan_json, &graph_json),
        Command::ExecuteStep {
            step_json,
            custom_ops_json,
        } => run_execute_step(&step_json, custom_ops_json.as_deref()),
    }
}

fn run_build_graph(files: Vec<PathBuf>) -> anyhow::Result<()> {
    let graph = build_graph(&files);
    let output = serde_json::to_string_pretty(&graph)?;
    println!("{output}");
    Ok(())
}

/// The subset of a `Graph` round-trippable through JSON: `line_kinds`
/// carries `&'static str` tags that cannot be reconstructed from input, so
/// a graph read back from the CLI boundary always has it empty.
#[derive(serde::Deserialize)]
struct GraphInput {
    #[serde(default)]
    symbols: Vec<Symbol>,
    #[serde(default)]
    imports: Vec<Import>,
    #[serde(default)]
    errors: Vec<GraphError>,
}

fn run_verify_plan(plan_json: &str, graph_json: &str) -> anyhow::Result<()> {
    let plan_value: serde_json::Value = serde_json::from_str(plan_json)?;
    let plan = Plan::from_json(&plan_value)?;

    let graph_input: GraphInput = serde_json::from_str(graph_json)?;
    let graph = Graph {
        symbols: graph_input.symbols,
        imports: graph_input.imports,
        errors: graph_input.errors,
        line_kinds: Default::default(),
    };

    let verification = verify::pre::validate_plan(&plan, &graph);
    let interference_groups: Vec<Vec<usize>> = codeedit_engine::plan::group_by_interference(&plan)
        .into_iter()
        .filter(|g| g.len() > 1)
        .collect();

    let output = serde_json::json!({
        "passed": verification.passed,
        "errors": verification.errors,
        "warnings": verification.warnings,
        "interference_groups": interference_groups,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    if !verification.passed {
        std::process::exit(1);
    }
    Ok(())
}

#[derive(serde::Deserialize)]
struct ComposedOperatorDefInput {
    name: String,
    steps: Vec<serde_json::Value>,
}

fn run_execute_step(step_json: &str, custom_ops_json: Option<&str>) -> anyhow::Result<()> {
    let step_value: serde_json::Value = serde_json::from_str(step_json)?;
    let step = Step::from_value(&step_value)?;

    let define_operators: Vec<ComposedOperatorDef> = match custom_ops_json {
        Some(json) => {
            let raw: Vec<ComposedOperatorDefInput> = serde_json::from_str(json)?;
            raw.into_iter()
                .map(|d| ComposedOperatorDef {
                    name: d.name,
                    steps: d.steps,
                })
                .collect()
        }
        None => Vec::new(),
    };
    let plan = Plan {
        define_operators,
        steps: Vec::new(),
    };

    let outcome = interpreter::execute_step(&step, &plan)?;
    let exit_success = outcome.success;
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    if !exit_success {
        std::process::exit(1);
    }
    Ok(())
}
