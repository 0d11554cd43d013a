//! The `analyzer` binary: CLI parsing, config loading, and dispatch to the
//! concrete interpreter, the abstract interpreter, or the fuzzer
//! (spec.md §6).

use std::sync::Arc;

use bytecode_analyzer::cache::{self, CacheEntry, CacheResolver};
use bytecode_analyzer::cli::{self, Options};
use bytecode_analyzer::config::{self, Config};
use bytecode_analyzer::fuzz::orchestrator;
use bytecode_analyzer::graph::Graph;
use bytecode_analyzer::heap::Heap;
use bytecode_analyzer::interval::{self, domain::Interval};
use bytecode_analyzer::ir::function::IrFunction;
use bytecode_analyzer::ir::instruction::Payload;
use bytecode_analyzer::ir::method::MethodId;
use bytecode_analyzer::types::TypeId;
use bytecode_analyzer::vm::outcome::RuntimeOutcome;
use bytecode_analyzer::vm::{self, VmContext};
use bytecode_analyzer::wpo::Wpo;

const EXIT_USAGE: i32 = 1;
const EXIT_ANALYSIS: i32 = 2;

fn main() {
    tracing_subscriber::fmt::try_init().ok();

    let argv: Vec<String> = std::env::args().skip(1).collect();
    let opts = match cli::parse_args(&argv) {
        Ok(opts) => opts,
        Err(err) => {
            eprintln!("{err}");
            eprintln!("{}", cli::USAGE);
            std::process::exit(EXIT_USAGE);
        }
    };

    if opts.info {
        match config::load() {
            Ok(config) => print_info(&config),
            Err(err) => fatal_analysis(&err),
        }
        return;
    }

    let config = match config::load() {
        Ok(config) => config,
        Err(err) => fatal_analysis(&err),
    };

    run_method(&config, &opts);
}

fn run_method(config: &Config, opts: &Options) {
    let method_id_str = opts.method_id.as_deref().expect("non-info invocation always carries a method id");
    let method = match MethodId::parse(method_id_str) {
        Some(method) => method,
        None => {
            eprintln!("invalid method identifier: {method_id_str}");
            std::process::exit(EXIT_USAGE);
        }
    };

    let arg_types = match method.arg_types() {
        Some(types) => types,
        None => {
            eprintln!("invalid argument signature in method identifier: {method_id_str}");
            std::process::exit(EXIT_USAGE);
        }
    };

    let entry = match cache::get_or_build(&config.jpamb_decompiled_path, &method) {
        Ok(entry) => entry,
        Err(err) => fatal_analysis(&err),
    };

    if opts.interpreter_only {
        run_interpreter(config, &entry, &arg_types, opts.parameters.as_deref());
    } else if opts.abstract_only {
        run_abstract(&entry, &arg_types);
    } else {
        run_fuzzer(config, &method, entry, arg_types);
    }
}

fn run_interpreter(config: &Config, entry: &Arc<CacheEntry>, arg_types: &[TypeId], parameters: Option<&str>) {
    let parameters = parameters.expect("interpreter mode requires a parameters argument");

    let literals = match cli::parse_parameter_list(parameters) {
        Ok(literals) => literals,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(EXIT_USAGE);
        }
    };
    let data = match cli::encode_parameters(arg_types, &literals) {
        Ok(data) => data,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(EXIT_USAGE);
        }
    };

    let mut heap = Heap::new();
    let locals = match vm::decode_locals(arg_types, &data, &mut heap) {
        Ok(locals) => locals,
        Err(_) => {
            eprintln!("failed to decode parameters against the method's argument signature");
            std::process::exit(EXIT_USAGE);
        }
    };

    let resolver = CacheResolver { decompiled_path: config.jpamb_decompiled_path.clone() };
    let mut ctx = VmContext::new(Arc::clone(&entry.ir), locals, entry.ir.len(), &resolver);
    ctx.heap = heap;
    let outcome = vm::run(&mut ctx);
    println!("{};100%", outcome.name());
}

fn run_abstract(entry: &CacheEntry, arg_types: &[TypeId]) {
    let graph = Graph::from_cfg(&entry.cfg);
    let wpo = Wpo::build(&graph);
    let num_locals = num_locals_for(&entry.ir, arg_types.len());
    let param_locals: Vec<usize> = (0..arg_types.len()).collect();

    let result = interval::interpreter::analyze(&entry.ir, &entry.cfg, &wpo, num_locals, &param_locals);
    for (block_id, state) in result.block_states.iter().enumerate() {
        let vars: Vec<String> = state.vars.iter().map(|&iv| format_interval(iv)).collect();
        println!("block {block_id}: [{}]", vars.join(", "));
    }
}

fn run_fuzzer(config: &Config, method: &MethodId, entry: Arc<CacheEntry>, arg_types: Vec<TypeId>) {
    let graph = Graph::from_cfg(&entry.cfg);
    let wpo = Wpo::build(&graph);
    let num_locals = num_locals_for(&entry.ir, arg_types.len());
    let param_locals: Vec<usize> = (0..arg_types.len()).collect();

    // Default mode seeds the fuzzer from the abstract interpreter's entry
    // state (spec.md §6, "possibly seeded from abstract results").
    let seed_result = interval::interpreter::analyze(&entry.ir, &entry.cfg, &wpo, num_locals, &param_locals);
    let seed_state = seed_result.block_states.first();

    let num_workers = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
    let report = orchestrator::run(&config.jpamb_decompiled_path, method, entry, arg_types, seed_state, num_workers);
    print_outcome_percentages(&report.outcomes);
}

/// Sizes the locals array for abstract analysis beyond the argument count:
/// `STORE`/`INCR` can grow the locals the concrete VM sees, so the abstract
/// state needs to be wide enough to hold every slot the method references.
fn num_locals_for(ir: &IrFunction, min: usize) -> usize {
    let mut max_index = min;
    for instr in ir.iter() {
        let referenced = match &instr.payload {
            Payload::Load { index, .. } | Payload::Store { index, .. } | Payload::Incr { index, .. } => Some(*index),
            _ => None,
        };
        if let Some(index) = referenced {
            max_index = max_index.max(index + 1);
        }
    }
    max_index
}

fn format_interval(iv: Interval) -> String {
    if iv == Interval::TOP {
        "TOP".to_string()
    } else if iv.lower > iv.upper {
        "BOTTOM".to_string()
    } else {
        format!("[{}, {}]", iv.lower, iv.upper)
    }
}

fn print_outcome_percentages(outcomes: &[RuntimeOutcome]) {
    if outcomes.is_empty() {
        return;
    }
    let total = outcomes.len() as f64;
    let counts: std::collections::BTreeMap<&str, usize> =
        itertools::Itertools::counts(outcomes.iter().map(|o| o.name())).into_iter().collect();
    for (name, count) in counts {
        let pct = (count as f64 / total) * 100.0;
        println!("{name};{pct:.2}%");
    }
}

fn print_info(config: &Config) {
    println!("{}", config.name);
    println!("{}", config.version);
    println!("{}", config.group);
    println!("{}", config.tags);
    println!("{}", if config.for_science { "yes" } else { "no" });
}

fn fatal_analysis(err: &impl std::fmt::Display) -> ! {
    eprintln!("{err}");
    std::process::exit(EXIT_ANALYSIS);
}
