//! colcalc - check, preview and persist custom column formulas

mod config;
mod report;

use std::env;
use std::path::PathBuf;

use anyhow::Context;
use colcalc_core::storage::{load_session, write_columns};
use colcalc_engine::engine::{
    FunctionOp, normalize_coalesce_parentheses, transform_division_expression,
};

fn print_usage() {
    eprintln!("Usage: colcalc [OPTIONS] [SESSION]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  [SESSION]                 Session file (.toml) with columns, formula and rows");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -t, --transform <EXPR>    Print EXPR with every division guarded");
    eprintln!("  -n, --normalize <EXPR>    Print EXPR with redundant COALESCE parentheses removed");
    eprintln!("  -o, --output <FILE>       Write the confirmed column list as TOML");
    eprintln!("  --config <FILE>           Load settings from FILE instead of the default config");
    eprintln!("  --no-config               Ignore the user config file");
    eprintln!("  -h, --help                Print help");
    eprintln!();
    eprintln!("Window functions:");
    for op in FunctionOp::all() {
        eprintln!("  {:<24}  {}", op.name(), op.description());
    }
}

#[derive(Debug, Default)]
struct Options {
    session: Option<PathBuf>,
    transform: Option<String>,
    normalize: Option<String>,
    output: Option<PathBuf>,
    config: Option<PathBuf>,
    no_config: bool,
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let mut opts = Options::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_usage();
                return;
            }
            "-t" | "--transform" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --transform requires an expression");
                    std::process::exit(1);
                }
                opts.transform = Some(args[i].to_string());
            }
            "-n" | "--normalize" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --normalize requires an expression");
                    std::process::exit(1);
                }
                opts.normalize = Some(args[i].to_string());
            }
            "-o" | "--output" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --output requires a file path");
                    std::process::exit(1);
                }
                opts.output = Some(PathBuf::from(&args[i]));
            }
            "--config" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --config requires a file path");
                    std::process::exit(1);
                }
                opts.config = Some(PathBuf::from(&args[i]));
            }
            "--no-config" => {
                opts.no_config = true;
            }
            arg if arg.starts_with('-') => {
                eprintln!("Error: Unknown option: {}", arg);
                print_usage();
                std::process::exit(1);
            }
            _ => {
                if opts.session.is_none() {
                    opts.session = Some(PathBuf::from(&args[i]));
                } else {
                    eprintln!("Error: Unexpected argument: {}", args[i]);
                    print_usage();
                    std::process::exit(1);
                }
            }
        }
        i += 1;
    }

    match run(&opts) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Returns false when the session's formula is not valid.
fn run(opts: &Options) -> anyhow::Result<bool> {
    if let Some(expr) = &opts.transform {
        println!("{}", transform_division_expression(expr));
        return Ok(true);
    }
    if let Some(expr) = &opts.normalize {
        println!("{}", normalize_coalesce_parentheses(expr));
        return Ok(true);
    }

    let Some(session_path) = &opts.session else {
        print_usage();
        return Ok(false);
    };

    let config = if opts.no_config {
        config::Config::default()
    } else {
        let (config, warnings) = config::load_config(opts.config.as_deref());
        for warning in warnings {
            eprintln!("Warning: {}", warning);
        }
        config
    };

    let session = load_session(session_path)
        .with_context(|| format!("loading {}", session_path.display()))?;
    log::debug!(
        "loaded session {:?}: {} columns, {} chunks, {} rows",
        session.name,
        session.catalog.columns().len(),
        session.formula.len(),
        session.rows.len()
    );
    let mut editor = session.editor(config.rename_debounce);
    print!("{}", report::render_report(&editor, &session.rows, &config));

    if !editor.output().is_valid {
        return Ok(false);
    }
    if let Some(output_path) = &opts.output {
        let columns = editor.confirmed_columns()?;
        write_columns(output_path, &columns)
            .with_context(|| format!("writing {}", output_path.display()))?;
        println!("Wrote {} columns to {}", columns.len(), output_path.display());
    }
    Ok(true)
}
