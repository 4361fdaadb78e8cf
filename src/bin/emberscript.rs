//! CLI tool for compiling and running Emberscript files.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use emberscript::{CancellationToken, GlobalRuntimeContext, Script, Value, ValueType};
use tracing::Level;

#[derive(Parser)]
#[command(name = "emberscript")]
#[command(author, version, about = "Compile and run Emberscript files", long_about = None)]
struct Args {
    /// Script file to compile
    input: PathBuf,

    /// Function to run after preparing the script
    #[arg(short, long)]
    function: Option<String>,

    /// Function argument as TYPE:VALUE (repeatable, in order)
    #[arg(short, long = "arg", value_name = "TYPE:VALUE")]
    args: Vec<String>,

    /// Host global as NAME:TYPE=VALUE (repeatable)
    #[arg(short, long = "global", value_name = "NAME:TYPE=VALUE")]
    globals: Vec<String>,

    /// Cancel the call after this many milliseconds
    #[arg(long, default_value_t = 5000)]
    timeout_ms: u64,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let text = std::fs::read_to_string(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let script = Script::compile(&text).with_context(|| format!("compiling {}", args.input.display()))?;

    let global = GlobalRuntimeContext::new();
    for spec in &args.globals {
        let (name, rest) = spec
            .split_once(':')
            .ok_or_else(|| anyhow!("global '{}' is not NAME:TYPE=VALUE", spec))?;
        let (type_name, value) = rest
            .split_once('=')
            .ok_or_else(|| anyhow!("global '{}' is not NAME:TYPE=VALUE", spec))?;
        let (value_type, value) = parse_typed_value(type_name, value)?;
        global.add_or_set_value(name, value_type, value)?;
    }

    let context = script.prepare(&global)?;

    let Some(function) = args.function else {
        for declaration in script.declarations() {
            println!("declares {} {}", declaration.value_type(), declaration.identifier());
        }
        for dependency in script.dependencies() {
            println!("depends on {} {}", dependency.value_type(), dependency.identifier());
        }
        return Ok(());
    };

    let signature = script
        .function_signature(&function)
        .ok_or_else(|| anyhow!("script has no function named {}", function))?;
    if signature.parameters().len() != args.args.len() {
        bail!("{} takes {} arguments", signature, signature.parameters().len());
    }

    let mut arguments = Vec::with_capacity(args.args.len());
    for spec in &args.args {
        let (type_name, value) = spec
            .split_once(':')
            .ok_or_else(|| anyhow!("argument '{}' is not TYPE:VALUE", spec))?;
        arguments.push(parse_typed_value(type_name, value)?.1);
    }

    let token = CancellationToken::with_timeout(Duration::from_millis(args.timeout_ms));
    match script.execute_function_with_token(&function, &token, &context, arguments)? {
        Some(value) => println!("{}", value),
        None => println!("(void)"),
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Parse `value` as the script type named `type_name`.
fn parse_typed_value(type_name: &str, value: &str) -> Result<(ValueType, Value)> {
    let value_type = ValueType::from_keyword(type_name.trim())
        .ok_or_else(|| anyhow!("unknown type '{}'", type_name))?;

    let parsed = match value_type {
        _ if value == "null" && value_type == ValueType::String => Value::Null,
        ValueType::Bool => Value::Bool(value.parse()?),
        ValueType::Int => Value::Int(value.parse()?),
        ValueType::Long => Value::Long(value.parse()?),
        ValueType::Float => Value::Float(value.parse()?),
        ValueType::Double => Value::Double(value.parse()?),
        ValueType::String => Value::String(value.to_string()),
        ValueType::Void | ValueType::Null => bail!("cannot pass a value of type {}", value_type),
    };

    Ok((value_type, parsed))
}
