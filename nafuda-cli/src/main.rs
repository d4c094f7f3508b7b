//! nafuda CLI - コマンドラインインターフェース
//!
//! 名前ベースのブレークポイント解決器 nafuda のREPLインターフェース

use anyhow::Result;
use clap::Parser;
use nafuda_core::{BreakSpec, BreakTarget, Command, Debugger, Symbol};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

const HISTORY_FILE: &str = ".nafuda_history";

/// nafuda - name-based breakpoint resolver
#[derive(Parser)]
#[command(name = "nafuda")]
#[command(version = "0.1.0")]
#[command(about = "Resolve breakpoints by function name, regex, selector or address", long_about = None)]
struct Cli {
    /// Log filter (overrides RUST_LOG), e.g. "nafuda_core=debug"
    #[arg(long)]
    log: Option<String>,

    /// Binaries to load before the prompt
    binaries: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log.as_deref());

    println!("nafuda - name-based breakpoint resolver");
    println!("Version 0.1.0");
    println!();

    let mut debugger = Debugger::new();
    for binary in &cli.binaries {
        if let Err(e) = handle_load(&mut debugger, binary, 0) {
            eprintln!("Error: {}", e);
        }
    }
    run_repl(&mut debugger)?;

    Ok(())
}

/// ログ出力を初期化する（既定は warn）
fn init_tracing(filter: Option<&str>) {
    let filter = match filter {
        Some(f) => EnvFilter::new(f),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// REPLループを実行する
fn run_repl(debugger: &mut Debugger) -> Result<()> {
    println!("Type 'help' for available commands, 'quit' to exit.");
    println!();

    let mut rl = DefaultEditor::new()?;
    let history = home::home_dir().map(|dir| dir.join(HISTORY_FILE));
    if let Some(path) = &history {
        // 初回起動時は履歴ファイルが無い
        let _ = rl.load_history(path);
    }

    loop {
        let readline = rl.readline("(nafuda) ");
        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                rl.add_history_entry(line)?;

                match handle_command(debugger, line) {
                    Ok(true) => break,
                    Ok(false) => {}
                    Err(e) => eprintln!("Error: {}", e),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    if let Some(path) = &history {
        if let Err(e) = rl.save_history(path) {
            warn!("failed to save history to {}: {}", path.display(), e);
        }
    }

    Ok(())
}

/// コマンドを実行する。終了するならtrue
fn handle_command(debugger: &mut Debugger, line: &str) -> Result<bool> {
    let Some(command) = Command::parse(line)? else {
        return Ok(false);
    };

    match command {
        Command::Help => print_help(),
        Command::Quit => {
            println!("Goodbye!");
            return Ok(true);
        }
        Command::Load { path, slide } => handle_load(debugger, &path, slide)?,
        Command::Break(spec) => handle_break(debugger, spec)?,
        Command::InfoBreak => handle_info_break(debugger),
        Command::Delete(id) => {
            debugger.remove_breakpoint(id)?;
            println!("Deleted breakpoint {}", id);
        }
        Command::Copy(id) => {
            let new_id = debugger.copy_breakpoint(id)?;
            print_breakpoint(debugger, new_id);
        }
        Command::Enable(id, enabled) => {
            debugger.set_enabled(id, enabled)?;
            println!(
                "Breakpoint {} {}",
                id,
                if enabled { "enabled" } else { "disabled" }
            );
        }
        Command::Find(pattern) => {
            let symbols = debugger.find_symbols(&pattern)?;
            let title = format!("Symbols matching '{}'", pattern);
            print_symbol_list(&title, &symbols, Some(20));
        }
    }

    Ok(false)
}

/// Loadコマンドを処理する
fn handle_load(debugger: &mut Debugger, path: &str, slide: u64) -> Result<()> {
    let (_, added) = debugger.load_module(path, slide)?;
    println!("Loaded {}", path);
    if added > 0 {
        println!("{} pending location(s) resolved", added);
    }
    Ok(())
}

/// Breakコマンドを処理する
fn handle_break(debugger: &mut Debugger, spec: BreakSpec) -> Result<()> {
    let BreakSpec { target, options } = spec;
    let id = match target {
        BreakTarget::Names { names, mask } => debugger.break_by_name(&names, mask, &options)?,
        BreakTarget::Regex(pattern) => debugger.break_by_regex(&pattern, &options)?,
        BreakTarget::ClassSelector {
            class_name,
            selector,
        } => debugger.break_by_class_selector(&class_name, &selector, &options)?,
        BreakTarget::Address(addr) => debugger.break_at_address(addr),
    };
    print_breakpoint(debugger, id);
    Ok(())
}

/// ブレークポイントとロケーションを表示する
fn print_breakpoint(debugger: &Debugger, id: nafuda_core::BreakpointId) {
    let Some(bp) = debugger.breakpoint(id) else {
        return;
    };
    println!("Breakpoint {}", bp.description());
    for loc in bp.locations().iter() {
        println!("  {}.{}: {}", bp.id, loc.id, debugger.describe_location(loc));
    }
}

fn handle_info_break(debugger: &Debugger) {
    let ids: Vec<_> = debugger.breakpoints().map(|bp| bp.id).collect();
    if ids.is_empty() {
        println!("No breakpoints");
        return;
    }
    for id in ids {
        print_breakpoint(debugger, id);
    }
}

/// シンボルリストを表示するヘルパー関数
fn print_symbol_list(title: &str, symbols: &[(Arc<nafuda_core::Module>, &Symbol)], limit: Option<usize>) {
    if symbols.is_empty() {
        println!("No {} found", title);
        return;
    }

    let display_limit = limit.unwrap_or(symbols.len());
    println!("{} ({} found):", title, symbols.len());

    for (i, (module, sym)) in symbols.iter().take(display_limit).enumerate() {
        let addr = sym.address.map(|a| a.wrapping_add(module.slide()));
        match addr {
            Some(addr) if sym.size > 0 => println!(
                "  {}. {} @ 0x{:x} (size: {}) [{}]",
                i + 1,
                sym.display_name(),
                addr,
                sym.size,
                module.name()
            ),
            Some(addr) => println!("  {}. {} @ 0x{:x} [{}]", i + 1, sym.display_name(), addr, module.name()),
            None => println!("  {}. {} (undefined) [{}]", i + 1, sym.display_name(), module.name()),
        }
    }

    if symbols.len() > display_limit {
        println!("  ... and {} more", symbols.len() - display_limit);
    }
}

fn print_help() {
    println!("Available commands:");
    println!();
    println!("  help               - Show this help message");
    println!("  quit/exit/q        - Exit");
    println!();
    println!("Module commands:");
    println!("  load <path> [slide] - Load an ELF binary at the given slide");
    println!("  find <pattern>      - Find functions whose name contains pattern");
    println!();
    println!("Breakpoint commands:");
    println!("  break <name>       - Break on a function (kind detected from the name)");
    println!("  break <0xaddr>     - Break at a load address");
    println!("  break -F/-b/-S/-M/-n <name> ...");
    println!("                     - Full, base, selector, mangled or auto name (repeatable)");
    println!("  break -r <regex>   - Break on every function matching regex");
    println!("  break -c <class> -s <selector>");
    println!("                     - Break on an Objective-C method");
    println!("      -L <lang>  -o <offset>  -P (do not skip prologue)");
    println!("  info break         - List breakpoints and locations");
    println!("  delete <id>        - Delete a breakpoint");
    println!("  copy <id>          - Duplicate a breakpoint");
    println!("  enable/disable <id>");
    println!();
    println!("Examples:");
    println!("  break main");
    println!("  break -b push_back");
    println!("  break -r ^std::.*::push_back$");
    println!("  break -c NSObject -s init");
}
