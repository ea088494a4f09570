use anyhow::{bail, Result};
use clap::Parser;
use log::{error, info};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{config::Config as EditorConfig, Editor, Helper};
use simplelog::{Config as LogConfig, LevelFilter, SimpleLogger};

use mathpad::{evaluate, free_tree, parse, tokenize, Context};

mod repl;

use repl::{fixup_input, ReplHelper};

const HISTORY_FILE: &str = ".mathpad_history";
const PROMPT: &str = "(mathpad) ";

#[derive(Parser)]
#[command(version, about)]
struct Opt {
    /// Show debug output
    #[arg(short, long)]
    debug: bool,
    /// Print the tokens of each expression before evaluating it
    #[arg(short, long)]
    tokens: bool,
    /// Expressions to evaluate. Starts an interactive session if none are given.
    expressions: Vec<String>,
}

fn init_logging(debug: bool) -> Result<()> {
    let filter = if debug {
        LevelFilter::Info
    } else {
        LevelFilter::Error
    };

    match SimpleLogger::init(filter, LogConfig::default()) {
        Ok(_) => Ok(()),
        Err(e) => bail!("Failed to init logger: {}", e),
    }
}

fn init_editor() -> Result<Editor<ReplHelper, DefaultHistory>> {
    let config = EditorConfig::builder().auto_add_history(true).build();
    let mut editor = match Editor::with_config(config) {
        Ok(e) => e,
        Err(e) => bail!("Failed to init editor: {}", e),
    };
    editor.set_helper(Some(ReplHelper::new()));

    Ok(editor)
}

fn init_history<H: Helper>(editor: &mut Editor<H, DefaultHistory>) {
    let _ = editor.load_history(HISTORY_FILE);
}

fn save_history<H: Helper>(editor: &mut Editor<H, DefaultHistory>) -> Result<()> {
    match editor.save_history(HISTORY_FILE) {
        Ok(_) => Ok(()),
        Err(e) => bail!("Failed to save history: {}", e),
    }
}

fn welcome() {
    println!(r#"mathpad v{}"#, env!("CARGO_PKG_VERSION"));
    println!("Type 'help' for help");
    println!();
}

fn help(ctx: &Context) {
    println!("Enter an expression to evaluate it, eg. `-(2 + 3) * 4 / 7`.");
    println!("End a line with `\\` to continue on the next line.");
    println!("Type 'quit' or press Ctrl-D to quit.");
    println!();
    println!("Operators: + - * / (and, or, xor and mod are recognized but not evaluated)");
    print!("Built-in functions:");
    for func in ctx.functions().filter(|f| f.is_native()) {
        print!(" {}", func);
    }
    println!();

    let user: Vec<String> = ctx
        .functions()
        .filter(|f| !f.is_native())
        .map(|f| f.to_string())
        .collect();
    if !user.is_empty() {
        println!("User functions: {}", user.join(" "));
    }
}

/// Run one expression through the engine, printing the result or the error
///
/// Returns false if the expression failed.
fn run(ctx: &mut Context, text: &str, show_tokens: bool) -> bool {
    let tokens = match tokenize(ctx, text) {
        Ok(t) => t,
        Err(_) => {
            eprintln!("{}", ctx.last_error());
            return false;
        }
    };

    if show_tokens {
        for token in &tokens {
            println!("{:>4}: {}", token.position, token.kind);
        }
    }

    let tree = match parse(ctx, &tokens) {
        Ok(t) => t,
        Err(e) => {
            match e.position {
                Some(pos) => eprintln!("{} (at byte {})", ctx.last_error(), pos),
                None => eprintln!("{}", ctx.last_error()),
            }
            return false;
        }
    };
    info!("tree has {} nodes", tree.node_count());

    let result = evaluate(ctx, &tree);
    free_tree(tree);
    match result {
        Ok(value) => {
            println!("= {}", value);
            true
        }
        Err(_) => {
            eprintln!("{}", ctx.last_error());
            false
        }
    }
}

fn repl(ctx: &mut Context, show_tokens: bool) -> Result<()> {
    let mut editor = init_editor()?;
    init_history(&mut editor);
    welcome();

    loop {
        match editor.readline(PROMPT) {
            Ok(line) => {
                info!("read: {}", &line);

                let input = fixup_input(&line);
                match input.as_str() {
                    "" => continue,
                    "quit" => break,
                    "help" => help(ctx),
                    text => {
                        run(ctx, text, show_tokens);
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                eprintln!("Press Ctrl-D or type 'quit' to quit");
            }
            Err(ReadlineError::Eof) => {
                println!("quit");
                break;
            }
            Err(e) => {
                error!("Unexpected error: {}", e);
                println!("quit");
                break;
            }
        }
    }

    save_history(&mut editor)
}

fn main() -> Result<()> {
    let opts = Opt::parse();
    init_logging(opts.debug)?;

    let mut ctx = Context::with_builtins();
    if opts.expressions.is_empty() {
        return repl(&mut ctx, opts.tokens);
    }

    let mut failed = false;
    for expr in &opts.expressions {
        if !run(&mut ctx, expr, opts.tokens) {
            failed = true;
        }
    }

    if failed {
        std::process::exit(1);
    }

    Ok(())
}
