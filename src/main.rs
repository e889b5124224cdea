//! securecode - Semgrep + LLM security scanner
//!
//! Runs Semgrep, asks a hosted model for a deeper review, then lets you chat
//! about the findings or generate custom Semgrep rules from them.

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use securecode::config::{setup_api_key_interactive, Config};
use securecode::input::{read_text, ScanInput};
use securecode::llm::{self, AnalysisOptions, GroqClient, KNOWN_MODELS};
use securecode::report::{generate_report, write_report};
use securecode::rules::{combine_rules, extract_yaml_blocks, RULES_FILE_NAME};
use securecode::scanner::{scan_or_empty, ScanOptions};
use securecode::session::Session;
use std::io::{self, BufRead, Read, Write};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "securecode",
    about = "Security scanner combining Semgrep with LLM analysis",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Model id (overrides config)
    #[arg(long, global = true)]
    model: Option<String>,

    /// Sampling temperature 0.0-1.0 (overrides config)
    #[arg(long, global = true)]
    temperature: Option<f32>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan files with Semgrep and analyze them with the model
    Scan(ScanArgs),
    /// Chat about vulnerabilities in a piece of code
    Chat(ChatArgs),
    /// Generate custom Semgrep rules for identified vulnerabilities
    Rules(RulesArgs),
    /// Store the Groq API key in the system keychain
    Setup,
    /// List known model ids
    Models,
}

#[derive(ClapArgs, Debug)]
struct ScanArgs {
    /// Files to scan
    #[arg(required_unless_present = "stdin")]
    files: Vec<PathBuf>,

    /// Read code from stdin instead of files
    #[arg(long, conflicts_with = "files")]
    stdin: bool,

    /// File extension used for stdin code so Semgrep can detect the language
    #[arg(long, default_value = "py")]
    ext: String,

    /// Custom Semgrep rules (.yaml); defaults to --config=auto
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Allow Semgrep to send usage metrics
    #[arg(long)]
    metrics: bool,

    /// Write a markdown report here
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Continue into chat about the results
    #[arg(long)]
    chat: bool,
}

#[derive(ClapArgs, Debug)]
struct ChatArgs {
    /// Code to discuss
    #[arg(long)]
    code: PathBuf,

    /// Known vulnerabilities or a previous analysis
    #[arg(long)]
    analysis: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
struct RulesArgs {
    /// Code to generate rules for
    #[arg(long)]
    code: PathBuf,

    /// Vulnerabilities to create rules for
    #[arg(long)]
    analysis: Option<PathBuf>,

    /// Where to save the extracted rules
    #[arg(long, default_value = RULES_FILE_NAME)]
    out: PathBuf,
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "securecode=debug" } else { "securecode=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut config = Config::load();
    if let Some(model) = args.model {
        config.model = model;
    }
    if let Some(temperature) = args.temperature {
        config.temperature = temperature.clamp(0.0, 1.0);
    }

    match args.command {
        Commands::Setup => {
            setup_api_key_interactive().map_err(|e| anyhow::anyhow!("{}", e))?;
            config.save().map_err(|e| anyhow::anyhow!("{}", e))?;
            eprintln!("  + Settings saved to {}", Config::config_location());
            Ok(())
        }
        Commands::Models => {
            for model in KNOWN_MODELS {
                let marker = if *model == config.model { "*" } else { " " };
                println!("{} {}", marker, model);
            }
            Ok(())
        }
        Commands::Scan(scan_args) => run_scan(scan_args, &config).await,
        Commands::Chat(chat_args) => {
            let mut session = Session::new().with_code(read_text(&chat_args.code)?);
            session.current_file = Some(chat_args.code.clone());
            if let Some(path) = &chat_args.analysis {
                session.analysis = read_text(path)?;
            }
            let client = GroqClient::from_config(&config)?;
            chat_loop(&mut session, &client, &AnalysisOptions::from_config(&config)).await
        }
        Commands::Rules(rules_args) => run_rules(rules_args, &config).await,
    }
}

async fn run_scan(args: ScanArgs, config: &Config) -> Result<()> {
    let input = if args.stdin {
        let mut code = String::new();
        io::stdin()
            .read_to_string(&mut code)
            .context("Failed to read code from stdin")?;
        ScanInput::from_code(code, &args.ext)?
    } else {
        ScanInput::from_files(&args.files)?
    };

    let scan_options = ScanOptions {
        program: config.semgrep_program.clone(),
        rules: args.rules.clone(),
        metrics: args.metrics,
        timeout: config.semgrep_timeout(),
    };

    eprintln!("  Running Semgrep scan...");
    let targets = input.targets.clone();
    let scan = tokio::task::spawn_blocking(move || scan_or_empty(&targets, &scan_options)).await?;

    println!("## Semgrep Findings");
    println!();
    println!("{}", scan.render());
    println!();

    let options = AnalysisOptions::from_config(config);
    let mut session = Session::new().with_code(input.code.clone());
    session.current_file = input.single_file().map(|p| p.to_path_buf());

    let has_code = !input.code.trim().is_empty();
    let client = if has_code || args.chat {
        Some(GroqClient::from_config(config)?)
    } else {
        None
    };

    match &client {
        Some(client) if has_code => {
            eprintln!("  Running LLM analysis with {}...", client.model());
            let analysis = llm::analyze_security(&scan, &input.code, client, &options).await?;

            println!("## Security Analysis");
            println!();
            println!("{}", analysis);
            session.analysis = analysis;
        }
        _ => eprintln!("  No code to analyze; skipping model analysis."),
    }

    session.scan = Some(scan);
    if let Some(path) = &args.output {
        write_report(path, &generate_report(&session))?;
        eprintln!("  + Report written to {}", path.display());
    }

    if let Some(client) = client.as_ref().filter(|_| args.chat) {
        chat_loop(&mut session, client, &options).await?;
    }

    Ok(())
}

async fn run_rules(args: RulesArgs, config: &Config) -> Result<()> {
    let code = read_text(&args.code)?;
    if code.trim().is_empty() {
        anyhow::bail!("{} is empty; nothing to generate rules for", args.code.display());
    }
    let analysis = match &args.analysis {
        Some(path) => read_text(path)?,
        None => String::new(),
    };

    let client = GroqClient::from_config(config)?;
    eprintln!("  Generating Semgrep rules...");
    let reply = llm::suggest_rules(&code, &analysis, &client, &AnalysisOptions::from_config(config)).await?;

    println!("## Generated Rules");
    println!();
    println!("{}", reply);

    let blocks = extract_yaml_blocks(&reply);
    if blocks.is_empty() {
        eprintln!("  No valid YAML rule blocks found in the reply.");
    } else {
        std::fs::write(&args.out, combine_rules(&blocks))
            .with_context(|| format!("Failed to write {}", args.out.display()))?;
        eprintln!("  + {} rule block(s) saved to {}", blocks.len(), args.out.display());
    }
    Ok(())
}

async fn chat_loop(session: &mut Session, client: &GroqClient, options: &AnalysisOptions) -> Result<()> {
    eprintln!();
    eprintln!("  Security chat about {}.", session.subject());
    eprintln!("  Type 'exit' to quit, 'reset' to clear history.");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("\n> ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let query = line?;
        let query = query.trim();

        match query {
            "" => continue,
            "exit" | "quit" => break,
            "reset" => {
                let dropped = session.clear_history();
                eprintln!("  History cleared ({} messages).", dropped);
                continue;
            }
            _ => {}
        }

        let reply = llm::security_chat(session, query, client, options).await?;
        println!();
        println!("{}", reply);
    }

    Ok(())
}
