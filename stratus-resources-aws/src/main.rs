mod logging;

use std::{
    collections::BTreeMap,
    io::IsTerminal as _,
    path::{Path, PathBuf},
    process::exit,
};

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use stratus_resource::value::ScalarValue;
use stratus_resources_aws::{
    config::{
        definition::{provider_config_definition, validate_provider_config},
        validation::DiagnosticLevel,
    },
    services::service_list,
};
use tracing::info;

fn main() {
    let args = Args::parse();
    handle_result(run_args(args));
}

fn run_args(args: Args) -> Result<()> {
    match &args.command {
        Commands::ConfigSchema => {
            let definition = provider_config_definition();
            println!("{}", serde_json::to_string_pretty(&definition)?);
            Ok(())
        }
        Commands::Services => {
            print!("{}", service_list());
            Ok(())
        }
        Commands::ValidateConfig { file } => {
            set_up_logging(&args.options)?;
            runtime()?.block_on(validate_config(file))
        }
        Commands::GenerateMan => (|| {
            let cmd = Args::command();
            let man = clap_mangen::Man::new(cmd);
            let mut buffer: Vec<u8> = Default::default();
            man.render(&mut buffer)?;
            println!("{}", String::from_utf8(buffer)?);
            Ok(())
        })(),
        Commands::GenerateMarkdown => {
            let opts = clap_markdown::MarkdownOptions::new().show_footer(false);
            let markdown: String = clap_markdown::help_markdown_custom::<Args>(&opts);
            println!("{}", markdown);
            Ok(())
        }
        Commands::GenerateCompletion { shell } => {
            let mut cmd = Args::command();
            clap_complete::generate(
                *shell,
                &mut cmd,
                "stratus-resources-aws",
                &mut std::io::stdout(),
            );
            Ok(())
        }
    }
}

async fn validate_config(file: &Path) -> Result<()> {
    let contents = tokio::fs::read(file)
        .await
        .with_context(|| format!("reading provider configuration from {}", file.display()))?;
    let config: BTreeMap<String, ScalarValue> = serde_json::from_slice(&contents)
        .with_context(|| format!("parsing provider configuration in {}", file.display()))?;

    info!(fields = config.len(), "validating provider configuration");
    let diagnostics = validate_provider_config(&provider_config_definition(), &config);

    let mut errors = 0;
    for diagnostic in &diagnostics {
        match diagnostic.level {
            DiagnosticLevel::Error => {
                errors += 1;
                println!("error: {}", diagnostic.message);
            }
            DiagnosticLevel::Warning => println!("warning: {}", diagnostic.message),
        }
    }

    if errors > 0 {
        bail!("{} has {} invalid field(s)", file.display(), errors);
    }
    Ok(())
}

fn set_up_logging(options: &Options) -> Result<()> {
    logging::set_up(&logging::Options {
        verbose: options.verbose,
        color: std::io::stderr().is_terminal(),
    })
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to initialize tokio runtime")
}

fn handle_result(r: Result<()>) {
    match r {
        Ok(()) => {}
        Err(e) => {
            eprintln!("stratus-resources-aws error: {:?}", e);
            exit(1);
        }
    }
}

/// AWS resource provider: inspect and check provider configuration
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(flatten)]
    options: Options,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser, Debug, Clone)]
struct Options {
    #[arg(short, long, global = true, default_value = "false")]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the provider configuration fields as JSON
    ConfigSchema,

    /// List the services that accept an `endpoint.<service>` override, with
    /// their aliases
    Services,

    /// Check a JSON object of provider configuration values
    ValidateConfig {
        /// Path to the JSON file
        #[arg(long)]
        file: PathBuf,
    },

    /// Generate markdown documentation for stratus-resources-aws
    #[command(hide = true)]
    GenerateMarkdown,

    /// Generate a manpage for stratus-resources-aws
    #[command(hide = true)]
    GenerateMan,

    /// Generate shell completion for stratus-resources-aws
    #[command(hide = true)]
    GenerateCompletion {
        /// The shell to generate completion for
        #[arg(long)]
        shell: clap_complete::Shell,
    },
}
