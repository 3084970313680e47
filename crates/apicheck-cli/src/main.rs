//! apicheck CLI - dispatch and validate API calls against configured services

mod request;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

use apicheck_core::{DEFAULT_EXPECTED_STATUS, ScenarioState, ServiceConfiguration, ServiceRegistry};
use apicheck_runner::{DeadlineKind, Deadlines, RequestDispatcher};

use request::{ExpectArgs, Expectation, RequestArgs};

#[derive(Parser)]
#[command(name = "apicheck")]
#[command(about = "Dispatch and validate API calls against configured services")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Service registry file (default: .apicheck.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Environment (default: $APICHECK_ENV, then the registry default)
    #[arg(short, long, global = true)]
    env: Option<String>,

    /// Output format
    #[arg(long, global = true, default_value = "terminal")]
    output: OutputFormat,

    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize registry file
    Init,

    /// List the services of the selected environment
    Services,

    /// Show the resolved configuration of one service
    Resolve {
        /// Service name
        service: String,
    },

    /// Send one request and print the normalized response
    Call {
        #[command(flatten)]
        request: RequestArgs,
    },

    /// Send one request and validate the response
    Check {
        #[command(flatten)]
        request: RequestArgs,

        /// Expected status code
        #[arg(short, long, default_value_t = DEFAULT_EXPECTED_STATUS)]
        status: u16,

        #[command(flatten)]
        expect: ExpectArgs,
    },
}

#[derive(Clone, Copy, ValueEnum, PartialEq, Eq)]
enum OutputFormat {
    Terminal,
    Json,
    Silent,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(3)
        }
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

fn load_registry(path: Option<&Path>) -> Result<ServiceRegistry> {
    Ok(match path {
        Some(path) => ServiceRegistry::load(path)?,
        None => ServiceRegistry::load_default()?,
    })
}

fn dispatcher(env: Option<&str>, config: Option<&Path>, service: &str) -> Result<RequestDispatcher> {
    let registry = load_registry(config)?;
    let env = registry.select_environment(env);
    Ok(RequestDispatcher::from_registry(&registry, Some(&env), service)?)
}

async fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Init => {
            let config_path = cli
                .config
                .unwrap_or_else(|| PathBuf::from(".apicheck.toml"));
            if config_path.exists() {
                eprintln!("{} already exists", config_path.display());
                return Ok(1);
            }

            std::fs::write(&config_path, ServiceRegistry::example())?;
            println!("Created {}", config_path.display());
            println!("\nEdit the file to configure:");
            println!("  - default_environment: used when APICHECK_ENV is unset");
            println!("  - [[environments.<name>]]: one table per service");
            println!("  - base_url, api_version, connection_timeout, response_timeout");
            Ok(0)
        }

        Commands::Services => {
            let registry = load_registry(cli.config.as_deref())?;
            let env = registry.select_environment(cli.env.as_deref());
            let services = registry.services(&env)?;

            match cli.output {
                OutputFormat::Terminal => {
                    println!("Environment: {env}");
                    if services.is_empty() {
                        println!("  (no services)");
                    }
                    for svc in services {
                        println!(
                            "  {:<20} {} {}",
                            svc.service_name,
                            svc.base_url,
                            if svc.api_version.is_empty() {
                                String::new()
                            } else {
                                format!("({})", svc.api_version)
                            }
                        );
                    }
                }
                OutputFormat::Json => {
                    let json_output = serde_json::json!({
                        "environment": env,
                        "services": services,
                    });
                    println!("{}", serde_json::to_string_pretty(&json_output)?);
                }
                OutputFormat::Silent => {}
            }
            Ok(0)
        }

        Commands::Resolve { service } => {
            let registry = load_registry(cli.config.as_deref())?;
            let env = registry.select_environment(cli.env.as_deref());
            let svc = registry.resolve(Some(&env), &service)?;
            print_resolved(cli.output, &env, &svc)?;
            Ok(0)
        }

        Commands::Call { request } => {
            let dispatcher = dispatcher(cli.env.as_deref(), cli.config.as_deref(), &request.service)?;
            let response = request.send(&dispatcher).await?;

            match cli.output {
                OutputFormat::Terminal => {
                    println!("{} -> {}", request.label(), response.status);
                    println!("{}", serde_json::to_string_pretty(&response.body)?);
                }
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&response)?);
                }
                OutputFormat::Silent => {}
            }
            Ok(0)
        }

        Commands::Check {
            request,
            status,
            expect,
        } => {
            let expectation = Expectation::from(expect);
            let dispatcher = dispatcher(cli.env.as_deref(), cli.config.as_deref(), &request.service)?;

            // One scenario: store the response, then validate what was stored
            let mut state = ScenarioState::new();
            state.store_response(request.send(&dispatcher).await?);
            let verdict = expectation.evaluate(&state, status)?;
            let actual = state.last_response()?.status;

            match cli.output {
                OutputFormat::Terminal => match &verdict {
                    Ok(()) => println!("PASS {} -> {actual} ({expectation})", request.label()),
                    Err(e) => {
                        println!("FAIL {} -> {actual} ({expectation})", request.label());
                        println!("  {e}");
                    }
                },
                OutputFormat::Json => {
                    let json_output = serde_json::json!({
                        "request": request.label(),
                        "expected_status": status,
                        "status": actual,
                        "expectation": expectation.to_string(),
                        "passed": verdict.is_ok(),
                        "error": verdict.as_ref().err().map(ToString::to_string),
                    });
                    println!("{}", serde_json::to_string_pretty(&json_output)?);
                }
                OutputFormat::Silent => {}
            }

            Ok(if verdict.is_ok() { 0 } else { 1 })
        }
    }
}

fn print_resolved(output: OutputFormat, env: &str, svc: &ServiceConfiguration) -> Result<()> {
    let deadlines = Deadlines::from_config(svc);
    match output {
        OutputFormat::Terminal => {
            println!("Environment:  {env}");
            println!("Service:      {}", svc.service_name);
            println!("Base URL:     {}", svc.base_url);
            if !svc.api_version.is_empty() {
                println!("API version:  {}", svc.api_version);
            }
            println!("Overall:      {} ms", deadlines.limit_ms(DeadlineKind::Overall));
            println!("Response:     {} ms", deadlines.limit_ms(DeadlineKind::Response));
        }
        OutputFormat::Json => {
            let json_output = serde_json::json!({
                "environment": env,
                "service": svc,
                "deadlines_ms": {
                    "overall": deadlines.limit_ms(DeadlineKind::Overall),
                    "response": deadlines.limit_ms(DeadlineKind::Response),
                },
            });
            println!("{}", serde_json::to_string_pretty(&json_output)?);
        }
        OutputFormat::Silent => {}
    }
    Ok(())
}
