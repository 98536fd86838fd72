//! storyboard-cli: 生成服务命令行工具，流式生成并查看有效配置
//!
//! Usage:
//!   storyboard-cli generate <prompt> [--config <path>] [--kind <kind>] [--image <path>]... [--no-stream]
//!   storyboard-cli config [--config <path>]
//!   storyboard-cli version

use std::io::Write;
use std::sync::Arc;

use anyhow::{bail, Context};
use storyboard_runtime::types::ContentPart;
use storyboard_runtime::usage::TracingUsageRecorder;
use storyboard_runtime::{ClientConfig, GenerationClientBuilder};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,usage=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    match args[1].as_str() {
        "generate" => cmd_generate(&args[2..]).await,
        "config" => cmd_config(&args[2..]),
        "version" | "--version" | "-V" => {
            println!("storyboard-cli {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!(
        r#"storyboard-cli: generation service command line tool

USAGE:
    storyboard-cli <COMMAND> [OPTIONS]

COMMANDS:
    generate <prompt>           Stream a generation to stdout
        --config <path>         YAML config file
        --kind <kind>           Usage category (default: script)
        --image <path>          Attach an image (repeatable; selects the vision model)
        --no-stream             Wait for the full reply instead of streaming
    config [--config <path>]    Print the effective configuration
    version                     Show version information
    help                        Show this help message

ENVIRONMENT:
    STORYBOARD_BASE_URL, STORYBOARD_ENDPOINT_PATH, STORYBOARD_API_KEY,
    STORYBOARD_MODEL, STORYBOARD_TIMEOUT_MS, STORYBOARD_PROXY_URL
    RUST_LOG                    Log filter (default: warn,usage=info)"#
    );
}

fn flag_value<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn load_config(args: &[String]) -> anyhow::Result<ClientConfig> {
    let mut config = match flag_value(args, "--config") {
        Some(path) => ClientConfig::from_path(path)
            .with_context(|| format!("loading config from {path}"))?,
        None => ClientConfig::default(),
    };
    config.apply_env();
    Ok(config)
}

fn cmd_config(args: &[String]) -> anyhow::Result<()> {
    let config = load_config(args)?;
    config.validate()?;
    print!("{}", serde_yaml::to_string(&config)?);
    Ok(())
}

async fn cmd_generate(args: &[String]) -> anyhow::Result<()> {
    let Some(prompt) = args.first().filter(|a| !a.starts_with("--")) else {
        bail!("generate needs a prompt");
    };
    let kind = flag_value(args, "--kind").unwrap_or("script");
    let stream = !args.iter().any(|a| a == "--no-stream");

    let mut images = Vec::new();
    for (i, arg) in args.iter().enumerate() {
        if arg == "--image" {
            let path = args.get(i + 1).context("--image needs a path")?;
            images.push(ContentPart::image_from_file(path)?);
        }
    }

    let client = GenerationClientBuilder::from_config(load_config(args)?)
        .usage_recorder(Arc::new(TracingUsageRecorder))
        .build()?;
    let request = client.request_for(prompt.as_str(), images).stream(stream);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let mut stdout = std::io::stdout();
    let mut print_delta = |delta: &str, _full: &str| -> storyboard_runtime::Result<()> {
        stdout.write_all(delta.as_bytes())?;
        stdout.flush()?;
        Ok(())
    };

    let result = client
        .generate(kind, &request, Some(&mut print_delta), Some(&cancel))
        .await?;
    if !stream {
        println!("{}", result.content);
    } else {
        println!();
    }
    Ok(())
}
