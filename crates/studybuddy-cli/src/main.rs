// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod logging;
mod runtime;

use anyhow::{Context, Result, anyhow};
use config::Config;
use runtime::LlmRuntime;
use std::env;
use std::path::PathBuf;
use studybuddy_app::AppState;
use studybuddy_llm::Client;

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `studybuddy --print-example-config` to generate a template",
            options.config_path.display()
        )
    })?;

    let client = build_client(&config).with_context(|| {
        format!(
            "invalid [llm] config in {}; fix base_url/model/timeout values",
            options.config_path.display()
        )
    })?;
    let log_path = config.log_path()?;
    if options.check_only {
        logging::build_filter(config.log_level())?;
        return Ok(());
    }

    logging::init(config.log_level(), &log_path)?;
    tracing::info!(
        config = %options.config_path.display(),
        endpoint = %client.endpoint(),
        model = client.model(),
        "starting studybuddy"
    );

    let mut state = AppState::default();
    let mut runtime = LlmRuntime::new(client, config.max_image_size());
    let result = studybuddy_tui::run_app(&mut state, &mut runtime);
    if let Err(error) = &result {
        tracing::error!(error = %format!("{error:#}"), "studybuddy exited with error");
    }
    result
}

fn build_client(config: &Config) -> Result<Client> {
    let mut client = Client::new(
        config.llm_base_url(),
        config.llm_model(),
        config.llm_timeout()?,
    )?;
    client.set_max_tokens(config.llm_max_tokens());
    client.set_temperature(config.llm_temperature());
    client.set_system_prompt(config.llm_system_prompt());
    Ok(client)
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_example: bool,
    check_only: bool,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_example: false,
        check_only: false,
        show_help: false,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                return Err(anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    Ok(options)
}

fn print_help() {
    println!("studybuddy: study materials and an AI tutor in your terminal");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-example-config   Print a config template");
    println!("  --check                  Validate config and exit");
    println!("  --help                   Show this help");
    println!();
    println!("The OpenAI API key is entered on the chat screen and kept in memory only.");
}
