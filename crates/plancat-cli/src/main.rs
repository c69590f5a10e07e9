// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod logging;
mod runtime;

use anyhow::{Context, Result};
use config::Config;
use plancat_app::{AppState, SessionContext};
use plancat_client::HttpCatalog;
use plancat_testkit::PlanFaker;
use plancat_tui::UiOptions;
use runtime::{CatalogRuntime, SharedSource};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

const DEMO_SEED: u64 = 2026;

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
            "load config {}; run `plancat --print-example-config` to generate a v1 template",
            options.config_path.display()
        )
    })?;

    let log_file = config.log_file()?;
    logging::init(config.log_level(), &log_file)?;

    let session = if options.demo {
        SessionContext::new(config.session_user(), None)
    } else {
        SessionContext::new(config.session_user(), config.bearer_token())
    };
    let ui_options = UiOptions {
        rows_per_page: config.rows_per_page(),
        session_user: session.display_user().to_owned(),
    };

    let http = if options.demo {
        None
    } else {
        let base_url = config.base_url();
        let client = HttpCatalog::new(&base_url, session, config.timeout()?).with_context(|| {
            format!(
                "invalid [catalog] config in {}; fix base_url/timeout or set PLANCAT_BASE_URL",
                options.config_path.display()
            )
        })?;
        Some(Arc::new(client))
    };

    if options.check_only {
        if let Some(client) = &http {
            client.ping().with_context(|| {
                format!("catalog service at {} did not answer", client.base_url())
            })?;
            println!("catalog service at {} is reachable", client.base_url());
        }
        return Ok(());
    }

    let source: SharedSource = match &http {
        Some(client) => client.clone(),
        None => Arc::new(PlanFaker::new(DEMO_SEED).catalog()),
    };
    info!(
        demo = options.demo,
        user = %ui_options.session_user,
        config = %options.config_path.display(),
        "starting console"
    );

    let mut state = AppState {
        active_screen: config.default_screen(),
        include_inactive: config.include_inactive(),
        ..AppState::default()
    };
    let mut runtime = CatalogRuntime::new(source);
    let result = plancat_tui::run_app(&mut state, &mut runtime, &ui_options);

    if let Some(client) = &http {
        client.end_session();
    }
    info!(ok = result.is_ok(), "console closed");
    result
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    demo: bool,
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
        demo: false,
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
                    .ok_or_else(|| anyhow::anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--demo" => {
                options.demo = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                return Err(anyhow::anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    Ok(options)
}

fn print_help() {
    println!("plancat: planning catalog console");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-example-config   Print a v1 config template");
    println!("  --demo                   Browse a seeded in-memory catalog");
    println!("  --check                  Validate config and ping the catalog service");
    println!("  --help                   Show this help");
}
