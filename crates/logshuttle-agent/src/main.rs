// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::{env, process::ExitCode, sync::Arc};

use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use logshuttle::{
    config::{version_requested, Config},
    constants::VERSION, delivery::LogplexClient, shuttle::Shuttle,
};

#[tokio::main]
pub async fn main() -> ExitCode {
    if version_requested(env::args_os().skip(1)) {
        println!("log-shuttle {VERSION}");
        return ExitCode::SUCCESS;
    }

    let log_level = env::var("LOG_SHUTTLE_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());
    let env_filter = format!("h2=off,hyper=off,rustls=off,{}", log_level);

    let filter = match EnvFilter::try_new(env_filter) {
        Ok(filter) => filter,
        Err(e) => {
            eprintln!("could not parse log level in configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(false)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting default subscriber failed: {e}");
        return ExitCode::FAILURE;
    }
    debug!("Logging subsystem enabled");

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Error reading log-shuttle configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let client = match LogplexClient::new(&config) {
        Ok(c) => c,
        Err(e) => {
            error!("Error creating logplex client: {e}");
            return ExitCode::FAILURE;
        }
    };
    info!("log-shuttle {VERSION} posting to {}", client.url());

    let shuttle = Shuttle::start(&config, Arc::new(client));

    match config.socket {
        None => {
            shuttle.run_stdin().await;
            ExitCode::SUCCESS
        }
        Some(path) => serve(shuttle, &path).await,
    }
}

#[cfg(unix)]
async fn serve(shuttle: Shuttle, path: &std::path::Path) -> ExitCode {
    match shuttle.serve(path).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Can't listen on {}: {e}", path.display());
            ExitCode::FAILURE
        }
    }
}

#[cfg(not(unix))]
async fn serve(_shuttle: Shuttle, path: &std::path::Path) -> ExitCode {
    error!(
        "UNIX sockets are not supported on this platform: {}",
        path.display()
    );
    ExitCode::FAILURE
}
