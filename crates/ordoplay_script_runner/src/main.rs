// SPDX-License-Identifier: MIT OR Apache-2.0
//! `OrdoPlay` script runner.
//!
//! Loads runtime settings (from the path given as the first argument, or
//! defaults), builds the demo script and runs each of its functions.

mod demos;

use ordoplay_script_graph::Value;
use ordoplay_script_vm::{CallOutcome, EventHub, RuntimeSettings, ScriptVm};
use std::path::Path;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn main() {
    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env();
    for directive in ["ordoplay_script=info", "ordoplay_script_vm=info"] {
        if let Ok(directive) = directive.parse() {
            env_filter = env_filter.add_directive(directive);
        }
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting OrdoPlay script runner v{}", env!("CARGO_PKG_VERSION"));

    let settings = match std::env::args().nth(1) {
        Some(path) => match RuntimeSettings::load(Path::new(&path)) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::error!("Failed to load settings from {}: {e}", path);
                std::process::exit(1);
            }
        },
        None => RuntimeSettings::default(),
    };

    if let Err(e) = run(settings) {
        tracing::error!("Runner failed: {e}");
        std::process::exit(1);
    }
}

fn run(settings: RuntimeSettings) -> Result<(), Box<dyn std::error::Error>> {
    let script = demos::demo_script()?;
    let mut vm = ScriptVm::new(settings);

    let report = vm.load_script(&script);
    for error in &report.errors {
        tracing::warn!("{error}");
    }
    for error in &report.variable_errors {
        tracing::warn!("{error}");
    }

    let outcome = vm.call("product", &[Value::Int(3)])?;
    log_outcome("product(3)", &outcome);

    for _ in 0..2 {
        let outcome = vm.call("countdown", &[Value::Int(3)])?;
        log_outcome("countdown(3)", &outcome);
    }

    let mut hub = EventHub::new();
    if let CallOutcome::Suspended(continuation) = vm.call("greeter", &[])? {
        tracing::info!(
            "greeter suspended, {} bytes captured",
            continuation.stack_size()
        );
        hub.bind(continuation)
            .map_err(|_| "greeter suspended without awaiting an event")?;
    }

    for result in hub.emit(demos::PLAYER_JOINED, &[Value::from("Ada")]) {
        log_outcome("greeter()", &result?);
    }

    Ok(())
}

fn log_outcome(call: &str, outcome: &CallOutcome) {
    match outcome {
        CallOutcome::Returned(value) => tracing::info!("{call} returned {value}"),
        CallOutcome::Suspended(continuation) => tracing::info!(
            "{call} suspended waiting for {}",
            continuation.awaited_event().unwrap_or("nothing")
        ),
    }
}
