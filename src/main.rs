// SPDX-License-Identifier: GPL-3.0-only
use anyhow::{anyhow, bail, Context};

use crate::config::Config;
use crate::monitor::ModeSelector;

#[macro_use]
extern crate tracing;

mod api;
mod brightness;
mod config;
mod error;
mod monitor;
mod protocols;
mod resolution;

const USAGE: &str = "usage: randr-display-control <command>

commands:
  displays                          list outputs and their resolutions
  modes                             list the mode catalog
  mode <output> [<name>|#<n> [<hz>]]
                                    resolve a mode of an output, the preferred one by default
  brightness                        read the backlight
  set-brightness <value>            write the backlight, clamped to its range
  set-resolution <width> <height>   switch the screen resolution";

fn setup_logs() {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    let filter_layer = EnvFilter::try_from_default_env().unwrap_or(EnvFilter::new(format!(
        "warn,{}=warn",
        env!("CARGO_CRATE_NAME")
    )));

    if let Ok(journal_layer) = tracing_journald::layer() {
        tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt_layer)
            .with(journal_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt_layer)
            .init();
    }
}

fn arg<T: std::str::FromStr>(args: &[String], index: usize, what: &str) -> anyhow::Result<T> {
    let raw = args
        .get(index)
        .ok_or_else(|| anyhow!("missing {}\n\n{}", what, USAGE))?;
    raw.parse()
        .map_err(|_| anyhow!("invalid {}: {:?}", what, raw))
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(config: &Config, args: &[String]) -> anyhow::Result<bool> {
    let Some(command) = args.first() else {
        bail!("{}", USAGE);
    };

    match command.as_str() {
        "displays" => {
            let displays = api::get_displays(config)
                .await
                .context("failed to list displays")?;
            print_json(&displays)?;
        }
        "modes" => {
            let modes = api::get_modes(config)
                .await
                .context("failed to list modes")?;
            print_json(&modes)?;
        }
        "mode" => {
            let output: String = arg(args, 1, "output name")?;
            let selector = match args.get(2) {
                Some(key) => match key.strip_prefix('#') {
                    Some(index) => ModeSelector::by_index(
                        index
                            .parse()
                            .map_err(|_| anyhow!("invalid mode index: {:?}", key))?,
                    ),
                    None => ModeSelector::by_name(key.clone()),
                },
                None => ModeSelector::preferred(),
            };
            let refresh = match args.get(3) {
                Some(_) => Some(arg::<f64>(args, 3, "refresh rate")?),
                None => None,
            };
            let mode = api::find_mode(config, output, selector, refresh)
                .await
                .context("failed to resolve mode")?;
            print_json(&mode)?;
        }
        "brightness" => {
            let level = api::get_brightness(config)
                .await
                .context("failed to read brightness")?;
            print_json(&level)?;
        }
        "set-brightness" => {
            let value: f64 = arg(args, 1, "brightness value")?;
            let ok = api::set_brightness(config, value).await;
            print_json(&ok)?;
            return Ok(ok);
        }
        "set-resolution" => {
            let width: i64 = arg(args, 1, "width")?;
            let height: i64 = arg(args, 2, "height")?;
            let ok = api::set_screen_resolution(config, width, height).await;
            print_json(&ok)?;
            return Ok(ok);
        }
        other => bail!("unknown command {:?}\n\n{}", other, USAGE),
    }

    Ok(true)
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    setup_logs();

    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            error!("errors loading config: {}", err);
            Config::default()
        }
    };
    debug!(?config, "Using configuration");

    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&config, &args).await {
        Ok(true) => std::process::ExitCode::SUCCESS,
        Ok(false) => std::process::ExitCode::FAILURE,
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::ExitCode::from(2)
        }
    }
}
