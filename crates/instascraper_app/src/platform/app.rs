use std::io::{self, BufRead};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use instascraper_core::{update, AppState, Msg, SessionState};
use instascraper_engine::ApifyPostSource;
use scrape_logging::{level_from_name, scrape_info, scrape_warn};

use super::cli::Cli;
use super::effects::EffectRunner;
use super::ui::commands::{parse_command, HELP};
use super::ui::render::TerminalRenderer;
use super::{logging, persistence};

pub fn run_app() -> Result<()> {
    let cli = Cli::parse();
    logging::initialize(cli.log_destination(), level_from_name(&cli.log_level));

    let settings_dir = std::env::current_dir().context("could not resolve working directory")?;
    let settings = cli.apply(
        persistence::load_settings(&settings_dir).unwrap_or_else(persistence::default_settings),
    );
    let source = ApifyPostSource::new(cli.apify_settings())
        .context("could not set up the Apify client")?;

    let (msg_tx, msg_rx) = mpsc::channel::<Msg>();
    let mut runner = EffectRunner::new(msg_tx.clone(), Arc::new(source), settings_dir);
    let mut renderer = TerminalRenderer::new(io::stdout());

    spawn_command_reader(msg_tx.clone());
    spawn_ticker(msg_tx.clone());

    println!("{HELP}");
    // The form is restored and the scrape button pressed right away.
    let _ = msg_tx.send(Msg::RestoreSettings(settings));
    let _ = msg_tx.send(Msg::ScrapeButtonClicked);

    let mut state = AppState::new();
    let mut started = false;
    while let Ok(msg) = msg_rx.recv() {
        let is_tick = msg == Msg::Tick;
        let (next, effects) = update(state, msg);
        state = next;
        runner.run(effects);

        let view = state.view();
        if state.consume_dirty() {
            renderer.render(&view).context("could not write to the terminal")?;
        } else if is_tick {
            renderer.pulse(&view).context("could not write to the terminal")?;
        }

        started |= view.session != SessionState::Idle;
        if started && view.finished() {
            break;
        }
    }

    renderer.finish().context("could not write to the terminal")?;
    runner.shutdown();
    scrape_info!("Exiting");
    Ok(())
}

fn spawn_command_reader(msg_tx: mpsc::Sender<Msg>) {
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    scrape_warn!("Stopped reading commands: {}", err);
                    return;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match parse_command(&line) {
                Some(msg) => {
                    if msg_tx.send(msg).is_err() {
                        return;
                    }
                }
                None => println!("{HELP}"),
            }
        }
    });
}

// Drives the pulsing progress bar.
fn spawn_ticker(msg_tx: mpsc::Sender<Msg>) {
    thread::spawn(move || {
        let interval = Duration::from_millis(250);
        while msg_tx.send(Msg::Tick).is_ok() {
            thread::sleep(interval);
        }
    });
}
