use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tomatick_core::storage::SettingsStore;
use tomatick_core::{Pomodoro, Snapshot, SystemClock, TimerDriver};
use tracing::warn;

use super::open_store;
use crate::feedback::TerminalBell;

const HELP: &str = "\
commands:
  t        start / pause
  s        skip to next phase
  r        restart current phase
  g <n>    go to step n
  m <4|8>  switch scenario
  q        quit";

enum Input {
    Toggle,
    Skip,
    Reset,
    Step(usize),
    Scenario(String),
    Quit,
    Help,
}

fn parse(line: &str) -> Option<Input> {
    let mut parts = line.split_whitespace();
    let input = match (parts.next()?, parts.next()) {
        ("t", None) => Input::Toggle,
        ("s", None) => Input::Skip,
        ("r", None) => Input::Reset,
        ("g", Some(n)) => Input::Step(n.parse().ok()?),
        ("m", Some(mode)) => Input::Scenario(mode.to_string()),
        ("q", None) => Input::Quit,
        ("h" | "?", None) => Input::Help,
        _ => return None,
    };
    Some(input)
}

fn render(snapshot: &Snapshot) {
    let state = if snapshot.auto_start_pending {
        " (starting)"
    } else if snapshot.is_paused {
        " (paused)"
    } else {
        ""
    };
    println!(
        "{} {} [{}/{}]{}",
        snapshot.display, snapshot.phase, snapshot.step, snapshot.scenario_len, state
    );
}

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run_loop())
}

async fn run_loop() -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store()?;
    let settings = SettingsStore::load(store.clone());
    let core = Pomodoro::load(
        settings.current(),
        store,
        Arc::new(SystemClock),
        Box::new(TerminalBell),
    );
    let driver = TimerDriver::new(core);
    driver.watch_settings(settings.subscribe()).await;
    driver.resume().await;

    let mut snapshots = driver.subscribe_snapshots();
    let mut events = driver.subscribe_events();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("{HELP}");
    render(&snapshots.borrow_and_update());

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse(line.trim()) {
                    Some(Input::Toggle) => { driver.toggle_pause().await; }
                    Some(Input::Skip) => { driver.skip_to_next_phase().await; }
                    Some(Input::Reset) => { driver.reset_phase().await; }
                    Some(Input::Step(step)) => {
                        if let Err(e) = driver.set_step(step).await {
                            eprintln!("error: {e}");
                        }
                    }
                    // Routed through the settings store so the choice persists.
                    Some(Input::Scenario(mode)) => {
                        if let Err(e) = settings.update("stepsMode", &format!("{mode} steps")) {
                            eprintln!("error: {e}");
                        }
                    }
                    Some(Input::Quit) => break,
                    Some(Input::Help) => println!("{HELP}"),
                    None => eprintln!("unknown command, h for help"),
                }
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                render(&snapshots.borrow_and_update());
            }
            event = events.recv() => match event {
                Ok(event) => println!("{}", serde_json::to_string(&event)?),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event stream lagged"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    driver.shutdown().await;
    Ok(())
}
