//! labsim-runner: headless runner for the AI-lab economy.
//!
//! Usage:
//!   labsim-runner --seconds 600 --dt 0.1 --db save.db
//!   labsim-runner --offline-ms 3600000 --config lab.json --defs catalog.json
//!   labsim-runner --db save.db --ipc-mode

use anyhow::Result;
use labsim_core::{
    command::PlayerCommand,
    config::SimConfig,
    definitions::Definitions,
    engine::SimEngine,
    error::SimResult,
    event::SimEvent,
    progress::{ProgressLog, ProgressReport},
    store::SqliteSaveStore,
    types::Tick,
};
use std::collections::BTreeMap;
use std::env;
use std::io::{self, BufRead, Write};

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    GetState,
    Tick {
        seconds: f64,
    },
    Command {
        command: PlayerCommand,
    },
    Export,
    Import {
        data: String,
    },
    Save,
    Quit,
}

#[derive(serde::Serialize)]
struct ResourceView {
    amount:     f64,
    per_second: f64,
}

#[derive(serde::Serialize)]
struct UiState {
    tick:                Tick,
    paused:              bool,
    run_id:              String,
    resources:           BTreeMap<String, ResourceView>,
    buildings:           BTreeMap<String, u64>,
    combo_level:         u32,
    training:            Option<String>,
    training_fraction:   f64,
    achievements:        usize,
    permanent_currency:  u64,
    deployable_tokens:   u64,
    purchase_multiplier: u64,
    progress:            Vec<ProgressReport>,
    events:              Vec<SimEvent>,
    error:               Option<String>,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seconds = parse_arg(&args, "--seconds", 60.0f64);
    let dt = parse_arg(&args, "--dt", 0.1f64);
    let offline_ms = parse_arg(&args, "--offline-ms", 0u64);
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let db = str_arg(&args, "--db").unwrap_or(":memory:");

    let config = match str_arg(&args, "--config") {
        Some(path) => SimConfig::load(path)?,
        None => SimConfig::default(),
    };
    let defs = match str_arg(&args, "--defs") {
        Some(path) => Definitions::load(path)?,
        None => Definitions::standard(),
    };

    if !ipc_mode {
        println!("AI Lab: labsim-runner");
        println!("  seconds:    {seconds}");
        println!("  dt:         {dt}");
        println!("  offline_ms: {offline_ms}");
        println!("  db:         {db}");
        println!();
    }

    let mut store = if db == ":memory:" {
        SqliteSaveStore::in_memory()?
    } else {
        SqliteSaveStore::open(db)?
    };
    let mut engine = SimEngine::new(config, defs)?;
    if engine.load(&store)? {
        let report = engine.resume_from(chrono::Utc::now().timestamp_millis())?;
        log::info!("runner: loaded save, caught up {}ms", report.applied_ms);
    }

    if ipc_mode {
        run_ipc_loop(&mut engine, &mut store)?;
    } else {
        if offline_ms > 0 {
            engine.catch_up(offline_ms)?;
        }
        let ticks = if dt > 0.0 { (seconds / dt).round() as u64 } else { 0 };
        engine.run_ticks(ticks, dt)?;
        engine.save(&mut store)?;
        print_summary(&engine, ticks);
    }

    Ok(())
}

fn run_ipc_loop(engine: &mut SimEngine, store: &mut SqliteSaveStore) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                let err_json = serde_json::json!({ "error": e.to_string() });
                writeln!(stdout, "{}", err_json)?;
                stdout.flush()?;
                continue;
            }
        };

        // Rejected commands are reported back, not fatal.
        let outcome: SimResult<Vec<SimEvent>> = match cmd {
            IpcCommand::Quit => break,
            IpcCommand::GetState => Ok(Vec::new()),
            IpcCommand::Tick { seconds } => advance(engine, seconds),
            IpcCommand::Command { command } => engine.submit_command(command),
            IpcCommand::Export => match engine.export_string() {
                Ok(data) => {
                    writeln!(stdout, "{}", serde_json::json!({ "export": data }))?;
                    stdout.flush()?;
                    continue;
                }
                Err(e) => Err(e),
            },
            IpcCommand::Import { data } => engine.import_string(&data).map(|_| Vec::new()),
            IpcCommand::Save => engine.save(store).map(|_| Vec::new()),
        };

        let state = match outcome {
            Ok(events) => build_ui_state(engine, events, None),
            Err(e) => build_ui_state(engine, Vec::new(), Some(e.to_string())),
        };
        writeln!(stdout, "{}", serde_json::to_string(&state)?)?;
        stdout.flush()?;
    }
    Ok(())
}

/// Live time in 100ms steps, with any remainder as a final short tick.
fn advance(engine: &mut SimEngine, seconds: f64) -> SimResult<Vec<SimEvent>> {
    const STEP: f64 = 0.1;
    let whole = (seconds / STEP).floor().max(0.0) as u64;
    let mut events = engine.run_ticks(whole, STEP)?;
    let rest = seconds - whole as f64 * STEP;
    if rest > 1e-9 {
        events.extend(engine.tick(rest)?);
    }
    events.retain(|e| !matches!(e, SimEvent::TickCompleted { .. }));
    Ok(events)
}

fn build_ui_state(engine: &SimEngine, events: Vec<SimEvent>, error: Option<String>) -> UiState {
    let mut progress = ProgressLog::default();
    engine.publish_progress(&mut progress);

    UiState {
        tick:                engine.current_tick(),
        paused:              engine.clock().paused,
        run_id:              engine.run_id().to_string(),
        resources:           engine.ledger().iter()
            .map(|(id, r)| (id.clone(), ResourceView { amount: r.amount(), per_second: r.per_second() }))
            .collect(),
        buildings:           engine.buildings().counts(),
        combo_level:         engine.combo().level(),
        training:            engine.training().active().map(|r| r.model.clone()),
        training_fraction:   engine.training().active().map(|r| r.fraction()).unwrap_or(0.0),
        achievements:        engine.achievements().unlocked_count(),
        permanent_currency:  engine.deployment().permanent_currency,
        deployable_tokens:   engine.deployable_tokens(),
        purchase_multiplier: engine.purchase_multiplier(),
        progress:            progress.batches.pop().unwrap_or_default(),
        events,
        error,
    }
}

fn print_summary(engine: &SimEngine, ticks: u64) {
    let stats = engine.lifetime_stats();

    println!("=== RUN SUMMARY ===");
    println!("  run_id:          {}", engine.run_id());
    println!("  ticks run:       {ticks}");
    println!("  final tick:      {}", engine.current_tick());
    println!("  clicks:          {}", stats.clicks);
    println!("  data generated:  {:.0}", stats.data_generated);
    println!("  playtime:        {:.1}s", stats.playtime_secs);
    println!("  offline:         {:.1}s", stats.offline_secs);
    println!("  achievements:    {}/{}", engine.achievements().unlocked_count(), engine.achievements().len());
    println!("  deployable:      {} tokens", engine.deployable_tokens());

    println!();
    println!("=== RESOURCES ===");
    for (id, r) in engine.ledger().iter() {
        println!("  {id:<16} {:>14.1}  (+{:.2}/s)", r.amount(), r.per_second());
    }

    println!();
    println!("=== BUILDINGS ===");
    let owned: Vec<_> = engine.buildings().iter().filter(|(_, b)| b.count > 0).collect();
    if owned.is_empty() {
        println!("  (none owned)");
    } else {
        for (id, b) in owned {
            println!("  {id:<16} x{}", b.count);
        }
    }
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

fn str_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}
