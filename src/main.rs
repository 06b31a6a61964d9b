use chrono::Local;
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::error::Error;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use refleks::calibration::{self, InputClass};
use refleks::capture::RawPointerSample;
use refleks::config::Config;
use refleks::geometry::{Point, Viewport};
use refleks::history::{HistoryDb, TrialRecord};
use refleks::metrics::TrialMetrics;
use refleks::narrative::{narrate_best_effort, NullNarrativeService};
use refleks::recording::TrialRecording;
use refleks::runtime::{Clock, ManualClock, SystemClock};
use refleks::trial::{TrialMachine, TrialPhase};

/// reflex test engine harness: simulate, analyze, and replay trials without a display
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Drives the kinematic capture engine headlessly: runs a synthetic subject \
through a full trial, derives biomechanical metrics, records trials to JSON, and replays \
recordings deterministically."
)]
pub struct Cli {
    /// random seed for target placement and the synthetic subject
    #[clap(short, long)]
    seed: Option<u64>,

    /// capture surface width in px
    #[clap(long, default_value_t = 1280.0)]
    width: f64,

    /// capture surface height in px
    #[clap(long, default_value_t = 800.0)]
    height: f64,

    /// synthetic subject's reaction delay before moving, ms
    #[clap(long, default_value_t = 220.0)]
    reaction_ms: f64,

    /// synthetic subject's movement duration, ms
    #[clap(long, default_value_t = 260.0)]
    travel_ms: f64,

    /// skip the startup calibration pass (reaction times stay uncorrected)
    #[clap(long)]
    no_calibration: bool,

    /// calibrate for a touch sensor instead of a desktop pointer
    #[clap(long)]
    touch: bool,

    /// save the captured trial to a JSON recording
    #[clap(short, long)]
    record: Option<PathBuf>,

    /// replay a recorded trial instead of simulating one
    #[clap(long)]
    replay: Option<PathBuf>,

    /// playback speed factor for --replay
    #[clap(long, default_value_t = 1.0)]
    speed: f64,

    /// append a successful trial to the history database
    #[clap(long)]
    save_history: bool,

    /// print history bests and recent trials, then exit
    #[clap(long)]
    history: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if cli.history {
        return show_history();
    }
    if let Some(path) = cli.replay.clone() {
        return run_replay(&path, cli.speed);
    }
    run_simulation(&cli)
}

fn run_simulation(cli: &Cli) -> Result<(), Box<dyn Error>> {
    let mut rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let viewport = Viewport::new(cli.width, cli.height);
    let mut machine = TrialMachine::new(Config::default(), viewport, &mut rng);
    let clock = ManualClock::new();

    if !cli.no_calibration {
        let input_class = if cli.touch {
            InputClass::TouchSensor
        } else {
            InputClass::DesktopPointer
        };
        // Overhead is measured against the real clock even though the
        // simulated trial runs on a manual one.
        let profile = calibration::calibrate(&SystemClock::new(), input_class);
        println!(
            "calibration: {} overhead {:.2}ms (jitter {:.2}ms)",
            profile.input_class, profile.overhead_ms, profile.jitter_ms
        );
        machine.set_calibration(profile);
    }

    let a = machine.anchors().a;
    let b = machine.anchors().b;
    println!(
        "anchors: A ({:.0}, {:.0}) -> B ({:.0}, {:.0}), {:.0}px apart",
        a.x,
        a.y,
        b.x,
        b.y,
        machine.anchors().ideal_distance_px()
    );

    // Press on A, then tick until the randomized countdown fires.
    let down = RawPointerSample::new(clock.now_ms(), a.x, a.y);
    if !machine.on_pointer_down(down, &mut rng) {
        return Err("pointer-down missed the capture radius".into());
    }
    while machine.phase() == TrialPhase::Holding {
        clock.advance(5.0);
        machine.on_tick(clock.now_ms());
    }
    let go = clock.now_ms();
    println!("go signal at t={:.0}ms", go);

    // The synthetic subject: sub-threshold tremor during its reaction
    // delay, then a smoothstep strike onto B, delivered in coalesced
    // batches at native-ish sampling rate.
    let mut batch = Vec::new();
    let mut t = go;
    while t < go + cli.reaction_ms {
        t += 8.0;
        let jitter_x = rng.gen_range(-1.0..1.0);
        let jitter_y = rng.gen_range(-1.0..1.0);
        batch.push(RawPointerSample::new(t, a.x + jitter_x, a.y + jitter_y));
        if batch.len() == 4 {
            machine.on_pointer_move(&batch);
            batch.clear();
        }
    }
    let move_start = t;
    while t < move_start + cli.travel_ms {
        t += 8.0;
        let u = ((t - move_start) / cli.travel_ms).min(1.0);
        let f = u * u * (3.0 - 2.0 * u);
        let wobble = rng.gen_range(-1.5..1.5);
        batch.push(RawPointerSample::new(
            t,
            a.x + (b.x - a.x) * f + wobble,
            a.y + (b.y - a.y) * f + wobble,
        ));
        if batch.len() == 4 {
            machine.on_pointer_move(&batch);
            batch.clear();
        }
    }
    batch.push(RawPointerSample::new(t + 8.0, b.x, b.y));
    machine.on_pointer_move(&batch);
    clock.set(t + 8.0);

    machine.on_pointer_up();

    match machine.phase() {
        TrialPhase::Results => {
            let results = *machine.results().expect("results in results phase");
            print_results(&results, machine.path().len());

            if let Some(narrative) = narrate_best_effort(&NullNarrativeService, &results) {
                println!("narrative: {}", narrative.summary);
            }

            if cli.save_history {
                save_history(&results)?;
            }
            if let Some(path) = &cli.record {
                let recording = TrialRecording::from_machine(&machine, viewport)
                    .ok_or("nothing to record")?;
                recording.save(path)?;
                println!("recorded to {}", path.display());
            }
        }
        TrialPhase::Failed => {
            let violation = machine.violation().expect("violation in failed phase");
            println!(
                "trial failed: {} at ({:.0}, {:.0})",
                violation.reason, violation.last_position.x, violation.last_position.y
            );
        }
        phase => return Err(format!("unexpected terminal phase {}", phase).into()),
    }

    Ok(())
}

fn print_results(results: &TrialMetrics, samples: usize) {
    println!("--- results ({} samples) ---", samples);
    println!("reaction time:   {:>8.1} ms", results.reaction_time_ms);
    println!("travel time:     {:>8.1} ms", results.travel_time_ms);
    println!("peak velocity:   {:>8.2} m/s", results.peak_velocity);
    println!("peak accel:      {:>8.1} m/s²", results.peak_acceleration);
    println!("accuracy:        {:>8.2} mm", results.accuracy_mm);
    println!("path efficiency: {:>8.1} %", results.path_efficiency_pct);
    println!("tier:            {:>8}", results.tier);
}

fn run_replay(path: &PathBuf, speed: f64) -> Result<(), Box<dyn Error>> {
    if speed <= 0.0 {
        return Err("replay speed must be positive".into());
    }
    let recording = TrialRecording::load(path)?;
    let mut session = recording.replay(speed);
    println!(
        "replaying {} ({} samples, {:.0}ms) at {}x",
        path.display(),
        recording.samples.len(),
        session.duration_ms,
        session.speed
    );

    let reaction_ms = recording.results.map(|r| r.reaction_time_ms);
    let frame_ms = 16.0;
    let mut last_cursor: Option<Point> = None;
    loop {
        let before = session.virtual_time_ms;
        let vt = session.tick(frame_ms);
        if vt <= before {
            break; // looped once through the capture
        }
        let cursor = session.cursor_at(&recording.samples, recording.anchors.a);
        if last_cursor != Some(cursor) {
            let phase = match reaction_ms {
                Some(r) if vt < r => "REACTION",
                Some(_) => "TRAVEL",
                None => "-",
            };
            println!(
                "t={:>6.0}ms  cursor=({:>6.1}, {:>6.1})  {}",
                vt, cursor.x, cursor.y, phase
            );
            last_cursor = Some(cursor);
        }
    }
    println!("loop complete");
    Ok(())
}

fn save_history(results: &TrialMetrics) -> Result<(), Box<dyn Error>> {
    match HistoryDb::new() {
        Ok(db) => {
            db.record(&TrialRecord {
                timestamp: Local::now(),
                reaction_time_ms: results.reaction_time_ms,
                tier: results.tier,
            })?;
            println!("saved to history");
        }
        Err(e) => {
            // History is additive; a dead store never blocks results.
            eprintln!("history unavailable: {}", e);
        }
    }
    Ok(())
}

fn show_history() -> Result<(), Box<dyn Error>> {
    let db = HistoryDb::new()?;
    let bests = db.bests(Local::now())?;

    let show = |label: &str, record: &Option<TrialRecord>| match record {
        Some(r) => println!("{:<10} {:>7.1} ms  {}", label, r.reaction_time_ms, r.tier),
        None => println!("{:<10}      --", label),
    };
    show("today", &bests.day);
    show("week", &bests.week);
    show("month", &bests.month);
    show("year", &bests.year);
    show("all-time", &bests.all_time);

    let recent = db.recent(10)?;
    if !recent.is_empty() {
        println!("--- recent ---");
        for r in recent {
            println!(
                "{}  {:>7.1} ms  {}",
                r.timestamp.format("%Y-%m-%d %H:%M"),
                r.reaction_time_ms,
                r.tier
            );
        }
    }
    Ok(())
}
