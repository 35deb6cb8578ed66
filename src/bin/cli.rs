//! voicetrack CLI: replay a peak dump through the tracker and allocator.
//!
//! Usage:
//!   vt-cli path/to/peaks.vtpk
//!   vt-cli path/to/peaks.vtpk --voices 8 --priority loudest --csv voices.csv

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use clap::{Parser, ValueEnum};
use vt_master::{
    load_config, Controller, CsvWriter, MagnitudeScale, PriorityMode, Render, StreamKey,
    VoiceState,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Peak dump to replay (.vtpk)
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// TOML settings file; missing keys use defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of voice slots (overrides the settings file)
    #[arg(long)]
    voices: Option<usize>,

    /// Voice priority (overrides the settings file)
    #[arg(long, value_enum)]
    priority: Option<Priority>,

    /// Write one CSV row per frame and voice slot
    #[arg(long, value_name = "OUT")]
    csv: Option<PathBuf>,

    /// Write linear magnitudes to the CSV instead of dB
    #[arg(long, default_value_t = false)]
    linear: bool,

    /// Render on a worker thread and show progress
    #[arg(long, default_value_t = false)]
    threaded: bool,

    /// Log configuration and render events to stderr
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Priority {
    Lowest,
    Loudest,
}

impl From<Priority> for PriorityMode {
    fn from(p: Priority) -> Self {
        match p {
            Priority::Lowest => PriorityMode::LowestFrequencyFirst,
            Priority::Loudest => PriorityMode::LoudestFirst,
        }
    }
}

struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, _: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        eprintln!("[{}] {}", record.level(), record.args());
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn main() {
    let args = Args::parse();
    if args.verbose && log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(log::LevelFilter::Debug);
    }

    let mut config = match &args.config {
        Some(path) => load_config(path).unwrap_or_else(|e| fail(&format!("{}: {}", path.display(), e))),
        None => Default::default(),
    };
    if let Some(voices) = args.voices {
        config.allocator.voice_count = voices;
    }
    if let Some(priority) = args.priority {
        config.allocator.priority = priority.into();
    }

    let mut ctrl = Controller::new(config).unwrap_or_else(|e| fail(&format!("Invalid settings: {}", e)));

    let data = fs::read(&args.input)
        .unwrap_or_else(|e| fail(&format!("Failed to read {}: {}", args.input.display(), e)));
    let name = args.input.file_name().and_then(|n| n.to_str()).unwrap_or("input");
    let key = ctrl
        .load_stream(name, &data)
        .unwrap_or_else(|e| fail(&format!("Failed to parse {}: {}", args.input.display(), e)));

    let render = if args.threaded {
        render_threaded(&ctrl, key)
    } else {
        ctrl.render_stream(key, &AtomicBool::new(false), |_| {})
            .unwrap_or_else(|| fail("stream vanished"))
    };

    print_summary(&ctrl, key, &render);

    if let Some(path) = &args.csv {
        let scale = if args.linear { MagnitudeScale::Linear } else { MagnitudeScale::Decibels };
        write_csv(path, &render, scale)
            .unwrap_or_else(|e| fail(&format!("Failed to write {}: {}", path.display(), e)));
        println!("Wrote {}", path.display());
    }
}

fn render_threaded(ctrl: &Controller, key: StreamKey) -> Render {
    let mut handle = ctrl.spawn_render(key).unwrap_or_else(|| fail("stream vanished"));
    let mut voices = Vec::new();
    while !handle.is_finished() {
        while let Some(frame) = handle.try_recv() {
            voices.push(frame);
        }
        let progress = handle.progress();
        if let Some(fraction) = progress.fraction() {
            print!("\rRendering: {:5.1}%", fraction * 100.0);
            let _ = std::io::stdout().flush();
        }
        std::thread::sleep(std::time::Duration::from_millis(10));
    }
    let mut render = handle.wait();
    voices.append(&mut render.voices);
    render.voices = voices;
    println!("\rRendering: done.  ");
    render
}

fn print_summary(ctrl: &Controller, key: StreamKey, render: &Render) {
    let Some(stream) = ctrl.stream(key) else {
        return;
    };
    let config = stream.engine().config();
    println!("Input:        {}", stream.name());
    println!("Frames:       {}", render.report.frames_processed);
    println!("Peaks:        {}", stream.peak_count());
    println!("Voices:       {} ({:?})", config.allocator.voice_count, config.allocator.priority);
    println!("Trajectories: {} born", render.births);
    for state in VoiceState::ALL {
        println!("  {:<10} {}", format!("{:?}:", state), render.state_count(state));
    }
}

fn write_csv(path: &Path, render: &Render, scale: MagnitudeScale) -> std::io::Result<()> {
    let mut writer = CsvWriter::new(BufWriter::new(File::create(path)?), scale);
    for frame in &render.voices {
        writer.write_frame(frame)?;
    }
    writer.finish()?;
    Ok(())
}

fn fail(msg: &str) -> ! {
    eprintln!("{}", msg);
    std::process::exit(1);
}
