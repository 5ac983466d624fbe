//! Glk Bridge Headless Runner
//!
//! Runs the sample program on an interpreter thread while the main thread
//! plays the presentation side: it feeds scripted input lines, answers file
//! prompts with a fixed name, and prints the transcript or the last
//! snapshot.
//!
//! # Usage
//!
//! ```bash
//! # Script from stdin, transcript to stdout
//! printf 'hello\nsave\nquit\n' | glk-headless
//!
//! # Script from a file, last snapshot as JSON
//! glk-headless --script session.txt --json --output state.json
//! ```

use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use glk_bridge::app::{sample, Config, Transcript};
use glk_bridge::core::{keycode, FileRefPrompt, Library, LibraryState, Rect};
use glk_bridge::event::{spawn_worker, Coordinator, Session, TimerScheduler, UiEvent};
use glk_bridge::host::Presenter;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "glk-headless")]
#[command(version)]
#[command(about = "Run the sample Glk program against a scripted player", long_about = None)]
struct CliArgs {
    /// Input script, one line per turn (stdin if not specified)
    #[arg(short, long, value_name = "FILE")]
    script: Option<PathBuf>,

    /// Output file (stdout if not specified)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Print the last snapshot as JSON instead of the transcript
    #[arg(short, long)]
    json: bool,

    /// Game identifier qualifying save directories
    #[arg(long, value_name = "ID", default_value = "sample")]
    game_id: String,

    /// File name given in answer to every file prompt
    #[arg(long, value_name = "NAME", default_value = "save1")]
    save_name: String,

    /// Path to custom config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Viewport width in points
    #[arg(long, value_name = "POINTS")]
    width: Option<f64>,

    /// Viewport height in points
    #[arg(long, value_name = "POINTS")]
    height: Option<f64>,

    /// Give up if the program does not wait for input within this time
    #[arg(long, value_name = "MS", default_value_t = 5000)]
    timeout_ms: u64,
}

/// Presentation side of the headless runner
#[derive(Default)]
struct HeadlessPresenter {
    timer: TimerScheduler,
    transcript: Mutex<Transcript>,
}

impl Presenter for HeadlessPresenter {
    fn library_state_changed(&self, state: Arc<LibraryState>) {
        self.transcript
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .apply(&state);
    }

    fn vm_exited(&self) {
        tracing::info!("program exited");
    }

    fn file_prompt_pending(&self, prompt: &FileRefPrompt) {
        tracing::info!("file prompt: {} ({:?})", prompt.usage.label(), prompt.mode);
    }

    fn timer_interval_changed(&self, interval: Option<Duration>) {
        self.timer.set_interval(interval);
    }
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args = CliArgs::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &CliArgs) -> Result<(), Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(),
    };
    if let Some(width) = args.width {
        config.window.width = width;
    }
    if let Some(height) = args.height {
        config.window.height = height;
    }

    let script = read_script(args)?;
    let timeout = Duration::from_millis(args.timeout_ms);

    let presenter = Arc::new(HeadlessPresenter::default());
    let coordinator = Arc::new(Coordinator::new(presenter.clone()));
    presenter.timer.attach(&coordinator)?;

    let mut library = Library::new(
        config.library_settings(&args.game_id),
        Arc::new(config.style_policy()),
    );
    library.set_bounds(Rect::new(0.0, 0.0, config.window.width, config.window.height));
    let session = Session::new(library, Arc::clone(&coordinator))
        .with_stall_threshold(Duration::from_millis(config.stall_threshold_ms));
    let worker = spawn_worker(session, sample::run)?;

    let fed = play(&coordinator, script, &args.save_name, timeout);
    coordinator.request_exit();
    let joined = worker.join();
    presenter.timer.stop();
    if joined.is_err() {
        return Err("interpreter thread panicked".into());
    }
    tracing::info!("fed {} input lines", fed?);

    let output = if args.json {
        coordinator
            .latest_state()
            .map(|state| state.to_json())
            .transpose()?
            .unwrap_or_default()
    } else {
        presenter
            .transcript
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .render()
    };

    match &args.output {
        Some(path) => File::create(path)?.write_all(output.as_bytes())?,
        None => io::stdout().write_all(output.as_bytes())?,
    }
    Ok(())
}

fn read_script(args: &CliArgs) -> io::Result<Vec<String>> {
    let reader: Box<dyn BufRead> = match &args.script {
        Some(path) => Box::new(BufReader::new(File::open(path)?)),
        None => Box::new(io::stdin().lock()),
    };
    reader.lines().collect()
}

/// Feed the script to whichever window waits for input.
///
/// Returns the number of lines delivered.
fn play(
    coordinator: &Coordinator,
    script: Vec<String>,
    save_name: &str,
    timeout: Duration,
) -> Result<usize, Box<dyn Error>> {
    let mut lines = script.into_iter();
    let mut fed = 0;
    loop {
        if !coordinator.wait_until_idle(timeout) {
            return Err(format!("program did not wait for input within {:?}", timeout).into());
        }
        if coordinator.vm_exited() {
            return Ok(fed);
        }
        if coordinator.accepting_event_file_select() {
            coordinator.accept_event_file_select(Some(save_name.to_string()));
            continue;
        }

        let Some(state) = coordinator.latest_state() else {
            continue;
        };
        let Some(win) = state
            .windows
            .iter()
            .find(|w| w.line_request || w.char_request)
        else {
            tracing::warn!("program is waiting without an input request");
            return Ok(fed);
        };
        let Some(line) = lines.next() else {
            return Ok(fed);
        };

        let event = if win.line_request {
            UiEvent::Line {
                win: win.tag,
                request_id: win.input_request_id,
                text: line,
            }
        } else {
            UiEvent::Char {
                win: win.tag,
                request_id: win.input_request_id,
                ch: line.chars().next().map_or(keycode::RETURN, u32::from),
            }
        };
        if coordinator.accept_event(event) {
            fed += 1;
        } else {
            tracing::warn!("input refused by window {}", win.tag);
        }
    }
}
