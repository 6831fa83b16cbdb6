mod cli;

use std::{
    io::{self, Write},
    process::ExitCode,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use cli::{Invocation, Parsed};
use tracing_subscriber::EnvFilter;
use waveviz_core::{FfmpegEngine, Outcome, Visualizer, WaveVizError};

fn main() -> ExitCode {
    init_tracing();

    let interrupted = Arc::new(AtomicBool::new(false));
    install_interrupt_handler(interrupted.clone());

    ExitCode::from(report(run(interrupted), &mut io::stderr()))
}

/// Maps the run result to a process exit status, printing at most one line.
fn report(result: waveviz_core::Result<()>, stderr: &mut impl Write) -> u8 {
    match result {
        Ok(()) => 0,
        // The reader of our output went away; exit non-zero, quietly.
        Err(err) if err.is_broken_pipe() => 1,
        Err(WaveVizError::Interrupted) => 1,
        Err(err) => {
            let _ = writeln!(stderr, "error: {err}");
            1
        }
    }
}

fn run(interrupted: Arc<AtomicBool>) -> waveviz_core::Result<()> {
    let invocation = match cli::parse_args(std::env::args_os())? {
        Parsed::Run(invocation) => invocation,
        Parsed::Info(info) => {
            info.print()?;
            return Ok(());
        }
    };
    let Invocation {
        config,
        dump_graph,
        ffmpeg,
        ffprobe,
    } = invocation;

    tracing::info!(
        audio = ?config.audio,
        background = ?config.background,
        output = ?config.output,
        "starting visualisation"
    );

    let engine = FfmpegEngine::with_binaries(ffmpeg, ffprobe).overwrite(config.overwrite);
    let visualizer = Visualizer::new(engine).with_interrupt_flag(interrupted);
    let (plan, outcome) = visualizer.run(&config)?;

    if dump_graph {
        let json = serde_json::to_string_pretty(&plan)
            .map_err(|err| WaveVizError::msg(format!("failed to serialise plan: {err}")))?;
        print_stdout(&json)?;
    } else if outcome == Outcome::Planned {
        print_stdout(&visualizer.engine().command_line(&plan.graph))?;
    }
    Ok(())
}

fn print_stdout(text: &str) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{text}")?;
    stdout.flush()
}

fn install_interrupt_handler(flag: Arc<AtomicBool>) {
    if let Err(err) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        tracing::warn!(%err, "could not install Ctrl-C handler");
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .try_init();
}
