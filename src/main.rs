use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use frame_bus::engine::Engine;
use frame_bus::output::{self, Framing, OutputWriter};
use frame_bus::pipeline::{Pipeline, PipelineReport};
use frame_bus::script::Script;

mod args;
mod config;

use args::Args;
use config::{OutputTarget, PipeConfig};

fn init_logging() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Warn)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .init();
}

fn open_sink(target: &OutputTarget) -> anyhow::Result<Box<dyn Write + Send>> {
    Ok(match target {
        OutputTarget::Stdout => Box::new(BufWriter::new(io::stdout())),
        OutputTarget::File(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to open output file {}", path.display()))?;
            Box::new(BufWriter::new(file))
        }
    })
}

fn run(config: &PipeConfig) -> anyhow::Result<PipelineReport> {
    let script = Script::load(&config.script)?;
    let engine = Engine::new(script.threads()).context("Failed to start frame engine")?;

    let node = script.output(config.index)?;
    let video_info = *node.video_info();
    Pipeline::check_streamable(&video_info)?;
    if config.framing == Framing::Y4m {
        output::y4m_header(&video_info)?;
    }

    let source = Arc::new(engine.source(node)?);
    let sink = open_sink(&config.output)?;
    log::debug!(
        "output {} of {} to {}",
        config.index,
        script.name(),
        config.output.name()
    );

    let pipeline = Pipeline::new(source, OutputWriter::new(sink, config.framing), config.requests)?;
    Ok(pipeline.run()?)
}

fn main() -> ExitCode {
    init_logging();

    let args = match Args::parse_normalized(std::env::args_os()) {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    if !args.is_complete() {
        eprint!("{}", args::USAGE);
        return ExitCode::FAILURE;
    }

    let result = args
        .into_config()
        .map_err(anyhow::Error::from)
        .and_then(|config| run(&config));
    match result {
        Ok(report) => {
            log::info!(
                "Output {} frames in {:.2} seconds ({:.2} fps)",
                report.frames_written,
                report.elapsed.as_secs_f64(),
                report.fps()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
