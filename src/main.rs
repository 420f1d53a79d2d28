//! Sylva: streaming L-system derivation
//!
//! Reads a stream of YAML grammar documents from standard input, derives
//! each on the ordered worker pool, and writes one rendered final tier per
//! document to standard output, in submission order. Progress lines go to
//! standard error.

use std::io::{self, BufWriter, Write};
use std::process::ExitCode;
use std::thread;

use anyhow::{anyhow, bail, Context};

use sylva_core::render_tier;
use sylva_engine::LSystem;
use sylva_lsif::Decoder;
use sylva_pipeline::{Pipeline, PipelineConfig};

fn main() -> ExitCode {
    env_logger::init();
    log::info!("Starting sylva...");

    match listen() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("sylva: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn listen() -> anyhow::Result<()> {
    let mut pipeline = Pipeline::new(PipelineConfig::default());
    let output = pipeline.output();

    // Renders completed systems as they resolve in submission order.
    let consumer = thread::spawn(move || -> anyhow::Result<()> {
        let stdout = io::stdout();
        let mut out = BufWriter::new(stdout.lock());
        for (seq, result) in output.iter().enumerate() {
            let lsystem = result?;
            eprintln!("Sequence {seq} read");
            out.write_all(render_tier(&lsystem.export()).as_bytes())?;
            out.write_all(b"\n")?;
        }
        out.flush()?;
        Ok(())
    });

    let mut decoder = Decoder::new(io::stdin());
    let mut rejected = false;
    while let Some(document) = decoder.decode() {
        let parameters = document
            .context("decoding grammar stream")?
            .import()
            .context("importing grammar")?;
        if pipeline.submit(LSystem::new(parameters)).is_err() {
            // The pool only rejects once its output side is gone; the
            // consumer's error carries the reason.
            rejected = true;
            break;
        }
    }
    pipeline.close();

    let drained = consumer
        .join()
        .map_err(|_| anyhow!("output consumer panicked"))?;
    pipeline.join();
    drained?;
    if rejected {
        bail!("pipeline closed before the stream ended");
    }
    Ok(())
}
