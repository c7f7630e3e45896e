use std::{
    env,
    fs::File,
    io::{self, BufWriter},
};

use anyhow::{Context, anyhow};
use comms::Job;
use env_logger::Env;
use log::info;
use workforce::{Connection, Owner, Workforce, WorkforceConfig, connect};

use fractal_farm::{Canvas, Options, Tile, options::USAGE, pgm};

/// The batch client renders a single configuration.
const TAG: u32 = 1;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let opts = Options::parse(env::args().skip(1)).map_err(|e| anyhow!("{e}\n{USAGE}"))?;

    if opts.version {
        println!("fractal-farm version {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let level = if opts.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    let config = WorkforceConfig::load(opts.workers.as_deref()).context("loading worker list")?;
    let Connection {
        roster,
        mut inbound,
        outbound,
        mux,
        reply_port,
        local: _local,
    } = connect(&config).context("connecting to workers")?;

    let view = opts.view;
    let job = view.job();
    let tiles = view.tiles(opts.chunk_width, opts.chunk_height);

    let mut canvas = Canvas::new(view.width, view.height, view.pixel_width(), TAG, tiles.len());
    if opts.verbose {
        canvas = canvas.with_progress();
    }

    let mut wf = Workforce::new(roster, outbound, canvas);
    if opts.probe {
        wf.probe(reply_port);
    }

    wf.begin_batch();
    for rect in tiles {
        let params = Job { rect, ..job }.to_bytes();
        wf.dispatch(Owner(0), Tile { rect, tag: TAG }, &params)?;
    }
    info!(
        "dispatched {} chunks to {} worker(s)",
        wf.dispatched(),
        wf.worker_count()
    );
    wf.kick();

    let mut strategy = mux
        .build(config.tick_interval)
        .ok_or_else(|| anyhow!("the {mux:?} strategy needs a host event loop"))?;
    strategy
        .run(inbound.as_mut(), &mut wf)
        .await
        .context("receiving replies")?;

    if opts.verbose {
        eprintln!();
    }

    if opts.statistics {
        eprintln!("\n{}", wf.stats());
    }

    let canvas = wf.into_client();
    if opts.nooutput {
        return Ok(());
    }

    let maxval = (view.iterations - 1) as u16;
    match &opts.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("creating {}", path.display()))?;
            let mut out = BufWriter::new(file);
            pgm::write(&mut out, canvas.width(), canvas.height(), maxval, canvas.pixels(), opts.ascii)?;
        }
        None => {
            let mut out = BufWriter::new(io::stdout().lock());
            pgm::write(&mut out, canvas.width(), canvas.height(), maxval, canvas.pixels(), opts.ascii)?;
        }
    }

    Ok(())
}
