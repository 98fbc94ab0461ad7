/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use anyhow::{anyhow, bail, ensure, Context, Result};
use clap::Parser;
use dsi_progress_logger::{concurrent_progress_logger, progress_logger, ProgressLog};
use maxflow::prelude::*;
use maxflow::thread_pool;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

#[derive(Parser, Debug)]
#[command(about = "Computes a maximum flow between two sets of nodes of a graph.", long_about = None)]
struct Args {
    /// A text file with one arc per line, in the form "SRC DST CAPACITY"
    /// (the capacity defaults to 1); lines starting with "#" are ignored.
    arcs: PathBuf,

    #[arg(short, long = "source", required = true, num_args = 1..)]
    /// A source node, optionally followed by a colon and its supply (e.g.,
    /// "3:10.5"). Either all sources or none must specify a supply.
    sources: Vec<String>,

    #[arg(short, long = "target", required = true, num_args = 1..)]
    /// A target node, optionally followed by a colon and its demand. Either
    /// all targets or none must specify a demand.
    targets: Vec<String>,

    #[arg(long)]
    /// A text file with lines of the form "NODE CAPACITY" specifying node
    /// capacities; other nodes are unconstrained.
    node_capacities: Option<PathBuf>,

    #[arg(short = 'j', long, default_value_t = rayon::current_num_threads().max(1), value_parser = num_threads_parser)]
    /// The number of threads to use.
    num_threads: usize,

    #[arg(long, value_enum, default_value_t = Engine::Sequential)]
    /// The discharging engine.
    engine: Engine,

    #[arg(long, value_enum, default_value_t = Gap::Buckets)]
    /// The gap-detection strategy.
    gap: Gap,

    #[arg(long, default_value_t = 0.5)]
    /// The frequency of global relabelings.
    freq: f64,

    #[arg(long, default_value_t = 1024)]
    /// The number of nodes claimed at a time by parallel tasks.
    granularity: usize,

    #[arg(long, value_parser = parse_duration)]
    /// How often to log progress. Default is 10s. You can use the suffixes "s"
    /// for seconds, "m" for minutes, "h" for hours, and "d" for days. If no
    /// suffix is provided it is assumed to be in milliseconds.
    log_interval: Option<Duration>,
}

fn num_threads_parser(arg: &str) -> Result<usize> {
    let num_threads = arg.parse::<usize>()?;
    ensure!(num_threads > 0, "Number of threads must be greater than 0");
    Ok(num_threads)
}

/// Parses a duration from a string.
///
/// Example: `1d2h3m4s567` this is parsed as: 1 day, 2 hours, 3 minutes, 4
/// seconds, and 567 milliseconds.
fn parse_duration(value: &str) -> Result<Duration> {
    if value.is_empty() {
        bail!("Empty duration string, if you want every 0 milliseconds use `0`.");
    }
    let mut duration = Duration::from_secs(0);
    let mut acc = String::new();
    for c in value.chars() {
        if c.is_ascii_digit() {
            acc.push(c);
        } else if c.is_whitespace() {
            continue;
        } else {
            let dur = acc.parse::<u64>()?;
            match c {
                's' => duration += Duration::from_secs(dur),
                'm' => duration += Duration::from_secs(dur * 60),
                'h' => duration += Duration::from_secs(dur * 60 * 60),
                'd' => duration += Duration::from_secs(dur * 60 * 60 * 24),
                _ => return Err(anyhow!("Invalid duration suffix: {}", c)),
            }
            acc.clear();
        }
    }
    if !acc.is_empty() {
        let dur = acc.parse::<u64>()?;
        duration += Duration::from_millis(dur);
    }
    Ok(duration)
}

/// Parses terminals of the form `ID` or `ID:CAPACITY`.
fn parse_terminals(terminals: &[String]) -> Result<InputNodes> {
    let parsed = terminals
        .iter()
        .map(|t| match t.split_once(':') {
            None => Ok((t.trim().parse::<u64>()?, None)),
            Some((id, cap)) => Ok((id.trim().parse::<u64>()?, Some(cap.trim().parse::<f64>()?))),
        })
        .collect::<Result<Vec<(u64, Option<f64>)>>>()
        .with_context(|| format!("Could not parse terminals {:?}", terminals))?;

    if parsed.iter().all(|(_, cap)| cap.is_none()) {
        Ok(InputNodes::List(parsed.into_iter().map(|(id, _)| id).collect()))
    } else {
        parsed
            .into_iter()
            .map(|(id, cap)| {
                cap.map(|cap| (id, cap))
                    .ok_or_else(|| anyhow!("Terminal {} has no capacity, but others do", id))
            })
            .collect::<Result<Vec<_>>>()
            .map(InputNodes::Map)
    }
}

/// Iterates over the non-empty, non-comment lines of a file, split into
/// whitespace-separated fields.
fn for_each_record(path: &Path, mut f: impl FnMut(&[&str]) -> Result<()>) -> Result<()> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Could not open {}", path.display()))?;
    for (line_num, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields = line.split_whitespace().collect::<Vec<_>>();
        f(&fields)
            .with_context(|| format!("Error at line {} of {}", line_num + 1, path.display()))?;
    }
    Ok(())
}

fn load_arcs(path: &Path, pl: &mut impl ProgressLog) -> Result<CapacityVecGraph> {
    let mut graph = CapacityVecGraph::new();
    pl.item_name("arc");
    pl.expected_updates(None);
    pl.start(format!("Loading arcs from {}...", path.display()));
    for_each_record(path, |fields| {
        ensure!(
            fields.len() == 2 || fields.len() == 3,
            "Expected \"SRC DST [CAPACITY]\", found {} fields",
            fields.len()
        );
        let src = fields[0].parse::<usize>()?;
        let dst = fields[1].parse::<usize>()?;
        let capacity = match fields.get(2) {
            Some(c) => c.parse::<f64>()?,
            None => 1.0,
        };
        graph.add_arcs([(src, dst, capacity)]);
        pl.light_update();
        Ok(())
    })?;
    pl.done();
    graph.shrink_to_fit();
    Ok(graph)
}

fn load_node_capacities(path: &Path, num_nodes: usize) -> Result<Vec<f64>> {
    let mut capacities = vec![f64::INFINITY; num_nodes];
    for_each_record(path, |fields| {
        ensure!(fields.len() == 2, "Expected \"NODE CAPACITY\", found {} fields", fields.len());
        let node = fields[0].parse::<usize>()?;
        ensure!(node < num_nodes, "Node {} does not exist (the graph has {} nodes)", node, num_nodes);
        capacities[node] = fields[1].parse::<f64>()?;
        Ok(())
    })?;
    Ok(capacities)
}

/// Initializes the `env_logger` logger with a custom format including
/// timestamps with elapsed time since initialization.
fn init_env_logger() -> Result<()> {
    use jiff::fmt::friendly::{Designator, Spacing, SpanPrinter};
    use jiff::SpanRound;

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));

    let start = std::time::Instant::now();
    let printer = SpanPrinter::new()
        .spacing(Spacing::None)
        .designator(Designator::Compact);
    let span_round = SpanRound::new()
        .largest(jiff::Unit::Day)
        .smallest(jiff::Unit::Millisecond)
        .days_are_24_hours();

    builder.format(move |buf, record| {
        let Ok(ts) = jiff::Timestamp::try_from(SystemTime::now()) else {
            return Err(std::io::Error::other("Failed to get timestamp"));
        };
        let style = buf.default_level_style(record.level());
        let elapsed = start.elapsed();
        let span = jiff::Span::new()
            .seconds(elapsed.as_secs() as i64)
            .milliseconds(elapsed.subsec_millis() as i64);
        let span = span.round(span_round).map_err(std::io::Error::other)?;
        writeln!(
            buf,
            "{} {} {style}{}{style:#} [{:?}] {} - {}",
            ts.strftime("%F %T%.3f"),
            printer.span_to_string(&span),
            record.level(),
            std::thread::current().id(),
            record.target(),
            record.args()
        )
    });
    builder.init();
    Ok(())
}

pub fn main() -> Result<()> {
    init_env_logger()?;
    let args = Args::parse();
    ensure!(
        args.freq > 0.0,
        "The global-relabeling frequency must be positive, got {}",
        args.freq
    );

    let mut pl = progress_logger![];
    let mut cpl = concurrent_progress_logger![];
    if let Some(log_interval) = args.log_interval {
        pl.log_interval(log_interval);
        cpl.log_interval(log_interval);
    }

    let sources = parse_terminals(&args.sources)?;
    let targets = parse_terminals(&args.targets)?;
    let graph = load_arcs(&args.arcs, &mut pl)?;
    log::info!(
        "Loaded a graph with {} nodes and {} arcs",
        graph.num_nodes(),
        graph.num_arcs()
    );
    let node_capacities = args
        .node_capacities
        .as_deref()
        .map(|path| load_node_capacities(path, graph.num_nodes()))
        .transpose()?;

    log::info!(
        "Estimated memory usage: {} bytes",
        maxflow::maxflow::mem_usage(
            graph.num_nodes(),
            graph.num_arcs(),
            sources.len() + targets.len(),
            args.engine,
            args.num_threads,
        )
    );

    let mut max_flow = MaxFlow::new(&graph, sources, targets);
    max_flow
        .engine(args.engine)
        .gap(args.gap)
        .freq(args.freq)
        .granularity(Granularity::Nodes(args.granularity))
        .node_capacities(node_capacities.as_deref());

    let thread_pool = thread_pool![args.num_threads];
    log::info!("Using {} threads", thread_pool.current_num_threads());
    let result = thread_pool.install(|| max_flow.run_with_logging(&mut pl, &mut cpl))?;

    let mut out = BufWriter::new(std::io::stdout().lock());
    for arc in &result.flows {
        writeln!(out, "{}\t{}\t{}", arc.src, arc.dst, arc.flow)?;
    }
    out.flush()?;

    log::info!("Total flow: {}", result.total_flow);
    Ok(())
}
