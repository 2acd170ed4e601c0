use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use daq_recorder::config::{AppConfig, SAMPLES_FILE, SETTINGS_FILE};
use daq_recorder::hardware::{DaqDriver, SimulatedDriver};
use daq_recorder::results::{self, ResultsFile};
use daq_recorder::{RunEvent, RunHost, RunParameters, RunReport};
use serde::Serialize;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::broadcast::Receiver;

#[derive(Parser, Debug)]
#[command(
    name = "daq_cli",
    about = "Analog input acquisition with bias calibration"
)]
struct Cli {
    /// Settings JSON; when given, a missing or malformed file is an error
    #[arg(long, global = true)]
    settings: Option<PathBuf>,
    /// Line-delimited sample list; when given, it must exist
    #[arg(long, global = true)]
    samples_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List devices visible to the driver
    Devices,
    /// List the configured sample names
    Samples,
    /// Queue one or more acquisition runs and stream their samples
    Run(RunArgs),
    /// Summarise a results file
    Review {
        file: PathBuf,
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    params: ParamArgs,
    /// Number of identical runs to queue
    #[arg(long, default_value_t = 1)]
    runs: usize,
    /// Copy each finished run's file here
    #[arg(long)]
    save: Option<PathBuf>,
    /// Copy each finished run's file to the configured default path
    #[arg(long, default_value_t = false, conflicts_with = "save")]
    save_default: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
    /// Override the simulated input's DC offset (V)
    #[arg(long, allow_hyphen_values = true)]
    sim_offset: Option<f64>,
    /// Override the simulated input's noise amplitude (V)
    #[arg(long)]
    sim_noise: Option<f64>,
}

/// Overrides for the configured acquisition defaults
#[derive(Args, Debug, Default)]
struct ParamArgs {
    #[arg(long)]
    user: Option<String>,
    #[arg(long)]
    sample: Option<String>,
    #[arg(long)]
    device: Option<String>,
    #[arg(long)]
    input_port: Option<String>,
    #[arg(long)]
    output_port: Option<String>,
    #[arg(long)]
    data_points: Option<usize>,
    /// Seconds between samples
    #[arg(long)]
    wait_time: Option<f64>,
    /// Apply a bias to every sample
    #[arg(long, default_value_t = false)]
    bias: bool,
    /// Disable the bias even if the settings enable it
    #[arg(long, default_value_t = false, conflicts_with = "bias")]
    no_bias: bool,
    /// Measure the bias from a background window (requires --bias)
    #[arg(long, default_value_t = false, requires = "bias")]
    auto_bias: bool,
    /// Use the manual bias even if the settings enable auto-bias
    #[arg(long, default_value_t = false, conflicts_with = "auto_bias")]
    no_auto_bias: bool,
    #[arg(long, allow_hyphen_values = true)]
    manual_bias: Option<f64>,
}

impl ParamArgs {
    fn apply(self, mut params: RunParameters) -> RunParameters {
        if let Some(user) = self.user {
            params.user = user;
        }
        if self.sample.is_some() {
            params.sample = self.sample;
        }
        if let Some(device) = self.device {
            params.device = device;
        }
        if let Some(port) = self.input_port {
            params.input_port = port;
        }
        if let Some(port) = self.output_port {
            params.output_port = port;
        }
        if let Some(points) = self.data_points {
            params.data_points = points;
        }
        if let Some(wait_time) = self.wait_time {
            params.wait_time = wait_time;
        }
        if self.bias {
            params.data_bias_toggle = true;
        }
        if self.no_bias {
            params.data_bias_toggle = false;
        }
        if self.auto_bias {
            params.auto_bias_toggle = true;
        }
        if self.no_auto_bias {
            params.auto_bias_toggle = false;
        }
        if let Some(bias) = self.manual_bias {
            params.manual_data_bias = bias;
        }
        params
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Table,
    Json,
}

fn main() -> ExitCode {
    daq_recorder::init_logging("info");
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = load_config(cli.settings.as_deref(), cli.samples_file.as_deref())?;

    match cli.command {
        Commands::Devices => run_devices(&config),
        Commands::Samples => run_samples(&config),
        Commands::Run(args) => run_acquisition(config, args),
        Commands::Review { file, format } => run_review(&file, format),
    }
}

fn load_config(settings: Option<&Path>, samples: Option<&Path>) -> Result<AppConfig> {
    if settings.is_none() && samples.is_none() {
        return Ok(AppConfig::load_or_default(SETTINGS_FILE, SAMPLES_FILE));
    }
    let settings = settings.unwrap_or(Path::new(SETTINGS_FILE));
    let samples = samples.unwrap_or(Path::new(SAMPLES_FILE));
    AppConfig::load(settings, samples).context("loading configuration")
}

fn run_devices(config: &AppConfig) -> Result<ExitCode> {
    let driver = SimulatedDriver::new(config.simulator.clone());
    for device in driver.list_devices()? {
        println!("{device}");
    }
    Ok(ExitCode::from(0))
}

fn run_samples(config: &AppConfig) -> Result<ExitCode> {
    if config.samples.is_empty() {
        println!("No samples configured");
        return Ok(ExitCode::from(0));
    }
    for sample in &config.samples {
        println!("{sample}");
    }
    Ok(ExitCode::from(0))
}

fn run_acquisition(config: AppConfig, args: RunArgs) -> Result<ExitCode> {
    let mut simulator = config.simulator.clone();
    if let Some(offset) = args.sim_offset {
        simulator.dc_offset = offset;
    }
    if let Some(noise) = args.sim_noise {
        simulator.noise_amplitude = noise;
    }
    let driver: Arc<dyn DaqDriver> = Arc::new(SimulatedDriver::new(simulator));
    let host = Arc::new(RunHost::from_config(driver, &config).context("preparing run host")?);

    let destination = if let Some(path) = args.save.as_deref() {
        Some(config.settings.resolve_save_path(Some(path))?)
    } else if args.save_default {
        Some(config.settings.resolve_save_path(None)?)
    } else {
        None
    };

    let params = args.params.apply(config.acquisition.clone());
    let rx = host.subscribe();
    for _ in 0..args.runs {
        host.queue(params.clone()).context("queueing run")?;
    }

    let reports = stream_runs(&host, rx, args.format)?;

    for report in &reports {
        if let Some(temp) = &report.path {
            let target = destination
                .as_ref()
                .map(|dest| numbered(dest, report.run_id, reports.len()));
            results::save_as(temp, target.as_deref())
                .with_context(|| format!("saving run {}", report.run_id))?;
        }
    }

    emit_summary(&reports, args.format)?;

    if reports.iter().any(|report| report.outcome.is_failed()) {
        Ok(ExitCode::from(2))
    } else {
        Ok(ExitCode::from(0))
    }
}

/// Print events until the worker has drained the queue; Ctrl-C aborts.
fn stream_runs(
    host: &Arc<RunHost>,
    rx: Receiver<RunEvent>,
    format: OutputFormat,
) -> Result<Vec<RunReport>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building event runtime")?;

    runtime.block_on(pump_events(host, rx, format))
}

async fn pump_events(
    host: &Arc<RunHost>,
    mut rx: Receiver<RunEvent>,
    format: OutputFormat,
) -> Result<Vec<RunReport>> {
    let worker = host.spawn_queue();
    let mut done = tokio::task::spawn_blocking(move || worker.join());
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut signals_ok = true;
    let mut interrupts = 0;

    loop {
        tokio::select! {
            result = &mut ctrl_c, if signals_ok => {
                if let Err(err) = result {
                    tracing::warn!("Ctrl-C handling unavailable: {}", err);
                    signals_ok = false;
                    continue;
                }
                ctrl_c.set(tokio::signal::ctrl_c());
                interrupts += 1;
                if interrupts > 1 {
                    return Err(anyhow!("interrupted twice, abandoning active run"));
                }
                let dropped = host.clear_queue();
                host.abort();
                tracing::warn!(
                    "Interrupted, {} queued runs dropped; press Ctrl-C again to exit",
                    dropped
                );
            }
            event = rx.recv() => match event {
                Ok(event) => print_event(&event, format)?,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Display lagged, {} events skipped", skipped);
                }
                Err(RecvError::Closed) => {}
            },
            joined = &mut done => {
                loop {
                    match rx.try_recv() {
                        Ok(event) => print_event(&event, format)?,
                        Err(TryRecvError::Lagged(_)) => continue,
                        Err(_) => break,
                    }
                }
                return joined
                    .context("joining run worker")?
                    .map_err(|_| anyhow!("run worker panicked"));
            }
        }
    }
}

fn print_event(event: &RunEvent, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(event)?),
        OutputFormat::Table => match event {
            RunEvent::Queued { .. } => {}
            RunEvent::Started { run_id, metadata } => {
                println!("# run {run_id}");
                for (label, value) in metadata {
                    println!("# {label}: {value}");
                }
                println!("Sample\tY");
            }
            RunEvent::Sample { point, .. } => println!("{}\t{}", point.index, point.value),
            RunEvent::Completed { run_id, emitted } => {
                println!("# run {run_id} completed ({emitted} samples)")
            }
            RunEvent::Cancelled { run_id, emitted } => {
                println!("# run {run_id} cancelled ({emitted} samples)")
            }
            RunEvent::Failed {
                run_id, message, ..
            } => println!("# run {run_id} failed: {message}"),
        },
    }
    Ok(())
}

fn emit_summary(reports: &[RunReport], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let payload = SummaryPayload { reports };
            println!("{}", serde_json::to_string(&payload)?);
        }
        OutputFormat::Table => {
            for report in reports {
                let path = report
                    .path
                    .as_ref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "-".to_string());
                eprintln!(
                    "run {}: {:?}, {} samples, {}",
                    report.run_id, report.outcome, report.emitted, path
                );
            }
        }
    }
    Ok(())
}

fn run_review(file: &Path, format: OutputFormat) -> Result<ExitCode> {
    let results =
        ResultsFile::load(file).with_context(|| format!("reading {}", file.display()))?;
    let summary = results.summary();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Table => {
            println!("procedure: {}", results.procedure);
            for (label, value) in &results.parameters {
                println!("{label}: {value}");
            }
            println!("count: {}", summary.count);
            if let (Some(mean), Some(min), Some(max)) = (summary.mean, summary.min, summary.max) {
                println!("mean: {mean}");
                println!("min: {min}");
                println!("max: {max}");
            }
            if let Some(bias) = summary.bias {
                println!("bias: {bias}");
            }
        }
    }
    Ok(ExitCode::from(0))
}

/// `dest` unchanged for a single run, `<stem>_<run_id>.<ext>` otherwise.
fn numbered(dest: &Path, run_id: u64, total_runs: usize) -> PathBuf {
    if total_runs <= 1 {
        return dest.to_path_buf();
    }
    let stem = dest
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut name = format!("{stem}_{run_id}");
    if let Some(ext) = dest.extension() {
        name.push('.');
        name.push_str(&ext.to_string_lossy());
    }
    dest.with_file_name(name)
}

#[derive(Serialize)]
struct SummaryPayload<'a> {
    reports: &'a [RunReport],
}
