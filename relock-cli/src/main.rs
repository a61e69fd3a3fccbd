use clap::Parser;
use relock_core::{ConfigOverrides, LockMode, RunReport, RunStatus, RunnerConfig};
use relock_runner::LockfileRunner;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "relock")]
#[command(about = "Regenerate a project's package lockfile", long_about = None)]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Project directory holding the lockfile
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Package manager executable
    #[arg(short, long)]
    program: Option<String>,

    /// Seconds to wait for the package manager before giving up
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Run a plain install instead of a lockfile-only update
    #[arg(long)]
    full_install: bool,

    /// Exit non-zero when the package manager does
    #[arg(long)]
    fail_on_nonzero: bool,

    /// Print the run report as JSON
    #[arg(long, conflicts_with = "full_install")]
    json: bool,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            project_dir: self.dir.clone(),
            program: self.program.clone(),
            mode: self.full_install.then_some(LockMode::FullInstall),
            timeout_secs: self.timeout,
            fail_on_nonzero: self.fail_on_nonzero.then_some(true),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let ok = run(&cli, &mut io::stdout(), &mut io::stderr()).await?;

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Run once and write the console report to `out`. Returns `false` when the
/// process should exit non-zero after printing.
async fn run(cli: &Cli, out: &mut impl Write, err: &mut impl Write) -> anyhow::Result<bool> {
    let config = RunnerConfig::load(cli.config.as_deref(), cli.overrides())?;
    debug!(?config, "Loaded configuration");
    let runner = LockfileRunner::new(config);

    // Directory problems surface here, before anything is printed
    let invocation = runner.prepare().await?;
    let command = invocation.display_command();

    match runner.config().mode {
        LockMode::LockfileOnly => {
            if !cli.json {
                writeln!(out, "Running {}...", command)?;
                out.flush()?;
            }
            let report = runner.execute(&invocation).await?;

            if cli.json {
                write_json(out, &report)?;
            } else {
                print_report(out, &report)?;
            }

            Ok(!(runner.config().fail_on_nonzero && report.status == RunStatus::Failed))
        }
        LockMode::FullInstall => {
            writeln!(out, "Regenerating package-lock.json by running {}...", command)?;
            out.flush()?;

            match runner.install(&invocation).await {
                Ok(()) => {
                    writeln!(out, "Done! package-lock.json has been regenerated and dependencies installed.")?;
                    Ok(true)
                }
                Err(e) => {
                    writeln!(err, "{} failed: {}", command, e)?;
                    Ok(false)
                }
            }
        }
    }
}

fn print_report(out: &mut impl Write, report: &RunReport) -> io::Result<()> {
    writeln!(out, "STDOUT: {}", report.result.stdout)?;
    writeln!(out, "STDERR: {}", report.result.stderr)?;
    writeln!(out, "Return code: {}", report.result.exit_code)
}

fn write_json(out: &mut impl Write, report: &RunReport) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *out, report)?;
    writeln!(out)?;
    Ok(())
}
