use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use svn_bisect::bisect::{Bisector, BoundaryPolicy, FailurePolicy, SearchOptions};
use svn_bisect::config::{BisectConfig, CONFIG_FILE_NAME};
use svn_bisect::format::{JsonReport, OutputFormat, TextReporter, verdict};
use svn_bisect::observe::CommandObserver;
use svn_bisect::revision::Revision;
use svn_bisect::telemetry;

/// Binary search a revision range for a text in a command's output
///
/// For each probed revision the working copy is updated
/// (`svn update -r <rev>` by default) and COMMAND is run. The search finds
/// the first revision whose stdout contains TEXT, assuming the text stays
/// present once it appears.
///
/// A command that exits non-zero counts as "text not found" unless
/// `--on-command-failure abort` is given.
///
/// EXAMPLES:
///
///   svn-bisect 1200 1350 "FIXED" ./run-regression.sh
///
///   svn-bisect --format json 100 200 "deprecated" -- make check
///
///   svn-bisect --vcs-tool /opt/svn/bin/svn -C ~/src/app 10 90 "panic" cargo test
#[derive(Parser, Debug)]
#[command(name = "svn-bisect")]
#[command(version, about)]
struct Cli {
    /// The starting revision
    #[arg(allow_negative_numbers = true)]
    start_rev: Revision,

    /// The ending revision
    #[arg(allow_negative_numbers = true)]
    end_rev: Revision,

    /// The text to search for
    text: String,

    /// The command to execute, with its arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,

    /// Working copy directory (default: current directory)
    #[arg(short = 'C', long = "dir", value_name = "DIR")]
    dir: Option<PathBuf>,

    /// Config file (default: `.svn-bisect.toml` in the working copy)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Program used to update the working copy (overrides config)
    #[arg(long, value_name = "PROGRAM", env = "SVN_BISECT_VCS_TOOL")]
    vcs_tool: Option<String>,

    /// What a failing command means (overrides config)
    #[arg(long, value_enum)]
    on_command_failure: Option<FailurePolicy>,

    /// Whether to probe one revision below START_REV (overrides config)
    #[arg(long, value_enum)]
    boundary: Option<BoundaryPolicy>,

    /// Do not re-run the command for revisions already checked
    #[arg(long)]
    memoize: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t)]
    format: OutputFormat,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _telemetry = telemetry::init();
    run(cli)
}

fn run(cli: Cli) -> Result<()> {
    let mut observer = CommandObserver::new(cli.command.clone(), cli.text.as_str())
        .context("You must specify a command to execute.")?;

    let config_path = cli.config.clone().unwrap_or_else(|| {
        cli.dir
            .clone()
            .unwrap_or_default()
            .join(CONFIG_FILE_NAME)
    });
    let mut config = BisectConfig::load(&config_path)?;
    if let Some(tool) = cli.vcs_tool {
        config.vcs.tool = tool;
    }

    let mut options = SearchOptions::from(config.search);
    if let Some(policy) = cli.on_command_failure {
        options.on_command_failure = policy;
    }
    if let Some(boundary) = cli.boundary {
        options.boundary = boundary;
    }
    options.memoize |= cli.memoize;

    let mut materializer = config.vcs.materializer();
    if let Some(dir) = &cli.dir {
        materializer = materializer.in_dir(dir);
        observer = observer.in_dir(dir);
    }

    tracing::info!(
        start = %cli.start_rev,
        end = %cli.end_rev,
        text = %cli.text,
        command = %observer.display_command(),
        vcs = %config.vcs.tool,
        ?options,
        "starting bisection"
    );

    let mut bisector = Bisector::new(materializer, observer).with_options(options);

    match cli.format {
        OutputFormat::Text => {
            let mut reporter = TextReporter::stdio(&cli.command);
            let outcome = bisector.run(cli.start_rev, cli.end_rev, &mut reporter)?;
            println!("{}", verdict(outcome.first));
        }
        OutputFormat::Json => {
            let mut reporter = TextReporter::failures_only(&cli.command);
            let outcome = bisector.run(cli.start_rev, cli.end_rev, &mut reporter)?;
            let report = JsonReport::new(
                &outcome,
                cli.start_rev,
                cli.end_rev,
                &cli.text,
                &cli.command,
            );
            println!("{}", report.to_json()?);
        }
    }

    Ok(())
}
