//! Mirador CLI: run page observation suites against a live site
//!
//! ## Usage
//!
//! ```bash
//! mirador run                              # Built-in suite against http://kalm.lk/
//! mirador run suite.yaml --case register   # One suite file, filtered
//! mirador init mirador.yaml                # Write the built-in suite as YAML
//! mirador show --yaml                      # Print the resolved suite
//! ```

use clap::Parser;
use mirador::{BrowserConfig, HarnessConfig, Suite, DEFAULT_BASE_URL};
use mirador_cli::{
    render_outline, Cli, CliConfig, CliError, CliResult, Commands, InitArgs, LogFormatArg,
    OutputFormat, ProgressReporter, RunArgs, ShowArgs, SuiteRunner, Verbosity,
};
use std::path::Path;
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_check_failure() => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(2)
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();

    let config = build_config(&cli);
    init_tracing(config.verbosity, cli.log_format);

    match cli.command {
        Commands::Run(args) => run_suite(config, &args),
        Commands::Init(args) => run_init(&config, &args),
        Commands::Show(args) => run_show(&args),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    let verbosity = if cli.quiet {
        Verbosity::Quiet
    } else {
        match cli.verbose {
            0 => Verbosity::Normal,
            1 => Verbosity::Verbose,
            _ => Verbosity::Debug,
        }
    };

    CliConfig::new()
        .with_verbosity(verbosity)
        .with_color(cli.color.clone().into())
}

fn init_tracing(verbosity: Verbosity, format: LogFormatArg) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.log_level()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    match format {
        LogFormatArg::Json => builder.json().init(),
        LogFormatArg::Text => builder.init(),
    }
}

fn load_suite(path: Option<&Path>, base_url: Option<&str>, case: Option<&str>) -> CliResult<Suite> {
    let mut suite = match path {
        Some(path) => Suite::load(path)?,
        None => Suite::builtin(DEFAULT_BASE_URL),
    };
    if let Some(url) = base_url {
        suite.base_url = url.to_string();
    }
    if let Some(pattern) = case {
        suite = suite.filter(pattern);
        if suite.cases.is_empty() {
            return Err(CliError::invalid_argument(format!(
                "no case name contains {pattern:?}"
            )));
        }
    }
    suite.validate()?;
    Ok(suite)
}

fn run_suite(config: CliConfig, args: &RunArgs) -> CliResult<()> {
    if args.jobs == 0 {
        return Err(CliError::invalid_argument("--jobs must be at least 1"));
    }
    let suite = load_suite(
        args.suite.as_deref(),
        args.base_url.as_deref(),
        args.case.as_deref(),
    )?;
    let format: OutputFormat = args.format.into();

    let config = config
        .with_jobs(args.jobs)
        .with_artifacts_dir(&args.artifacts);
    let harness = HarnessConfig::new()
        .with_navigation_timeout(Duration::from_millis(args.timeout))
        .with_click_timeout(Duration::from_millis(args.click_timeout))
        .with_artifacts_dir(&config.artifacts_dir);
    let mut browser = BrowserConfig::default().with_headless(!args.headed);
    if args.no_sandbox {
        browser = browser.with_no_sandbox();
    }
    if let Some(ref path) = args.chromium {
        browser = browser.with_chromium_path(path);
    }

    let mut reporter = ProgressReporter::new(
        config.color.should_color(),
        config.verbosity.is_quiet() || format == OutputFormat::Json,
    );
    reporter.header(&format!(
        "{}: {} cases, {} checks against {}",
        suite.name,
        suite.cases.len(),
        suite.check_count(),
        suite.base_url
    ));
    reporter.start_progress(suite.cases.len() as u64, &suite.name);

    let started = Instant::now();
    let runtime = tokio::runtime::Runtime::new()?;
    let runner = SuiteRunner::new(config, harness, browser);
    let report = runtime.block_on(runner.run(&suite, &reporter))?;
    reporter.finish();

    if let Some(ref path) = args.report {
        std::fs::write(path, report.to_json()?)?;
        reporter.info(&format!("Report written to {}", path.display()));
    }

    match format {
        OutputFormat::Json => println!("{}", report.to_json()?),
        OutputFormat::Text => {
            reporter.report(&report);
            reporter.summary(&report, started.elapsed());
        }
    }

    report.into_result()?;
    Ok(())
}

fn run_init(config: &CliConfig, args: &InitArgs) -> CliResult<()> {
    if args.path.exists() && !args.force {
        return Err(CliError::config(format!(
            "{} already exists (use --force to overwrite)",
            args.path.display()
        )));
    }
    let suite = Suite::builtin(args.base_url.as_str());
    suite.validate()?;
    if let Some(parent) = args.path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&args.path, suite.to_yaml()?)?;

    let reporter = ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet());
    reporter.success(&format!(
        "Wrote {} ({} cases)",
        args.path.display(),
        suite.cases.len()
    ));
    Ok(())
}

fn run_show(args: &ShowArgs) -> CliResult<()> {
    let suite = load_suite(
        args.suite.as_deref(),
        args.base_url.as_deref(),
        args.case.as_deref(),
    )?;
    if args.yaml {
        print!("{}", suite.to_yaml()?);
    } else {
        print!("{}", render_outline(&suite));
    }
    Ok(())
}
