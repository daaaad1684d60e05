//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Mirador: run declarative page observation suites against a live site
#[derive(Parser, Debug)]
#[command(name = "mirador")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Log line format
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormatArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a suite against a browser
    Run(RunArgs),

    /// Write the built-in suite as an editable YAML file
    Init(InitArgs),

    /// List the cases and checks of a suite
    Show(ShowArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct RunArgs {
    /// Suite file (default: built-in landing and register suite)
    pub suite: Option<PathBuf>,

    /// Override the suite's base URL
    #[arg(short, long, env = "MIRADOR_BASE_URL")]
    pub base_url: Option<String>,

    /// Only run cases whose name contains this pattern
    #[arg(short, long)]
    pub case: Option<String>,

    /// Number of cases to run concurrently, each on its own page
    #[arg(short = 'j', long, default_value = "1")]
    pub jobs: usize,

    /// Summary format on stdout
    #[arg(short, long, default_value = "text")]
    pub format: FormatArg,

    /// Also write the JSON report to this file
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Directory screenshots are written to
    #[arg(short, long, default_value = "target/mirador")]
    pub artifacts: PathBuf,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Disable the chromium sandbox (needed in most containers)
    #[arg(long)]
    pub no_sandbox: bool,

    /// Chromium executable
    #[arg(long, env = "CHROME")]
    pub chromium: Option<String>,

    /// Navigation timeout in milliseconds
    #[arg(long, default_value = "30000")]
    pub timeout: u64,

    /// Per-click timeout in milliseconds
    #[arg(long, default_value = "5000")]
    pub click_timeout: u64,
}

/// Arguments for the init command
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Suite file to create
    #[arg(default_value = "mirador.yaml")]
    pub path: PathBuf,

    /// Base URL written into the suite
    #[arg(short, long, default_value = mirador::DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Overwrite an existing file
    #[arg(short, long)]
    pub force: bool,
}

/// Arguments for the show command
#[derive(Parser, Debug)]
pub struct ShowArgs {
    /// Suite file (default: built-in suite)
    pub suite: Option<PathBuf>,

    /// Override the suite's base URL
    #[arg(short, long, env = "MIRADOR_BASE_URL")]
    pub base_url: Option<String>,

    /// Only show cases whose name contains this pattern
    #[arg(short, long)]
    pub case: Option<String>,

    /// Print the resolved suite as YAML
    #[arg(long)]
    pub yaml: bool,
}

/// Color argument
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

/// Log format argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormatArg {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Summary format argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FormatArg {
    /// Human-readable verdict list
    #[default]
    Text,
    /// Pretty-printed JSON report
    Json,
}

impl From<FormatArg> for crate::output::OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Text => Self::Text,
            FormatArg::Json => Self::Json,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    mod cli_tests {
        use super::*;

        #[test]
        fn test_parse_run_defaults() {
            let cli = Cli::parse_from(["mirador", "run"]);
            if let Commands::Run(args) = cli.command {
                assert!(args.suite.is_none());
                assert_eq!(args.jobs, 1);
                assert_eq!(args.timeout, 30000);
                assert_eq!(args.click_timeout, 5000);
                assert_eq!(args.format, FormatArg::Text);
                assert!(!args.headed);
            } else {
                panic!("expected Run command");
            }
        }

        #[test]
        fn test_parse_run_options() {
            let cli = Cli::parse_from([
                "mirador",
                "run",
                "suite.yaml",
                "--base-url",
                "https://staging.example.com",
                "--case",
                "register",
                "-j",
                "4",
                "--format",
                "json",
                "--no-sandbox",
            ]);
            if let Commands::Run(args) = cli.command {
                assert_eq!(args.suite, Some(PathBuf::from("suite.yaml")));
                assert_eq!(args.base_url.as_deref(), Some("https://staging.example.com"));
                assert_eq!(args.case.as_deref(), Some("register"));
                assert_eq!(args.jobs, 4);
                assert_eq!(args.format, FormatArg::Json);
                assert!(args.no_sandbox);
            } else {
                panic!("expected Run command");
            }
        }

        #[test]
        fn test_parse_init_defaults() {
            let cli = Cli::parse_from(["mirador", "init"]);
            if let Commands::Init(args) = cli.command {
                assert_eq!(args.path, PathBuf::from("mirador.yaml"));
                assert_eq!(args.base_url, mirador::DEFAULT_BASE_URL);
                assert!(!args.force);
            } else {
                panic!("expected Init command");
            }
        }

        #[test]
        fn test_parse_show_yaml() {
            let cli = Cli::parse_from(["mirador", "show", "--yaml"]);
            if let Commands::Show(args) = cli.command {
                assert!(args.yaml);
            } else {
                panic!("expected Show command");
            }
        }

        #[test]
        fn test_global_flags() {
            let cli = Cli::parse_from(["mirador", "-vv", "--log-format", "json", "show"]);
            assert_eq!(cli.verbose, 2);
            assert_eq!(cli.log_format, LogFormatArg::Json);
        }

        #[test]
        fn test_color_conversion() {
            use crate::config::ColorChoice;
            assert_eq!(ColorChoice::from(ColorArg::Never), ColorChoice::Never);
            assert_eq!(ColorChoice::from(ColorArg::Always), ColorChoice::Always);
        }
    }
}
