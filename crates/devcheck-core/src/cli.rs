use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser, Subcommand};
use devcheck_shared::{ProjectStatus, Stage};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "devcheck",
    version,
    about = "DevCheck: project checklists from MVP to deployment"
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "devcheckrc")]
    pub devcheckrc: Option<PathBuf>,

    #[arg(long = "data")]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Log in and store the access token.
    Login {
        username: String,
        #[arg(long, env = "DEVCHECK_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account, then log in with it.
    Register {
        username: String,
        #[arg(long, env = "DEVCHECK_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Logout,
    /// Exchange the stored refresh token for a new access token.
    RefreshSession,
    Whoami,
    /// Recently edited projects with their progress.
    Projects {
        #[arg(long)]
        all: bool,
    },
    /// Status counts and overall task totals.
    Summary,
    Show {
        project: String,
    },
    CreateProject {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        link: Option<String>,
        #[arg(long = "page")]
        pages: Vec<String>,
        /// Cover image uploaded with the project.
        #[arg(long)]
        image: Option<PathBuf>,
    },
    EditProject {
        project: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        link: Option<String>,
        /// Replaces the project's cover image.
        #[arg(long)]
        image: Option<PathBuf>,
    },
    DeleteProject {
        project: String,
    },
    Status {
        project: String,
        #[arg(value_parser = parse_status)]
        status: ProjectStatus,
        #[arg(long)]
        yes: bool,
    },
    Toggle {
        project: String,
        task: u64,
    },
    AddTask {
        project: String,
        page: String,
        #[arg(value_parser = parse_stage)]
        stage: Stage,
        #[arg(required = true, num_args = 1..)]
        title: Vec<String>,
    },
    DeleteTask {
        project: String,
        task: u64,
    },
    AddPage {
        project: String,
        #[arg(required = true, num_args = 1..)]
        name: Vec<String>,
    },
    DeletePage {
        project: String,
        page: String,
        #[arg(long)]
        yes: bool,
    },
    /// Create the stage sections an incomplete page is missing.
    RepairPage {
        project: String,
        page: String,
    },
    ReportIssue {
        #[arg(required = true, num_args = 1..)]
        description: Vec<String>,
    },
}

pub fn parse_stage(raw: &str) -> anyhow::Result<Stage> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "mvp" => Ok(Stage::Mvp),
        "dev" | "development" | "in development" => Ok(Stage::Dev),
        "deploy" | "deployment" | "in deployment" => Ok(Stage::Deploy),
        other => Err(anyhow!("unknown stage: {other} (expected mvp, dev or deploy)")),
    }
}

pub fn parse_status(raw: &str) -> anyhow::Result<ProjectStatus> {
    let status = match parse_stage(raw)? {
        Stage::Mvp => ProjectStatus::Mvp,
        Stage::Dev => ProjectStatus::InDevelopment,
        Stage::Deploy => ProjectStatus::InDeployment,
    };
    Ok(status)
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls bare `rc.key=value` / `rc.key:value` arguments out before clap
/// sees them.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = if let Some((k, v)) = rest.split_once('=') {
                Some((format!("rc.{k}"), v.to_string()))
            } else {
                rest.split_once(':')
                    .map(|(k, v)| (format!("rc.{k}"), v.to_string()))
            };

            if let Some((k, v)) = parsed {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((k, v));
                continue;
            }
        }

        cleaned.push(arg);
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}
