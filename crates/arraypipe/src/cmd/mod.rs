use std::path::{Path, PathBuf};
use std::time::Duration;

use arraypipe::transport::{open_pipe, PipeStream};
use clap::{Args, Subcommand};

use crate::exit::{transport_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod recv;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send one value to a receiver.
    Send(SendArgs),
    /// Receive one value and print it.
    Recv(RecvArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args, format),
        Command::Recv(args) => recv::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Pipe path to connect to (or bind with --listen).
    pub path: PathBuf,
    /// Value as a JSON document, e.g. {"type":"float64","rows":1,"cols":2,"data":[1,2]}.
    #[arg(long, conflicts_with = "file")]
    pub json: Option<String>,
    /// Read the JSON document from a file.
    #[arg(long, conflicts_with = "json")]
    pub file: Option<PathBuf>,
    /// Total session budget (e.g. 3s, 500ms).
    #[arg(long, default_value = "3s")]
    pub timeout: String,
    /// Payload chunk size in bytes. Default: 90% of the pipe buffer.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub block_size: Option<u32>,
    /// Bind the path and wait for the receiver to connect.
    #[arg(long)]
    pub listen: bool,
}

#[derive(Args, Debug)]
pub struct RecvArgs {
    /// Pipe path to connect to (or bind with --listen).
    pub path: PathBuf,
    /// Total session budget (e.g. 3s, 500ms).
    #[arg(long, default_value = "3s")]
    pub timeout: String,
    /// Expect the payload as one unframed span instead of acknowledged chunks.
    #[arg(long)]
    pub raw: bool,
    /// Do not send the ready byte before reading the header.
    #[arg(long)]
    pub no_ready: bool,
    /// Largest payload to accept, in bytes.
    #[arg(long)]
    pub max_payload: Option<usize>,
    /// Bind the path and wait for the sender to connect.
    #[arg(long)]
    pub listen: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Connect to `path`, or bind it and accept one peer when `listen` is set.
pub fn open_channel(path: &Path, listen: bool) -> CliResult<PipeStream> {
    if !listen {
        return open_pipe(path).map_err(|err| transport_error("connect failed", err));
    }

    #[cfg(not(unix))]
    {
        return Err(CliError::new(
            USAGE,
            format!(
                "--listen is not supported on this platform ({})",
                path.display()
            ),
        ));
    }

    #[cfg(unix)]
    {
        let listener = arraypipe::transport::UnixDomainSocket::bind(path)
            .map_err(|err| transport_error("bind failed", err))?;
        tracing::info!(path = %path.display(), "waiting for peer");
        listener
            .accept()
            .map_err(|err| transport_error("accept failed", err))
    }
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
