use std::fs;
use std::time::Instant;

use arraypipe::document::Document;
use arraypipe::session::{MarshalToWire, Sender, SessionConfig, Value};
use tracing::info;

use crate::cmd::{open_channel, parse_duration, SendArgs};
use crate::exit::{document_error, io_error, session_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_sent, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let value = resolve_value(&args)?;
    let config = SessionConfig {
        timeout,
        block_size: args.block_size.map(|size| size as usize),
        ..SessionConfig::default()
    };

    let channel = open_channel(&args.path, args.listen)?;
    let started = Instant::now();
    let mut sender = Sender::new(channel, config);
    let sent = match value.marshal_to_wire() {
        Ok(frame) => sender.send(&frame).map(|()| Some(frame)),
        // Goes out as an `Invalid` header and fails after the receiver is told.
        Err(_) => sender.send(&value).map(|()| None),
    }
    .map_err(|err| session_error("send failed", err))?;

    if let Some(frame) = sent {
        info!(type_code = %frame.type_code, bytes = frame.payload.len(), "value sent");
        print_sent(&frame, started.elapsed().as_millis(), format);
    }
    Ok(SUCCESS)
}

fn resolve_value(args: &SendArgs) -> CliResult<Value> {
    let text = match (&args.json, &args.file) {
        (Some(json), _) => json.clone(),
        (None, Some(path)) => fs::read_to_string(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?,
        (None, None) => return Err(CliError::new(USAGE, "one of --json or --file is required")),
    };
    let doc = Document::parse(&text).map_err(|err| document_error("invalid --json", err))?;
    doc.to_value()
        .map_err(|err| document_error("invalid value", err))
}
