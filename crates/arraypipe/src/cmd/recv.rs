use arraypipe::document::Document;
use arraypipe::frame::{Frame, DEFAULT_MAX_PAYLOAD};
use arraypipe::session::{
    PayloadFraming, Receiver, SessionConfig, SessionError, UnmarshalFromWire, Value,
};
use tracing::info;

use crate::cmd::{open_channel, parse_duration, RecvArgs};
use crate::exit::{document_error, session_error, CliResult, SUCCESS};
use crate::output::{print_raw, print_value, OutputFormat};

pub fn run(args: RecvArgs, format: OutputFormat) -> CliResult<i32> {
    let config = config_from_args(&args)?;
    let channel = open_channel(&args.path, args.listen)?;

    let mut receiver = Receiver::new(channel, config);
    let frame: Frame = receiver
        .receive()
        .map_err(|err| session_error("receive failed", err))?;
    info!(
        type_code = %frame.type_code,
        rows = frame.shape.rows,
        cols = frame.shape.cols,
        "value received"
    );

    if matches!(format, OutputFormat::Raw) {
        print_raw(frame.payload.as_ref());
        return Ok(SUCCESS);
    }

    let type_code = frame.type_code;
    let value = Value::unmarshal_from_wire(frame.clone()).map_err(|reason| {
        session_error("receive failed", SessionError::Conversion { type_code, reason })
    })?;
    let doc = Document::from_value(&value).map_err(|err| document_error("receive failed", err))?;
    print_value(&doc, &frame, format)?;
    Ok(SUCCESS)
}

fn config_from_args(args: &RecvArgs) -> CliResult<SessionConfig> {
    Ok(SessionConfig {
        timeout: parse_duration(&args.timeout)?,
        max_payload_size: args.max_payload.unwrap_or(DEFAULT_MAX_PAYLOAD),
        payload_framing: if args.raw {
            PayloadFraming::Raw
        } else {
            PayloadFraming::Chunked
        },
        signal_ready: !args.no_ready,
        ..SessionConfig::default()
    })
}
