use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("arraypipe {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: arraypipe");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("ARRAYPIPE_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "channel: {}",
        if cfg!(unix) {
            "unix domain socket"
        } else {
            "named pipe"
        }
    );
    println!(
        "wire: header={}B chunk_header={}B ack='{}' session_ack='{}' session_nack='{}'",
        arraypipe::frame::HEADER_SIZE,
        arraypipe::frame::CHUNK_HEADER_SIZE,
        char::from(arraypipe::frame::CHUNK_ACK),
        char::from(arraypipe::frame::SESSION_ACK),
        char::from(arraypipe::frame::SESSION_NACK)
    );

    Ok(SUCCESS)
}
