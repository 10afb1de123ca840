use ctsync_channel::{ERRORQ_MAX_LEN, MULTICHANNEL_MAX};
use ctsync_wire::PROTOCOL_VERSION;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("ctsync {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: ctsync");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("CTSYNC_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("protocol_version: {PROTOCOL_VERSION}");
    println!("max_channels: {MULTICHANNEL_MAX}");
    println!("error_queue_len: {ERRORQ_MAX_LEN}");

    Ok(SUCCESS)
}
