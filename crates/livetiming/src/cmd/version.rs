use livetiming::frame::CATALOG_VERSION;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("livetiming {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: livetiming");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("target: {}", option_env!("LIVETIMING_BUILD_TARGET").unwrap_or("unknown"));
    println!("profile: {}", option_env!("LIVETIMING_BUILD_PROFILE").unwrap_or("unknown"));
    println!("catalog: v{CATALOG_VERSION}");
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));

    Ok(SUCCESS)
}
