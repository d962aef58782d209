use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    println!("fender {}", env!("CARGO_PKG_VERSION"));
    if args.extended {
        println!("target: {}-{}", std::env::consts::ARCH, std::env::consts::OS);
        println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
        println!(
            "transports: channel{}",
            if cfg!(unix) { ", unix-socket" } else { "" }
        );
    }
    Ok(SUCCESS)
}
