//! Version command implementation

/// Build-time version info, overridable via environment at compile time
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn run_version() {
    let commit = option_env!("NETPROBE_COMMIT").unwrap_or("unknown");
    let build_date = option_env!("NETPROBE_BUILD_DATE").unwrap_or("unknown");

    println!("netprobe version {VERSION}");
    println!("  commit: {commit}");
    println!("  built:  {build_date}");
}
