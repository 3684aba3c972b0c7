pub mod agent;
pub mod ask;
pub mod common;
pub mod config;
pub mod extract;

/// `--version` text with the build metadata recorded by `build.rs`.
pub const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\ncommit: ",
    env!("AXE_GIT_SHA"),
    "\nbuilt: ",
    env!("AXE_BUILD_TS"),
    "\ntarget: ",
    env!("AXE_BUILD_TARGET"),
    " (",
    env!("AXE_BUILD_PROFILE"),
    ")"
);
