use crate::commands::Command;
use clap::Parser;

#[derive(Debug, Parser)]
#[clap(about = env!("CARGO_PKG_DESCRIPTION"))]
pub struct Options {
    #[command(flatten)]
    pub global: Global,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Parser)]
pub struct Global {
    /// Proxy to send store requests through. A plain address such as
    /// 127.0.0.1:1080 is treated as a SOCKS5 proxy that also resolves host
    /// names (socks5h://); include a scheme (http://, socks5://) to pick
    /// another kind.
    #[clap(long, global(true), env("STICKERDL_PROXY"))]
    pub proxy: Option<String>,

    /// Sets verbosity level. Can be specified multiple times to increase the verbosity
    /// of this program.
    #[clap(long = "verbose", short, global(true), action(clap::ArgAction::Count))]
    pub verbosity: u8,
}
