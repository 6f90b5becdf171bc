use clap::{Parser, Subcommand};
use std::net::SocketAddr;

#[derive(Parser, Debug)]
#[command(name = "boardbox")]
#[command(about = "Image board download and archive worker", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server, dispatcher and cleanup sweeper
    Server(ServerArgs),
    /// Run a single cleanup sweep and exit
    CleanOnce,
    /// Print version, platform and disk usage of the download directory
    Info,
}

#[derive(clap::Args, Debug)]
pub struct ServerArgs {
    /// Address to bind the HTTP server to (overrides server.bind_addr)
    #[arg(long)]
    pub address: Option<SocketAddr>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_server_with_address() {
        let cli = Cli::try_parse_from(["boardbox", "server", "--address", "127.0.0.1:9000"]).unwrap();
        match cli.command {
            Commands::Server(args) => {
                assert_eq!(args.address, Some("127.0.0.1:9000".parse().unwrap()));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_subcommands() {
        assert!(matches!(
            Cli::try_parse_from(["boardbox", "clean-once"]).unwrap().command,
            Commands::CleanOnce
        ));
        assert!(matches!(
            Cli::try_parse_from(["boardbox", "info"]).unwrap().command,
            Commands::Info
        ));
        assert!(Cli::try_parse_from(["boardbox"]).is_err());
    }
}
