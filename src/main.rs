use clap::Parser;
use tinychain::{Cli, CliHandler};

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let handler = CliHandler::new(cli.db, cli.wallet_file);

    if let Err(e) = handler.handle(cli.command) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
