mod cli;
mod commands;
mod output;

use anyhow::Result;
use clap::Parser;
use me7rom_core::{RunConfig, RunMode};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use commands::hex_utils::parse_hex_address;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so --json output stays clean
    let directive = if cli.verbose {
        "me7rom=debug"
    } else {
        "me7rom=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive.parse()?))
        .with_writer(std::io::stderr)
        .init();

    let signatures = cli.signatures.as_deref();
    match cli.command {
        Commands::Read { rom, name, skey } => {
            let mut config = RunConfig::new(RunMode::Read, rom).with_seedkey_bypass(skey);
            if let Some(name) = name {
                config = config.with_table(name);
            }
            commands::run::run(config, signatures, cli.json)
        }
        Commands::Write { rom, table, skey } => {
            let config = RunConfig::new(RunMode::Write, rom)
                .with_table(table)
                .with_seedkey_bypass(skey);
            commands::run::run(config, signatures, cli.json)
        }
        Commands::Identify { rom, skey } => {
            let config = RunConfig::new(RunMode::Identify, rom).with_seedkey_bypass(skey);
            commands::run::run(config, signatures, cli.json)
        }
        Commands::Patch { rom } => {
            commands::run::run(RunConfig::new(RunMode::Patch, rom), signatures, cli.json)
        }
        Commands::Hexdump {
            rom,
            offset,
            size,
            ascii,
        } => commands::hexdump::run(&rom, parse_hex_address(&offset)?, size, ascii),
        Commands::Signatures { output } => commands::signatures::run(output.as_deref()),
    }
}
