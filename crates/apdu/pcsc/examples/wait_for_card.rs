//! Wait for a card to be inserted into, then removed from, a reader
//!
//! Press Ctrl-D (end of input) to stop waiting.

use std::{io::Read, path::PathBuf, thread};

use clap::Parser;
use nexum_apdu_transport_pcsc::{POLLING_LATENCY, PluginConfig, prelude::*};

#[derive(Debug, Parser)]
struct Args {
    /// Reader name, defaults to the first reader found
    #[arg(short, long)]
    reader: Option<String>,

    /// Plugin configuration file (TOML)
    #[arg(short, long, default_value = "pcsc.toml")]
    config: PathBuf,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = PluginConfig::load(&args.config)?;
    let plugin = PcscPluginBuilder::from_config(&config).build()?;

    let name = match args.reader {
        Some(name) => name,
        None => match plugin.search_available_reader_names()?.into_iter().next() {
            Some(name) => name,
            None => {
                println!("No readers found!");
                return Ok(());
            }
        },
    };

    let Some(mut reader) = plugin.search_reader(&name)? else {
        println!("Reader {name} not found");
        return Ok(());
    };

    let insertion = reader.insertion_canceller();
    let removal = reader.removal_canceller();
    thread::spawn(move || {
        let _ = std::io::stdin().read_to_end(&mut Vec::new());
        // A cancel only reaches a wait that has already started
        loop {
            if insertion.is_waiting() || removal.is_waiting() {
                insertion.cancel();
                removal.cancel();
                break;
            }
            thread::sleep(POLLING_LATENCY / 10);
        }
    });

    println!("Waiting for a card on {name}...");
    match reader.wait_for_card_insertion() {
        Ok(()) => {}
        Err(e) if e.is_cancelled() => {
            println!("Stopped");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    }

    reader.open()?;
    println!("Card inserted, ATR: {}", reader.power_on_data());
    reader.close()?;

    println!("Waiting for the card to be removed...");
    match reader.wait_for_card_removal() {
        Ok(()) => println!("Card removed"),
        Err(e) if e.is_cancelled() => println!("Stopped"),
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
