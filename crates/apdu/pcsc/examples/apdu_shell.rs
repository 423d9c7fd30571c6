//! Interactive APDU shell for sending commands to a smart card

use std::io::{self, BufRead, Write};

use nexum_apdu_transport_pcsc::{IOCTL_CCID_ESCAPE, prelude::*};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let plugin = PcscPluginBuilder::new().build()?;
    let mut readers = plugin.search_available_readers()?;

    if readers.is_empty() {
        println!("No readers found!");
        return Ok(());
    }

    // Display readers for selection
    println!("Available readers:");
    for (i, reader) in readers.iter_mut().enumerate() {
        let card_status = if reader.check_card_presence().unwrap_or(false) {
            "card present"
        } else {
            "no card"
        };
        println!("{}. {} ({})", i + 1, reader.name(), card_status);
    }

    print!("Select a reader (1-{}): ", readers.len());
    io::stdout().flush()?;

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let reader_index = match lines.next() {
        Some(Ok(input)) => match input.trim().parse::<usize>() {
            Ok(index) if index > 0 && index <= readers.len() => index - 1,
            _ => {
                println!("Invalid selection, using first reader");
                0
            }
        },
        _ => {
            println!("Invalid input, using first reader");
            0
        }
    };

    let mut reader = readers.swap_remove(reader_index);
    println!("Using reader: {}", reader.name());

    if !reader.check_card_presence()? {
        println!("No card present in the selected reader!");
        return Ok(());
    }
    reader.open()?;

    println!("\nAPDU Shell - Enter commands in hex format or 'help' for assistance");
    println!("Examples:");
    println!("  00A404000AA000000003000000");
    println!("  00 A4 04 00 0A A0 00 00 00 03 00 00 00");

    loop {
        print!("> ");
        io::stdout().flush()?;

        let line = match lines.next() {
            Some(Ok(input)) => input,
            _ => break,
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match input.to_lowercase().as_str() {
            "exit" | "quit" | "q" => break,

            "help" | "?" => {
                println!("Commands:");
                println!("  <hex>         - Send APDU command (e.g., '00A4040008A000000003000000')");
                println!("  escape <hex>  - Send a CCID escape command to the reader");
                println!("  reset         - Reset the card and reopen the channel");
                println!("  atr           - Display the card's ATR");
                println!("  help          - Show this help");
                println!("  exit          - Exit the shell");
            }

            "atr" => println!("ATR: {}", reader.power_on_data()),

            "reset" => {
                reader.set_disconnection_mode(DisconnectionMode::Reset);
                let result = reader.close().and_then(|()| reader.open());
                reader.set_disconnection_mode(DisconnectionMode::Leave);
                match result {
                    Ok(()) => println!("Card reset successfully, ATR: {}", reader.power_on_data()),
                    Err(e) => println!("Error resetting card: {e}"),
                }
            }

            cmd if cmd.starts_with("escape") => {
                match hex::decode(cmd.trim_start_matches("escape").replace(' ', "")) {
                    Ok(data) => match reader.transmit_control_command(IOCTL_CCID_ESCAPE, &data) {
                        Ok(response) => println!("Response: {}", hex::encode_upper(&response)),
                        Err(e) => println!("Command failed: {e}"),
                    },
                    Err(_) => println!("Invalid hex input"),
                }
            }

            // Treat as raw APDU
            _ => match hex::decode(input.replace(' ', "")) {
                Ok(command) if command.len() < 4 => println!("APDU command too short"),
                Ok(command) => match reader.transmit_apdu(&command) {
                    Ok(response) => match StatusWord::from_response(&response) {
                        Some(sw) => {
                            println!("Response:");
                            println!("  Status: {sw}");
                            let data = &response[..response.len() - 2];
                            if !data.is_empty() {
                                println!("  Data: {}", hex::encode_upper(data));
                            }
                        }
                        None => println!("Malformed response: {}", hex::encode_upper(&response)),
                    },
                    Err(e) if e.is_card_removed() => {
                        println!("Card removed: {e}");
                        break;
                    }
                    Err(e) => println!("Command failed: {e}"),
                },
                Err(_) => println!("Invalid hex input"),
            },
        }
    }

    reader.close()?;
    Ok(())
}
