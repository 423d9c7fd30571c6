//! Example showing how to enumerate connected card readers

use nexum_apdu_transport_pcsc::prelude::*;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let plugin = PcscPluginBuilder::new()
        .use_contact_reader_identification_filter(".*(Identiv|Gemalto|SCM|Alcor).*")
        .use_contactless_reader_identification_filter(".*(ACR122|PICC|Contactless|CL).*")
        .build()?;

    let mut readers = plugin.search_available_readers()?;
    println!("Found {} readers:", readers.len());

    for (i, reader) in readers.iter_mut().enumerate() {
        let mode = match reader.is_contactless() {
            Ok(true) => "contactless",
            Ok(false) => "contact",
            Err(_) => "unknown",
        };
        println!("{}. Reader: {} ({mode})", i + 1, reader.name());

        if !reader.check_card_presence()? {
            println!("   No card present");
            continue;
        }

        reader.set_sharing_mode(SharingMode::Shared)?;
        match reader.open() {
            Ok(()) => {
                println!("   Card present, ATR: {}", reader.power_on_data());
                let protocols: Vec<_> = plugin
                    .identification()
                    .rules()
                    .names()
                    .filter(|p| reader.is_current_protocol(p))
                    .collect();
                println!("   Matching protocols: {}", protocols.join(", "));
                reader.close()?;
            }
            Err(e) => println!("   Card present, could not connect: {e}"),
        }
    }

    Ok(())
}
