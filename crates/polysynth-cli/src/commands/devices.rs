//! Audio device listing command.

use clap::Args;
use polysynth_io::list_output_devices;

#[derive(Args)]
pub struct DevicesArgs {
    /// Only print the default output device
    #[arg(long)]
    default: bool,
}

pub fn run(args: DevicesArgs) -> anyhow::Result<()> {
    let devices = list_output_devices()?;

    if args.default {
        match devices.iter().find(|d| d.is_default) {
            Some(device) => println!(
                "{} ({} Hz, {} ch)",
                device.name, device.default_sample_rate, device.channels
            ),
            None => println!("No default output device."),
        }
        return Ok(());
    }

    if devices.is_empty() {
        println!("No audio output devices found.");
        return Ok(());
    }

    println!("Output Devices");
    println!("==============\n");
    for (idx, device) in devices.iter().enumerate() {
        let marker = if device.is_default { " (default)" } else { "" };
        println!(
            "  [{}] {} ({} Hz, {} ch){}",
            idx, device.name, device.default_sample_rate, device.channels, marker
        );
    }
    println!();
    println!("Tip: pass a partial name to play:");
    println!("  polysynth play --device \"USB\" C4 E4 G4");

    Ok(())
}
