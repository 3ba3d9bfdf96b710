//! Sample Store host tool
//!
//! Prepares and inspects SRAM image files on a host machine

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use sample_store::{
    ImageDevice, SampleHandle, SampleStore, SampleStoreBuilder, SampleTransfer, SampleType,
    StoreConfig,
};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "sample-store")]
#[command(about = "Manage samples stored in a synthesizer SRAM image")]
struct Args {
    /// Path to the SRAM image file
    #[arg(short = 'i', long, global = true)]
    image: Option<PathBuf>,

    /// TOML configuration (base address, capacity, image path)
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the image if needed and clear the sample area
    Format,

    /// Store a file's bytes in a sample slot, replacing what was there
    Import {
        slot: u8,
        file: PathBuf,

        /// Tag the sample as delta-compressed
        #[arg(long)]
        dpcm: bool,
    },

    /// Write a sample slot's bytes to a file
    Export { slot: u8, file: PathBuf },

    /// Free a sample slot
    Delete { slot: u8 },

    /// Show occupied slots
    List {
        #[arg(long)]
        json: bool,
    },

    /// Show block usage
    Stats {
        #[arg(long)]
        json: bool,
    },
}

fn open(builder: SampleStoreBuilder, image: &Path) -> anyhow::Result<SampleStore<ImageDevice>> {
    builder
        .open_image(image)
        .with_context(|| format!("opening image {:?}", image))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => {
            StoreConfig::load(path).with_context(|| format!("loading config {:?}", path))?
        }
        None => StoreConfig::default(),
    };

    let image = match args.image.clone().or_else(|| config.image.clone()) {
        Some(image) => image,
        None => bail!("no image given (use --image or set `image` in the config)"),
    };
    let builder = SampleStoreBuilder::new().config(config);

    match args.command {
        Command::Format => {
            let store = if image.exists() {
                let mut store = open(builder, &image)?;
                store.clear_all()?;
                store
            } else {
                builder.create_image(&image)?
            };
            store.device().flush()?;
            info!(
                "Formatted {:?}: {} free blocks",
                store.device().path(),
                store.free_blocks()?
            );
        }

        Command::Import { slot, file, dpcm } => {
            let data = std::fs::read(&file).with_context(|| format!("reading {:?}", file))?;
            let size = u32::try_from(data.len()).context("sample too large")?;
            let sample_type = if dpcm {
                SampleType::Dpcm
            } else {
                SampleType::Raw
            };

            let mut store = open(builder, &image)?;
            let mut transfer = SampleTransfer::begin(&mut store, slot, sample_type, size)?;
            transfer.push_all(&data)?;
            transfer.finish()?;
            store.device().flush()?;

            info!("Imported {:?} into slot {} ({} bytes)", file, slot, size);
        }

        Command::Export { slot, file } => {
            let store = open(builder, &image)?;
            let mut handle = SampleHandle::new();
            store.load(&mut handle, slot)?;

            let mut data = Vec::with_capacity(handle.size() as usize);
            while !handle.is_done() {
                data.push(store.read_byte(&mut handle)?);
            }
            std::fs::write(&file, &data).with_context(|| format!("writing {:?}", file))?;

            info!("Exported slot {} to {:?} ({} bytes)", slot, file, data.len());
        }

        Command::Delete { slot } => {
            let mut store = open(builder, &image)?;
            store.delete(slot)?;
            store.device().flush()?;
        }

        Command::List { json } => {
            let store = open(builder, &image)?;
            let entries = store.list()?;

            if json {
                let rows: Vec<_> = entries
                    .iter()
                    .map(|(slot, entry)| {
                        serde_json::json!({
                            "slot": slot,
                            "type": entry.sample_type,
                            "size": entry.size,
                            "first_block": entry.first_block,
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                for (slot, entry) in entries {
                    let blocks = store.chain(slot)?.len();
                    println!(
                        "{:>3}  {:<4}  {:>8} bytes  {:>4} blocks  first={}",
                        slot,
                        format!("{:?}", entry.sample_type).to_lowercase(),
                        entry.size,
                        blocks,
                        entry.first_block
                    );
                }
            }
        }

        Command::Stats { json } => {
            let store = open(builder, &image)?;
            let stats = store.stats()?;

            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("capacity:    {} bytes", stats.capacity);
                println!("data blocks: {}", stats.data_blocks);
                println!("used blocks: {}", stats.used_blocks);
                println!("free blocks: {}", stats.free_blocks);
                println!("samples:     {}", stats.samples);
            }
        }
    }

    Ok(())
}
