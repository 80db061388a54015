use std::error::Error;
use std::path::{Path, PathBuf};

use burn::backend::NdArray;
use burn::data::dataloader::DataLoaderBuilder;
use clap::{Parser, ValueEnum};
use tracing::{info, warn};

use habitat_data::batcher::{DemoBatcher, PairedBatcher};
use habitat_data::config::HabitatDataConfig;
use habitat_data::data_list::DataList;
use habitat_data::demo_dataset::DemoDataset;
use habitat_data::frames::export_frames;
use habitat_data::paired_dataset::{PairedDataset, COMPANION_MARKER, RECORD_SUFFIX};

type Backend = NdArray;

const BATCH_SIZE: usize = 4;

/// Decodes a directory of recordings and reports the first batch's shapes.
#[derive(Debug, Parser)]
#[command(name = "habitat_data")]
struct Args {
    /// Which kind of records the directory holds
    #[arg(value_enum)]
    mode: Mode,

    /// Directory scanned for records
    data_dir: PathBuf,

    /// JSON config file; defaults are used when omitted
    config: Option<PathBuf>,

    /// Export the first demonstration's frames as PNGs into this directory
    #[arg(long)]
    dump: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    Demo,
    Paired,
}

fn main() -> Result<(), Box<dyn Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => HabitatDataConfig::from_file(path)?,
        None => HabitatDataConfig::new(),
    };
    info!("Using config {config}");

    match args.mode {
        Mode::Demo => inspect_demo(&args, &config),
        Mode::Paired => inspect_paired(&args, &config),
    }
}

fn inspect_demo(args: &Args, config: &HabitatDataConfig) -> Result<(), Box<dyn Error>> {
    let data_list = DataList::scan(&args.data_dir, "")?;
    let dataset = DemoDataset::new(config, data_list);

    if let Some(dir) = &args.dump {
        let item = dataset.try_get(0)?;
        export_frames(&item.images_orig, dir, &item.scene)?;
    }

    let device = Default::default();
    let dataloader = DataLoaderBuilder::new(DemoBatcher::<Backend>::new(device))
        .batch_size(BATCH_SIZE)
        .build(dataset);

    match dataloader.iter().next() {
        Some(batch) => info!(
            "First batch: images {:?}, actions {:?}, scenes {:?}, lengths {:?}",
            batch.images.dims(),
            batch.actions.dims(),
            batch.scenes,
            batch.lengths
        ),
        None => warn!("No demonstrations found under {}", args.data_dir.display()),
    }
    Ok(())
}

fn inspect_paired(args: &Args, config: &HabitatDataConfig) -> Result<(), Box<dyn Error>> {
    if args.dump.is_some() {
        warn!("--dump is only supported in demo mode");
    }

    let data_list = follower_list(&args.data_dir)?;
    let dataset = PairedDataset::new(config, data_list);

    let device = Default::default();
    let dataloader = DataLoaderBuilder::new(PairedBatcher::<Backend>::new(device))
        .batch_size(BATCH_SIZE)
        .build(dataset);

    match dataloader.iter().next() {
        Some(batch) => info!(
            "First batch: demo images {:?}, demo actions {:?}, follower images {:?}, follower labels {:?}, follower lengths {:?}",
            batch.demo_images.dims(),
            batch.demo_actions.dims(),
            batch.follower_images.dims(),
            batch.follower_labels.dims(),
            batch.follower_lengths
        ),
        None => warn!("No follower records found under {}", args.data_dir.display()),
    }
    Ok(())
}

/// Follower records under `dir`. Companion demonstrations share the suffix
/// but are not samples themselves.
fn follower_list(dir: &Path) -> habitat_data::Result<DataList> {
    Ok(DataList::scan(dir, RECORD_SUFFIX)?
        .retain(|path| !path.to_string_lossy().contains(COMPANION_MARKER)))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn parses_demo_mode() {
        let args = Args::try_parse_from(["habitat_data", "demo", "data/demos"]).unwrap();
        assert_eq!(args.mode, Mode::Demo);
        assert_eq!(args.data_dir, PathBuf::from("data/demos"));
        assert!(args.config.is_none());
        assert!(args.dump.is_none());
    }

    #[test]
    fn parses_paired_mode_with_config_and_dump() {
        let args = Args::try_parse_from([
            "habitat_data",
            "paired",
            "data/train",
            "config.json",
            "--dump",
            "frames",
        ])
        .unwrap();
        assert_eq!(args.mode, Mode::Paired);
        assert_eq!(args.config, Some(PathBuf::from("config.json")));
        assert_eq!(args.dump, Some(PathBuf::from("frames")));
    }

    #[test]
    fn dump_needs_a_directory() {
        let err = Args::try_parse_from(["habitat_data", "demo", "data", "--dump"]).unwrap_err();
        assert!(err.to_string().contains("--dump"));
    }

    #[test]
    fn rejects_unknown_mode() {
        let err = Args::try_parse_from(["habitat_data", "follower", "data"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }

    #[test]
    fn follower_list_skips_companions() {
        let root = tempfile::tempdir().unwrap();
        for name in ["apt_1.dat.gz", "apt_2.dat.gz", "apt_DEMON_0.dat.gz", "notes.txt"] {
            fs::write(root.path().join(name), b"{}").unwrap();
        }

        let list = follower_list(root.path()).unwrap();
        let names: Vec<_> = list
            .paths()
            .iter()
            .map(|path| path.file_name().unwrap().to_str().unwrap().to_owned())
            .collect();
        assert_eq!(names, vec!["apt_1.dat.gz", "apt_2.dat.gz"]);
    }
}
