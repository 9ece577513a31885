// src/main.rs
use clap::{Parser, Subcommand};
use colored::Colorize;
use rayon::prelude::*;
use serde::Deserialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;

use ripple_lfp::config::{load_config, DirectorySettings, Inserted, PipelineConfig};
use ripple_lfp::error::{Result, RippleError};
use ripple_lfp::processing::consensus::{ripple_window, DEFAULT_SMOOTHING_SIGMA};
use ripple_lfp::processing::filters::{filtfilt_runs, BandPassFilter, BandPassFilterConfig};
use ripple_lfp::processing::intervals::Interval;
use ripple_lfp::processing::pipeline::{compute_ripple_times, consensus_trace_for, PipelineOptions};
use ripple_lfp::processing::table::TimeTable;
use ripple_lfp::selection::{set_lfp_electrodes, SelectionKey, DEFAULT_GROUP_NAME};
use ripple_lfp::store::files::{read_time_table, write_time_table};
use ripple_lfp::store::manifest::{LfpBandEntry, PositionEntry};
use ripple_lfp::store::{fetch_ripple_times, insert_default_parameters, IntervalList, ManifestStore};
use ripple_lfp::visualization::{
    export_frame_summary, multiunit_firing_rate, multiunit_spikes,
    prepare_single_environment_movie, DecodedPosterior, PositionTrack, SpatialGrid,
};

const MANIFEST_FILE: &str = "ripple_manifest.yaml";

#[derive(Parser, Debug)]
#[command(name = "ripple-lfp", about = "Sharp-wave ripple detection on band-passed LFP")]
struct Cli {
    /// Pipeline config (YAML). Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Base data directory; overrides the config and SPYGLASS_BASE_DIR.
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    /// Store manifest; defaults to `<base>/ripple_manifest.yaml`.
    #[arg(long, global = true)]
    manifest: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Debug, Clone)]
struct KeyArgs {
    #[arg(long)]
    lfp_band_id: String,
    #[arg(long, default_value = DEFAULT_GROUP_NAME)]
    group_name: String,
    #[arg(long, default_value = "default")]
    ripple_param_name: String,
    #[arg(long)]
    pos_merge_id: String,
}

impl From<KeyArgs> for SelectionKey {
    fn from(args: KeyArgs) -> Self {
        SelectionKey {
            lfp_band_id: args.lfp_band_id,
            group_name: args.group_name,
            ripple_param_name: args.ripple_param_name,
            pos_merge_id: args.pos_merge_id,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Insert the `default` ripple parameter set
    InsertDefaultParams,

    /// Band-pass raw LFP (time + one column per electrode id) into the ripple band
    Filter {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        lfp_band_id: String,
        #[arg(long)]
        nwb_file_name: String,
        #[arg(long)]
        interval_list_name: String,
        #[arg(long)]
        sampling_rate: f64,
        #[arg(long, default_value_t = 150.0)]
        f_low: f64,
        #[arg(long, default_value_t = 250.0)]
        f_high: f64,
        /// Output CSV; defaults to `<analysis>/<lfp_band_id>.csv`
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Register valid times (CSV with `start,end` columns)
    RegisterIntervals {
        #[arg(long)]
        nwb_file_name: String,
        #[arg(long)]
        interval_list_name: String,
        #[arg(long)]
        input: PathBuf,
    },

    /// Register position covariates (CSV: time + e.g. head_speed)
    RegisterPosition {
        #[arg(long)]
        pos_merge_id: String,
        #[arg(long)]
        input: PathBuf,
    },

    /// Choose the electrodes of a group (all band electrodes when omitted)
    SetElectrodes {
        #[arg(long)]
        lfp_band_id: String,
        #[arg(long, value_delimiter = ',')]
        electrodes: Option<Vec<u32>>,
        #[arg(long, default_value = DEFAULT_GROUP_NAME)]
        group_name: String,
    },

    /// Detect ripples for a selection and store them
    Detect {
        #[command(flatten)]
        key: KeyArgs,
    },

    /// Print the stored ripple times of a selection
    Show {
        #[command(flatten)]
        key: KeyArgs,
    },

    /// Write the consensus trace of a selection, whole or around one ripple
    Consensus {
        #[command(flatten)]
        key: KeyArgs,
        #[arg(long)]
        output: PathBuf,
        /// Restrict to this ripple number
        #[arg(long)]
        ripple: Option<usize>,
        /// Seconds kept on each side of the ripple
        #[arg(long, default_value_t = 0.1)]
        offset: f64,
        /// Times relative to the ripple start
        #[arg(long)]
        relative: bool,
    },

    /// Decoded-position movie: play it, or export a per-frame summary
    Movie {
        /// Posterior CSV: time + one column per grid bin
        #[arg(long)]
        posterior: PathBuf,
        /// Grid YAML: x_centers, y_centers, is_track_interior
        #[arg(long)]
        grid: PathBuf,
        /// Position CSV on the posterior time base
        #[arg(long)]
        position: PathBuf,
        /// Multiunit marks CSV on the posterior time base
        #[arg(long)]
        marks: PathBuf,
        #[arg(long, default_value = "x")]
        x_column: String,
        #[arg(long, default_value = "y")]
        y_column: String,
        #[arg(long, default_value = "head_direction")]
        direction_column: String,
        #[arg(long, default_value_t = 0)]
        start: usize,
        #[arg(long)]
        stop: Option<usize>,
        /// Write a frame summary CSV instead of opening the player
        #[arg(long)]
        export: Option<PathBuf>,
    },
}

#[derive(Debug, Deserialize)]
struct GridFile {
    x_centers: Vec<f64>,
    y_centers: Vec<f64>,
    is_track_interior: Vec<bool>,
}

struct Context {
    config: PipelineConfig,
    settings: DirectorySettings,
    manifest: PathBuf,
}

impl Context {
    fn load(cli: &Cli) -> Result<Self> {
        let config: PipelineConfig = match &cli.config {
            Some(path) => load_config(path)?,
            None => PipelineConfig::default(),
        };
        let settings = DirectorySettings::resolve(cli.base_dir.as_deref(), &config.settings)?;
        let manifest = cli
            .manifest
            .clone()
            .unwrap_or_else(|| settings.base_dir.join(MANIFEST_FILE));
        Ok(Self {
            config,
            settings,
            manifest,
        })
    }

    fn store(&self) -> Result<ManifestStore> {
        ManifestStore::open(&self.manifest, self.settings.analysis_dir())
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let ctx = Context::load(&cli)?;

    match cli.command {
        Commands::InsertDefaultParams => {
            let mut store = ctx.store()?;
            match insert_default_parameters(&mut store)? {
                Inserted::New => println!("{}", "inserted default parameters".green()),
                Inserted::Skipped => println!("{}", "default parameters already present".yellow()),
            }
        }

        Commands::Filter {
            input,
            lfp_band_id,
            nwb_file_name,
            interval_list_name,
            sampling_rate,
            f_low,
            f_high,
            output,
        } => {
            let raw = read_time_table(&input)?;
            let electrode_ids = parse_electrode_ids(&input, raw.columns())?;
            let config = BandPassFilterConfig {
                id: format!("Ripple {}-{} Hz", f_low, f_high),
                f_low,
                f_high,
                ..BandPassFilterConfig::ripple()
            };

            let filtered = raw
                .values()
                .par_iter()
                .map(|channel| -> Result<Vec<f64>> {
                    let mut filter = BandPassFilter::new(config.clone(), sampling_rate)?;
                    Ok(filtfilt_runs(&mut filter, channel))
                })
                .collect::<Result<Vec<_>>>()?;
            let band = TimeTable::new(raw.index().to_vec(), raw.columns().to_vec(), filtered)?;

            let output =
                output.unwrap_or_else(|| ctx.settings.analysis_dir().join(format!("{}.csv", lfp_band_id)));
            write_time_table(&output, &band, "time")?;
            info!(path = %output.display(), n_channels = band.n_columns(), "wrote filtered LFP");
            let output = output.canonicalize().map_err(|e| RippleError::io(&output, e))?;

            let mut store = ctx.store()?;
            store.register_lfp_band(LfpBandEntry {
                lfp_band_id,
                nwb_file_name,
                filter_name: config.id,
                target_interval_list_name: interval_list_name,
                electrode_ids,
                sampling_rate,
                path: output,
            })?;
        }

        Commands::RegisterIntervals {
            nwb_file_name,
            interval_list_name,
            input,
        } => {
            let valid_times = read_intervals(&input)?;
            let mut store = ctx.store()?;
            store.register_interval_list(IntervalList {
                nwb_file_name,
                interval_list_name,
                valid_times,
            })?;
        }

        Commands::RegisterPosition {
            pos_merge_id,
            input,
        } => {
            // Manifest paths are relative to the manifest, not the working directory
            let path = input.canonicalize().map_err(|e| RippleError::io(&input, e))?;
            let mut store = ctx.store()?;
            store.register_position(PositionEntry { pos_merge_id, path })?;
        }

        Commands::SetElectrodes {
            lfp_band_id,
            electrodes,
            group_name,
        } => {
            let mut store = ctx.store()?;
            let group =
                set_lfp_electrodes(&mut store, &lfp_band_id, electrodes.as_deref(), &group_name)?;
            println!(
                "{} {} / {}: {:?}",
                "electrodes set".green(),
                group.lfp_band_id,
                group.group_name,
                group.electrode_ids
            );
        }

        Commands::Detect { key } => {
            let key = SelectionKey::from(key);
            let mut store = ctx.store()?;
            let options =
                PipelineOptions::from_config(&ctx.config, Some(ctx.settings.logs_dir()));
            let run = compute_ripple_times(&mut store, &key, &options)?;
            println!(
                "{} {} ripples ({}) -> {}",
                "detected".green().bold(),
                run.events.len(),
                run.algorithm,
                run.object_id
            );
        }

        Commands::Show { key } => {
            let key = SelectionKey::from(key);
            let store = ctx.store()?;
            let times = fetch_ripple_times(&store, &key)?;
            println!("{} ({})", key.to_string().bold(), times.object_id);
            println!("{:>6} {:>12} {:>12} {:>10}", "ripple", "start", "end", "duration");
            for event in &times.events {
                println!(
                    "{:>6} {:>12.4} {:>12.4} {:>10.4}",
                    event.ripple_number,
                    event.start_time,
                    event.end_time,
                    event.end_time - event.start_time
                );
            }
        }

        Commands::Consensus {
            key,
            output,
            ripple,
            offset,
            relative,
        } => {
            let key = SelectionKey::from(key);
            let store = ctx.store()?;
            let options = PipelineOptions::from_config(&ctx.config, None);
            let trace = consensus_trace_for(&store, &key, &options.assembler)?;

            let trace = match ripple {
                Some(number) => {
                    let times = fetch_ripple_times(&store, &key)?;
                    let event = times
                        .events
                        .iter()
                        .find(|event| event.ripple_number == number)
                        .ok_or_else(|| {
                            RippleError::EmptyInput(format!("no ripple {} for {}", number, key))
                        })?;
                    ripple_window(&trace, event, offset, relative)?
                }
                None => trace,
            };
            write_time_table(&output, &trace, "time")?;
            info!(
                path = %output.display(),
                sigma = DEFAULT_SMOOTHING_SIGMA,
                "wrote consensus trace"
            );
        }

        Commands::Movie {
            posterior,
            grid,
            position,
            marks,
            x_column,
            y_column,
            direction_column,
            start,
            stop,
            export,
        } => {
            let movie_config = &ctx.config.movie;
            let grid_file: GridFile = load_config(&grid)?;
            let grid = SpatialGrid::new(
                grid_file.x_centers,
                grid_file.y_centers,
                grid_file.is_track_interior,
            )?;

            let posterior = read_posterior(&posterior)?;
            let position = PositionTrack::from_table(
                &read_time_table(&position)?,
                &x_column,
                &y_column,
                &direction_column,
            )?;
            let spikes = multiunit_spikes(&read_time_table(&marks)?);
            let firing_rate = multiunit_firing_rate(
                &[spikes],
                movie_config.sampling_frequency,
                movie_config.firing_rate_sigma,
            )?;

            let stop = stop.unwrap_or(posterior.time.len());
            let movie = prepare_single_environment_movie(
                start..stop,
                &posterior,
                &grid,
                &position,
                &firing_rate,
                movie_config,
            )?;
            info!(n_frames = movie.frames.len(), fps = movie.fps, "prepared movie");

            match export {
                Some(path) => export_frame_summary(&path, &movie)?,
                None => play(movie, grid, &ctx)?,
            }
        }
    }

    Ok(())
}

#[cfg(feature = "visualization")]
fn play(
    movie: ripple_lfp::visualization::Movie<ripple_lfp::visualization::MovieFrame>,
    grid: SpatialGrid,
    ctx: &Context,
) -> Result<()> {
    use ripple_lfp::visualization::window::MoviePlayer;

    MoviePlayer::run(movie, grid, ctx.config.movie.clone())
        .map_err(|e| RippleError::InvalidParameters(format!("movie player failed: {}", e)))
}

#[cfg(not(feature = "visualization"))]
fn play(
    movie: ripple_lfp::visualization::Movie<ripple_lfp::visualization::MovieFrame>,
    _grid: SpatialGrid,
    ctx: &Context,
) -> Result<()> {
    // No player in this build; fall back to the frame summary
    let path = ctx.settings.video_dir().join("movie_frames.csv");
    export_frame_summary(&path, &movie)?;
    println!(
        "{} built without the player; frame summary written to {}",
        "note:".yellow(),
        path.display()
    );
    Ok(())
}

fn parse_electrode_ids(path: &Path, columns: &[String]) -> Result<Vec<u32>> {
    columns
        .iter()
        .map(|name| {
            name.trim().parse::<u32>().map_err(|_| RippleError::InvalidData {
                path: path.to_path_buf(),
                message: format!("column '{}' is not an electrode id", name),
            })
        })
        .collect()
}

fn read_intervals(path: &Path) -> Result<Vec<Interval>> {
    let file = File::open(path).map_err(|e| RippleError::io(path, e))?;
    let mut rdr = csv::Reader::from_reader(file);
    let intervals = rdr
        .deserialize::<Interval>()
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(intervals)
}

/// Posterior CSV with one column per bin, already summed over states.
fn read_posterior(path: &Path) -> Result<DecodedPosterior> {
    let table = read_time_table(path)?;
    let values = (0..table.n_rows())
        .map(|row| vec![table.row(row)])
        .collect();
    Ok(DecodedPosterior {
        time: table.index().to_vec(),
        states: vec!["posterior".to_string()],
        values,
    })
}
