use clap::{Args, Parser, Subcommand};
use photo_slots::crop::{CommitResolution, CropKind, CropStage};
use photo_slots::grid::{self, GridView};
use photo_slots::imaging::{ImageBackend, OutputFormat, RustBackend, decodable_mime_types};
use photo_slots::manager::SlotManager;
use photo_slots::preview::PreviewTracker;
use photo_slots::types::{Candidate, collect_candidates};
use photo_slots::validation::{screen_duplicates, validate_batch};
use photo_slots::{config, output};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "photo-slots")]
#[command(about = "Profile photo slots: validate, crop and arrange")]
#[command(long_about = "\
Profile photo slots: validate, crop and arrange

A fixed number of ordered photo slots. Every new photo is validated (type,
size, minimum dimensions), cropped to the profile aspect ratio and placed in
the first free slot. The first slot holds the main photo.

Settings come from config.toml in --config-dir (every key optional):

  [slots]       max_images, required, enable_crop, enable_reorder,
                reject_duplicates
  [validation]  allowed_types, max_bytes, min_width, min_height
  [crop]        aspect_ratio, output_format, output_quality, min_zoom,
                max_zoom, max_output_edge
  [animation]   reorder_ms

Run 'photo-slots gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml
    #[arg(long, default_value = ".", global = true)]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate photos and report why any would be rejected
    Check {
        /// Files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Crop one photo the way the crop dialog would
    Crop(CropArgs),
    /// Fill the slots from files, apply edits, and render the grid page
    Grid(GridArgs),
    /// Print a stock config.toml with all options documented
    GenConfig,
}

#[derive(Args)]
struct CropArgs {
    input: PathBuf,

    /// Where to write the cropped image
    #[arg(long, short)]
    output: PathBuf,

    #[arg(long, default_value_t = 1.0)]
    zoom: f32,

    /// Clockwise, in degrees
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    rotation: f32,

    /// Horizontal offset, -1.0 (left) to 1.0 (right)
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pan_x: f32,

    /// Vertical offset, -1.0 (top) to 1.0 (bottom)
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pan_y: f32,

    /// Aspect ratio as W:H (default from config)
    #[arg(long, value_parser = parse_aspect)]
    aspect: Option<(u32, u32)>,

    /// jpeg, png, webp or avif (default from config)
    #[arg(long, value_parser = parse_format)]
    format: Option<OutputFormat>,
}

#[derive(Args)]
struct GridArgs {
    /// Files or directories, added in order
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Write the rendered grid page here
    #[arg(long)]
    html: PathBuf,

    /// Write a JSON list of the final slots here
    #[arg(long)]
    json: Option<PathBuf>,

    /// Page title
    #[arg(long, default_value = "Your photos")]
    title: String,

    /// Remove the photo at a 0-based position (repeatable, applied first)
    #[arg(long)]
    remove: Vec<usize>,

    /// Move FROM:TO, 0-based (repeatable, applied after removals)
    #[arg(long, value_parser = parse_move)]
    reorder: Vec<(usize, usize)>,

    /// Make the photo at this 0-based position the main photo (applied last)
    #[arg(long)]
    primary: Option<usize>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_default_env()
        .format_timestamp(Some(env_logger::fmt::TimestampPrecision::Seconds))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Check { paths } => {
            let config = config::load_config(&cli.config_dir)?;
            for mime in &config.validation.allowed_types {
                if !decodable_mime_types().contains(&mime.as_str()) {
                    log::warn!("{mime} is allowed but has no decoder; such files will be unreadable");
                }
            }
            let candidates = collect_candidates(&paths)?;
            let backend = RustBackend::new();
            let mut verdicts = validate_batch(&backend, &candidates, &config.validation);
            if config.slots.reject_duplicates {
                screen_duplicates(&candidates, &mut verdicts, &HashSet::new());
            }
            output::print_check_report(&candidates, &verdicts);
        }
        Command::Crop(args) => {
            let config = config::load_config(&cli.config_dir)?;
            let mut settings = config.crop.clone();
            if let Some(format) = args.format {
                settings.output_format = format;
            }
            let aspect = args.aspect.unwrap_or(settings.aspect());

            let candidate = Candidate::from_path(&args.input)?;
            let backend = RustBackend::new();
            let dims = backend.identify(&candidate.resource)?;

            let mut previews = PreviewTracker::new();
            let mut stage = CropStage::new(&settings);
            stage.open(&mut previews, CropKind::New, 0, candidate.resource, dims, aspect)?;
            stage.set_zoom(args.zoom);
            stage.set_rotation(args.rotation);
            stage.set_pan(args.pan_x, args.pan_y);
            stage.layout();

            let job = stage.begin_commit()?;
            let params = job.params().clone();
            let outcome = job.run(&backend);
            match stage.finish_commit(&mut previews, outcome) {
                CommitResolution::Apply { resource, .. } => {
                    std::fs::write(&args.output, resource.bytes())?;
                    output::print_crop_result(&args.input, &args.output, &params, resource.bytes().len());
                }
                CommitResolution::Failed(e) => return Err(e.into()),
                CommitResolution::Stale => return Err("crop session closed before commit".into()),
            }
        }
        Command::Grid(args) => {
            let config = config::load_config(&cli.config_dir)?;
            let crop_enabled = config.slots.enable_crop;
            let candidates = collect_candidates(&args.paths)?;

            let mut manager = SlotManager::new(config, RustBackend::new())
                .on_change(|images| log::debug!("slots changed: {} photo(s)", images.len()));

            let mut rejected = Vec::new();
            if crop_enabled {
                // One file per batch: each opens a session, committed centred.
                for candidate in candidates {
                    let outcome = manager.add_batch(vec![candidate]);
                    rejected.extend(outcome.rejected);
                    if outcome.crop_target.is_some() {
                        manager.crop_layout();
                        manager.commit_crop();
                    }
                }
            } else {
                rejected = manager.add_batch(candidates).rejected;
            }
            output::print_rejections(&rejected);

            for &position in &args.remove {
                manager.remove_at(position);
            }
            for &(from, to) in &args.reorder {
                manager.reorder(from, to);
            }
            if let Some(position) = args.primary {
                manager.set_primary(position);
            }

            output::print_slots(&manager.padded(), &manager.validation_state());

            let view = GridView::build(&manager, Instant::now());
            std::fs::write(&args.html, grid::render_page(&view, &args.title).into_string())?;
            if let Some(json_path) = &args.json {
                let json = serde_json::to_string_pretty(&output::slot_entries(&manager.images()))?;
                std::fs::write(json_path, json)?;
            }

            let stats = manager.teardown();
            log::debug!(
                "previews: {} acquired, {} released, {} live",
                stats.acquired,
                stats.released,
                stats.live
            );
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// `"3:4"` → `(3, 4)`. Both parts must be positive.
fn parse_aspect(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(':')
        .ok_or_else(|| format!("expected W:H, got '{s}'"))?;
    let w: u32 = w.trim().parse().map_err(|_| format!("bad width in '{s}'"))?;
    let h: u32 = h.trim().parse().map_err(|_| format!("bad height in '{s}'"))?;
    if w == 0 || h == 0 {
        return Err(format!("aspect parts must be positive, got '{s}'"));
    }
    Ok((w, h))
}

/// `"2:0"` → `(2, 0)`.
fn parse_move(s: &str) -> Result<(usize, usize), String> {
    let (from, to) = s
        .split_once(':')
        .ok_or_else(|| format!("expected FROM:TO, got '{s}'"))?;
    let from = from.trim().parse().map_err(|_| format!("bad FROM in '{s}'"))?;
    let to = to.trim().parse().map_err(|_| format!("bad TO in '{s}'"))?;
    Ok((from, to))
}

fn parse_format(s: &str) -> Result<OutputFormat, String> {
    match s.to_ascii_lowercase().as_str() {
        "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
        "png" => Ok(OutputFormat::Png),
        "webp" => Ok(OutputFormat::Webp),
        "avif" => Ok(OutputFormat::Avif),
        other => Err(format!("unknown format '{other}' (jpeg, png, webp, avif)")),
    }
}
