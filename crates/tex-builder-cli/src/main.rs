use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use image::{DynamicImage, ImageReader};
use serde::Deserialize;
use tex_builder_core::scan::{asset_key, visible_subdirectories, walk_inputs};
use tex_builder_core::{
    ForcedSettings, InputImage, KeyedDigestAuthenticator, RebuildOracle, ScanOptions, Settings,
    TexBuilderError, pack_images,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Key used when `TEX_BUILDER_SIGNING_KEY` is not set.
const DEFAULT_SIGNING_KEY: &str = "tex-builder/manifest/v1";
const SIGNING_KEY_ENV: &str = "TEX_BUILDER_SIGNING_KEY";

#[derive(Parser, Debug)]
#[command(
    name = "tex-builder",
    about = "Build power-of-two texture atlases from image folders, skipping unchanged inputs",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Show progress bars (disable with --progress false or --quiet)
    #[arg(long, default_value_t = true, action=ArgAction::Set, global=true, help_heading = "Logging/UX")]
    progress: bool,
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action=ArgAction::Count, global=true, help_heading = "Logging/UX")]
    verbose: u8,
    /// Quiet mode (overrides verbose)
    #[arg(
        short,
        long,
        default_value_t = false,
        global = true,
        help_heading = "Logging/UX"
    )]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Rebuild atlases whose inputs changed since the last build
    Build(BuildArgs),
    /// Report which atlas groups need a rebuild without writing anything
    Check(BuildArgs),
}

#[derive(Parser, Debug, Clone)]
struct BuildArgs {
    // Input/Output
    /// Input files or directories
    #[arg(required = true, help_heading = "Input/Output")]
    inputs: Vec<PathBuf>,
    /// Atlas group name (pages are NAME_000.png.., manifest NAME.json)
    #[arg(short, long, default_value = "default", help_heading = "Input/Output")]
    output: String,
    /// Output directory
    #[arg(long, default_value = ".", help_heading = "Input/Output")]
    out_dir: PathBuf,
    /// Root directory stripped from sub-image names
    #[arg(long, help_heading = "Input/Output")]
    root_dir: Option<PathBuf>,
    /// Recursively search input directories
    #[arg(short, long, default_value_t = true, action=ArgAction::Set, help_heading = "Input/Output")]
    recursive: bool,
    /// Build one atlas group per subdirectory of each input directory
    #[arg(short = 'd', long, default_value_t = false, help_heading = "Input/Output")]
    directory_output: bool,
    /// Rebuild even when no modifications are detected
    #[arg(short, long, default_value_t = false, help_heading = "Input/Output")]
    force: bool,
    /// YAML settings file; every value in it counts as explicitly set
    #[arg(long, help_heading = "Input/Output")]
    config: Option<PathBuf>,

    // Layout
    /// Padding width between sub-images
    #[arg(long, help_heading = "Layout")]
    padding_width: Option<u32>,
    /// Padding height between sub-images
    #[arg(long, help_heading = "Layout")]
    padding_height: Option<u32>,
    /// Maximum width of output textures
    #[arg(long, help_heading = "Layout")]
    output_width: Option<u32>,
    /// Maximum height of output textures
    #[arg(long, help_heading = "Layout")]
    output_height: Option<u32>,
    /// Allow 90 degree rotation of sub-images
    #[arg(long, num_args = 0..=1, default_missing_value = "true", help_heading = "Layout")]
    allow_rotation: Option<bool>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing_with_level(cli.quiet, cli.verbose);
    match &cli.command {
        Commands::Build(args) => run_build(args, cli.progress && !cli.quiet, false),
        Commands::Check(args) => run_build(args, false, true),
    }
}

fn run_build(args: &BuildArgs, show_progress: bool, check_only: bool) -> anyhow::Result<()> {
    let (settings, forced) = resolve_settings(args)?;
    settings.validate()?;

    let scan = ScanOptions {
        recursive: args.recursive,
        root_dir: args.root_dir.clone(),
    };
    let key = std::env::var(SIGNING_KEY_ENV).unwrap_or_else(|_| DEFAULT_SIGNING_KEY.into());
    let auth = KeyedDigestAuthenticator::new(key);

    for (name, inputs) in atlas_groups(args)? {
        let manifest_path = args.out_dir.join(format!("{name}.json"));
        let oracle = RebuildOracle::load(&manifest_path, &auth);
        let needed = args.force || oracle.requires_build(&inputs, &scan);

        if check_only {
            println!(
                "{}: {}",
                name,
                if needed { "rebuild required" } else { "up to date" }
            );
            continue;
        }
        if !needed {
            info!(group = %name, "no modifications detected");
            continue;
        }
        info!(group = %name, "modifications detected, processing");

        let mut group_settings = settings;
        oracle.merge_settings(&mut group_settings, &forced);
        group_settings
            .validate()
            .with_context(|| format!("settings for {name}"))?;

        build_group(
            &name,
            &inputs,
            &group_settings,
            &scan,
            &args.out_dir,
            &manifest_path,
            &auth,
            show_progress,
        )?;
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn build_group(
    name: &str,
    inputs: &[PathBuf],
    settings: &Settings,
    scan: &ScanOptions,
    out_dir: &Path,
    manifest_path: &Path,
    auth: &KeyedDigestAuthenticator,
    show_progress: bool,
) -> anyhow::Result<()> {
    let paths: Vec<PathBuf> = walk_inputs(inputs, scan.recursive)
        .filter_map(|entry| match entry {
            Ok(p) => Some(p),
            Err(e) => {
                warn!(error = %e, "skip unreadable input");
                None
            }
        })
        .collect();
    let images = load_images_with_progress(&paths, show_progress)?;
    info!(count = images.len(), group = name, "loaded input images");

    let out = match pack_images(images, settings, scan, name) {
        Ok(out) => out,
        Err(TexBuilderError::Empty) => {
            warn!(group = name, "no images to pack");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    fs::create_dir_all(out_dir)
        .with_context(|| format!("create out_dir {}", out_dir.display()))?;
    for p in &out.pages {
        let png_path = out_dir.join(&p.page.filename);
        p.rgba
            .save(&png_path)
            .with_context(|| format!("write {}", png_path.display()))?;
        info!(?png_path, sub_images = p.page.sub_images.len(), "wrote page");
    }

    let mut manifest = out.manifest();
    manifest
        .write_signed(manifest_path, auth)
        .with_context(|| format!("write {}", manifest_path.display()))?;
    info!(?manifest_path, "manifest written");

    info!(group = name, "{}", out.stats().summary());
    Ok(())
}

/// Atlas groups to build: either all inputs under the chosen name, or one group per visible
/// subdirectory of each input directory, named after the subdirectory.
fn atlas_groups(args: &BuildArgs) -> anyhow::Result<Vec<(String, Vec<PathBuf>)>> {
    if !args.directory_output {
        return Ok(vec![(args.output.clone(), args.inputs.clone())]);
    }
    let mut groups = Vec::new();
    for dir in args.inputs.iter().filter(|p| p.is_dir()) {
        let subdirs = visible_subdirectories(dir)
            .with_context(|| format!("list subdirectories of {}", dir.display()))?;
        for sub in subdirs {
            let name = sub
                .file_name()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            groups.push((name, vec![sub]));
        }
    }
    Ok(groups)
}

fn resolve_settings(args: &BuildArgs) -> anyhow::Result<(Settings, ForcedSettings)> {
    let mut settings = Settings::default();
    let mut forced = ForcedSettings::default();

    if let Some(path) = &args.config {
        let file = fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let y: YamlConfig = serde_yaml::from_str(&file)?;
        y.apply(&mut settings, &mut forced);
    }

    let cli_values = YamlConfig {
        padding_width: args.padding_width,
        padding_height: args.padding_height,
        output_width: args.output_width,
        output_height: args.output_height,
        allow_rotation: args.allow_rotation,
    };
    cli_values.apply(&mut settings, &mut forced);
    Ok((settings, forced))
}

fn load_images_with_progress(
    paths: &[PathBuf],
    progress: bool,
) -> anyhow::Result<Vec<InputImage>> {
    use indicatif::{ProgressBar, ProgressStyle};
    let bar = if progress {
        let b = ProgressBar::new(paths.len() as u64);
        b.set_style(ProgressStyle::with_template(
            "{spinner:.green} loading {pos}/{len} [{elapsed_precise}] {wide_msg}",
        )?);
        Some(b)
    } else {
        None
    };
    let mut list = Vec::with_capacity(paths.len());
    for p in paths {
        let msg = p.file_name().and_then(|s| s.to_str()).unwrap_or("");
        if let Some(b) = &bar {
            b.set_message(msg.to_string());
        }
        match load_image(p) {
            Ok(img) => {
                list.push(InputImage {
                    key: asset_key(p),
                    image: img,
                });
            }
            Err(e) => {
                error!(?p, error = %e, "skip image");
            }
        }
        if let Some(b) = &bar {
            b.inc(1);
        }
    }
    if let Some(b) = &bar {
        b.finish_and_clear();
    }
    Ok(list)
}

fn load_image(p: &Path) -> anyhow::Result<DynamicImage> {
    let img = ImageReader::open(p)?.with_guessed_format()?.decode()?;
    Ok(img)
}

/// `RUST_LOG` wins when set; otherwise the level follows `-q`/`-v`.
fn init_tracing_with_level(quiet: bool, verbose: u8) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "info",
        (false, 1) => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[derive(Debug, Deserialize, Default)]
struct YamlConfig {
    padding_width: Option<u32>,
    padding_height: Option<u32>,
    output_width: Option<u32>,
    output_height: Option<u32>,
    allow_rotation: Option<bool>,
}

impl YamlConfig {
    /// Copy every present value into `settings` and mark its field as forced.
    fn apply(self, settings: &mut Settings, forced: &mut ForcedSettings) {
        if let Some(v) = self.padding_width {
            settings.padding_width = v;
            forced.padding = true;
        }
        if let Some(v) = self.padding_height {
            settings.padding_height = v;
            forced.padding = true;
        }
        if let Some(v) = self.output_width {
            settings.output_width = v;
            forced.max_size = true;
        }
        if let Some(v) = self.output_height {
            settings.output_height = v;
            forced.max_size = true;
        }
        if let Some(v) = self.allow_rotation {
            settings.allow_rotation = v;
            forced.allow_rotation = true;
        }
    }
}
