//! v4l2-camera command-line front end.

use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use v4l2_camera::config::Config;
use v4l2_camera::validation::{validate_frame_sequence, validate_payload};
use v4l2_camera::{device, Camera, Control, ControlValue, Frame};

#[derive(Parser, Debug)]
#[command(name = "v4l2-camera", version, about = "Inspect and capture from V4L2 cameras")]
struct Cli {
    /// YAML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Device node, overrides the configuration
    #[arg(long, global = true)]
    device: Option<PathBuf>,

    /// Print the first payload bytes of each captured frame
    #[arg(long, global = true)]
    show_data: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List video device nodes
    List,
    /// Show device identity and state
    Info,
    /// List pixel formats with their frame sizes and rates
    Formats,
    /// List controls with their current values
    Controls,
    /// Capture frames
    Capture {
        /// Number of frames to capture
        #[arg(long, default_value_t = 10)]
        count: usize,
        /// Pixel format, as a 4-character code or alias such as MJPEG
        #[arg(long)]
        format: Option<String>,
        /// Image width
        #[arg(long)]
        width: Option<u32>,
        /// Image height
        #[arg(long)]
        height: Option<u32>,
        /// Frames per second
        #[arg(long)]
        fps: Option<f64>,
        /// Validate payload sizes and sequence numbers
        #[arg(long)]
        check: bool,
    },
}

fn setup_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path).context("loading configuration")?,
        None => Config::default(),
    };
    if let Some(device) = &cli.device {
        config.device.clone_from(device);
    }
    config.show_data |= cli.show_data;
    Ok(config)
}

fn open(config: &Config) -> Result<Camera> {
    Camera::open(&config.device).with_context(|| format!("opening {}", config.device.display()))
}

fn list() {
    for node in device::enumerate() {
        println!(
            "{}\t{}",
            node.path.display(),
            node.name.as_deref().unwrap_or("<unnamed>")
        );
    }
}

fn show_info(config: &Config) -> Result<()> {
    let camera = open(config)?;
    println!("Device: {}", camera.path().display());
    println!("Card:   {}", camera.name()?);
    println!("Driver: {}", camera.driver()?);
    println!("Bus:    {}", camera.bus()?);
    println!("Busy:   {}", camera.is_busy()?);
    Ok(())
}

fn show_formats(config: &Config) -> Result<()> {
    let camera = open(config)?;
    for desc in camera.supported_formats()? {
        println!("{} ({})", desc.fourcc, desc.description);
        for cap in camera.frame_capabilities(desc.fcc())? {
            let rates: Vec<String> = cap.rates().iter().map(ToString::to_string).collect();
            println!("  {}x{} @ {} fps", cap.width, cap.height, rates.join(", "));
        }
    }
    Ok(())
}

fn show_controls(config: &Config) -> Result<()> {
    let mut camera = open(config)?;
    let controls = camera.controls()?.to_vec();
    for ctrl in controls {
        let value = camera.get_control(ctrl.id())?;
        let current = match value {
            ControlValue::Integer(v) => v.to_string(),
            ControlValue::Boolean(v) => v.to_string(),
            ControlValue::Menu(v) => v.to_string(),
        };
        let detail = match &ctrl {
            Control::Integer(c) => format!(
                "int [{}, {}] step {} default {}",
                c.min, c.max, c.step, c.default
            ),
            Control::Boolean(c) => format!("bool default {}", c.default),
            Control::Menu(c) => {
                let items: Vec<String> = c
                    .items
                    .iter()
                    .map(|item| format!("{}={}", item.index, item.name))
                    .collect();
                format!("menu {{{}}} default {}", items.join(", "), c.default)
            }
        };
        println!("{:#010x} {:<32} {current:>8}  {detail}", ctrl.id(), ctrl.name());
    }
    Ok(())
}

fn hex_prefix(frame: &Frame) -> String {
    frame.data.iter().take(16).fold(String::new(), |mut out, byte| {
        let _ = write!(out, "{byte:02x} ");
        out
    })
}

fn capture(
    config: &Config,
    count: usize,
    format: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    fps: Option<f64>,
    check: bool,
) -> Result<()> {
    let mut camera = open(config)?;
    if let Some(format) = format {
        camera.set_format(format).context("setting format")?;
    }
    if let Some(width) = width {
        camera.set_image_width(width).context("setting width")?;
    }
    if let Some(height) = height {
        camera.set_image_height(height).context("setting height")?;
    }
    if let Some(fps) = fps {
        camera.set_framerate(fps).context("setting frame rate")?;
    }

    let settings = camera.settings()?.clone();
    info!(?settings, count, "capturing");

    let frames = camera
        .start_with(|cam| {
            (0..count)
                .map(|_| cam.capture())
                .collect::<v4l2_camera::Result<Vec<_>>>()
        })
        .context("capturing frames")?;

    for frame in &frames {
        let meta = &frame.metadata;
        print!(
            "frame {:>6}  buffer {}  {:>8} bytes  t={:?}",
            meta.sequence,
            meta.buffer,
            frame.data.len(),
            meta.timestamp
        );
        if config.show_data {
            print!("  {}", hex_prefix(frame).trim_end());
        }
        println!();

        if check {
            validate_payload(frame, &settings)
                .with_context(|| format!("frame {}", meta.sequence))?;
        }
    }

    if check && !frames.is_empty() {
        validate_frame_sequence(&frames).context("frame sequence")?;
        println!("{} frames validated", frames.len());
    }
    Ok(())
}

fn main() -> Result<()> {
    setup_tracing();
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Commands::List => {
            list();
            Ok(())
        }
        Commands::Info => show_info(&config),
        Commands::Formats => show_formats(&config),
        Commands::Controls => show_controls(&config),
        Commands::Capture {
            count,
            format,
            width,
            height,
            fps,
            check,
        } => capture(&config, count, format, width, height, fps, check),
    }
}
