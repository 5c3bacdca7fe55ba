// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// relume-replay
// Renders a captured command stream, or the built-in demo scene, through the
// deferred pipeline on a headless device and writes the last frame to a PNG.

mod capture;
mod demo;
mod palette;
mod staging;

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::LevelFilter;
use relume_core::config::DEFAULT_CONFIG_FILE;
use relume_core::renderer::GraphicsDevice;
use relume_core::RendererConfig;
use relume_infra::WgpuDevice;
use relume_lanes::{DeferredRenderer, Viewport};
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use crate::capture::{read_capture, write_capture};
use crate::palette::Palette;
use crate::staging::ExecuteBufferStaging;

const PALETTE_SIZE: usize = 64;

#[derive(Parser, Debug)]
#[command(name = "relume-replay", version, about = "Headless replay of legacy execute buffers")]
struct Args {
    /// Renderer configuration file.
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    /// Capture to replay. The demo scene is rendered when omitted.
    #[arg(long)]
    capture: Option<PathBuf>,
    /// Number of demo frames.
    #[arg(long, default_value_t = 1)]
    frames: usize,
    /// Where the last frame is written.
    #[arg(short, long, default_value = "relume-frame.png")]
    output: PathBuf,
    /// Also write the replayed frames as a capture file.
    #[arg(long)]
    save_capture: Option<PathBuf>,
    /// Use the software adapter.
    #[arg(long)]
    fallback_adapter: bool,
}

fn init_logging(log_path: Option<&str>) -> Result<()> {
    use env_logger::{Builder, Env, Target};

    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    builder.filter_module("wgpu_hal", LevelFilter::Error);
    if let Some(path) = log_path {
        let file =
            File::create(path).with_context(|| format!("Failed to create log file '{path}'"))?;
        builder.target(Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let loaded = RendererConfig::load(&args.config);
    let config = loaded.as_ref().cloned().unwrap_or_default();
    init_logging(config.log_path.as_deref())?;
    if let Err(e) = &loaded {
        log::warn!("{e}, this session uses the default options");
    }

    let frames = match &args.capture {
        Some(path) => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("Failed to read capture '{}'", path.display()))?;
            read_capture(&bytes)?
        }
        None => demo::demo_frames(config.effective_internal_resolution(), args.frames),
    };
    if frames.is_empty() {
        bail!("nothing to replay");
    }
    if let Some(path) = &args.save_capture {
        let mut file = File::create(path)
            .with_context(|| format!("Failed to create capture '{}'", path.display()))?;
        write_capture(&frames, &mut file)?;
        log::info!("Wrote {} frames to {}", frames.len(), path.display());
    }

    let device = WgpuDevice::headless(args.fallback_adapter)?;
    let dyn_device: Arc<dyn GraphicsDevice> = Arc::new(device.clone());
    let mut renderer = DeferredRenderer::new(dyn_device, config.clone(), Palette::new(PALETTE_SIZE))?;

    let internal = config.effective_internal_resolution();
    let viewport = Viewport {
        width: internal.width,
        height: internal.height,
        ..Default::default()
    };

    let mut staging = ExecuteBufferStaging::new();
    let mut last = None;
    for (index, frame) in frames.iter().enumerate() {
        renderer.begin_submission();
        let report = staging.submit(&frame.commands, |commands| {
            renderer.execute(commands, &frame.vertices, &viewport)
        })?;
        for diagnostic in &report.diagnostics {
            log::warn!("Frame {index}: {diagnostic}");
        }
        let output = renderer.present()?;
        log::debug!("Frame {index}: {:?}", output.stats);
        last = Some(output);
    }
    let Some(output) = last else {
        bail!("no frame was presented");
    };

    let pixels = renderer.read_back(&output)?;
    image::RgbaImage::from_raw(output.extent.width, output.extent.height, pixels)
        .context("read back size does not match the frame extent")?
        .save(&args.output)
        .with_context(|| format!("Failed to write '{}'", args.output.display()))?;

    log::info!(
        "Replayed {} frames, last one has {} triangles in {} draw calls, written to {}",
        frames.len(),
        output.stats.triangles.iter().sum::<usize>(),
        output.stats.draw_calls,
        args.output.display()
    );
    log::debug!("Execute buffers allocated: {}", staging.allocated());
    log::info!(
        "Device memory: {} bytes live, {} bytes peak",
        device.vram_allocated_bytes(),
        device.vram_peak_bytes()
    );
    Ok(())
}
