use crate::back;
use crate::config::WindowConfig;
use crate::frame::FramePlan;
use crate::ledger::{Kind, Ledger};
use crate::renderer::Renderer;
use crate::scene::{Variant, CLEAR_COLOR};

use anyhow::{anyhow, Context, Result};
use back::glutin::{Api, ContextBuilder, GlProfile, GlRequest};
use gfx_hal::{prelude::*, Features};
use log::{error, info, trace, warn};
use std::process;
use winit::{
    dpi::{PhysicalSize, Size},
    event::{Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    platform::desktop::EventLoopExtDesktop,
    window::WindowBuilder,
};

pub const WINDOW_CREATION_FAILED: &str = "Failed to create window";

/// Entry point shared by the binaries: runs `variant` and exits non-zero on error.
pub fn main(variant: Variant) {
    env_logger::init();
    let result = run(variant, &WindowConfig::default());
    if let Err(err) = &result {
        error!("{:?}", err);
        eprintln!("{}", err);
    }
    process::exit(exit_code(&result));
}

/// Process exit status for the outcome of [`run`].
pub fn exit_code(result: &Result<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(_) => 1,
    }
}

pub fn run(variant: Variant, config: &WindowConfig) -> Result<()> {
    info!("starting {} variant", variant.name());
    let mut event_loop = EventLoop::new();
    let wb = WindowBuilder::new()
        .with_title(config.title)
        .with_inner_size(Size::Physical(PhysicalSize::new(config.width, config.height)))
        .with_resizable(false);

    let builder = back::config_context(ContextBuilder::new(), config.color_format, None)
        .with_gl(GlRequest::Specific(Api::OpenGl, config.gl_version))
        .with_gl_profile(GlProfile::Core)
        .with_vsync(config.vsync);
    let windowed_context = builder
        .build_windowed(wb, &event_loop)
        .map_err(|err| window_creation_failed(err.to_string()))?;

    let (context, window) = unsafe {
        windowed_context
            .make_current()
            .map_err(|(_, err)| anyhow!(err.to_string()).context("can't make context current"))?
            .split()
    };
    let mut surface = back::Surface::from_context(context);

    let adapter = surface
        .enumerate_adapters()
        .into_iter()
        .next()
        .context("no OpenGL adapter available")?;
    info!("using adapter {}", adapter.info.name);

    let family = adapter
        .queue_families
        .iter()
        .find(|family| {
            surface.supports_queue_family(family) && family.queue_type().supports_graphics()
        })
        .context("no graphics queue family")?;
    let mut gpu = unsafe {
        adapter
            .physical_device
            .open(&[(family, &[1.0])], Features::empty())
    }
    .map_err(|err| anyhow!("can't open device: {:?}", err))?;

    let mut queue_group = gpu.queue_groups.pop().context("no queue group")?;
    let device = gpu.device;
    let ledger = Ledger::new();

    {
        let mut renderer = Renderer::new(
            &mut surface,
            &adapter,
            &device,
            queue_group.family,
            config.extent(),
            variant,
            &ledger,
        )?;
        let queue = queue_group
            .queues
            .first_mut()
            .context("queue group has no queues")?;

        renderer.render(queue, &FramePlan::clear(CLEAR_COLOR));

        let plan = variant.frame_plan();
        info!(
            "{} draws, {} vertices per frame",
            plan.draws().len(),
            plan.vertex_count()
        );
        let mut fps_counter = fps_counter::FPSCounter::new();
        event_loop.run_return(|event, _, control_flow| {
            *control_flow = ControlFlow::Poll;
            match event {
                Event::WindowEvent {
                    event: WindowEvent::CloseRequested,
                    ..
                } => {
                    info!("close requested");
                    *control_flow = ControlFlow::Exit;
                }
                Event::MainEventsCleared => {
                    renderer.render(queue, &plan);
                    trace!("fps: {}", fps_counter.tick());
                }
                _ => {}
            }
        });
    }

    let framebuffers = ledger.tally(Kind::Framebuffer);
    info!("{} framebuffers used", framebuffers.created);
    if ledger.is_balanced() {
        info!("all graphics objects released");
    } else {
        warn!("graphics objects not released: {:?}", ledger.unbalanced());
    }

    drop(device);
    drop(surface);
    drop(window);
    Ok(())
}

fn window_creation_failed(cause: String) -> anyhow::Error {
    anyhow!(cause).context(WINDOW_CREATION_FAILED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_failure_reports_fixed_message() {
        let err = window_creation_failed("no display".to_owned());
        assert_eq!(err.to_string(), "Failed to create window");
    }

    #[test]
    fn window_failure_exits_non_zero() {
        let result = Err(window_creation_failed("no display".to_owned()));
        assert_ne!(exit_code(&result), 0);
        assert_eq!(exit_code(&result), 1);
    }

    #[test]
    fn clean_shutdown_exits_zero() {
        assert_eq!(exit_code(&Ok(())), 0);
    }

    #[test]
    fn window_failure_keeps_cause() {
        let err = window_creation_failed("no display".to_owned());
        let chain: Vec<String> = err.chain().map(|cause| cause.to_string()).collect();
        assert_eq!(chain, vec!["Failed to create window", "no display"]);
    }
}
