use glam::Vec3;
use log::{debug, error, info, warn};
use winit::{
  dpi::LogicalSize,
  event::{Event, StartCause, WindowEvent},
  event_loop::{ControlFlow, EventLoop},
  window::{Window, WindowBuilder},
};

use crate::app_input::AppInput;
use crate::app_timer::AppTimer;
use crate::config::Config;
use crate::frame_pipeline::FramePipeline;
use crate::scene::{Scene, SceneCameras, TEST_SPHERE_COLLIDER};
use crate::vk_ctx::{get_window_size, vk_ctx_initialize, VkCtx};

mod app_input;
mod app_timer;
mod config;
mod frame_pipeline;
mod scene;
mod utils;
mod vk_ctx;
mod vk_utils;

/// Log frame time every _this many_ frames
const FRAME_TIME_LOG_INTERVAL: u64 = 600;

/// Everything the run loop owns. Dropped in `destroy`.
struct App {
  config: Config,
  vk_ctx: VkCtx,
  scene: Scene,
  cameras: SceneCameras,
  pipeline: FramePipeline,
  input: AppInput,
  timer: AppTimer,
}

impl App {
  fn new(window: &Window, config: Config) -> anyhow::Result<Self> {
    let vk_ctx = vk_ctx_initialize(window, &config)?;
    info!("Vulkan init went OK!");

    let scene = Scene::new(&vk_ctx, &config)?;
    let cameras = SceneCameras::new(&vk_ctx, &config.camera, &config.shadows.shadow_source)?;
    let pipeline = FramePipeline::new(&vk_ctx, &config, &scene, &cameras)?;

    Ok(Self {
      config,
      vk_ctx,
      scene,
      cameras,
      pipeline,
      input: AppInput::new(),
      timer: AppTimer::new(),
    })
  }

  fn frame(&mut self, window: &Window) -> anyhow::Result<()> {
    let delta_time = self.timer.mark_start_frame();
    self.apply_input(delta_time)?;
    self.scene.update_time(delta_time)?;

    let outcome = self.pipeline.frame(&self.vk_ctx, &self.scene)?;
    if outcome.needs_recreation() {
      self.recreate_surface_resources(window)?;
    }

    if self.timer.frame_idx() % FRAME_TIME_LOG_INTERVAL == 0 {
      debug!(
        "Frame {}: {:.2}ms",
        self.timer.frame_idx(),
        self.timer.delta_time_ms()
      );
    }
    Ok(())
  }

  fn apply_input(&mut self, delta_time: f32) -> anyhow::Result<()> {
    let orbit = self.input.orbit_delta();
    if !orbit.is_zero() {
      self
        .cameras
        .viewer
        .update_orbit(orbit.rotate_x, orbit.rotate_y, orbit.zoom)?;
    }

    let move_dir = self.input.collider_move_direction();
    if move_dir != Vec3::ZERO {
      // speed is tuned for 60fps
      let speed = self.config.simulation.collider_move_speed * delta_time * 60.0;
      self
        .scene
        .translate_collider(TEST_SPHERE_COLLIDER, move_dir * speed)?;
    }

    self.input.reset_transient_state();
    Ok(())
  }

  fn recreate_surface_resources(&mut self, window: &Window) -> anyhow::Result<()> {
    let window_size = get_window_size(window);
    if window_size.width == 0 || window_size.height == 0 {
      self.pipeline.notify_surface_size(window_size);
      return Ok(());
    }

    self.vk_ctx.recreate_swapchain(window_size)?;
    self
      .cameras
      .viewer
      .on_resize(&self.config.camera, self.vk_ctx.swapchain.size)?;
    self
      .pipeline
      .recreate_frame_resources(&self.vk_ctx, &self.scene)
  }

  unsafe fn destroy(&mut self) {
    if let Err(err) = self.vk_ctx.vk_device().device_wait_idle() {
      warn!("device_wait_idle before destroy failed: {}", err);
    }
    self.pipeline.destroy(&self.vk_ctx);
    self.cameras.destroy(&self.vk_ctx.allocator);
    self.scene.destroy(&self.vk_ctx.allocator);
    self.vk_ctx.destroy();
  }
}

fn main() {
  if let Err(err) = simple_logger::SimpleLogger::new().init() {
    eprintln!("Could not initialize logger: {}", err);
    std::process::exit(1);
  }
  log::set_max_level(log::LevelFilter::Debug);
  info!("-- Start --");

  let config = Config::new();

  // init window
  let event_loop = EventLoop::new();
  let window = match WindowBuilder::new()
    .with_title("Rust Vulkan hair simulation")
    .with_resizable(true)
    .with_inner_size(LogicalSize::new(config.window_width, config.window_height))
    .build(&event_loop)
  {
    Ok(window) => window,
    Err(err) => {
      error!("Could not create window: {}", err);
      std::process::exit(1);
    }
  };

  let mut app = match App::new(&window, config) {
    Ok(app) => app,
    Err(err) => {
      error!("Init failed: {:?}", err);
      std::process::exit(1);
    }
  };

  info!("Starting event loop");
  event_loop.run(move |event, _, control_flow| {
    app.input.handle_event(&event);

    match event {
      Event::NewEvents(StartCause::Init) => {
        *control_flow = ControlFlow::Poll;
      }

      Event::WindowEvent {
        event: WindowEvent::Resized(size),
        ..
      } => {
        info!("Window resized to {}x{}", size.width, size.height);
        if let Err(err) = app.recreate_surface_resources(&window) {
          error!("Resize failed: {:?}", err);
          *control_flow = ControlFlow::ExitWithCode(1);
        }
      }

      Event::MainEventsCleared => {
        if app.input.close_requested {
          *control_flow = ControlFlow::Exit;
        } else if let Err(err) = app.frame(&window) {
          error!("Frame failed: {:?}", err);
          *control_flow = ControlFlow::ExitWithCode(1);
        }
      }

      // before destroy
      Event::LoopDestroyed => {
        info!("EventLoop is shutting down");
        unsafe { app.destroy() };
      }

      _ => (),
    }
  });
}
