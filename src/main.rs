use sphere_tracer::{
    application::{AppState, Application, Layer, Screen},
    camera::{Camera, CameraController},
    config::RenderConfig,
    error::RenderError,
    gpu::{procedural_skybox, GpuKernel},
    renderer::{FrameInput, Renderer},
};
use winit::{
    dpi::PhysicalSize,
    event::{ElementState, Event, KeyboardInput, VirtualKeyCode, WindowEvent},
};

const SKYBOX_WIDTH: u32 = 1024;
const SKYBOX_HEIGHT: u32 = 512;

struct SphereTracer {
    camera: Camera,
    camera_controller: CameraController,
    kernel: GpuKernel,
    renderer: Renderer,
}

/// `sphere-tracer [seed] [skybox.png]`
fn load_config() -> Result<(RenderConfig, image::RgbaImage), RenderError> {
    let mut args = std::env::args().skip(1);
    let mut config = RenderConfig::default();

    if let Some(seed) = args.next() {
        config.scene.seed = seed
            .parse()
            .map_err(|_| RenderError::Setup(format!("invalid seed `{seed}`")))?;
    }

    let skybox = match args.next() {
        Some(path) => {
            tracing::info!("loading skybox from {path}");
            image::open(path)?.to_rgba8()
        }
        None => procedural_skybox(SKYBOX_WIDTH, SKYBOX_HEIGHT),
    };

    Ok((config, skybox))
}

impl Layer for SphereTracer {
    type LayerErr = RenderError;

    fn start(screen: &mut Screen, _app: &AppState) -> Result<Self, Self::LayerErr> {
        let (config, skybox) = load_config()?;

        tracing::info!("starting; seed={} spheres<={}", config.scene.seed, config.scene.max_count);

        let mut kernel = GpuKernel::new(screen);
        let skybox = kernel.create_texture(screen, &skybox);
        let renderer = Renderer::new(config, Some(skybox))?;

        let mut camera = Camera::default();
        let (width, height) = screen.size();
        camera.set_aspect(width, height);

        Ok(Self {
            camera,
            camera_controller: CameraController::new(2.0),
            kernel,
            renderer,
        })
    }

    fn process_event(&mut self, event: &Event<()>, _screen: &mut Screen) {
        if let Event::WindowEvent { event, .. } = event {
            self.camera_controller
                .process_events(&mut self.camera, event);

            if let WindowEvent::KeyboardInput {
                input:
                    KeyboardInput {
                        state: ElementState::Released,
                        virtual_keycode: Some(keycode),
                        ..
                    },
                ..
            } = event
            {
                match keycode {
                    VirtualKeyCode::R => {
                        tracing::info!("regenerating scene");
                        self.renderer.request_regenerate();
                    }
                    VirtualKeyCode::T => {
                        let animate = !self.renderer.config().animate;
                        tracing::info!("animation {}", if animate { "on" } else { "off" });
                        self.renderer.set_animate(animate);
                    }
                    _ => {}
                }
            }
        }
    }

    fn resize(&mut self, new_size: PhysicalSize<u32>, _app: &AppState, _screen: &mut Screen) {
        self.camera.set_aspect(new_size.width, new_size.height);
    }

    fn update(&mut self, app: &AppState, _screen: &mut Screen) {
        tracing::trace!("frame time {:.2}ms", app.delta_time() * 1000.0);
    }

    fn render(&mut self, app: &AppState, screen: &mut Screen) -> Result<(), RenderError> {
        let input = FrameInput {
            camera: self.camera.snapshot(),
            viewport: screen.size(),
            time: app.elapsed_time(),
        };

        let report = self
            .renderer
            .on_frame(&mut self.kernel.backend(screen), &input)?;

        if report.invalidated {
            tracing::debug!(
                "accumulation restarted; reallocated={} groups={:?}",
                report.reallocated,
                report.groups
            );
        } else if report.sample % 256 == 0 {
            tracing::debug!("accumulated {} samples", report.sample);
        }

        Ok(())
    }

    fn shutdown(&mut self, _app: &AppState, screen: &mut Screen) -> Result<(), Self::LayerErr> {
        self.renderer.on_deactivate(&mut self.kernel.backend(screen));
        tracing::info!("exiting");
        Ok(())
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if let Err(err) = pollster::block_on(Application::<SphereTracer>::init()) {
        tracing::error!("{err}");
        std::process::exit(1);
    }
}
