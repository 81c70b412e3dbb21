use std::process::ExitCode;

use sparkfield::{App, DemoConfig, DemoError};
use winit::event_loop::{ControlFlow, EventLoop};

fn run() -> Result<(), DemoError> {
    let config = DemoConfig::load(std::env::args())?;
    log::info!(
        "Starting {} ({}x{}, {} particles)",
        config.window.title,
        config.window.width,
        config.window.height,
        config.particles.capacity
    );

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;
    app.into_result()
}

fn main() -> ExitCode {
    let env = env_logger::Env::default().default_filter_or("sparkfield=info,wgpu=warn");
    env_logger::Builder::from_env(env).init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
