use clap::Parser;

fn main() -> Result<(), app_core::AppError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let options = app_core::Options::parse();
    pollster::block_on(app_core::run(options))
}
