//! Main application entry point (native).

use clap::Parser;
use inkcalc_app::{App, AppError, Cli, Script};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    env_logger::init();
    log::info!("Starting InkCalc");

    let cli = Cli::parse();
    let mut app = App::new(cli.app_config()?)?;
    app.start().await;

    if let Some(path) = &cli.script {
        let script = Script::from_file(path)?;
        app.run_script(&script).await;
    }
    if cli.calculate && !app.calculate().await {
        log::warn!("Recognition failed, see the log for details");
    }
    app.finish();

    if let Some(path) = &cli.output {
        app.write_png(path)?;
    }
    print!("{}", app.summary());
    Ok(())
}
