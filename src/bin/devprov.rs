use devprov::app::command_handlers;
use devprov::shared::logging::init_logging;
use devprov::steps::interrupt;

fn run() -> Result<(), String> {
    init_logging();
    if let Err(err) = interrupt::install() {
        tracing::warn!(error = %err, "failed to install signal handlers");
    }
    let args: Vec<String> = std::env::args().skip(1).collect();
    let output = command_handlers::run_cli(args)?;
    println!("{output}");
    Ok(())
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
