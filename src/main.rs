// src/main.rs

use shellwire::{ShellwireError, cli, logging, run};

fn main() {
    let code = match run_main() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("shellwire error: {err:?}");
            err.downcast_ref::<ShellwireError>()
                .and_then(ShellwireError::exit_code)
                .unwrap_or(1)
        }
    };
    std::process::exit(code);
}

fn run_main() -> anyhow::Result<i32> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    run(args)
}
