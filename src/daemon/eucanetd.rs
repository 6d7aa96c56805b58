// SPDX-License-Identifier: Apache-2.0

mod cli;
mod daemonize;

#[cfg(test)]
mod unit_tests;

use std::process::ExitCode;
use std::sync::Arc;

use eucanetd::{
    init_logger, run_preflight, ControlLoop, EucanetdConfig, EucanetdContext,
    EucanetdError, EucanetdLogLevel, NisporProbe, PreflightOutcome,
    SignalFlags, SingletonLock,
};
use eucanetd_drivers::select_driver;

use self::cli::{parse_args, CliAction, CliOptions};
use self::daemonize::daemonize;

fn main() -> ExitCode {
    let opts = match parse_args(std::env::args_os()) {
        CliAction::Run(opts) => opts,
        CliAction::Usage(text) => {
            print!("{text}");
            return ExitCode::from(1);
        }
    };
    match run(opts) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("eucanetd exiting: {e}");
            eprintln!("eucanetd: {e}");
            ExitCode::from(1)
        }
    }
}

fn run(opts: CliOptions) -> Result<(), EucanetdError> {
    let mut config = EucanetdConfig::bootstrap()?;
    config.debug = opts.debug;
    config.flush_mode = opts.flush_mode;
    config.flush_mode_arg = opts.flush_mode_arg;
    config.multi_instance_safe = opts.multi_instance_safe;

    // Held until exit
    let _lock = if config.multi_instance_safe {
        None
    } else {
        Some(SingletonLock::acquire()?)
    };

    daemonize(&config, config.debug.is_none())?;

    let log_file = config.debug.is_none().then(|| config.paths.log_file());
    let log = init_logger(
        log_file.as_deref(),
        config.debug.unwrap_or(EucanetdLogLevel::Info),
        &config.online.log,
    )?;
    log::info!("eucanetd started");

    let signals = SignalFlags::install()?;
    let mut ctx = EucanetdContext::new(config, signals, Arc::new(NisporProbe));
    ctx.set_log_controller(log);

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    rt.block_on(async move {
        match run_preflight(&mut ctx, select_driver).await? {
            PreflightOutcome::Ready(dispatch) => {
                ControlLoop::new(ctx, dispatch).run().await;
            }
            PreflightOutcome::Terminated => {
                log::info!("eucanetd terminated during pre-flight checks");
            }
        }
        log::info!("eucanetd stopped");
        Ok::<(), EucanetdError>(())
    })
}
