// SPDX-License-Identifier: Apache-2.0

use eucanetd::{EucanetdLogLevel, FlushMode};

use crate::cli::{
    new_cmd, parse_args, CliAction, CliOptions, EXTENDED_USAGE, USAGE,
};

fn run_opts(args: &[&str]) -> CliOptions {
    let mut argv = vec!["eucanetd"];
    argv.extend_from_slice(args);
    match parse_args(argv) {
        CliAction::Run(opts) => opts,
        CliAction::Usage(_) => panic!("unexpected usage for {args:?}"),
    }
}

#[test]
fn test_cli_definition() {
    new_cmd().debug_assert();
}

#[test]
fn test_no_args_runs_in_background() {
    assert_eq!(run_opts(&[]), CliOptions::default());
}

#[test]
fn test_debug_runs_in_foreground_at_trace() {
    let opts = run_opts(&["-d"]);
    assert_eq!(opts.debug, Some(EucanetdLogLevel::Trace));
    assert_eq!(opts.flush_mode, FlushMode::None);
    assert!(!opts.multi_instance_safe);
}

#[test]
fn test_flush_modes_log_at_info() {
    for (flag, mode) in [
        ("-F", FlushMode::All),
        ("-f", FlushMode::Dynamic),
        ("-C", FlushMode::MidoDynamic),
        ("-Z", FlushMode::MidoAll),
        ("-M", FlushMode::MidoDups),
        ("-U", FlushMode::MidoUnconnected),
    ] {
        let opts = run_opts(&[flag]);
        assert_eq!(opts.flush_mode, mode);
        assert_eq!(opts.debug, Some(EucanetdLogLevel::Info));
        assert!(!opts.multi_instance_safe, "{flag}");
        assert_eq!(opts.flush_mode_arg, None);
    }
}

#[test]
fn test_read_only_modes_skip_lock() {
    for (flag, mode) in [
        ("-l", FlushMode::MidoListVpc),
        ("-m", FlushMode::MidoCheckDups),
        ("-u", FlushMode::MidoCheckUnconnected),
    ] {
        let opts = run_opts(&[flag]);
        assert_eq!(opts.flush_mode, mode);
        assert!(opts.multi_instance_safe, "{flag}");
    }
    let opts = run_opts(&["-v", "vpc-12345678"]);
    assert_eq!(opts.flush_mode, FlushMode::MidoCheckVpc);
    assert_eq!(opts.flush_mode_arg.as_deref(), Some("vpc-12345678"));
    assert!(opts.multi_instance_safe);
}

#[test]
fn test_modes_with_object_id() {
    let opts = run_opts(&["-V", "sg-00000001"]);
    assert_eq!(opts.flush_mode, FlushMode::MidoVpc);
    assert_eq!(opts.flush_mode_arg.as_deref(), Some("sg-00000001"));
    assert!(!opts.multi_instance_safe);

    let opts = run_opts(&["-z", "i-00000001"]);
    assert_eq!(opts.flush_mode, FlushMode::MidoTest);
    assert_eq!(opts.flush_mode_arg.as_deref(), Some("i-00000001"));
}

#[test]
fn test_last_flag_wins() {
    let opts = run_opts(&["-d", "-F"]);
    assert_eq!(opts.flush_mode, FlushMode::All);
    assert_eq!(opts.debug, Some(EucanetdLogLevel::Info));

    let opts = run_opts(&["-F", "-d"]);
    assert_eq!(opts.flush_mode, FlushMode::All);
    assert_eq!(opts.debug, Some(EucanetdLogLevel::Trace));

    let opts = run_opts(&["-l", "-M"]);
    assert_eq!(opts.flush_mode, FlushMode::MidoDups);
    assert!(!opts.multi_instance_safe);
}

#[test]
fn test_help_and_errors_print_usage() {
    assert_eq!(parse_args(["eucanetd", "-h"]), CliAction::Usage(USAGE));
    assert_eq!(
        parse_args(["eucanetd", "-H"]),
        CliAction::Usage(EXTENDED_USAGE)
    );
    assert_eq!(parse_args(["eucanetd", "-x"]), CliAction::Usage(USAGE));
    assert_eq!(parse_args(["eucanetd", "-v"]), CliAction::Usage(USAGE));
}
