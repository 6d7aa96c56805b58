// SPDX-License-Identifier: Apache-2.0

use std::ffi::OsString;

use clap::parser::ValueSource;
use eucanetd::{EucanetdLogLevel, FlushMode};

pub(crate) const USAGE: &str = "USAGE: eucanetd OPTIONS
\t-d          | debug - run eucanetd in foreground, all output to terminal
\t-F          | flush - clear all eucanetd artifacts and exit
\t-f          | flush dynamic - clear only dynamic eucanetd artifacts and exit
\t\toptions '-f' and '-F' do not work in VPCMIDO mode
";

pub(crate) const EXTENDED_USAGE: &str = "EXPERIMENTAL OPTIONS (USE AT YOUR OWN RISK)
\t-l          | list VPCMIDO objects
\t-C          | flush all but core objects that implement VPC models
\t-Z          | flush all objects (including core) that implement VPC models
\t-m          | detect duplicate objects in MidoNet
\t-M          | detect and flush duplicate objects in MidoNet
\t-u          | detect unconnected objects in MidoNet
\t-U          | detect and flush unconnected objects in MidoNet
\t-v (id)     | check a VPC model (i-x | eni-x | vpc-x | subnet-x | nat-x | sg-x)
\t-V (id)     | flush a VPC model (i-x | eni-x | vpc-x | subnet-x | nat-x | sg-x)
\t\tlowercase options are read-only, and work with eucanetd service running
\t\tuppercase options can only be executed with eucanetd service stopped
";

/// `-d` only raises verbosity and maps to [FlushMode::None].
const MODE_FLAGS: [(&str, char, FlushMode); 13] = [
    ("flush-all", 'F', FlushMode::All),
    ("flush-dynamic", 'f', FlushMode::Dynamic),
    ("list-vpc", 'l', FlushMode::MidoListVpc),
    ("mido-dynamic", 'C', FlushMode::MidoDynamic),
    ("mido-all", 'Z', FlushMode::MidoAll),
    ("check-dups", 'm', FlushMode::MidoCheckDups),
    ("flush-dups", 'M', FlushMode::MidoDups),
    ("check-unconnected", 'u', FlushMode::MidoCheckUnconnected),
    ("flush-unconnected", 'U', FlushMode::MidoUnconnected),
    ("check-vpc", 'v', FlushMode::MidoCheckVpc),
    ("flush-vpc", 'V', FlushMode::MidoVpc),
    ("self-test", 'z', FlushMode::MidoTest),
    ("debug", 'd', FlushMode::None),
];

/// Options of one daemon invocation
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct CliOptions {
    /// `None` runs in background logging to file
    pub(crate) debug: Option<EucanetdLogLevel>,
    pub(crate) flush_mode: FlushMode,
    pub(crate) flush_mode_arg: Option<String>,
    pub(crate) multi_instance_safe: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CliAction {
    Run(CliOptions),
    /// Print the text and exit 1
    Usage(&'static str),
}

pub(crate) fn new_cmd() -> clap::Command {
    let mut cmd = clap::Command::new("eucanetd")
        .about("Eucalyptus network reconciliation daemon")
        .disable_help_flag(true)
        .disable_version_flag(true)
        .arg(
            clap::Arg::new("usage")
                .short('h')
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            clap::Arg::new("extended-usage")
                .short('H')
                .action(clap::ArgAction::SetTrue),
        );
    for (id, short, mode) in MODE_FLAGS {
        let arg = clap::Arg::new(id).short(short);
        cmd = cmd.arg(if mode.needs_argument() {
            arg.action(clap::ArgAction::Set).value_name("ID")
        } else {
            arg.action(clap::ArgAction::SetTrue)
        });
    }
    cmd
}

/// Later flags override earlier ones.
pub(crate) fn parse_args<I, T>(args: I) -> CliAction
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = match new_cmd().try_get_matches_from(args) {
        Ok(m) => m,
        Err(e) => {
            log::debug!("Invalid command line: {e}");
            return CliAction::Usage(USAGE);
        }
    };
    if matches.get_flag("usage") {
        return CliAction::Usage(USAGE);
    }
    if matches.get_flag("extended-usage") {
        return CliAction::Usage(EXTENDED_USAGE);
    }

    let mut present: Vec<(usize, &str, FlushMode)> = MODE_FLAGS
        .iter()
        .filter(|(id, _, _)| {
            matches.value_source(id) == Some(ValueSource::CommandLine)
        })
        .filter_map(|(id, _, mode)| {
            matches.index_of(id).map(|index| (index, *id, *mode))
        })
        .collect();
    present.sort_unstable_by_key(|(index, _, _)| *index);

    let mut opts = CliOptions::default();
    for (_, id, mode) in present {
        if mode.is_none() {
            opts.debug = Some(EucanetdLogLevel::Trace);
            continue;
        }
        opts.flush_mode = mode;
        opts.debug = Some(EucanetdLogLevel::Info);
        opts.multi_instance_safe = mode.is_read_only();
        opts.flush_mode_arg = if mode.needs_argument() {
            matches.get_one::<String>(id).cloned()
        } else {
            None
        };
    }
    CliAction::Run(opts)
}
