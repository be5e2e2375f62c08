//! Command dispatch functions
//!
//! Breaks up the main match statement into focused dispatch functions.

use std::io::Write;

use anyhow::Result;
use ovs_inspect::Oracle;

use crate::cli::*;
use crate::commands;
use crate::config::Config;
use crate::target::{self, Session};

/// Run the parsed command line
pub fn dispatch(cli: Cli) -> Result<()> {
    let args = &cli.target;

    match cli.command {
        Commands::Configure {
            layout,
            process,
            show,
        } => commands::configure::handle(layout, process, show),

        Commands::Info => with_session(args, commands::raw::info),

        Commands::Read { address, size } => with_session(args, |session, out| {
            commands::raw::read(&session.oracle, out, &address, size)
        }),

        Commands::Container(cmd) => {
            with_session(args, |session, out| dispatch_container(&session.oracle, out, cmd))
        }

        Commands::Daemon(cmd) => {
            with_session(args, |session, out| dispatch_daemon(&session.oracle, out, cmd))
        }
    }
}

/// Open the target and run `command` against it with stdout as output
fn with_session<F>(args: &TargetArgs, command: F) -> Result<()>
where
    F: FnOnce(&Session, &mut dyn Write) -> Result<()>,
{
    let config = Config::load()?;
    let session = target::open(args, &config)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    command(&session, &mut out)?;
    out.flush()?;
    Ok(())
}

/// Dispatch generic container walks
pub fn dispatch_container(
    oracle: &dyn Oracle,
    out: &mut dyn Write,
    command: ContainerCommand,
) -> Result<()> {
    match command {
        ContainerCommand::Hmap {
            address,
            type_name,
            member,
            dump,
        } => commands::containers::hmap(oracle, out, &address, &type_name, &member, dump),

        ContainerCommand::Cmap {
            address,
            type_name,
            member,
            dump,
        } => commands::containers::cmap(
            oracle,
            out,
            &address,
            type_name.as_deref(),
            member.as_deref(),
            dump,
        ),

        ContainerCommand::List {
            address,
            type_name,
            member,
            dump,
        } => commands::containers::list(
            oracle,
            out,
            &address,
            type_name.as_deref(),
            member.as_deref(),
            dump,
        ),

        ContainerCommand::Simap { address } => commands::containers::simap(oracle, out, &address),

        ContainerCommand::Smap { address } => commands::containers::smap(oracle, out, &address),

        ContainerCommand::Nla {
            address,
            len,
            dump,
            enum_name,
        } => commands::containers::nla(oracle, out, &address, len, dump, enum_name.as_deref()),

        ContainerCommand::Ofpacts { address, len } => {
            commands::containers::ofpacts(oracle, out, &address, len)
        }
    }
}

/// Dispatch ovs-vswitchd state commands
pub fn dispatch_daemon(
    oracle: &dyn Oracle,
    out: &mut dyn Write,
    command: DaemonCommand,
) -> Result<()> {
    match command {
        DaemonCommand::Bridge { ports, wanted } => {
            commands::bridge::bridges(oracle, out, ports, wanted)
        }
        DaemonCommand::BridgePorts { bridge } => {
            commands::bridge::bridge_ports(oracle, out, &bridge)
        }

        DaemonCommand::DpNetdev { ports } => commands::dpif::dp_netdevs(oracle, out, ports),
        DaemonCommand::DpNetdevPorts { dp } => commands::dpif::dp_netdev_ports(oracle, out, &dp),
        DaemonCommand::DpNetdevPollThreads { dp } => commands::dpif::poll_threads(oracle, out, &dp),
        DaemonCommand::DpProvider => commands::dpif::providers(oracle, out),

        DaemonCommand::Netdev => commands::netdev::netdevs(oracle, out),
        DaemonCommand::NetdevProvider => commands::netdev::providers(oracle, out),

        DaemonCommand::UdpifKeys {
            udpif,
            short,
            no_count,
        } => commands::udpif::keys(oracle, out, udpif.as_deref(), short, no_count),
        DaemonCommand::Upcall { dbg } => commands::udpif::upcall(oracle, out, dbg),

        DaemonCommand::Fdb { bridge, dbg, hash } => {
            commands::fdb::fdb(oracle, out, bridge.as_deref(), dbg, hash)
        }

        DaemonCommand::Conntrack { conntrack, short } => {
            commands::conntrack::conns(oracle, out, &conntrack, short)
        }
    }
}
