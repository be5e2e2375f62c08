//! ovs-vswitchd state commands
//!
//! These need a layout describing the daemon's own structs and globals.

use clap::Subcommand;

#[derive(Subcommand)]
pub enum DaemonCommand {
    /// List all bridges (`all_bridges`)
    #[command(visible_alias = "b")]
    Bridge {
        /// Also show each bridge's ports and interfaces
        #[arg(long)]
        ports: bool,

        /// Also show each bridge's wanted ports
        #[arg(long)]
        wanted: bool,
    },

    /// Show the ports and interfaces of one bridge
    BridgePorts {
        /// Address of the `struct bridge`
        bridge: String,
    },

    /// List userspace datapaths (`dp_netdevs`)
    DpNetdev {
        /// Also show each datapath's ports
        #[arg(long)]
        ports: bool,
    },

    /// Show the ports of one userspace datapath
    DpNetdevPorts {
        /// Address of the `struct dp_netdev`
        dp: String,
    },

    /// Show the PMD threads of one userspace datapath
    DpNetdevPollThreads {
        /// Address of the `struct dp_netdev`
        dp: String,
    },

    /// List registered datapath classes (`dpif_classes`)
    DpProvider,

    /// List all netdevs (`netdev_shash`)
    Netdev,

    /// List registered netdev classes (`netdev_classes`)
    NetdevProvider,

    /// Show datapath flow keys held by the upcall handlers
    UdpifKeys {
        /// Name or address of one udpif to dump; lists all udpifs if omitted
        udpif: Option<String>,

        /// Only print ukey addresses
        #[arg(long)]
        short: bool,

        /// Skip counting keys when listing udpifs
        #[arg(long)]
        no_count: bool,
    },

    /// Show upcall handler and revalidator state
    Upcall {
        /// Include structure addresses
        #[arg(long)]
        dbg: bool,
    },

    /// Show MAC learning tables
    Fdb {
        /// Bridge to show entries for; shows a summary of all bridges if omitted
        bridge: Option<String>,

        /// Include structure addresses
        #[arg(long)]
        dbg: bool,

        /// Walk the hash table instead of the LRU list
        #[arg(long)]
        hash: bool,
    },

    /// List userspace conntrack connections
    Conntrack {
        /// Address of the `struct conntrack`
        conntrack: String,

        /// Only print connection addresses
        #[arg(long)]
        short: bool,
    },
}
