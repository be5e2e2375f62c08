//! Generic container walk commands

use clap::Subcommand;

use super::core::parse_len;

#[derive(Subcommand)]
pub enum ContainerCommand {
    /// Walk a `struct hmap`
    Hmap {
        /// Address or symbol of the hmap
        address: String,

        /// Record type embedding the hmap_node (e.g. "struct port")
        type_name: String,

        /// Member of the record that is the hmap_node
        member: String,

        /// Print every field of each record
        #[arg(long)]
        dump: bool,
    },

    /// Walk a `struct cmap`
    Cmap {
        /// Address or symbol of the cmap
        address: String,

        /// Record type embedding the cmap_node
        #[arg(requires = "member")]
        type_name: Option<String>,

        /// Member of the record that is the cmap_node
        member: Option<String>,

        /// Print every field of each record
        #[arg(long)]
        dump: bool,
    },

    /// Walk a `struct ovs_list`
    List {
        /// Address or symbol of the list head
        address: String,

        /// Record type embedding the ovs_list node
        #[arg(requires = "member")]
        type_name: Option<String>,

        /// Member of the record that is the ovs_list node
        member: Option<String>,

        /// Print every field of each record
        #[arg(long)]
        dump: bool,
    },

    /// Show a `struct simap` as name: value
    Simap {
        /// Address or symbol of the simap
        address: String,
    },

    /// Show a `struct smap` as key: value
    Smap {
        /// Address or symbol of the smap
        address: String,
    },

    /// Walk a buffer of netlink attributes
    Nla {
        /// Address of the first `struct nlattr`
        address: String,

        /// Buffer length in bytes
        #[arg(value_parser = parse_len)]
        len: u64,

        /// Also hex dump each payload
        #[arg(long)]
        dump: bool,

        /// Enum used to name attribute types (e.g. ovs_action_attr)
        #[arg(long = "enum")]
        enum_name: Option<String>,
    },

    /// Walk a buffer of OpenFlow actions
    Ofpacts {
        /// Address of the first `struct ofpact`
        address: String,

        /// Buffer length in bytes
        #[arg(value_parser = parse_len)]
        len: u64,
    },
}
