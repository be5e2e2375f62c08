//! Names of the target types the walkers rely on
//!
//! Every one of these must be present in the loaded layout (the built-in
//! layout provides them all for x86_64).

pub const HMAP: &str = "struct hmap";
pub const HMAP_NODE: &str = "struct hmap_node";

pub const CMAP: &str = "struct cmap";
pub const CMAP_IMPL: &str = "struct cmap_impl";
pub const CMAP_BUCKET: &str = "struct cmap_bucket";
pub const CMAP_NODE: &str = "struct cmap_node";

/// Width of one entry of `cmap_bucket.hashes`
pub const CMAP_HASH_SIZE: usize = 4;

pub const OVS_LIST: &str = "struct ovs_list";

pub const SHASH: &str = "struct shash";
pub const SHASH_NODE: &str = "struct shash_node";
pub const SIMAP: &str = "struct simap";
pub const SIMAP_NODE: &str = "struct simap_node";
pub const SMAP: &str = "struct smap";
pub const SMAP_NODE: &str = "struct smap_node";

pub const NLATTR: &str = "struct nlattr";
pub const OFPACT: &str = "struct ofpact";

/// Flag bits carried in the top of `nla_type`
pub const NLA_F_NESTED: u16 = 1 << 15;
pub const NLA_F_NET_BYTEORDER: u16 = 1 << 14;
pub const NLA_TYPE_MASK: u16 = !(NLA_F_NESTED | NLA_F_NET_BYTEORDER);

/// Number of `udpif_key` maps per `udpif`
pub const N_UMAPS: usize = 512;

/// Upper bound when reading `char *` strings from the target
pub const MAX_STRING_LEN: usize = 1024;
