//! Channel source loaders
//!
//! Each source implements the [`ChannelLoader`] capability trait and
//! produces `RawChannel` records; the pipeline depends only on the trait.

pub mod iptv_org;
pub mod m3u;
pub mod traits;

pub use iptv_org::IptvOrgSource;
pub use m3u::M3uPlaylistSource;
pub use traits::ChannelLoader;

/// User agent sent with playlist fetches and stream probes unless a channel
/// carries its own
pub const DEFAULT_USER_AGENT: &str = concat!("iptv-sanity/", env!("CARGO_PKG_VERSION"));
