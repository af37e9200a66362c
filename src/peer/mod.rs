//! Peers: other users publishing a document of the same shape.
//!
//! A peer is subscribed to by the URL of their public GitHub repository.
//! Their `data.json` is fetched from the raw-content host and their entries
//! are mirrored locally, tagged with the peer's username.

mod fetcher;
mod subscriptions;
mod url;

pub use fetcher::{HttpPeerFetcher, PeerFetcher};
pub use subscriptions::{
    AddReport, MergeCounts, PeerListing, RefreshReport, Removal, RemoveReport, SubscriptionManager,
    apply_peer_entries,
};
pub use url::{PeerRepo, parse_repo_url};
