//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! This crate provides implementations of the storage and networking bridge
//! traits using desktop-appropriate libraries:
//! - `HttpClient` using `reqwest`
//! - `BlobStore` using `tokio::fs` under the platform cache directory
//! - `PlaylistStore` as a JSON file under the platform data directory
//!
//! Page extraction and now-playing display stay host-specific and have no
//! desktop default.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{FileBlobStore, JsonPlaylistStore, ReqwestHttpClient};
//!
//! #[tokio::main]
//! async fn main() {
//!     let http_client = ReqwestHttpClient::new();
//!     let blobs = FileBlobStore::new();
//!     let playlist = JsonPlaylistStore::new();
//!
//!     // Use in core configuration
//! }
//! ```

mod blob_store;
mod http;
mod playlist_store;

pub use blob_store::FileBlobStore;
pub use http::ReqwestHttpClient;
pub use playlist_store::JsonPlaylistStore;
