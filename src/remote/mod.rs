pub mod client;
pub mod file;

pub use client::RemoteClient;
pub use file::RemoteFile;
