pub mod directory;

pub use directory::ResourceDirectory;
