//! Repository implementations for MyCloud entities.

pub mod file;
pub mod folder;
pub mod share;
pub mod user;

pub use file::FileRepository;
pub use folder::FolderRepository;
pub use share::ShareRepository;
pub use user::UserRepository;
