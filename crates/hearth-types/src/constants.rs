//! Well-known identifiers and names.
//!
//! Centralizes the reserved ids so no component spells them out by hand.

/// Document id of the root directory. Its path is `/`.
pub const ROOT_DIR_ID: &str = "hearth.files.root-dir";

/// Document id of the trash directory.
pub const TRASH_DIR_ID: &str = "hearth.files.trash-dir";

/// Leaf name of the trash directory under the root.
pub const TRASH_DIR_NAME: &str = ".hearth_trash";

/// Absolute path of the trash directory.
pub const TRASH_DIR_PATH: &str = "/.hearth_trash";

/// Document type string stored for file nodes.
pub const FILE_TYPE: &str = "file";

/// Document type string stored for directory nodes.
pub const DIRECTORY_TYPE: &str = "directory";

/// Resource type used in JSON-API style references to files.
pub const FILES_DOCTYPE: &str = "hearth.files";

/// Permission bits of a non-executable file (`-rw-r--r--`).
pub const FILE_MODE: u32 = 0o644;

/// Permission bits of an executable file (`-rwxr-xr-x`).
pub const EXECUTABLE_FILE_MODE: u32 = 0o755;

/// Permission bits of a directory.
pub const DIR_MODE: u32 = 0o755;
