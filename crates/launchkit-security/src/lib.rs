mod checksum;

pub use checksum::{sha256_hex, sha256_hex_file, verify_sha256, verify_sha256_file};
