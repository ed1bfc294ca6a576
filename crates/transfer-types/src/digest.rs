//! MD5 content digests.
//!
//! Both the server receipt and the client-side verification use these helpers,
//! so the two sides always agree on the encoding (32 lowercase hex chars).

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use md5::{Digest, Md5};

use crate::CHUNK_SIZE;

/// Size and digest of a byte sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentDigest {
    pub size: u64,
    pub hex: String,
}

/// Hex MD5 of an in-memory buffer.
pub fn md5_hex(bytes: &[u8]) -> String {
    hex::encode(Md5::digest(bytes))
}

/// Digest everything `reader` yields, reading in `CHUNK_SIZE` pieces.
pub fn md5_reader<R: Read>(mut reader: R) -> io::Result<ContentDigest> {
    let mut hasher = Md5::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut size = 0u64;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
        size += n as u64;
    }
    Ok(ContentDigest {
        size,
        hex: hex::encode(hasher.finalize()),
    })
}

/// Re-read a file from disk and digest it.
pub fn md5_file(path: &Path) -> io::Result<ContentDigest> {
    md5_reader(File::open(path)?)
}
