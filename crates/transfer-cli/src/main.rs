//! `transfer-cli` — exercises a transfer server's upload and download paths.
//!
//! Every command checks what came back against what was sent: sizes and MD5
//! digests for uploads, byte-for-byte equality for round trips.

mod client;

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use transfer_types::UploadReceipt;
use transfer_types::digest::{md5_file, md5_hex};

use crate::client::TransferClient;

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("BUILD_INFO"), ")");

#[derive(Parser, Debug)]
#[command(name = "transfer-cli", version = VERSION)]
struct Args {
    /// Transfer endpoint URL, e.g. http://192.168.1.10:8080
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    server: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a file and check the digest the server reports
    Upload {
        path: PathBuf,
        /// Name to store the file under (defaults to the local file name)
        #[arg(long)]
        name: Option<String>,
    },

    /// Download a stored file
    Download {
        name: String,
        /// Output path (defaults to the file name in the current directory)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Upload a file, download it again, and compare
    RoundTrip {
        path: PathBuf,
        #[arg(long)]
        name: Option<String>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,transfer_cli=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let client = TransferClient::new(&args.server);
    match args.cmd {
        Command::Upload { path, name } => {
            let name = stored_name(&path, name)?;
            let receipt = upload_verified(&client, &path, &name)?;
            println!(
                "uploaded {} ({} bytes, md5 {})",
                receipt.file_name, receipt.file_size, receipt.file_hash
            );
        }
        Command::Download { name, out } => {
            let out = out.unwrap_or_else(|| PathBuf::from(&name));
            let file = File::create(&out).with_context(|| format!("create {:?}", out))?;
            let mut writer = BufWriter::new(file);
            let bytes = client.download(&name, &mut writer)?;
            writer
                .into_inner()
                .map_err(|e| e.into_error())
                .with_context(|| format!("flush {:?}", out))?;
            let digest = md5_file(&out).with_context(|| format!("digest {:?}", out))?;
            println!(
                "downloaded {} -> {} ({} bytes, md5 {})",
                name,
                out.display(),
                bytes,
                digest.hex
            );
        }
        Command::RoundTrip { path, name } => {
            let name = stored_name(&path, name)?;
            let original = std::fs::read(&path).with_context(|| format!("read {:?}", path))?;
            let receipt = upload_verified(&client, &path, &name)?;

            let mut fetched = Vec::with_capacity(original.len());
            client.download(&name, &mut fetched)?;
            if fetched != original {
                return Err(anyhow::anyhow!(
                    "round trip mismatch: sent {} bytes (md5 {}), got {} bytes (md5 {})",
                    original.len(),
                    md5_hex(&original),
                    fetched.len(),
                    md5_hex(&fetched)
                ));
            }
            println!(
                "round trip ok: {} ({} bytes, md5 {})",
                receipt.file_name, receipt.file_size, receipt.file_hash
            );
        }
    }
    Ok(())
}

/// Default the stored name to the local file name.
fn stored_name(path: &Path, name: Option<String>) -> Result<String> {
    if let Some(name) = name.filter(|n| !n.is_empty()) {
        return Ok(name);
    }
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow::anyhow!("cannot derive a file name from {:?}; use --name", path))
}

/// Upload and fail unless the receipt matches the local file.
fn upload_verified(client: &TransferClient, path: &Path, name: &str) -> Result<UploadReceipt> {
    let local = md5_file(path).with_context(|| format!("digest {:?}", path))?;
    let receipt = client.upload(path, name)?;
    tracing::info!(
        file_name = %receipt.file_name,
        file_size = receipt.file_size,
        file_hash = %receipt.file_hash,
        "upload acknowledged"
    );
    if receipt.file_size != local.size || receipt.file_hash != local.hex {
        return Err(anyhow::anyhow!(
            "server stored {} bytes (md5 {}), local file is {} bytes (md5 {})",
            receipt.file_size,
            receipt.file_hash,
            local.size,
            local.hex
        ));
    }
    Ok(receipt)
}
