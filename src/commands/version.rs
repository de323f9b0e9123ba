use super::GlobalArgs;
use shield::{Result, SealMarker};

/// Print version information
pub fn version(args: &GlobalArgs) -> Result<()> {
    let marker = SealMarker::new(&args.encryption_version)?;

    println!("shield {}", env!("CARGO_PKG_VERSION"));
    println!("Encryption version: {}", args.encryption_version);
    println!("Seal marker: {marker}");
    println!("Cipher: {}", args.cipher.as_str());
    println!("Authors: {}", env!("CARGO_PKG_AUTHORS"));
    Ok(())
}
