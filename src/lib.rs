//! Patches the signed-image header of an AMD Secure Launch (AmdSL) firmware
//! binary: aligns the signed length held in word 0 and writes the header
//! magic, signed size, image version and security patch level.

pub mod error;
pub mod header;
pub mod hex;
pub mod image;

use std::fs;
use std::path::PathBuf;

pub use error::{FormatError, PatchError};
pub use header::{PatchReport, Word0Mask};
pub use image::Image;

/// Everything needed for one run, already validated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub image: PathBuf,
    pub version: u32,
    pub spl: u32,
    pub output: PathBuf,
    pub word0_mask: Word0Mask,
}

impl Config {
    /// Checks that the input exists and parses the hexadecimal arguments.
    /// Nothing is written here.
    pub fn new(
        image: PathBuf,
        version: &str,
        spl: &str,
        output: PathBuf,
        word0_mask: Word0Mask,
    ) -> Result<Self, PatchError> {
        if !image.is_file() {
            return Err(PatchError::NotFound(image));
        }

        let parse = |field: &'static str, value: &str| {
            hex::parse_hex(value).map_err(|source| PatchError::Parse {
                field,
                value: value.to_owned(),
                source,
            })
        };

        Ok(Self {
            version: parse("version", version)?,
            spl: parse("spl", spl)?,
            image,
            output,
            word0_mask,
        })
    }
}

/// Reads the image, patches its header and writes the result.
///
/// The input is read completely before the output is opened, so both may
/// name the same file. Nothing is written if any step fails.
pub fn run(config: &Config) -> Result<PatchReport, PatchError> {
    let bytes = fs::read(&config.image).map_err(|source| PatchError::Io {
        action: "read",
        path: config.image.clone(),
        source,
    })?;
    log::debug!("read {} bytes from {}", bytes.len(), config.image.display());

    let mut image = Image::from_bytes(bytes)?;
    let report = header::patch(&mut image, config.version, config.spl, config.word0_mask)?;
    log::debug!(
        "signed length {:#x} (stored {:#x}), version {:#010x}, spl {:#010x}",
        report.signed_len,
        report.raw_signed_len,
        config.version,
        config.spl
    );
    if let Ok(fields) = header::read_fields(&image) {
        log::debug!("{:#x?}", fields);
    }

    fs::write(&config.output, image.into_bytes()).map_err(|source| PatchError::Io {
        action: "write",
        path: config.output.clone(),
        source,
    })?;

    Ok(report)
}
