use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use amdsl_header::{Config, PatchError, Word0Mask};
use clap::{ErrorKind, Parser};

/// Patch the signed-image header of an AmdSL firmware binary.
#[derive(Parser)]
#[clap(name = "amdsl-header")]
struct Args {
    /// Firmware image to patch.
    #[clap(short, long)]
    image: PathBuf,
    /// Firmware version, in hexadecimal.
    #[clap(short = 'v', long = "version", value_name = "VERSION")]
    fw_version: String,
    /// Security patch level, in hexadecimal.
    #[clap(short, long)]
    spl: String,
    /// Where to write the patched image. May be the input itself.
    #[clap(short, long)]
    output: PathBuf,
    /// Keep bits 8..16 of word 0 when the signed length is realigned,
    /// instead of clearing them as previously released images do.
    #[clap(long)]
    preserve_flags: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if e.kind() == ErrorKind::DisplayHelp => e.exit(),
        Err(e) => return report(PatchError::Usage(e.to_string())),
    };

    let mask = if args.preserve_flags {
        Word0Mask::PreserveLow16
    } else {
        Word0Mask::Compatible
    };

    let result = Config::new(args.image, &args.fw_version, &args.spl, args.output, mask)
        .and_then(|config| amdsl_header::run(&config));

    match result {
        Ok(_) => {
            println!("header_tool: completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => report(e),
    }
}

fn report(err: PatchError) -> ExitCode {
    match &err {
        PatchError::Usage(usage) => eprint!("{}", usage),
        _ => {
            eprintln!("header_tool ERROR: {}", err);
            let mut source = err.source();
            while let Some(src) = source {
                eprintln!("\tsource: {}", src);
                source = src.source();
            }
        }
    }
    ExitCode::from(err.exit_code())
}
