//! Tests for the save subcommand.

use super::parse;
use crate::cli::{AlgorithmArg, CliCommand};
use std::path::Path;

#[test]
fn cli_parse_save_defaults() {
    match parse(&["dfm", "save", "out.iso"]) {
        CliCommand::Save {
            dest,
            input,
            chunk_size,
            overwrite,
            keep_on_cancel,
            algorithm,
        } => {
            assert_eq!(dest, Path::new("out.iso"));
            assert!(input.is_none());
            assert_eq!(chunk_size, 65536);
            assert!(!overwrite);
            assert!(!keep_on_cancel);
            assert!(algorithm.is_none());
        }
        _ => panic!("expected Save"),
    }
}

#[test]
fn cli_parse_save_all_flags() {
    match parse(&[
        "dfm",
        "save",
        "/tmp/final.bin",
        "--input",
        "/tmp/source.bin",
        "--chunk-size",
        "4096",
        "--overwrite",
        "--keep-on-cancel",
        "--algorithm",
        "sha512",
    ]) {
        CliCommand::Save {
            dest,
            input,
            chunk_size,
            overwrite,
            keep_on_cancel,
            algorithm,
        } => {
            assert_eq!(dest, Path::new("/tmp/final.bin"));
            assert_eq!(input.as_deref(), Some(Path::new("/tmp/source.bin")));
            assert_eq!(chunk_size, 4096);
            assert!(overwrite);
            assert!(keep_on_cancel);
            assert_eq!(algorithm, Some(AlgorithmArg::Sha512));
        }
        _ => panic!("expected Save with flags"),
    }
}

#[test]
fn cli_parse_save_requires_dest() {
    use clap::Parser;
    assert!(crate::cli::Cli::try_parse_from(["dfm", "save"]).is_err());
}
