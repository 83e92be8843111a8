/*++

Licensed under the Apache-2.0 license.

--*/

//! Ancillary binary-authoring tool for PLDM firmware packages. The core
//! parser and encoder in this crate work on in-memory byte buffers only;
//! this binary is the thin layer that does the actual file I/O on top of
//! them.
//!
//! ```bash
//! pldm-fw-pkg encode --manifest manifest.toml --file firmware.bin
//! pldm-fw-pkg decode --package firmware.bin --directory output
//! ```

use clap::{Arg, Command};
use pldm_fw_pkg::FirmwareManifest;
use std::fs;

fn encode(manifest_path: &str, output_path: &str) -> anyhow::Result<()> {
    let manifest_contents = fs::read_to_string(manifest_path)?;
    let mut manifest: FirmwareManifest = toml::de::from_str(&manifest_contents)?;

    for component in manifest.component_image_information.iter_mut() {
        if component.image_data.is_none() {
            if let Some(location) = &component.image_location {
                component.image_data = Some(fs::read(location)?);
            }
        }
    }

    manifest
        .verify()
        .map_err(|e| anyhow::anyhow!("manifest validation failed: {e}"))?;

    let package = manifest.encode()?;
    fs::write(output_path, package)?;
    println!("encoded firmware package to {}", output_path);
    Ok(())
}

fn decode(package_path: &str, output_dir: &str) -> anyhow::Result<()> {
    let metadata = fs::metadata(output_dir)
        .map_err(|_| anyhow::anyhow!("{} does not exist", output_dir))?;
    if !metadata.is_dir() {
        anyhow::bail!("{} is not a directory", output_dir);
    }

    let data = fs::read(package_path)?;
    let mut manifest = FirmwareManifest::parse(&data)?;

    for (index, component) in manifest.component_image_information.iter_mut().enumerate() {
        if let Some(image_data) = &component.image_data {
            let file_path = format!("{}/img_{:02}.bin", output_dir, index);
            fs::write(&file_path, image_data)?;
            component.image_location = Some(file_path);
        }
    }

    let manifest_toml = toml::to_string(&manifest)?;
    fs::write(format!("{}/manifest.toml", output_dir), manifest_toml)?;
    println!("decoded firmware package to {}", output_dir);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let matches = Command::new("pldm-fw-pkg")
        .version("1.0")
        .about("Encodes/decodes PLDM firmware packages")
        .subcommand(
            Command::new("encode")
                .about("Encodes a manifest TOML file to a firmware package")
                .arg(
                    Arg::new("manifest")
                        .short('m')
                        .long("manifest")
                        .value_name("MANIFEST")
                        .help("Path to the manifest TOML file")
                        .required(true),
                )
                .arg(
                    Arg::new("file")
                        .short('f')
                        .long("file")
                        .value_name("FILE")
                        .help("Output file for the firmware package")
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("decode")
                .about("Decodes a firmware package to a manifest and components")
                .arg(
                    Arg::new("package")
                        .short('p')
                        .long("package")
                        .value_name("PACKAGE")
                        .help("Path to the firmware package file")
                        .required(true),
                )
                .arg(
                    Arg::new("dir")
                        .short('d')
                        .long("directory")
                        .value_name("DIRECTORY")
                        .help("Output directory for manifest and components")
                        .required(true),
                ),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("encode", sub_matches)) => {
            let manifest_path = sub_matches.get_one::<String>("manifest").unwrap();
            let output_path = sub_matches.get_one::<String>("file").unwrap();
            encode(manifest_path, output_path)?;
        }
        Some(("decode", sub_matches)) => {
            let package_path = sub_matches.get_one::<String>("package").unwrap();
            let output_dir = sub_matches.get_one::<String>("dir").unwrap();
            decode(package_path, output_dir)?;
        }
        _ => {
            println!("use either 'encode' or 'decode' subcommands");
            std::process::exit(1);
        }
    }

    Ok(())
}
