use std::env;
use std::fs;
use std::path::PathBuf;
use std::process;

use aero_dxbc_spirv::{compile_dxbc, CompilerOptions, ShaderArtifact, TextureClampMode};
use anyhow::{bail, Context};
use tracing_subscriber::EnvFilter;

fn usage() -> &'static str {
    "\
dxbc_to_spirv: compile a DXBC (SM4/SM5) shader to SPIR-V

USAGE:
    cargo run -p aero-dxbc-spirv --bin dxbc_to_spirv -- <path.dxbc> [-o out.spv] [FLAGS]

FLAGS:
    -o, --output PATH       Output path (default: input with a .spv extension)
    --base-vertex           Report SV_VertexID relative to the base vertex
    --clamp-lod             Clamp ld/resinfo mip levels to the view's level count
    --zero-init-tgsm        Zero thread-group shared memory at compute entry
    --spirv-version X.Y     Target SPIR-V version (default 1.3)
    --entry NAME            Entry point name (default main)
    --strip-names           Omit OpName debug names

Set RUST_LOG=aero_dxbc_spirv=trace for per-instruction logs.
"
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = real_main() {
        eprintln!("error: {err:#}");
        process::exit(1);
    }
}

fn parse_version(v: &str) -> anyhow::Result<(u8, u8)> {
    let (major, minor) = v
        .split_once('.')
        .with_context(|| format!("invalid --spirv-version value {v:?}"))?;
    let major = major
        .parse::<u8>()
        .with_context(|| format!("invalid SPIR-V major version {major:?}"))?;
    let minor = minor
        .parse::<u8>()
        .with_context(|| format!("invalid SPIR-V minor version {minor:?}"))?;
    if major != 1 || minor > 6 {
        bail!("unsupported SPIR-V version {major}.{minor}");
    }
    Ok((major, minor))
}

fn real_main() -> anyhow::Result<()> {
    let mut input: Option<PathBuf> = None;
    let mut output: Option<PathBuf> = None;
    let mut options = CompilerOptions::default();

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print!("{}", usage());
                return Ok(());
            }
            "-o" | "--output" => {
                let Some(v) = args.next() else {
                    bail!("{arg} requires a value");
                };
                output = Some(PathBuf::from(v));
            }
            "--base-vertex" => options.apply_base_vertex = true,
            "--clamp-lod" => options.texture_clamp = TextureClampMode::ClampLod,
            "--zero-init-tgsm" => options.zero_init_workgroup_memory = true,
            "--strip-names" => options.strip_debug_names = true,
            "--spirv-version" => {
                let Some(v) = args.next() else {
                    bail!("--spirv-version requires a value");
                };
                options.spirv_version = parse_version(&v)?;
            }
            "--entry" => {
                let Some(v) = args.next() else {
                    bail!("--entry requires a value");
                };
                options.entry_point_name = v;
            }
            _ if arg.starts_with('-') => {
                bail!("unknown option {arg:?}\n\n{}", usage());
            }
            _ => {
                if input.is_some() {
                    bail!("unexpected positional argument {arg:?}\n\n{}", usage());
                }
                input = Some(PathBuf::from(arg));
            }
        }
    }

    let Some(input) = input else {
        bail!("missing DXBC input path\n\n{}", usage());
    };
    let output = output.unwrap_or_else(|| input.with_extension("spv"));

    let bytes = fs::read(&input).with_context(|| format!("failed to read {}", input.display()))?;
    let artifact = compile_dxbc(&bytes, &options)
        .with_context(|| format!("failed to compile {}", input.display()))?;
    fs::write(&output, artifact.to_bytes())
        .with_context(|| format!("failed to write {}", output.display()))?;

    print_summary(&artifact);
    println!("wrote {}", output.display());
    Ok(())
}

fn print_summary(artifact: &ShaderArtifact) {
    println!(
        "{} shader, entry {:?}, {} words, blake3 {}",
        artifact.stage(),
        artifact.entry_point(),
        artifact.code().len(),
        artifact.hash().to_hex()
    );

    let interface = artifact.interface_slots();
    println!(
        "inputs 0x{:08x} outputs 0x{:08x} patch 0x{:08x}",
        interface.input_slots, interface.output_slots, interface.patch_slots
    );
    for reg in &interface.inputs {
        println!(
            "  v{} {:?} {}{} {:?}",
            reg.register, reg.mask, reg.semantic_name, reg.semantic_index, reg.system_value
        );
    }
    for reg in &interface.outputs {
        println!(
            "  o{} {:?} {}{} {:?}",
            reg.register, reg.mask, reg.semantic_name, reg.semantic_index, reg.system_value
        );
    }

    println!("bindings (set 0):");
    for slot in artifact.resource_slots() {
        println!(
            "  [{:3}] {:?} slot {} {:?} stride {} stages {:?}",
            slot.binding, slot.kind, slot.slot, slot.dimension, slot.stride, slot.stages
        );
    }
}
