use std::{env, fs, path::PathBuf, process};

use anyhow::Context;
use tracing_subscriber::EnvFilter;
use vrm_codec::{ExportOptions, Severity, VrmVersion, migrate_vrm, settings::load_export_options};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run() {
        eprintln!("{err:#}");
        process::exit(1);
    }
}

fn usage() -> ! {
    eprintln!("Usage: vrm-codec <input.vrm> <output.vrm> [0.x|1.0] [options.json]");
    process::exit(2);
}

fn run() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if !(3..=5).contains(&args.len()) {
        usage();
    }

    let input = PathBuf::from(&args[1]);
    let output = PathBuf::from(&args[2]);
    let options = match args.get(4) {
        Some(path) => load_export_options(&PathBuf::from(path))?,
        None => ExportOptions::default(),
    };
    let target = match args.get(3) {
        Some(text) => VrmVersion::parse(text).unwrap_or_else(|| usage()),
        None => options.target_version,
    };

    let bytes = fs::read(&input)
        .with_context(|| format!("failed to read input file: {}", input.display()))?;
    let (output_bytes, report) = migrate_vrm(&bytes, target, &options)
        .with_context(|| format!("failed to convert {}", input.display()))?;
    fs::write(&output, &output_bytes)
        .with_context(|| format!("failed to write output file: {}", output.display()))?;

    let import = &report.import;
    let export = &report.export;
    println!("Model: {}", import.model_name);
    if let Some(author) = &import.author {
        println!("Author: {author}");
    }
    println!("Version: {} -> {}", report.from.as_str(), report.to.as_str());
    println!("Meshes: {}, Bones: {}", export.mesh_count, import.bone_count);
    println!(
        "Vertices: {}, Triangles: {}",
        export.total_vertices, export.total_triangles
    );
    println!(
        "Materials: {}, Textures: {}",
        export.material_count,
        import.texture_infos.len()
    );

    let warnings = import
        .issues
        .iter()
        .chain(&export.issues)
        .filter(|issue| issue.severity != Severity::Info)
        .count();
    println!("Issues: {warnings}");

    Ok(())
}
