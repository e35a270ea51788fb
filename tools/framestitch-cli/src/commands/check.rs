//! Check system capabilities.

use framestitch_common::config::config_file_path;
use framestitch_engine::backend::command_exists;

pub fn run() -> anyhow::Result<()> {
    println!("framestitch System Check");
    println!("{}", "=".repeat(50));

    let tools = [
        ("ffmpeg", true, "encode, concat and mux"),
        ("ffprobe", false, "output inspection"),
    ];

    let mut all_required_ok = true;
    for (binary, required, purpose) in tools {
        let available = command_exists(binary);
        let tag = match (available, required) {
            (true, _) => "[OK]",
            (false, true) => "[MISSING]",
            (false, false) => "[WARN]",
        };
        println!("{tag} {binary}: {purpose}");
        if required && !available {
            all_required_ok = false;
        }
    }

    let config_path = config_file_path();
    println!();
    println!(
        "Config file: {} ({})",
        config_path.display(),
        if config_path.exists() {
            "present"
        } else {
            "not found, using defaults"
        }
    );

    println!();
    if all_required_ok {
        println!("All required tools are available. framestitch is ready.");
    } else {
        println!("Some required tools are missing. Install ffmpeg and make sure it is on PATH.");
    }

    Ok(())
}
