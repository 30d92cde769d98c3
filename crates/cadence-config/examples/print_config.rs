/// Example program to print the loaded configuration
///
/// Run with: cargo run -p cadence-config --example print_config

fn main() {
    let config = cadence_config::EngineConfig::load();

    println!("=== Cadence Configuration ===\n");

    println!("Timing Settings:");
    println!("  Fail Fast: {}", config.timing.fail_fast);
    println!(
        "  Allow Dependent Animations: {}",
        config.timing.allow_dependent_animations
    );
    println!("  Time Tolerance: {}s", config.timing.time_tolerance_secs);
    println!("  Boundary Snap: {}", config.timing.boundary_snap);
    println!();

    println!("Compositor Settings:");
    println!("  Enabled: {}", config.compositor.enabled);
    println!("  Minimum Duration: {}s", config.compositor.minimum_duration_secs);
    println!("  Maximum Time: {}s", config.compositor.maximum_time_secs);
    println!();

    println!("Demo Settings:");
    println!("  Frames Per Second: {}", config.demo.frames_per_second);
    println!("  Run Seconds: {}", config.demo.run_seconds);
    println!();

    match toml::to_string_pretty(&config) {
        Ok(toml_str) => {
            println!("=== Serialized Configuration ===");
            println!("{}", toml_str);
        }
        Err(e) => {
            eprintln!("Failed to serialize config: {}", e);
        }
    }
}
