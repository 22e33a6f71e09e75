//! Headless сканер маркеров
//!
//! Печатает requirements, объявленные в GDScript файлах:
//!
//! ```text
//! require_node_scan [--config require_node.toml] player.gd enemy.gd
//! ```

use require_node_core::{init_logger, log_error, parse_markers, set_log_level, RequireNodeConfig};
use std::path::Path;
use std::process::ExitCode;

fn main() -> ExitCode {
    init_logger();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let mut config = RequireNodeConfig::default();

    if args.first().map(String::as_str) == Some("--config") {
        if args.len() < 2 {
            eprintln!("--config requires a path");
            return ExitCode::FAILURE;
        }
        let path = args.remove(1);
        args.remove(0);
        config = match RequireNodeConfig::load(Path::new(&path)) {
            Ok(config) => config,
            Err(error) => {
                eprintln!("{}", error);
                return ExitCode::FAILURE;
            }
        };
    }
    set_log_level(config.log_level);

    if args.is_empty() {
        eprintln!("usage: require_node_scan [--config <file>] <script.gd>...");
        return ExitCode::FAILURE;
    }

    let mut failed = false;
    for path in &args {
        let source = match std::fs::read_to_string(path) {
            Ok(source) => source,
            Err(error) => {
                log_error(&format!("failed to read '{}': {}", path, error));
                failed = true;
                continue;
            }
        };

        let requirements = parse_markers(&source, &config.grammar);
        println!("{}: {} requirement(s)", path, requirements.len());
        for requirement in requirements {
            println!("  {} {:?}", requirement.target, requirement.placement);
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
