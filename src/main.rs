use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

const LOG_FILE: &str = "banger.log";

#[derive(Debug, Default)]
struct CliArgs {
    config_dir: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = parse_args(std::env::args().skip(1).collect())?;
    let config_dir = match args.config_dir {
        Some(dir) => dir,
        None => banger::config::config_root()?,
    };

    init_logging(&config_dir)?;
    log::info!("banger starting up with config in {}", config_dir.display());

    banger::app::run(&config_dir)
}

/// The terminal belongs to the UI, so log lines go to a file next to the config.
fn init_logging(config_dir: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(config_dir)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(config_dir.join(LOG_FILE))?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

fn parse_args(args: Vec<String>) -> anyhow::Result<CliArgs> {
    let mut out = CliArgs::default();
    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--config-dir" => {
                index += 1;
                let Some(value) = args.get(index) else {
                    anyhow::bail!("--config-dir requires a directory");
                };
                if value.trim().is_empty() {
                    anyhow::bail!("--config-dir cannot be empty");
                }
                out.config_dir = Some(PathBuf::from(value.trim()));
            }
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            other => anyhow::bail!("unknown argument {other}"),
        }
        index += 1;
    }
    Ok(out)
}

fn print_help() {
    println!("BangerPlayer");
    println!("  --config-dir <dir>   Keep config.json and banger.log in <dir>");
    println!("  -h, --help           Show this help");
    println!();
    println!("BANGER_CONFIG_DIR overrides the default config directory.");
}
