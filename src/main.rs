use std::path::PathBuf;

#[derive(Debug, Default)]
struct CliArgs {
    config_dir: Option<PathBuf>,
    open: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = parse_args(std::env::args().skip(1).collect())?;
    playdeck::app::run_with_startup(playdeck::app::AppStartupOptions {
        config_dir: args.config_dir,
        open: args.open,
    })
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
            other if other.starts_with('-') => anyhow::bail!("unknown argument {other}"),
            other => {
                if out.open.is_some() {
                    anyhow::bail!("only one file or folder can be opened at startup");
                }
                out.open = Some(PathBuf::from(other));
            }
        }
        index += 1;
    }
    Ok(out)
}

fn print_help() {
    println!("playdeck [PATH]");
    println!("  PATH                 Media file or folder to open");
    println!("  --config-dir <dir>   Settings and log directory");
    println!("                       (default: $PLAYDECK_CONFIG_DIR or ~/.config/playdeck)");
    println!("  -h, --help           Show this help");
}
