use clap::{Arg, ArgAction, Command};

pub fn build_cli() -> Command {
    Command::new("github-ratelimit")
        .about("Report GitHub API rate-limit state with clock-skew corrected reset times")
        .disable_version_flag(true)
        .arg(
            Arg::new("resource")
                .long("resource")
                .num_args(1)
                .default_value("core")
                .help("Rate limit bucket to report (core, search, graphql, ...)"),
        )
        .arg(
            Arg::new("all")
                .long("all")
                .help("Report every bucket returned by the server")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Emit JSON instead of a one-line summary")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .num_args(1)
                .help("Override RUST_LOG level (e.g., info, debug)"),
        )
        .arg(
            Arg::new("version")
                .long("version")
                .help("Print version and exit")
                .action(ArgAction::SetTrue),
        )
}

pub fn init_logging(level: Option<&str>) {
    // Explicit level wins over RUST_LOG; default to info. Logs go to stderr.
    let env = env_logger::Env::default().default_filter_or("info");
    let mut builder = env_logger::Builder::from_env(env);
    if let Some(lvl) = level {
        builder.parse_filters(lvl);
    }
    builder.init();
}
