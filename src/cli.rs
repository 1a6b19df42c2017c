use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Scrolls a group feed and keeps a deduplicated CSV of posts with reactions, comments and shares")]
pub struct Args {
    /// `key = value` file with email, password, group_url and output_file.
    #[arg(long, default_value = "credential.txt")]
    pub config: PathBuf,

    /// TOML file overriding entries of the built-in selector table.
    #[arg(long)]
    pub selectors: Option<PathBuf>,

    #[arg(long, env = "WEBDRIVER_URL", default_value = "http://127.0.0.1:9515")]
    pub webdriver_url: String,

    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub headless: bool,

    /// Seconds to wait after each scroll.
    #[arg(long, default_value_t = 10)]
    pub pause: u64,

    /// Minutes the scroll loop may run.
    #[arg(long, default_value_t = 2.0)]
    pub minutes: f64,

    /// Seconds to let the group page settle after the first load.
    #[arg(long, default_value_t = 15)]
    pub settle: u64,

    #[arg(long, default_value = "app.log")]
    pub log_file: PathBuf,

    /// Offset from UTC used for record dates and log timestamps.
    #[arg(long, default_value_t = 7, allow_hyphen_values = true)]
    pub utc_offset_hours: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let a = Args::try_parse_from(["group-feed-harvester"]).unwrap();
        assert_eq!(a.config, PathBuf::from("credential.txt"));
        assert!(a.headless);
        assert_eq!(a.pause, 10);
        assert_eq!(a.minutes, 2.0);
        assert_eq!(a.utc_offset_hours, 7);
    }

    #[test]
    fn headless_can_be_turned_off() {
        let a = Args::try_parse_from([
            "group-feed-harvester",
            "--headless",
            "false",
            "--utc-offset-hours",
            "-3",
            "--minutes",
            "0.5",
        ])
        .unwrap();
        assert!(!a.headless);
        assert_eq!(a.utc_offset_hours, -3);
        assert_eq!(a.minutes, 0.5);
    }
}
