//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Crawl a dufs file server and download the files it lists.
///
/// The directory tree under URL is walked breadth-first through the
/// server's JSON listings. Every discovered file is then downloaded into
/// OUTPUT/<root folder>/<relative path>.
#[derive(Parser, Debug)]
#[command(name = "dufs-crawler")]
#[command(author, version, about)]
pub struct Args {
    /// Directory URL on the dufs server
    pub url: String,

    /// Base folder for downloads (defaults to the configured folder, then ".")
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Print the discovered files and exit without downloading
    #[arg(long)]
    pub list: bool,

    /// Only download files under this relative path (repeatable)
    #[arg(long, value_name = "PREFIX")]
    pub include: Vec<String>,

    /// Skip files under this relative path (repeatable)
    #[arg(long, value_name = "PREFIX")]
    pub exclude: Vec<String>,

    /// Maximum concurrent downloads (1-32, defaults to the configured value)
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=32))]
    pub concurrency: Option<u8>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Disable colored log output
    #[arg(long)]
    pub no_color: bool,
}

impl Args {
    /// Default log level derived from the verbosity flags.
    #[must_use]
    pub fn default_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "info",
                1 => "debug",
                _ => "trace",
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_url_only_parses_with_defaults() {
        let args = Args::try_parse_from(["dufs-crawler", "http://host/files/"]).unwrap();
        assert_eq!(args.url, "http://host/files/");
        assert!(args.output.is_none());
        assert!(!args.list);
        assert!(args.include.is_empty());
        assert!(args.exclude.is_empty());
        assert!(args.concurrency.is_none());
        assert_eq!(args.default_log_level(), "info");
    }

    #[test]
    fn test_cli_missing_url_is_error() {
        let err = Args::try_parse_from(["dufs-crawler"]).unwrap_err();
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::MissingRequiredArgument
        );
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["dufs-crawler", "-v", "http://h/"]).unwrap();
        assert_eq!(args.default_log_level(), "debug");

        let args = Args::try_parse_from(["dufs-crawler", "-vv", "http://h/"]).unwrap();
        assert_eq!(args.default_log_level(), "trace");
    }

    #[test]
    fn test_cli_quiet_wins_over_verbose() {
        let args = Args::try_parse_from(["dufs-crawler", "-q", "-v", "http://h/"]).unwrap();
        assert_eq!(args.default_log_level(), "error");
    }

    #[test]
    fn test_cli_repeatable_filters() {
        let args = Args::try_parse_from([
            "dufs-crawler",
            "--include",
            "docs",
            "--include",
            "img",
            "--exclude",
            "docs/old",
            "http://h/",
        ])
        .unwrap();
        assert_eq!(args.include, vec!["docs", "img"]);
        assert_eq!(args.exclude, vec!["docs/old"]);
    }

    #[test]
    fn test_cli_concurrency_range() {
        let args = Args::try_parse_from(["dufs-crawler", "-c", "32", "http://h/"]).unwrap();
        assert_eq!(args.concurrency, Some(32));
        assert!(Args::try_parse_from(["dufs-crawler", "-c", "0", "http://h/"]).is_err());
        assert!(Args::try_parse_from(["dufs-crawler", "-c", "33", "http://h/"]).is_err());
    }

    #[test]
    fn test_cli_output_short_flag() {
        let args = Args::try_parse_from(["dufs-crawler", "-o", "/tmp/dl", "http://h/"]).unwrap();
        assert_eq!(args.output, Some(PathBuf::from("/tmp/dl")));
    }
}
