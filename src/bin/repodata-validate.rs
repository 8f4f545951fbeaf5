//! Validate RPM repositories by reading them with two independent parsers.

use std::fmt::Display;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Parser};
use nu_ansi_term::Color::{self, Green, Red};
use rpm_repodata::{
    find_repos, validate_repository, CompressionType, Repository, RepositoryOptions,
    ValidationReport,
};
use tracing::{debug, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Cross-validate RPM repository metadata")]
struct Args {
    /// Repository directories, each containing repodata/
    #[arg(required_unless_present = "discover")]
    repos: Vec<PathBuf>,

    /// Validate every repository found under DIR
    #[arg(long, value_name = "DIR")]
    discover: Option<PathBuf>,

    /// Also rewrite each repository under DIR and validate the copy
    #[arg(long, value_name = "DIR")]
    rewrite_to: Option<PathBuf>,

    /// Compression of rewritten metadata (none, gzip, xz, bz2, zstd)
    #[arg(long, default_value = "gzip", value_parser = parse_compression)]
    compression: CompressionType,

    /// Increase logging (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,
}

fn parse_compression(value: &str) -> Result<CompressionType, String> {
    value.parse().map_err(|e| format!("{e}"))
}

fn setup_logging(args: &Args) {
    let filter_level = if args.quiet {
        Level::ERROR
    } else if args.verbose >= 2 {
        Level::TRACE
    } else if args.verbose == 1 {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "rpm_repodata={filter_level},repodata_validate={filter_level}"
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(!args.no_color)
        .with_writer(std::io::stderr)
        .compact()
        .without_time()
        .init();
}

struct Painter {
    color: bool,
}

impl Painter {
    fn paint(&self, color: Color, text: impl Display) -> String {
        if self.color {
            color.bold().paint(text.to_string()).to_string()
        } else {
            text.to_string()
        }
    }
}

/// Directory under `rewrite_dir` named after `repo`.
///
/// `repo` is canonicalized first so that `.` and `..` resolve to a real name.
fn rewrite_destination(rewrite_dir: &Path, repo: &Path) -> rpm_repodata::Result<PathBuf> {
    let repo = fs::canonicalize(repo)?;
    let name = repo.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} has no directory name to rewrite under", repo.display()),
        )
    })?;
    Ok(rewrite_dir.join(name))
}

/// Load `repo`, write it to `dest` and validate the written copy.
fn rewrite(
    repo: &Path,
    dest: &Path,
    compression: CompressionType,
) -> rpm_repodata::Result<ValidationReport> {
    let options = RepositoryOptions::default().metadata_compression_type(compression);
    Repository::load_from_directory(repo)?.write_to_directory_with_options(dest, options)?;
    debug!("rewrote {} to {}", repo.display(), dest.display());
    validate_repository(dest)
}

fn main() -> ExitCode {
    let args = Args::parse();
    setup_logging(&args);
    let painter = Painter {
        color: !args.no_color,
    };

    let mut repos = args.repos.clone();
    if let Some(dir) = &args.discover {
        match find_repos(dir) {
            Ok(found) => repos.extend(found),
            Err(e) => {
                println!("{}: {} {e}", dir.display(), painter.paint(Red, "FAIL"));
                return ExitCode::FAILURE;
            }
        }
    }

    let mut failed = 0;
    for repo in &repos {
        let result = validate_repository(repo).and_then(|report| match &args.rewrite_to {
            Some(rewrite_dir) => rewrite_destination(rewrite_dir, repo)
                .and_then(|dest| rewrite(repo, &dest, args.compression)),
            None => Ok(report),
        });
        match result {
            Ok(report) => println!(
                "{}: {} ({report})",
                repo.display(),
                painter.paint(Green, "OK")
            ),
            Err(e) => {
                failed += 1;
                println!("{}: {} {e}", repo.display(), painter.paint(Red, "FAIL"));
            }
        }
    }

    if failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
