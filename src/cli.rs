use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, ValueEnum, error::ErrorKind};

use crate::config::{ExecutionConfig, Strategy};
use crate::pipeline;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum EngineArg {
    /// Load all rows in memory.
    #[value(alias = "pandas")]
    Eager,
    /// Chunked, bounded-memory aggregation on a single worker by default.
    #[value(alias = "polars")]
    Streaming,
}

impl From<EngineArg> for Strategy {
    fn from(value: EngineArg) -> Self {
        match value {
            EngineArg::Eager => Strategy::Eager,
            EngineArg::Streaming => Strategy::Streaming,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "top_songs",
    disable_help_subcommand = true,
    about = "Top songs per country and per user from a stream log",
    long_about = "Count song streams in a pipe-delimited log (song_id|user_id|country) and write the most-streamed songs per country and per user.",
    after_help = "The date token in artifact names is the part of the input file name after its last '-'."
)]
struct TopSongsCli {
    #[arg(
        long = "file-name",
        value_name = "PATH",
        help = "Pipe-delimited stream log to process"
    )]
    file_name: PathBuf,
    #[arg(
        long = "output-folder",
        value_name = "DIR",
        help = "Directory receiving the artifacts (created if missing)"
    )]
    output_folder: PathBuf,
    #[arg(
        long,
        value_enum,
        ignore_case = true,
        help = "Execution strategy (legacy names pandas/polars are accepted)"
    )]
    engine: EngineArg,
    #[arg(
        long = "top-k",
        value_parser = parse_positive_usize,
        help = "Songs kept per partition [default: 50]"
    )]
    top_k: Option<usize>,
    #[arg(
        long = "chunk-size",
        value_parser = parse_positive_usize,
        help = "Rows ingested per chunk by the streaming engine [default: 100]"
    )]
    chunk_size: Option<usize>,
    #[arg(
        long = "max-threads",
        value_parser = parse_positive_usize,
        help = "Worker threads used for ranking [streaming default: 1]"
    )]
    max_threads: Option<usize>,
    #[arg(
        long = "spill-threshold",
        value_parser = parse_positive_usize,
        help = "Distinct groups kept in memory before the streaming engine spills to disk"
    )]
    spill_threshold: Option<usize>,
}

impl TopSongsCli {
    fn execution_config(&self) -> ExecutionConfig {
        let mut config = match Strategy::from(self.engine) {
            Strategy::Eager => ExecutionConfig::eager(),
            Strategy::Streaming => ExecutionConfig::low_memory(),
        };
        if let Some(top_k) = self.top_k {
            config = config.with_top_k(top_k);
        }
        if let Some(chunk_size) = self.chunk_size {
            config = config.with_chunk_size(chunk_size);
        }
        if self.max_threads.is_some() {
            config = config.with_worker_threads(self.max_threads);
        }
        if let Some(spill_threshold) = self.spill_threshold {
            config = config.with_spill_threshold(spill_threshold);
        }
        config
    }
}

/// Parse command-line arguments (without the program name) and run the pipeline.
///
/// `--help` prints usage and returns `Ok(())`.
pub fn run_cli<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    let Some(cli) =
        parse_cli::<TopSongsCli, _>(std::iter::once("top_songs".to_string()).chain(args_iter))?
    else {
        return Ok(());
    };

    let config = cli.execution_config();
    let summary = pipeline::run(&cli.file_name, &cli.output_folder, &config)?;
    println!(
        "{} run complete: {} country charts + {} user rows written to {} (date={})",
        summary.strategy.name(),
        summary.country_artifacts,
        summary.user_rows,
        cli.output_folder.display(),
        summary.date
    );
    Ok(())
}

fn parse_positive_usize(raw: &str) -> Result<usize, String> {
    let parsed = raw
        .parse::<usize>()
        .map_err(|_| format!("Could not parse '{}' as a positive integer", raw))?;
    if parsed == 0 {
        return Err("value must be greater than zero".to_string());
    }
    Ok(parsed)
}

fn parse_cli<T, I>(args: I) -> Result<Option<T>, Box<dyn Error>>
where
    T: Parser,
    I: IntoIterator,
    I::Item: Into<std::ffi::OsString> + Clone,
{
    match T::try_parse_from(args) {
        Ok(cli) => Ok(Some(cli)),
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                err.print()?;
                Ok(None)
            }
            _ => Err(err.into()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn parse(args: &[&str]) -> TopSongsCli {
        parse_cli::<TopSongsCli, _>(std::iter::once("top_songs").chain(args.iter().copied()))
            .unwrap()
            .unwrap()
    }

    #[test]
    fn legacy_engine_names_map_to_strategies() {
        let cli = parse(&["--file-name", "a-1.log", "--output-folder", "out", "--engine", "Pandas"]);
        assert_eq!(cli.execution_config().strategy, Strategy::Eager);
        let cli = parse(&["--file-name", "a-1.log", "--output-folder", "out", "--engine", "polars"]);
        let config = cli.execution_config();
        assert_eq!(config.strategy, Strategy::Streaming);
        assert_eq!(config.worker_threads, Some(1));
    }

    #[test]
    fn overrides_are_applied() {
        let cli = parse(&[
            "--file-name",
            "a-1.log",
            "--output-folder",
            "out",
            "--engine",
            "streaming",
            "--top-k",
            "10",
            "--chunk-size",
            "500",
            "--max-threads",
            "2",
            "--spill-threshold",
            "64",
        ]);
        let config = cli.execution_config();
        assert_eq!(config.top_k, 10);
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.worker_threads, Some(2));
        assert_eq!(config.spill_threshold, 64);
    }

    #[test]
    fn rejects_zero_and_unknown_values() {
        let base = ["--file-name", "a-1.log", "--output-folder", "out"];
        let zero = parse_cli::<TopSongsCli, _>(
            std::iter::once("top_songs")
                .chain(base)
                .chain(["--engine", "eager", "--top-k", "0"]),
        );
        assert!(zero.is_err());
        let unknown = parse_cli::<TopSongsCli, _>(
            std::iter::once("top_songs")
                .chain(base)
                .chain(["--engine", "spark"]),
        );
        assert!(unknown.is_err());
    }

    #[test]
    fn help_returns_ok_without_running() {
        assert!(run_cli(["--help".to_string()].into_iter()).is_ok());
    }

    #[test]
    fn run_cli_writes_artifacts() {
        let temp = tempdir().unwrap();
        let input = temp.path().join("sample_data-20230101.log");
        std::fs::write(&input, "S1|U1|US\n").unwrap();
        let out = temp.path().join("out");
        let args = [
            "--file-name".to_string(),
            input.display().to_string(),
            "--output-folder".to_string(),
            out.display().to_string(),
            "--engine".to_string(),
            "streaming".to_string(),
        ];
        run_cli(args.into_iter()).unwrap();
        assert_eq!(
            std::fs::read_to_string(out.join("US_top50_20230101.txt")).unwrap(),
            "US|S1:1,"
        );
        assert!(out.join("users_top50_20230101.csv").exists());
    }
}
