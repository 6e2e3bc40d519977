use crate::index::Header;
use crate::types::Preset;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "tabixr")]
#[command(about = "Index and query BGZF-compressed, position-sorted tab-delimited files")]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Compress a plain text file into BGZF
    Compress {
        /// Input file
        input: PathBuf,

        /// Output file (defaults to the input path with `.gz` appended)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite an existing output file
        #[arg(short, long)]
        force: bool,
    },

    /// Build a .tbi index for a BGZF-compressed file
    Index(IndexArgs),

    /// Print records overlapping one or more regions
    Query {
        /// BGZF-compressed data file
        file: PathBuf,

        /// Regions as `contig`, `contig:begin` or `contig:begin-end` (1-based)
        #[arg(required = true)]
        regions: Vec<String>,

        /// Index file (defaults to the co-located .tbi)
        #[arg(long)]
        index: Option<PathBuf>,
    },

    /// Print the header lines of a data file
    Header {
        file: PathBuf,

        #[arg(long)]
        index: Option<PathBuf>,
    },

    /// List the contigs in the index
    Contigs {
        file: PathBuf,

        #[arg(long)]
        index: Option<PathBuf>,

        /// Emit JSON instead of tab-separated text
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Args)]
pub struct IndexArgs {
    /// BGZF-compressed data file
    pub file: PathBuf,

    /// Column layout preset
    #[arg(short, long, value_enum)]
    pub preset: Option<Preset>,

    /// Column of the contig name (1-based)
    #[arg(short = 's', long, value_parser = clap::value_parser!(u32).range(1..))]
    pub sequence: Option<u32>,

    /// Column of the start coordinate (1-based)
    #[arg(short = 'b', long, value_parser = clap::value_parser!(u32).range(1..))]
    pub begin: Option<u32>,

    /// Column of the end coordinate (1-based); 0 means no end column
    #[arg(short = 'e', long)]
    pub end: Option<u32>,

    /// Prefix of comment lines (a single ASCII character)
    #[arg(short = 'c', long, value_parser = parse_meta_char)]
    pub comment: Option<u8>,

    /// Number of leading lines to skip
    #[arg(short = 'S', long)]
    pub skip: Option<u32>,

    /// Coordinates are 0-based half-open
    #[arg(long)]
    pub zero_based: bool,

    /// Overwrite an existing index
    #[arg(short, long)]
    pub force: bool,
}

impl IndexArgs {
    /// Preset layout with any explicit column options applied on top
    pub fn header(&self) -> Header {
        let mut header = Header::from(self.preset.unwrap_or_default());

        if let Some(col) = self.sequence {
            header.col_seq = col as usize;
        }
        if let Some(col) = self.begin {
            header.col_beg = col as usize;
        }
        if let Some(col) = self.end {
            header.col_end = (col > 0).then_some(col as usize);
        }
        if let Some(c) = self.comment {
            header.meta_char = c;
        }
        if let Some(skip) = self.skip {
            header.skip_lines = skip;
        }
        if self.zero_based {
            header.zero_based = true;
        }

        header
    }
}

fn parse_meta_char(s: &str) -> Result<u8, String> {
    match s.as_bytes() {
        [c] if c.is_ascii() => Ok(*c),
        _ => Err(format!("expected a single ASCII character, got '{}'", s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FileFormat;

    fn parse(args: &[&str]) -> Config {
        Config::try_parse_from(args).unwrap()
    }

    fn index_args(config: Config) -> IndexArgs {
        match config.command {
            Command::Index(args) => args,
            other => panic!("expected index command, got {:?}", other),
        }
    }

    #[test]
    fn test_index_defaults_to_gff() {
        let args = index_args(parse(&["tabixr", "index", "data.gff.gz"]));
        assert_eq!(args.header(), Header::from(Preset::Gff));
    }

    #[test]
    fn test_index_preset_with_overrides() {
        let args = index_args(parse(&[
            "tabixr", "index", "data.txt.gz", "-p", "bed", "-s", "2", "-b", "3", "-e", "0", "-c",
            "%", "-S", "2",
        ]));
        let header = args.header();
        assert_eq!(header.format, FileFormat::Generic);
        assert!(header.zero_based);
        assert_eq!((header.col_seq, header.col_beg, header.col_end), (2, 3, None));
        assert_eq!(header.meta_char, b'%');
        assert_eq!(header.skip_lines, 2);
    }

    #[test]
    fn test_zero_column_rejected() {
        assert!(Config::try_parse_from(["tabixr", "index", "x.gz", "-s", "0"]).is_err());
    }

    #[test]
    fn test_non_ascii_comment_rejected() {
        assert!(Config::try_parse_from(["tabixr", "index", "x.gz", "-c", "é"]).is_err());
        assert!(Config::try_parse_from(["tabixr", "index", "x.gz", "-c", "##"]).is_err());

        let args = index_args(parse(&["tabixr", "index", "x.gz", "-c", ";"]));
        assert_eq!(args.header().meta_char, b';');
    }

    #[test]
    fn test_query_requires_region() {
        assert!(Config::try_parse_from(["tabixr", "query", "x.gz"]).is_err());

        let config = parse(&["tabixr", "query", "x.gz", "chr1:1-10", "chr2"]);
        match config.command {
            Command::Query { regions, index, .. } => {
                assert_eq!(regions, vec!["chr1:1-10", "chr2"]);
                assert_eq!(index, None);
            }
            other => panic!("expected query command, got {:?}", other),
        }
    }

    #[test]
    fn test_log_level_flag() {
        let config = parse(&["tabixr", "--log-level", "debug", "contigs", "x.gz", "--json"]);
        assert_eq!(config.log_level, "debug");
    }
}
