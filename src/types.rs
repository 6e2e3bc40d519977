use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Record layout understood by the index header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    #[default]
    Generic,
    Sam,
    Vcf,
}

impl FileFormat {
    pub fn code(&self) -> i32 {
        match self {
            FileFormat::Generic => 0,
            FileFormat::Sam => 1,
            FileFormat::Vcf => 2,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(FileFormat::Generic),
            1 => Some(FileFormat::Sam),
            2 => Some(FileFormat::Vcf),
            _ => None,
        }
    }
}

/// Column layouts for common genomic formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    #[default]
    Gff,
    Bed,
    Sam,
    Vcf,
}

/// A region string split into its parts.
///
/// `start` and `end` are 0-based half-open; `None` means the start or end
/// of the contig.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub reference_name: String,
    pub start: Option<u64>,
    pub end: Option<u64>,
}

impl Region {
    /// Whole-contig region
    pub fn whole(reference_name: impl Into<String>) -> Self {
        Self {
            reference_name: reference_name.into(),
            start: None,
            end: None,
        }
    }

    /// Parses `contig`, `contig:begin` or `contig:begin-end`.
    ///
    /// Positions are 1-based and inclusive, as printed by genome browsers,
    /// and may contain `,` separators. `chr1:100-200` is `[99, 200)`.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidRegion("empty region".to_string()));
        }

        let Some((name, range)) = s.rsplit_once(':') else {
            return Ok(Self::whole(s));
        };
        if name.is_empty() {
            return Err(Error::InvalidRegion(format!("missing contig name in '{}'", s)));
        }

        let (begin, end) = match range.split_once('-') {
            Some((begin, end)) => (begin, Some(end)),
            None => (range, None),
        };

        let begin = parse_position(begin, s)?;
        let start = begin.saturating_sub(1);
        let end = match end {
            Some(end) if !end.trim().is_empty() => Some(parse_position(end, s)?),
            _ => None,
        };

        Ok(Self {
            reference_name: name.to_string(),
            start: Some(start),
            end,
        })
    }
}

fn parse_position(s: &str, region: &str) -> Result<u64> {
    let digits: String = s.trim().chars().filter(|&c| c != ',').collect();
    digits
        .parse()
        .map_err(|_| Error::InvalidRegion(format!("invalid position '{}' in '{}'", s, region)))
}

/// Per-contig summary, as listed by `tabixr contigs`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContigSummary {
    pub id: usize,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<u64>,
    pub bins: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bounded_region() {
        let region = Region::parse("chr1:120-160").unwrap();
        assert_eq!(region.reference_name, "chr1");
        assert_eq!(region.start, Some(119));
        assert_eq!(region.end, Some(160));
    }

    #[test]
    fn test_parse_open_ended_region() {
        let region = Region::parse("chr2:1,000").unwrap();
        assert_eq!(region.start, Some(999));
        assert_eq!(region.end, None);

        let region = Region::parse("chr2:1,000-").unwrap();
        assert_eq!(region.end, None);
    }

    #[test]
    fn test_parse_whole_contig() {
        assert_eq!(Region::parse("chrX").unwrap(), Region::whole("chrX"));
    }

    #[test]
    fn test_parse_zero_start_clamps() {
        let region = Region::parse("chr1:0-10").unwrap();
        assert_eq!(region.start, Some(0));
    }

    #[test]
    fn test_parse_invalid_regions() {
        assert!(matches!(Region::parse(""), Err(Error::InvalidRegion(_))));
        assert!(matches!(Region::parse(":1-2"), Err(Error::InvalidRegion(_))));
        assert!(matches!(Region::parse("chr1:abc"), Err(Error::InvalidRegion(_))));
        assert!(matches!(Region::parse("chr1:1-x"), Err(Error::InvalidRegion(_))));
    }

    #[test]
    fn test_file_format_codes() {
        for format in [FileFormat::Generic, FileFormat::Sam, FileFormat::Vcf] {
            assert_eq!(FileFormat::from_code(format.code()), Some(format));
        }
        assert_eq!(FileFormat::from_code(7), None);
    }

    #[test]
    fn test_preset_serialization() {
        assert_eq!(serde_json::to_string(&Preset::Bed).unwrap(), "\"bed\"");
    }
}
