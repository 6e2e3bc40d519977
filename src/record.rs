//! Coordinate extraction from data lines.

use crate::index::Header;
use crate::types::FileFormat;

/// Contig and 0-based half-open span of one data line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordSpan<'a> {
    pub contig: &'a str,
    pub start: u64,
    pub end: u64,
}

// VCF REF and INFO, SAM CIGAR (0-based column indices)
const VCF_REF: usize = 3;
const VCF_INFO: usize = 7;
const SAM_CIGAR: usize = 5;

const OVERFLOW: &str = "coordinate overflow";

/// Comment lines start with the header's meta character
pub fn is_meta_line(header: &Header, line: &[u8]) -> bool {
    line.first() == Some(&header.meta_char)
}

/// Reads the contig, start and end of `line` as described by `header`.
///
/// Returns a short reason when the line does not carry valid coordinates.
pub fn parse_span<'a>(header: &Header, line: &'a str) -> Result<RecordSpan<'a>, &'static str> {
    let fields: Vec<&str> = line.split('\t').collect();
    let field = |column: usize| column.checked_sub(1).and_then(|i| fields.get(i)).copied();

    let contig = field(header.col_seq).ok_or("missing contig column")?;
    if contig.is_empty() {
        return Err("empty contig name");
    }

    let beg: u64 = field(header.col_beg)
        .ok_or("missing start column")?
        .parse()
        .map_err(|_| "non-numeric start")?;
    let start = if header.zero_based {
        beg
    } else {
        beg.checked_sub(1).ok_or("start is 0 in 1-based coordinates")?
    };

    let end = match header.col_end {
        Some(column) => field(column)
            .ok_or("missing end column")?
            .parse()
            .map_err(|_| "non-numeric end")?,
        None => match header.format {
            FileFormat::Vcf => vcf_end(&fields, start)?,
            FileFormat::Sam => sam_end(&fields, start)?,
            FileFormat::Generic => start.checked_add(1).ok_or(OVERFLOW)?,
        },
    };
    let min_end = start.checked_add(1).ok_or(OVERFLOW)?;

    Ok(RecordSpan {
        contig,
        start,
        end: end.max(min_end),
    })
}

/// `INFO/END` if present, otherwise the length of REF
fn vcf_end(fields: &[&str], start: u64) -> Result<u64, &'static str> {
    if let Some(info) = fields.get(VCF_INFO) {
        for entry in info.split(';') {
            if let Some(value) = entry.strip_prefix("END=") {
                return value.parse().map_err(|_| "non-numeric INFO/END");
            }
        }
    }
    let reference = fields.get(VCF_REF).ok_or("missing REF column")?;
    start.checked_add(reference.len() as u64).ok_or(OVERFLOW)
}

/// Start plus the reference span of the CIGAR
fn sam_end(fields: &[&str], start: u64) -> Result<u64, &'static str> {
    let cigar = fields.get(SAM_CIGAR).ok_or("missing CIGAR column")?;
    if *cigar == "*" {
        return start.checked_add(1).ok_or(OVERFLOW);
    }

    let mut span = 0u64;
    let mut len = 0u64;
    for c in cigar.chars() {
        match c {
            '0'..='9' => {
                len = len
                    .checked_mul(10)
                    .and_then(|n| n.checked_add(u64::from(c as u8 - b'0')))
                    .ok_or(OVERFLOW)?;
            }
            'M' | 'D' | 'N' | '=' | 'X' => {
                span = span.checked_add(len).ok_or(OVERFLOW)?;
                len = 0;
            }
            'I' | 'S' | 'H' | 'P' => len = 0,
            _ => return Err("invalid CIGAR"),
        }
    }

    start.checked_add(span).ok_or(OVERFLOW)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Preset;

    #[test]
    fn test_bed_is_zero_based_half_open() {
        let header = Header::from(Preset::Bed);
        let span = parse_span(&header, "chr1\t100\t200\tname").unwrap();
        assert_eq!((span.contig, span.start, span.end), ("chr1", 100, 200));
    }

    #[test]
    fn test_gff_is_one_based_closed() {
        let header = Header::from(Preset::Gff);
        let span = parse_span(&header, "chr1\tsrc\tgene\t101\t200\t.\t+\t.\tID=x").unwrap();
        assert_eq!((span.start, span.end), (100, 200));
    }

    #[test]
    fn test_vcf_end_from_ref_and_info() {
        let header = Header::from(Preset::Vcf);
        let span = parse_span(&header, "chr1\t10\t.\tACGT\tA\t.\tPASS\tDP=3").unwrap();
        assert_eq!((span.start, span.end), (9, 13));

        let span = parse_span(&header, "chr1\t10\t.\tA\t<DEL>\t.\tPASS\tSVTYPE=DEL;END=500").unwrap();
        assert_eq!((span.start, span.end), (9, 500));
    }

    #[test]
    fn test_sam_end_from_cigar() {
        let header = Header::from(Preset::Sam);
        let line = "read1\t0\tchr2\t100\t60\t5S10M2I3D4N\t*\t0\t0\tACGT\tIIII";
        let span = parse_span(&header, line).unwrap();
        assert_eq!(span.contig, "chr2");
        assert_eq!((span.start, span.end), (99, 99 + 17));

        let unmapped = "read2\t4\tchr2\t100\t0\t*\t*\t0\t0\tACGT\tIIII";
        assert_eq!(parse_span(&header, unmapped).unwrap().end, 100);
    }

    #[test]
    fn test_generic_without_end_column() {
        let header = Header {
            col_end: None,
            ..Header::from(Preset::Bed)
        };
        let span = parse_span(&header, "chr1\t5").unwrap();
        assert_eq!((span.start, span.end), (5, 6));
    }

    #[test]
    fn test_empty_span_widened() {
        let header = Header::from(Preset::Bed);
        let span = parse_span(&header, "chr1\t50\t50").unwrap();
        assert_eq!(span.end, 51);
    }

    #[test]
    fn test_malformed_lines() {
        let header = Header::from(Preset::Bed);
        assert_eq!(parse_span(&header, "chr1\tabc\t10"), Err("non-numeric start"));
        assert_eq!(parse_span(&header, "chr1\t1\t-"), Err("non-numeric end"));
        assert_eq!(parse_span(&header, "chr1\t1"), Err("missing end column"));
        assert_eq!(parse_span(&header, "\t1\t2"), Err("empty contig name"));

        let gff = Header::from(Preset::Gff);
        assert!(parse_span(&gff, "chr1\ts\tt\t0\t10").is_err());
    }

    #[test]
    fn test_coordinate_overflow() {
        let bed = Header::from(Preset::Bed);
        assert_eq!(
            parse_span(&bed, "chr1\t18446744073709551615\t5"),
            Err(OVERFLOW)
        );

        let sam = Header::from(Preset::Sam);
        let line = "read1\t0\tchr2\t100\t60\t99999999999999999999999M\t*\t0\t0\tA\tI";
        assert_eq!(parse_span(&sam, line), Err(OVERFLOW));

        let vcf = Header {
            zero_based: true,
            ..Header::from(Preset::Vcf)
        };
        let line = "chr1\t18446744073709551615\t.\tACGT\tA\t.\tPASS\t.";
        assert_eq!(parse_span(&vcf, line), Err(OVERFLOW));
    }
}
