
//! Binary DRAT proofs
//!
//! A record is an opcode byte (`a` or `d`) followed by the literals of the
//! clause, each encoded as an unsigned LEB128 varint of `2*|lit| + (lit < 0)`,
//! and terminated by the value `0`.

use {
    crate::{
        callbacks::Callbacks,
        clause::{Clause, Lit},
        error::{Error, Result},
    },
    std::io::{self, BufRead, Write},
};

/// Whether a record adds or deletes its clause.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mode {
    Added,
    Deleted,
}

impl Mode {
    pub fn opcode(self) -> u8 {
        match self {
            Mode::Added => b'a',
            Mode::Deleted => b'd',
        }
    }

    pub fn from_opcode(b: u8) -> Option<Self> {
        match b {
            b'a' => Some(Mode::Added),
            b'd' => Some(Mode::Deleted),
            _ => None,
        }
    }
}

/// Unsigned value carried by `lit` in the binary format.
#[inline]
pub fn encode_lit(lit: Lit) -> u64 {
    let i = lit.to_dimacs();
    2 * (i.unsigned_abs() as u64) + (i < 0) as u64
}

/// Literal carried by the value `u`, `None` for the terminator.
fn decode_lit(u: u64) -> Result<Option<Lit>> {
    if u == 0 {
        return Ok(None);
    }
    let mag = u >> 1;
    if mag == 0 || mag > i32::MAX as u64 {
        return Err(Error::format(format!("invalid literal encoding {}", u)));
    }
    let i = mag as i32;
    Ok(Lit::from_dimacs(if u & 1 == 1 { -i } else { i }))
}

fn write_varint<W: Write>(out: &mut W, mut u: u64) -> io::Result<()> {
    let mut buf = [0u8; 10];
    let mut n = 0;
    loop {
        let byte = (u & 0x7f) as u8;
        u >>= 7;
        if u == 0 {
            buf[n] = byte;
            n += 1;
            break;
        }
        buf[n] = byte | 0x80;
        n += 1;
    }
    out.write_all(&buf[..n])
}

/// Write one binary record.
pub fn write_record<W: Write>(out: &mut W, mode: Mode, lits: &[Lit]) -> io::Result<()> {
    out.write_all(&[mode.opcode()])?;
    for &lit in lits {
        write_varint(out, encode_lit(lit))?;
    }
    out.write_all(&[0])
}

/// Binary proof recording structure.
pub struct ProofWriter<W: Write> {
    out: W,
    n_records: u64,
}

impl<W: Write> ProofWriter<W> {
    /// New proof recording structure.
    pub fn new(out: W) -> Self {
        ProofWriter { out, n_records: 0 }
    }

    /// Register clause creation.
    pub fn add_clause(&mut self, lits: &[Lit]) -> io::Result<()> {
        self.n_records += 1;
        write_record(&mut self.out, Mode::Added, lits)
    }

    /// Register clause deletion.
    pub fn delete_clause(&mut self, lits: &[Lit]) -> io::Result<()> {
        self.n_records += 1;
        write_record(&mut self.out, Mode::Deleted, lits)
    }

    pub fn num_records(&self) -> u64 {
        self.n_records
    }

    pub fn into_inner(mut self) -> io::Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

/// Lazy, single-pass decoder over a binary proof.
///
/// Yields `(mode, literals)` pairs, literals in stream order. With a maximum
/// size set, records with more literals are skipped without buffering their
/// tail.
pub struct ProofReader<R> {
    input: R,
    offset: u64,
    max_size: Option<usize>,
    n_dropped: u64,
    lits: Vec<Lit>,
    failed: bool,
}

impl<R: BufRead> ProofReader<R> {
    pub fn new(input: R) -> Self {
        ProofReader {
            input,
            offset: 0,
            max_size: None,
            n_dropped: 0,
            lits: vec![],
            failed: false,
        }
    }

    /// Skip records with more than `max` literals.
    pub fn with_max_size(mut self, max: Option<usize>) -> Self {
        self.max_size = max;
        self
    }

    /// Number of bytes consumed so far.
    pub fn bytes_read(&self) -> u64 {
        self.offset
    }

    /// Number of records skipped because of the size filter.
    pub fn num_dropped(&self) -> u64 {
        self.n_dropped
    }

    fn next_byte(&mut self) -> io::Result<Option<u8>> {
        let b = self.input.fill_buf()?.first().copied();
        if b.is_some() {
            self.input.consume(1);
            self.offset += 1;
        }
        Ok(b)
    }

    fn read_value(&mut self) -> Result<u64> {
        let mut value: u64 = 0;
        let mut shift = 0;
        loop {
            let byte = match self.next_byte()? {
                Some(b) => b,
                None => {
                    return Err(Error::format(format!(
                        "unexpected end of proof inside a clause at byte {}",
                        self.offset
                    )))
                }
            };
            if shift > 35 {
                return Err(Error::format(format!(
                    "varint too long at byte {}",
                    self.offset
                )));
            }
            value |= ((byte & 0x7f) as u64) << shift;
            shift += 7;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
    }

    /// Read the next record; `Ok(None)` on a clean end of stream.
    /// Oversized records come back with `None` as literals.
    fn read_record(&mut self) -> Result<Option<(Mode, Option<Vec<Lit>>)>> {
        let op = match self.next_byte()? {
            None => return Ok(None),
            Some(b) => b,
        };
        let mode = match Mode::from_opcode(op) {
            Some(m) => m,
            None => {
                return Err(Error::format(format!(
                    "bad clause header {:#04x} at byte {}",
                    op,
                    self.offset - 1
                )))
            }
        };
        self.lits.clear();
        let mut oversized = false;
        while let Some(lit) = decode_lit(self.read_value()?)? {
            if oversized {
                continue;
            }
            self.lits.push(lit);
            if let Some(max) = self.max_size {
                if self.lits.len() > max {
                    oversized = true;
                    self.lits.clear();
                }
            }
        }
        if oversized {
            self.n_dropped += 1;
            Ok(Some((mode, None)))
        } else {
            Ok(Some((mode, Some(self.lits.drain(..).collect()))))
        }
    }
}

impl<R: BufRead> Iterator for ProofReader<R> {
    type Item = Result<(Mode, Vec<Lit>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            match self.read_record() {
                Ok(None) => return None,
                Ok(Some((_, None))) => continue,
                Ok(Some((mode, Some(c)))) => return Some(Ok((mode, c))),
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Options for extracting added clauses from a proof.
#[derive(Clone, Debug, Default)]
pub struct ExtractOpts {
    /// Drop clauses with more literals than this.
    pub max_size: Option<usize>,
    /// Stop after this many clauses. `Some(0)` means no limit.
    pub limit: Option<usize>,
    /// Canonicalize each clause and sort the result.
    pub sort: bool,
}

/// Result of `extract_added`.
#[derive(Debug, Default)]
pub struct Extracted {
    /// Literals of each added clause, as found in the proof unless sorted.
    pub clauses: Vec<Vec<Lit>>,
    pub num_deleted: u64,
    pub num_dropped: u64,
    pub bytes_read: u64,
    pub limit_reached: bool,
}

const PROGRESS_EVERY: u64 = 1 << 20;

/// Collect the `added` clauses of a proof. Deletions are counted and ignored.
pub fn extract_added<R, Cb>(input: R, opts: &ExtractOpts, cb: &mut Cb) -> Result<Extracted>
where
    R: BufRead,
    Cb: Callbacks + ?Sized,
{
    let mut reader = ProofReader::new(input).with_max_size(opts.max_size);
    let mut res = Extracted::default();
    let mut next_report = PROGRESS_EVERY;
    let limit = opts.limit.filter(|&n| n > 0);

    while let Some(item) = reader.next() {
        let (mode, clause) = item?;
        match mode {
            Mode::Added => res.clauses.push(clause),
            Mode::Deleted => res.num_deleted += 1,
        }
        if reader.bytes_read() >= next_report {
            cb.on_proof_progress(reader.bytes_read());
            next_report = reader.bytes_read() + PROGRESS_EVERY;
        }
        if let Some(limit) = limit {
            if res.clauses.len() >= limit {
                info!("reached limit {} of extracted clauses", limit);
                res.limit_reached = true;
                break;
            }
        }
    }
    res.num_dropped = reader.num_dropped();
    res.bytes_read = reader.bytes_read();
    cb.on_proof_done(res.bytes_read);

    debug!(
        "extracted {} clauses ({} deletions ignored, {} oversized dropped)",
        res.clauses.len(),
        res.num_deleted,
        res.num_dropped
    );
    if opts.sort {
        let mut sorted: Vec<Clause> = res.clauses.drain(..).map(Clause::new).collect();
        sorted.sort();
        res.clauses = sorted.into_iter().map(Clause::into_lits).collect();
    }
    Ok(res)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::callbacks::Basic;

    fn lits(ints: &[i32]) -> Vec<Lit> {
        ints.iter().map(|&i| Lit::from_dimacs(i).unwrap()).collect()
    }

    fn encode(records: &[(Mode, Vec<i32>)]) -> Vec<u8> {
        let mut w = ProofWriter::new(Vec::new());
        for (mode, ints) in records {
            match mode {
                Mode::Added => w.add_clause(&lits(ints)).unwrap(),
                Mode::Deleted => w.delete_clause(&lits(ints)).unwrap(),
            }
        }
        assert_eq!(w.num_records(), records.len() as u64);
        w.into_inner().unwrap()
    }

    #[test]
    fn test_lit_bytes() {
        let mut out = vec![];
        write_record(&mut out, Mode::Added, &[Lit::from_dimacs(5).unwrap()]).unwrap();
        assert_eq!(out, vec![b'a', 0x0A, 0x00]);
        out.clear();
        write_record(&mut out, Mode::Deleted, &[Lit::from_dimacs(-5).unwrap()]).unwrap();
        assert_eq!(out, vec![b'd', 0x0B, 0x00]);
        // 2*100 = 200 needs two bytes
        out.clear();
        write_record(&mut out, Mode::Added, &[Lit::from_dimacs(100).unwrap()]).unwrap();
        assert_eq!(out, vec![b'a', 0xC8, 0x01, 0x00]);
    }

    #[test]
    fn test_round_trip() {
        let records = vec![
            (Mode::Added, vec![1, -2, 3]),
            (Mode::Deleted, vec![1, -2, 3]),
            (Mode::Added, vec![-70000]),
            (Mode::Added, vec![]),
            (Mode::Added, vec![4, 5, -6, 7, 8]),
            (Mode::Added, vec![3, -1, 2, 2]),
            (Mode::Deleted, vec![9, -9, 1]),
        ];
        let bytes = encode(&records);
        let decoded: Vec<(Mode, Vec<Lit>)> = ProofReader::new(&bytes[..])
            .collect::<Result<_>>()
            .unwrap();
        let expected: Vec<(Mode, Vec<Lit>)> = records
            .iter()
            .map(|(m, ints)| (*m, lits(ints)))
            .collect();
        assert_eq!(decoded, expected);
    }

    #[test]
    fn test_bad_opcode() {
        let bytes = vec![b'a', 0x02, 0x00, b'x', 0x02, 0x00];
        let mut reader = ProofReader::new(&bytes[..]);
        assert!(reader.next().unwrap().is_ok());
        match reader.next() {
            Some(Err(Error::Format(_))) => (),
            r => panic!("expected format error, got {:?}", r),
        }
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_truncated() {
        // clause without terminator
        let bytes = vec![b'a', 0x02, 0x04];
        let r: Result<Vec<_>> = ProofReader::new(&bytes[..]).collect();
        assert!(matches!(r, Err(Error::Format(_))));

        // varint with continuation bit and nothing after
        let bytes = vec![b'a', 0x82];
        let r: Result<Vec<_>> = ProofReader::new(&bytes[..]).collect();
        assert!(matches!(r, Err(Error::Format(_))));

        // empty stream is fine
        let r: Result<Vec<_>> = ProofReader::new(&b""[..]).collect();
        assert!(r.unwrap().is_empty());
    }

    #[test]
    fn test_extract_filters() {
        let records = vec![
            (Mode::Added, vec![1, 2, 3, 4]),
            (Mode::Added, vec![-3, 1]),
            (Mode::Deleted, vec![1, 2, 3, 4]),
            (Mode::Added, vec![2]),
            (Mode::Added, vec![5, 6]),
        ];
        let bytes = encode(&records);

        let opts = ExtractOpts {
            max_size: Some(2),
            limit: None,
            sort: true,
        };
        let res = extract_added(&bytes[..], &opts, &mut Basic::new()).unwrap();
        assert_eq!(res.clauses, vec![lits(&[2]), lits(&[1, -3]), lits(&[5, 6])]);
        assert_eq!(res.num_deleted, 0);
        assert_eq!(res.num_dropped, 2);
        assert_eq!(res.bytes_read, bytes.len() as u64);

        let opts = ExtractOpts {
            max_size: None,
            limit: Some(2),
            sort: false,
        };
        let res = extract_added(&bytes[..], &opts, &mut Basic::new()).unwrap();
        assert!(res.limit_reached);
        assert_eq!(res.clauses, vec![lits(&[1, 2, 3, 4]), lits(&[-3, 1])]);
    }

    #[test]
    fn test_extract_keeps_stream_order() {
        let records = vec![(Mode::Added, vec![3, -1, 2, 2]), (Mode::Added, vec![-2, 1])];
        let bytes = encode(&records);
        let res = extract_added(&bytes[..], &ExtractOpts::default(), &mut Basic::new()).unwrap();
        assert_eq!(res.clauses, vec![lits(&[3, -1, 2, 2]), lits(&[-2, 1])]);

        let opts = ExtractOpts {
            sort: true,
            ..ExtractOpts::default()
        };
        let res = extract_added(&bytes[..], &opts, &mut Basic::new()).unwrap();
        assert_eq!(res.clauses, vec![lits(&[1, -2]), lits(&[-1, 2, 3])]);
    }

    #[test]
    fn test_zero_limit_is_unlimited() {
        let records = vec![(Mode::Added, vec![1]), (Mode::Added, vec![2]), (Mode::Added, vec![3])];
        let bytes = encode(&records);
        let opts = ExtractOpts {
            limit: Some(0),
            ..ExtractOpts::default()
        };
        let res = extract_added(&bytes[..], &opts, &mut Basic::new()).unwrap();
        assert_eq!(res.clauses.len(), 3);
        assert!(!res.limit_reached);
    }
}
