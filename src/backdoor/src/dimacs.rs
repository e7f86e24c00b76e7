/*****************************************************************************************[dimacs.rs]
Copyright (c) 2018-2018, Masaki Hara

Permission is hereby granted, free of charge, to any person obtaining a copy of this software and
associated documentation files (the "Software"), to deal in the Software without restriction,
including without limitation the rights to use, copy, modify, merge, publish, distribute,
sublicense, and/or sell copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:

The above copyright notice and this permission notice shall be included in all copies or
substantial portions of the Software.

THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING BUT
NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT
OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.
**************************************************************************************************/

use {
    crate::{
        clause::{Clause, Lit},
        error::{Error, Result},
    },
    flate2::bufread::GzDecoder,
    std::{
        collections::HashSet,
        fs::{self, File},
        io::{self, BufRead, BufReader, BufWriter, Write},
        path::Path,
    },
};

/// A CNF formula with a membership index over its canonical clauses.
#[derive(Clone, Debug, Default)]
pub struct Cnf {
    num_vars: u32,
    clauses: Vec<Clause>,
    index: HashSet<Clause>,
}

impl Cnf {
    pub fn new() -> Self {
        Cnf::default()
    }

    pub fn num_vars(&self) -> u32 {
        self.num_vars
    }

    pub fn num_clauses(&self) -> usize {
        self.clauses.len()
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn contains(&self, c: &Clause) -> bool {
        self.index.contains(c)
    }

    /// Make sure variables up to `n` are declared.
    pub fn reserve_vars(&mut self, n: u32) {
        self.num_vars = self.num_vars.max(n);
    }

    /// Append `c` even if an equal clause is already present.
    pub fn push(&mut self, c: Clause) {
        if let Some(max) = c.lits().iter().map(|l| l.var().id()).max() {
            self.reserve_vars(max);
        }
        self.index.insert(c.clone());
        self.clauses.push(c);
    }

    /// Append `c` unless an equal clause is already present.
    /// Returns `true` if the clause was added.
    pub fn add_clause(&mut self, c: Clause) -> bool {
        if self.index.contains(&c) {
            false
        } else {
            self.push(c);
            true
        }
    }

    /// Write the formula in DIMACS format.
    pub fn write<W: Write>(&self, out: &mut W) -> io::Result<()> {
        self.write_with_units(out, &[])
    }

    /// Write the formula followed by the unit clauses `units`.
    pub fn write_with_units<W: Write>(&self, out: &mut W, units: &[Lit]) -> io::Result<()> {
        let num_vars = units
            .iter()
            .map(|l| l.var().id())
            .fold(self.num_vars, u32::max);
        writeln!(out, "p cnf {} {}", num_vars, self.clauses.len() + units.len())?;
        for c in &self.clauses {
            writeln!(out, "{}", c)?;
        }
        for u in units {
            writeln!(out, "{} 0", u)?;
        }
        Ok(())
    }

    /// Write the formula to `path` through a temporary file and a rename, so
    /// readers never observe a partially written formula.
    pub fn write_file(&self, path: &Path) -> io::Result<()> {
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        {
            let mut out = BufWriter::new(File::create(&tmp)?);
            self.write(&mut out)?;
            out.flush()?;
        }
        fs::rename(&tmp, path)
    }
}

/// Open `path` for reading, transparently decompressing gzip content.
pub fn open_autogz(path: &Path) -> io::Result<Box<dyn BufRead>> {
    let mut input = BufReader::new(File::open(path)?);
    let is_gz = input.fill_buf()?.starts_with(b"\x1F\x8B");
    if is_gz {
        Ok(Box::new(BufReader::new(GzDecoder::new(input))))
    } else {
        Ok(Box::new(input))
    }
}

/// Parse the DIMACS file at `path` (possibly gzipped).
pub fn parse_file(path: &Path, is_strict: bool) -> Result<Cnf> {
    let mut input = open_autogz(path)?;
    parse(&mut input, is_strict).map_err(|e| match e {
        Error::Format(msg) => Error::Format(format!("{}: {}", path.display(), msg)),
        e => e,
    })
}

/// `parse(input, is_strict)` reads a DIMACS formula.
///
/// ## Params
/// - `is_strict` if true, will fail if number of clauses does not match the declared header
pub fn parse<R: BufRead>(input: &mut R, is_strict: bool) -> Result<Cnf> {
    let mut cnf = Cnf::new();
    let mut ints = vec![];
    let mut num_clauses = None;
    loop {
        skip_whitespace(input)?;
        let ch = next_byte(input)?;
        if ch == Some(b'p') {
            let mut header = [0; 5];
            input.read_exact(&mut header)?;
            if &header != b"p cnf" {
                return Err(Error::format("unexpected char: p"));
            }
            let num_vars = parse_int(input)?;
            let n = parse_int(input)?;
            if num_vars < 0 || n < 0 {
                return Err(Error::format("negative count in DIMACS header"));
            }
            cnf.reserve_vars(num_vars as u32);
            num_clauses = Some(n as usize);
        } else if ch == Some(b'c') {
            skip_line(input)?;
        } else if let Some(_) = ch {
            read_clause(input, &mut ints)?;
            cnf.push(Clause::from_dimacs(&ints)?);
        } else {
            break;
        }
    }
    if let Some(n) = num_clauses {
        if is_strict && n != cnf.num_clauses() {
            return Err(Error::format(format!(
                "DIMACS header mismatch: {} clauses declared, {} read",
                n,
                cnf.num_clauses()
            )));
        }
    }
    Ok(cnf)
}

fn read_clause<R: BufRead>(input: &mut R, ints: &mut Vec<i32>) -> Result<()> {
    ints.clear();
    loop {
        let parsed_lit = parse_int(input)?;
        if parsed_lit == 0 {
            return Ok(());
        }
        ints.push(parsed_lit);
    }
}

fn parse_int<R: BufRead>(input: &mut R) -> Result<i32> {
    skip_whitespace(input)?;
    let ch = next_byte(input)?;
    let neg = if ch == Some(b'+') || ch == Some(b'-') {
        input.consume(1);
        ch == Some(b'-')
    } else {
        false
    };
    if let Some(ch) = next_byte(input)? {
        if !(b'0' <= ch && ch <= b'9') {
            return Err(Error::format(format!("unexpected char: {}", ch as char)));
        }
    } else {
        return Err(Error::format("unexpected EOF"));
    };
    let mut val: i64 = 0;
    while let Some(ch) = next_byte(input)? {
        if !(b'0' <= ch && ch <= b'9') {
            break;
        }
        input.consume(1);
        val = val * 10 + (ch - b'0') as i64;
        if val > i32::MAX as i64 {
            return Err(Error::format("integer out of range"));
        }
    }
    Ok(if neg { -val as i32 } else { val as i32 })
}

#[inline(always)]
fn is_whitespace(ch: Option<u8>) -> bool {
    ch.map(|ch| b'\x09' <= ch && ch <= b'\x0d' || ch == b' ')
        .unwrap_or(false)
}

fn skip_whitespace<R: BufRead>(input: &mut R) -> io::Result<()> {
    while is_whitespace(next_byte(input)?) {
        input.consume(1);
    }
    Ok(())
}

fn skip_line<R: BufRead>(input: &mut R) -> io::Result<()> {
    loop {
        if let Some(ch) = next_byte(input)? {
            input.consume(1);
            if ch == b'\n' {
                return Ok(());
            }
        } else {
            return Ok(());
        }
    }
}

fn next_byte<R: BufRead>(input: &mut R) -> io::Result<Option<u8>> {
    Ok(input.fill_buf()?.first().map(|&ch| ch))
}

/// Write clauses one per line, DIMACS style, without header.
pub fn write_clauses<'a, W, I, C>(out: &mut W, clauses: I) -> io::Result<()>
where
    W: Write,
    I: IntoIterator<Item = &'a C>,
    C: AsRef<[Lit]> + ?Sized + 'a,
{
    for c in clauses {
        for lit in c.as_ref() {
            write!(out, "{} ", lit)?;
        }
        writeln!(out, "0")?;
    }
    Ok(())
}

/// Parse a line of whitespace-separated literals, such as a witness assignment.
/// A `0` may only come last.
pub fn parse_lits(line: &str) -> Result<Vec<Lit>> {
    let mut lits = vec![];
    let mut toks = line.split_whitespace();
    while let Some(tok) = toks.next() {
        let i: i32 = tok
            .parse()
            .map_err(|_| Error::format(format!("invalid literal `{}`", tok)))?;
        if i == 0 {
            if toks.next().is_none() {
                break;
            }
            return Err(Error::format(format!(
                "literals after the terminating 0 in `{}`",
                line.trim()
            )));
        }
        match Lit::from_dimacs(i) {
            Some(lit) => lits.push(lit),
            None => return Err(Error::format(format!("invalid literal `{}`", tok))),
        }
    }
    Ok(lits)
}

#[cfg(test)]
mod test {
    use super::*;

    const SMALL: &str = "c a comment\np cnf 4 3\n1 -2 0\n-1 3\n 4 0\nc trailing\n2 0\n";

    #[test]
    fn test_parse() {
        let cnf = parse(&mut SMALL.as_bytes(), true).unwrap();
        assert_eq!(cnf.num_vars(), 4);
        assert_eq!(cnf.num_clauses(), 3);
        assert_eq!(cnf.clauses()[1], Clause::from_dimacs(&[-1, 3, 4]).unwrap());
        assert!(cnf.contains(&Clause::from_dimacs(&[2]).unwrap()));
    }

    #[test]
    fn test_strict_header() {
        let input = "p cnf 2 3\n1 2 0\n";
        assert!(parse(&mut input.as_bytes(), false).is_ok());
        assert!(matches!(
            parse(&mut input.as_bytes(), true),
            Err(Error::Format(_))
        ));
        assert!(parse(&mut "p cnf 2 1\n1 x 0\n".as_bytes(), false).is_err());
    }

    #[test]
    fn test_write_round_trip() {
        let mut cnf = parse(&mut SMALL.as_bytes(), true).unwrap();
        assert!(!cnf.add_clause(Clause::from_dimacs(&[-2, 1]).unwrap()));
        assert!(cnf.add_clause(Clause::from_dimacs(&[-7]).unwrap()));
        assert_eq!(cnf.num_vars(), 7);

        let mut out = vec![];
        cnf.write(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "p cnf 7 4\n1 -2 0\n-1 3 4 0\n2 0\n-7 0\n");

        let again = parse(&mut text.as_bytes(), true).unwrap();
        assert_eq!(again.clauses(), cnf.clauses());
    }

    #[test]
    fn test_write_with_units() {
        let cnf = parse(&mut "p cnf 2 1\n1 2 0\n".as_bytes(), true).unwrap();
        let mut out = vec![];
        let units = vec![Lit::from_dimacs(-1).unwrap(), Lit::from_dimacs(3).unwrap()];
        cnf.write_with_units(&mut out, &units).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "p cnf 3 3\n1 2 0\n-1 0\n3 0\n");
    }

    #[test]
    fn test_parse_lits() {
        let lits = parse_lits("1 -2 3 0\n").unwrap();
        assert_eq!(lits.len(), 3);
        assert_eq!(lits[1].to_dimacs(), -2);
        assert!(parse_lits("1 a").is_err());
        assert_eq!(parse_lits("-4 5").unwrap().len(), 2);
        assert!(parse_lits("1 0 2 0").is_err());
        assert!(parse_lits("1 0 0").is_err());
    }
}
