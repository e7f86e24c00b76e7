/*****************************************************************************************[minimize.rs]
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

//! Two-level minimization of a disjunction of cubes.

use {
    crate::{
        error::{Error, Result},
        external::run_captured,
    },
    std::{collections::HashSet, fmt::Write},
    subprocess::Exec,
};

/// A conjunction over `k` inputs: `Some(true)` for a positive literal,
/// `Some(false)` for a negative one, `None` if the input does not occur.
pub type Cube = Vec<Option<bool>>;

/// Boolean minimizer: turns a cover (a disjunction of cubes) into an
/// equivalent, smaller one.
pub trait Minimizer {
    /// Minimize the cover `cubes` over `num_inputs` inputs.
    ///
    /// The result must be logically equivalent to the input.
    fn minimize(&mut self, num_inputs: usize, cubes: &[Cube]) -> Result<Vec<Cube>>;
}

impl<M: Minimizer + ?Sized> Minimizer for Box<M> {
    fn minimize(&mut self, num_inputs: usize, cubes: &[Cube]) -> Result<Vec<Cube>> {
        (**self).minimize(num_inputs, cubes)
    }
}

/// Returns the cover unchanged, minus duplicates.
#[derive(Clone, Copy, Debug, Default)]
pub struct Passthrough;

impl Minimizer for Passthrough {
    fn minimize(&mut self, _num_inputs: usize, cubes: &[Cube]) -> Result<Vec<Cube>> {
        let mut seen = HashSet::new();
        Ok(cubes
            .iter()
            .filter(|c| seen.insert(*c))
            .cloned()
            .collect())
    }
}

/// Runs the `espresso` logic minimizer on a PLA document.
#[derive(Clone, Debug)]
pub struct Espresso {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for Espresso {
    fn default() -> Self {
        Espresso {
            program: "espresso".to_string(),
            args: vec![],
        }
    }
}

impl Espresso {
    pub fn new(program: &str) -> Self {
        Espresso {
            program: program.to_string(),
            ..Default::default()
        }
    }
}

impl Minimizer for Espresso {
    fn minimize(&mut self, num_inputs: usize, cubes: &[Cube]) -> Result<Vec<Cube>> {
        if cubes.is_empty() {
            return Ok(vec![]);
        }
        let pla = to_pla(num_inputs, cubes)?;
        let exec = Exec::cmd(&self.program).args(self.args.as_slice()).stdin(pla.as_str());
        let out = run_captured(exec, &self.program)?;
        parse_pla(num_inputs, &out.stdout_str()).map_err(|e| Error::External {
            program: self.program.clone(),
            status: e.to_string(),
            stdout: out.stdout_str(),
            stderr: out.stderr_str(),
        })
    }
}

/// Single-output PLA document for the ON-set `cubes`.
pub fn to_pla(num_inputs: usize, cubes: &[Cube]) -> Result<String> {
    let mut s = String::new();
    let _ = writeln!(s, ".i {}\n.o 1\n.p {}", num_inputs, cubes.len());
    for c in cubes {
        if c.len() != num_inputs {
            return Err(Error::options(format!(
                "cube of width {} in a cover over {} inputs",
                c.len(),
                num_inputs
            )));
        }
        for x in c {
            s.push(match x {
                Some(true) => '1',
                Some(false) => '0',
                None => '-',
            });
        }
        s.push_str(" 1\n");
    }
    s.push_str(".e\n");
    Ok(s)
}

/// Read the cubes of a single-output PLA cover. Directives are skipped.
pub fn parse_pla(num_inputs: usize, text: &str) -> Result<Vec<Cube>> {
    let mut cubes = vec![];
    for line in text.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('.') || line.starts_with('#') {
            continue;
        }
        let mut toks = line.split_whitespace();
        let inputs = toks.next().unwrap_or("");
        match toks.next() {
            Some("1") => (),
            Some("0") | Some("-") | Some("~") => continue,
            _ => return Err(Error::format(format!("bad PLA line `{}`", line))),
        }
        if inputs.len() != num_inputs {
            return Err(Error::format(format!(
                "PLA cube `{}` does not have {} inputs",
                inputs, num_inputs
            )));
        }
        let cube = inputs
            .chars()
            .map(|ch| match ch {
                '1' => Ok(Some(true)),
                '0' => Ok(Some(false)),
                '-' | '2' => Ok(None),
                _ => Err(Error::format(format!("bad PLA input `{}`", ch))),
            })
            .collect::<Result<Cube>>()?;
        cubes.push(cube);
    }
    Ok(cubes)
}

#[cfg(test)]
mod test {
    use super::*;

    fn cube(s: &str) -> Cube {
        s.chars()
            .map(|ch| match ch {
                '1' => Some(true),
                '0' => Some(false),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_to_pla() {
        let pla = to_pla(3, &[cube("10-"), cube("011")]).unwrap();
        assert_eq!(pla, ".i 3\n.o 1\n.p 2\n10- 1\n011 1\n.e\n");
        assert!(to_pla(2, &[cube("101")]).is_err());
    }

    #[test]
    fn test_parse_pla() {
        let out = ".i 3\n.o 1\n.p 2\n1-- 1\n-01 1\n.e\n";
        assert_eq!(
            parse_pla(3, out).unwrap(),
            vec![cube("1--"), cube("-01")]
        );
        assert!(parse_pla(3, "1- 1\n").is_err());
        assert!(parse_pla(2, "1x 1\n").is_err());
        assert!(parse_pla(2, ".p 0\n.e\n").unwrap().is_empty());
    }

    #[test]
    fn test_passthrough() {
        let mut m = Passthrough;
        let cubes = vec![cube("10"), cube("11"), cube("10")];
        assert_eq!(m.minimize(2, &cubes).unwrap(), vec![cube("10"), cube("11")]);
    }

    #[test]
    fn test_espresso_skips_empty_cover() {
        let mut m = Espresso::new("/nonexistent/espresso");
        assert!(m.minimize(4, &[]).unwrap().is_empty());
        assert!(matches!(
            m.minimize(1, &[cube("1")]),
            Err(Error::External { .. })
        ));
    }
}
