/*****************************************************************************************[queue.rs]
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

//! Shared clause queues.
//!
//! A channel is an append-only sequence of records addressed by index,
//! starting from 0. A missing index means the record is not available yet.

use {
    crate::{
        clause::Clause,
        dimacs::parse_lits,
        drat::Mode,
        error::{Error, Result},
    },
    std::{
        collections::HashMap,
        fmt,
        fs::{self, File, OpenOptions},
        io::{self, BufRead, BufReader, Seek, SeekFrom, Write},
        path::{Path, PathBuf},
        str::FromStr,
    },
};

/// Channel written by the solving process.
pub const LEARNED_CHANNEL: &str = "from_minisat";
/// Channel read by the solving process.
pub const DERIVED_CHANNEL: &str = "to_minisat";

/// Layout of a channel in the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Encoding {
    /// One value per index, under the key `<channel>:<index>`.
    Scalar,
    /// One list per channel, indexed by position.
    List,
}

impl FromStr for Encoding {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "scalar" => Ok(Encoding::Scalar),
            "list" => Ok(Encoding::List),
            _ => Err(Error::options(format!("unknown queue encoding `{}`", s))),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Encoding::Scalar => "scalar",
            Encoding::List => "list",
        })
    }
}

/// One queue record: `d <lits> 0` for a deletion, `<lits> 0` otherwise.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub mode: Mode,
    pub clause: Clause,
}

impl Record {
    pub fn added(clause: Clause) -> Self {
        Record {
            mode: Mode::Added,
            clause,
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let (mode, rest) = match s.strip_prefix('d') {
            Some(rest) => (Mode::Deleted, rest),
            None => (Mode::Added, s),
        };
        if !rest.split_whitespace().last().map_or(false, |t| t == "0") {
            return Err(Error::format(format!("queue record `{}` does not end with 0", s)));
        }
        let lits = parse_lits(rest)?;
        Ok(Record {
            mode,
            clause: Clause::new(lits),
        })
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.mode == Mode::Deleted {
            write!(f, "d ")?;
        }
        write!(f, "{}", self.clause)
    }
}

/// A store holding named channels.
pub trait QueueStore {
    /// The record at `index` of `channel`, if it is available.
    fn get(&mut self, channel: &str, index: u64) -> Result<Option<String>>;

    /// Up to `n` consecutive records from `start`, stopping at the first
    /// missing one.
    fn get_batch(&mut self, channel: &str, start: u64, n: usize) -> Result<Vec<String>> {
        let mut out = Vec::with_capacity(n);
        for i in 0..n as u64 {
            match self.get(channel, start + i)? {
                Some(s) => out.push(s),
                None => break,
            }
        }
        Ok(out)
    }

    /// Store `record` at `index`. Indices must be written contiguously.
    fn put(&mut self, channel: &str, index: u64, record: &str) -> Result<()>;
}

impl<Q: QueueStore + ?Sized> QueueStore for Box<Q> {
    fn get(&mut self, channel: &str, index: u64) -> Result<Option<String>> {
        (**self).get(channel, index)
    }
    fn get_batch(&mut self, channel: &str, start: u64, n: usize) -> Result<Vec<String>> {
        (**self).get_batch(channel, start, n)
    }
    fn put(&mut self, channel: &str, index: u64, record: &str) -> Result<()> {
        (**self).put(channel, index, record)
    }
}

/// Read every available record of `channel` from `cursor` on, in batches of
/// `buffer_size`.
pub fn read_from<Q>(q: &mut Q, channel: &str, cursor: u64, buffer_size: usize) -> Result<Vec<Record>>
where
    Q: QueueStore + ?Sized,
{
    let buffer_size = buffer_size.max(1);
    let mut out = vec![];
    loop {
        let batch = q.get_batch(channel, cursor + out.len() as u64, buffer_size)?;
        let full = batch.len() == buffer_size;
        for s in &batch {
            out.push(Record::parse(s)?);
        }
        if !full {
            return Ok(out);
        }
    }
}

fn check_contiguous(channel: &str, index: u64, len: u64) -> Result<()> {
    if index != len {
        return Err(Error::Queue(format!(
            "write at {}:{} but the channel has {} records",
            channel, index, len
        )));
    }
    Ok(())
}

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryQueue {
    channels: HashMap<String, Vec<String>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self, channel: &str) -> usize {
        self.channels.get(channel).map_or(0, |v| v.len())
    }

    /// Append to `channel`, returning the index of the new record.
    pub fn push(&mut self, channel: &str, record: &str) -> u64 {
        let v = self.channels.entry(channel.to_string()).or_default();
        v.push(record.to_string());
        (v.len() - 1) as u64
    }
}

impl QueueStore for MemoryQueue {
    fn get(&mut self, channel: &str, index: u64) -> Result<Option<String>> {
        Ok(self
            .channels
            .get(channel)
            .and_then(|v| v.get(index as usize))
            .cloned())
    }

    fn put(&mut self, channel: &str, index: u64, record: &str) -> Result<()> {
        check_contiguous(channel, index, self.len(channel) as u64)?;
        self.push(channel, record);
        Ok(())
    }
}

/// Store backed by a directory.
///
/// With [`Encoding::Scalar`], record `i` of channel `c` is the file
/// `<root>/c/i`, written through a temporary file and a rename. With
/// [`Encoding::List`], channel `c` is the file `<root>/c.log`, one record per
/// line; a last line without newline is still being written and is ignored.
/// List files are read incrementally from where the last read stopped.
#[derive(Debug)]
pub struct DirQueue {
    root: PathBuf,
    encoding: Encoding,
    logs: HashMap<String, LogCache>,
}

/// Complete lines of a list file read so far, and the offset after them.
#[derive(Debug, Default)]
struct LogCache {
    offset: u64,
    lines: Vec<String>,
}

impl DirQueue {
    pub fn new(root: &Path, encoding: Encoding) -> io::Result<Self> {
        fs::create_dir_all(root)?;
        Ok(DirQueue {
            root: root.to_path_buf(),
            encoding,
            logs: HashMap::new(),
        })
    }

    fn record_path(&self, channel: &str, index: u64) -> PathBuf {
        self.root.join(channel).join(index.to_string())
    }

    fn log_path(&self, channel: &str) -> PathBuf {
        self.root.join(format!("{}.log", channel))
    }

    /// Complete lines of the list file of `channel`, reading only what
    /// was appended since the last call.
    fn refresh_log(&mut self, channel: &str) -> Result<&[String]> {
        let path = self.log_path(channel);
        let cache = self.logs.entry(channel.to_string()).or_default();
        let mut file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                *cache = LogCache::default();
                return Ok(&cache.lines);
            }
            Err(e) => return Err(e.into()),
        };
        if file.metadata()?.len() < cache.offset {
            // truncated or replaced
            *cache = LogCache::default();
        }
        file.seek(SeekFrom::Start(cache.offset))?;
        let mut input = BufReader::new(file);
        let mut line = String::new();
        loop {
            line.clear();
            let n = input.read_line(&mut line)?;
            if n == 0 || !line.ends_with('\n') {
                return Ok(&cache.lines);
            }
            cache.offset += n as u64;
            cache.lines.push(line.trim_end().to_string());
        }
    }
}

impl QueueStore for DirQueue {
    fn get(&mut self, channel: &str, index: u64) -> Result<Option<String>> {
        Ok(self.get_batch(channel, index, 1)?.pop())
    }

    fn get_batch(&mut self, channel: &str, start: u64, n: usize) -> Result<Vec<String>> {
        match self.encoding {
            Encoding::Scalar => {
                let mut out = Vec::with_capacity(n);
                for i in start..start + n as u64 {
                    match fs::read_to_string(self.record_path(channel, i)) {
                        Ok(s) => out.push(s.trim_end().to_string()),
                        Err(e) if e.kind() == io::ErrorKind::NotFound => break,
                        Err(e) => return Err(e.into()),
                    }
                }
                Ok(out)
            }
            Encoding::List => Ok(self
                .refresh_log(channel)?
                .iter()
                .skip(start as usize)
                .take(n)
                .cloned()
                .collect()),
        }
    }

    fn put(&mut self, channel: &str, index: u64, record: &str) -> Result<()> {
        match self.encoding {
            Encoding::Scalar => {
                if index > 0 && !self.record_path(channel, index - 1).exists() {
                    return Err(Error::Queue(format!(
                        "write at {}:{} before {}:{}",
                        channel,
                        index,
                        channel,
                        index - 1
                    )));
                }
                let path = self.record_path(channel, index);
                fs::create_dir_all(self.root.join(channel))?;
                let tmp = self.root.join(channel).join(format!(".{}.tmp", index));
                fs::write(&tmp, format!("{}\n", record))?;
                fs::rename(&tmp, &path)?;
            }
            Encoding::List => {
                let len = self.refresh_log(channel)?.len() as u64;
                check_contiguous(channel, index, len)?;
                let mut f = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(self.log_path(channel))?;
                writeln!(f, "{}", record)?;
            }
        }
        Ok(())
    }
}

#[cfg(feature = "redis")]
pub use self::redis_store::RedisQueue;

#[cfg(feature = "redis")]
mod redis_store {
    use super::*;

    /// Store backed by a Redis server.
    pub struct RedisQueue {
        con: redis::Connection,
        encoding: Encoding,
    }

    impl RedisQueue {
        /// Connect to `url`, e.g. `redis://localhost:6379`.
        pub fn open(url: &str, encoding: Encoding) -> Result<Self> {
            let con = redis::Client::open(url)?.get_connection()?;
            Ok(RedisQueue { con, encoding })
        }

        /// Drop every key of the current database.
        pub fn flush(&mut self) -> Result<()> {
            redis::cmd("FLUSHDB").query::<()>(&mut self.con)?;
            Ok(())
        }
    }

    impl QueueStore for RedisQueue {
        fn get(&mut self, channel: &str, index: u64) -> Result<Option<String>> {
            let v: Option<String> = match self.encoding {
                Encoding::Scalar => redis::cmd("GET")
                    .arg(format!("{}:{}", channel, index))
                    .query(&mut self.con)?,
                Encoding::List => redis::cmd("LINDEX")
                    .arg(channel)
                    .arg(index)
                    .query(&mut self.con)?,
            };
            Ok(v)
        }

        fn get_batch(&mut self, channel: &str, start: u64, n: usize) -> Result<Vec<String>> {
            if n == 0 {
                return Ok(vec![]);
            }
            match self.encoding {
                Encoding::Scalar => {
                    let mut pipe = redis::pipe();
                    for i in start..start + n as u64 {
                        pipe.cmd("GET").arg(format!("{}:{}", channel, i));
                    }
                    let vals: Vec<Option<String>> = pipe.query(&mut self.con)?;
                    Ok(vals.into_iter().take_while(|v| v.is_some()).flatten().collect())
                }
                Encoding::List => {
                    let vals: Vec<String> = redis::cmd("LRANGE")
                        .arg(channel)
                        .arg(start)
                        .arg(start + n as u64 - 1)
                        .query(&mut self.con)?;
                    Ok(vals)
                }
            }
        }

        fn put(&mut self, channel: &str, index: u64, record: &str) -> Result<()> {
            match self.encoding {
                Encoding::Scalar => {
                    redis::cmd("SET")
                        .arg(format!("{}:{}", channel, index))
                        .arg(record)
                        .query::<()>(&mut self.con)?;
                }
                Encoding::List => {
                    let len: u64 = redis::cmd("LLEN").arg(channel).query(&mut self.con)?;
                    check_contiguous(channel, index, len)?;
                    redis::cmd("RPUSH")
                        .arg(channel)
                        .arg(record)
                        .query::<()>(&mut self.con)?;
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn temp_root(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("backdoor-queue-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_record() {
        let r = Record::parse("d 3 -1 0").unwrap();
        assert_eq!(r.mode, Mode::Deleted);
        assert_eq!(r.to_string(), "d -1 3 0");
        let r = Record::parse(" -2 5 0\n").unwrap();
        assert_eq!(r, Record::added(Clause::from_dimacs(&[5, -2]).unwrap()));
        assert_eq!(r.to_string(), "-2 5 0");
        assert!(Record::parse("1 2").is_err());
        assert!(Record::parse("1 x 0").is_err());
        assert!(matches!(Record::parse("1 0 2 0"), Err(Error::Format(_))));
        assert!(Record::parse("d 0 3 0").is_err());
        assert_eq!("list".parse::<Encoding>().unwrap(), Encoding::List);
        assert!("hash".parse::<Encoding>().is_err());
    }

    #[test]
    fn test_memory_queue() {
        let mut q = MemoryQueue::new();
        assert_eq!(q.get("c", 0).unwrap(), None);
        q.put("c", 0, "1 0").unwrap();
        q.put("c", 1, "d 2 0").unwrap();
        assert!(q.put("c", 3, "3 0").is_err());
        assert_eq!(q.push("c", "-4 0"), 2);
        let recs = read_from(&mut q, "c", 0, 2).unwrap();
        assert_eq!(recs.len(), 3);
        assert_eq!(recs[1].mode, Mode::Deleted);
        assert_eq!(read_from(&mut q, "c", 1, 1).unwrap().len(), 2);
        assert!(read_from(&mut q, "c", 3, 10).unwrap().is_empty());
        assert!(read_from(&mut q, "other", 0, 10).unwrap().is_empty());
    }

    fn check_dir_queue(encoding: Encoding) {
        let root = temp_root(&encoding.to_string());
        let mut q = DirQueue::new(&root, encoding).unwrap();
        assert!(q.get_batch("c", 0, 4).unwrap().is_empty());
        for (i, r) in ["1 2 0", "d 1 2 0", "-3 0"].iter().enumerate() {
            q.put("c", i as u64, r).unwrap();
        }
        assert!(q.put("c", 5, "4 0").is_err());
        assert_eq!(q.get("c", 2).unwrap().as_deref(), Some("-3 0"));
        assert_eq!(q.get("c", 3).unwrap(), None);
        assert_eq!(q.get_batch("c", 1, 5).unwrap(), vec!["d 1 2 0", "-3 0"]);

        // a second handle sees the same records
        let mut again = DirQueue::new(&root, encoding).unwrap();
        assert_eq!(read_from(&mut again, "c", 0, 2).unwrap().len(), 3);
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_dir_queue_scalar() {
        check_dir_queue(Encoding::Scalar);
    }

    #[test]
    fn test_dir_queue_list() {
        check_dir_queue(Encoding::List);
    }

    #[test]
    fn test_list_reads_appends_from_other_handles() {
        let root = temp_root("appends");
        let mut a = DirQueue::new(&root, Encoding::List).unwrap();
        let mut b = DirQueue::new(&root, Encoding::List).unwrap();
        a.put("c", 0, "1 0").unwrap();
        assert_eq!(a.get_batch("c", 0, 10).unwrap(), vec!["1 0"]);
        b.put("c", 1, "2 0").unwrap();
        a.put("c", 2, "3 0").unwrap();
        assert!(b.put("c", 2, "4 0").is_err());
        assert_eq!(a.get_batch("c", 1, 10).unwrap(), vec!["2 0", "3 0"]);
        assert_eq!(a.logs["c"].lines.len(), 3);
        assert_eq!(a.logs["c"].offset, fs::metadata(root.join("c.log")).unwrap().len());

        // a replaced file is read again from the start
        fs::write(root.join("c.log"), "5 0\n").unwrap();
        assert_eq!(a.get_batch("c", 0, 10).unwrap(), vec!["5 0"]);
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_partial_line_is_not_available() {
        let root = temp_root("partial");
        let mut q = DirQueue::new(&root, Encoding::List).unwrap();
        q.put("c", 0, "1 0").unwrap();
        let mut f = OpenOptions::new().append(true).open(root.join("c.log")).unwrap();
        write!(f, "2 ").unwrap();
        assert_eq!(q.get_batch("c", 0, 10).unwrap(), vec!["1 0"]);
        let _ = fs::remove_dir_all(&root);
    }
}
