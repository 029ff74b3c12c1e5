//! Minimal reading and writing of comma-separated files. Quoted fields are not supported.

use std::fs::File;
use std::io;
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::Path;

pub struct CsvWriter<W: Write> {
    writer: BufWriter<W>,
}
impl CsvWriter<File> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, io::Error> {
        let file = File::create(path)?;
        Ok(Self::from_writer(file))
    }
}
impl<W: Write> CsvWriter<W> {
    pub fn from_writer(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
        }
    }

    pub fn append<R>(&mut self, record: R) -> Result<(), io::Error>
    where
        R: IntoIterator,
        R::Item: AsRef<str>,
    {
        let mut first = true;
        for datum in record.into_iter() {
            if first {
                first = false;
            } else {
                self.writer.write_all(b",")?;
            }
            self.writer.write_all(datum.as_ref().as_bytes())?;
        }
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), io::Error> {
        self.writer.flush()
    }

    pub fn into_inner(self) -> Result<W, io::Error> {
        self.writer.into_inner().map_err(|err| err.into_error())
    }
}

pub struct CsvReader<R: BufRead> {
    lines: Lines<R>,
}
impl CsvReader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, io::Error> {
        let file = File::open(path)?;
        Ok(Self::from_reader(BufReader::new(file)))
    }
}
impl<R: BufRead> CsvReader<R> {
    pub fn from_reader(reader: R) -> Self {
        Self { lines: reader.lines() }
    }

    pub fn read(&mut self) -> Option<Result<Vec<String>, io::Error>> {
        self.lines.next().map(|line| line.map(|line| split(&line)))
    }
}

impl<R: BufRead> Iterator for CsvReader<R> {
    type Item = Result<Vec<String>, io::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read()
    }
}

fn split(line: &str) -> Vec<String> {
    line.trim_end_matches('\r')
        .split(',')
        .map(|datum| datum.trim().to_string())
        .collect()
}

/// Column names of a CSV file, permitting lookup of a column's position by name.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    names: Vec<String>,
}
impl Header {
    pub fn new(mut names: Vec<String>) -> Self {
        if let Some(first) = names.first_mut() {
            if let Some(stripped) = first.strip_prefix('\u{feff}') {
                *first = stripped.to_string();
            }
        }
        Self { names }
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|existing| existing == name)
    }

    /// Positions of those `candidates` present in the header, in the order of `candidates`.
    pub fn positions(&self, candidates: &[&str]) -> Vec<usize> {
        candidates.iter().filter_map(|candidate| self.position(candidate)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_lines() {
        let data = "Div,Date,HomeTeam\r\nE0,12/08/2023, Arsenal \n\nE0,13/08/2023,Brentford";
        let records = CsvReader::from_reader(data.as_bytes())
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(4, records.len());
        assert_eq!(vec!["Div", "Date", "HomeTeam"], records[0]);
        assert_eq!(vec!["E0", "12/08/2023", "Arsenal"], records[1]);
        assert_eq!(vec![""], records[2]);
        assert_eq!(vec!["E0", "13/08/2023", "Brentford"], records[3]);
    }

    #[test]
    fn header_lookup() {
        let header = Header::new(vec!["\u{feff}Div".into(), "B365H".into(), "AvgH".into()]);
        assert_eq!(Some(0), header.position("Div"));
        assert_eq!(vec![2, 1], header.positions(&["PSH", "AvgH", "B365H"]));
        assert!(header.positions(&["PSH"]).is_empty());
    }

    #[test]
    fn write_records() {
        let mut writer = CsvWriter::from_writer(Vec::new());
        writer.append(["date", "odds"]).unwrap();
        writer.append(vec!["2023-08-12".to_string(), "2.1".to_string()]).unwrap();
        let bytes = writer.into_inner().unwrap();
        assert_eq!("date,odds\n2023-08-12,2.1\n", String::from_utf8(bytes).unwrap());
    }
}
