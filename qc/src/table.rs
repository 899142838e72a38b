use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// a small comma-separated table held in memory. None of the values these
/// reports carry ever contain a delimiter, so no quoting is done.
#[derive(Clone,Debug)]
pub struct Table {
    pub header:Vec<String>,
    pub rows:Vec<Vec<String>>,
}

#[derive(Clone,Debug,PartialEq)]
pub enum TableError {
    NotFound(PathBuf),
    Empty(PathBuf),
    ColumnMissing(String),
}

impl Table {

    pub fn new(header:&[&str]) -> Self {
        Self {
            header:header.iter().map(|h| h.to_string()).collect(),
            rows:Vec::new(),
        }
    }

    pub fn from_csv(path:&Path) -> Result<Self,TableError> {
        let mut f = File::open(path).map_err(|_| TableError::NotFound(path.to_owned()))?;
        let mut s = String::new();
        f.read_to_string(&mut s).map_err(|_| TableError::NotFound(path.to_owned()))?;
        let mut lines = s.lines().filter(|l| !l.trim().is_empty());
        let header:Vec<String> = lines.next()
            .ok_or(TableError::Empty(path.to_owned()))?
            .split(',').map(|h| h.trim().to_string()).collect();
        let rows:Vec<Vec<String>> = lines.map(|line|{
            let mut row:Vec<String> = line.split(',').map(|v| v.trim().to_string()).collect();
            // ragged rows get padded so column lookups stay in bounds
            while row.len() < header.len() {
                row.push(String::from(""));
            }
            row
        }).collect();
        Ok(Self{header,rows})
    }

    pub fn column_index(&self,name:&str) -> Result<usize,TableError> {
        self.header.iter().position(|h| h == name).ok_or(TableError::ColumnMissing(name.to_string()))
    }

    pub fn get(&self,row:&[String],column:&str) -> Option<String> {
        let idx = self.column_index(column).ok()?;
        row.get(idx).cloned()
    }

    /// add a column, filling existing rows with values looked up per row
    pub fn push_column<F>(&mut self,name:&str,value:F)
        where F:Fn(&[String]) -> String
    {
        let values:Vec<String> = self.rows.iter().map(|row| value(row)).collect();
        self.header.push(name.to_string());
        for (row,v) in self.rows.iter_mut().zip(values) {
            row.push(v);
        }
    }

    pub fn to_csv(&self) -> String {
        let mut lines = Vec::<String>::new();
        lines.push(self.header.join(","));
        for row in &self.rows {
            lines.push(row.join(","));
        }
        let mut s = lines.join("\n");
        s.push('\n');
        s
    }

    pub fn write_csv(&self,path:&Path) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect(&format!("cannot create {:?}",parent));
        }
        std::fs::write(path,self.to_csv()).expect(&format!("cannot write {:?}",path));
        println!("wrote {:?}",path);
    }
}

pub fn parse_float(token:&str) -> Option<f64> {
    match token.trim().to_ascii_lowercase().as_str() {
        "" | "n/a" | "na" | "nan" => None,
        t => t.parse().ok()
    }
}

#[test]
fn csv_round_trip(){
    let dir = std::env::temp_dir().join("table_tests");
    std::fs::create_dir_all(&dir).expect("cannot create test dir");
    let p = dir.join("round_trip.csv");
    let mut t = Table::new(&["subj_ID","group"]);
    t.rows.push(vec![String::from("sub-01"),String::from("ADHD")]);
    t.rows.push(vec![String::from("sub-02"),String::from("")]);
    t.write_csv(&p);
    let back = Table::from_csv(&p).expect("table should read");
    assert_eq!(back.header,vec!["subj_ID","group"]);
    assert_eq!(back.rows.len(),2);
    assert_eq!(back.get(&back.rows[0],"group"),Some(String::from("ADHD")));
}

#[test]
fn parse_float_missing_tokens(){
    assert_eq!(parse_float("0.15"),Some(0.15));
    assert_eq!(parse_float("n/a"),None);
    assert_eq!(parse_float(""),None);
    assert_eq!(parse_float("abc"),None);
}
