use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Clone,Debug,PartialEq)]
pub enum ConfoundsError {
    NotFound(PathBuf),
    Empty(PathBuf),
    ColumnMissing(String),
}

/// read one column of a tab-separated confounds table. Missing values
/// (n/a, empty, unparseable) come back as None so downstream statistics can
/// stay missing-aware.
pub fn read_column(path:&Path,column:&str) -> Result<Vec<Option<f64>>,ConfoundsError> {
    let mut f = File::open(path).map_err(|_| ConfoundsError::NotFound(path.to_owned()))?;
    let mut s = String::new();
    f.read_to_string(&mut s).map_err(|_| ConfoundsError::NotFound(path.to_owned()))?;

    let mut lines = s.lines();
    let header = lines.next().ok_or(ConfoundsError::Empty(path.to_owned()))?;
    let col_index = header.split('\t')
        .position(|name| name.trim() == column)
        .ok_or(ConfoundsError::ColumnMissing(column.to_string()))?;

    let values:Vec<Option<f64>> = lines
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let token = line.split('\t').nth(col_index).unwrap_or("").trim();
            parse_value(token)
        })
        .collect();

    Ok(values)
}

fn parse_value(token:&str) -> Option<f64> {
    match token.to_ascii_lowercase().as_str() {
        "" | "n/a" | "na" | "nan" => None,
        _=> token.parse::<f64>().ok()
    }
}

/// the first sample of a motion trace is always undefined and excluded
pub fn after_first(values:&[Option<f64>]) -> &[Option<f64>] {
    match values.is_empty() {
        true => values,
        false => &values[1..]
    }
}

pub fn mean_ignoring_missing(values:&[Option<f64>]) -> Option<f64> {
    let present:Vec<f64> = values.iter().flatten().cloned().collect();
    match present.is_empty() {
        true => None,
        false => Some(present.iter().sum::<f64>()/present.len() as f64)
    }
}

#[cfg(test)]
fn write_confounds(name:&str,content:&str) -> PathBuf {
    let dir = std::env::temp_dir().join("confounds_tests");
    std::fs::create_dir_all(&dir).expect("cannot create test dir");
    let p = dir.join(name);
    std::fs::write(&p,content).expect("cannot write test file");
    p
}

#[test]
fn column_read_handles_missing_values(){
    let p = write_confounds("basic.tsv","rmsd\tframewise_displacement\nn/a\tn/a\n0.1\t0.12\n0.3\t0.31\n0.05\t0.06\n");
    let col = read_column(&p,"framewise_displacement").expect("column should read");
    assert_eq!(col,vec![None,Some(0.12),Some(0.31),Some(0.06)]);
    let col = read_column(&p,"rmsd").expect("column should read");
    assert_eq!(col,vec![None,Some(0.1),Some(0.3),Some(0.05)]);
}

#[test]
fn missing_column_is_an_error(){
    let p = write_confounds("no_col.tsv","trans_x\n0.0\n");
    assert_eq!(read_column(&p,"rmsd"),Err(ConfoundsError::ColumnMissing(String::from("rmsd"))));
}

#[test]
fn first_sample_excluded_mean(){
    let values = vec![None,Some(0.1),Some(0.3),Some(0.05)];
    let m = mean_ignoring_missing(after_first(&values)).expect("mean should exist");
    assert!((m - 0.15).abs() < 1.0E-12);
}
