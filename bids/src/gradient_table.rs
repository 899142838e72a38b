use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// diffusion gradient table read from a .bval file. One token per acquired
/// volume; the paired .bvec must carry 3 rows with the same column count.
pub struct GradientTable {
    source:PathBuf,
    bvals:Vec<f32>,
}

#[derive(Clone,Debug,PartialEq)]
pub enum GradientError {
    BvalNotFound(PathBuf),
    BvalEmpty(PathBuf),
    BadToken(String),
    BvecNotFound(PathBuf),
    BvecRowCount{found:usize},
    BvecColumnMismatch{row:usize,found:usize,expected:usize},
    VolumeCountMismatch{image_volumes:usize,table_volumes:usize},
}

impl GradientTable {

    pub fn open(bval:&Path) -> Result<Self,GradientError> {
        let mut f = File::open(bval).map_err(|_| GradientError::BvalNotFound(bval.to_owned()))?;
        let mut s = String::new();
        f.read_to_string(&mut s).map_err(|_| GradientError::BvalNotFound(bval.to_owned()))?;
        let mut bvals = Vec::<f32>::new();
        for token in s.split_whitespace() {
            let val = token.parse().map_err(|_| GradientError::BadToken(token.to_string()))?;
            bvals.push(val);
        }
        if bvals.is_empty() {
            return Err(GradientError::BvalEmpty(bval.to_owned()))
        }
        Ok(Self {
            source:bval.to_owned(),
            bvals,
        })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn n_volumes(&self) -> usize {
        self.bvals.len()
    }

    pub fn bvals(&self) -> &[f32] {
        &self.bvals
    }

    /// indices of the unweighted volumes. A volume counts as b0 when its
    /// b-value is at or below the threshold.
    pub fn b0_indices(&self,threshold:f32) -> Vec<usize> {
        self.bvals.iter().enumerate()
            .filter(|(_,b)| **b <= threshold)
            .map(|(i,_)| i)
            .collect()
    }

    /// the paired .bvec must be 3 rows of exactly n_volumes tokens each
    pub fn check_bvec(&self,bvec:&Path) -> Result<(),GradientError> {
        let mut f = File::open(bvec).map_err(|_| GradientError::BvecNotFound(bvec.to_owned()))?;
        let mut s = String::new();
        f.read_to_string(&mut s).map_err(|_| GradientError::BvecNotFound(bvec.to_owned()))?;
        let rows:Vec<Vec<&str>> = s.lines()
            .map(|line| line.split_whitespace().collect::<Vec<&str>>())
            .filter(|tokens| !tokens.is_empty())
            .collect();
        if rows.len() != 3 {
            return Err(GradientError::BvecRowCount{found:rows.len()})
        }
        for (i,row) in rows.iter().enumerate() {
            for token in row {
                token.parse::<f32>().map_err(|_| GradientError::BadToken(token.to_string()))?;
            }
            if row.len() != self.n_volumes() {
                return Err(GradientError::BvecColumnMismatch{row:i,found:row.len(),expected:self.n_volumes()})
            }
        }
        Ok(())
    }

    /// the 4d image must carry exactly one volume per table entry
    pub fn check_volume_count(&self,image_volumes:usize) -> Result<(),GradientError> {
        match image_volumes == self.n_volumes() {
            true => Ok(()),
            false => Err(GradientError::VolumeCountMismatch{
                image_volumes,
                table_volumes:self.n_volumes()
            })
        }
    }
}

#[cfg(test)]
fn table_from(content:&str,name:&str) -> GradientTable {
    let dir = std::env::temp_dir().join("gradient_table_tests");
    std::fs::create_dir_all(&dir).expect("cannot create test dir");
    let p = dir.join(name);
    std::fs::write(&p,content).expect("cannot write test file");
    GradientTable::open(&p).expect("table should parse")
}

#[test]
fn b0_extraction(){
    let t = table_from("0 0 1000 1000 0\n","basic.bval");
    assert_eq!(t.n_volumes(),5);
    assert_eq!(t.b0_indices(0.0),vec![0,1,4]);
}

#[test]
fn b0_extraction_with_threshold(){
    let t = table_from("5 1000 45 2000 0\n","thresh.bval");
    assert_eq!(t.b0_indices(50.0),vec![0,2,4]);
    assert_eq!(t.b0_indices(0.0),vec![4]);
}

#[test]
fn volume_count_check(){
    let t = table_from("0 1000 1000\n","count.bval");
    assert!(t.check_volume_count(3).is_ok());
    assert_eq!(
        t.check_volume_count(4),
        Err(GradientError::VolumeCountMismatch{image_volumes:4,table_volumes:3})
    );
}

#[test]
fn bvec_shape_check(){
    let t = table_from("0 1000 1000\n","shape.bval");
    let dir = std::env::temp_dir().join("gradient_table_tests");
    let good = dir.join("good.bvec");
    std::fs::write(&good,"0 1 0\n0 0 1\n1 0 0\n").expect("cannot write test file");
    assert!(t.check_bvec(&good).is_ok());
    let bad = dir.join("bad.bvec");
    std::fs::write(&bad,"0 1\n0 0\n1 0\n").expect("cannot write test file");
    assert_eq!(
        t.check_bvec(&bad),
        Err(GradientError::BvecColumnMismatch{row:0,found:2,expected:3})
    );
}

#[test]
fn malformed_bval_is_rejected(){
    let dir = std::env::temp_dir().join("gradient_table_tests");
    std::fs::create_dir_all(&dir).expect("cannot create test dir");
    let p = dir.join("mangled.bval");
    std::fs::write(&p,"0 zero 1000\n").expect("cannot write test file");
    assert_eq!(GradientTable::open(&p).err(),Some(GradientError::BadToken("zero".to_string())));
}
