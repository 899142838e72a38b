use std::path::{Path, PathBuf};
use nifti::NiftiHeader;

#[derive(Clone,Debug,PartialEq)]
pub enum ImageError {
    NotFound(PathBuf),
    UnreadableHeader(PathBuf),
}

/// spatial + temporal dimensions from the nifti header. Only the header is
/// read; voxel data never gets loaded for a shape check.
pub fn dims(path:&Path) -> Result<Vec<usize>,ImageError> {
    if !path.exists() {
        return Err(ImageError::NotFound(path.to_owned()))
    }
    let h = NiftiHeader::from_file(path).map_err(|_| ImageError::UnreadableHeader(path.to_owned()))?;
    let ndims = h.dim[0] as usize;
    // dim[0] beyond 7 means the header is garbage, not a big image
    if ndims > 7 {
        return Err(ImageError::UnreadableHeader(path.to_owned()))
    }
    Ok(h.dim[1..=ndims].iter().map(|d| *d as usize).collect())
}

/// number of volumes in the 4th dimension. A 3d image counts as one volume.
pub fn n_volumes(path:&Path) -> Result<usize,ImageError> {
    let d = dims(path)?;
    match d.len() {
        0..=3 => Ok(1),
        _=> Ok(d[3].max(1))
    }
}

/// a postcondition helper for steps that promise an exact volume count
pub fn expect_n_volumes(path:&Path,expected:usize) -> Result<(),String> {
    let found = n_volumes(path).map_err(|e| format!("{:?}",e))?;
    match found == expected {
        true => Ok(()),
        false => Err(format!("{:?} has {} volumes, expected {}",path,found,expected))
    }
}
