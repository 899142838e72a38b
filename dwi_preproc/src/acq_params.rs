use std::path::Path;
use bids::gradient_table::GradientTable;
use bids::sidecar::PhaseEncoding;

/// b0 selection failures. These happen before any file is written so a
/// failed extraction never leaves a partial output behind.
#[derive(Clone,Debug,PartialEq)]
pub enum B0Error {
    NoB0Volumes,
    NotEnoughB0Volumes{available:usize,requested:usize},
}

/// pick the b0 volumes to feed the distortion estimate. Returns the first
/// n_requested unweighted indices; asking for more than the series carries
/// is an error, not a truncation.
pub fn select_b0_indices(table:&GradientTable,threshold:f32,n_requested:usize) -> Result<Vec<usize>,B0Error> {
    let all = table.b0_indices(threshold);
    if all.is_empty() {
        return Err(B0Error::NoB0Volumes)
    }
    if n_requested > all.len() {
        return Err(B0Error::NotEnoughB0Volumes{available:all.len(),requested:n_requested})
    }
    Ok(all[0..n_requested].to_vec())
}

/// one row per volume of the merged b0 image: forward rows first, then the
/// reverse rows, each carrying its own readout time
pub fn format_acq_params(forward:PhaseEncoding,forward_readout:f32,n_forward:usize,
                         reverse:PhaseEncoding,reverse_readout:f32,n_reverse:usize) -> String {
    let mut rows = Vec::<String>::with_capacity(n_forward+n_reverse);
    let f = forward.acq_params_vector();
    for _ in 0..n_forward {
        rows.push(format!("{} {} {} {:.6}",f[0],f[1],f[2],forward_readout));
    }
    let r = reverse.acq_params_vector();
    for _ in 0..n_reverse {
        rows.push(format!("{} {} {} {:.6}",r[0],r[1],r[2],reverse_readout));
    }
    let mut s = rows.join("\n");
    s.push('\n');
    s
}

pub fn write_acq_params(path:&Path,forward:PhaseEncoding,forward_readout:f32,n_forward:usize,
                        reverse:PhaseEncoding,reverse_readout:f32,n_reverse:usize) {
    let s = format_acq_params(forward,forward_readout,n_forward,reverse,reverse_readout,n_reverse);
    utils::write_to_file(path,"txt",&s);
}

/// eddy index file: exactly one acqparams row number per acquired volume.
/// Every volume of the series was acquired with the forward encoding, so
/// every entry points at row 1.
pub fn format_eddy_index(n_volumes:usize) -> String {
    let entries:Vec<String> = (0..n_volumes).map(|_| String::from("1")).collect();
    let mut s = entries.join(" ");
    s.push('\n');
    s
}

pub fn write_eddy_index(path:&Path,n_volumes:usize) {
    utils::write_to_file(path,"txt",&format_eddy_index(n_volumes));
}

#[test]
fn acq_params_row_count_tracks_volumes(){
    let s = format_acq_params(PhaseEncoding::J,0.05,3,PhaseEncoding::JRev,0.05,2);
    let rows:Vec<&str> = s.lines().collect();
    assert_eq!(rows.len(),5);
    assert!(rows[0].starts_with("0 1 0"));
    assert!(rows[3].starts_with("0 -1 0"));
    assert!(rows[0].ends_with("0.050000"));
}

#[test]
fn index_entry_count_tracks_volumes(){
    for n in [1,5,67,132] {
        let s = format_eddy_index(n);
        let entries:Vec<&str> = s.split_whitespace().collect();
        assert_eq!(entries.len(),n);
        assert!(entries.iter().all(|e| *e == "1"));
    }
}

#[test]
fn b0_request_over_available_fails(){
    let dir = std::env::temp_dir().join("acq_params_tests");
    std::fs::create_dir_all(&dir).expect("cannot create test dir");
    let p = dir.join("three_b0.bval");
    std::fs::write(&p,"0 0 1000 1000 0\n").expect("cannot write test file");
    let t = GradientTable::open(&p).expect("table should parse");
    assert_eq!(select_b0_indices(&t,0.0,3),Ok(vec![0,1,4]));
    assert_eq!(select_b0_indices(&t,0.0,2),Ok(vec![0,1]));
    assert_eq!(
        select_b0_indices(&t,0.0,4),
        Err(B0Error::NotEnoughB0Volumes{available:3,requested:4})
    );
}

#[test]
fn all_weighted_series_has_no_b0(){
    let dir = std::env::temp_dir().join("acq_params_tests");
    std::fs::create_dir_all(&dir).expect("cannot create test dir");
    let p = dir.join("weighted.bval");
    std::fs::write(&p,"1000 2000 1000\n").expect("cannot write test file");
    let t = GradientTable::open(&p).expect("table should parse");
    assert_eq!(select_b0_indices(&t,0.0,1),Err(B0Error::NoB0Volumes));
}
