use std::path::{Path, PathBuf};
use bids::layout::Subject;
use dwi_preproc::acq_params::{format_eddy_index, write_acq_params, write_eddy_index};
use dwi_preproc::batch::run_batch;
use dwi_preproc::pipeline_config::{Config, ConfigFile, ProjectSettings, SubjectManagerConfig};
use dwi_preproc::subject_manager::check_resources;
use bids::sidecar::PhaseEncoding;

/// smallest possible single-file nifti-1 image: a 348 byte header, a 4 byte
/// extension flag, and one uint8 voxel per element
fn write_minimal_nifti(path:&Path,nx:u16,ny:u16,nz:u16,nt:u16){
    let mut bytes = vec![0u8;352];
    bytes[0..4].copy_from_slice(&348i32.to_le_bytes());
    let ndim:u16 = if nt > 1 {4} else {3};
    let dims:[u16;8] = [ndim,nx,ny,nz,nt.max(1),1,1,1];
    for (i,d) in dims.iter().enumerate(){
        bytes[40+2*i..42+2*i].copy_from_slice(&d.to_le_bytes());
    }
    bytes[70..72].copy_from_slice(&2i16.to_le_bytes());   // datatype: uint8
    bytes[72..74].copy_from_slice(&8i16.to_le_bytes());   // bitpix
    bytes[108..112].copy_from_slice(&352f32.to_le_bytes()); // vox_offset
    bytes[344..348].copy_from_slice(b"n+1\0");
    let n_voxels = nx as usize * ny as usize * nz as usize * nt.max(1) as usize;
    bytes.extend(std::iter::repeat(0u8).take(n_voxels));
    std::fs::write(path,bytes).expect("cannot write test nifti");
}

fn write_subject(bids_root:&Path,subject:&str,n_vols:u16,bval:Option<&str>){
    let sub = Subject::new(subject);
    let dwi_dir = bids_root.join(sub.id()).join("dwi");
    let fmap_dir = bids_root.join(sub.id()).join("fmap");
    std::fs::create_dir_all(&dwi_dir).expect("cannot create dwi dir");
    std::fs::create_dir_all(&fmap_dir).expect("cannot create fmap dir");

    let dwi_base = dwi_dir.join(format!("{}_dir-PA_dwi",sub.id()));
    write_minimal_nifti(&PathBuf::from(format!("{}.nii",dwi_base.to_str().unwrap())),4,4,2,n_vols);
    if let Some(b) = bval {
        std::fs::write(format!("{}.bval",dwi_base.to_str().unwrap()),b).expect("cannot write bval");
    }
    let n_tokens = 5;
    let bvec_row = (0..n_tokens).map(|_| "0").collect::<Vec<&str>>().join(" ");
    std::fs::write(format!("{}.bvec",dwi_base.to_str().unwrap()),format!("{r}\n{r}\n{r}\n",r=bvec_row)).expect("cannot write bvec");
    std::fs::write(format!("{}.json",dwi_base.to_str().unwrap()),
        r#"{"PhaseEncodingDirection":"j","TotalReadoutTime":0.05}"#).expect("cannot write sidecar");

    let fmap_base = fmap_dir.join(format!("{}_acq-dwi_dir-AP_epi",sub.id()));
    write_minimal_nifti(&PathBuf::from(format!("{}.nii",fmap_base.to_str().unwrap())),4,4,2,1);
    std::fs::write(format!("{}.json",fmap_base.to_str().unwrap()),
        r#"{"PhaseEncodingDirection":"j-","EffectiveEchoSpacing":0.00058,"ReconMatrixPE":140}"#).expect("cannot write sidecar");
}

fn test_root(name:&str) -> PathBuf {
    let root = std::env::temp_dir().join("dwi_preproc_integration").join(name);
    if root.exists() {
        std::fs::remove_dir_all(&root).expect("cannot clear old test root");
    }
    std::fs::create_dir_all(&root).expect("cannot create test root");
    root
}

#[test]
fn preflight_accounts_for_every_subject(){
    let root = test_root("preflight");
    let bids_root = root.join("bids");

    // two good subjects, one with a missing bval, one with a volume count
    // that disagrees with its gradient table
    write_subject(&bids_root,"sub-01",5,Some("0 0 1000 1000 0\n"));
    write_subject(&bids_root,"sub-02",5,None);
    write_subject(&bids_root,"sub-03",5,Some("0 0 1000 1000 0\n"));
    write_subject(&bids_root,"sub-04",4,Some("0 0 1000 1000 0\n"));

    let project = root.join("project");
    ProjectSettings::default().to_file(&project);

    let subjects:Vec<Subject> = ["sub-01","sub-02","sub-03","sub-04"].iter().map(|s| Subject::new(s)).collect();
    let configs = SubjectManagerConfig::new_batch_config(
        &project,"op1","R0001",&bids_root,&root.join("R0001.work"),&subjects,true);

    let summary = run_batch(&configs,|c| c.name(),|c| check_resources(c));

    assert_eq!(summary.total(),4);
    assert_eq!(summary.n_success,2);
    assert_eq!(summary.n_failed,2);
    assert_eq!(summary.failed,vec!["R0001_sub-02","R0001_sub-04"]);
}

#[test]
fn acq_params_and_index_files_track_volume_counts(){
    let root = test_root("acqparams");
    for n_vols in [3usize,7,12] {
        let index_base = root.join(format!("index_{}",n_vols));
        write_eddy_index(&index_base,n_vols);
        let written = std::fs::read_to_string(index_base.with_extension("txt")).expect("index file should exist");
        assert_eq!(written.split_whitespace().count(),n_vols);
    }

    let acq_base = root.join("acqparams");
    write_acq_params(&acq_base,PhaseEncoding::J,0.05,3,PhaseEncoding::JRev,0.0806,1);
    let written = std::fs::read_to_string(acq_base.with_extension("txt")).expect("acqparams file should exist");
    let rows:Vec<&str> = written.lines().collect();
    assert_eq!(rows.len(),4);
    assert_eq!(rows[0],"0 1 0 0.050000");
    assert_eq!(rows[3],"0 -1 0 0.080600");
}

#[test]
fn index_is_all_ones(){
    let s = format_eddy_index(6);
    assert_eq!(s,"1 1 1 1 1 1\n");
}

#[test]
fn expected_volume_override_is_enforced(){
    let root = test_root("expected_vols");
    let bids_root = root.join("bids");
    write_subject(&bids_root,"sub-01",5,Some("0 0 1000 1000 0\n"));

    let project = root.join("project");
    let mut p = ProjectSettings::default();
    p.expected_dwi_vols = Some(67);
    p.to_file(&project);

    let subjects = vec![Subject::new("sub-01")];
    let configs = SubjectManagerConfig::new_batch_config(
        &project,"op1","R0002",&bids_root,&root.join("R0002.work"),&subjects,true);

    let result = check_resources(&configs[0]);
    assert!(result.is_err());
    assert!(result.err().unwrap().contains("project expects"));
}
