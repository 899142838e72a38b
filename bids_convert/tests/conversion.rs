use std::path::{Path, PathBuf};
use bids::layout::Subject;
use bids_convert::convert::{execute, ConversionPlanner, CopyPlan};
use bids_convert::rules::{Config, SeriesRules};

fn names(list:&[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn dst_of<'a>(plans:&'a [CopyPlan],src_name:&str) -> Option<&'a Path> {
    plans.iter()
        .find(|p| p.src.file_name().unwrap().to_string_lossy() == src_name)
        .map(|p| p.dst.as_path())
}

#[test]
fn full_export_classifies_into_bids(){
    let rules = SeriesRules::default();
    let subject = Subject::new("EFI055ZRL");
    let src = PathBuf::from("/raw/export");
    let out = PathBuf::from("/bids/sub-EFI055ZRL");

    let basenames = names(&[
        "t1_mprage_sag_p2_5.nii.gz","t1_mprage_sag_p2_5.json",
        "t1_mprage_sag_p2_9.nii.gz",
        "t2_spc_sag_p2_6.nii.gz","t2_spc_sag_p2_6.json",
        "sms4_diff_CMR130_PA_8.nii.gz","sms4_diff_CMR130_PA_8.bval",
        "sms4_diff_CMR130_PA_8.bvec","sms4_diff_CMR130_PA_8.json",
        "sms4_diff_CMR130_PA_11.nii.gz",
        "sms4_diff_CMR130_B0_AP_7.nii.gz","sms4_diff_CMR130_B0_AP_7.json",
        "ep2d_se_2mm_AP_REST_12.nii.gz","ep2d_se_2mm_AP_REST_12.json",
        "ep2d_se_2mm_PA_REST_13.nii.gz",
        "ep2d_se_2mm_AP_TASK2_20.nii.gz",
        "sms4_bold_rest1_14.nii.gz","sms4_bold_rest1_14.json",
        "sms4_bold_rest2_15.nii.gz",
        "sms4_bold_nback_16.nii.gz",
        "sms4_bold_sst_17.nii.gz","sms4_bold_sst_18.nii.gz",
        "localizer_1.nii.gz",
    ]);

    let planner = ConversionPlanner::new(&src,&out,&subject,&rules,&basenames);
    let plans = planner.plan();

    // lowest T1 series becomes run-1 and brings its sidecar
    assert_eq!(dst_of(&plans,"t1_mprage_sag_p2_5.nii.gz"),
        Some(Path::new("/bids/sub-EFI055ZRL/anat/sub-EFI055ZRL_run-1_T1w.nii.gz")));
    assert_eq!(dst_of(&plans,"t1_mprage_sag_p2_5.json"),
        Some(Path::new("/bids/sub-EFI055ZRL/anat/sub-EFI055ZRL_run-1_T1w.json")));
    assert!(dst_of(&plans,"t1_mprage_sag_p2_9.nii.gz").is_none());

    assert_eq!(dst_of(&plans,"t2_spc_sag_p2_6.nii.gz"),
        Some(Path::new("/bids/sub-EFI055ZRL/anat/sub-EFI055ZRL_T2w.nii.gz")));

    // preferred series 8 has a complete gradient table; series 11 does not
    assert_eq!(dst_of(&plans,"sms4_diff_CMR130_PA_8.nii.gz"),
        Some(Path::new("/bids/sub-EFI055ZRL/dwi/sub-EFI055ZRL_dir-PA_dwi.nii.gz")));
    assert_eq!(dst_of(&plans,"sms4_diff_CMR130_PA_8.bval"),
        Some(Path::new("/bids/sub-EFI055ZRL/dwi/sub-EFI055ZRL_dir-PA_dwi.bval")));
    assert!(dst_of(&plans,"sms4_diff_CMR130_PA_11.nii.gz").is_none());

    assert_eq!(dst_of(&plans,"sms4_diff_CMR130_B0_AP_7.nii.gz"),
        Some(Path::new("/bids/sub-EFI055ZRL/fmap/sub-EFI055ZRL_acq-dwi_dir-AP_epi.nii.gz")));

    assert_eq!(dst_of(&plans,"ep2d_se_2mm_AP_REST_12.nii.gz"),
        Some(Path::new("/bids/sub-EFI055ZRL/fmap/sub-EFI055ZRL_dir-AP_acq-rest_epi.nii.gz")));
    assert_eq!(dst_of(&plans,"ep2d_se_2mm_PA_REST_13.nii.gz"),
        Some(Path::new("/bids/sub-EFI055ZRL/fmap/sub-EFI055ZRL_dir-PA_acq-rest_epi.nii.gz")));
    // TASK1 absent, TASK2 fills in
    assert_eq!(dst_of(&plans,"ep2d_se_2mm_AP_TASK2_20.nii.gz"),
        Some(Path::new("/bids/sub-EFI055ZRL/fmap/sub-EFI055ZRL_dir-AP_acq-task_epi.nii.gz")));

    assert_eq!(dst_of(&plans,"sms4_bold_rest1_14.nii.gz"),
        Some(Path::new("/bids/sub-EFI055ZRL/func/sub-EFI055ZRL_task-rest_run-1_bold.nii.gz")));
    assert_eq!(dst_of(&plans,"sms4_bold_rest2_15.nii.gz"),
        Some(Path::new("/bids/sub-EFI055ZRL/func/sub-EFI055ZRL_task-rest_run-2_bold.nii.gz")));

    // single task acquisition gets no run entity
    assert_eq!(dst_of(&plans,"sms4_bold_nback_16.nii.gz"),
        Some(Path::new("/bids/sub-EFI055ZRL/func/sub-EFI055ZRL_task-nback_bold.nii.gz")));
    // repeated task acquisitions are numbered by series order
    assert_eq!(dst_of(&plans,"sms4_bold_sst_17.nii.gz"),
        Some(Path::new("/bids/sub-EFI055ZRL/func/sub-EFI055ZRL_task-sst_run-1_bold.nii.gz")));
    assert_eq!(dst_of(&plans,"sms4_bold_sst_18.nii.gz"),
        Some(Path::new("/bids/sub-EFI055ZRL/func/sub-EFI055ZRL_task-sst_run-2_bold.nii.gz")));

    // unclassified series never enter the plan
    assert!(dst_of(&plans,"localizer_1.nii.gz").is_none());
}

#[test]
fn dry_run_copies_nothing(){
    let root = std::env::temp_dir().join("bids_convert_tests").join("dry_run");
    if root.exists() {
        std::fs::remove_dir_all(&root).expect("cannot clear old test root");
    }
    let src = root.join("src");
    let out = root.join("out");
    std::fs::create_dir_all(&src).expect("cannot create src");
    std::fs::write(src.join("t1_mprage_sag_p2_2.nii.gz"),b"not really an image").expect("cannot write");

    let rules = SeriesRules::default();
    let subject = Subject::new("01");
    let basenames = names(&["t1_mprage_sag_p2_2.nii.gz"]);
    let planner = ConversionPlanner::new(&src,&out,&subject,&rules,&basenames);
    let plans = planner.plan();
    assert_eq!(plans.len(),1);

    let n = execute(&plans,true).expect("dry run should succeed");
    assert_eq!(n,1);
    assert!(!out.join("anat").join("sub-01_run-1_T1w.nii.gz").exists());

    let n = execute(&plans,false).expect("copy should succeed");
    assert_eq!(n,1);
    assert!(out.join("anat").join("sub-01_run-1_T1w.nii.gz").exists());
}
