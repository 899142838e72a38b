use std::path::{Path, PathBuf};
use std::process::Command;
use bids::layout::Subject;
use crate::fsl::FslError;
use crate::subject_manager::DERIVATIVE_TOOL_NAME;

/// copy every subject's FA map into a flat directory for tbss. Subjects
/// without a tensor fit are reported and skipped; an empty collection is an
/// error because tbss has nothing to register.
pub fn collect_fa(derivatives_dir:&Path,tbss_dir:&Path,subjects:&[Subject]) -> Result<usize,String> {
    if !tbss_dir.exists() {
        std::fs::create_dir_all(tbss_dir).map_err(|e| format!("cannot create {:?}: {}",tbss_dir,e))?;
    }
    let mut n_collected = 0;
    for subject in subjects {
        let fa = derivatives_dir
            .join(DERIVATIVE_TOOL_NAME)
            .join(subject.id())
            .join(format!("{}_dti_FA.nii.gz",subject.id()));
        match fa.exists() {
            true => {
                let dest = tbss_dir.join(format!("{}_FA.nii.gz",subject.id()));
                std::fs::copy(&fa,&dest).map_err(|e| format!("cannot copy {:?}: {}",fa,e))?;
                println!("collected {:?}",dest);
                n_collected += 1;
            }
            false => {
                println!("WARN: no FA map for {} (expected {:?})",subject.id(),fa);
            }
        }
    }
    match n_collected {
        0 => Err(String::from("no FA maps were found for any subject")),
        n => Ok(n)
    }
}

fn run_stage(tbss_dir:&Path,tool:&str,args:&[&str]) -> Result<(),FslError> {
    let mut cmd = Command::new(tool);
    cmd.current_dir(tbss_dir);
    for a in args {
        cmd.arg(a);
    }
    println!("{:?}",cmd);
    let proc = cmd.spawn().map_err(|_| FslError::LaunchFailed{tool:tool.to_string()})?;
    let result = proc.wait_with_output().map_err(|_| FslError::LaunchFailed{tool:tool.to_string()})?;
    match result.status.success() {
        true => Ok(()),
        false => Err(FslError::CommandFailed{tool:tool.to_string(),code:result.status.code()})
    }
}

/// the four tbss stages, in order, inside the collection directory
pub fn run_tbss(tbss_dir:&Path,fa_threshold:f32) -> Result<(),FslError> {
    let fa_maps:Vec<PathBuf> = match utils::get_all_matches(tbss_dir,"*_FA.nii.gz") {
        Some(maps) => maps,
        None => {
            return Err(FslError::MissingOutput{tool:String::from("tbss_1_preproc"),path:tbss_dir.join("*_FA.nii.gz")})
        }
    };
    let names:Vec<String> = fa_maps.iter()
        .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
        .collect();
    let name_refs:Vec<&str> = names.iter().map(|s| s.as_str()).collect();
    run_stage(tbss_dir,"tbss_1_preproc",&name_refs)?;
    run_stage(tbss_dir,"tbss_2_reg",&["-T"])?;
    run_stage(tbss_dir,"tbss_3_postreg",&["-S"])?;
    let threshold = fa_threshold.to_string();
    run_stage(tbss_dir,"tbss_4_prestats",&[threshold.as_str()])
}

#[test]
fn empty_collection_is_an_error(){
    let dir = std::env::temp_dir().join("tbss_tests").join("empty");
    std::fs::create_dir_all(&dir).expect("cannot create test dir");
    let tbss_dir = std::env::temp_dir().join("tbss_tests").join("out");
    let subjects = vec![Subject::new("sub-01"),Subject::new("sub-02")];
    let result = collect_fa(&dir,&tbss_dir,&subjects);
    assert!(result.is_err());
}
