use std::collections::HashMap;
use std::path::Path;
use bids::name::BidsName;
use crate::convert::CopyPlan;

/// plan the copies that reshape a BIDS tree into the unprocessed HCP-style
/// layout downstream pipelines expect:
///
///   <subject>/anat/unprocessed/T1w/T1w_1.nii.gz
///   <subject>/func/unprocessed/field_maps/AP_S1_R1.nii.gz
///   <subject>/func/unprocessed/rest/session_1/run_1/Rest_S1_R1_E1.nii.gz
///
/// Diffusion series stay behind; they are consumed from the BIDS tree
/// directly.
pub fn plan_hcp(input_bids:&Path,output:&Path) -> Vec<CopyPlan> {
    let mut plans = Vec::<CopyPlan>::new();
    // anat numbering restarts per subject and modality
    let mut anat_counts = HashMap::<(String,String),usize>::new();

    let subject_dirs = utils::get_all_matches(input_bids,"sub-*").unwrap_or(Vec::new());
    for subject_dir in subject_dirs.iter().filter(|p| p.is_dir()) {
        let session_dirs = utils::get_all_matches(subject_dir,"ses-*").unwrap_or(Vec::new());
        for session_dir in session_dirs.iter().filter(|p| p.is_dir()) {
            for modality_dir in ["anat","func","fmap"] {
                let files = utils::get_all_matches(&session_dir.join(modality_dir),"*").unwrap_or(Vec::new());
                for file in files.iter().filter(|p| p.is_file()) {
                    plan_file(file,output,&mut anat_counts,&mut plans);
                }
            }
        }
    }
    plans
}

fn extension_of(basename:&str) -> Option<&'static str> {
    if basename.ends_with(".nii.gz") {
        Some(".nii.gz")
    } else if basename.ends_with(".nii") {
        Some(".nii")
    } else if basename.ends_with(".json") {
        Some(".json")
    } else {
        None
    }
}

fn session_number(ses:&Option<String>) -> u32 {
    ses.as_ref()
        .map(|s| s.trim_start_matches('0'))
        .and_then(|s| s.parse().ok())
        .unwrap_or(1)
}

fn plan_file(file:&Path,output:&Path,anat_counts:&mut HashMap<(String,String),usize>,plans:&mut Vec<CopyPlan>) {
    let basename = file.file_name().unwrap().to_string_lossy().to_string();
    let ext = match extension_of(&basename) {
        Some(ext) => ext,
        None => return
    };
    let name = match BidsName::parse(&basename) {
        Some(name) => name,
        None => {
            println!("WARN: could not parse BIDS filename: {}",basename);
            return
        }
    };
    if name.ses.is_none() {
        println!("WARN: {} carries no session entity. skipping",basename);
        return
    }

    let subject_out = output.join(&name.sub);
    let ses = session_number(&name.ses);
    let run = name.run.clone().unwrap_or(String::from("1"));
    let echo = name.echo.clone().unwrap_or(String::from("1"));

    match name.suffix.as_str() {
        "T1w" | "T2w" => {
            if ext == ".json" {
                return
            }
            let key = (name.sub.clone(),name.suffix.clone());
            let count = anat_counts.entry(key).or_insert(0);
            *count += 1;
            plans.push(CopyPlan{
                src:file.to_owned(),
                dst:subject_out.join("anat").join("unprocessed").join(&name.suffix)
                    .join(format!("{}_{}{}",name.suffix,count,ext)),
            });
        }
        "bold" | "sbref" => {
            // only the resting series go into the hcp layout
            match &name.task {
                Some(task) if task.eq_ignore_ascii_case("rest") => {}
                _=> return
            }
            if ext == ".json" {
                // sidecars ride along with their image below
                return
            }
            let kind = match name.suffix.as_str() {
                "bold" => "Rest",
                _=> "Sbref"
            };
            let run_dir = subject_out.join("func").join("unprocessed").join("rest")
                .join(format!("session_{}",ses))
                .join(format!("run_{}",run));
            let base = format!("{}_S{}_R{}_E{}",kind,ses,run,echo);
            plans.push(CopyPlan{
                src:file.to_owned(),
                dst:run_dir.join(format!("{}{}",base,ext)),
            });
            if name.suffix == "bold" {
                let sidecar = file.with_file_name(basename.replace(ext,".json"));
                if sidecar.exists() {
                    plans.push(CopyPlan{
                        src:sidecar,
                        dst:run_dir.join(format!("{}.json",base)),
                    });
                }
            }
        }
        "epi" => {
            let direction = name.dir.clone().unwrap_or(String::from("")).to_uppercase();
            if direction != "AP" && direction != "PA" {
                println!("WARN: field map direction not AP/PA in {}. skipping",basename);
                return
            }
            let base = format!("{}_S{}_R{}",direction,ses,run);
            plans.push(CopyPlan{
                src:file.to_owned(),
                dst:subject_out.join("func").join("unprocessed").join("field_maps")
                    .join(format!("{}{}",base,ext)),
            });
        }
        // dwi and everything else stay in the BIDS tree
        _=> {}
    }
}

#[cfg(test)]
fn touch(path:&Path) {
    std::fs::create_dir_all(path.parent().unwrap()).expect("cannot create test dir");
    std::fs::write(path,b"x").expect("cannot write test file");
}

#[test]
fn bids_session_maps_to_hcp_layout(){
    let root = std::env::temp_dir().join("hcp_tests").join("layout");
    if root.exists() {
        std::fs::remove_dir_all(&root).expect("cannot clear old test root");
    }
    let bids = root.join("bids");
    let ses = bids.join("sub-01").join("ses-01");
    touch(&ses.join("anat").join("sub-01_ses-01_run-1_T1w.nii.gz"));
    touch(&ses.join("anat").join("sub-01_ses-01_run-2_T1w.nii.gz"));
    touch(&ses.join("anat").join("sub-01_ses-01_T2w.nii.gz"));
    touch(&ses.join("func").join("sub-01_ses-01_task-rest_run-1_bold.nii.gz"));
    touch(&ses.join("func").join("sub-01_ses-01_task-rest_run-1_bold.json"));
    touch(&ses.join("func").join("sub-01_ses-01_task-nback_bold.nii.gz"));
    touch(&ses.join("fmap").join("sub-01_ses-01_dir-AP_epi.nii.gz"));
    touch(&ses.join("fmap").join("sub-01_ses-01_dir-PA_epi.json"));

    let out = root.join("hcp");
    let plans = plan_hcp(&bids,&out);

    let dsts:Vec<String> = plans.iter()
        .map(|p| p.dst.strip_prefix(&out).unwrap().to_string_lossy().to_string())
        .collect();

    assert!(dsts.contains(&String::from("01/anat/unprocessed/T1w/T1w_1.nii.gz")));
    assert!(dsts.contains(&String::from("01/anat/unprocessed/T1w/T1w_2.nii.gz")));
    assert!(dsts.contains(&String::from("01/anat/unprocessed/T2w/T2w_1.nii.gz")));
    assert!(dsts.contains(&String::from("01/func/unprocessed/rest/session_1/run_1/Rest_S1_R1_E1.nii.gz")));
    assert!(dsts.contains(&String::from("01/func/unprocessed/rest/session_1/run_1/Rest_S1_R1_E1.json")));
    assert!(dsts.contains(&String::from("01/func/unprocessed/field_maps/AP_S1_R1.nii.gz")));
    assert!(dsts.contains(&String::from("01/func/unprocessed/field_maps/PA_S1_R1.json")));
    // the task series is not part of the layout
    assert!(!dsts.iter().any(|d| d.contains("nback")));
}
