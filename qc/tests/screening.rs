use std::path::PathBuf;
use qc::confounds::{after_first, mean_ignoring_missing, read_column};
use qc::report::{classify, MotionReport, MotionThresholds};

fn test_root(name:&str) -> PathBuf {
    let root = std::env::temp_dir().join("qc_screening_tests").join(name);
    if root.exists() {
        std::fs::remove_dir_all(&root).expect("cannot clear old test root");
    }
    std::fs::create_dir_all(&root).expect("cannot create test root");
    root
}

fn write_subject_confounds(root:&PathBuf,subject:&str,task:&str,rmsd:&[&str]) {
    let func = root.join(subject).join("func");
    std::fs::create_dir_all(&func).expect("cannot create func dir");
    let mut content = String::from("trans_x\trmsd\n");
    for v in rmsd {
        content.push_str(&format!("0.0\t{}\n",v));
    }
    let f = func.join(format!("{}_{}_desc-confounds_timeseries.tsv",subject,task));
    std::fs::write(f,content).expect("cannot write confounds");
}

#[test]
fn screening_over_a_cohort(){
    let root = test_root("cohort");
    // clean subject
    write_subject_confounds(&root,"sub-01","task-rest",&["n/a","0.05","0.1","0.07"]);
    // one frame over the per-frame cutoff
    write_subject_confounds(&root,"sub-02","task-rest",&["n/a","0.1","0.3","0.05"]);
    // catastrophic single spike over the max cutoff
    write_subject_confounds(&root,"sub-03","task-rest",&["n/a","0.1","3.5","0.05"]);
    // subject with a different task only: no matching confounds
    write_subject_confounds(&root,"sub-04","task-nback",&["n/a","0.1"]);

    let mut thresholds = MotionThresholds::default();
    thresholds.frame_count = 1;

    let mut report = MotionReport::new(&thresholds);
    let mut n_skipped = 0;
    for subject in ["sub-01","sub-02","sub-03","sub-04"] {
        let pattern = root.join(subject).join("func").join("*task-rest*desc-confounds_timeseries.tsv");
        let matches:Vec<PathBuf> = glob::glob(pattern.to_str().unwrap()).unwrap().flat_map(|m| m).collect();
        match matches.first() {
            Some(f) => {
                let values = read_column(f,"rmsd").expect("column should read");
                report.push(subject,classify(&values,&thresholds));
            }
            None => {
                n_skipped += 1;
            }
        }
    }

    // the subject with no matching run is skipped, not failed
    assert_eq!(n_skipped,1);
    assert_eq!(report.n_rows(),3);
    assert_eq!(report.n_good(),1);

    let csv = report.to_csv();
    let lines:Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(),5);
    assert!(lines[1].starts_with("sub-01,"));
    assert!(lines[1].contains(",true,"));
    assert!(lines[2].starts_with("sub-02,"));
    assert!(lines[2].contains(",false,"));
    assert!(lines[4].starts_with("SUM,,1,"));
}

#[test]
fn multi_run_mean_uses_every_file(){
    let root = test_root("multi_run");
    write_subject_confounds(&root,"sub-01","task-rest_run-1",&["n/a","0.1","0.2"]);
    write_subject_confounds(&root,"sub-01","task-rest_run-2",&["n/a","0.3","0.5"]);

    let func = root.join("sub-01").join("func");
    let files = utils::get_all_matches(&func,"*task-rest*desc-confounds_timeseries.tsv").expect("confounds exist");
    assert_eq!(files.len(),2);

    let mut per_file = Vec::<f64>::new();
    for f in &files {
        let values = read_column(f,"rmsd").expect("column should read");
        per_file.push(mean_ignoring_missing(after_first(&values)).expect("mean exists"));
    }
    let mean = per_file.iter().sum::<f64>()/per_file.len() as f64;
    assert!((mean - 0.275).abs() < 1.0E-12);
}
