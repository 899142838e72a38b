use std::collections::HashMap;
use std::path::Path;
use crate::table::{Table, TableError};

/// join every *_summary.csv report in the qc directory onto the base subject
/// table. Each report contributes <label>_fd and (when present) <label>_good
/// columns keyed by subject, where the label is the report's file stem.
pub fn merge_reports(base_csv:&Path,key_column:&str,qc_dir:&Path,output:&Path) -> Result<Table,TableError> {
    let mut base = Table::from_csv(base_csv)?;
    base.column_index(key_column)?;

    let reports = match utils::get_all_matches(qc_dir,"*_summary.csv") {
        Some(reports) => reports,
        None => {
            println!("WARN: no summary reports found in {:?}",qc_dir);
            Vec::new()
        }
    };

    for report_path in &reports {
        merge_one(&mut base,key_column,report_path)?;
    }

    base.write_csv(output);
    Ok(base)
}

fn report_label(path:&Path) -> String {
    let stem = path.file_stem().unwrap().to_string_lossy().to_string();
    match stem.strip_suffix("_summary") {
        Some(s) => s.to_string(),
        None => stem
    }
}

fn merge_one(base:&mut Table,key_column:&str,report_path:&Path) -> Result<(),TableError> {
    let report = Table::from_csv(report_path)?;
    let label = report_label(report_path);
    println!("merging {:?} as {}",report_path.file_name().unwrap(),label);

    // index the report by subject, dropping the SUM row
    let mut fd = HashMap::<String,String>::new();
    let mut good = HashMap::<String,String>::new();
    let has_good = report.column_index("good_data").is_ok();
    for row in &report.rows {
        let subject = match report.get(row,"subject_name") {
            Some(s) => s,
            None => continue
        };
        if subject == "SUM" || subject.is_empty() {
            continue
        }
        if let Some(v) = report.get(row,"mean_fd") {
            fd.insert(subject.clone(),v);
        }
        if has_good {
            if let Some(v) = report.get(row,"good_data") {
                good.insert(subject.clone(),v);
            }
        }
    }

    let key_idx = base.column_index(key_column)?;
    base.push_column(&format!("{}_fd",label),|row| {
        fd.get(&row[key_idx]).cloned().unwrap_or(String::from(""))
    });
    if has_good {
        base.push_column(&format!("{}_good",label),|row| {
            good.get(&row[key_idx]).cloned().unwrap_or(String::from(""))
        });
    }
    Ok(())
}

#[cfg(test)]
fn test_dir(name:&str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join("merge_tests").join(name);
    if dir.exists() {
        std::fs::remove_dir_all(&dir).expect("cannot clear old test dir");
    }
    std::fs::create_dir_all(&dir).expect("cannot create test dir");
    dir
}

#[test]
fn reports_join_on_subject(){
    let dir = test_dir("join");
    let base = dir.join("checkup.csv");
    std::fs::write(&base,"subj_ID,group\nsub-01,ADHD\nsub-02,\nsub-03,TD\n").expect("cannot write base");

    let qc_dir = dir.join("qc");
    std::fs::create_dir_all(&qc_dir).expect("cannot create qc dir");
    std::fs::write(qc_dir.join("rest1_summary.csv"),
        "subject_name,mean_fd,good_data\nsub-01,0.12,true\nsub-03,0.4,false\nSUM,,1\n").expect("cannot write report");
    std::fs::write(qc_dir.join("dwi_summary.csv"),
        "subject_name,mean_fd\nsub-01,0.2\nsub-02,0.3\nSUM,\n").expect("cannot write report");

    let merged = merge_reports(&base,"subj_ID",&qc_dir,&dir.join("merged.csv")).expect("merge should succeed");

    assert!(merged.column_index("rest1_fd").is_ok());
    assert!(merged.column_index("rest1_good").is_ok());
    assert!(merged.column_index("dwi_fd").is_ok());
    // dwi report has no good_data column, so no dwi_good appears
    assert!(merged.column_index("dwi_good").is_err());

    let row1 = &merged.rows[0];
    assert_eq!(merged.get(row1,"rest1_fd"),Some(String::from("0.12")));
    assert_eq!(merged.get(row1,"dwi_fd"),Some(String::from("0.2")));
    let row2 = &merged.rows[1];
    // no rest1 report row for sub-02: joined value stays empty
    assert_eq!(merged.get(row2,"rest1_fd"),Some(String::from("")));
    assert_eq!(merged.get(row2,"dwi_fd"),Some(String::from("0.3")));
}
